//! Common utilities and shared types for civica.
//!
//! This crate provides foundational components used across all civica crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`], [`AppResult`]
//!   and per-field validation messages via [`FieldErrors`]
//! - **Identifiers**: Parsing of integer identifiers via [`parse_id`]
//!
//! # Example
//!
//! ```no_run
//! use civica_common::{AppResult, Config, parse_id};
//!
//! fn example(raw_id: &str) -> AppResult<()> {
//!     let config = Config::load()?;
//!     let id = parse_id(raw_id)?;
//!     println!("{} -> proposal {id}", config.database.url);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod id;

pub use config::{Config, DatabaseConfig, LoggingConfig};
pub use error::{AppError, AppResult, FieldErrors};
pub use id::{ensure_id, parse_id};
