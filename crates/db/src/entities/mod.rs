//! Database entities.

#![allow(missing_docs)]

pub mod attachment;
pub mod category;
pub mod proposal;
pub mod proposal_vote;

pub use attachment::Entity as Attachment;
pub use category::Entity as Category;
pub use proposal::Entity as Proposal;
pub use proposal_vote::Entity as ProposalVote;
