//! Database repositories.

mod attachment;
mod category;
mod proposal;
mod proposal_vote;

pub use attachment::AttachmentRepository;
pub use category::CategoryRepository;
pub use proposal::{ContentRevision, ProposalRepository};
pub use proposal_vote::{ProposalVoteRepository, VoteCounts};
