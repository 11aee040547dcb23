pub mod state;
pub mod submission_ctx;
pub mod submission_flow;

pub use state::{StateTracker, SubmissionState};
pub use submission_ctx::SubmissionCtx;
pub use submission_flow::{Outcome, SubmissionFlow, SubmissionReport};
