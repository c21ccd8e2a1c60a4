pub mod history;
pub mod service;
pub mod workflow;

pub use service::{AttendanceService, CommitEvent, CommitKind, CommitListener};
pub use workflow::EditProposal;
