pub mod checker;
pub mod engine;
pub mod error;
pub mod report;
pub mod state;

pub use checker::StreamChecker;
pub use engine::Monitor;
pub use error::CheckFailure;
pub use report::{HostSummary, NotificationStatus, RunReport};
pub use state::{CheckResult, CheckState, Verdict};
