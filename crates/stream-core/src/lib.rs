#![forbid(unsafe_code)]

pub mod config;
pub mod decoder;
pub mod endpoint;
pub mod monitor;
pub mod notify;
pub mod probe;

pub use config::CheckerConfig;
pub use decoder::{peak_level, AudioDecoder, AudioSample, DecodeError, FfmpegDecoder};
pub use endpoint::{enumerate_endpoints, Endpoint};
pub use monitor::{
    CheckFailure, CheckResult, CheckState, HostSummary, Monitor, NotificationStatus, RunReport,
    StreamChecker, Verdict,
};
pub use notify::{
    notification_subject, MailConfig, Notifier, NotifierSet, NotifyError, SmtpNotifier,
    WebhookConfig, WebhookNotifier, WebhookPayload,
};
pub use probe::{AudioFormat, HttpProbe, ProbeError, ProbeResponse, StreamProbe};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
