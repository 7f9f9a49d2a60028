//! Report delivery.
//!
//! The monitor hands a finished report to a [`Notifier`] at most once per
//! run. Delivery failures are reported back to the caller and recorded on
//! the report; they never affect the run itself.

mod mail;
mod webhook;

pub use mail::{MailConfig, SmtpNotifier};
pub use webhook::{WebhookConfig, WebhookNotifier, WebhookPayload};

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP {status} from {url}")]
    Http { url: String, status: u16 },
    #[error("Request to {url} failed: {reason}")]
    Network { url: String, reason: String },
    #[error("invalid mail address {0}")]
    Address(String),
    #[error("mail delivery failed: {0}")]
    Mail(String),
    #[error("failed to serialize payload: {0}")]
    Serialize(String),
    #[error("{failed} of {total} notifiers failed: {first}")]
    Partial {
        failed: usize,
        total: usize,
        first: String,
    },
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, report: &str, fail_count: usize) -> Result<(), NotifyError>;
}

pub fn notification_subject(fail_count: usize) -> &'static str {
    if fail_count > 0 {
        "Streamchecker - Streams FAILED"
    } else {
        "Streamchecker - Streams OK"
    }
}

/// Delivers to every inner notifier; fails if any of them failed.
#[derive(Default, Clone)]
pub struct NotifierSet {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl NotifierSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, notifier: Arc<dyn Notifier>) {
        self.notifiers.push(notifier);
    }

    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }
}

#[async_trait]
impl Notifier for NotifierSet {
    async fn notify(&self, report: &str, fail_count: usize) -> Result<(), NotifyError> {
        let mut errors = Vec::new();
        for notifier in &self.notifiers {
            if let Err(e) = notifier.notify(report, fail_count).await {
                errors.push(e.to_string());
            }
        }
        match errors.first() {
            None => Ok(()),
            Some(first) => Err(NotifyError::Partial {
                failed: errors.len(),
                total: self.notifiers.len(),
                first: first.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct Counting {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for Counting {
        async fn notify(&self, _report: &str, _fail_count: usize) -> Result<(), NotifyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(NotifyError::Mail("relay refused".into()))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn subject_reflects_failures() {
        assert_eq!(notification_subject(0), "Streamchecker - Streams OK");
        assert_eq!(notification_subject(3), "Streamchecker - Streams FAILED");
    }

    #[tokio::test]
    async fn set_reaches_every_notifier() {
        let ok = Arc::new(Counting { calls: AtomicUsize::new(0), fail: false });
        let bad = Arc::new(Counting { calls: AtomicUsize::new(0), fail: true });
        let mut set = NotifierSet::new();
        set.push(bad.clone());
        set.push(ok.clone());

        let err = set.notify("report", 1).await.unwrap_err();
        assert_eq!(ok.calls.load(Ordering::SeqCst), 1);
        assert_eq!(bad.calls.load(Ordering::SeqCst), 1);
        assert!(matches!(err, NotifyError::Partial { failed: 1, total: 2, .. }));
    }

    #[tokio::test]
    async fn empty_set_succeeds() {
        let set = NotifierSet::new();
        assert!(set.is_empty());
        set.notify("report", 0).await.unwrap();
    }
}
