use std::future::Future;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

use crate::config::CheckerConfig;
use crate::decoder::{AudioDecoder, FfmpegDecoder};
use crate::endpoint::enumerate_endpoints;
use crate::notify::Notifier;
use crate::probe::{HttpProbe, StreamProbe};

use super::checker::StreamChecker;
use super::report::{NotificationStatus, RunReport};
use super::state::CheckResult;

/// Drives one check pass over every configured endpoint and owns the report.
pub struct Monitor {
    config: Arc<CheckerConfig>,
    checker: Arc<StreamChecker>,
    notifier: Option<Arc<dyn Notifier>>,
    result_tx: Option<UnboundedSender<CheckResult>>,
}

impl Monitor {
    pub fn new(
        config: CheckerConfig,
        probe: Arc<dyn StreamProbe>,
        decoder: Arc<dyn AudioDecoder>,
    ) -> Self {
        let checker = StreamChecker::new(probe, decoder, config.silence_threshold);
        Self {
            config: Arc::new(config),
            checker: Arc::new(checker),
            notifier: None,
            result_tx: None,
        }
    }

    /// Monitor backed by the HTTP probe and the ffmpeg decoder.
    pub fn from_config(config: CheckerConfig) -> Self {
        let probe = Arc::new(HttpProbe::from_config(&config));
        let decoder = Arc::new(FfmpegDecoder::from_config(&config));
        Self::new(config, probe, decoder)
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Publish every finished check on `tx` as it is recorded.
    pub fn with_result_tx(mut self, tx: UnboundedSender<CheckResult>) -> Self {
        self.result_tx = Some(tx);
        self
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    pub async fn run_pass(&self, force_notify: bool) -> RunReport {
        self.run_pass_until(force_notify, std::future::pending()).await
    }

    /// Run a pass that stops early when `shutdown` resolves.
    ///
    /// An aborted pass returns a partial report holding only completed
    /// checks and never notifies.
    pub async fn run_pass_until(
        &self,
        force_notify: bool,
        shutdown: impl Future<Output = ()>,
    ) -> RunReport {
        let mut report = RunReport::start(&self.config);
        let concurrency = self.config.max_concurrent_checks.max(1);
        info!(
            endpoints = report.endpoints_expected,
            concurrency, "Starting check pass"
        );

        tokio::pin!(shutdown);

        'hosts: for host in &self.config.hosts {
            report.begin_host(host);
            let endpoints = enumerate_endpoints(
                std::slice::from_ref(host),
                &self.config.streams,
                &self.config.formats,
            );

            let mut results = stream::iter(endpoints.into_iter().map(|endpoint| {
                let checker = Arc::clone(&self.checker);
                async move { checker.check(endpoint).await }
            }))
            .buffer_unordered(concurrency);

            loop {
                tokio::select! {
                    next = results.next() => match next {
                        Some(result) => self.record(&mut report, result),
                        None => break,
                    },
                    _ = &mut shutdown => {
                        warn!(
                            checked = report.endpoints_checked,
                            expected = report.endpoints_expected,
                            "Check pass aborted"
                        );
                        report.mark_aborted();
                        break 'hosts;
                    }
                }
            }
        }

        report.finish();
        info!(
            alive = report.success_count,
            failed = report.fail_count,
            warnings = report.warn_count,
            "Check pass finished"
        );

        if report.aborted {
            return report;
        }

        let force = force_notify || self.config.email_send_on_ok;
        if report.should_notify(force) {
            report.notification = match &self.notifier {
                Some(notifier) => match notifier.notify(&report.body(), report.fail_count).await {
                    Ok(()) => {
                        info!(fail_count = report.fail_count, "Report delivered");
                        NotificationStatus::Delivered
                    }
                    Err(e) => {
                        warn!(error = %e, "Report delivery failed");
                        NotificationStatus::Failed(e.to_string())
                    }
                },
                None => NotificationStatus::NoNotifier,
            };
        }

        report
    }

    fn record(&self, report: &mut RunReport, result: CheckResult) {
        if let Some(tx) = &self.result_tx {
            let _ = tx.send(result.clone());
        }
        report.record(result);
    }
}
