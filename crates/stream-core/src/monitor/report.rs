//! Run report: counters, per-host totals and the text log sent to notifiers.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::config::CheckerConfig;

use super::state::{CheckResult, Verdict};

const TIMESTAMP_FORMAT: &str = "%d %b %Y %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum NotificationStatus {
    /// Nothing failed and no one asked for the report.
    Skipped,
    /// A notification was due but no notifier is configured.
    NoNotifier,
    Delivered,
    Failed(String),
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct HostSummary {
    pub host: String,
    pub endpoints_checked: usize,
    pub success_count: usize,
    pub warn_count: usize,
    pub fail_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub version: String,
    pub instance_name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub verbose: bool,
    pub hosts: Vec<HostSummary>,
    /// `OK` plus `WARN` verdicts.
    pub success_count: usize,
    pub warn_count: usize,
    pub fail_count: usize,
    pub endpoints_checked: usize,
    pub endpoints_expected: usize,
    pub hosts_checked: usize,
    pub stations_checked: usize,
    pub lines: Vec<String>,
    pub results: Vec<CheckResult>,
    pub aborted: bool,
    pub notification: NotificationStatus,
}

impl RunReport {
    pub fn start(config: &CheckerConfig) -> Self {
        let started_at = Utc::now();
        let mut report = Self {
            run_id: Uuid::new_v4(),
            version: crate::VERSION.to_string(),
            instance_name: config.instance_name.clone(),
            started_at,
            finished_at: None,
            verbose: config.verbose,
            hosts: Vec::with_capacity(config.hosts.len()),
            success_count: 0,
            warn_count: 0,
            fail_count: 0,
            endpoints_checked: 0,
            endpoints_expected: config.endpoint_count(),
            hosts_checked: 0,
            stations_checked: config.streams.len(),
            lines: Vec::new(),
            results: Vec::new(),
            aborted: false,
            notification: NotificationStatus::Skipped,
        };
        report.push_line(format!("Stream Checker {}", report.version));
        report.push_line(format!("Running on {}", report.instance_name));
        report.push_line(format!("Started at: {}", started_at.format(TIMESTAMP_FORMAT)));
        report.push_line("");
        report
    }

    pub fn push_line(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn begin_host(&mut self, host: &str) {
        self.hosts_checked += 1;
        self.hosts.push(HostSummary {
            host: host.to_string(),
            ..Default::default()
        });
        self.push_line(format!("Checking streams on host {}", host));
    }

    /// Fold one finished check into the counters and the log.
    pub fn record(&mut self, result: CheckResult) {
        let summary = match self.hosts.iter().position(|h| h.host == result.endpoint.host) {
            Some(idx) => &mut self.hosts[idx],
            None => {
                self.hosts.push(HostSummary {
                    host: result.endpoint.host.clone(),
                    ..Default::default()
                });
                let last = self.hosts.len() - 1;
                &mut self.hosts[last]
            }
        };
        summary.endpoints_checked += 1;
        match result.verdict {
            Verdict::Ok => summary.success_count += 1,
            Verdict::Warn => {
                summary.success_count += 1;
                summary.warn_count += 1;
            }
            Verdict::Fail => summary.fail_count += 1,
        }

        self.endpoints_checked += 1;
        match result.verdict {
            Verdict::Ok => self.success_count += 1,
            Verdict::Warn => {
                self.success_count += 1;
                self.warn_count += 1;
            }
            Verdict::Fail => self.fail_count += 1,
        }

        if let Some(line) = result.log_line(self.verbose) {
            self.push_line(line);
        }

        self.results.push(result);
    }

    pub fn mark_aborted(&mut self) {
        self.aborted = true;
    }

    /// Stamp the finish time and append the summary block.
    pub fn finish(&mut self) {
        let finished_at = Utc::now();
        self.finished_at = Some(finished_at);

        self.push_line(format!("Finished at: {}", finished_at.format(TIMESTAMP_FORMAT)));
        if self.aborted {
            self.push_line(format!(
                "Run aborted: {} of {} endpoints checked.",
                self.endpoints_checked, self.endpoints_expected
            ));
        }
        self.push_line("");
        self.push_line("SUMMARY");
        self.push_line(format!(
            "{} station(s) checked on {} server(s).",
            self.stations_checked, self.hosts_checked
        ));
        let host_lines: Vec<String> = self
            .hosts
            .iter()
            .map(|h| {
                format!(
                    "  {}: {} alive, {} failed, {} decoder warning(s)",
                    h.host, h.success_count, h.fail_count, h.warn_count
                )
            })
            .collect();
        self.lines.extend(host_lines);
        self.push_line(format!("{} streams are alive.", self.success_count));
        self.push_line(format!("{} have failed.", self.fail_count));
    }

    /// Notify when forced, or when anything failed. Warnings alone never notify.
    pub fn should_notify(&self, force: bool) -> bool {
        force || self.fail_count > 0
    }

    /// Report text as sent to notifiers.
    pub fn body(&self) -> String {
        let mut body = self.lines.join("\r\n");
        body.push_str("\r\n");
        body
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|f| f - self.started_at)
    }
}
