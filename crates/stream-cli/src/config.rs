//! TOML configuration file schema and parsing.
//!
//! Example config file:
//!
//! ```toml
//! [logging]
//! log_format = "pretty"
//!
//! [checker]
//! hosts = ["http://icecast-server:8000"]
//! streams = ["breeze-bath", "breeze-reading"]
//! formats = ["-src", "-48.aac", "-96.aac", "-128.aac", "-96.mp3"]
//! silence_threshold = 100
//! max_concurrent_checks = 4
//!
//! [email]
//! smtp_host = "smtp.example.com"
//! smtp_port = 587
//! smtp_username = "streamchecker"
//! smtp_password = "secret"
//! use_tls = true
//! sender = "Streamchecker <streamchecker@example.com>"
//! destination = "ops@example.com"
//! send_on_ok = false
//!
//! [[webhook]]
//! url = "https://hooks.example.com/streams"
//! secret = "my-key"
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use stream_core::{CheckerConfig, MailConfig, WebhookConfig};

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    pub checker: CheckerDef,

    #[serde(default)]
    pub email: Option<EmailDef>,

    #[serde(default)]
    pub webhook: Vec<WebhookConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_format: default_log_format(),
        }
    }
}

fn default_log_format() -> String {
    "pretty".into()
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckerDef {
    pub hosts: Vec<String>,
    pub streams: Vec<String>,
    pub formats: Vec<String>,

    #[serde(default)]
    pub silence_threshold: Option<u32>,

    #[serde(default)]
    pub request_timeout_ms: Option<u64>,

    #[serde(default)]
    pub decode_timeout_ms: Option<u64>,

    #[serde(default)]
    pub max_concurrent_checks: Option<usize>,

    #[serde(default)]
    pub ffmpeg_path: Option<String>,

    #[serde(default)]
    pub instance_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailDef {
    #[serde(flatten)]
    pub mail: MailConfig,

    #[serde(default)]
    pub send_on_ok: bool,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {}", path.display(), e))?;

        let config: AppConfig = toml::from_str(&content)
            .map_err(|e| format!("Failed to parse config file {}: {}", path.display(), e))?;

        config.validate()?;
        Ok(config)
    }

    pub fn to_checker_config(&self) -> CheckerConfig {
        let def = &self.checker;
        let mut c = CheckerConfig::default()
            .with_hosts(def.hosts.iter().map(|h| h.trim_end_matches('/')))
            .with_streams(def.streams.iter().cloned())
            .with_formats(def.formats.iter().cloned())
            .with_email_send_on_ok(self.email.as_ref().is_some_and(|e| e.send_on_ok));
        if let Some(v) = def.silence_threshold {
            c = c.with_silence_threshold(v);
        }
        if let Some(v) = def.request_timeout_ms {
            c = c.with_request_timeout(v);
        }
        if let Some(v) = def.decode_timeout_ms {
            c = c.with_decode_timeout(v);
        }
        if let Some(v) = def.max_concurrent_checks {
            c = c.with_max_concurrent_checks(v);
        }
        if let Some(ref v) = def.ffmpeg_path {
            c = c.with_ffmpeg_path(v.clone());
        }
        if let Some(ref v) = def.instance_name {
            c = c.with_instance_name(v.clone());
        }
        c
    }

    fn validate(&self) -> Result<(), String> {
        let def = &self.checker;
        if def.hosts.is_empty() {
            return Err("No hosts configured".into());
        }
        if def.streams.is_empty() {
            return Err("No streams configured".into());
        }
        if def.formats.is_empty() {
            return Err("No formats configured".into());
        }

        let mut seen = HashSet::new();
        for (i, host) in def.hosts.iter().enumerate() {
            let parsed = url::Url::parse(host)
                .map_err(|e| format!("Invalid host URL at index {}: {} ({})", i, host, e))?;
            if parsed.scheme() != "http" && parsed.scheme() != "https" {
                return Err(format!("Host URL must use http or https: {}", host));
            }
            if !seen.insert(host.trim_end_matches('/')) {
                return Err(format!("Duplicate host: {}", host));
            }
        }

        if def.streams.iter().any(|s| s.trim().is_empty()) {
            return Err("Stream names must not be empty".into());
        }

        if def.max_concurrent_checks == Some(0) {
            return Err("max_concurrent_checks must be at least 1".into());
        }

        for (i, wh) in self.webhook.iter().enumerate() {
            url::Url::parse(&wh.url)
                .map_err(|e| format!("Invalid webhook URL at index {}: {} ({})", i, wh.url, e))?;
        }

        if let Some(ref email) = self.email {
            if email.mail.smtp_host.trim().is_empty() {
                return Err("Email smtp_host must not be empty".into());
            }
            if email.mail.sender.trim().is_empty() || email.mail.destination.trim().is_empty() {
                return Err("Email sender and destination must not be empty".into());
            }
            if email.mail.smtp_password.is_some() && email.mail.smtp_username.is_none() {
                return Err("Email smtp_password requires smtp_username".into());
            }
        }

        match self.logging.log_format.as_str() {
            "pretty" | "json" => {}
            other => {
                return Err(format!(
                    "Invalid log_format '{}': must be 'pretty' or 'json'",
                    other
                ));
            }
        }

        Ok(())
    }
}

/// Hostname for the report header when `instance_name` is not configured.
///
/// `HOSTNAME` is often not exported under cron or systemd, so the kernel
/// hostname files are consulted as well.
pub fn system_hostname() -> Option<String> {
    let candidates = [
        std::env::var("HOSTNAME").ok(),
        std::fs::read_to_string("/proc/sys/kernel/hostname").ok(),
        std::fs::read_to_string("/etc/hostname").ok(),
    ];
    first_hostname(candidates)
}

fn first_hostname(candidates: impl IntoIterator<Item = Option<String>>) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .map(|name| name.trim().to_string())
        .find(|name| !name.is_empty())
}
