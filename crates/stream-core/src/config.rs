use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for one check pass over every host/stream/format combination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckerConfig {
    /// Base URLs of the streaming servers, e.g. `http://icecast-server:8000`.
    pub hosts: Vec<String>,
    /// Mount names checked on every host.
    pub streams: Vec<String>,
    /// Encoding suffixes appended to each mount name (`-src`, `-96.aac`, ...).
    pub formats: Vec<String>,
    /// Peak level below which a sample counts as silence (default: 100).
    pub silence_threshold: u32,
    /// HTTP request timeout for the reachability probe.
    pub request_timeout: Duration,
    /// Upper bound for a single decoder invocation.
    pub decode_timeout: Duration,
    /// Length of audio pulled per sample (default: 1s).
    pub sample_duration: Duration,
    /// PCM sample rate the decoder resamples to (default: 16000).
    pub sample_rate: u32,
    pub max_concurrent_checks: usize,
    /// Send the report even when every stream is alive.
    pub email_send_on_ok: bool,
    /// Record successful checks in the run log as well as failures.
    pub verbose: bool,
    pub ffmpeg_path: String,
    /// Label printed in the report header as the machine running the check.
    pub instance_name: String,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            hosts: Vec::new(),
            streams: Vec::new(),
            formats: Vec::new(),
            silence_threshold: 100,
            request_timeout: Duration::from_secs(10),
            decode_timeout: Duration::from_secs(15),
            sample_duration: Duration::from_secs(1),
            sample_rate: 16_000,
            max_concurrent_checks: 4,
            email_send_on_ok: false,
            verbose: false,
            ffmpeg_path: "ffmpeg".to_string(),
            instance_name: "localhost".to_string(),
        }
    }
}

impl CheckerConfig {
    pub fn with_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hosts = hosts.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_streams<I, S>(mut self, streams: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.streams = streams.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_formats<I, S>(mut self, formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.formats = formats.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_silence_threshold(mut self, threshold: u32) -> Self {
        self.silence_threshold = threshold;
        self
    }

    pub fn with_request_timeout(mut self, ms: u64) -> Self {
        self.request_timeout = Duration::from_millis(ms);
        self
    }

    pub fn with_decode_timeout(mut self, ms: u64) -> Self {
        self.decode_timeout = Duration::from_millis(ms);
        self
    }

    pub fn with_max_concurrent_checks(mut self, max: usize) -> Self {
        self.max_concurrent_checks = max.max(1);
        self
    }

    pub fn with_email_send_on_ok(mut self, enabled: bool) -> Self {
        self.email_send_on_ok = enabled;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_ffmpeg_path(mut self, path: impl Into<String>) -> Self {
        self.ffmpeg_path = path.into();
        self
    }

    pub fn with_instance_name(mut self, name: impl Into<String>) -> Self {
        self.instance_name = name.into();
        self
    }

    /// Total number of endpoints a full pass will check.
    pub fn endpoint_count(&self) -> usize {
        self.hosts.len() * self.streams.len() * self.formats.len()
    }
}
