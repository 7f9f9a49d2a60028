use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::endpoint::Endpoint;

/// Step of the per-endpoint check protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckState {
    Start,
    Probing,
    Detecting,
    SilenceConfirmCheck,
    Unreachable,
    FormatUnknown,
    DecodeWarn,
    Fail,
    Ok,
}

impl CheckState {
    pub fn can_transition_to(self, target: CheckState) -> bool {
        matches!(
            (self, target),
            (CheckState::Start, CheckState::Probing)
                | (CheckState::Probing, CheckState::Unreachable)
                | (CheckState::Probing, CheckState::FormatUnknown)
                | (CheckState::Probing, CheckState::Detecting)
                | (CheckState::Detecting, CheckState::DecodeWarn)
                | (CheckState::Detecting, CheckState::SilenceConfirmCheck)
                | (CheckState::Detecting, CheckState::Ok)
                | (CheckState::SilenceConfirmCheck, CheckState::DecodeWarn)
                | (CheckState::SilenceConfirmCheck, CheckState::Fail)
                | (CheckState::SilenceConfirmCheck, CheckState::Ok)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            CheckState::Unreachable
                | CheckState::FormatUnknown
                | CheckState::DecodeWarn
                | CheckState::Fail
                | CheckState::Ok
        )
    }
}

impl fmt::Display for CheckState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::Probing => write!(f, "probing"),
            Self::Detecting => write!(f, "detecting"),
            Self::SilenceConfirmCheck => write!(f, "silence_confirm_check"),
            Self::Unreachable => write!(f, "unreachable"),
            Self::FormatUnknown => write!(f, "format_unknown"),
            Self::DecodeWarn => write!(f, "decode_warn"),
            Self::Fail => write!(f, "fail"),
            Self::Ok => write!(f, "ok"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Ok,
    Fail,
    /// Decoder infrastructure trouble. Counts as alive.
    Warn,
}

impl Verdict {
    pub fn is_success(self) -> bool {
        !matches!(self, Verdict::Fail)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::Fail => write!(f, "FAIL"),
            Self::Warn => write!(f, "WARN"),
        }
    }
}

/// Outcome of checking one endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub endpoint: Endpoint,
    pub verdict: Verdict,
    pub detail: String,
    pub state: CheckState,
    pub checked_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_title: Option<String>,
    /// Last measured peak level, if any sample decoded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peak: Option<u32>,
    pub samples_taken: u8,
}

impl CheckResult {
    pub fn new(
        endpoint: Endpoint,
        verdict: Verdict,
        state: CheckState,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            endpoint,
            verdict,
            detail: detail.into(),
            state,
            checked_at: Utc::now(),
            content_type: None,
            stream_title: None,
            peak: None,
            samples_taken: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.verdict.is_success()
    }

    /// Run log line for this result. Successes are only logged when verbose.
    pub fn log_line(&self, verbose: bool) -> Option<String> {
        let mount = self.endpoint.mount();
        match self.verdict {
            Verdict::Fail => Some(format!(
                "FAIL: [{}] {} {}",
                self.checked_at.format("%H:%M:%S"),
                mount,
                self.detail
            )),
            Verdict::Ok if verbose => Some(format!("OK: {}, {}", mount, self.detail)),
            Verdict::Warn if verbose => Some(format!("WARN: {}, {}", mount, self.detail)),
            _ => None,
        }
    }
}
