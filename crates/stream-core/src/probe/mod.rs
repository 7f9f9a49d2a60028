mod http;
mod icy;

pub use http::HttpProbe;
pub use icy::parse_stream_title;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("HTTP error {status} fetching {url}: {reason}")]
    Http {
        url: String,
        status: u16,
        reason: String,
    },
    #[error("Network error fetching {url}: {reason}")]
    Network { url: String, reason: String },
    #[error("Timeout fetching {url}")]
    Timeout { url: String },
}

impl ProbeError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Short cause for the run log, e.g. `404 Not Found`.
    pub fn detail(&self) -> String {
        match self {
            Self::Http { status, reason, .. } => format!("{} {}", status, reason),
            Self::Network { reason, .. } => reason.clone(),
            Self::Timeout { .. } => "request timed out".to_string(),
        }
    }
}

/// Audio encoding declared by the server's `Content-Type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioFormat {
    Mp3,
    Aac,
    Unknown,
}

impl AudioFormat {
    pub fn from_content_type(content_type: &str) -> Self {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "audio/mpeg" => Self::Mp3,
            "audio/aac" => Self::Aac,
            _ => Self::Unknown,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mp3 => write!(f, "mp3"),
            Self::Aac => write!(f, "aac"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Successful probe of a reachable endpoint.
#[derive(Debug, Clone)]
pub struct ProbeResponse {
    pub status: u16,
    pub content_type: String,
    pub format: AudioFormat,
    /// Byte interval between in-stream metadata blocks, if advertised.
    pub meta_interval: Option<usize>,
    pub stream_title: Option<String>,
}

/// Protocol-level reachability check for one stream URL.
///
/// The trait is object-safe and Send + Sync for use across async tasks.
#[async_trait]
pub trait StreamProbe: Send + Sync {
    async fn probe(&self, url: &str) -> Result<ProbeResponse, ProbeError>;
}
