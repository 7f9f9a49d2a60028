mod ffmpeg;

pub use ffmpeg::FfmpegDecoder;

use async_trait::async_trait;
use thiserror::Error;

/// Failures of the decoding facility itself. None of these say anything
/// about whether the stream carries audio.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("failed to start decoder {program}: {reason}")]
    Spawn { program: String, reason: String },
    #[error("decoder exited with {code}: {stderr}")]
    Exited { code: String, stderr: String },
    #[error("decoder timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u128 },
    #[error("decoder produced no samples")]
    NoSamples,
    #[error("decoder I/O error: {0}")]
    Io(String),
}

/// Mono 16-bit PCM decoded from a short slice of a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSample {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

impl AudioSample {
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Interpret raw `s16le` bytes. A trailing odd byte is dropped.
    pub fn from_le_bytes(bytes: &[u8], sample_rate: u32) -> Self {
        let samples = bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Self::new(samples, sample_rate)
    }

    pub fn peak_level(&self) -> u32 {
        peak_level(&self.samples)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Loudness proxy: `round(mean(|sample|) * 2)`.
///
/// This is a scaled mean absolute amplitude, not a true peak; silence
/// thresholds are calibrated against exactly this formula.
pub fn peak_level(samples: &[i16]) -> u32 {
    if samples.is_empty() {
        return 0;
    }
    let sum: u64 = samples.iter().map(|s| s.unsigned_abs() as u64).sum();
    let mean = sum as f64 / samples.len() as f64;
    (mean * 2.0).round() as u32
}

/// Pulls a short audio sample from a stream URL and decodes it to PCM.
#[async_trait]
pub trait AudioDecoder: Send + Sync {
    async fn decode(&self, url: &str) -> Result<AudioSample, DecodeError>;
}
