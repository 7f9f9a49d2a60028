use thiserror::Error;

use crate::decoder::DecodeError;
use crate::probe::ProbeError;

use super::state::Verdict;

/// Why a single endpoint check did not end in a clean `OK`.
#[derive(Debug, Error)]
pub enum CheckFailure {
    #[error("{}", .0.detail())]
    Transport(#[from] ProbeError),
    #[error("Unknown audio format '{content_type}', cannot check audio is valid.")]
    Format { content_type: String },
    #[error("WARNING ffmpeg {0}")]
    DecodeInfrastructure(#[from] DecodeError),
    #[error("No audio! Peak level {peak}")]
    Silence { peak: u32 },
}

impl CheckFailure {
    pub fn verdict(&self) -> Verdict {
        match self {
            Self::Transport(_) => Verdict::Fail,
            Self::Format { .. } => Verdict::Fail,
            Self::DecodeInfrastructure(_) => Verdict::Warn,
            Self::Silence { .. } => Verdict::Fail,
        }
    }
}
