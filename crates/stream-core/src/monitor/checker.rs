use std::sync::Arc;

use tracing::{debug, warn};

use crate::decoder::AudioDecoder;
use crate::endpoint::Endpoint;
use crate::probe::StreamProbe;

use super::error::CheckFailure;
use super::state::{CheckResult, CheckState, Verdict};

/// Runs the probe → sample → confirm protocol against one endpoint.
pub struct StreamChecker {
    probe: Arc<dyn StreamProbe>,
    decoder: Arc<dyn AudioDecoder>,
    silence_threshold: u32,
}

/// Working record for one check while it moves through the protocol.
struct Attempt {
    state: CheckState,
    url: String,
    content_type: Option<String>,
    stream_title: Option<String>,
    peak: Option<u32>,
    samples_taken: u8,
}

impl Attempt {
    fn advance(&mut self, next: CheckState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid transition {} -> {}",
            self.state,
            next
        );
        debug!(url = %self.url, from = %self.state, to = %next, "Check state");
        self.state = next;
    }
}

impl StreamChecker {
    pub fn new(
        probe: Arc<dyn StreamProbe>,
        decoder: Arc<dyn AudioDecoder>,
        silence_threshold: u32,
    ) -> Self {
        Self {
            probe,
            decoder,
            silence_threshold,
        }
    }

    pub fn silence_threshold(&self) -> u32 {
        self.silence_threshold
    }

    /// Check one endpoint. Never fails: every error becomes a verdict.
    pub async fn check(&self, endpoint: Endpoint) -> CheckResult {
        let mut attempt = Attempt {
            state: CheckState::Start,
            url: endpoint.url.clone(),
            content_type: None,
            stream_title: None,
            peak: None,
            samples_taken: 0,
        };

        let outcome = self.run(&mut attempt).await;

        let (verdict, detail) = match outcome {
            Ok(status) => {
                attempt.advance(CheckState::Ok);
                let detail = match attempt.peak {
                    Some(peak) => format!("{} peak level {}", status, peak),
                    None => status.to_string(),
                };
                (Verdict::Ok, detail)
            }
            Err(failure) => {
                let terminal = match &failure {
                    CheckFailure::Transport(_) => CheckState::Unreachable,
                    CheckFailure::Format { .. } => CheckState::FormatUnknown,
                    CheckFailure::DecodeInfrastructure(_) => CheckState::DecodeWarn,
                    CheckFailure::Silence { .. } => CheckState::Fail,
                };
                attempt.advance(terminal);
                match failure.verdict() {
                    Verdict::Warn => {
                        debug!(url = %attempt.url, error = %failure, "Decoder warning")
                    }
                    _ => warn!(url = %attempt.url, error = %failure, "Stream check failed"),
                }
                (failure.verdict(), failure.to_string())
            }
        };

        let mut result = CheckResult::new(endpoint, verdict, attempt.state, detail);
        result.content_type = attempt.content_type;
        result.stream_title = attempt.stream_title;
        result.peak = attempt.peak;
        result.samples_taken = attempt.samples_taken;
        result
    }

    async fn run(&self, attempt: &mut Attempt) -> Result<u16, CheckFailure> {
        attempt.advance(CheckState::Probing);
        let response = self.probe.probe(&attempt.url).await?;
        attempt.content_type = Some(response.content_type.clone());
        attempt.stream_title = response.stream_title.clone();

        if !response.format.is_known() {
            return Err(CheckFailure::Format {
                content_type: response.content_type,
            });
        }
        debug!(url = %attempt.url, format = %response.format, "We detect format");

        attempt.advance(CheckState::Detecting);
        let first = self.sample(attempt).await?;
        if first >= self.silence_threshold {
            return Ok(response.status);
        }

        debug!(url = %attempt.url, peak = first, "Below silence threshold, double checking");
        attempt.advance(CheckState::SilenceConfirmCheck);
        let second = self.sample(attempt).await?;
        if second < self.silence_threshold {
            return Err(CheckFailure::Silence { peak: second });
        }
        Ok(response.status)
    }

    async fn sample(&self, attempt: &mut Attempt) -> Result<u32, CheckFailure> {
        attempt.samples_taken += 1;
        let sample = self.decoder.decode(&attempt.url).await?;
        let peak = sample.peak_level();
        debug!(url = %attempt.url, peak, attempt = attempt.samples_taken, "Peak");
        attempt.peak = Some(peak);
        Ok(peak)
    }
}
