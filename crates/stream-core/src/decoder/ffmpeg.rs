use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::{AudioDecoder, AudioSample, DecodeError};

const STDERR_LIMIT: usize = 512;

/// Decodes a stream slice by running the `ffmpeg` binary to mono `s16le`.
#[derive(Debug, Clone)]
pub struct FfmpegDecoder {
    ffmpeg_path: String,
    sample_rate: u32,
    duration: Duration,
    timeout: Duration,
}

impl FfmpegDecoder {
    pub fn new(
        ffmpeg_path: impl Into<String>,
        sample_rate: u32,
        duration: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            sample_rate,
            duration,
            timeout,
        }
    }

    pub fn from_config(config: &crate::config::CheckerConfig) -> Self {
        Self::new(
            config.ffmpeg_path.clone(),
            config.sample_rate,
            config.sample_duration,
            config.decode_timeout,
        )
    }

    fn args(&self, url: &str) -> Vec<String> {
        vec![
            "-hide_banner".into(),
            "-nostdin".into(),
            "-loglevel".into(),
            "error".into(),
            "-i".into(),
            url.into(),
            "-t".into(),
            format!("{:.3}", self.duration.as_secs_f64()),
            "-f".into(),
            "s16le".into(),
            "-acodec".into(),
            "pcm_s16le".into(),
            "-ac".into(),
            "1".into(),
            "-ar".into(),
            self.sample_rate.to_string(),
            "-y".into(),
            "-".into(),
        ]
    }
}

impl Default for FfmpegDecoder {
    fn default() -> Self {
        Self::new("ffmpeg", 16_000, Duration::from_secs(1), Duration::from_secs(15))
    }
}

#[async_trait]
impl AudioDecoder for FfmpegDecoder {
    async fn decode(&self, url: &str) -> Result<AudioSample, DecodeError> {
        let mut cmd = Command::new(&self.ffmpeg_path);
        cmd.args(self.args(url))
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| DecodeError::Spawn {
            program: self.ffmpeg_path.clone(),
            reason: e.to_string(),
        })?;

        // Dropping the future on timeout kills the child.
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| DecodeError::Timeout {
                timeout_ms: self.timeout.as_millis(),
            })?
            .map_err(|e| DecodeError::Io(e.to_string()))?;

        if !output.status.success() {
            let code = output
                .status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr: String = stderr.trim().chars().take(STDERR_LIMIT).collect();
            return Err(DecodeError::Exited { code, stderr });
        }

        let sample = AudioSample::from_le_bytes(&output.stdout, self.sample_rate);
        if sample.is_empty() {
            return Err(DecodeError::NoSamples);
        }
        debug!(url, samples = sample.samples.len(), "Decoded audio sample");
        Ok(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoder(path: &str, timeout: Duration) -> FfmpegDecoder {
        FfmpegDecoder::new(path, 16_000, Duration::from_secs(1), timeout)
    }

    #[test]
    fn args_request_mono_pcm_at_rate() {
        let decoder = decoder("ffmpeg", Duration::from_secs(5));
        let args = decoder.args("http://icecast:8000/breeze-bath-src");
        let joined = args.join(" ");
        assert!(joined.contains("-i http://icecast:8000/breeze-bath-src"));
        assert!(joined.contains("-t 1.000"));
        assert!(joined.contains("-f s16le -acodec pcm_s16le -ac 1 -ar 16000"));
        assert_eq!(args.last().map(String::as_str), Some("-"));
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let decoder = decoder("/nonexistent/bin/ffmpeg", Duration::from_secs(5));
        let err = decoder.decode("http://127.0.0.1:1/none").await.unwrap_err();
        assert!(matches!(err, DecodeError::Spawn { .. }), "{:?}", err);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_process_is_an_exit_error() {
        let decoder = decoder("false", Duration::from_secs(5));
        let err = decoder.decode("http://127.0.0.1:1/none").await.unwrap_err();
        assert!(matches!(err, DecodeError::Exited { .. }), "{:?}", err);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn empty_output_is_no_samples() {
        let decoder = decoder("true", Duration::from_secs(5));
        let err = decoder.decode("http://127.0.0.1:1/none").await.unwrap_err();
        assert!(matches!(err, DecodeError::NoSamples), "{:?}", err);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn hung_process_times_out() {
        use std::os::unix::fs::PermissionsExt;

        let script = std::env::temp_dir().join(format!(
            "streamchecker-hung-ffmpeg-{}.sh",
            std::process::id()
        ));
        std::fs::write(&script, "#!/bin/sh\nexec sleep 10\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let decoder = decoder(script.to_str().unwrap(), Duration::from_millis(100));
        let started = std::time::Instant::now();
        let err = decoder.decode("http://127.0.0.1:1/none").await.unwrap_err();
        let elapsed = started.elapsed();
        let _ = std::fs::remove_file(&script);

        assert!(
            matches!(err, DecodeError::Timeout { timeout_ms: 100 }),
            "{:?}",
            err
        );
        assert!(elapsed < Duration::from_secs(5), "took {:?}", elapsed);
    }
}
