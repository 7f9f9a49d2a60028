use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response};
use tracing::{debug, warn};

use super::icy::{block_end, parse_stream_title, MAX_META_BLOCK};
use super::{AudioFormat, ProbeError, ProbeResponse, StreamProbe};

/// Headroom read past `icy-metaint` before the block length is known.
const META_READ_SLACK: usize = 255;

/// Title capture is skipped for servers announcing a larger `icy-metaint`.
pub(crate) const MAX_META_INTERVAL: usize = 1024 * 1024;

/// Initial body buffer size; the buffer grows with the chunks actually read.
const INITIAL_READ_CAPACITY: usize = 16 * 1024;

/// HTTP reachability probe that requests ICY metadata interleaving.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: Self::build_client(timeout),
        }
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    pub fn from_config(config: &crate::config::CheckerConfig) -> Self {
        Self::new(config.request_timeout)
    }

    pub fn build_client(timeout: Duration) -> Client {
        Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .user_agent(concat!("streamchecker/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("Failed to build HTTP client")
    }
}

impl Default for HttpProbe {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[async_trait]
impl StreamProbe for HttpProbe {
    async fn probe(&self, url: &str) -> Result<ProbeResponse, ProbeError> {
        debug!(url, "GET");
        let response = self
            .client
            .get(url)
            .header("Icy-MetaData", "1")
            .send()
            .await
            .map_err(|e| classify_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            let reason = status.canonical_reason().unwrap_or("Unknown").to_string();
            warn!(url, status = status.as_u16(), "Stream returned error status");
            return Err(ProbeError::Http {
                url: url.to_string(),
                status: status.as_u16(),
                reason,
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let meta_interval = response
            .headers()
            .get("icy-metaint")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|v| *v > 0);
        let format = AudioFormat::from_content_type(&content_type);
        debug!(url, %format, content_type = %content_type, ?meta_interval, "Stream reachable");

        let stream_title = match meta_interval {
            Some(interval) if interval <= MAX_META_INTERVAL => {
                read_stream_title(url, response, interval).await
            }
            Some(interval) => {
                debug!(url, interval, "icy-metaint too large, skipping title");
                None
            }
            None => None,
        };

        Ok(ProbeResponse {
            status: status.as_u16(),
            content_type,
            format,
            meta_interval,
            stream_title,
        })
    }
}

/// Read far enough into the body to capture one metadata block. Never fails the probe.
async fn read_stream_title(url: &str, mut response: Response, interval: usize) -> Option<String> {
    let mut want = interval.saturating_add(META_READ_SLACK);
    let limit = interval.saturating_add(MAX_META_BLOCK);
    let mut buf: Vec<u8> = Vec::with_capacity(want.min(INITIAL_READ_CAPACITY));

    while buf.len() < want {
        match response.chunk().await {
            Ok(Some(chunk)) => buf.extend_from_slice(&chunk),
            Ok(None) => break,
            Err(e) => {
                debug!(url, error = %e, "Stopped reading stream metadata");
                break;
            }
        }
        if let Some(end) = block_end(&buf, interval) {
            want = want.max(end).min(limit);
        }
    }

    let title = parse_stream_title(&buf, interval);
    if let Some(ref t) = title {
        debug!(url, title = %t, "Stream title");
    }
    title
}

fn classify_error(url: &str, e: reqwest::Error) -> ProbeError {
    if e.is_timeout() {
        warn!(url, "Stream probe timed out");
        ProbeError::Timeout {
            url: url.to_string(),
        }
    } else {
        warn!(url, error = %e, "Stream probe network error");
        ProbeError::Network {
            url: url.to_string(),
            reason: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn probe_returns_format_on_200() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/breeze-bath-96.mp3"))
            .and(header("Icy-MetaData", "1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "audio/mpeg")
                    .set_body_bytes(vec![0u8; 64]),
            )
            .mount(&server)
            .await;

        let probe = HttpProbe::new(Duration::from_secs(5));
        let resp = probe
            .probe(&format!("{}/breeze-bath-96.mp3", server.uri()))
            .await
            .unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.format, AudioFormat::Mp3);
        assert_eq!(resp.meta_interval, None);
        assert_eq!(resp.stream_title, None);
    }

    #[tokio::test]
    async fn probe_reports_unknown_format() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/status.xsl"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "text/html")
                    .set_body_string("<html></html>"),
            )
            .mount(&server)
            .await;

        let probe = HttpProbe::new(Duration::from_secs(5));
        let resp = probe
            .probe(&format!("{}/status.xsl", server.uri()))
            .await
            .unwrap();
        assert_eq!(resp.format, AudioFormat::Unknown);
        assert_eq!(resp.content_type, "text/html");
    }

    #[tokio::test]
    async fn probe_returns_error_on_404() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing-src"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let probe = HttpProbe::new(Duration::from_secs(5));
        let err = probe
            .probe(&format!("{}/missing-src", server.uri()))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some(404));
        assert_eq!(err.detail(), "404 Not Found");
    }

    #[tokio::test]
    async fn probe_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky-src"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let probe = HttpProbe::new(Duration::from_secs(5));
        let err = probe
            .probe(&format!("{}/flaky-src", server.uri()))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some(503));
    }

    #[tokio::test]
    async fn probe_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow-src"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let probe = HttpProbe::new(Duration::from_millis(200));
        let err = probe
            .probe(&format!("{}/slow-src", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::Timeout { .. }), "{:?}", err);
    }

    #[tokio::test]
    async fn probe_fails_on_refused_connection() {
        let probe = HttpProbe::new(Duration::from_secs(2));
        let err = probe.probe("http://127.0.0.1:1/none-src").await.unwrap_err();
        assert!(matches!(err, ProbeError::Network { .. }), "{:?}", err);
        assert_eq!(err.status_code(), None);
    }

    #[tokio::test]
    async fn probe_captures_icy_title() {
        let metaint = 128usize;
        let meta = b"StreamTitle='Breeze - Morning Show';";
        let blocks = meta.len().div_ceil(16);
        let mut body = vec![0x55u8; metaint];
        body.push(blocks as u8);
        body.extend_from_slice(meta);
        body.resize(metaint + 1 + blocks * 16, 0);
        body.extend_from_slice(&[0x55u8; 512]);

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/breeze-bath-48.aac"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "audio/aac")
                    .insert_header("icy-metaint", metaint.to_string().as_str())
                    .set_body_bytes(body),
            )
            .mount(&server)
            .await;

        let probe = HttpProbe::new(Duration::from_secs(5));
        let resp = probe
            .probe(&format!("{}/breeze-bath-48.aac", server.uri()))
            .await
            .unwrap();
        assert_eq!(resp.format, AudioFormat::Aac);
        assert_eq!(resp.meta_interval, Some(metaint));
        assert_eq!(resp.stream_title.as_deref(), Some("Breeze - Morning Show"));
    }

    #[tokio::test]
    async fn short_body_does_not_fail_probe() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/short-96.mp3"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "audio/mpeg")
                    .insert_header("icy-metaint", "16000")
                    .set_body_bytes(vec![0u8; 100]),
            )
            .mount(&server)
            .await;

        let probe = HttpProbe::new(Duration::from_secs(5));
        let resp = probe
            .probe(&format!("{}/short-96.mp3", server.uri()))
            .await
            .unwrap();
        assert_eq!(resp.format, AudioFormat::Mp3);
        assert_eq!(resp.stream_title, None);
    }

    #[tokio::test]
    async fn huge_metaint_skips_title_capture() {
        let server = MockServer::start().await;
        for (mount, metaint) in [
            ("/max-96.mp3", usize::MAX.to_string()),
            ("/huge-96.mp3", "9223372036854775000".to_string()),
        ] {
            Mock::given(method("GET"))
                .and(path(mount))
                .respond_with(
                    ResponseTemplate::new(200)
                        .insert_header("Content-Type", "audio/mpeg")
                        .insert_header("icy-metaint", metaint.as_str())
                        .set_body_bytes(vec![0u8; 256]),
                )
                .mount(&server)
                .await;
        }

        let probe = HttpProbe::new(Duration::from_secs(5));
        for mount in ["/max-96.mp3", "/huge-96.mp3"] {
            let resp = probe
                .probe(&format!("{}{}", server.uri(), mount))
                .await
                .unwrap();
            assert_eq!(resp.format, AudioFormat::Mp3);
            assert!(resp.meta_interval.unwrap() > MAX_META_INTERVAL);
            assert_eq!(resp.stream_title, None);
        }
    }

    #[tokio::test]
    async fn metaint_at_limit_still_reads_body() {
        let body = vec![0u8; 64];
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/edge-96.mp3"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "audio/mpeg")
                    .insert_header("icy-metaint", MAX_META_INTERVAL.to_string().as_str())
                    .set_body_bytes(body),
            )
            .mount(&server)
            .await;

        let probe = HttpProbe::new(Duration::from_secs(5));
        let resp = probe
            .probe(&format!("{}/edge-96.mp3", server.uri()))
            .await
            .unwrap();
        assert_eq!(resp.meta_interval, Some(MAX_META_INTERVAL));
        assert_eq!(resp.stream_title, None);
    }
}
