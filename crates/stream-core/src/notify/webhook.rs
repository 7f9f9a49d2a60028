use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{notification_subject, Notifier, NotifyError};

/// Configuration for a single webhook endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// The URL to POST payloads to.
    pub url: String,

    #[serde(default = "default_webhook_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_webhook_retries")]
    pub max_retries: u32,

    /// Optional HMAC-SHA256 signing secret for the `X-Streamchecker-Signature-256` header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

fn default_webhook_timeout_ms() -> u64 {
    5000
}

fn default_webhook_retries() -> u32 {
    2
}

/// The JSON envelope POSTed to webhook endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookPayload {
    pub version: u8,
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub notification_type: String,
    pub subject: String,
    pub fail_count: usize,
    pub report: String,
}

impl WebhookPayload {
    pub fn new(report: &str, fail_count: usize) -> Self {
        let notification_type = if fail_count > 0 {
            "streams_failed"
        } else {
            "streams_ok"
        };
        Self {
            version: 1,
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            notification_type: notification_type.to_string(),
            subject: notification_subject(fail_count).to_string(),
            fail_count,
            report: report.to_string(),
        }
    }
}

/// POSTs the report to every configured webhook.
pub struct WebhookNotifier {
    webhooks: Vec<WebhookConfig>,
    client: Client,
}

impl WebhookNotifier {
    pub fn new(webhooks: Vec<WebhookConfig>, client: Client) -> Self {
        Self { webhooks, client }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, report: &str, fail_count: usize) -> Result<(), NotifyError> {
        let payload = WebhookPayload::new(report, fail_count);
        let json_bytes =
            serde_json::to_vec(&payload).map_err(|e| NotifyError::Serialize(e.to_string()))?;

        let mut last_error = None;
        for wh in &self.webhooks {
            let timeout = Duration::from_millis(wh.timeout_ms);
            match deliver(
                &self.client,
                &wh.url,
                &json_bytes,
                wh.secret.as_deref(),
                timeout,
                wh.max_retries,
            )
            .await
            {
                Ok(()) => debug!(
                    url = %wh.url,
                    notification_type = %payload.notification_type,
                    "Webhook delivered"
                ),
                Err(e) => {
                    warn!(url = %wh.url, error = %e, "Webhook delivery failed");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

async fn deliver(
    client: &Client,
    url: &str,
    body: &[u8],
    secret: Option<&str>,
    timeout: Duration,
    max_retries: u32,
) -> Result<(), NotifyError> {
    let mut last_error = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let backoff = Duration::from_millis(500 * 2u64.pow(attempt - 1));
            tokio::time::sleep(backoff).await;
        }

        let mut req = client
            .post(url)
            .header("Content-Type", "application/json")
            .header("User-Agent", concat!("streamchecker/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .body(body.to_vec());

        if let Some(secret) = secret {
            let signature = sign_payload(body, secret);
            req = req.header("X-Streamchecker-Signature-256", format!("sha256={}", signature));
        }

        match req.send().await {
            Ok(resp) if resp.status().is_success() => return Ok(()),
            Ok(resp) => {
                let status = resp.status().as_u16();
                let err = NotifyError::Http {
                    url: url.to_string(),
                    status,
                };
                if (400..500).contains(&status) && status != 429 {
                    return Err(err);
                }
                last_error = Some(err);
            }
            Err(e) => {
                last_error = Some(NotifyError::Network {
                    url: url.to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }

    Err(last_error.unwrap_or_else(|| NotifyError::Network {
        url: url.to_string(),
        reason: "no delivery attempt made".to_string(),
    }))
}

fn sign_payload(body: &[u8], secret: &str) -> String {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn webhook(url: String, secret: Option<&str>, max_retries: u32) -> WebhookConfig {
        WebhookConfig {
            url,
            timeout_ms: 2000,
            max_retries,
            secret: secret.map(String::from),
        }
    }

    #[test]
    fn payload_for_failed_run() {
        let payload = WebhookPayload::new("FAIL: [10:00:00] breeze-bath-src 404 Not Found", 2);
        assert_eq!(payload.version, 1);
        assert_eq!(payload.notification_type, "streams_failed");
        assert_eq!(payload.subject, "Streamchecker - Streams FAILED");
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "streams_failed");
        assert_eq!(json["fail_count"], 2);
    }

    #[test]
    fn payload_for_ok_run() {
        let payload = WebhookPayload::new("all good", 0);
        assert_eq!(payload.notification_type, "streams_ok");
        assert_eq!(payload.subject, "Streamchecker - Streams OK");
    }

    #[test]
    fn hmac_signature_is_deterministic() {
        let body = b"test payload";
        let sig1 = sign_payload(body, "my-secret");
        let sig2 = sign_payload(body, "my-secret");
        assert_eq!(sig1, sig2);
        assert!(!sig1.is_empty());

        let sig3 = sign_payload(body, "other-secret");
        assert_ne!(sig1, sig3);
    }

    #[tokio::test]
    async fn delivers_signed_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(header_exists("X-Streamchecker-Signature-256"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = WebhookNotifier::new(
            vec![webhook(format!("{}/hook", server.uri()), Some("k"), 0)],
            Client::new(),
        );
        notifier.notify("report", 1).await.unwrap();
    }

    #[tokio::test]
    async fn client_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = WebhookNotifier::new(
            vec![webhook(format!("{}/hook", server.uri()), None, 2)],
            Client::new(),
        );
        let err = notifier.notify("report", 1).await.unwrap_err();
        assert!(matches!(err, NotifyError::Http { status: 404, .. }), "{:?}", err);
    }

    #[tokio::test]
    async fn server_error_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let notifier = WebhookNotifier::new(
            vec![webhook(format!("{}/hook", server.uri()), None, 1)],
            Client::new(),
        );
        notifier.notify("report", 0).await.unwrap();
    }
}
