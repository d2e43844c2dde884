use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, info, warn};

use super::MessageSender;

pub const LINE_PUSH_ENDPOINT: &str = "https://api.line.me/v2/bot/message/push";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Push-message sender for the LINE Messaging API.
pub struct LineSender {
    client: Client,
    endpoint: String,
    token: String,
    recipient: String,
}

impl std::fmt::Debug for LineSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineSender")
            .field("endpoint", &self.endpoint)
            .field("recipient", &self.recipient)
            .finish_non_exhaustive()
    }
}

impl LineSender {
    pub fn new(token: impl Into<String>, recipient: impl Into<String>) -> Self {
        Self::with_endpoint(token, recipient, LINE_PUSH_ENDPOINT)
    }

    /// Like [`LineSender::new`] posting to a different URL.
    pub fn with_endpoint(
        token: impl Into<String>,
        recipient: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                warn!("Falling back to default HTTP client: {e}");
                Client::new()
            });
        Self {
            client,
            endpoint: endpoint.into(),
            token: token.into(),
            recipient: recipient.into(),
        }
    }
}

#[async_trait]
impl MessageSender for LineSender {
    async fn send(&self, text: &str) -> bool {
        if self.token.is_empty() {
            warn!("LINE channel access token is not set");
            return false;
        }
        if self.recipient.is_empty() {
            warn!("LINE recipient is not set");
            return false;
        }
        if text.is_empty() {
            warn!("Refusing to send an empty LINE message");
            return false;
        }

        let body = json!({
            "to": self.recipient,
            "messages": [{ "type": "text", "text": text }],
        });
        let resp = match self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                warn!("LINE push failed: {e}");
                return false;
            }
        };

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            warn!("LINE push rejected ({status}): {detail}");
            return false;
        }

        if let Some(request_id) = resp
            .headers()
            .get("x-line-request-id")
            .and_then(|v| v.to_str().ok())
        {
            debug!("LINE request id {request_id}");
        }
        let preview: String = text.chars().take(50).collect();
        info!("LINE reminder sent: {preview}");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_inputs_short_circuit() {
        // Nothing listens here; every call must return before connecting.
        let endpoint = "http://127.0.0.1:9/push";

        assert!(!LineSender::with_endpoint("", "U1", endpoint).send("hi").await);
        assert!(!LineSender::with_endpoint("tok", "", endpoint).send("hi").await);
        assert!(!LineSender::with_endpoint("tok", "U1", endpoint).send("").await);
    }

    #[test]
    fn debug_hides_token() {
        let sender = LineSender::new("very-secret", "U1");
        let shown = format!("{sender:?}");
        assert!(!shown.contains("very-secret"));
        assert!(shown.contains("U1"));
    }
}
