//! ntfy.sh push notification adapter.
//!
//! Endpoint: POST {server}/{channel}
//! Body: message text; title, tags and actions travel as headers.

use async_trait::async_trait;
use reqwest::header::HeaderValue;
use tracing::{debug, warn};

use super::{ensure_success, AdapterError, PushNotification, PushNotifier};

const INTEGRATION: &str = "ntfy";

/// ntfy publisher for one channel
pub struct NtfyClient {
    endpoint: String,
    client: reqwest::Client,
}

impl NtfyClient {
    pub fn new(server: &str, channel: &str, client: reqwest::Client) -> Self {
        Self {
            endpoint: format!("{}/{}", server.trim_end_matches('/'), channel),
            client,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// `view, <label>, <url>` entries joined with `; `
fn actions_header(notification: &PushNotification) -> Option<String> {
    if notification.actions.is_empty() {
        return None;
    }
    let actions: Vec<String> = notification
        .actions
        .iter()
        .map(|a| format!("view, {}, {}", a.label, a.url))
        .collect();
    Some(actions.join("; "))
}

/// Header values must be visible ASCII; anything else is dropped
fn header_value(name: &str, value: &str) -> Option<HeaderValue> {
    match HeaderValue::from_str(value) {
        Ok(value) if value.to_str().is_ok() => Some(value),
        _ => {
            warn!(header = name, "Dropping non-ASCII notification header");
            None
        }
    }
}

#[async_trait]
impl PushNotifier for NtfyClient {
    async fn push(&self, notification: &PushNotification) -> Result<(), AdapterError> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .body(notification.message.clone());

        if let Some(title) = notification
            .title
            .as_deref()
            .and_then(|t| header_value("Title", t))
        {
            request = request.header("Title", title);
        }
        if !notification.tags.is_empty() {
            if let Some(tags) = header_value("Tags", &notification.tags.join(",")) {
                request = request.header("Tags", tags);
            }
        }
        if let Some(actions) = actions_header(notification)
            .as_deref()
            .and_then(|a| header_value("Actions", a))
        {
            request = request.header("Actions", actions);
        }

        let response = request
            .send()
            .await
            .map_err(AdapterError::http(INTEGRATION))?;
        ensure_success(INTEGRATION, response).await?;

        debug!(endpoint = %self.endpoint, "Sent push notification");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint() {
        let client = NtfyClient::new("https://ntfy.sh/", "my-inbox", reqwest::Client::new());
        assert_eq!(client.endpoint(), "https://ntfy.sh/my-inbox");
    }

    #[test]
    fn test_actions_header() {
        let n = PushNotification::new("m")
            .with_action("Open task", "https://a")
            .with_action("Open list", "https://b");
        assert_eq!(
            actions_header(&n).as_deref(),
            Some("view, Open task, https://a; view, Open list, https://b")
        );
        assert_eq!(actions_header(&PushNotification::new("m")), None);
    }

    #[test]
    fn test_non_ascii_header_is_dropped() {
        assert!(header_value("Title", "New task").is_some());
        assert!(header_value("Title", "Lista zakupów").is_none());
    }
}
