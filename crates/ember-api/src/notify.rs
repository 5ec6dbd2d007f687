use serde_json::json;
use tracing::{debug, warn};
use uuid::Uuid;

/// Fire-and-forget interface to the push-notification collaborator. Delivery
/// failures are logged and never retried inline — notifications must not
/// block match correctness.
#[derive(Clone)]
pub struct Notifier {
    client: reqwest::Client,
    push_url: Option<String>,
}

impl Notifier {
    pub fn new(push_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            push_url,
        }
    }

    pub fn notify_match(&self, participants: [Uuid; 2], match_id: Uuid) {
        let Some(url) = self.push_url.clone() else {
            debug!("No push endpoint configured, skipping match notification");
            return;
        };

        let client = self.client.clone();
        tokio::spawn(async move {
            let body = json!({
                "event": "match_created",
                "match_id": match_id,
                "user_ids": participants,
            });
            match client.post(&url).json(&body).send().await {
                Ok(resp) if !resp.status().is_success() => {
                    warn!("Push dispatch for match {} returned {}", match_id, resp.status());
                }
                Err(e) => warn!("Push dispatch for match {} failed: {}", match_id, e),
                _ => {}
            }
        });
    }
}
