//! Pub/Sub push envelope carrying a developer notification.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;

use crate::domain::order::OrderError;
use crate::domain::reconciliation::play_store::DeveloperNotification;

#[derive(Debug, Deserialize)]
pub struct PubSubEnvelope {
    pub message: PubSubMessage,
    #[serde(default)]
    pub subscription: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PubSubMessage {
    /// Base64 JSON developer notification.
    pub data: String,
    #[serde(default)]
    pub message_id: String,
}

impl PubSubEnvelope {
    pub fn parse(body: &[u8]) -> Result<Self, OrderError> {
        serde_json::from_slice(body).map_err(|e| OrderError::malformed(format!("pubsub envelope: {}", e)))
    }

    pub fn notification(&self) -> Result<DeveloperNotification, OrderError> {
        let raw = STANDARD
            .decode(self.message.data.trim())
            .map_err(|e| OrderError::malformed(format!("pubsub data: {}", e)))?;
        serde_json::from_slice(&raw).map_err(|e| OrderError::malformed(format!("developer notification: {}", e)))
    }
}
