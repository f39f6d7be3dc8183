//! Response bodies for the webhook endpoints.

use serde::Serialize;

use crate::application::handlers::reconciliation::ReconciliationOutcome;

/// Acknowledgement returned to a vendor after a notification was handled.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct WebhookAck {
    /// `applied` or `skipped`.
    pub status: &'static str,
    pub detail: String,
}

impl From<ReconciliationOutcome> for WebhookAck {
    fn from(outcome: ReconciliationOutcome) -> Self {
        match outcome {
            ReconciliationOutcome::Applied(applied) => Self {
                status: "applied",
                detail: format!("{:?}", applied),
            },
            ReconciliationOutcome::Skipped(reason) => Self {
                status: "skipped",
                detail: reason.to_string(),
            },
        }
    }
}

/// Standard error body.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub error_code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::reconciliation::Applied;

    #[test]
    fn ack_names_the_outcome() {
        let ack = WebhookAck::from(ReconciliationOutcome::Applied(Applied::Renewed));
        assert_eq!(ack.status, "applied");
        assert_eq!(ack.detail, "Renewed");

        let ack = WebhookAck::from(ReconciliationOutcome::Skipped("unhandled event type"));
        assert_eq!(
            serde_json::to_value(&ack).unwrap(),
            serde_json::json!({"status": "skipped", "detail": "unhandled event type"})
        );
    }
}
