//! HandleAppStoreNotificationHandler - Applies an App Store Server Notification v2.

use std::sync::Arc;

use super::apply_intent::{apply_intent, ReconciliationOutcome};
use crate::domain::foundation::Timestamp;
use crate::domain::order::OrderError;
use crate::domain::vendor::Vendor;
use crate::ports::{in_transaction, AppStoreNotificationDecoder, UnitOfWork};

#[derive(Debug, Clone)]
pub struct HandleAppStoreNotificationCommand {
    /// The `signedPayload` JWS as posted by Apple.
    pub signed_payload: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleAppStoreNotificationResult {
    pub notification_type: String,
    pub original_transaction_id: String,
    pub outcome: ReconciliationOutcome,
}

/// Only renewals mutate orders; expiry and auto-renew changes wait for the
/// entitlement window to lapse on its own.
pub struct HandleAppStoreNotificationHandler {
    uow: Arc<dyn UnitOfWork>,
    decoder: Arc<dyn AppStoreNotificationDecoder>,
}

impl HandleAppStoreNotificationHandler {
    pub fn new(uow: Arc<dyn UnitOfWork>, decoder: Arc<dyn AppStoreNotificationDecoder>) -> Self {
        Self { uow, decoder }
    }

    pub async fn handle(
        &self,
        cmd: HandleAppStoreNotificationCommand,
    ) -> Result<HandleAppStoreNotificationResult, OrderError> {
        // 1. Verify and decode
        let notification = self.decoder.decode(&cmd.signed_payload)?;
        let original_transaction_id = notification.transaction.original_transaction_id.clone();

        // 2. Map to an intent
        let intent = match notification.intent(Timestamp::now())? {
            Some(intent) => intent,
            None => {
                tracing::debug!(
                    notification_type = %notification.notification_type,
                    subtype = ?notification.subtype,
                    original_transaction_id = %original_transaction_id,
                    "app store notification skipped"
                );
                return Ok(HandleAppStoreNotificationResult {
                    notification_type: notification.notification_type,
                    original_transaction_id,
                    outcome: ReconciliationOutcome::Skipped("no_order_effect"),
                });
            }
        };

        // 3. Apply
        let applied = in_transaction(self.uow.as_ref(), move |repos| {
            Box::pin(async move { apply_intent(repos, Vendor::AppStore, &intent).await })
        })
        .await?;

        Ok(HandleAppStoreNotificationResult {
            notification_type: notification.notification_type,
            original_transaction_id,
            outcome: ReconciliationOutcome::Applied(applied),
        })
    }
}
