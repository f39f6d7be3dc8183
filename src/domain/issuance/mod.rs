//! Credential issuance guard.
//!
//! Quota rules that run before blinded credentials are signed, and the
//! duplicate-submission decision for time-limited-v2 batches.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{OrderId, OrderItemId, Timestamp};
use crate::domain::order::{CredentialType, Order, OrderError, OrderItem};

/// Batches of time-limited-v2 credentials an item may hold per window.
pub const MAX_TLV2_BATCHES: i64 = 10;

/// Whether a first blinded credential has been submitted before.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CredSubmissionReport {
    pub submitted: bool,
    /// Submitted under a different request id.
    pub req_id_mismatch: bool,
}

/// One row of the time-limited-v2 submission log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tlv2Submission {
    pub order_id: OrderId,
    pub item_id: OrderItemId,
    pub request_id: String,
    pub valid_from: Timestamp,
    pub valid_to: Timestamp,
    pub first_blinded_cred: String,
    pub blinded_creds: Vec<String>,
}

/// Checks a request for `n_creds` blinded credentials against the item's quota.
pub fn check_num_blinded_creds(order: &Order, item: &OrderItem, n_creds: usize) -> Result<(), OrderError> {
    let requested = i64::try_from(n_creds).unwrap_or(i64::MAX);

    match item.credential_type {
        CredentialType::TimeLimited => Ok(()),
        CredentialType::SingleUse => {
            if requested > i64::from(item.quantity) {
                return Err(OrderError::InvalidNCredsSingleUse);
            }
            Ok(())
        }
        CredentialType::TimeLimitedV2 => {
            let per_interval = order.metadata.num_per_interval()?;
            let intervals = order.metadata.num_intervals()?;

            if requested > per_interval.saturating_mul(intervals) {
                return Err(OrderError::InvalidNCredsTlv2);
            }
            Ok(())
        }
    }
}

/// Decides whether a new time-limited-v2 batch may be signed.
///
/// `batches_in_window` is the number of distinct batches the item already
/// holds in the requested window.
pub fn check_tlv2_batch(
    item: &OrderItem,
    report: CredSubmissionReport,
    batches_in_window: i64,
) -> Result<(), OrderError> {
    if item.credential_type != CredentialType::TimeLimitedV2 {
        return Err(OrderError::UnsupportedCredType);
    }

    if report.submitted {
        if report.req_id_mismatch {
            return Err(OrderError::CredsAlreadySubmittedMismatch);
        }
        return Err(OrderError::CredsAlreadySubmitted);
    }

    if batches_in_window >= MAX_TLV2_BATCHES {
        return Err(OrderError::CredsAlreadyExist);
    }

    Ok(())
}
