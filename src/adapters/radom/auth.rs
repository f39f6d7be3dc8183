//! Radom webhook authentication.
//!
//! Radom sends a shared verification token in the `radom-verification-key`
//! header. It is compared in constant time with the configured token.

use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;

use crate::domain::order::OrderError;

pub const RADOM_VERIFICATION_HEADER: &str = "radom-verification-key";

/// Why a Radom webhook was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RadomAuthError {
    #[error("radom: disabled")]
    RadomDisabled,
    #[error("radom: verification key is empty")]
    VerificationKeyEmpty,
    #[error("radom: verification key is invalid")]
    VerificationKeyInvalid,
}

impl From<RadomAuthError> for OrderError {
    fn from(err: RadomAuthError) -> Self {
        OrderError::webhook_auth(err.to_string())
    }
}

#[derive(Clone)]
pub struct RadomAuthenticator {
    enabled: bool,
    token: SecretString,
}

impl RadomAuthenticator {
    pub fn new(enabled: bool, token: SecretString) -> Self {
        Self { enabled, token }
    }

    pub fn authenticate(&self, presented: &str) -> Result<(), RadomAuthError> {
        if !self.enabled {
            return Err(RadomAuthError::RadomDisabled);
        }
        if presented.is_empty() {
            return Err(RadomAuthError::VerificationKeyEmpty);
        }

        let expected = self.token.expose_secret().as_bytes();
        if expected.ct_eq(presented.as_bytes()).unwrap_u8() != 1 {
            return Err(RadomAuthError::VerificationKeyInvalid);
        }
        Ok(())
    }
}
