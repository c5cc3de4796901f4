//! Error taxonomy shared by every component.
//!
//! The broker reports failures on two surfaces: immediate-failure receipts
//! and completion events carry an [`ErrorCode`]; misuse of the host façade
//! (use before initialize / after shutdown) surfaces as a [`BrokerError`].

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable error codes rendered as `PREFIX####`.
///
/// This is the closed set used by the core; receipts and completion events
/// never carry anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// `OWN2001` - ownership conflict or operation by a non-owner.
    OwnershipConflict,
    /// `ARG3001` - illegal state transition or invalid configuration value.
    IllegalTransition,
    /// `ARG3002` - use before initialize / after shutdown.
    NotInitialized,
    /// `CT0001` - caller-cancelled or scheduler shutdown.
    Cancelled,
    /// `CT0002` - per-operation timeout.
    Timeout,
    /// `HW1001` - the hardware adapter raised an unexpected fault.
    HardwareFault,
}

impl ErrorCode {
    /// Stable wire rendering of this code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::OwnershipConflict => "OWN2001",
            Self::IllegalTransition => "ARG3001",
            Self::NotInitialized => "ARG3002",
            Self::Cancelled => "CT0001",
            Self::Timeout => "CT0002",
            Self::HardwareFault => "HW1001",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Errors raised at the host façade boundary.
///
/// Everything else in the library flows through receipts and completion
/// events rather than `Result` values.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The host has not been initialized, or has been shut down.
    #[error("ARG3002: host not initialized or already shut down")]
    NotInitialized,
    /// Every pre-registered resource already has an owner.
    #[error("OWN2001: no free camera available")]
    NoFreeCamera,
    /// The supplied options failed validation.
    #[error("ARG3001: invalid options: {0}")]
    InvalidOptions(String),
    /// Runtime construction failed during initialization.
    #[error("runtime setup failed: {0}")]
    Runtime(#[from] std::io::Error),
}

impl BrokerError {
    /// The taxonomy code behind this error, when one applies.
    #[must_use]
    pub const fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::NotInitialized => Some(ErrorCode::NotInitialized),
            Self::NoFreeCamera => Some(ErrorCode::OwnershipConflict),
            Self::InvalidOptions(_) => Some(ErrorCode::IllegalTransition),
            Self::Runtime(_) => None,
        }
    }
}

/// Result alias for façade-level operations.
pub type BrokerResult<T> = Result<T, BrokerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_rendering() {
        assert_eq!(ErrorCode::OwnershipConflict.code(), "OWN2001");
        assert_eq!(ErrorCode::IllegalTransition.code(), "ARG3001");
        assert_eq!(ErrorCode::NotInitialized.code(), "ARG3002");
        assert_eq!(ErrorCode::Cancelled.code(), "CT0001");
        assert_eq!(ErrorCode::Timeout.code(), "CT0002");
        assert_eq!(ErrorCode::HardwareFault.code(), "HW1001");
    }

    #[test]
    fn test_display_matches_code() {
        assert_eq!(format!("{}", ErrorCode::Timeout), "CT0002");
    }

    #[test]
    fn test_broker_error_codes() {
        assert_eq!(
            BrokerError::NoFreeCamera.code(),
            Some(ErrorCode::OwnershipConflict)
        );
        assert_eq!(
            BrokerError::NotInitialized.code(),
            Some(ErrorCode::NotInitialized)
        );
        assert!(BrokerError::Runtime(std::io::Error::other("boom"))
            .code()
            .is_none());
    }
}
