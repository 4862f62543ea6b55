//! Routing Types
//!
//! Requests, results and the failure taxonomy returned to callers.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::backend::{BackendError, TransferContext};
use crate::core_types::{AccountId, Amount, TransactionKind};

/// Correlation id of one routed transfer (logs only, never persisted)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransferId(ulid::Ulid);

impl TransferId {
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }

    pub fn inner(&self) -> ulid::Ulid {
        self.0
    }
}

impl Default for TransferId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TransferId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(ulid::Ulid::from_string(s)?))
    }
}

/// A request to move `amount` from `sender` to `receiver`
#[derive(Debug, Clone, PartialEq)]
pub struct TransferRequest {
    pub sender: AccountId,
    pub receiver: AccountId,
    pub amount: Amount,
    pub context: TransferContext,
}

impl TransferRequest {
    pub fn new(sender: AccountId, receiver: AccountId, amount: Amount, context: TransferContext) -> Self {
        Self {
            sender,
            receiver,
            amount,
            context,
        }
    }

    pub fn kind(&self) -> TransactionKind {
        self.context.kind
    }
}

/// Why a transfer did not complete
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    #[error("Account is unknown to the backend")]
    AccountUnknown,

    #[error("Authorization failed")]
    AuthorizationFailure,

    /// Timeout, unreachable backend or refused operation
    #[error("Backend failure")]
    BackendFailure,

    /// One leg of a mixed transfer was applied and the other was not
    #[error("Partial failure (compensated: {compensated})")]
    PartialFailure { compensated: bool },

    #[error("External legacy calls are administratively disabled")]
    AdministrativelyDisabled,

    #[error("Insufficient funds")]
    InsufficientFunds,

    #[error("Invalid transfer request")]
    InvalidRequest,
}

impl FailureReason {
    pub fn code(&self) -> &'static str {
        match self {
            FailureReason::AccountUnknown => "ACCOUNT_UNKNOWN",
            FailureReason::AuthorizationFailure => "AUTHORIZATION_FAILURE",
            FailureReason::BackendFailure => "BACKEND_FAILURE",
            FailureReason::PartialFailure { compensated: true } => "PARTIAL_FAILURE_COMPENSATED",
            FailureReason::PartialFailure { compensated: false } => "PARTIAL_FAILURE_UNCOMPENSATED",
            FailureReason::AdministrativelyDisabled => "ADMINISTRATIVELY_DISABLED",
            FailureReason::InsufficientFunds => "INSUFFICIENT_FUNDS",
            FailureReason::InvalidRequest => "INVALID_REQUEST",
        }
    }

    /// Whether money may have moved on one side without the other
    pub fn needs_reconciliation(&self) -> bool {
        matches!(self, FailureReason::PartialFailure { compensated: false })
    }
}

impl From<&BackendError> for FailureReason {
    fn from(e: &BackendError) -> Self {
        match e {
            BackendError::NotFound(_) => FailureReason::AccountUnknown,
            BackendError::Unauthorized(_) | BackendError::NoSession(_) => {
                FailureReason::AuthorizationFailure
            }
            BackendError::Disabled => FailureReason::AdministrativelyDisabled,
            BackendError::ReversalFailed(_) => FailureReason::PartialFailure { compensated: false },
            BackendError::Timeout
            | BackendError::Unreachable(_)
            | BackendError::Rejected(_)
            | BackendError::Protocol(_)
            | BackendError::NotConfigured => FailureReason::BackendFailure,
        }
    }
}

impl From<BackendError> for FailureReason {
    fn from(e: BackendError) -> Self {
        FailureReason::from(&e)
    }
}

/// Outcome of a routed transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferResult {
    pub success: bool,
    pub reason: Option<FailureReason>,
}

impl TransferResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            reason: None,
        }
    }

    pub fn failed(reason: FailureReason) -> Self {
        Self {
            success: false,
            reason: Some(reason),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }
}

impl fmt::Display for TransferResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason {
            None => write!(f, "OK"),
            Some(reason) => write!(f, "FAILED({})", reason.code()),
        }
    }
}
