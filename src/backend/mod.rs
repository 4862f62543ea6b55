//! Money Backends
//!
//! Adapters for the two money systems the router moves balances between:
//! - **Local Ledger** ([`LocalLedgerBackend`]): the deployment's own wallet REST API
//! - **Legacy Protocol** ([`LegacyProtocolBackend`]): the flat key/value money server
//!   used for visiting / federated accounts
//!
//! Every operation is a single awaited round trip bounded by the adapter's
//! timeout. Adapters keep no state beyond their endpoint and credentials.

pub mod ledger;
pub mod legacy;

pub use ledger::LocalLedgerBackend;
pub use legacy::LegacyProtocolBackend;

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::core_types::{AccountId, Amount, Balance, RegionHandle, TransactionKind};

/// Which money system an adapter talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    LocalLedger,
    LegacyProtocol,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::LocalLedger => "LOCAL_LEDGER",
            BackendKind::LegacyProtocol => "LEGACY_PROTOCOL",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether an adapter may be called at all
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Available,
    /// Missing configuration or failed start-up validation
    NotConfigured,
    /// Blocked by operator configuration
    AdministrativelyDisabled,
}

/// Adapter-level failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Definitive "no such account" (distinct from a generic error)
    #[error("Account not found: {0}")]
    NotFound(AccountId),

    #[error("Authorization failed: {0}")]
    Unauthorized(String),

    #[error("No active session for account {0}")]
    NoSession(AccountId),

    #[error("Backend call timed out")]
    Timeout,

    #[error("Backend unreachable: {0}")]
    Unreachable(String),

    #[error("Backend rejected the operation: {0}")]
    Rejected(String),

    #[error("Malformed backend response: {0}")]
    Protocol(String),

    #[error("External legacy calls are administratively disabled")]
    Disabled,

    #[error("Backend is not configured")]
    NotConfigured,

    /// A transfer's debit was applied and undoing it failed; needs reconciliation
    #[error("Reversal of applied debit failed: {0}")]
    ReversalFailed(String),
}

/// Correlation metadata forwarded with every money movement
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferContext {
    pub kind: TransactionKind,
    pub object_id: Option<Uuid>,
    pub object_name: String,
    pub region_handle: RegionHandle,
    pub region_id: Option<Uuid>,
    pub description: String,
}

impl TransferContext {
    pub fn new(kind: TransactionKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
            ..Default::default()
        }
    }

    pub fn with_object(mut self, object_id: Uuid, object_name: impl Into<String>) -> Self {
        self.object_id = Some(object_id);
        self.object_name = object_name.into();
        self
    }

    pub fn with_region(mut self, region_handle: RegionHandle, region_id: Uuid) -> Self {
        self.region_handle = region_handle;
        self.region_id = Some(region_id);
        self
    }

    /// Same correlation, different description (used for individual legs)
    pub fn describe(&self, description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..self.clone()
        }
    }
}

/// Common contract of both money systems
#[async_trait]
pub trait MoneyBackend: Send + Sync {
    /// Backend identity for logging and routing
    fn kind(&self) -> BackendKind;

    fn availability(&self) -> Availability {
        Availability::Available
    }

    /// Remove `amount` from `account`
    async fn debit(
        &self,
        account: AccountId,
        amount: Amount,
        ctx: &TransferContext,
    ) -> Result<(), BackendError>;

    /// Add `amount` to `account`
    async fn credit(
        &self,
        account: AccountId,
        amount: Amount,
        ctx: &TransferContext,
    ) -> Result<(), BackendError>;

    /// Move `amount` between two accounts held by this backend
    async fn transfer(
        &self,
        from: AccountId,
        to: AccountId,
        amount: Amount,
        ctx: &TransferContext,
    ) -> Result<(), BackendError>;

    async fn query_balance(&self, account: AccountId) -> Result<Balance, BackendError>;
}

/// `balance >= amount` without lossy casts
#[inline]
pub fn covers(balance: Balance, amount: Amount) -> bool {
    i128::from(balance) >= i128::from(amount)
}


#[cfg(test)]
pub use mock::MockBackend;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_covers() {
        assert!(covers(500, 200));
        assert!(covers(200, 200));
        assert!(!covers(100, 200));
        assert!(!covers(-1, 0));
        assert!(covers(0, 0));
        assert!(!covers(i64::MAX, u64::MAX));
    }

    #[test]
    fn test_context_describe_keeps_correlation() {
        let object = Uuid::new_v4();
        let ctx = TransferContext::new(TransactionKind::PayObject, "buy chair")
            .with_object(object, "Chair")
            .with_region(42, Uuid::nil());
        let leg = ctx.describe("leg");
        assert_eq!(leg.kind, TransactionKind::PayObject);
        assert_eq!(leg.object_id, Some(object));
        assert_eq!(leg.region_handle, 42);
        assert_eq!(leg.description, "leg");
    }
}
