//! Account Resolver
//!
//! Classifies an account by probing the local ledger. Results are never
//! cached: an account's locality is decided fresh for every request.

use std::sync::Arc;

use tracing::debug;

use crate::backend::{Availability, BackendError, MoneyBackend};
use crate::core_types::{AccountId, Balance, Locality};
use crate::logging::TRACE_TARGET;

/// Outcome of one ledger lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub locality: Locality,
    /// Ledger balance read by the lookup; `Some` only for `Local`
    pub balance: Option<Balance>,
}

impl Resolution {
    pub fn remote() -> Self {
        Self {
            locality: Locality::Remote,
            balance: None,
        }
    }

    fn without_balance(locality: Locality) -> Self {
        Self {
            locality,
            balance: None,
        }
    }
}

pub struct AccountResolver {
    ledger: Arc<dyn MoneyBackend>,
}

impl AccountResolver {
    pub fn new(ledger: Arc<dyn MoneyBackend>) -> Self {
        Self { ledger }
    }

    pub async fn resolve(&self, account: AccountId) -> Locality {
        self.lookup(account).await.locality
    }

    /// Success → `Local`; definitive not-found → `Remote`; anything else → `Unknown`.
    ///
    /// An unavailable ledger resolves everyone `Remote` without probing. The
    /// system account never reaches the ledger.
    pub async fn lookup(&self, account: AccountId) -> Resolution {
        if account.is_system() {
            return Resolution::without_balance(Locality::Unknown);
        }
        if self.ledger.availability() != Availability::Available {
            return Resolution::remote();
        }

        let resolution = match self.ledger.query_balance(account).await {
            Ok(balance) => Resolution {
                locality: Locality::Local,
                balance: Some(balance),
            },
            Err(BackendError::NotFound(_)) => Resolution::remote(),
            Err(e) => {
                debug!(account = %account, error = %e, "Ledger lookup inconclusive");
                Resolution::without_balance(Locality::Unknown)
            }
        };

        debug!(
            target: TRACE_TARGET,
            account = %account,
            locality = %resolution.locality,
            "Account resolved"
        );
        resolution
    }
}
