//! Balance Resolver
//!
//! Answers "what is this account's balance" through a fallback chain and
//! never fails outward:
//! 1. local ledger, read by the locality lookup itself
//! 2. legacy money server, unless external legacy calls are disabled (no session → 0)
//! 3. balance cached at session start, else 0

use std::sync::Arc;

use tracing::{debug, warn};

use super::resolver::AccountResolver;
use crate::backend::{Availability, BackendError, MoneyBackend, covers};
use crate::core_types::{AccountId, Amount, Balance};
use crate::sessions::SessionRegistry;

pub struct BalanceResolver {
    legacy: Arc<dyn MoneyBackend>,
    resolver: Arc<AccountResolver>,
    sessions: Arc<SessionRegistry>,
}

impl BalanceResolver {
    pub fn new(
        legacy: Arc<dyn MoneyBackend>,
        resolver: Arc<AccountResolver>,
        sessions: Arc<SessionRegistry>,
    ) -> Self {
        Self {
            legacy,
            resolver,
            sessions,
        }
    }

    pub async fn query_balance(&self, account: AccountId) -> Balance {
        if account.is_system() {
            return 0;
        }

        if let Some(balance) = self.resolver.lookup(account).await.balance {
            return balance;
        }

        if self.legacy.availability() != Availability::AdministrativelyDisabled {
            match self.legacy.query_balance(account).await {
                Ok(balance) => return balance,
                Err(BackendError::NoSession(_)) => {
                    debug!(account = %account, "No session for legacy balance");
                    return 0;
                }
                Err(e) => {
                    warn!(account = %account, error = %e, "Legacy balance failed, using cache");
                }
            }
        }

        self.sessions.cached_balance(account).unwrap_or(0)
    }

    /// Whether `account` currently holds at least `amount`
    pub async fn amount_covered(&self, account: AccountId, amount: Amount) -> bool {
        if account.is_system() || amount == 0 {
            return true;
        }
        covers(self.query_balance(account).await, amount)
    }
}
