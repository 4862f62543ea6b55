//! In-process handlers for legacy money-server operations
//!
//! These are the same handlers an RPC listener in this process would invoke.
//! The loopback guard calls them directly when the configured money server is
//! this process.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::wire::{
    LegacyOp, LegacyParams, LegacyResponse, param_account, param_int, param_str,
};
use crate::backend::{MoneyBackend, TransferContext};
use crate::core_types::{AccountId, Amount, TransactionKind};

/// Where an operation goes when dispatched in-process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalRoute {
    /// Session lifecycle: nothing to do locally
    SyntheticSuccess,
    Balance,
    MoveMoney,
    Acknowledge,
    /// No local handler; answered with an error response
    Unrouted,
}

impl LocalRoute {
    pub fn for_op(op: LegacyOp) -> Self {
        match op {
            LegacyOp::ClientLogin | LegacyOp::ClientLogout => LocalRoute::SyntheticSuccess,
            LegacyOp::GetBalance => LocalRoute::Balance,
            LegacyOp::TransferMoney
            | LegacyOp::ForceTransferMoney
            | LegacyOp::PayMoneyCharge
            | LegacyOp::AddBankerMoney
            | LegacyOp::SendMoney
            | LegacyOp::MoveMoney => LocalRoute::MoveMoney,
            LegacyOp::OnMoneyTransfered | LegacyOp::UpdateBalance | LegacyOp::UserAlert => {
                LocalRoute::Acknowledge
            }
            LegacyOp::GetCurrencyQuote | LegacyOp::BuyCurrency => LocalRoute::Unrouted,
        }
    }
}

#[async_trait]
pub trait LocalMoneyHandlers: Send + Sync {
    /// `GetBalance {clientUUID, ..}` → `clientBalance`
    async fn get_balance(&self, params: &LegacyParams) -> LegacyResponse;

    /// Transfer-family operations
    async fn move_money(&self, op: LegacyOp, params: &LegacyParams) -> LegacyResponse;

    /// Notifications that need no work here
    async fn acknowledge(&self, op: LegacyOp, _params: &LegacyParams) -> LegacyResponse {
        debug!(method = %op, "Acknowledged locally");
        LegacyResponse::ok()
    }
}

/// Route one operation to the handler table
pub async fn dispatch(
    handlers: &dyn LocalMoneyHandlers,
    op: LegacyOp,
    params: &LegacyParams,
) -> LegacyResponse {
    match LocalRoute::for_op(op) {
        LocalRoute::SyntheticSuccess => LegacyResponse::ok(),
        LocalRoute::Balance => handlers.get_balance(params).await,
        LocalRoute::MoveMoney => handlers.move_money(op, params).await,
        LocalRoute::Acknowledge => handlers.acknowledge(op, params).await,
        LocalRoute::Unrouted => {
            LegacyResponse::error(format!("No local handler for method {}", op))
        }
    }
}

/// Handlers that serve legacy operations out of a money backend
pub struct LedgerBackedHandlers {
    backend: Arc<dyn MoneyBackend>,
}

impl LedgerBackedHandlers {
    pub fn new(backend: Arc<dyn MoneyBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl LocalMoneyHandlers for LedgerBackedHandlers {
    async fn get_balance(&self, params: &LegacyParams) -> LegacyResponse {
        let account = param_account(params, "clientUUID");
        if account.is_system() {
            return LegacyResponse::error("clientUUID is missing");
        }

        match self.backend.query_balance(account).await {
            Ok(balance) => LegacyResponse::ok().with("clientBalance", balance),
            Err(e) => {
                warn!(account = %account, error = %e, "Local balance lookup failed");
                LegacyResponse::error(e.to_string())
            }
        }
    }

    async fn move_money(&self, op: LegacyOp, params: &LegacyParams) -> LegacyResponse {
        let (from, to) = match op {
            LegacyOp::AddBankerMoney => (AccountId::SYSTEM, param_account(params, "bankerID")),
            _ => (
                param_account(params, "senderID"),
                param_account(params, "receiverID"),
            ),
        };

        let Some(amount) = param_int(params, "amount").and_then(|a| Amount::try_from(a).ok())
        else {
            return LegacyResponse::error("amount is missing or negative");
        };
        if from.is_system() && to.is_system() {
            return LegacyResponse::error("sender and receiver are both missing");
        }

        let kind = param_int(params, "transactionType")
            .and_then(|c| i32::try_from(c).ok())
            .map(TransactionKind::from_code)
            .unwrap_or_default();
        let description = param_str(params, "description").unwrap_or(op.method_name());
        let ctx = TransferContext::new(kind, description);

        let result = if amount == 0 {
            Ok(())
        } else if from.is_system() {
            self.backend.credit(to, amount, &ctx).await
        } else if to.is_system() {
            self.backend.debit(from, amount, &ctx).await
        } else {
            self.backend.transfer(from, to, amount, &ctx).await
        };

        match result {
            Ok(()) => {
                debug!(method = %op, from = %from, to = %to, amount, "Local money move applied");
                LegacyResponse::ok()
            }
            Err(e) => {
                warn!(method = %op, from = %from, to = %to, amount, error = %e, "Local money move failed");
                LegacyResponse::error(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use crate::legacy::wire::LegacyRequest;

    fn handlers_with(alice: AccountId, bob: AccountId) -> (Arc<MockBackend>, LedgerBackedHandlers) {
        let backend = Arc::new(
            MockBackend::ledger()
                .with_account(alice, 500)
                .with_account(bob, 100),
        );
        let handlers = LedgerBackedHandlers::new(backend.clone());
        (backend, handlers)
    }

    #[test]
    fn test_route_table() {
        assert_eq!(LocalRoute::for_op(LegacyOp::ClientLogin), LocalRoute::SyntheticSuccess);
        assert_eq!(LocalRoute::for_op(LegacyOp::GetBalance), LocalRoute::Balance);
        assert_eq!(LocalRoute::for_op(LegacyOp::ForceTransferMoney), LocalRoute::MoveMoney);
        assert_eq!(LocalRoute::for_op(LegacyOp::UserAlert), LocalRoute::Acknowledge);
        assert_eq!(LocalRoute::for_op(LegacyOp::BuyCurrency), LocalRoute::Unrouted);
    }

    #[tokio::test]
    async fn test_dispatch_get_balance() {
        let (alice, bob) = (AccountId::random(), AccountId::random());
        let (_, handlers) = handlers_with(alice, bob);

        let request = LegacyRequest::new(LegacyOp::GetBalance).with("clientUUID", alice);
        let response = dispatch(&handlers, request.op, &request.params).await;
        assert_eq!(response.success(), Ok(true));
        assert_eq!(response.balance(), Some(500));
    }

    #[tokio::test]
    async fn test_dispatch_transfer_between_accounts() {
        let (alice, bob) = (AccountId::random(), AccountId::random());
        let (backend, handlers) = handlers_with(alice, bob);

        let request = LegacyRequest::new(LegacyOp::TransferMoney)
            .with("senderID", alice)
            .with("receiverID", bob)
            .with("amount", 200i64)
            .with("transactionType", 5001);
        let response = dispatch(&handlers, request.op, &request.params).await;

        assert_eq!(response.success(), Ok(true));
        assert_eq!(backend.balance(alice), Some(300));
        assert_eq!(backend.balance(bob), Some(300));
    }

    #[tokio::test]
    async fn test_dispatch_force_transfer_from_system_credits() {
        let (alice, bob) = (AccountId::random(), AccountId::random());
        let (backend, handlers) = handlers_with(alice, bob);

        let request = LegacyRequest::new(LegacyOp::ForceTransferMoney)
            .with("senderID", AccountId::SYSTEM)
            .with("receiverID", bob)
            .with("amount", 50i64);
        let response = dispatch(&handlers, request.op, &request.params).await;

        assert_eq!(response.success(), Ok(true));
        assert_eq!(backend.balance(bob), Some(150));
        assert_eq!(backend.credit_count(), 1);
        assert_eq!(backend.transfer_count(), 0);
    }

    #[tokio::test]
    async fn test_dispatch_failure_is_error_response() {
        let (alice, bob) = (AccountId::random(), AccountId::random());
        let (backend, handlers) = handlers_with(alice, bob);

        let request = LegacyRequest::new(LegacyOp::PayMoneyCharge)
            .with("senderID", alice)
            .with("amount", 900i64);
        let response = dispatch(&handlers, request.op, &request.params).await;

        assert_eq!(response.success(), Ok(false));
        assert!(response.message().is_some());
        assert_eq!(backend.balance(alice), Some(500));
    }

    #[tokio::test]
    async fn test_dispatch_unrouted_and_synthetic() {
        let (alice, bob) = (AccountId::random(), AccountId::random());
        let (backend, handlers) = handlers_with(alice, bob);
        let params = LegacyParams::new();

        let login = dispatch(&handlers, LegacyOp::ClientLogin, &params).await;
        assert_eq!(login.success(), Ok(true));

        let quote = dispatch(&handlers, LegacyOp::GetCurrencyQuote, &params).await;
        assert_eq!(quote.success(), Ok(false));
        assert!(quote.message().unwrap().contains("No local handler"));

        assert_eq!(backend.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_dispatch_rejects_negative_amount() {
        let (alice, bob) = (AccountId::random(), AccountId::random());
        let (backend, handlers) = handlers_with(alice, bob);

        let request = LegacyRequest::new(LegacyOp::MoveMoney)
            .with("senderID", alice)
            .with("receiverID", bob)
            .with("amount", -5i64);
        let response = dispatch(&handlers, request.op, &request.params).await;
        assert_eq!(response.success(), Ok(false));
        assert_eq!(backend.total_calls(), 0);
    }
}
