//! Transaction Router
//!
//! Classifies both parties, picks a path and drives it to a terminal state:
//! - both local → one ledger transfer
//! - both remote → one legacy transfer
//! - mixed → debit the sender's side, credit the receiver's side, and on
//!   failure of the second leg credit the sender's side back exactly once
//!
//! Nothing is persisted. A failed compensation is logged for manual
//! reconciliation and never retried.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::balance::BalanceResolver;
use super::resolver::{AccountResolver, Resolution};
use super::state::RouteState;
use super::types::{FailureReason, TransferId, TransferRequest, TransferResult};
use crate::backend::{Availability, BackendError, BackendKind, MoneyBackend, TransferContext, covers};
use crate::core_types::{AccountId, Amount, Balance, Locality};
use crate::logging::TRACE_TARGET;
use crate::sessions::SessionRegistry;

/// The single backend operation of a non-mixed path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Leg {
    Transfer,
    /// System sender
    Credit,
    /// System receiver
    Debit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Plan {
    Single { backend: BackendKind, leg: Leg },
    Mixed { debit: BackendKind, credit: BackendKind },
}

fn backend_for(locality: Locality) -> BackendKind {
    if locality.is_local() {
        BackendKind::LocalLedger
    } else {
        BackendKind::LegacyProtocol
    }
}

impl Plan {
    /// The system side never decides the path; the other side does
    fn select(
        sender: AccountId,
        sender_loc: Locality,
        receiver: AccountId,
        receiver_loc: Locality,
    ) -> Self {
        if sender.is_system() {
            return Plan::Single {
                backend: backend_for(receiver_loc),
                leg: Leg::Credit,
            };
        }
        if receiver.is_system() {
            return Plan::Single {
                backend: backend_for(sender_loc),
                leg: Leg::Debit,
            };
        }

        let (from, to) = (backend_for(sender_loc), backend_for(receiver_loc));
        if from == to {
            Plan::Single {
                backend: from,
                leg: Leg::Transfer,
            }
        } else {
            Plan::Mixed {
                debit: from,
                credit: to,
            }
        }
    }

    fn uses(&self, kind: BackendKind) -> bool {
        match *self {
            Plan::Single { backend, .. } => backend == kind,
            Plan::Mixed { debit, credit } => debit == kind || credit == kind,
        }
    }

    /// Backend holding the sender's funds
    fn sender_backend(&self) -> BackendKind {
        match *self {
            Plan::Single { backend, .. } => backend,
            Plan::Mixed { debit, .. } => debit,
        }
    }

    fn state(&self) -> RouteState {
        match *self {
            Plan::Single {
                backend: BackendKind::LocalLedger,
                ..
            } => RouteState::SingleLocal,
            Plan::Single { .. } => RouteState::SingleRemote,
            Plan::Mixed { .. } => RouteState::MixedDebitPending,
        }
    }
}

/// Applied first-leg debit of a mixed transfer.
///
/// Must be consumed by [`PendingCompensation::commit`] or by the compensating credit.
#[must_use]
struct PendingCompensation {
    account: AccountId,
    amount: Amount,
    backend: BackendKind,
}

impl PendingCompensation {
    fn commit(self) {}
}

/// State of one routing attempt
struct Route {
    id: TransferId,
    state: RouteState,
}

impl Route {
    fn new(id: TransferId) -> Self {
        Self {
            id,
            state: RouteState::Resolving,
        }
    }

    fn advance(&mut self, next: RouteState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal route transition {} -> {}",
            self.state,
            next
        );
        debug!(
            target: TRACE_TARGET,
            transfer_id = %self.id,
            from = %self.state,
            to = %next,
            "Route transition"
        );
        self.state = next;
    }

    fn fail(&mut self, reason: FailureReason) -> Step {
        self.advance(RouteState::Failed);
        Step::Done(TransferResult::failed(reason))
    }
}

enum Step {
    Done(TransferResult),
    /// The ledger does not know this account after all; re-plan with it Remote
    Reclassify(AccountId),
}

pub struct TransactionRouter {
    ledger: Arc<dyn MoneyBackend>,
    legacy: Arc<dyn MoneyBackend>,
    resolver: Arc<AccountResolver>,
    balances: BalanceResolver,
}

impl TransactionRouter {
    pub fn new(
        ledger: Arc<dyn MoneyBackend>,
        legacy: Arc<dyn MoneyBackend>,
        sessions: Arc<SessionRegistry>,
    ) -> Self {
        let resolver = Arc::new(AccountResolver::new(ledger.clone()));
        let balances = BalanceResolver::new(legacy.clone(), resolver.clone(), sessions);
        Self {
            ledger,
            legacy,
            resolver,
            balances,
        }
    }

    pub fn resolver(&self) -> &AccountResolver {
        &self.resolver
    }

    /// Balance through the fallback chain; never fails
    pub async fn query_balance(&self, account: AccountId) -> Balance {
        self.balances.query_balance(account).await
    }

    pub async fn amount_covered(&self, account: AccountId, amount: Amount) -> bool {
        self.balances.amount_covered(account, amount).await
    }

    /// Charge `account` (upload fees, group creation, ...): account → system
    pub async fn apply_charge(
        &self,
        account: AccountId,
        amount: Amount,
        context: TransferContext,
    ) -> TransferResult {
        self.transfer(&TransferRequest::new(account, AccountId::SYSTEM, amount, context))
            .await
    }

    /// Pay `account` out of the system: system → account
    pub async fn grant(
        &self,
        account: AccountId,
        amount: Amount,
        context: TransferContext,
    ) -> TransferResult {
        self.transfer(&TransferRequest::new(AccountId::SYSTEM, account, amount, context))
            .await
    }

    /// Route one transfer to a terminal state.
    ///
    /// Not idempotent: submitting the same request twice moves money twice.
    pub async fn transfer(&self, request: &TransferRequest) -> TransferResult {
        let transfer_id = TransferId::new();
        let (sender, receiver) = (request.sender, request.receiver);

        if request.amount == 0 {
            debug!(transfer_id = %transfer_id, sender = %sender, receiver = %receiver, "Zero amount, nothing to move");
            return TransferResult::ok();
        }
        if sender.is_system() && receiver.is_system() {
            warn!(transfer_id = %transfer_id, "Transfer between system accounts rejected");
            return TransferResult::failed(FailureReason::InvalidRequest);
        }

        let mut sender_at = self.locate(sender).await;
        let mut receiver_at = self.locate(receiver).await;
        let mut reclassified = false;

        loop {
            let plan = Plan::select(sender, sender_at.locality, receiver, receiver_at.locality);
            debug!(
                transfer_id = %transfer_id,
                sender = %sender,
                sender_locality = %sender_at.locality,
                receiver = %receiver,
                receiver_locality = %receiver_at.locality,
                amount = request.amount,
                kind = %request.kind(),
                plan = ?plan,
                "Transfer planned"
            );

            let mut route = Route::new(transfer_id);
            match self.execute(&mut route, request, plan, sender_at.balance).await {
                Step::Done(result) => {
                    self.log_outcome(&route, request, result);
                    return result;
                }
                Step::Reclassify(account) if !reclassified => {
                    reclassified = true;
                    warn!(
                        transfer_id = %transfer_id,
                        account = %account,
                        "Ledger does not know account, re-planning as remote"
                    );
                    if account == sender {
                        sender_at = Resolution::remote();
                    }
                    if account == receiver {
                        receiver_at = Resolution::remote();
                    }
                    if account != sender && account != receiver {
                        return TransferResult::failed(FailureReason::AccountUnknown);
                    }
                }
                Step::Reclassify(account) => {
                    warn!(transfer_id = %transfer_id, account = %account, "Account still unknown after re-planning");
                    return TransferResult::failed(FailureReason::AccountUnknown);
                }
            }
        }
    }

    /// The system side resolves `Unknown` without a ledger read; `Plan::select` ignores it
    async fn locate(&self, account: AccountId) -> Resolution {
        self.resolver.lookup(account).await
    }

    fn backend(&self, kind: BackendKind) -> &dyn MoneyBackend {
        match kind {
            BackendKind::LocalLedger => self.ledger.as_ref(),
            BackendKind::LegacyProtocol => self.legacy.as_ref(),
        }
    }

    /// `looked_up` is the sender's ledger balance read while resolving, if any
    async fn execute(
        &self,
        route: &mut Route,
        request: &TransferRequest,
        plan: Plan,
        looked_up: Option<Balance>,
    ) -> Step {
        if plan.uses(BackendKind::LegacyProtocol) {
            match self.legacy.availability() {
                Availability::Available => {}
                Availability::AdministrativelyDisabled => {
                    warn!(
                        transfer_id = %route.id,
                        sender = %request.sender,
                        receiver = %request.receiver,
                        "Transfer needs the legacy money server, which is disabled"
                    );
                    return route.fail(FailureReason::AdministrativelyDisabled);
                }
                Availability::NotConfigured => {
                    warn!(
                        transfer_id = %route.id,
                        sender = %request.sender,
                        receiver = %request.receiver,
                        "Transfer needs the legacy money server, none is configured"
                    );
                    return route.fail(FailureReason::BackendFailure);
                }
            }
        }

        if !request.sender.is_system() {
            let backend = self.backend(plan.sender_backend());
            let balance = match looked_up {
                Some(balance) if backend.kind() == BackendKind::LocalLedger => Ok(balance),
                _ => backend.query_balance(request.sender).await,
            };
            match balance {
                Ok(balance) if !covers(balance, request.amount) => {
                    info!(
                        transfer_id = %route.id,
                        sender = %request.sender,
                        balance,
                        amount = request.amount,
                        "Insufficient funds"
                    );
                    return route.fail(FailureReason::InsufficientFunds);
                }
                Ok(_) => {}
                Err(BackendError::NotFound(account))
                    if backend.kind() == BackendKind::LocalLedger =>
                {
                    return Step::Reclassify(account);
                }
                Err(e) => {
                    warn!(transfer_id = %route.id, sender = %request.sender, error = %e, "Funds check failed");
                    return route.fail(FailureReason::from(e));
                }
            }
        }

        match plan {
            Plan::Single { backend, leg } => self.run_single(route, request, backend, leg).await,
            Plan::Mixed { debit, credit } => self.run_mixed(route, request, debit, credit).await,
        }
    }

    async fn run_single(
        &self,
        route: &mut Route,
        request: &TransferRequest,
        kind: BackendKind,
        leg: Leg,
    ) -> Step {
        route.advance(Plan::Single { backend: kind, leg }.state());

        let backend = self.backend(kind);
        let ctx = &request.context;
        let result = match leg {
            Leg::Transfer => {
                backend
                    .transfer(request.sender, request.receiver, request.amount, ctx)
                    .await
            }
            Leg::Credit => backend.credit(request.receiver, request.amount, ctx).await,
            Leg::Debit => backend.debit(request.sender, request.amount, ctx).await,
        };

        match result {
            Ok(()) => {
                route.advance(RouteState::Committed);
                Step::Done(TransferResult::ok())
            }
            Err(BackendError::NotFound(account)) if kind == BackendKind::LocalLedger => {
                Step::Reclassify(account)
            }
            Err(e) => {
                warn!(transfer_id = %route.id, backend = %kind, error = %e, "Backend refused transfer");
                route.fail(FailureReason::from(e))
            }
        }
    }

    async fn run_mixed(
        &self,
        route: &mut Route,
        request: &TransferRequest,
        debit: BackendKind,
        credit: BackendKind,
    ) -> Step {
        let ctx = &request.context;

        if let Err(e) = self
            .backend(debit)
            .debit(request.sender, request.amount, ctx)
            .await
        {
            if let BackendError::NotFound(account) = e
                && debit == BackendKind::LocalLedger
            {
                return Step::Reclassify(account);
            }
            warn!(transfer_id = %route.id, backend = %debit, error = %e, "Sender-side debit failed, nothing applied");
            return route.fail(FailureReason::from(e));
        }

        route.advance(RouteState::MixedDebitPending);
        let pending = PendingCompensation {
            account: request.sender,
            amount: request.amount,
            backend: debit,
        };

        match self
            .backend(credit)
            .credit(request.receiver, request.amount, ctx)
            .await
        {
            Ok(()) => {
                pending.commit();
                route.advance(RouteState::Committed);
                Step::Done(TransferResult::ok())
            }
            Err(e) => {
                warn!(
                    transfer_id = %route.id,
                    backend = %credit,
                    receiver = %request.receiver,
                    error = %e,
                    "Receiver-side credit failed, compensating sender"
                );
                Step::Done(self.compensate(route, pending, ctx).await)
            }
        }
    }

    /// Exactly one attempt to credit the first-leg debit back
    async fn compensate(
        &self,
        route: &mut Route,
        pending: PendingCompensation,
        ctx: &TransferContext,
    ) -> TransferResult {
        let refund = ctx.describe(format!("Refund: {}", ctx.description));
        match self
            .backend(pending.backend)
            .credit(pending.account, pending.amount, &refund)
            .await
        {
            Ok(()) => {
                route.advance(RouteState::RolledBack);
                TransferResult::failed(FailureReason::PartialFailure { compensated: true })
            }
            Err(e) => {
                route.advance(RouteState::Failed);
                error!(
                    transfer_id = %route.id,
                    account = %pending.account,
                    amount = pending.amount,
                    backend = %pending.backend,
                    error = %e,
                    "RECONCILIATION REQUIRED: compensating credit failed, sender debited without delivery"
                );
                TransferResult::failed(FailureReason::PartialFailure { compensated: false })
            }
        }
    }

    fn log_outcome(&self, route: &Route, request: &TransferRequest, result: TransferResult) {
        match route.state {
            RouteState::Committed => info!(
                transfer_id = %route.id,
                sender = %request.sender,
                receiver = %request.receiver,
                amount = request.amount,
                kind = %request.kind(),
                "Transfer committed"
            ),
            state => info!(
                transfer_id = %route.id,
                sender = %request.sender,
                receiver = %request.receiver,
                amount = request.amount,
                state = %state,
                result = %result,
                "Transfer not completed"
            ),
        }
    }
}
