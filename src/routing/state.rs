//! Routing FSM States
//!
//! `Resolving → {SingleLocal | SingleRemote | MixedDebitPending} →
//! {Committed | RolledBack | Failed}`. States live only inside one call.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteState {
    /// Classifying sender and receiver
    Resolving,

    /// Both sides on the local ledger
    SingleLocal,

    /// Both sides on the legacy money server
    SingleRemote,

    /// Mixed path: sender's side debited, receiver's side not yet credited.
    /// Must end in `Committed` or `RolledBack`, or be reported for reconciliation.
    MixedDebitPending,

    /// Terminal: money moved
    Committed,

    /// Terminal: first leg applied, compensated after the second leg failed
    RolledBack,

    /// Terminal: nothing applied, or compensation failed
    Failed,
}

impl RouteState {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RouteState::Committed | RouteState::RolledBack | RouteState::Failed
        )
    }

    /// Funds have left one side and not arrived at the other
    #[inline]
    pub fn is_in_flight(&self) -> bool {
        matches!(self, RouteState::MixedDebitPending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RouteState::Resolving => "RESOLVING",
            RouteState::SingleLocal => "SINGLE_LOCAL",
            RouteState::SingleRemote => "SINGLE_REMOTE",
            RouteState::MixedDebitPending => "MIXED_DEBIT_PENDING",
            RouteState::Committed => "COMMITTED",
            RouteState::RolledBack => "ROLLED_BACK",
            RouteState::Failed => "FAILED",
        }
    }

    /// Whether the FSM permits `self → next`
    pub fn can_transition_to(&self, next: RouteState) -> bool {
        use RouteState::*;
        matches!(
            (self, next),
            (Resolving, SingleLocal | SingleRemote | MixedDebitPending | Failed)
                | (SingleLocal | SingleRemote, Committed | Failed)
                | (MixedDebitPending, Committed | RolledBack | Failed)
        )
    }
}

impl fmt::Display for RouteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
