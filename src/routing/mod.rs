//! Transaction Routing
//!
//! Moves money between accounts that may live on different backends.
//!
//! # State Machine
//!
//! ```text
//! RESOLVING → SINGLE_LOCAL ────────┐
//!     │     → SINGLE_REMOTE ───────┼──→ COMMITTED
//!     │     → MIXED_DEBIT_PENDING ─┘
//!     │              │
//!     │              ├──→ ROLLED_BACK   (second leg failed, compensated)
//!     ↓              ↓
//!   FAILED ←─────────┘                  (compensation failed)
//! ```
//!
//! # Invariants
//!
//! 1. **Zero is a no-op**: `amount == 0` succeeds without contacting any backend
//! 2. **Debit first**: a mixed transfer never credits before the sender's side is debited
//! 3. **Compensate once**: a failed second leg gets exactly one compensating credit
//! 4. **No persistence**: route state lives only inside one call

pub mod balance;
pub mod resolver;
pub mod router;
pub mod state;
pub mod types;


pub use balance::BalanceResolver;
pub use resolver::AccountResolver;
pub use router::TransactionRouter;
pub use state::RouteState;
pub use types::{FailureReason, TransferId, TransferRequest, TransferResult};
