//! Currency Router - routes virtual-world currency transfers between a local
//! wallet ledger and a legacy money server.
//!
//! # Modules
//!
//! - [`core_types`] - Account ids, localities, transaction codes
//! - [`config`] - YAML configuration
//! - [`logging`] - tracing subscriber setup
//! - [`backend`] - Money backend adapters (local ledger, legacy protocol)
//! - [`legacy`] - Legacy wire format, transport, loopback guard
//! - [`regions`] - Regions hosted by this process
//! - [`sessions`] - Live client sessions and login balances
//! - [`routing`] - Account/balance resolution and the transaction router
//! - [`service`] - Wiring from configuration

// Core types - must be first!
pub mod core_types;

pub mod config;
pub mod logging;

pub mod backend;
pub mod legacy;
pub mod regions;
pub mod routing;
pub mod service;
pub mod sessions;

// Convenient re-exports at crate root
pub use backend::{
    Availability, BackendError, BackendKind, LegacyProtocolBackend, LocalLedgerBackend,
    MoneyBackend, TransferContext,
};
pub use core_types::{AccountId, Amount, Balance, Locality, TransactionKind};
pub use routing::{FailureReason, TransactionRouter, TransferRequest, TransferResult};
pub use service::CurrencyService;
