//! Legacy money-server protocol
//!
//! - `wire`: flat key/value requests and responses
//! - `xmlrpc`: XML-RPC encoding of calls and replies
//! - `transport`: network transport (XML-RPC over HTTP)
//! - `handlers`: in-process handler table
//! - `loopback`: routes each call in-process or over the network

pub mod handlers;
pub mod loopback;
pub mod transport;
pub mod wire;
pub mod xmlrpc;

pub use handlers::{LedgerBackedHandlers, LocalMoneyHandlers, LocalRoute};
pub use loopback::LoopbackGuard;
pub use transport::{LegacyTransport, XmlRpcTransport};
pub use wire::{LegacyOp, LegacyParams, LegacyRequest, LegacyResponse, LegacyValue};
