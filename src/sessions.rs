//! Active client sessions
//!
//! Legacy money-server calls authorize with the caller's session ids (they do
//! not identify the account, the account id travels separately). The registry
//! also keeps the balance reported at login, which is the balance resolver's
//! last-resort answer.

use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use crate::core_types::{AccountId, Balance};

/// Session credentials presented to the legacy money server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionCredentials {
    pub session_id: Uuid,
    pub secure_session_id: Uuid,
}

impl SessionCredentials {
    pub fn new(session_id: Uuid, secure_session_id: Uuid) -> Self {
        Self {
            session_id,
            secure_session_id,
        }
    }
}

#[derive(Debug, Clone)]
struct Session {
    credentials: SessionCredentials,
    login_balance: Option<Balance>,
}

/// Concurrent map of account → live session
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<AccountId, Session>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the session for `account`
    pub fn open(&self, account: AccountId, credentials: SessionCredentials) {
        debug!(account = %account, "Session opened");
        self.sessions.insert(
            account,
            Session {
                credentials,
                login_balance: None,
            },
        );
    }

    /// Record the balance captured when the session started
    pub fn record_login_balance(&self, account: AccountId, balance: Balance) {
        if let Some(mut session) = self.sessions.get_mut(&account) {
            session.login_balance = Some(balance);
        }
    }

    pub fn close(&self, account: AccountId) -> Option<SessionCredentials> {
        debug!(account = %account, "Session closed");
        self.sessions.remove(&account).map(|(_, s)| s.credentials)
    }

    pub fn credentials(&self, account: AccountId) -> Option<SessionCredentials> {
        self.sessions.get(&account).map(|s| s.credentials)
    }

    /// Balance captured at session start, if any
    pub fn cached_balance(&self, account: AccountId) -> Option<Balance> {
        self.sessions.get(&account).and_then(|s| s.login_balance)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
