//! Local Ledger Adapter
//!
//! Talks to the wallet REST API over HTTP:
//! - `GET  {base}{uuid}?consumer_key=..&consumer_secret=..` → `{"data": "<decimal>"}`
//! - `PUT  {base}{uuid}` with a JSON body carrying `amount` and `action`
//!
//! Status 404 is a definitive "no such account", which the router relies on to
//! classify visiting accounts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use serde_json::Value;
use std::str::FromStr;
use tracing::{debug, error, info, warn};

use super::{Availability, BackendError, BackendKind, MoneyBackend, TransferContext};
use crate::config::LedgerConfig;
use crate::core_types::{AccountId, Amount, Balance};

/// Direction of a wallet update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletAction {
    Credit,
    Debit,
}

impl WalletAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletAction::Credit => "credit",
            WalletAction::Debit => "debit",
        }
    }
}

/// PUT body understood by the wallet API
#[derive(Debug, Serialize)]
struct WalletUpdate<'a> {
    amount: Amount,
    action: WalletAction,
    consumer_key: &'a str,
    consumer_secret: &'a str,
    transaction_detail: &'a str,
    payment_method: &'a str,
    note: String,
}

pub struct LocalLedgerBackend {
    config: LedgerConfig,
    client: reqwest::Client,
    /// Result of the last `validate()`; optimistic until checked
    valid: AtomicBool,
}

impl LocalLedgerBackend {
    pub fn new(config: LedgerConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| BackendError::Unreachable(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            client,
            valid: AtomicBool::new(true),
        })
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    fn is_configured(&self) -> bool {
        self.config.enabled && !self.config.base_url.is_empty()
    }

    fn base_url(&self) -> String {
        if self.config.base_url.ends_with('/') {
            self.config.base_url.clone()
        } else {
            format!("{}/", self.config.base_url)
        }
    }

    fn account_url(&self, account: AccountId) -> String {
        format!("{}{}", self.base_url(), account)
    }

    fn credentials(&self) -> [(&str, &str); 2] {
        [
            ("consumer_key", self.config.consumer_key.as_str()),
            ("consumer_secret", self.config.consumer_secret.as_str()),
        ]
    }

    /// Check the API once at start-up and remember the outcome.
    ///
    /// 2xx → valid; 401 or 404 → invalid; any other status → valid; no
    /// response at all → invalid.
    pub async fn validate(&self) -> bool {
        if !self.is_configured() {
            self.valid.store(false, Ordering::SeqCst);
            return false;
        }

        let url = format!("{}users", self.base_url());
        let valid = match self.client.get(&url).query(&self.credentials()).send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    info!("Ledger configuration validated");
                    true
                } else if status == StatusCode::UNAUTHORIZED {
                    let body = response.text().await.unwrap_or_default();
                    error!(body = %body, "Ledger rejected consumer credentials");
                    false
                } else {
                    warn!(status = %status, "Ledger validation endpoint returned non-success");
                    status != StatusCode::NOT_FOUND
                }
            }
            Err(e) => {
                warn!(error = %e, "Ledger validation request failed");
                false
            }
        };

        self.valid.store(valid, Ordering::SeqCst);
        valid
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::SeqCst)
    }

    async fn update_wallet(
        &self,
        account: AccountId,
        amount: Amount,
        action: WalletAction,
        ctx: &TransferContext,
    ) -> Result<(), BackendError> {
        let body = WalletUpdate {
            amount,
            action,
            consumer_key: &self.config.consumer_key,
            consumer_secret: &self.config.consumer_secret,
            transaction_detail: &ctx.description,
            payment_method: &self.config.payment_method,
            note: format!(
                "OpenSim transaction {}",
                Utc::now().format("%Y-%m-%d %H:%M:%S")
            ),
        };

        let response = self
            .client
            .put(self.account_url(account))
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        check_status(status, account)?;

        let text = response.text().await.unwrap_or_default();
        if let Some(marker) = error_marker(&text) {
            warn!(
                account = %account,
                action = action.as_str(),
                marker = %marker,
                "Ledger reported an error in a 2xx body"
            );
            return Err(BackendError::Rejected(marker));
        }

        debug!(
            account = %account,
            action = action.as_str(),
            amount,
            status = %status,
            "Ledger wallet updated"
        );
        Ok(())
    }
}

#[async_trait]
impl MoneyBackend for LocalLedgerBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::LocalLedger
    }

    fn availability(&self) -> Availability {
        if self.is_configured() && self.is_valid() {
            Availability::Available
        } else {
            Availability::NotConfigured
        }
    }

    async fn debit(
        &self,
        account: AccountId,
        amount: Amount,
        ctx: &TransferContext,
    ) -> Result<(), BackendError> {
        if account.is_system() {
            return Ok(());
        }
        self.update_wallet(account, amount, WalletAction::Debit, ctx)
            .await
    }

    async fn credit(
        &self,
        account: AccountId,
        amount: Amount,
        ctx: &TransferContext,
    ) -> Result<(), BackendError> {
        if account.is_system() {
            return Ok(());
        }
        self.update_wallet(account, amount, WalletAction::Credit, ctx)
            .await
    }

    async fn transfer(
        &self,
        from: AccountId,
        to: AccountId,
        amount: Amount,
        ctx: &TransferContext,
    ) -> Result<(), BackendError> {
        self.debit(from, amount, ctx).await?;

        if let Err(credit_err) = self.credit(to, amount, ctx).await {
            warn!(
                from = %from,
                to = %to,
                amount,
                error = %credit_err,
                "Ledger credit failed, reversing debit"
            );
            let reversal = ctx.describe(format!("Reversal: {}", ctx.description));
            if let Err(reverse_err) = self.credit(from, amount, &reversal).await {
                error!(
                    from = %from,
                    to = %to,
                    amount,
                    error = %reverse_err,
                    "RECONCILIATION REQUIRED: ledger debit applied but reversal failed"
                );
                // the sender stays debited; callers must not treat this as a clean failure
                return Err(BackendError::ReversalFailed(format!(
                    "credit to {} failed ({}), reversal to {} failed ({})",
                    to, credit_err, from, reverse_err
                )));
            }
            return Err(credit_err);
        }

        Ok(())
    }

    async fn query_balance(&self, account: AccountId) -> Result<Balance, BackendError> {
        if !self.is_configured() {
            return Err(BackendError::NotConfigured);
        }

        let response = self
            .client
            .get(self.account_url(account))
            .query(&self.credentials())
            .send()
            .await
            .map_err(map_transport_error)?;

        check_status(response.status(), account)?;

        let text = response
            .text()
            .await
            .map_err(|e| BackendError::Protocol(format!("Failed to read body: {}", e)))?;
        parse_balance(&text)
    }
}

fn map_transport_error(e: reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::Timeout
    } else {
        BackendError::Unreachable(e.to_string())
    }
}

fn check_status(status: StatusCode, account: AccountId) -> Result<(), BackendError> {
    match status {
        s if s.is_success() => Ok(()),
        StatusCode::NOT_FOUND => Err(BackendError::NotFound(account)),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(BackendError::Unauthorized(format!("ledger returned {}", status)))
        }
        s => Err(BackendError::Rejected(format!("ledger returned {}", s))),
    }
}

/// Explicit failure marker inside a 2xx body, if any.
///
/// Bodies that are not JSON objects carry no marker.
fn error_marker(body: &str) -> Option<String> {
    let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) else {
        if !body.trim().is_empty() {
            warn!(body = %body, "Ledger returned a non-JSON success body");
        }
        return None;
    };

    if let Some(code) = map.get("code").and_then(Value::as_str)
        && code == "rest_forbidden"
    {
        return Some(code.to_string());
    }
    if map.get("status").and_then(Value::as_str) == Some("error") {
        let message = map
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("error");
        return Some(message.to_string());
    }
    match map.get("error") {
        None | Some(Value::Null) | Some(Value::Bool(false)) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    }
}

/// Parse `{"data": "23.34"}` (string or number) into a rounded balance
fn parse_balance(body: &str) -> Result<Balance, BackendError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| BackendError::Protocol(format!("Invalid balance JSON: {}", e)))?;

    if value.get("code").and_then(Value::as_str) == Some("rest_forbidden") {
        return Err(BackendError::Unauthorized("rest_forbidden".to_string()));
    }

    let raw = match value.get("data") {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => {
            return Err(BackendError::Protocol(format!(
                "Missing data field in balance response: {}",
                body
            )));
        }
    };

    let decimal = Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .map_err(|e| BackendError::Protocol(format!("Unparsable balance '{}': {}", raw, e)))?;

    decimal
        .round()
        .to_i64()
        .ok_or_else(|| BackendError::Protocol(format!("Balance out of range: {}", raw)))
}
