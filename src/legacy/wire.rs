//! Legacy money-server wire types
//!
//! Requests and responses are flat key/value maps. Responses carry a literal
//! boolean `success`; a response without it is malformed.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::backend::BackendError;
use crate::core_types::{AccountId, Balance};

/// Remote operations of the legacy money server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LegacyOp {
    ClientLogin,
    ClientLogout,
    GetBalance,
    TransferMoney,
    ForceTransferMoney,
    PayMoneyCharge,
    AddBankerMoney,
    SendMoney,
    MoveMoney,
    OnMoneyTransfered,
    UpdateBalance,
    UserAlert,
    GetCurrencyQuote,
    BuyCurrency,
}

impl LegacyOp {
    pub const ALL: [LegacyOp; 14] = [
        LegacyOp::ClientLogin,
        LegacyOp::ClientLogout,
        LegacyOp::GetBalance,
        LegacyOp::TransferMoney,
        LegacyOp::ForceTransferMoney,
        LegacyOp::PayMoneyCharge,
        LegacyOp::AddBankerMoney,
        LegacyOp::SendMoney,
        LegacyOp::MoveMoney,
        LegacyOp::OnMoneyTransfered,
        LegacyOp::UpdateBalance,
        LegacyOp::UserAlert,
        LegacyOp::GetCurrencyQuote,
        LegacyOp::BuyCurrency,
    ];

    /// Method name on the wire
    pub fn method_name(&self) -> &'static str {
        match self {
            LegacyOp::ClientLogin => "ClientLogin",
            LegacyOp::ClientLogout => "ClientLogout",
            LegacyOp::GetBalance => "GetBalance",
            LegacyOp::TransferMoney => "TransferMoney",
            LegacyOp::ForceTransferMoney => "ForceTransferMoney",
            LegacyOp::PayMoneyCharge => "PayMoneyCharge",
            LegacyOp::AddBankerMoney => "AddBankerMoney",
            LegacyOp::SendMoney => "SendMoney",
            LegacyOp::MoveMoney => "MoveMoney",
            LegacyOp::OnMoneyTransfered => "OnMoneyTransfered",
            LegacyOp::UpdateBalance => "UpdateBalance",
            LegacyOp::UserAlert => "UserAlert",
            LegacyOp::GetCurrencyQuote => "GetCurrencyQuote",
            LegacyOp::BuyCurrency => "BuyCurrency",
        }
    }

    /// Case-insensitive lookup by method name
    pub fn from_method(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|op| op.method_name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for LegacyOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.method_name())
    }
}

/// Scalar value of a flat parameter map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LegacyValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl LegacyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            LegacyValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Integer value; numeric strings are accepted
    pub fn as_int(&self) -> Option<i64> {
        match self {
            LegacyValue::Int(i) => Some(*i),
            LegacyValue::Str(s) => s.trim().parse().ok(),
            LegacyValue::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            LegacyValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<bool> for LegacyValue {
    fn from(v: bool) -> Self {
        LegacyValue::Bool(v)
    }
}

impl From<i64> for LegacyValue {
    fn from(v: i64) -> Self {
        LegacyValue::Int(v)
    }
}

impl From<i32> for LegacyValue {
    fn from(v: i32) -> Self {
        LegacyValue::Int(i64::from(v))
    }
}

impl From<&str> for LegacyValue {
    fn from(v: &str) -> Self {
        LegacyValue::Str(v.to_string())
    }
}

impl From<String> for LegacyValue {
    fn from(v: String) -> Self {
        LegacyValue::Str(v)
    }
}

impl From<AccountId> for LegacyValue {
    fn from(v: AccountId) -> Self {
        LegacyValue::Str(v.to_string())
    }
}

pub type LegacyParams = BTreeMap<String, LegacyValue>;

/// Read an account id parameter; absent or unparsable means the system account
pub fn param_account(params: &LegacyParams, key: &str) -> AccountId {
    params
        .get(key)
        .and_then(LegacyValue::as_str)
        .and_then(|s| s.parse().ok())
        .unwrap_or(AccountId::SYSTEM)
}

pub fn param_int(params: &LegacyParams, key: &str) -> Option<i64> {
    params.get(key).and_then(LegacyValue::as_int)
}

pub fn param_str<'a>(params: &'a LegacyParams, key: &str) -> Option<&'a str> {
    params.get(key).and_then(LegacyValue::as_str)
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegacyRequest {
    pub op: LegacyOp,
    pub params: LegacyParams,
}

impl LegacyRequest {
    pub fn new(op: LegacyOp) -> Self {
        Self {
            op,
            params: LegacyParams::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<LegacyValue>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }
}

/// Flat response map, identical whether produced locally or over the network
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LegacyResponse {
    pub fields: LegacyParams,
}

impl LegacyResponse {
    pub fn ok() -> Self {
        Self::default().with("success", true)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::default()
            .with("success", false)
            .with("message", message.into())
    }

    pub fn with(mut self, key: &str, value: impl Into<LegacyValue>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    /// The literal `success` flag; missing or non-boolean is malformed
    pub fn success(&self) -> Result<bool, BackendError> {
        self.fields
            .get("success")
            .and_then(LegacyValue::as_bool)
            .ok_or_else(|| BackendError::Protocol("response has no boolean success".to_string()))
    }

    pub fn message(&self) -> Option<&str> {
        param_str(&self.fields, "message")
    }

    pub fn balance(&self) -> Option<Balance> {
        param_int(&self.fields, "clientBalance")
    }

    /// `Ok` on `success == true`, `Rejected(message)` otherwise
    pub fn into_result(self) -> Result<Self, BackendError> {
        if self.success()? {
            Ok(self)
        } else {
            let message = self.message().unwrap_or("money server refused").to_string();
            Err(BackendError::Rejected(message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_lookup_is_case_insensitive() {
        assert_eq!(LegacyOp::from_method("getbalance"), Some(LegacyOp::GetBalance));
        assert_eq!(
            LegacyOp::from_method("ForceTransferMoney"),
            Some(LegacyOp::ForceTransferMoney)
        );
        assert_eq!(LegacyOp::from_method("launchMissiles"), None);
    }

    #[test]
    fn test_success_is_literal() {
        assert_eq!(LegacyResponse::ok().success(), Ok(true));
        assert_eq!(LegacyResponse::error("nope").success(), Ok(false));

        let stringly = LegacyResponse::default().with("success", "true");
        assert!(matches!(stringly.success(), Err(BackendError::Protocol(_))));

        let missing = LegacyResponse::default().with("clientBalance", 10i64);
        assert!(matches!(missing.success(), Err(BackendError::Protocol(_))));
    }

    #[test]
    fn test_into_result_carries_message() {
        let err = LegacyResponse::error("balance too low")
            .into_result()
            .unwrap_err();
        assert_eq!(err, BackendError::Rejected("balance too low".to_string()));
    }

    #[test]
    fn test_response_json_shape() {
        let json = r#"{"success":true,"clientBalance":250,"message":"ok"}"#;
        let response: LegacyResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.success(), Ok(true));
        assert_eq!(response.balance(), Some(250));
        assert_eq!(response.message(), Some("ok"));
    }

    #[test]
    fn test_param_account_defaults_to_system() {
        let account = AccountId::random();
        let request = LegacyRequest::new(LegacyOp::MoveMoney)
            .with("senderID", account)
            .with("receiverID", "garbage");
        assert_eq!(param_account(&request.params, "senderID"), account);
        assert_eq!(param_account(&request.params, "receiverID"), AccountId::SYSTEM);
        assert_eq!(param_account(&request.params, "objectID"), AccountId::SYSTEM);
    }
}
