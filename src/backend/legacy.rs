//! Legacy Protocol Adapter
//!
//! Moves money on the legacy money server. Authenticated senders present
//! their live session ids with `TransferMoney`; the system account uses
//! `ForceTransferMoney`. A debit is a `PayMoneyCharge` against the sender's
//! session; a credit is a forced transfer from the system account. All calls
//! go through the [`LoopbackGuard`].

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{Availability, BackendError, BackendKind, MoneyBackend, TransferContext};
use crate::core_types::{AccountId, Amount, Balance, TransactionKind};
use crate::legacy::{LegacyOp, LegacyRequest, LegacyResponse, LoopbackGuard};
use crate::sessions::{SessionCredentials, SessionRegistry};

pub struct LegacyProtocolBackend {
    guard: Arc<LoopbackGuard>,
    sessions: Arc<SessionRegistry>,
}

impl LegacyProtocolBackend {
    pub fn new(guard: Arc<LoopbackGuard>, sessions: Arc<SessionRegistry>) -> Self {
        Self { guard, sessions }
    }

    pub fn guard(&self) -> &LoopbackGuard {
        &self.guard
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Open a session and tell the money server about it.
    ///
    /// Returns the balance reported at login (also cached for the balance
    /// resolver); in-process dispatch reports none.
    pub async fn login(
        &self,
        account: AccountId,
        credentials: SessionCredentials,
    ) -> Result<Option<Balance>, BackendError> {
        self.sessions.open(account, credentials);

        let request = LegacyRequest::new(LegacyOp::ClientLogin)
            .with("clientUUID", account)
            .with("clientSessionID", credentials.session_id.to_string())
            .with("clientSecureSessionID", credentials.secure_session_id.to_string());

        let response = self.guard.call(request).await?.into_result()?;
        let balance = response.balance();
        if let Some(balance) = balance {
            self.sessions.record_login_balance(account, balance);
        }

        info!(account = %account, balance = ?balance, "Client logged in to money server");
        Ok(balance)
    }

    /// Close the session; a no-op for accounts without one
    pub async fn logout(&self, account: AccountId) -> Result<(), BackendError> {
        let Some(credentials) = self.sessions.close(account) else {
            return Ok(());
        };

        let request = LegacyRequest::new(LegacyOp::ClientLogout)
            .with("clientUUID", account)
            .with("clientSessionID", credentials.session_id.to_string())
            .with("clientSecureSessionID", credentials.secure_session_id.to_string());

        self.guard.call(request).await?.into_result()?;
        debug!(account = %account, "Client logged out of money server");
        Ok(())
    }

    /// Script-initiated payment from the system to `receiver`
    pub async fn send_money(
        &self,
        receiver: AccountId,
        amount: Amount,
        kind: Option<TransactionKind>,
        secret: &str,
        script_ip: &str,
    ) -> Result<(), BackendError> {
        let kind = kind.unwrap_or(TransactionKind::ReferBonus);
        let request = LegacyRequest::new(LegacyOp::SendMoney)
            .with("receiverID", receiver)
            .with("transactionType", kind.code())
            .with("amount", wire_amount(amount)?)
            .with("secretAccessCode", secret_hash(secret, script_ip))
            .with("description", "Bonus to Avatar");

        self.guard.call(request).await?.into_result()?;
        Ok(())
    }

    /// Script-initiated move between two accounts (nil means system)
    pub async fn move_money(
        &self,
        from: AccountId,
        to: AccountId,
        amount: Amount,
        secret: &str,
        script_ip: &str,
    ) -> Result<(), BackendError> {
        let request = LegacyRequest::new(LegacyOp::MoveMoney)
            .with("senderID", from)
            .with("receiverID", to)
            .with("transactionType", TransactionKind::MoveMoney.code())
            .with("amount", wire_amount(amount)?)
            .with("secretAccessCode", secret_hash(secret, script_ip))
            .with("description", "Move Money");

        self.guard.call(request).await?.into_result()?;
        Ok(())
    }

    /// Charge `sender` to the system (`PayMoneyCharge`); needs a live session
    pub async fn pay_money_charge(
        &self,
        sender: AccountId,
        amount: Amount,
        ctx: &TransferContext,
    ) -> Result<(), BackendError> {
        let credentials = self
            .sessions
            .credentials(sender)
            .ok_or(BackendError::NoSession(sender))?;

        let request = LegacyRequest::new(LegacyOp::PayMoneyCharge)
            .with("senderID", sender)
            .with("senderSessionID", credentials.session_id.to_string())
            .with("senderSecureSessionID", credentials.secure_session_id.to_string())
            .with("transactionType", ctx.kind.code())
            .with("amount", wire_amount(amount)?)
            .with("regionHandle", ctx.region_handle.to_string())
            .with(
                "regionUUID",
                ctx.region_id.unwrap_or_default().to_string(),
            )
            .with("description", ctx.description.as_str());

        match self.guard.call(request).await?.into_result() {
            Ok(_) => {
                debug!(sender = %sender, amount, kind = %ctx.kind, "Legacy charge applied");
                Ok(())
            }
            Err(e) => {
                warn!(sender = %sender, amount, error = %e, "Legacy charge refused");
                Err(e)
            }
        }
    }

    fn transfer_request(
        &self,
        from: AccountId,
        to: AccountId,
        amount: Amount,
        ctx: &TransferContext,
    ) -> Result<LegacyRequest, BackendError> {
        let mut request = if from.is_system() {
            LegacyRequest::new(LegacyOp::ForceTransferMoney)
        } else {
            let credentials = self
                .sessions
                .credentials(from)
                .ok_or(BackendError::NoSession(from))?;
            LegacyRequest::new(LegacyOp::TransferMoney)
                .with("senderSessionID", credentials.session_id.to_string())
                .with("senderSecureSessionID", credentials.secure_session_id.to_string())
        };

        request = request
            .with("senderID", from)
            .with("receiverID", to)
            .with("transactionType", ctx.kind.code())
            .with("amount", wire_amount(amount)?)
            .with(
                "objectID",
                ctx.object_id.unwrap_or_default().to_string(),
            )
            .with("objectName", ctx.object_name.as_str())
            .with("regionHandle", ctx.region_handle.to_string())
            .with(
                "regionUUID",
                ctx.region_id.unwrap_or_default().to_string(),
            )
            .with("description", ctx.description.as_str());

        Ok(request)
    }
}

#[async_trait]
impl MoneyBackend for LegacyProtocolBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::LegacyProtocol
    }

    fn availability(&self) -> Availability {
        self.guard.availability()
    }

    async fn debit(
        &self,
        account: AccountId,
        amount: Amount,
        ctx: &TransferContext,
    ) -> Result<(), BackendError> {
        self.pay_money_charge(account, amount, ctx).await
    }

    async fn credit(
        &self,
        account: AccountId,
        amount: Amount,
        ctx: &TransferContext,
    ) -> Result<(), BackendError> {
        self.transfer(AccountId::SYSTEM, account, amount, ctx).await
    }

    async fn transfer(
        &self,
        from: AccountId,
        to: AccountId,
        amount: Amount,
        ctx: &TransferContext,
    ) -> Result<(), BackendError> {
        let request = self.transfer_request(from, to, amount, ctx)?;
        let op = request.op;

        match self.guard.call(request).await?.into_result() {
            Ok(_) => {
                debug!(method = %op, from = %from, to = %to, amount, kind = %ctx.kind, "Legacy transfer applied");
                Ok(())
            }
            Err(e) => {
                warn!(method = %op, from = %from, to = %to, amount, error = %e, "Legacy transfer refused");
                Err(e)
            }
        }
    }

    async fn query_balance(&self, account: AccountId) -> Result<Balance, BackendError> {
        let credentials = self
            .sessions
            .credentials(account)
            .ok_or(BackendError::NoSession(account))?;

        let request = LegacyRequest::new(LegacyOp::GetBalance)
            .with("clientUUID", account)
            .with("clientSessionID", credentials.session_id.to_string())
            .with("clientSecureSessionID", credentials.secure_session_id.to_string());

        let response: LegacyResponse = self.guard.call(request).await?.into_result()?;
        response
            .balance()
            .ok_or_else(|| BackendError::Protocol("GetBalance reply has no clientBalance".to_string()))
    }
}

/// `md5(secret + "_" + script_ip)` as lowercase hex
pub fn secret_hash(secret: &str, script_ip: &str) -> String {
    format!("{:x}", md5::compute(format!("{}_{}", secret, script_ip)))
}

fn wire_amount(amount: Amount) -> Result<i64, BackendError> {
    i64::try_from(amount)
        .map_err(|_| BackendError::Rejected(format!("amount {} exceeds protocol range", amount)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use crate::legacy::LedgerBackedHandlers;
    use crate::legacy::loopback::mock::RecordingTransport;
    use crate::legacy::wire::{param_int, param_str};
    use crate::regions::HostedRegions;
    use reqwest::Url;
    use std::time::Duration;
    use uuid::Uuid;

    fn backend_with(transport: Arc<RecordingTransport>) -> LegacyProtocolBackend {
        let guard = LoopbackGuard::new(
            Some(Url::parse("https://money.example.com:8008/").unwrap()),
            Arc::new(HostedRegions::new()),
            Arc::new(LedgerBackedHandlers::new(Arc::new(MockBackend::ledger()))),
            transport,
            false,
            Duration::from_secs(1),
        );
        LegacyProtocolBackend::new(Arc::new(guard), Arc::new(SessionRegistry::new()))
    }

    #[test]
    fn test_secret_hash() {
        // md5("abc_127.0.0.1")
        let hash = secret_hash("abc", "127.0.0.1");
        assert_eq!(hash.len(), 32);
        assert_eq!(hash, hash.to_lowercase());
        assert_eq!(hash, format!("{:x}", md5::compute("abc_127.0.0.1")));
        assert_ne!(hash, secret_hash("abc", "127.0.0.2"));
    }

    #[tokio::test]
    async fn test_transfer_requires_session() {
        let transport = Arc::new(RecordingTransport::ok());
        let backend = backend_with(transport.clone());
        let alice = AccountId::random();

        let err = backend
            .transfer(alice, AccountId::random(), 10, &TransferContext::default())
            .await
            .unwrap_err();
        assert_eq!(err, BackendError::NoSession(alice));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_transfer_with_session_sends_full_payload() {
        let transport = Arc::new(RecordingTransport::ok());
        let backend = backend_with(transport.clone());
        let (alice, bob) = (AccountId::random(), AccountId::random());
        let creds = SessionCredentials::new(Uuid::new_v4(), Uuid::new_v4());
        backend.sessions().open(alice, creds);

        let object = Uuid::new_v4();
        let ctx = TransferContext::new(TransactionKind::PayObject, "pay vendor")
            .with_object(object, "Vendor")
            .with_region(1099511628032000, Uuid::new_v4());
        backend.transfer(alice, bob, 75, &ctx).await.unwrap();

        let request = transport.last_request().unwrap();
        assert_eq!(request.op, LegacyOp::TransferMoney);
        let p = &request.params;
        assert_eq!(param_str(p, "senderID"), Some(alice.to_string().as_str()));
        assert_eq!(param_str(p, "receiverID"), Some(bob.to_string().as_str()));
        assert_eq!(
            param_str(p, "senderSessionID"),
            Some(creds.session_id.to_string().as_str())
        );
        assert_eq!(param_int(p, "amount"), Some(75));
        assert_eq!(param_int(p, "transactionType"), Some(5008));
        assert_eq!(param_str(p, "objectID"), Some(object.to_string().as_str()));
        assert_eq!(param_str(p, "regionHandle"), Some("1099511628032000"));
        assert_eq!(param_str(p, "description"), Some("pay vendor"));
    }

    #[tokio::test]
    async fn test_credit_uses_force_transfer_from_system() {
        let transport = Arc::new(RecordingTransport::ok());
        let backend = backend_with(transport.clone());
        let bob = AccountId::random();

        backend
            .credit(bob, 30, &TransferContext::default())
            .await
            .unwrap();

        let request = transport.last_request().unwrap();
        assert_eq!(request.op, LegacyOp::ForceTransferMoney);
        assert!(!request.params.contains_key("senderSessionID"));
        assert_eq!(
            param_str(&request.params, "senderID"),
            Some(AccountId::SYSTEM.to_string().as_str())
        );
    }

    #[tokio::test]
    async fn test_debit_is_pay_money_charge() {
        let transport = Arc::new(RecordingTransport::ok());
        let backend = backend_with(transport.clone());
        let alice = AccountId::random();
        let ctx = TransferContext::new(TransactionKind::UploadCharge, "texture upload")
            .with_region(1099511628032000, Uuid::new_v4());

        assert_eq!(
            backend.debit(alice, 10, &ctx).await,
            Err(BackendError::NoSession(alice))
        );
        assert_eq!(transport.call_count(), 0);

        let creds = SessionCredentials::new(Uuid::new_v4(), Uuid::new_v4());
        backend.sessions().open(alice, creds);
        backend.debit(alice, 10, &ctx).await.unwrap();

        let request = transport.last_request().unwrap();
        assert_eq!(request.op, LegacyOp::PayMoneyCharge);
        let p = &request.params;
        assert_eq!(param_str(p, "senderID"), Some(alice.to_string().as_str()));
        assert_eq!(
            param_str(p, "senderSessionID"),
            Some(creds.session_id.to_string().as_str())
        );
        assert_eq!(
            param_str(p, "senderSecureSessionID"),
            Some(creds.secure_session_id.to_string().as_str())
        );
        assert_eq!(param_int(p, "transactionType"), Some(1101));
        assert_eq!(param_int(p, "amount"), Some(10));
        assert_eq!(param_str(p, "regionHandle"), Some("1099511628032000"));
        assert_eq!(param_str(p, "description"), Some("texture upload"));
        assert!(!p.contains_key("receiverID"));
    }

    #[tokio::test]
    async fn test_refusal_and_malformed_responses() {
        let transport = Arc::new(RecordingTransport::new(Ok(LegacyResponse::error(
            "not enough money",
        ))));
        let backend = backend_with(transport.clone());
        let bob = AccountId::random();
        let ctx = TransferContext::default();

        assert_eq!(
            backend.credit(bob, 5, &ctx).await,
            Err(BackendError::Rejected("not enough money".to_string()))
        );

        transport.set_response(Ok(LegacyResponse::default().with("message", "??")));
        assert!(matches!(
            backend.credit(bob, 5, &ctx).await,
            Err(BackendError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_login_caches_balance_and_logout_closes() {
        let transport = Arc::new(RecordingTransport::new(Ok(
            LegacyResponse::ok().with("clientBalance", 1200i64)
        )));
        let backend = backend_with(transport.clone());
        let alice = AccountId::random();
        let creds = SessionCredentials::new(Uuid::new_v4(), Uuid::new_v4());

        let balance = backend.login(alice, creds).await.unwrap();
        assert_eq!(balance, Some(1200));
        assert_eq!(backend.sessions().cached_balance(alice), Some(1200));

        assert_eq!(backend.query_balance(alice).await, Ok(1200));

        backend.logout(alice).await.unwrap();
        assert!(backend.sessions().credentials(alice).is_none());
        assert_eq!(
            transport.ops(),
            vec![LegacyOp::ClientLogin, LegacyOp::GetBalance, LegacyOp::ClientLogout]
        );

        // second logout has nothing to close
        backend.logout(alice).await.unwrap();
        assert_eq!(transport.call_count(), 3);
    }

    #[tokio::test]
    async fn test_script_operations_hash_secret() {
        let transport = Arc::new(RecordingTransport::ok());
        let backend = backend_with(transport.clone());
        let (alice, bob) = (AccountId::random(), AccountId::random());

        backend
            .send_money(bob, 10, None, "s3cret", "10.0.0.5")
            .await
            .unwrap();
        let sent = transport.last_request().unwrap();
        assert_eq!(sent.op, LegacyOp::SendMoney);
        assert_eq!(param_int(&sent.params, "transactionType"), Some(5003));
        assert_eq!(
            param_str(&sent.params, "secretAccessCode"),
            Some(secret_hash("s3cret", "10.0.0.5").as_str())
        );

        backend
            .move_money(alice, bob, 20, "s3cret", "10.0.0.5")
            .await
            .unwrap();
        let moved = transport.last_request().unwrap();
        assert_eq!(moved.op, LegacyOp::MoveMoney);
        assert_eq!(param_int(&moved.params, "transactionType"), Some(5011));
    }

    #[tokio::test]
    async fn test_query_balance_without_session() {
        let backend = backend_with(Arc::new(RecordingTransport::ok()));
        let alice = AccountId::random();
        assert_eq!(
            backend.query_balance(alice).await,
            Err(BackendError::NoSession(alice))
        );
    }
}
