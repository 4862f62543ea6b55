//! Loopback Guard
//!
//! Every legacy call passes through here. When the configured money-server
//! endpoint is served by this very process the call is dispatched in-process
//! instead of going out over the network (which would re-enter our own
//! listener and could deadlock). Calls to foreign endpoints can be refused by
//! configuration.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use tracing::{debug, warn};

use super::handlers::{LocalMoneyHandlers, dispatch};
use super::transport::LegacyTransport;
use super::wire::{LegacyRequest, LegacyResponse};
use crate::backend::{Availability, BackendError};
use crate::logging::TRACE_TARGET;
use crate::regions::RegionRegistry;

pub struct LoopbackGuard {
    endpoint: Option<Url>,
    regions: Arc<dyn RegionRegistry>,
    handlers: Arc<dyn LocalMoneyHandlers>,
    transport: Arc<dyn LegacyTransport>,
    disable_external: bool,
    timeout: Duration,
}

impl LoopbackGuard {
    pub fn new(
        endpoint: Option<Url>,
        regions: Arc<dyn RegionRegistry>,
        handlers: Arc<dyn LocalMoneyHandlers>,
        transport: Arc<dyn LegacyTransport>,
        disable_external: bool,
        timeout: Duration,
    ) -> Self {
        Self {
            endpoint,
            regions,
            handlers,
            transport,
            disable_external,
            timeout,
        }
    }

    pub fn endpoint(&self) -> Option<&Url> {
        self.endpoint.as_ref()
    }

    /// Whether the configured endpoint is served by this process right now
    pub fn is_self(&self) -> bool {
        self.endpoint
            .as_ref()
            .is_some_and(|url| self.regions.is_self(url))
    }

    pub fn external_disabled(&self) -> bool {
        self.disable_external
    }

    /// Re-evaluated on each call: hosted regions change at runtime
    pub fn availability(&self) -> Availability {
        match self.endpoint {
            None => Availability::NotConfigured,
            Some(_) if self.is_self() => Availability::Available,
            Some(_) if self.disable_external => Availability::AdministrativelyDisabled,
            Some(_) => Availability::Available,
        }
    }

    pub async fn call(&self, request: LegacyRequest) -> Result<LegacyResponse, BackendError> {
        let Some(endpoint) = self.endpoint.as_ref() else {
            return Err(BackendError::NotConfigured);
        };

        if self.regions.is_self(endpoint) {
            debug!(
                target: TRACE_TARGET,
                method = %request.op,
                endpoint = %endpoint,
                "Loopback: dispatching in-process"
            );
            let local = dispatch(self.handlers.as_ref(), request.op, &request.params);
            return tokio::time::timeout(self.timeout, local)
                .await
                .map_err(|_| BackendError::Timeout);
        }

        if self.disable_external {
            warn!(
                method = %request.op,
                endpoint = %endpoint,
                "External legacy call refused by configuration"
            );
            return Err(BackendError::Disabled);
        }

        debug!(target: TRACE_TARGET, method = %request.op, endpoint = %endpoint, "Legacy network call");
        match tokio::time::timeout(self.timeout, self.transport.call(endpoint, &request)).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout),
        }
    }
}

/// Transport that records calls and returns a canned response
#[cfg(test)]
pub mod mock {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::legacy::wire::LegacyOp;

    pub struct RecordingTransport {
        calls: AtomicUsize,
        requests: Mutex<Vec<LegacyRequest>>,
        response: Mutex<Result<LegacyResponse, BackendError>>,
    }

    impl RecordingTransport {
        pub fn new(response: Result<LegacyResponse, BackendError>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
                response: Mutex::new(response),
            }
        }

        pub fn ok() -> Self {
            Self::new(Ok(LegacyResponse::ok()))
        }

        pub fn set_response(&self, response: Result<LegacyResponse, BackendError>) {
            *self.response.lock().unwrap() = response;
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn ops(&self) -> Vec<LegacyOp> {
            self.requests.lock().unwrap().iter().map(|r| r.op).collect()
        }

        pub fn last_request(&self) -> Option<LegacyRequest> {
            self.requests.lock().unwrap().last().cloned()
        }
    }

    #[async_trait]
    impl LegacyTransport for RecordingTransport {
        async fn call(
            &self,
            _endpoint: &Url,
            request: &LegacyRequest,
        ) -> Result<LegacyResponse, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request.clone());
            self.response.lock().unwrap().clone()
        }
    }
}
