//! Network transport for legacy money-server calls
//!
//! Each call is one XML-RPC `methodCall` POSTed to the money server; see
//! [`super::xmlrpc`] for the encoding.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

use super::wire::{LegacyRequest, LegacyResponse};
use super::xmlrpc::{decode_response, encode_call};
use crate::backend::BackendError;

#[async_trait]
pub trait LegacyTransport: Send + Sync {
    async fn call(
        &self,
        endpoint: &Url,
        request: &LegacyRequest,
    ) -> Result<LegacyResponse, BackendError>;
}

pub struct XmlRpcTransport {
    client: reqwest::Client,
}

impl XmlRpcTransport {
    pub fn new(timeout: Duration) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Unreachable(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

fn map_send_error(e: reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::Timeout
    } else {
        BackendError::Unreachable(format!("HTTP request failed: {}", e))
    }
}

#[async_trait]
impl LegacyTransport for XmlRpcTransport {
    async fn call(
        &self,
        endpoint: &Url,
        request: &LegacyRequest,
    ) -> Result<LegacyResponse, BackendError> {
        debug!(method = %request.op, endpoint = %endpoint, "Legacy XML-RPC call");

        let response = self
            .client
            .post(endpoint.clone())
            .header(CONTENT_TYPE, "text/xml")
            .body(encode_call(request))
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Unreachable(format!(
                "money server returned {}",
                status
            )));
        }

        let body = response.text().await.map_err(map_send_error)?;
        decode_response(&body)
    }
}
