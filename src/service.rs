//! Service wiring
//!
//! Builds the backends, loopback guard and router from [`AppConfig`].

use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use thiserror::Error;
use tracing::{info, warn};

use crate::backend::{BackendError, LegacyProtocolBackend, LocalLedgerBackend};
use crate::config::AppConfig;
use crate::legacy::{XmlRpcTransport, LedgerBackedHandlers, LoopbackGuard};
use crate::regions::{HostedRegions, RegionRegistry};
use crate::routing::TransactionRouter;
use crate::sessions::SessionRegistry;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Invalid legacy money server URL {url}: {reason}")]
    InvalidLegacyUrl { url: String, reason: String },

    #[error(transparent)]
    Backend(#[from] BackendError),
}

pub struct CurrencyService {
    pub router: TransactionRouter,
    pub ledger: Arc<LocalLedgerBackend>,
    pub legacy: Arc<LegacyProtocolBackend>,
    pub regions: Arc<HostedRegions>,
    pub sessions: Arc<SessionRegistry>,
}

impl CurrencyService {
    pub fn from_config(config: &AppConfig) -> Result<Self, ServiceError> {
        let ledger = Arc::new(LocalLedgerBackend::new(config.ledger.clone())?);

        let regions = Arc::new(HostedRegions::new());
        for region in &config.regions {
            regions.add_region(region.clone());
        }

        let endpoint = match config.legacy.server_url.as_deref() {
            Some(url) if !url.trim().is_empty() => {
                Some(Url::parse(url).map_err(|e| ServiceError::InvalidLegacyUrl {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?)
            }
            _ => None,
        };

        let timeout = Duration::from_millis(config.legacy.timeout_ms);
        let guard = LoopbackGuard::new(
            endpoint,
            regions.clone(),
            Arc::new(LedgerBackedHandlers::new(ledger.clone())),
            Arc::new(XmlRpcTransport::new(timeout)?),
            config.legacy.disable_external,
            timeout,
        );

        let sessions = Arc::new(SessionRegistry::new());
        let legacy = Arc::new(LegacyProtocolBackend::new(Arc::new(guard), sessions.clone()));
        let router = TransactionRouter::new(ledger.clone(), legacy.clone(), sessions.clone());

        Ok(Self {
            router,
            ledger,
            legacy,
            regions,
            sessions,
        })
    }

    /// Start-up checks; the service stays usable either way
    pub async fn start(&self) {
        if self.ledger.config().enabled {
            if !self.ledger.validate().await {
                warn!("Ledger failed validation, routing every account to the legacy server");
            }
        } else {
            info!("Ledger disabled, routing every account to the legacy server");
        }

        let guard = self.legacy.guard();
        match guard.endpoint() {
            Some(url) if guard.is_self() => {
                info!(endpoint = %url, "Legacy money server is this process, calls stay in-process")
            }
            Some(url) if guard.external_disabled() => {
                warn!(endpoint = %url, "External legacy calls are disabled")
            }
            Some(url) => info!(endpoint = %url, "Legacy money server configured"),
            None => warn!("No legacy money server configured"),
        }
    }
}
