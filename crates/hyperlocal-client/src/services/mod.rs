//! # Service Clients
//!
//! Typed wrappers over the marketplace backend, one per concern.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │  Services::new(config, storage, navigator)                           │
//! │                                                                      │
//! │   user ──────► AuthService      /auth/*, /users/me                   │
//! │   customer ──► CustomerService  /shops/nearby, /shops/search, ...    │
//! │   seller ────► SellerService    /shops/me, /shops/me/products, ...   │
//! │   catalog, admin                raw ApiClient                        │
//! │                                                                      │
//! │   all clients share one reqwest::Client and one UnauthorizedGate     │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```

mod auth;
mod customer;
mod seller;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use hyperlocal_core::validation::validate_pagination;
use hyperlocal_core::DEFAULT_PAGE_SIZE;

pub use auth::AuthService;
pub use customer::{CustomerService, NearbyQuery};
pub use seller::SellerService;

use crate::config::{ClientConfig, DiscoverySettings, Service};
use crate::error::ClientResult;
use crate::storage::AppStorage;
use crate::transport::{build_http_client, ApiClient, Navigator, UnauthorizedEvent, UnauthorizedGate};

// =============================================================================
// Pagination
// =============================================================================

/// 1-based page selector sent as `page` / `page_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        PageRequest {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> Self {
        PageRequest { page, page_size }
    }

    pub fn next(self) -> Self {
        PageRequest {
            page: self.page.saturating_add(1),
            ..self
        }
    }

    fn query_pairs(&self) -> ClientResult<[(&'static str, String); 2]> {
        validate_pagination(self.page, self.page_size)?;
        Ok([("page", self.page.to_string()), ("page_size", self.page_size.to_string())])
    }
}

// =============================================================================
// Service Set
// =============================================================================

/// One [`ApiClient`] per backend service.
#[derive(Debug, Clone)]
pub struct Services {
    user: ApiClient,
    seller: ApiClient,
    customer: ApiClient,
    catalog: ApiClient,
    admin: ApiClient,
    gate: Arc<UnauthorizedGate>,
    discovery: DiscoverySettings,
}

impl Services {
    pub fn new(config: &ClientConfig, storage: AppStorage, navigator: Arc<dyn Navigator>) -> ClientResult<Self> {
        config.validate()?;

        let http = build_http_client(&config.api)?;
        let gate = Arc::new(UnauthorizedGate::new(storage.clone(), navigator));
        let client = |service: Service| {
            ApiClient::new(
                service,
                config.services.url(service),
                http.clone(),
                storage.clone(),
                gate.clone(),
            )
        };

        let services = Services {
            user: client(Service::User)?,
            seller: client(Service::Seller)?,
            customer: client(Service::Customer)?,
            catalog: client(Service::Catalog)?,
            admin: client(Service::Admin)?,
            gate,
            discovery: config.discovery.clone(),
        };
        debug!(
            user = %services.user.base_url(),
            customer = %services.customer.base_url(),
            seller = %services.seller.base_url(),
            "Service clients ready"
        );
        Ok(services)
    }

    pub fn client(&self, service: Service) -> &ApiClient {
        match service {
            Service::User => &self.user,
            Service::Seller => &self.seller,
            Service::Customer => &self.customer,
            Service::Catalog => &self.catalog,
            Service::Admin => &self.admin,
        }
    }

    pub fn gate(&self) -> &Arc<UnauthorizedGate> {
        &self.gate
    }

    /// Receives an event for every 401 from any service.
    pub fn subscribe_unauthorized(&self) -> broadcast::Receiver<UnauthorizedEvent> {
        self.gate.subscribe()
    }

    pub fn auth(&self) -> AuthService {
        AuthService::new(self.user.clone())
    }

    pub fn customer(&self) -> CustomerService {
        CustomerService::new(self.customer.clone(), self.discovery.clone())
    }

    pub fn seller(&self) -> SellerService {
        SellerService::new(self.seller.clone())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
