//! # Client Configuration
//!
//! Configuration for service endpoints, timeouts and geolocation options.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     HYPERLOCAL_USER_SERVICE_URL=https://users.example.com              │
//! │     HYPERLOCAL_GEO_TIMEOUT_MS=5000                                     │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/marketplace/client.toml (Linux)                          │
//! │     ~/Library/Application Support/com.hyperlocal.marketplace/          │
//! │       client.toml (macOS)                                              │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     localhost:8001..8005, 30s requests, 10s location fixes             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # client.toml
//! [services]
//! user_url = "http://localhost:8001"
//! seller_url = "http://localhost:8002"
//! customer_url = "http://localhost:8003"
//!
//! [api]
//! timeout_secs = 30
//!
//! [geolocation]
//! timeout_ms = 10000
//! high_accuracy = true
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use hyperlocal_core::{Location, DEFAULT_PAGE_SIZE, DEFAULT_SEARCH_RADIUS_KM, MAX_PAGE_SIZE};

use crate::error::{ClientError, ClientResult};
use crate::location::{FixedPosition, GeolocationPlatform, NoGeolocation, PositionOptions};

// =============================================================================
// Backend Service
// =============================================================================

/// The backend microservices the client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    User,
    Seller,
    Customer,
    Catalog,
    Admin,
}

impl Service {
    pub const ALL: [Service; 5] = [
        Service::User,
        Service::Seller,
        Service::Customer,
        Service::Catalog,
        Service::Admin,
    ];

    pub const fn name(&self) -> &'static str {
        match self {
            Service::User => "user",
            Service::Seller => "seller",
            Service::Customer => "customer",
            Service::Catalog => "catalog",
            Service::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Service Endpoints
// =============================================================================

/// Base URLs of the backend services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceEndpoints {
    #[serde(default = "default_user_url")]
    pub user_url: String,

    #[serde(default = "default_seller_url")]
    pub seller_url: String,

    #[serde(default = "default_customer_url")]
    pub customer_url: String,

    #[serde(default = "default_catalog_url")]
    pub catalog_url: String,

    #[serde(default = "default_admin_url")]
    pub admin_url: String,
}

fn default_user_url() -> String {
    "http://localhost:8001".to_string()
}
fn default_seller_url() -> String {
    "http://localhost:8002".to_string()
}
fn default_customer_url() -> String {
    "http://localhost:8003".to_string()
}
fn default_catalog_url() -> String {
    "http://localhost:8004".to_string()
}
fn default_admin_url() -> String {
    "http://localhost:8005".to_string()
}

impl Default for ServiceEndpoints {
    fn default() -> Self {
        ServiceEndpoints {
            user_url: default_user_url(),
            seller_url: default_seller_url(),
            customer_url: default_customer_url(),
            catalog_url: default_catalog_url(),
            admin_url: default_admin_url(),
        }
    }
}

impl ServiceEndpoints {
    /// Base URL of one service.
    pub fn url(&self, service: Service) -> &str {
        match service {
            Service::User => &self.user_url,
            Service::Seller => &self.seller_url,
            Service::Customer => &self.customer_url,
            Service::Catalog => &self.catalog_url,
            Service::Admin => &self.admin_url,
        }
    }

    fn url_mut(&mut self, service: Service) -> &mut String {
        match service {
            Service::User => &mut self.user_url,
            Service::Seller => &mut self.seller_url,
            Service::Customer => &mut self.customer_url,
            Service::Catalog => &mut self.catalog_url,
            Service::Admin => &mut self.admin_url,
        }
    }
}

// =============================================================================
// API Settings
// =============================================================================

/// HTTP behavior shared by every service client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Whole-request timeout (seconds). A request that exceeds it fails like
    /// any other network error; there is no automatic retry.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// TCP/TLS connect timeout (seconds).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_timeout() -> u64 {
    30
}
fn default_connect_timeout() -> u64 {
    10
}

impl Default for ApiSettings {
    fn default() -> Self {
        ApiSettings {
            timeout_secs: default_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl ApiSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

// =============================================================================
// Geolocation Settings
// =============================================================================

/// Options handed to the geolocation platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeolocationSettings {
    /// Time allowed for one fix (milliseconds).
    #[serde(default = "default_geo_timeout")]
    pub timeout_ms: u64,

    #[serde(default = "default_true")]
    pub high_accuracy: bool,

    /// Oldest cached platform fix accepted for a one-shot request (seconds).
    #[serde(default = "default_one_shot_max_age")]
    pub one_shot_max_age_secs: u64,

    /// Oldest cached platform fix accepted while watching (seconds).
    #[serde(default = "default_watch_max_age")]
    pub watch_max_age_secs: u64,

    /// Static position for the fixed platform (desktop/dev use).
    #[serde(default)]
    pub fixed_location: Option<Location>,
}

fn default_true() -> bool {
    true
}
fn default_geo_timeout() -> u64 {
    10_000
}
fn default_one_shot_max_age() -> u64 {
    300
}
fn default_watch_max_age() -> u64 {
    60
}

impl Default for GeolocationSettings {
    fn default() -> Self {
        GeolocationSettings {
            timeout_ms: default_geo_timeout(),
            high_accuracy: true,
            one_shot_max_age_secs: default_one_shot_max_age(),
            watch_max_age_secs: default_watch_max_age(),
            fixed_location: None,
        }
    }
}

impl GeolocationSettings {
    /// Options for a single fix.
    pub fn one_shot_options(&self) -> PositionOptions {
        PositionOptions {
            enable_high_accuracy: self.high_accuracy,
            timeout: Duration::from_millis(self.timeout_ms),
            maximum_age: Duration::from_secs(self.one_shot_max_age_secs),
        }
    }

    /// Options for a continuous watch.
    pub fn watch_options(&self) -> PositionOptions {
        PositionOptions {
            enable_high_accuracy: self.high_accuracy,
            timeout: Duration::from_millis(self.timeout_ms),
            maximum_age: Duration::from_secs(self.watch_max_age_secs),
        }
    }

    /// Platform for hosts without device geolocation: the fixed location
    /// when one is configured, otherwise none at all.
    pub fn headless_platform(&self) -> Arc<dyn GeolocationPlatform> {
        match self.fixed_location {
            Some(location) => Arc::new(FixedPosition::new(location)),
            None => Arc::new(NoGeolocation),
        }
    }
}

// =============================================================================
// Discovery Settings
// =============================================================================

/// Defaults for nearby-shop discovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoverySettings {
    #[serde(default = "default_radius")]
    pub default_radius_km: f64,

    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_radius() -> f64 {
    DEFAULT_SEARCH_RADIUS_KM
}
fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        DiscoverySettings {
            default_radius_km: default_radius(),
            page_size: default_page_size(),
        }
    }
}

// =============================================================================
// Identity Provider Settings
// =============================================================================

/// Web config of the identity provider (Firebase) the UI signs in with.
///
/// The client never talks to the provider itself; these values are handed
/// to the UI, which exchanges the provider token via `AuthService::login`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentitySettings {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub auth_domain: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub storage_bucket: String,
    #[serde(default)]
    pub messaging_sender_id: String,
    #[serde(default)]
    pub app_id: String,
}

impl IdentitySettings {
    /// Returns true once the provider has been configured.
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty() && !self.project_id.is_empty()
    }
}

// =============================================================================
// App Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,

    #[serde(default = "default_app_version")]
    pub version: String,
}

fn default_app_name() -> String {
    "HyperLocal Marketplace".to_string()
}
fn default_app_version() -> String {
    "1.0.0".to_string()
}

impl Default for AppSettings {
    fn default() -> Self {
        AppSettings {
            name: default_app_name(),
            version: default_app_version(),
        }
    }
}

// =============================================================================
// Main Client Configuration
// =============================================================================

/// Complete client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub services: ServiceEndpoints,

    #[serde(default)]
    pub api: ApiSettings,

    #[serde(default)]
    pub geolocation: GeolocationSettings,

    #[serde(default)]
    pub discovery: DiscoverySettings,

    #[serde(default)]
    pub identity: IdentitySettings,

    #[serde(default)]
    pub app: AppSettings,
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (client.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ClientResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading client config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load client config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> ClientResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| ClientError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Client config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ClientResult<()> {
        for service in Service::ALL {
            let raw = self.services.url(service);
            let url = Url::parse(raw)
                .map_err(|e| ClientError::InvalidUrl(format!("{} service URL {}: {}", service, raw, e)))?;
            if url.scheme() != "http" && url.scheme() != "https" {
                return Err(ClientError::InvalidUrl(format!(
                    "{} service URL must start with http:// or https://, got: {}",
                    service, raw
                )));
            }
        }

        if self.api.timeout_secs == 0 {
            return Err(ClientError::InvalidConfig(
                "api.timeout_secs must be greater than 0".into(),
            ));
        }

        if self.geolocation.timeout_ms == 0 {
            return Err(ClientError::InvalidConfig(
                "geolocation.timeout_ms must be greater than 0".into(),
            ));
        }

        if self.discovery.page_size == 0 || self.discovery.page_size > MAX_PAGE_SIZE {
            return Err(ClientError::InvalidConfig(format!(
                "discovery.page_size must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }

        let radius = self.discovery.default_radius_km;
        if radius.is_nan() || radius <= 0.0 {
            return Err(ClientError::InvalidConfig(
                "discovery.default_radius_km must be positive".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        for service in Service::ALL {
            let var = format!("HYPERLOCAL_{}_SERVICE_URL", service.name().to_uppercase());
            if let Ok(url) = std::env::var(&var) {
                debug!(%service, url = %url, "Overriding service URL from environment");
                *self.services.url_mut(service) = url;
            }
        }

        if let Ok(timeout) = std::env::var("HYPERLOCAL_API_TIMEOUT_SECS") {
            if let Ok(t) = timeout.parse::<u64>() {
                self.api.timeout_secs = t;
            }
        }

        if let Ok(timeout) = std::env::var("HYPERLOCAL_GEO_TIMEOUT_MS") {
            if let Ok(t) = timeout.parse::<u64>() {
                debug!(timeout_ms = t, "Overriding geolocation timeout from environment");
                self.geolocation.timeout_ms = t;
            }
        }

        if let Ok(raw) = std::env::var("HYPERLOCAL_FIXED_LOCATION") {
            match parse_location(&raw) {
                Some(location) => {
                    debug!(%location, "Using fixed location from environment");
                    self.geolocation.fixed_location = Some(location);
                }
                None => warn!(value = %raw, "Ignoring malformed HYPERLOCAL_FIXED_LOCATION"),
            }
        }

        if let Ok(radius) = std::env::var("HYPERLOCAL_SEARCH_RADIUS_KM") {
            if let Ok(r) = radius.parse::<f64>() {
                self.discovery.default_radius_km = r;
            }
        }

        if let Ok(key) = std::env::var("HYPERLOCAL_FIREBASE_API_KEY") {
            self.identity.api_key = key;
        }
        if let Ok(project) = std::env::var("HYPERLOCAL_FIREBASE_PROJECT_ID") {
            self.identity.project_id = project;
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "hyperlocal", "marketplace")
            .map(|dirs| dirs.config_dir().join("client.toml"))
    }
}

/// Parses `"lat,lon"`.
fn parse_location(raw: &str) -> Option<Location> {
    let (lat, lon) = raw.split_once(',')?;
    let latitude = lat.trim().parse().ok()?;
    let longitude = lon.trim().parse().ok()?;
    hyperlocal_core::validation::validate_coordinates(latitude, longitude).ok()?;
    Some(Location::new(latitude, longitude))
}
