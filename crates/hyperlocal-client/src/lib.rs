//! # hyperlocal-client: Session, Location and Service Layer
//!
//! Everything the marketplace UI needs that touches the outside world:
//! persisted storage, the authenticated HTTP transport, typed service
//! clients, and the two state machines the screens observe.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        hyperlocal-client                                │
//! │                                                                         │
//! │  ┌──────────────────────┐            ┌──────────────────────────────┐  │
//! │  │  SessionController   │◄──401 evt──│  UnauthorizedGate            │  │
//! │  │  hydrate/login/...   │            │  clear slots, go to /login   │  │
//! │  └──────────┬───────────┘            └──────────────▲───────────────┘  │
//! │             │ UserSource                            │                   │
//! │  ┌──────────▼───────────┐            ┌──────────────┴───────────────┐  │
//! │  │  services::*         │───────────►│  ApiClient (reqwest)         │  │
//! │  │  auth/customer/seller│            │  bearer token, ApiError      │  │
//! │  └──────────────────────┘            └──────────────────────────────┘  │
//! │                                                                         │
//! │  ┌──────────────────────┐            ┌──────────────────────────────┐  │
//! │  │  LocationController  │───────────►│  LocationProvider            │  │
//! │  │  Idle/Loading/Ready  │            │  GeolocationPlatform         │  │
//! │  └──────────┬───────────┘            └──────────────────────────────┘  │
//! │             │                                                           │
//! │  ┌──────────▼───────────────────────────────────────────────────────┐  │
//! │  │  AppStorage: hyperlocal_auth_token · _user_data · _location ·    │  │
//! │  │              _theme   (MemoryBackend / FileBackend)              │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wiring
//! ```rust,ignore
//! let config = ClientConfig::load_or_default(None);
//! let storage = AppStorage::new(FileBackend::open_default()?);
//! let services = Services::new(&config, storage.clone(), Arc::new(LogNavigator))?;
//!
//! let session = SessionController::new(storage.clone(), Arc::new(services.auth()));
//! session.follow_unauthorized(services.subscribe_unauthorized());
//! session.hydrate().await;
//!
//! let platform = config.geolocation.headless_platform();
//! let provider = LocationProvider::from_settings(platform, &config.geolocation);
//! let location = LocationController::new(provider, storage, LocationOptions::default());
//! location.mount().await;
//! ```

pub mod config;
pub mod error;
pub mod location;
pub mod services;
pub mod session;
pub mod storage;
pub mod telemetry;
pub mod transport;

pub use config::{ClientConfig, Service};
pub use error::{ClientError, ClientResult, StorageError};
pub use location::{
    Capability, FixedPosition, GeolocationPlatform, LocationController, LocationOptions, LocationProvider,
    LocationStatus, LocationWatch, NoGeolocation, WatchHandle,
};
pub use services::{AuthService, CustomerService, NearbyQuery, PageRequest, SellerService, Services};
pub use session::{Session, SessionController, SessionStatus, UserSource};
pub use storage::{AppStorage, FileBackend, MemoryBackend, StorageBackend, StorageKey};
pub use transport::{ApiClient, LogNavigator, Navigator, UnauthorizedEvent, UnauthorizedGate};
