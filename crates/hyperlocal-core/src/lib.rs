//! # hyperlocal-core: Pure Domain Model for the HyperLocal Client
//!
//! This crate holds everything about the marketplace client that can be
//! expressed without I/O: wire types shared with the backend services,
//! great-circle distance math for shop discovery, role-based access
//! decisions, and input validation.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     HyperLocal Client Architecture                      │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Browser / Desktop UI                         │   │
//! │  │     Login ──► Discover (customer) ──► Dashboard (seller)        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ subscribe / notify                     │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  hyperlocal-client (I/O layer)                  │   │
//! │  │  SessionController · LocationController · ApiClient · Storage   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ hyperlocal-core (THIS CRATE) ★                   │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │    geo    │  │  access   │  │ validation│  │   │
//! │  │   │   User    │  │ Haversine │  │ home_path │  │  coords   │  │   │
//! │  │   │   Shop    │  │ distances │  │ RouteAcc. │  │  forms    │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO STORAGE • NO NETWORK • PURE FUNCTIONS            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Wire types (User, Shop, InventoryItem, Location, ...)
//! - [`geo`] - Haversine distance and distance formatting
//! - [`access`] - Role-based landing pages and route guards
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use hyperlocal_core::geo::{distance_km, format_distance};
//! use hyperlocal_core::Location;
//!
//! let origin = Location::new(0.0, 0.0);
//! let shop = Location::new(0.0, 1.0);
//!
//! let km = distance_km(&origin, &shop);
//! assert!((km - 111.19).abs() < 0.1);
//! assert_eq!(format_distance(0.25), "250m");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod access;
pub mod error;
pub mod geo;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, LocationError, LocationErrorKind, ValidationError};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Mean Earth radius used by the Haversine formula, in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Default search radius for nearby shop discovery (km).
pub const DEFAULT_SEARCH_RADIUS_KM: f64 = 10.0;

/// Default page size for paginated listings.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Largest page size the backend services accept.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Path of the login entry point. Every forced sign-out lands here.
pub const LOGIN_PATH: &str = "/login";

/// Path shown when an authenticated user lacks the role for a page.
pub const UNAUTHORIZED_PATH: &str = "/unauthorized";
