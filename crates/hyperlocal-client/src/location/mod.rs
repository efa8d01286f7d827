//! # Location
//!
//! ```text
//! ┌──────────────────────┐     ┌──────────────────┐     ┌─────────────────────┐
//! │ GeolocationPlatform  │────►│ LocationProvider │────►│ LocationController  │
//! │ (device / fixed /    │     │ permission, fix, │     │ Idle/Loading/Ready/ │
//! │  none)               │     │ watch, timeouts  │     │ Error + AppStorage  │
//! └──────────────────────┘     └──────────────────┘     └─────────────────────┘
//! ```

mod controller;
pub mod platform;
mod provider;

pub use controller::{LocationController, LocationOptions, LocationStatus};
pub use platform::{
    Coordinates, FixedPosition, GeolocationPlatform, NoGeolocation, PermissionState, PlatformWatch, Position,
    PositionError, PositionErrorCode, PositionOptions, PositionUpdate, WatchId,
};
pub use provider::{Capability, LocationProvider, LocationWatch, WatchHandle};
