//! # Geolocation Platform Seam
//!
//! The raw capability the provider wraps: a browser's `navigator.geolocation`
//! bridged from the UI shell, an OS location service, or one of the two
//! built-in platforms below.
//!
//! ## Platform Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  geolocation_available()   is there any capability at all?             │
//! │  permissions_available()   can permission be queried without a fix?    │
//! │  query_permission()        granted | denied | prompt                   │
//! │  current_position(opts)    one fix, or error code 1/2/3                │
//! │  watch_position(opts)      id + unbounded channel of fixes/errors      │
//! │  clear_watch(id)           stop delivering; idempotent                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::debug;

use hyperlocal_core::Location;

// =============================================================================
// Options
// =============================================================================

/// Accuracy, timeout and cache tolerance for a fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    pub enable_high_accuracy: bool,
    /// Time allowed to produce a fix.
    pub timeout: Duration,
    /// Oldest cached platform fix that may be returned instead of a new one.
    pub maximum_age: Duration,
}

impl PositionOptions {
    /// High accuracy, 10 s timeout, 5 minute cache tolerance.
    pub const fn one_shot() -> Self {
        PositionOptions {
            enable_high_accuracy: true,
            timeout: Duration::from_secs(10),
            maximum_age: Duration::from_secs(300),
        }
    }

    /// High accuracy, 10 s timeout, 1 minute cache tolerance.
    pub const fn watch() -> Self {
        PositionOptions {
            enable_high_accuracy: true,
            timeout: Duration::from_secs(10),
            maximum_age: Duration::from_secs(60),
        }
    }
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self::one_shot()
    }
}

// =============================================================================
// Positions & Errors
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
    /// Radius of uncertainty in meters, when the platform reports one.
    pub accuracy: Option<f64>,
}

/// A fix as delivered by the platform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub coords: Coordinates,
    pub timestamp: DateTime<Utc>,
}

impl Position {
    pub fn new(latitude: f64, longitude: f64, accuracy: Option<f64>) -> Self {
        Position {
            coords: Coordinates {
                latitude,
                longitude,
                accuracy,
            },
            timestamp: Utc::now(),
        }
    }

    /// Drops accuracy and timestamp.
    pub fn location(&self) -> Location {
        Location::new(self.coords.latitude, self.coords.longitude)
    }
}

/// The three standard geolocation error codes, plus anything else a
/// platform might report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionErrorCode {
    PermissionDenied,
    PositionUnavailable,
    Timeout,
    Other(u16),
}

impl PositionErrorCode {
    /// Maps the numeric codes used by the W3C API.
    pub fn from_code(code: u16) -> Self {
        match code {
            1 => PositionErrorCode::PermissionDenied,
            2 => PositionErrorCode::PositionUnavailable,
            3 => PositionErrorCode::Timeout,
            other => PositionErrorCode::Other(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionError {
    pub code: PositionErrorCode,
    /// Platform text; informational only.
    pub message: String,
}

impl PositionError {
    pub fn new(code: PositionErrorCode, message: impl Into<String>) -> Self {
        PositionError {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for PositionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

/// Answer of a permission query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    Granted,
    Denied,
    /// The user has not decided yet.
    Prompt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(pub u64);

pub type PositionUpdate = Result<Position, PositionError>;

/// A live platform watch. Updates keep arriving until `clear_watch(id)`.
#[derive(Debug)]
pub struct PlatformWatch {
    pub id: WatchId,
    pub updates: mpsc::UnboundedReceiver<PositionUpdate>,
}

// =============================================================================
// Platform Trait
// =============================================================================

#[async_trait]
pub trait GeolocationPlatform: Send + Sync {
    fn geolocation_available(&self) -> bool;

    fn permissions_available(&self) -> bool;

    async fn query_permission(&self) -> Result<PermissionState, PositionError>;

    async fn current_position(&self, options: &PositionOptions) -> Result<Position, PositionError>;

    /// Only called when `geolocation_available()` is true.
    fn watch_position(&self, options: &PositionOptions) -> PlatformWatch;

    /// Must tolerate unknown and already-cleared ids.
    fn clear_watch(&self, id: WatchId);
}

// =============================================================================
// Built-in Platforms
// =============================================================================

/// A platform with no geolocation capability.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoGeolocation;

fn unsupported() -> PositionError {
    PositionError::new(PositionErrorCode::Other(0), "geolocation unavailable")
}

#[async_trait]
impl GeolocationPlatform for NoGeolocation {
    fn geolocation_available(&self) -> bool {
        false
    }

    fn permissions_available(&self) -> bool {
        false
    }

    async fn query_permission(&self) -> Result<PermissionState, PositionError> {
        Err(unsupported())
    }

    async fn current_position(&self, _options: &PositionOptions) -> Result<Position, PositionError> {
        Err(unsupported())
    }

    fn watch_position(&self, _options: &PositionOptions) -> PlatformWatch {
        let (_tx, updates) = mpsc::unbounded_channel();
        PlatformWatch {
            id: WatchId(0),
            updates,
        }
    }

    fn clear_watch(&self, _id: WatchId) {}
}

/// A platform that always reports the same coordinates.
///
/// Used on desktop builds without a location service and in development
/// (see `HYPERLOCAL_FIXED_LOCATION`). Permission is always granted.
#[derive(Debug)]
pub struct FixedPosition {
    location: Location,
    next_id: AtomicU64,
    watchers: Mutex<HashMap<WatchId, mpsc::UnboundedSender<PositionUpdate>>>,
}

impl FixedPosition {
    pub fn new(location: Location) -> Self {
        FixedPosition {
            location,
            next_id: AtomicU64::new(1),
            watchers: Mutex::new(HashMap::new()),
        }
    }

    fn fix(&self) -> Position {
        Position::new(self.location.latitude, self.location.longitude, Some(0.0))
    }

    /// Number of watches not yet cleared.
    pub fn active_watches(&self) -> usize {
        self.watchers.lock().map(|w| w.len()).unwrap_or(0)
    }
}

#[async_trait]
impl GeolocationPlatform for FixedPosition {
    fn geolocation_available(&self) -> bool {
        true
    }

    fn permissions_available(&self) -> bool {
        true
    }

    async fn query_permission(&self) -> Result<PermissionState, PositionError> {
        Ok(PermissionState::Granted)
    }

    async fn current_position(&self, _options: &PositionOptions) -> Result<Position, PositionError> {
        Ok(self.fix())
    }

    fn watch_position(&self, _options: &PositionOptions) -> PlatformWatch {
        let id = WatchId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, updates) = mpsc::unbounded_channel();
        let _ = tx.send(Ok(self.fix()));

        // The sender is kept so the watch stays open until cleared
        if let Ok(mut watchers) = self.watchers.lock() {
            watchers.insert(id, tx);
        }

        PlatformWatch { id, updates }
    }

    fn clear_watch(&self, id: WatchId) {
        if let Ok(mut watchers) = self.watchers.lock() {
            if watchers.remove(&id).is_some() {
                debug!(watch_id = id.0, "Fixed position watch cleared");
            }
        }
    }
}

// =============================================================================
// Test Double
// =============================================================================

#[cfg(test)]
pub(crate) mod scripted {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;

    /// Platform whose answers are queued up front by the test.
    ///
    /// Watch senders are kept even after `clear_watch`, so tests can emit
    /// "late" updates after a controller has been torn down.
    pub(crate) struct ScriptedPlatform {
        pub geolocation: bool,
        pub permissions_api: bool,
        pub permission: Mutex<Result<PermissionState, PositionError>>,
        /// Answers for `current_position`, each with a delay.
        pub fixes: Mutex<VecDeque<(Duration, PositionUpdate)>>,
        pub watchers: Mutex<Vec<(WatchId, mpsc::UnboundedSender<PositionUpdate>)>>,
        pub cleared: Mutex<Vec<WatchId>>,
        pub current_calls: AtomicUsize,
        next_id: AtomicU64,
    }

    impl ScriptedPlatform {
        pub(crate) fn new() -> Self {
            ScriptedPlatform {
                geolocation: true,
                permissions_api: true,
                permission: Mutex::new(Ok(PermissionState::Granted)),
                fixes: Mutex::new(VecDeque::new()),
                watchers: Mutex::new(Vec::new()),
                cleared: Mutex::new(Vec::new()),
                current_calls: AtomicUsize::new(0),
                next_id: AtomicU64::new(1),
            }
        }

        pub(crate) fn without_permissions_api() -> Self {
            ScriptedPlatform {
                permissions_api: false,
                ..Self::new()
            }
        }

        pub(crate) fn set_permission(&self, answer: Result<PermissionState, PositionError>) {
            *self.permission.lock().unwrap() = answer;
        }

        pub(crate) fn push_fix(&self, latitude: f64, longitude: f64) {
            self.push_delayed(Duration::ZERO, Ok(Position::new(latitude, longitude, Some(5.0))));
        }

        pub(crate) fn push_error(&self, code: u16) {
            let error = PositionError::new(PositionErrorCode::from_code(code), "scripted failure");
            self.push_delayed(Duration::ZERO, Err(error));
        }

        pub(crate) fn push_delayed(&self, delay: Duration, answer: PositionUpdate) {
            self.fixes.lock().unwrap().push_back((delay, answer));
        }

        /// Sends to every watch ever opened, cleared or not.
        pub(crate) fn emit(&self, update: PositionUpdate) {
            for (_, tx) in self.watchers.lock().unwrap().iter() {
                let _ = tx.send(update.clone());
            }
        }

        pub(crate) fn watch_count(&self) -> usize {
            self.watchers.lock().unwrap().len()
        }

        pub(crate) fn cleared(&self) -> Vec<WatchId> {
            self.cleared.lock().unwrap().clone()
        }

        pub(crate) fn calls(&self) -> usize {
            self.current_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GeolocationPlatform for ScriptedPlatform {
        fn geolocation_available(&self) -> bool {
            self.geolocation
        }

        fn permissions_available(&self) -> bool {
            self.permissions_api
        }

        async fn query_permission(&self) -> Result<PermissionState, PositionError> {
            let answer = self.permission.lock().unwrap().clone();
            answer
        }

        async fn current_position(&self, _options: &PositionOptions) -> Result<Position, PositionError> {
            self.current_calls.fetch_add(1, Ordering::SeqCst);
            let next = self.fixes.lock().unwrap().pop_front();
            match next {
                Some((delay, answer)) => {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    answer
                }
                None => Err(PositionError::new(PositionErrorCode::PositionUnavailable, "no fix scripted")),
            }
        }

        fn watch_position(&self, _options: &PositionOptions) -> PlatformWatch {
            let id = WatchId(self.next_id.fetch_add(1, Ordering::SeqCst));
            let (tx, updates) = mpsc::unbounded_channel();
            self.watchers.lock().unwrap().push((id, tx));
            PlatformWatch { id, updates }
        }

        fn clear_watch(&self, id: WatchId) {
            self.cleared.lock().unwrap().push(id);
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
