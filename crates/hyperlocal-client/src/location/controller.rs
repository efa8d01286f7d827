//! # Location Controller
//!
//! Owns the in-memory location state for a screen that needs it.
//!
//! ```text
//!            mount (cached)
//!   Idle ─────────────────────────────────────────────► Ready(loc)
//!    │                                                   ▲    │
//!    │ mount / request_location                          │    │ request_location
//!    ▼                                                   │    ▼
//!  Loading ──permission granted, fix ok (persist)────────┘  Loading
//!    │
//!    └──unsupported / permission refused / fix failed──► Error{kind, message}
//!                                                          │
//!                                          clear_error ────┴──► Idle
//! ```
//!
//! Every request and every watch event takes a new generation number.
//! A completion is applied only if its generation is still the newest,
//! so a slow request cannot overwrite a later one. After `teardown`
//! (or drop) nothing transitions.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::watch;
use tracing::{debug, error};

use hyperlocal_core::{Location, LocationError, LocationErrorKind};

use super::provider::{LocationProvider, WatchHandle};
use crate::storage::AppStorage;

// =============================================================================
// State
// =============================================================================

#[derive(Debug, Clone, PartialEq, Default)]
pub enum LocationStatus {
    #[default]
    Idle,
    Loading,
    Ready(Location),
    Error {
        kind: LocationErrorKind,
        message: String,
    },
}

impl LocationStatus {
    pub fn from_error(error: &LocationError) -> Self {
        LocationStatus::Error {
            kind: error.kind(),
            message: error.to_string(),
        }
    }

    pub fn location(&self) -> Option<Location> {
        match self {
            LocationStatus::Ready(location) => Some(*location),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, LocationStatus::Loading)
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            LocationStatus::Error { message, .. } => Some(message),
            _ => None,
        }
    }
}

/// Mount-time behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationOptions {
    /// Keep a continuous watch running until teardown.
    pub watch: bool,
    /// Read the cached location at mount and write every new fix.
    pub persist: bool,
}

impl Default for LocationOptions {
    fn default() -> Self {
        LocationOptions {
            watch: false,
            persist: true,
        }
    }
}

impl LocationOptions {
    pub fn watching() -> Self {
        LocationOptions {
            watch: true,
            ..Self::default()
        }
    }
}

// =============================================================================
// Controller
// =============================================================================

struct Inner {
    provider: LocationProvider,
    storage: AppStorage,
    options: LocationOptions,
    status: watch::Sender<LocationStatus>,
    generation: AtomicU64,
    torn_down: AtomicBool,
    active_watch: Mutex<Option<WatchHandle>>,
}

impl Inner {
    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Applies `next` if `generation` is still the newest and the controller
    /// is live. Returns whether it was applied.
    fn transition(&self, generation: u64, next: LocationStatus) -> bool {
        self.transition_with(generation, next, || {})
    }

    /// Like [`transition`](Self::transition), running `on_apply` under the
    /// channel lock once the result is known to be current. Side effects
    /// made there are ordered the same way as the published states.
    fn transition_with(&self, generation: u64, next: LocationStatus, on_apply: impl FnOnce()) -> bool {
        let mut applied = false;
        self.status.send_if_modified(|current| {
            if self.torn_down.load(Ordering::SeqCst) || self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            applied = true;
            on_apply();
            if *current == next {
                return false;
            }
            debug!(from = ?current, to = ?next, "Location state transition");
            *current = next;
            true
        });
        if !applied {
            debug!(generation, "Discarded stale location result");
        }
        applied
    }

    fn accept(&self, generation: u64, location: Location) {
        self.transition_with(generation, LocationStatus::Ready(location), || {
            if self.options.persist {
                self.storage.set_location(&location);
            }
        });
    }

    fn fail(&self, generation: u64, error: &LocationError) {
        if let LocationError::Unavailable(reason) = error {
            error!(%reason, "Unexpected geolocation failure");
        }
        self.transition(generation, LocationStatus::from_error(error));
    }

    fn on_watch_update(&self, location: Location) {
        let generation = self.next_generation();
        self.accept(generation, location);
    }

    fn on_watch_error(&self, error: LocationError) {
        let generation = self.next_generation();
        self.fail(generation, &error);
    }

    fn teardown(&self) {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }
        let handle = self.active_watch.lock().ok().and_then(|mut slot| slot.take());
        if let Some(mut handle) = handle {
            handle.cancel();
        }
        debug!("Location controller torn down");
    }
}

/// Location state for one consumer. Dropping it tears it down.
pub struct LocationController {
    inner: Arc<Inner>,
}

impl fmt::Debug for LocationController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocationController")
            .field("status", &*self.inner.status.borrow())
            .field("options", &self.inner.options)
            .field("torn_down", &self.inner.torn_down.load(Ordering::SeqCst))
            .finish()
    }
}

impl LocationController {
    pub fn new(provider: LocationProvider, storage: AppStorage, options: LocationOptions) -> Self {
        let (status, _) = watch::channel(LocationStatus::Idle);
        LocationController {
            inner: Arc::new(Inner {
                provider,
                storage,
                options,
                status,
                generation: AtomicU64::new(0),
                torn_down: AtomicBool::new(false),
                active_watch: Mutex::new(None),
            }),
        }
    }

    /// Restores the cached location or fetches a fresh one, and starts the
    /// continuous watch when configured.
    pub async fn mount(&self) {
        let cached = if self.inner.options.persist {
            self.inner.storage.location()
        } else {
            None
        };

        if let Some(location) = cached {
            debug!(%location, "Restored cached location");
            let generation = self.inner.next_generation();
            self.inner.transition(generation, LocationStatus::Ready(location));
        }

        if self.inner.options.watch {
            self.start_watch();
        }

        if cached.is_none() {
            self.request_location().await;
        }
    }

    /// Asks for permission, then for one fix.
    pub async fn request_location(&self) {
        let inner = &self.inner;
        if inner.torn_down.load(Ordering::SeqCst) {
            return;
        }

        let generation = inner.next_generation();

        if !inner.provider.is_supported() {
            inner.fail(generation, &LocationError::Unsupported);
            return;
        }

        inner.transition(generation, LocationStatus::Loading);

        if !inner.provider.request_permission().await {
            inner.fail(generation, &LocationError::permission_not_granted());
            return;
        }

        match inner.provider.get_current_location().await {
            Ok(location) => inner.accept(generation, location),
            Err(e) => inner.fail(generation, &e),
        }
    }

    /// `Error` becomes `Idle`; other states are left alone.
    pub fn clear_error(&self) {
        if self.inner.torn_down.load(Ordering::SeqCst) {
            return;
        }
        self.inner.status.send_if_modified(|current| {
            if matches!(current, LocationStatus::Error { .. }) {
                *current = LocationStatus::Idle;
                true
            } else {
                false
            }
        });
    }

    pub fn subscribe(&self) -> watch::Receiver<LocationStatus> {
        self.inner.status.subscribe()
    }

    pub fn status(&self) -> LocationStatus {
        self.inner.status.borrow().clone()
    }

    pub fn location(&self) -> Option<Location> {
        self.inner.status.borrow().location()
    }

    pub fn is_supported(&self) -> bool {
        self.inner.provider.is_supported()
    }

    pub fn is_watching(&self) -> bool {
        self.inner
            .active_watch
            .lock()
            .map(|slot| slot.as_ref().is_some_and(WatchHandle::is_active))
            .unwrap_or(false)
    }

    /// Cancels the watch and freezes the state. Idempotent.
    pub fn teardown(&self) {
        self.inner.teardown();
    }

    fn start_watch(&self) {
        let on_update: Weak<Inner> = Arc::downgrade(&self.inner);
        let on_error = on_update.clone();

        let handle = self.inner.provider.watch(
            move |location| {
                if let Some(inner) = on_update.upgrade() {
                    inner.on_watch_update(location);
                }
            },
            move |e| {
                if let Some(inner) = on_error.upgrade() {
                    inner.on_watch_error(e);
                }
            },
        );

        let previous = match self.inner.active_watch.lock() {
            Ok(mut slot) => slot.replace(handle),
            Err(_) => Some(handle),
        };
        if let Some(mut previous) = previous {
            previous.cancel();
        }
    }
}

impl Drop for LocationController {
    fn drop(&mut self) {
        self.inner.teardown();
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::platform::scripted::ScriptedPlatform;
    use crate::location::platform::{NoGeolocation, PermissionState, Position};
    use std::time::Duration;

    fn controller(platform: &Arc<ScriptedPlatform>, storage: &AppStorage, options: LocationOptions) -> LocationController {
        LocationController::new(LocationProvider::new(platform.clone()), storage.clone(), options)
    }

    #[tokio::test]
    async fn test_mount_restores_cached_location() {
        let platform = Arc::new(ScriptedPlatform::new());
        let storage = AppStorage::in_memory();
        storage.set_location(&Location::new(12.97, 77.59));

        let controller = controller(&platform, &storage, LocationOptions::default());
        controller.mount().await;

        assert_eq!(controller.status(), LocationStatus::Ready(Location::new(12.97, 77.59)));
        assert_eq!(platform.calls(), 0);
    }

    #[tokio::test]
    async fn test_mount_fetches_and_persists() {
        let platform = Arc::new(ScriptedPlatform::new());
        platform.push_fix(19.07, 72.87);
        let storage = AppStorage::in_memory();

        let controller = controller(&platform, &storage, LocationOptions::default());
        controller.mount().await;

        assert_eq!(controller.location(), Some(Location::new(19.07, 72.87)));
        assert_eq!(storage.location(), Some(Location::new(19.07, 72.87)));
    }

    #[tokio::test]
    async fn test_persist_off_ignores_cache() {
        let platform = Arc::new(ScriptedPlatform::new());
        platform.push_fix(2.0, 2.0);
        let storage = AppStorage::in_memory();
        storage.set_location(&Location::new(1.0, 1.0));

        let options = LocationOptions {
            persist: false,
            ..LocationOptions::default()
        };
        let controller = controller(&platform, &storage, options);
        controller.mount().await;

        assert_eq!(controller.location(), Some(Location::new(2.0, 2.0)));
        assert_eq!(storage.location(), Some(Location::new(1.0, 1.0)));
        assert_eq!(platform.calls(), 1);
    }

    #[tokio::test]
    async fn test_denied_permission_never_reaches_ready() {
        let platform = Arc::new(ScriptedPlatform::new());
        platform.set_permission(Ok(PermissionState::Denied));
        platform.push_fix(1.0, 1.0);
        let storage = AppStorage::in_memory();

        let controller = controller(&platform, &storage, LocationOptions::default());
        controller.mount().await;

        assert_eq!(
            controller.status(),
            LocationStatus::Error {
                kind: LocationErrorKind::PermissionDenied,
                message: "Location permission denied".into(),
            }
        );
        assert_eq!(platform.calls(), 0);
        assert_eq!(storage.location(), None);
    }

    #[tokio::test]
    async fn test_unsupported_platform() {
        let storage = AppStorage::in_memory();
        let controller = LocationController::new(
            LocationProvider::new(Arc::new(NoGeolocation)),
            storage,
            LocationOptions::default(),
        );
        controller.mount().await;

        assert!(!controller.is_supported());
        assert_eq!(controller.status(), LocationStatus::from_error(&LocationError::Unsupported));
        assert_eq!(
            controller.status().error_message(),
            Some("Geolocation is not supported by this browser")
        );
    }

    #[tokio::test]
    async fn test_fallback_permission_costs_an_extra_fetch() {
        let platform = Arc::new(ScriptedPlatform::without_permissions_api());
        platform.push_fix(1.0, 1.0);
        platform.push_fix(3.0, 4.0);
        let storage = AppStorage::in_memory();

        let controller = controller(&platform, &storage, LocationOptions::default());
        controller.request_location().await;

        assert_eq!(platform.calls(), 2);
        assert_eq!(controller.location(), Some(Location::new(3.0, 4.0)));
    }

    #[tokio::test]
    async fn test_fix_failure_and_clear_error() {
        let platform = Arc::new(ScriptedPlatform::new());
        platform.push_error(3);
        let storage = AppStorage::in_memory();

        let controller = controller(&platform, &storage, LocationOptions::default());
        controller.request_location().await;

        assert_eq!(controller.status(), LocationStatus::from_error(&LocationError::Timeout));
        assert_eq!(controller.status().error_message(), Some("Location request timed out"));

        controller.clear_error();
        assert_eq!(controller.status(), LocationStatus::Idle);

        // Not an error: nothing to clear
        platform.push_fix(5.0, 5.0);
        controller.request_location().await;
        controller.clear_error();
        assert_eq!(controller.location(), Some(Location::new(5.0, 5.0)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_request_is_discarded() {
        let platform = Arc::new(ScriptedPlatform::new());
        platform.push_delayed(Duration::from_secs(5), Ok(Position::new(1.0, 1.0, None)));
        platform.push_delayed(Duration::from_secs(1), Ok(Position::new(2.0, 2.0, None)));
        let storage = AppStorage::in_memory();

        let controller = controller(&platform, &storage, LocationOptions::default());
        tokio::join!(controller.request_location(), controller.request_location());

        assert_eq!(platform.calls(), 2);
        assert_eq!(controller.location(), Some(Location::new(2.0, 2.0)));
        assert_eq!(storage.location(), Some(Location::new(2.0, 2.0)));
    }

    #[tokio::test]
    async fn test_watch_updates_until_teardown() {
        let platform = Arc::new(ScriptedPlatform::new());
        let storage = AppStorage::in_memory();
        storage.set_location(&Location::new(1.0, 1.0));

        let controller = controller(&platform, &storage, LocationOptions::watching());
        let mut rx = controller.subscribe();
        controller.mount().await;
        rx.borrow_and_update();
        assert!(controller.is_watching());
        assert_eq!(platform.watch_count(), 1);

        platform.emit(Ok(Position::new(2.0, 2.0, None)));
        rx.changed().await.unwrap();
        assert_eq!(controller.location(), Some(Location::new(2.0, 2.0)));
        assert_eq!(storage.location(), Some(Location::new(2.0, 2.0)));

        platform.emit(Err(crate::location::PositionError::new(
            crate::location::PositionErrorCode::PositionUnavailable,
            "lost signal",
        )));
        rx.changed().await.unwrap();
        assert_eq!(
            controller.status(),
            LocationStatus::from_error(&LocationError::PositionUnavailable)
        );

        controller.teardown();
        assert_eq!(platform.cleared().len(), 1);
        assert!(!controller.is_watching());

        platform.emit(Ok(Position::new(9.0, 9.0, None)));
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(
            controller.status(),
            LocationStatus::from_error(&LocationError::PositionUnavailable)
        );
        assert_eq!(storage.location(), Some(Location::new(2.0, 2.0)));

        // Frozen after teardown
        controller.clear_error();
        controller.request_location().await;
        assert!(controller.status().error_message().is_some());
        controller.teardown();
        assert_eq!(platform.cleared().len(), 1);
    }

    #[tokio::test]
    async fn test_drop_cancels_watch() {
        let platform = Arc::new(ScriptedPlatform::new());
        let storage = AppStorage::in_memory();
        storage.set_location(&Location::new(1.0, 1.0));

        let controller = controller(&platform, &storage, LocationOptions::watching());
        controller.mount().await;
        drop(controller);

        assert_eq!(platform.cleared().len(), 1);
    }

    #[test]
    fn test_concurrent_watch_updates_persist_the_published_fix() {
        let platform = Arc::new(ScriptedPlatform::new());
        let storage = AppStorage::in_memory();
        let controller = controller(&platform, &storage, LocationOptions::default());
        let inner = &controller.inner;

        for round in 0..50 {
            std::thread::scope(|scope| {
                for worker in 0..4 {
                    scope.spawn(move || {
                        for step in 0..25 {
                            let offset = f64::from(round * 100 + worker * 25 + step);
                            inner.on_watch_update(Location::new(offset / 1000.0, 1.0));
                        }
                    });
                }
            });
            assert_eq!(storage.location(), controller.location());
        }
    }
}
