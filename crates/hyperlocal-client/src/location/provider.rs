//! # Location Provider
//!
//! Normalizes a [`GeolocationPlatform`] into one-shot fetch, permission
//! check and continuous watch, with errors reduced to [`LocationError`].
//!
//! ## Capability Detection
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  resolved once, at construction                                         │
//! │                                                                         │
//! │  geolocation? ──no──►  Unsupported      every call fails / false        │
//! │       │yes                                                              │
//! │  permissions? ──yes─►  PermissionsApi   query; only "granted" counts    │
//! │       │no                                                               │
//! │       └────────────►  Fallback         permission = one fetch succeeds │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Watch Lifecycle
//! ```text
//! watch_stream() ──► LocationWatch (Stream) ──cancel()/drop──► clear_watch(id)
//! watch(cb, cb)  ──► WatchHandle  (task)    ──cancel()/drop──► clear_watch(id)
//! ```
//! Both paths release the platform watch exactly once.

use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, warn};

use hyperlocal_core::{Location, LocationError};

use super::platform::{
    GeolocationPlatform, PermissionState, PositionError, PositionErrorCode, PositionOptions,
    PositionUpdate, WatchId,
};
use crate::config::GeolocationSettings;

// =============================================================================
// Capability
// =============================================================================

/// What the platform can do, detected once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// No geolocation at all.
    Unsupported,
    /// Geolocation plus a permission query.
    PermissionsApi,
    /// Geolocation without a permission query.
    Fallback,
}

impl Capability {
    pub fn detect(platform: &dyn GeolocationPlatform) -> Self {
        if !platform.geolocation_available() {
            Capability::Unsupported
        } else if platform.permissions_available() {
            Capability::PermissionsApi
        } else {
            Capability::Fallback
        }
    }
}

/// Maps a platform error to the client taxonomy. `other` covers codes
/// outside the standard three.
fn map_position_error(error: &PositionError, other: fn() -> LocationError) -> LocationError {
    match error.code {
        PositionErrorCode::PermissionDenied => LocationError::access_denied(),
        PositionErrorCode::PositionUnavailable => LocationError::PositionUnavailable,
        PositionErrorCode::Timeout => LocationError::Timeout,
        PositionErrorCode::Other(_) => other(),
    }
}

// =============================================================================
// Provider
// =============================================================================

/// Cheap to clone; clones share the platform.
#[derive(Clone)]
pub struct LocationProvider {
    platform: Arc<dyn GeolocationPlatform>,
    capability: Capability,
    one_shot: PositionOptions,
    watch: PositionOptions,
}

impl fmt::Debug for LocationProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocationProvider")
            .field("capability", &self.capability)
            .field("one_shot", &self.one_shot)
            .field("watch", &self.watch)
            .finish_non_exhaustive()
    }
}

impl LocationProvider {
    /// Provider with the default options (10 s timeout, 5 min / 1 min cache).
    pub fn new(platform: Arc<dyn GeolocationPlatform>) -> Self {
        Self::with_options(platform, PositionOptions::one_shot(), PositionOptions::watch())
    }

    pub fn from_settings(platform: Arc<dyn GeolocationPlatform>, settings: &GeolocationSettings) -> Self {
        Self::with_options(platform, settings.one_shot_options(), settings.watch_options())
    }

    pub fn with_options(
        platform: Arc<dyn GeolocationPlatform>,
        one_shot: PositionOptions,
        watch: PositionOptions,
    ) -> Self {
        let capability = Capability::detect(platform.as_ref());
        debug!(?capability, "Geolocation capability detected");
        LocationProvider {
            platform,
            capability,
            one_shot,
            watch,
        }
    }

    pub fn capability(&self) -> Capability {
        self.capability
    }

    /// True iff the platform has a geolocation capability.
    pub fn is_supported(&self) -> bool {
        self.capability != Capability::Unsupported
    }

    /// Asks whether location may be read. Never fails.
    ///
    /// With a permission query only `Granted` counts; `Prompt` is `false`.
    /// Without one, a single fetch is attempted and its success is the answer.
    pub async fn request_permission(&self) -> bool {
        match self.capability {
            Capability::Unsupported => false,
            Capability::PermissionsApi => match self.platform.query_permission().await {
                Ok(state) => {
                    debug!(?state, "Geolocation permission state");
                    state == PermissionState::Granted
                }
                Err(e) => {
                    warn!(error = %e, "Permission query failed");
                    false
                }
            },
            Capability::Fallback => self.get_current_location().await.is_ok(),
        }
    }

    /// Requests one fix.
    pub async fn get_current_location(&self) -> Result<Location, LocationError> {
        if !self.is_supported() {
            return Err(LocationError::Unsupported);
        }

        let request = self.platform.current_position(&self.one_shot);
        match tokio::time::timeout(self.one_shot.timeout, request).await {
            Ok(Ok(position)) => {
                debug!(
                    accuracy = ?position.coords.accuracy,
                    "Received location fix"
                );
                Ok(position.location())
            }
            Ok(Err(e)) => {
                debug!(error = %e, "Location fix failed");
                Err(map_position_error(&e, LocationError::unable_to_get))
            }
            Err(_) => {
                debug!(timeout = ?self.one_shot.timeout, "Location fix timed out");
                Err(LocationError::Timeout)
            }
        }
    }

    /// Starts a continuous watch as a lazy, non-restartable stream.
    ///
    /// On an unsupported platform the stream yields a single
    /// `Err(Unsupported)` and ends.
    pub fn watch_stream(&self) -> LocationWatch {
        if !self.is_supported() {
            return LocationWatch {
                registration: None,
                updates: None,
                unsupported_pending: true,
            };
        }

        let watch = self.platform.watch_position(&self.watch);
        debug!(watch_id = watch.id.0, "Location watch started");

        LocationWatch {
            registration: Some(Arc::new(Registration {
                id: watch.id,
                platform: self.platform.clone(),
                released: AtomicBool::new(false),
            })),
            updates: Some(watch.updates),
            unsupported_pending: false,
        }
    }

    /// Starts a continuous watch delivering to callbacks.
    ///
    /// On an unsupported platform `on_error` runs before this returns and the
    /// handle is the inert sentinel. Otherwise callbacks run on a spawned
    /// task, so this must be called inside a Tokio runtime.
    pub fn watch<U, E>(&self, mut on_update: U, mut on_error: E) -> WatchHandle
    where
        U: FnMut(Location) + Send + 'static,
        E: FnMut(LocationError) + Send + 'static,
    {
        if !self.is_supported() {
            on_error(LocationError::Unsupported);
            return WatchHandle::unsupported();
        }

        let mut stream = self.watch_stream();
        let registration = stream.registration.clone();

        let task = tokio::spawn(async move {
            while let Some(update) = stream.next().await {
                match update {
                    Ok(location) => on_update(location),
                    Err(e) => on_error(e),
                }
            }
        });

        WatchHandle {
            registration,
            task: Some(task),
        }
    }

    /// Cancels a watch. Idempotent; the sentinel handle is a no-op.
    pub fn clear_watch(&self, handle: &mut WatchHandle) {
        handle.cancel();
    }
}

// =============================================================================
// Watch Registration
// =============================================================================

/// Shared by a stream and its handle so the platform watch is cleared once.
struct Registration {
    id: WatchId,
    platform: Arc<dyn GeolocationPlatform>,
    released: AtomicBool,
}

impl Registration {
    fn release(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            self.platform.clear_watch(self.id);
            debug!(watch_id = self.id.0, "Location watch cleared");
        }
    }
}

// =============================================================================
// Stream Form
// =============================================================================

/// Continuous location updates. Dropping the stream cancels the watch.
pub struct LocationWatch {
    registration: Option<Arc<Registration>>,
    updates: Option<mpsc::UnboundedReceiver<PositionUpdate>>,
    unsupported_pending: bool,
}

impl fmt::Debug for LocationWatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocationWatch")
            .field("id", &self.registration.as_ref().map(|r| r.id))
            .field("active", &self.is_active())
            .finish()
    }
}

impl LocationWatch {
    /// Platform watch id, `None` for the unsupported sentinel.
    pub fn id(&self) -> Option<WatchId> {
        self.registration.as_ref().map(|r| r.id)
    }

    pub fn is_active(&self) -> bool {
        self.updates.is_some()
    }

    /// Stops the watch. Later polls return `None`. Idempotent.
    pub fn cancel(&mut self) {
        self.updates = None;
        self.unsupported_pending = false;
        if let Some(registration) = &self.registration {
            registration.release();
        }
    }
}

impl Stream for LocationWatch {
    type Item = Result<Location, LocationError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.unsupported_pending {
            self.unsupported_pending = false;
            return Poll::Ready(Some(Err(LocationError::Unsupported)));
        }

        let Some(updates) = self.updates.as_mut() else {
            return Poll::Ready(None);
        };

        match updates.poll_recv(cx) {
            Poll::Ready(Some(Ok(position))) => Poll::Ready(Some(Ok(position.location()))),
            Poll::Ready(Some(Err(e))) => {
                debug!(error = %e, "Location watch error");
                Poll::Ready(Some(Err(map_position_error(&e, LocationError::unable_to_watch))))
            }
            Poll::Ready(None) => {
                self.updates = None;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for LocationWatch {
    fn drop(&mut self) {
        self.cancel();
    }
}

// =============================================================================
// Callback Form
// =============================================================================

/// Handle returned by [`LocationProvider::watch`]. Dropping it cancels.
pub struct WatchHandle {
    registration: Option<Arc<Registration>>,
    task: Option<JoinHandle<()>>,
}

impl fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHandle")
            .field("id", &self.registration.as_ref().map(|r| r.id))
            .field("active", &self.is_active())
            .finish()
    }
}

impl WatchHandle {
    /// The sentinel returned on platforms without geolocation.
    pub fn unsupported() -> Self {
        WatchHandle {
            registration: None,
            task: None,
        }
    }

    pub fn is_unsupported(&self) -> bool {
        self.registration.is_none()
    }

    pub fn is_active(&self) -> bool {
        self.task.is_some()
    }

    /// Stops delivery and clears the platform watch. Idempotent.
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if let Some(registration) = &self.registration {
            registration.release();
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
