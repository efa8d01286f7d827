//! # Persisted Key-Value Store
//!
//! Typed, never-failing access to the four persisted slots.
//!
//! ## Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SessionController      LocationController      ApiClient (401 gate)   │
//! │          │                      │                       │               │
//! │          └──────────────────────┼───────────────────────┘               │
//! │                                 ▼                                       │
//! │  AppStorage  ── typed slots, JSON encoding, failures logged & absorbed │
//! │                                 │                                       │
//! │                                 ▼                                       │
//! │  StorageBackend ── MemoryBackend | FileBackend | (browser bridge)      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Failure Policy
//! - read failure or malformed JSON → `None`
//! - write failure → no-op, and the slot is emptied so no stale value lingers
//! - every failure is logged with `warn!`

mod backend;

pub use backend::{FileBackend, MemoryBackend, StorageBackend};

use std::fmt;
use std::sync::Arc;

use hyperlocal_core::{Location, Theme, User};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

// =============================================================================
// Storage Keys
// =============================================================================

/// The persisted slots. No caller ever spells out a raw key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    AuthToken,
    UserData,
    Location,
    Theme,
}

impl StorageKey {
    /// Every slot, in a fixed order.
    pub const ALL: [StorageKey; 4] = [
        StorageKey::AuthToken,
        StorageKey::UserData,
        StorageKey::Location,
        StorageKey::Theme,
    ];

    /// Namespaced key text in the backend.
    pub const fn as_str(&self) -> &'static str {
        match self {
            StorageKey::AuthToken => "hyperlocal_auth_token",
            StorageKey::UserData => "hyperlocal_user_data",
            StorageKey::Location => "hyperlocal_location",
            StorageKey::Theme => "hyperlocal_theme",
        }
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const PROBE_KEY: &str = "__hyperlocal_storage_probe__";

// =============================================================================
// App Storage
// =============================================================================

/// Shared handle over a [`StorageBackend`]. Cheap to clone.
///
/// Nothing here returns an error. Values are stored as JSON text.
#[derive(Clone)]
pub struct AppStorage {
    backend: Arc<dyn StorageBackend>,
}

impl fmt::Debug for AppStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppStorage").finish_non_exhaustive()
    }
}

impl AppStorage {
    pub fn new(backend: impl StorageBackend + 'static) -> Self {
        AppStorage {
            backend: Arc::new(backend),
        }
    }

    pub fn from_arc(backend: Arc<dyn StorageBackend>) -> Self {
        AppStorage { backend }
    }

    /// Non-persistent storage.
    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::new())
    }

    // =========================================================================
    // Generic Access
    // =========================================================================

    /// Reads and decodes a slot. Absent, unreadable and malformed all read
    /// as `None`.
    pub fn get<T: DeserializeOwned>(&self, key: StorageKey) -> Option<T> {
        let raw = match self.backend.get_item(key.as_str()) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(%key, error = %e, "Error reading from storage");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(%key, error = %e, "Malformed value in storage");
                None
            }
        }
    }

    /// Encodes and writes a slot.
    ///
    /// If the write fails the slot is emptied, so a later `get` returns
    /// `None` rather than whatever was there before.
    pub fn set<T: Serialize + ?Sized>(&self, key: StorageKey, value: &T) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(%key, error = %e, "Could not encode value for storage");
                self.remove(key);
                return;
            }
        };

        if let Err(e) = self.backend.set_item(key.as_str(), &raw) {
            warn!(%key, error = %e, "Error writing to storage");
            self.remove(key);
        }
    }

    /// Empties a slot.
    pub fn remove(&self, key: StorageKey) {
        if let Err(e) = self.backend.remove_item(key.as_str()) {
            warn!(%key, error = %e, "Error removing from storage");
        }
    }

    /// Empties the whole backend, including entries written by others.
    pub fn clear(&self) {
        if let Err(e) = self.backend.clear() {
            warn!(error = %e, "Error clearing storage");
        }
    }

    /// Empties this application's slots only.
    pub fn clear_all(&self) {
        for key in StorageKey::ALL {
            self.remove(key);
        }
        debug!("Cleared all app storage slots");
    }

    /// Returns true if a write-then-remove probe succeeds.
    pub fn is_available(&self) -> bool {
        self.backend.set_item(PROBE_KEY, PROBE_KEY).is_ok()
            && self.backend.remove_item(PROBE_KEY).is_ok()
    }

    // =========================================================================
    // Typed Slots
    // =========================================================================

    pub fn auth_token(&self) -> Option<String> {
        self.get(StorageKey::AuthToken)
    }

    pub fn set_auth_token(&self, token: &str) {
        self.set(StorageKey::AuthToken, token)
    }

    pub fn remove_auth_token(&self) {
        self.remove(StorageKey::AuthToken)
    }

    pub fn user_data(&self) -> Option<User> {
        self.get(StorageKey::UserData)
    }

    pub fn set_user_data(&self, user: &User) {
        self.set(StorageKey::UserData, user)
    }

    pub fn remove_user_data(&self) {
        self.remove(StorageKey::UserData)
    }

    pub fn location(&self) -> Option<Location> {
        self.get(StorageKey::Location)
    }

    pub fn set_location(&self, location: &Location) {
        self.set(StorageKey::Location, location)
    }

    pub fn remove_location(&self) {
        self.remove(StorageKey::Location)
    }

    /// Saved theme, [`Theme::Light`] when nothing usable is stored.
    pub fn theme(&self) -> Theme {
        self.get(StorageKey::Theme).unwrap_or_default()
    }

    pub fn set_theme(&self, theme: Theme) {
        self.set(StorageKey::Theme, &theme)
    }
}

impl Default for AppStorage {
    fn default() -> Self {
        Self::in_memory()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
