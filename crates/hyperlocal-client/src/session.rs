//! # Session Controller
//!
//! Who is signed in, derived from the persisted token and user slots and
//! confirmed against the user service.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Hydrating ──token + cached user──► GET /users/me ──ok──► Authenticated │
//! │      │                                   │                     │        │
//! │      │ either slot missing               │ err (incl. 401)     │        │
//! │      ▼                                   ▼                     │        │
//! │  Anonymous ◄──────────── clear token + user ◄──── logout / 401 ┘        │
//! │      │                                                                  │
//! │      └──login(tokens)──► store token ──► GET /users/me ──ok──► store    │
//! │                                              │ err                user  │
//! │                                              └──► clear both, return err│
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A 401 from any service is handled by the transport's
//! [`UnauthorizedGate`](crate::transport::UnauthorizedGate), which clears
//! storage and redirects. [`SessionController::follow_unauthorized`] keeps
//! the in-memory session in step with it.

use std::fmt;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use hyperlocal_core::access::RouteAccess;
use hyperlocal_core::{AuthTokens, User, UserRole, UserUpdate};

use crate::error::ClientResult;
use crate::storage::AppStorage;
use crate::transport::UnauthorizedEvent;

// =============================================================================
// User Source
// =============================================================================

/// Remote "who am I" lookup.
#[async_trait]
pub trait UserSource: Send + Sync {
    async fn current_user(&self) -> ClientResult<User>;
}

// =============================================================================
// State
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum SessionStatus {
    Hydrating,
    Anonymous,
    Authenticated(User),
}

/// Snapshot published to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user: Option<User>,
    pub is_loading: bool,
}

impl Default for Session {
    fn default() -> Self {
        Session {
            user: None,
            is_loading: true,
        }
    }
}

impl Session {
    pub fn status(&self) -> SessionStatus {
        match (&self.user, self.is_loading) {
            (_, true) => SessionStatus::Hydrating,
            (Some(user), false) => SessionStatus::Authenticated(user.clone()),
            (None, false) => SessionStatus::Anonymous,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn has_role(&self, role: UserRole) -> bool {
        self.user.as_ref().is_some_and(|user| user.role == role)
    }

    pub fn has_any_role(&self, roles: &[UserRole]) -> bool {
        self.user.as_ref().is_some_and(|user| roles.contains(&user.role))
    }

    /// Route decision for a page restricted to `required_roles`.
    pub fn route_access(&self, required_roles: &[UserRole]) -> RouteAccess {
        RouteAccess::evaluate(self.user.as_ref(), self.is_loading, required_roles)
    }
}

// =============================================================================
// Controller
// =============================================================================

struct Inner {
    storage: AppStorage,
    source: Arc<dyn UserSource>,
    state: watch::Sender<Session>,
}

impl Inner {
    fn publish(&self, user: Option<User>, is_loading: bool) {
        self.state.send_if_modified(|session| {
            let next = Session { user, is_loading };
            if *session == next {
                return false;
            }
            *session = next;
            true
        });
    }

    fn logout(&self) {
        self.state.send_if_modified(|session| {
            let changed = session.user.is_some() || session.is_loading;
            session.user = None;
            session.is_loading = false;
            changed
        });
        self.storage.remove_auth_token();
        self.storage.remove_user_data();
        self.storage.remove_location();
    }
}

/// Shared handle; clones observe and drive the same session.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Inner>,
}

impl fmt::Debug for SessionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionController")
            .field("session", &*self.inner.state.borrow())
            .finish_non_exhaustive()
    }
}

impl SessionController {
    /// Starts in `Hydrating`; call [`hydrate`](Self::hydrate) once at startup.
    pub fn new(storage: AppStorage, source: Arc<dyn UserSource>) -> Self {
        let (state, _) = watch::channel(Session::default());
        SessionController {
            inner: Arc::new(Inner { storage, source, state }),
        }
    }

    /// Restores the session from storage and confirms it remotely.
    pub async fn hydrate(&self) -> SessionStatus {
        let inner = &self.inner;
        inner.publish(None, true);

        let token = inner.storage.auth_token();
        let cached = inner.storage.user_data();

        match (token, cached) {
            (Some(_), Some(cached)) => {
                debug!(user_id = cached.id, "Confirming cached session");
                match inner.source.current_user().await {
                    Ok(fresh) => {
                        inner.storage.set_user_data(&fresh);
                        info!(user_id = fresh.id, role = %fresh.role, "Session restored");
                        inner.publish(Some(fresh), false);
                    }
                    Err(e) => {
                        warn!(error = %e, "Stored session rejected, clearing it");
                        inner.storage.remove_auth_token();
                        inner.storage.remove_user_data();
                        inner.publish(None, false);
                    }
                }
            }
            (Some(_), None) => {
                debug!("Token without cached user, clearing it");
                inner.storage.remove_auth_token();
                inner.publish(None, false);
            }
            (None, _) => {
                debug!("No stored session");
                inner.publish(None, false);
            }
        }

        self.status()
    }

    /// Stores the token and loads the user. On failure both slots are
    /// cleared, the session is anonymous and the error is returned.
    pub async fn login(&self, tokens: &AuthTokens) -> ClientResult<User> {
        let inner = &self.inner;
        inner.storage.set_auth_token(&tokens.access_token);

        match inner.source.current_user().await {
            Ok(user) => {
                inner.storage.set_user_data(&user);
                info!(user_id = user.id, role = %user.role, "Signed in");
                inner.publish(Some(user.clone()), false);
                Ok(user)
            }
            Err(e) => {
                warn!(error = %e, "Sign-in failed, rolling back");
                inner.storage.remove_auth_token();
                inner.storage.remove_user_data();
                inner.publish(None, false);
                Err(e)
            }
        }
    }

    /// Clears the session and the cached location. Idempotent.
    pub fn logout(&self) {
        info!("Signed out");
        self.inner.logout();
    }

    /// Merges `update` into the signed-in user and persists it. No-op when
    /// anonymous; nothing is sent to the backend.
    pub fn update_user(&self, update: &UserUpdate) {
        let mut updated = None;
        self.inner.state.send_if_modified(|session| {
            let Some(user) = session.user.as_mut() else {
                return false;
            };
            user.apply(update);
            updated = Some(user.clone());
            true
        });

        match updated {
            Some(user) => self.inner.storage.set_user_data(&user),
            None => debug!("update_user ignored, no session"),
        }
    }

    pub fn has_role(&self, role: UserRole) -> bool {
        self.inner.state.borrow().has_role(role)
    }

    pub fn has_any_role(&self, roles: &[UserRole]) -> bool {
        self.inner.state.borrow().has_any_role(roles)
    }

    pub fn route_access(&self, required_roles: &[UserRole]) -> RouteAccess {
        self.inner.state.borrow().route_access(required_roles)
    }

    pub fn user(&self) -> Option<User> {
        self.inner.state.borrow().user.clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.inner.state.borrow().status()
    }

    pub fn session(&self) -> Session {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.inner.state.subscribe()
    }

    /// Signs the in-memory session out on every unauthorized event.
    ///
    /// The task ends when the sender side closes or every controller
    /// handle is dropped.
    pub fn follow_unauthorized(&self, mut events: broadcast::Receiver<UnauthorizedEvent>) -> JoinHandle<()> {
        let inner: Weak<Inner> = Arc::downgrade(&self.inner);

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        debug!(service = %event.service, path = %event.path, "Unauthorized event");
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        debug!(missed, "Unauthorized events lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }

                match inner.upgrade() {
                    Some(inner) => inner.logout(),
                    None => break,
                }
            }
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use crate::services::tests::services_for;
    use crate::transport::tests::spawn_server;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use chrono::Utc;
    use hyperlocal_core::{ApiError, Location, LOGIN_PATH};
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn user(id: i64, name: &str, role: UserRole) -> User {
        User {
            id,
            firebase_uid: format!("fb-{}", id),
            name: name.to_string(),
            email: None,
            phone: Some("+919876543210".into()),
            role,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn tokens() -> AuthTokens {
        AuthTokens {
            access_token: "jwt-1".into(),
            token_type: "bearer".into(),
            user_id: 1,
            role: UserRole::Customer,
        }
    }

    /// Answers `current_user` from a queue; `Err(status)` becomes a client error.
    #[derive(Default)]
    struct ScriptedSource {
        answers: Mutex<VecDeque<Result<User, u16>>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn answering(answers: Vec<Result<User, u16>>) -> Arc<Self> {
            Arc::new(ScriptedSource {
                answers: Mutex::new(answers.into()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl UserSource for ScriptedSource {
        async fn current_user(&self) -> ClientResult<User> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let answer = self.answers.lock().unwrap().pop_front();
            match answer {
                Some(Ok(user)) => Ok(user),
                Some(Err(401)) => Err(ClientError::Unauthorized(ApiError::new(401, "Token expired"))),
                Some(Err(status)) => Err(ClientError::Network(ApiError::new(status, "Request failed"))),
                None => Err(ClientError::Network(ApiError::new(500, "Network Error"))),
            }
        }
    }

    fn controller(storage: &AppStorage, source: &Arc<ScriptedSource>) -> SessionController {
        SessionController::new(storage.clone(), source.clone())
    }

    #[tokio::test]
    async fn test_starts_hydrating() {
        let session = controller(&AppStorage::in_memory(), &ScriptedSource::answering(vec![]));
        assert_eq!(session.status(), SessionStatus::Hydrating);
        assert_eq!(session.route_access(&[]), RouteAccess::Loading);
    }

    #[tokio::test]
    async fn test_hydrate_refreshes_cached_user() {
        let storage = AppStorage::in_memory();
        storage.set_auth_token("jwt-1");
        storage.set_user_data(&user(1, "Old Name", UserRole::Customer));

        let fresh = user(1, "New Name", UserRole::Customer);
        let source = ScriptedSource::answering(vec![Ok(fresh.clone())]);
        let session = controller(&storage, &source);

        assert_eq!(session.hydrate().await, SessionStatus::Authenticated(fresh.clone()));
        assert_eq!(storage.user_data(), Some(fresh));
        assert_eq!(storage.auth_token().as_deref(), Some("jwt-1"));
    }

    #[tokio::test]
    async fn test_hydrate_with_rejected_token_clears_session() {
        let storage = AppStorage::in_memory();
        storage.set_auth_token("jwt-1");
        storage.set_user_data(&user(1, "Asha", UserRole::Customer));
        storage.set_location(&Location::new(12.9, 77.6));

        let source = ScriptedSource::answering(vec![Err(401)]);
        let session = controller(&storage, &source);

        assert_eq!(session.hydrate().await, SessionStatus::Anonymous);
        assert_eq!(storage.auth_token(), None);
        assert_eq!(storage.user_data(), None);
        // Only logout drops the cached location
        assert!(storage.location().is_some());
    }

    #[tokio::test]
    async fn test_hydrate_network_failure_also_clears() {
        let storage = AppStorage::in_memory();
        storage.set_auth_token("jwt-1");
        storage.set_user_data(&user(1, "Asha", UserRole::Customer));

        let session = controller(&storage, &ScriptedSource::answering(vec![Err(503)]));

        assert_eq!(session.hydrate().await, SessionStatus::Anonymous);
        assert_eq!(storage.auth_token(), None);
    }

    #[tokio::test]
    async fn test_hydrate_without_both_slots_skips_network() {
        let storage = AppStorage::in_memory();
        let source = ScriptedSource::answering(vec![]);
        let session = controller(&storage, &source);

        assert_eq!(session.hydrate().await, SessionStatus::Anonymous);

        storage.set_user_data(&user(1, "Asha", UserRole::Customer));
        assert_eq!(session.hydrate().await, SessionStatus::Anonymous);

        storage.remove_user_data();
        storage.set_auth_token("orphan");
        assert_eq!(session.hydrate().await, SessionStatus::Anonymous);
        assert_eq!(storage.auth_token(), None);

        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_login_success_persists_user() {
        let storage = AppStorage::in_memory();
        let asha = user(1, "Asha", UserRole::Seller);
        let session = controller(&storage, &ScriptedSource::answering(vec![Ok(asha.clone())]));
        session.hydrate().await;

        assert_eq!(session.login(&tokens()).await.unwrap(), asha);
        assert_eq!(session.status(), SessionStatus::Authenticated(asha.clone()));
        assert_eq!(storage.auth_token().as_deref(), Some("jwt-1"));
        assert_eq!(storage.user_data(), Some(asha));

        assert!(session.has_role(UserRole::Seller));
        assert!(!session.has_role(UserRole::Admin));
        assert!(session.has_any_role(&[UserRole::Admin, UserRole::Seller]));
        assert!(!session.has_any_role(&[]));
        assert_eq!(session.route_access(&[UserRole::Customer]), RouteAccess::Forbidden);
    }

    #[tokio::test]
    async fn test_login_failure_rolls_back() {
        let storage = AppStorage::in_memory();
        let session = controller(&storage, &ScriptedSource::answering(vec![Err(500)]));
        session.hydrate().await;

        let err = session.login(&tokens()).await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert_eq!(session.status(), SessionStatus::Anonymous);
        assert_eq!(storage.auth_token(), None);
        assert_eq!(storage.user_data(), None);
        assert!(!session.has_any_role(&[UserRole::Customer]));
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let storage = AppStorage::in_memory();
        let session = controller(
            &storage,
            &ScriptedSource::answering(vec![Ok(user(1, "Asha", UserRole::Customer))]),
        );
        session.hydrate().await;
        session.login(&tokens()).await.unwrap();
        storage.set_location(&Location::new(12.9, 77.6));

        let mut rx = session.subscribe();
        rx.borrow_and_update();

        session.logout();
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();

        session.logout();
        assert!(!rx.has_changed().unwrap());

        assert_eq!(session.status(), SessionStatus::Anonymous);
        assert_eq!(storage.auth_token(), None);
        assert_eq!(storage.user_data(), None);
        assert_eq!(storage.location(), None);
        assert_eq!(session.route_access(&[]), RouteAccess::RedirectToLogin);
    }

    #[tokio::test]
    async fn test_update_user() {
        let storage = AppStorage::in_memory();
        let session = controller(
            &storage,
            &ScriptedSource::answering(vec![Ok(user(1, "Asha", UserRole::Customer))]),
        );
        let rename = UserUpdate {
            name: Some("Asha K".into()),
            ..UserUpdate::default()
        };

        // Anonymous: nothing happens
        session.hydrate().await;
        session.update_user(&rename);
        assert_eq!(storage.user_data(), None);

        session.login(&tokens()).await.unwrap();
        session.update_user(&rename);

        let updated = session.user().unwrap();
        assert_eq!(updated.name, "Asha K");
        assert_eq!(updated.phone.as_deref(), Some("+919876543210"));
        assert_eq!(storage.user_data(), Some(updated));
    }

    #[tokio::test]
    async fn test_follow_unauthorized_event() {
        let storage = AppStorage::in_memory();
        let session = controller(
            &storage,
            &ScriptedSource::answering(vec![Ok(user(1, "Asha", UserRole::Customer))]),
        );
        session.hydrate().await;
        session.login(&tokens()).await.unwrap();

        let (tx, rx) = broadcast::channel(4);
        let follower = session.follow_unauthorized(rx);
        let mut state = session.subscribe();
        state.borrow_and_update();

        tx.send(UnauthorizedEvent {
            service: crate::config::Service::Seller,
            path: "/shops/me".into(),
            error: ApiError::new(401, "Token expired"),
        })
        .unwrap();
        state.changed().await.unwrap();
        assert_eq!(session.status(), SessionStatus::Anonymous);

        drop(tx);
        follower.await.unwrap();
    }

    #[tokio::test]
    async fn test_any_service_401_signs_session_out() {
        let router = Router::new().route(
            "/preferences",
            get(|| async { (StatusCode::UNAUTHORIZED, Json(json!({ "detail": "Not authenticated" }))) }),
        );
        let base = spawn_server(router).await;
        let storage = AppStorage::in_memory();
        let (services, navigator) = services_for(&base, storage.clone());

        let session = controller(
            &storage,
            &ScriptedSource::answering(vec![Ok(user(1, "Asha", UserRole::Customer))]),
        );
        session.hydrate().await;
        session.login(&tokens()).await.unwrap();
        let _follower = session.follow_unauthorized(services.subscribe_unauthorized());
        let mut state = session.subscribe();
        state.borrow_and_update();

        let err = services.customer().preferences().await.unwrap_err();
        assert!(err.is_unauthorized());

        state.changed().await.unwrap();
        assert_eq!(session.status(), SessionStatus::Anonymous);
        assert_eq!(storage.auth_token(), None);
        assert_eq!(navigator.paths.lock().unwrap().as_slice(), [LOGIN_PATH.to_string()]);
    }
}
