//! # REST Transport
//!
//! One [`ApiClient`] per backend service, all sharing one
//! [`UnauthorizedGate`].
//!
//! ## Request Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  caller ──► ApiClient::get/post/put/patch/delete                        │
//! │                 │                                                       │
//! │                 ├── token in AppStorage? ──► Authorization: Bearer …    │
//! │                 ▼                                                       │
//! │            reqwest (30s timeout) ──────────────► backend service        │
//! │                 │                                                       │
//! │        ┌────────┼─────────────────────┬───────────────────────┐         │
//! │        ▼        ▼                     ▼                       ▼         │
//! │      2xx     no response           401                 other status     │
//! │     decode   Network{500}     UnauthorizedGate         Network{status}  │
//! │                               ├─ clear token/user/location              │
//! │                               ├─ navigator.redirect("/login")           │
//! │                               ├─ broadcast UnauthorizedEvent            │
//! │                               └─ Err(Unauthorized) to the caller        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every failure is normalized to [`ApiError`] `{message, status, details}`.
//! Nothing here retries.

use std::fmt;
use std::sync::Arc;

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use url::Url;

use hyperlocal_core::{ApiError, LOGIN_PATH};

use crate::config::{ApiSettings, Service};
use crate::error::{ClientError, ClientResult};
use crate::storage::AppStorage;

/// Message used when neither the body nor the transport says anything.
pub const FALLBACK_ERROR_MESSAGE: &str = "An error occurred";

const EVENT_CHANNEL_CAPACITY: usize = 16;

// =============================================================================
// Navigation Seam
// =============================================================================

/// Forced navigation, implemented by the UI shell.
pub trait Navigator: Send + Sync {
    fn redirect(&self, path: &str);
}

/// Navigator for headless use: records the redirect in the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn redirect(&self, path: &str) {
        info!(path, "Navigation requested");
    }
}

// =============================================================================
// Unauthorized Gate
// =============================================================================

/// Broadcast whenever any service answers 401.
#[derive(Debug, Clone)]
pub struct UnauthorizedEvent {
    pub service: Service,
    pub path: String,
    pub error: ApiError,
}

/// The single place a 401 is handled.
///
/// The persisted session is cleared and the UI is sent to the login page
/// before the error is returned to the caller. In-memory session state is
/// reset by whoever subscribes, see
/// [`crate::session::SessionController::follow_unauthorized`].
pub struct UnauthorizedGate {
    storage: AppStorage,
    navigator: Arc<dyn Navigator>,
    events: broadcast::Sender<UnauthorizedEvent>,
}

impl fmt::Debug for UnauthorizedGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnauthorizedGate")
            .field("subscribers", &self.events.receiver_count())
            .finish_non_exhaustive()
    }
}

impl UnauthorizedGate {
    pub fn new(storage: AppStorage, navigator: Arc<dyn Navigator>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        UnauthorizedGate {
            storage,
            navigator,
            events,
        }
    }

    /// Receives every future 401.
    pub fn subscribe(&self) -> broadcast::Receiver<UnauthorizedEvent> {
        self.events.subscribe()
    }

    fn trip(&self, event: UnauthorizedEvent) {
        warn!(
            service = %event.service,
            path = %event.path,
            message = %event.error.message,
            "Unauthorized response, signing out"
        );

        self.storage.remove_auth_token();
        self.storage.remove_user_data();
        self.storage.remove_location();
        self.navigator.redirect(LOGIN_PATH);

        // No subscribers is fine; storage is already cleared
        let _ = self.events.send(event);
    }
}

// =============================================================================
// HTTP Client
// =============================================================================

/// Builds the shared reqwest client with the configured timeouts.
pub fn build_http_client(settings: &ApiSettings) -> ClientResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(settings.timeout())
        .connect_timeout(settings.connect_timeout())
        .build()
        .map_err(|e| ClientError::HttpClient(e.to_string()))
}

/// Client for one backend service.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    service: Service,
    storage: AppStorage,
    gate: Arc<UnauthorizedGate>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("service", &self.service)
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    pub fn new(
        service: Service,
        base_url: &str,
        http: reqwest::Client,
        storage: AppStorage,
        gate: Arc<UnauthorizedGate>,
    ) -> ClientResult<Self> {
        let base_url = Url::parse(base_url)?;
        Ok(ApiClient {
            http,
            base_url,
            service,
            storage,
            gate,
        })
    }

    pub fn service(&self) -> Service {
        self.service
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // =========================================================================
    // Verbs
    // =========================================================================

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        self.send(Method::GET, path, &[], None::<&()>).await
    }

    pub async fn get_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> ClientResult<T> {
        self.send(Method::GET, path, query, None::<&()>).await
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> ClientResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(Method::POST, path, &[], Some(body)).await
    }

    /// POST without a body.
    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        self.send(Method::POST, path, &[], None::<&()>).await
    }

    pub async fn put<T, B>(&self, path: &str, body: &B) -> ClientResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(Method::PUT, path, &[], Some(body)).await
    }

    pub async fn patch<T, B>(&self, path: &str, body: &B) -> ClientResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(Method::PATCH, path, &[], Some(body)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        self.send(Method::DELETE, path, &[], None::<&()>).await
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn endpoint(&self, path: &str, query: &[(&str, String)]) -> ClientResult<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        let mut url = Url::parse(&format!("{}/{}", base, path))?;

        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }

        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.storage.auth_token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send<T, B>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> ClientResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.endpoint(path, query)?;
        debug!(service = %self.service, %method, %url, "Sending request");

        let mut request = self.authorize(self.http.request(method, url));
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                let error = normalize_error(None, "", Some(&e.to_string()));
                warn!(service = %self.service, path, error = %e, "Request failed without a response");
                return Err(ClientError::Network(error));
            }
        };

        let status = response.status();
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                let error = normalize_error(Some(status.as_u16()), "", Some(&e.to_string()));
                return Err(ClientError::Network(error));
            }
        };

        if status.is_success() {
            return decode_body(&text);
        }

        let error = normalize_error(Some(status.as_u16()), &text, None);

        if status == StatusCode::UNAUTHORIZED {
            self.gate.trip(UnauthorizedEvent {
                service: self.service,
                path: path.to_string(),
                error: error.clone(),
            });
            return Err(ClientError::Unauthorized(error));
        }

        debug!(service = %self.service, path, status = error.status, message = %error.message, "Request rejected");
        Err(ClientError::Network(error))
    }
}

// =============================================================================
// Pure Helpers
// =============================================================================

/// Decodes a success body. An empty body decodes as JSON `null`, so `()`
/// and `Option<T>` work for 204 responses.
pub fn decode_body<T: DeserializeOwned>(text: &str) -> ClientResult<T> {
    let text = if text.trim().is_empty() { "null" } else { text };
    serde_json::from_str(text).map_err(ClientError::from)
}

/// Reduces a failed exchange to `{message, status, details}`.
///
/// ## Message Precedence
/// 1. `message` field of a JSON body
/// 2. `detail` field of a JSON body
/// 3. transport error text (no response, unreadable body)
/// 4. `Request failed with status code N`
/// 5. [`FALLBACK_ERROR_MESSAGE`]
///
/// A missing status becomes 500. A non-JSON body is kept as a string in
/// `details`.
pub fn normalize_error(status: Option<u16>, body: &str, transport_message: Option<&str>) -> ApiError {
    let details = if body.trim().is_empty() {
        None
    } else {
        Some(serde_json::from_str::<Value>(body).unwrap_or_else(|_| Value::String(body.to_string())))
    };

    let from_body = details.as_ref().and_then(|d| {
        ["message", "detail"]
            .iter()
            .filter_map(|field| d.get(*field).and_then(Value::as_str))
            .find(|s| !s.is_empty())
            .map(str::to_string)
    });

    let message = from_body
        .or_else(|| transport_message.filter(|m| !m.is_empty()).map(str::to_string))
        .or_else(|| status.map(|s| format!("Request failed with status code {}", s)))
        .unwrap_or_else(|| FALLBACK_ERROR_MESSAGE.to_string());

    ApiError {
        message,
        status: status.unwrap_or(500),
        details,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
