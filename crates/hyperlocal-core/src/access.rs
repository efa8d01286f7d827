//! # Access Module
//!
//! Role-based landing pages and route guard decisions.
//!
//! The routing table itself belongs to the UI; this module only answers
//! "where does this user go" and "may this user see this page".
//!
//! ## Guard Decision
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  is_loading?  ──yes──►  Loading          (render a spinner, wait)       │
//! │      │no                                                                │
//! │  user?        ──none─►  RedirectToLogin  (/login)                       │
//! │      │some                                                              │
//! │  role allowed? ──no──►  Forbidden        (/unauthorized)                │
//! │      │yes                                                               │
//! │  Allowed                                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::types::{User, UserRole};
use crate::{LOGIN_PATH, UNAUTHORIZED_PATH};

/// Landing page for a signed-in user of the given role.
pub const fn home_path(role: UserRole) -> &'static str {
    match role {
        UserRole::Customer => "/customer/discover",
        UserRole::Seller => "/seller/dashboard",
        UserRole::Admin => "/admin/dashboard",
    }
}

/// Outcome of guarding a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RouteAccess {
    /// Session is still hydrating; no decision yet.
    Loading,
    /// Nobody is signed in.
    RedirectToLogin,
    /// Signed in, but the role is not in the allowed set.
    Forbidden,
    /// Render the page.
    Allowed,
}

impl RouteAccess {
    /// Decides access for `user` to a page restricted to `required_roles`.
    ///
    /// An empty `required_roles` means any signed-in user may enter.
    pub fn evaluate(user: Option<&User>, is_loading: bool, required_roles: &[UserRole]) -> Self {
        if is_loading {
            return RouteAccess::Loading;
        }

        match user {
            None => RouteAccess::RedirectToLogin,
            Some(user) if required_roles.is_empty() || required_roles.contains(&user.role) => {
                RouteAccess::Allowed
            }
            Some(_) => RouteAccess::Forbidden,
        }
    }

    /// Path the UI should navigate to, if any.
    pub fn redirect(&self) -> Option<&'static str> {
        match self {
            RouteAccess::RedirectToLogin => Some(LOGIN_PATH),
            RouteAccess::Forbidden => Some(UNAUTHORIZED_PATH),
            RouteAccess::Loading | RouteAccess::Allowed => None,
        }
    }
}
