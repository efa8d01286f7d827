//! Auth and profile endpoints on the user service.

use async_trait::async_trait;
use tracing::{debug, info};

use hyperlocal_core::validation::{validate_display_name, validate_email, validate_phone, validate_register_form};
use hyperlocal_core::{AuthTokens, LoginForm, RegisterForm, TokenVerification, User, UserUpdate};

use crate::error::ClientResult;
use crate::session::UserSource;
use crate::transport::ApiClient;

#[derive(Debug, Clone)]
pub struct AuthService {
    client: ApiClient,
}

impl AuthService {
    pub fn new(client: ApiClient) -> Self {
        AuthService { client }
    }

    /// Exchanges an identity-provider token for backend tokens.
    pub async fn login(&self, firebase_token: &str) -> ClientResult<AuthTokens> {
        let form = LoginForm {
            firebase_token: firebase_token.to_string(),
        };
        let tokens: AuthTokens = self.client.post("/auth/login", &form).await?;
        info!(user_id = tokens.user_id, role = %tokens.role, "Backend login succeeded");
        Ok(tokens)
    }

    pub async fn register(&self, form: &RegisterForm) -> ClientResult<AuthTokens> {
        validate_register_form(form)?;
        let tokens: AuthTokens = self.client.post("/auth/register", form).await?;
        info!(user_id = tokens.user_id, role = %tokens.role, "Registered new account");
        Ok(tokens)
    }

    pub async fn current_user(&self) -> ClientResult<User> {
        self.client.get("/users/me").await
    }

    pub async fn update_profile(&self, update: &UserUpdate) -> ClientResult<User> {
        if let Some(name) = &update.name {
            validate_display_name(name)?;
        }
        if let Some(email) = &update.email {
            validate_email(email)?;
        }
        if let Some(phone) = &update.phone {
            validate_phone(phone)?;
        }
        self.client.put("/users/me", update).await
    }

    /// Checks the stored token. Any failure reads as `valid: false`.
    pub async fn verify_token(&self) -> TokenVerification {
        match self.client.get::<User>("/auth/verify-token").await {
            Ok(user) => TokenVerification {
                valid: true,
                user: Some(user),
            },
            Err(e) => {
                debug!(error = %e, "Token verification failed");
                TokenVerification { valid: false, user: None }
            }
        }
    }

    pub async fn refresh_token(&self) -> ClientResult<AuthTokens> {
        self.client.post_empty("/auth/refresh-token").await
    }
}

#[async_trait]
impl UserSource for AuthService {
    async fn current_user(&self) -> ClientResult<User> {
        AuthService::current_user(self).await
    }
}
