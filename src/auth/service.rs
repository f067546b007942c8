use std::sync::Arc;

use serde::Deserialize;
use tracing::{error, info};

use crate::api::{self, read_json, ApiClient};
use crate::auth::token::TokenStore;
use crate::auth::validation::{LoginForm, RegisterForm};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct AuthResponse {
    pub token: String,
}

/// Client for the auth service. Forms are validated locally before any
/// request is issued.
pub struct AuthService {
    api: ApiClient,
    tokens: Arc<dyn TokenStore>,
}

impl AuthService {
    pub fn new(api: ApiClient, tokens: Arc<dyn TokenStore>) -> Self {
        Self { api, tokens }
    }

    /// Log in and persist the returned token.
    pub async fn login(&self, form: &LoginForm) -> Result<String, AppError> {
        form.validate().into_result()?;

        info!("Login request for email: {}", form.email);
        let res = match self.api.post_json(api::LOGIN_PATH, form).await {
            Ok(res) => res,
            Err(e) => {
                error!("Login failed for email: {}: {}", form.email, e);
                return Err(e);
            }
        };
        let AuthResponse { token } = read_json(res).await?;

        self.tokens.store(&token).await?;
        info!("Login successful for email: {}", form.email);
        Ok(token)
    }

    /// Register a new account. The backend does not issue a token here; the
    /// caller is expected to log in afterwards.
    pub async fn register(&self, form: &RegisterForm) -> Result<(), AppError> {
        form.validate().into_result()?;

        info!("Registration request for email: {}", form.email);
        match self.api.post_json(api::REGISTER_PATH, &form.request()).await {
            Ok(_) => {
                info!("Registration successful for email: {}", form.email);
                Ok(())
            }
            Err(e) => {
                error!("Registration failed for email: {}: {}", form.email, e);
                Err(e)
            }
        }
    }

    pub async fn logout(&self) -> Result<(), AppError> {
        self.tokens.clear().await?;
        info!("Logged out");
        Ok(())
    }

    pub async fn current_token(&self) -> Result<Option<String>, AppError> {
        self.tokens.load().await
    }
}
