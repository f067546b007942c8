pub mod api;
pub mod auth;
pub mod catalog;
pub mod config;
pub mod entitlement;
pub mod error;

use std::sync::Arc;

use tracing::{info, warn};

pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;
pub use config::Settings;

pub use api::ApiClient;
pub use auth::{AuthService, FileTokenStore, LoginForm, MemoryTokenStore, RegisterForm, TokenStore};
pub use catalog::{CatalogFilter, Tool, ToolId, ToolStatus, UploadForm, UploadService};
pub use entitlement::{
    DownloadService, EntitlementTracker, HttpQuotaService, PaymentGateway, QuotaService, User,
};

use error::AuthError;

/// Everything one signed-in (or anonymous) user session needs, passed around
/// explicitly instead of living in globals.
pub struct Session {
    pub config: Arc<Settings>,
    pub auth: AuthService,
    pub uploads: UploadService,
    pub tracker: EntitlementTracker,
    quota: Arc<dyn QuotaService>,
}

impl Session {
    /// Session backed by the HTTP quota service and the file token store
    /// configured in `config`.
    pub fn new(
        config: Settings,
        payments: Arc<dyn PaymentGateway>,
        downloads: Arc<dyn DownloadService>,
    ) -> Result<Self> {
        let api = ApiClient::new(&config.api)?;
        let tokens: Arc<dyn TokenStore> = Arc::new(FileTokenStore::new(
            config.storage.token_path.clone(),
            config.storage.token_key.clone(),
        ));
        let quota: Arc<dyn QuotaService> = Arc::new(HttpQuotaService::new(api.clone()));
        Ok(Self::assemble(config, api, payments, downloads, quota, tokens))
    }

    pub fn with_services(
        config: Settings,
        payments: Arc<dyn PaymentGateway>,
        downloads: Arc<dyn DownloadService>,
        quota: Arc<dyn QuotaService>,
        tokens: Arc<dyn TokenStore>,
    ) -> Result<Self> {
        let api = ApiClient::new(&config.api)?;
        Ok(Self::assemble(config, api, payments, downloads, quota, tokens))
    }

    fn assemble(
        config: Settings,
        api: ApiClient,
        payments: Arc<dyn PaymentGateway>,
        downloads: Arc<dyn DownloadService>,
        quota: Arc<dyn QuotaService>,
        tokens: Arc<dyn TokenStore>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            auth: AuthService::new(api.clone(), tokens.clone()),
            uploads: UploadService::new(api, tokens),
            tracker: EntitlementTracker::new(payments, downloads),
            quota,
        }
    }

    /// Log in, then pull the account snapshot so quota and entitlements
    /// reflect the server before anything else happens.
    pub async fn login(&self, form: &LoginForm) -> Result<User> {
        let token = self.auth.login(form).await?;
        self.sync(&token).await
    }

    pub async fn register(&self, form: &RegisterForm) -> Result<()> {
        self.auth.register(form).await
    }

    /// Resume a session from a persisted token, if there is one.
    ///
    /// A token whose claims show it has expired is cleared and reported as
    /// `TokenExpired`; opaque tokens are tried against the server.
    pub async fn restore(&self) -> Result<Option<User>> {
        let token = match self.auth.current_token().await? {
            Some(token) => token,
            None => return Ok(None),
        };

        if auth::peek_claims(&token).map_or(false, |claims| claims.is_expired()) {
            warn!("Persisted token has expired; clearing it");
            self.auth.logout().await?;
            return Err(AuthError::TokenExpired.into());
        }

        info!("Restoring session from persisted token");
        self.sync(&token).await.map(Some)
    }

    /// Re-fetch the account snapshot, e.g. after a plan upgrade.
    pub async fn refresh(&self) -> Result<User> {
        let token = self
            .auth
            .current_token()
            .await?
            .ok_or(AuthError::Unauthenticated)?;
        self.sync(&token).await
    }

    pub async fn logout(&self) -> Result<()> {
        self.auth.logout().await?;
        self.tracker.sign_out().await;
        Ok(())
    }

    pub async fn upload(&self, form: UploadForm) -> Result<()> {
        self.uploads.upload(form).await
    }

    /// Whether the "running low on downloads" notice should show.
    pub async fn quota_warning(&self) -> bool {
        let ratio = self.config.downloads.quota_warning_ratio;
        self.tracker
            .quota()
            .await
            .map_or(false, |quota| quota.is_near_limit(ratio))
    }

    async fn sync(&self, token: &str) -> Result<User> {
        let snapshot = self.quota.fetch_snapshot(token).await?;
        let user = snapshot.user.clone();
        self.tracker.refresh_quota(snapshot).await;
        Ok(user)
    }
}
