//! Seams to the services the tracker depends on but does not implement.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::api::{self, ApiClient};
use crate::catalog::ToolId;
use crate::entitlement::models::ServerSnapshot;
use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRequest {
    pub tool_id: ToolId,
    pub tool_name: String,
    pub price: f64,
    pub buyer_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReceipt {
    pub transaction_id: String,
    pub purchased_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRequest {
    pub tool_id: ToolId,
    pub tool_name: String,
    pub user_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadReceipt {
    pub file_size: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(&self, request: &PurchaseRequest) -> Result<PaymentReceipt, AppError>;
}

/// Performs the actual file transfer once the quota check has passed.
#[async_trait]
pub trait DownloadService: Send + Sync {
    async fn fetch(&self, request: &DownloadRequest) -> Result<DownloadReceipt, AppError>;
}

#[async_trait]
pub trait QuotaService: Send + Sync {
    async fn fetch_snapshot(&self, token: &str) -> Result<ServerSnapshot, AppError>;
}

pub struct HttpQuotaService {
    api: ApiClient,
}

impl HttpQuotaService {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl QuotaService for HttpQuotaService {
    async fn fetch_snapshot(&self, token: &str) -> Result<ServerSnapshot, AppError> {
        let snapshot: ServerSnapshot = self.api.get_json(api::SNAPSHOT_PATH, token).await?;
        info!(
            "Fetched account snapshot for user {} ({} entitlements)",
            snapshot.user.id,
            snapshot.entitlements.len()
        );
        Ok(snapshot)
    }
}
