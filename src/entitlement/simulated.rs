//! Stand-in collaborators with configurable latency and outcome. Used by the
//! demo binary and by tests that do not care about call expectations.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::time::sleep;
use tracing::debug;
use uuid::Uuid;

use super::collaborators::{
    DownloadReceipt, DownloadRequest, DownloadService, PaymentGateway, PaymentReceipt,
    PurchaseRequest, QuotaService,
};
use super::models::ServerSnapshot;
use crate::error::{AppError, NetworkError};

#[derive(Debug, Clone, Default)]
pub struct SimulatedPayments {
    latency: Duration,
    decline: bool,
}

impl SimulatedPayments {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            decline: false,
        }
    }

    pub fn declining(mut self) -> Self {
        self.decline = true;
        self
    }
}

#[async_trait]
impl PaymentGateway for SimulatedPayments {
    async fn charge(&self, request: &PurchaseRequest) -> Result<PaymentReceipt, AppError> {
        debug!("Simulating payment of {:.2} for tool {}", request.price, request.tool_id);
        sleep(self.latency).await;
        if self.decline {
            return Err(AppError::ServiceError {
                status: 402,
                message: "Payment declined".to_string(),
            });
        }
        Ok(PaymentReceipt {
            transaction_id: Uuid::new_v4().to_string(),
            purchased_at: Utc::now(),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct SimulatedDownloads {
    latency: Duration,
    fail: bool,
}

impl SimulatedDownloads {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

#[async_trait]
impl DownloadService for SimulatedDownloads {
    async fn fetch(&self, request: &DownloadRequest) -> Result<DownloadReceipt, AppError> {
        debug!("Simulating transfer of tool {}", request.tool_id);
        sleep(self.latency).await;
        if self.fail {
            return Err(NetworkError::Unreachable("storage service unavailable".to_string()).into());
        }
        // the listing's size is used for the history entry
        Ok(DownloadReceipt::default())
    }
}

/// Always answers with the snapshot it was built with.
#[derive(Debug, Clone)]
pub struct SimulatedQuotaService {
    snapshot: ServerSnapshot,
}

impl SimulatedQuotaService {
    pub fn new(snapshot: ServerSnapshot) -> Self {
        Self { snapshot }
    }
}

#[async_trait]
impl QuotaService for SimulatedQuotaService {
    async fn fetch_snapshot(&self, _token: &str) -> Result<ServerSnapshot, AppError> {
        Ok(self.snapshot.clone())
    }
}
