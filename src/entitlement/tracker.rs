use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::collaborators::{
    DownloadReceipt, DownloadRequest, DownloadService, PaymentGateway, PaymentReceipt,
    PurchaseRequest,
};
use super::guard::InFlight;
use super::models::{
    DownloadRecord, DownloadStatus, Entitlement, EntitlementState, Quota, QuotaLimit,
    ServerSnapshot, User,
};
use crate::catalog::{CatalogFilter, Tool, ToolId, ToolStatus};
use crate::error::{AuthError, EntitlementError};
use crate::Result;

#[derive(Debug, Clone, Default)]
struct EntitlementRecord {
    purchased: bool,
    status: ToolStatus,
    download_count: u32,
    last_download: Option<DateTime<Utc>>,
    purchase_date: Option<NaiveDate>,
}

impl EntitlementRecord {
    fn from_tool(tool: &Tool) -> Self {
        Self {
            purchased: tool.purchased,
            status: tool.status,
            ..Self::default()
        }
    }

    /// Ownership never goes back to not-owned, and expiry is terminal.
    fn merge(&mut self, purchased: bool, status: ToolStatus) {
        self.purchased |= purchased;
        if self.status != ToolStatus::Expired {
            self.status = status;
        }
    }

    fn state(&self, tool: Option<&Tool>) -> EntitlementState {
        let free = tool.map_or(false, Tool::is_free);
        if self.purchased || free {
            EntitlementState::Owned(self.status)
        } else {
            EntitlementState::NotOwned
        }
    }
}

#[derive(Debug, Default)]
struct TrackerState {
    user: Option<User>,
    catalog: BTreeMap<ToolId, Tool>,
    entitlements: HashMap<ToolId, EntitlementRecord>,
    history: VecDeque<DownloadRecord>,
    /// Quota slots held by downloads whose transfer has not finished yet.
    reserved: u32,
    /// Bumped whenever the signed-in user goes away or changes, so results of
    /// requests issued for the previous user are discarded.
    epoch: u64,
}

impl TrackerState {
    fn record(&self, tool_id: ToolId) -> EntitlementRecord {
        match self.entitlements.get(&tool_id) {
            Some(record) => record.clone(),
            None => self
                .catalog
                .get(&tool_id)
                .map(EntitlementRecord::from_tool)
                .unwrap_or_default(),
        }
    }

    fn record_mut(&mut self, tool_id: ToolId) -> &mut EntitlementRecord {
        let seed = self.catalog.get(&tool_id).map(EntitlementRecord::from_tool);
        self.entitlements
            .entry(tool_id)
            .or_insert_with(|| seed.unwrap_or_default())
    }

    fn view(&self, tool_id: ToolId) -> Entitlement {
        let record = self.record(tool_id);
        Entitlement {
            tool_id,
            state: record.state(self.catalog.get(&tool_id)),
            download_count: record.download_count,
            last_download: record.last_download,
        }
    }

    fn overlay(&self, tool: &Tool) -> Tool {
        let record = self.record(tool.id);
        let mut tool = tool.clone();
        tool.purchased = record.purchased;
        tool.status = record.status;
        if record.purchase_date.is_some() {
            tool.purchase_date = record.purchase_date;
        }
        tool
    }

    /// Runs the download preconditions in order; the first failure wins.
    fn check_download(&self, tool_id: ToolId) -> Result<DownloadRequest> {
        let user = self.user.as_ref().ok_or(AuthError::Unauthenticated)?;
        let tool = self
            .catalog
            .get(&tool_id)
            .ok_or(EntitlementError::NotEntitled(tool_id))?;

        let ownership = self.record(tool_id).state(Some(tool));
        if !ownership.is_downloadable() {
            return Err(match ownership {
                EntitlementState::NotOwned => EntitlementError::NotEntitled(tool_id),
                _ => EntitlementError::EntitlementExpired(tool_id),
            }
            .into());
        }

        if !user.quota.has_capacity(self.reserved) {
            return Err(EntitlementError::QuotaExceeded.into());
        }

        Ok(DownloadRequest {
            tool_id,
            tool_name: tool.name.clone(),
            user_id: user.id.clone(),
        })
    }

    fn commit_download(&mut self, request: &DownloadRequest, receipt: DownloadReceipt) -> Entitlement {
        let now = Utc::now();

        if let Some(user) = self.user.as_mut() {
            user.quota.used = user.quota.used.saturating_add(1);
            if let QuotaLimit::Limited(limit) = user.quota.limit {
                // only reachable if a refresh lowered the limit mid-transfer
                if user.quota.used > limit {
                    warn!(
                        "Quota limit dropped to {} during a transfer; clamping usage",
                        limit
                    );
                    user.quota.used = limit;
                }
            }
        }

        let record = self.record_mut(request.tool_id);
        record.download_count = record.download_count.saturating_add(1);
        record.last_download = Some(now);

        let file_size = receipt.file_size.or_else(|| {
            self.catalog
                .get(&request.tool_id)
                .and_then(|tool| tool.file_size.clone())
        });
        self.history.push_front(DownloadRecord {
            id: Uuid::new_v4(),
            tool_id: request.tool_id,
            tool_name: request.tool_name.clone(),
            download_date: now,
            file_size,
            status: DownloadStatus::Completed,
        });

        self.view(request.tool_id)
    }

    fn confirm_purchase(&mut self, tool_id: ToolId, receipt: &PaymentReceipt) {
        let record = self.record_mut(tool_id);
        record.purchased = true;
        record.purchase_date = Some(receipt.purchased_at.date_naive());
    }

    fn end_session(&mut self) {
        self.user = None;
        self.entitlements = self
            .catalog
            .values()
            .map(|tool| (tool.id, EntitlementRecord::from_tool(tool)))
            .collect();
        self.history.clear();
        self.reserved = 0;
        self.epoch += 1;
    }
}

/// Tracks the signed-in user's quota and per-tool entitlements, and gates
/// downloads and purchases on them.
///
/// Every state transition happens under the write lock, in the order the
/// operations reach it. A download's quota check and the reservation of its
/// quota slot are a single transition; the slot is committed or released
/// once the transfer collaborator answers. Nothing is mutated for a request
/// that did not succeed.
#[derive(Clone)]
pub struct EntitlementTracker {
    state: Arc<RwLock<TrackerState>>,
    in_flight: InFlight,
    payments: Arc<dyn PaymentGateway>,
    downloads: Arc<dyn DownloadService>,
}

impl EntitlementTracker {
    pub fn new(payments: Arc<dyn PaymentGateway>, downloads: Arc<dyn DownloadService>) -> Self {
        Self {
            state: Arc::new(RwLock::new(TrackerState::default())),
            in_flight: InFlight::new(),
            payments,
            downloads,
        }
    }

    /// Replace the local catalog cache.
    pub async fn load_catalog(&self, tools: Vec<Tool>) {
        let mut state = self.state.write().await;
        let count = tools.len();
        state.catalog = tools.into_iter().map(|tool| (tool.id, tool)).collect();

        let catalog: Vec<(ToolId, bool, ToolStatus)> = state
            .catalog
            .values()
            .map(|tool| (tool.id, tool.purchased, tool.status))
            .collect();
        for (tool_id, purchased, status) in catalog {
            state
                .entitlements
                .entry(tool_id)
                .or_default()
                .merge(purchased, status);
        }
        info!("Loaded {} tools into the catalog cache", count);
    }

    pub async fn browse(&self, filter: &CatalogFilter) -> Vec<Tool> {
        let state = self.state.read().await;
        state
            .catalog
            .values()
            .filter(|tool| filter.matches(tool))
            .map(|tool| state.overlay(tool))
            .collect()
    }

    pub async fn tool(&self, tool_id: ToolId) -> Option<Tool> {
        let state = self.state.read().await;
        state.catalog.get(&tool_id).map(|tool| state.overlay(tool))
    }

    pub async fn entitlement(&self, tool_id: ToolId) -> Option<Entitlement> {
        let state = self.state.read().await;
        if state.catalog.contains_key(&tool_id) || state.entitlements.contains_key(&tool_id) {
            Some(state.view(tool_id))
        } else {
            None
        }
    }

    /// Tools the user has bought, active or expired, each with its
    /// entitlement. Free tools that were never bought are left out.
    pub async fn purchased_tools(&self) -> Vec<(Tool, Entitlement)> {
        let state = self.state.read().await;
        state
            .catalog
            .values()
            .filter(|tool| state.record(tool.id).purchased)
            .map(|tool| (state.overlay(tool), state.view(tool.id)))
            .collect()
    }

    pub async fn user(&self) -> Option<User> {
        self.state.read().await.user.clone()
    }

    pub async fn quota(&self) -> Option<Quota> {
        self.state.read().await.user.as_ref().map(|user| user.quota.clone())
    }

    /// Download history, most recent first.
    pub async fn history(&self) -> Vec<DownloadRecord> {
        self.state.read().await.history.iter().cloned().collect()
    }

    /// Whether a download or purchase of this tool is awaiting a collaborator.
    pub fn is_busy(&self, tool_id: ToolId) -> bool {
        self.in_flight.contains(tool_id)
    }

    /// Apply the server's authoritative account state.
    pub async fn refresh_quota(&self, snapshot: ServerSnapshot) {
        let mut state = self.state.write().await;

        // anything bought anonymously or by another user must not carry over
        let same_user = state
            .user
            .as_ref()
            .map_or(false, |current| current.id == snapshot.user.id);
        if !same_user {
            info!("Starting session for user {}; resetting local state", snapshot.user.id);
            state.end_session();
        }

        for entry in &snapshot.entitlements {
            let record = state.record_mut(entry.tool_id);
            if record.purchased && !entry.purchased {
                warn!("Server reports owned tool {} as not owned; keeping ownership", entry.tool_id);
            }
            if record.status == ToolStatus::Expired && entry.status == ToolStatus::Active {
                debug!("Tool {} stays expired", entry.tool_id);
            }
            record.merge(entry.purchased, entry.status);
            record.download_count = entry.download_count;
            record.last_download = entry.last_download;
        }

        if let Some(mut history) = snapshot.history {
            history.sort_by(|a, b| b.download_date.cmp(&a.download_date));
            state.history = history.into();
        }

        info!(
            "Refreshed quota for user {}: {}/{} ({} plan)",
            snapshot.user.id, snapshot.user.quota.used, snapshot.user.quota.limit, snapshot.user.plan
        );
        state.user = Some(snapshot.user);
    }

    pub async fn sign_out(&self) {
        let mut state = self.state.write().await;
        if let Some(user) = state.user.as_ref() {
            info!("Signing out user {}", user.id);
        }
        state.end_session();
    }

    /// Download a tool for the signed-in user.
    ///
    /// Fails with, in order of precedence: `Unauthenticated`, `NotEntitled`,
    /// `EntitlementExpired`, `QuotaExceeded`. A transfer failure is returned
    /// as-is and leaves quota, counters and history untouched. Only a request
    /// that passes all of those can fail with `OperationInProgress`.
    pub async fn attempt_download(&self, tool_id: ToolId) -> Result<Entitlement> {
        let (request, epoch, _guard) = {
            let mut state = self.state.write().await;
            let request = match state.check_download(tool_id) {
                Ok(request) => request,
                Err(e) => {
                    warn!("Download of tool {} refused: {}", tool_id, e);
                    return Err(e);
                }
            };
            let guard = self.in_flight.acquire(tool_id)?;
            state.reserved += 1;
            (request, state.epoch, guard)
        };

        info!("Downloading tool {} ({})", tool_id, request.tool_name);
        let outcome = self.downloads.fetch(&request).await;

        let mut state = self.state.write().await;
        if state.epoch != epoch {
            warn!("Session ended while tool {} was downloading; discarding result", tool_id);
            return Err(AuthError::Unauthenticated.into());
        }
        state.reserved = state.reserved.saturating_sub(1);

        match outcome {
            Ok(receipt) => {
                let entitlement = state.commit_download(&request, receipt);
                info!(
                    "Downloaded tool {} ({} downloads so far)",
                    tool_id, entitlement.download_count
                );
                Ok(entitlement)
            }
            Err(e) => {
                error!("Download of tool {} failed: {}", tool_id, e);
                Err(e)
            }
        }
    }

    /// Buy a tool through the payment collaborator.
    ///
    /// The tool is marked purchased only once the payment is confirmed. Tools
    /// that are already owned or free are returned without charging.
    pub async fn attempt_purchase(&self, tool_id: ToolId) -> Result<Entitlement> {
        let (request, epoch, _guard) = {
            let state = self.state.read().await;
            let tool = state
                .catalog
                .get(&tool_id)
                .ok_or(EntitlementError::NotEntitled(tool_id))?;
            let view = state.view(tool_id);
            if view.state != EntitlementState::NotOwned {
                debug!("Tool {} already owned; skipping payment", tool_id);
                return Ok(view);
            }
            let request = PurchaseRequest {
                tool_id,
                tool_name: tool.name.clone(),
                price: tool.price,
                buyer_id: state.user.as_ref().map(|user| user.id.clone()),
            };
            let guard = self.in_flight.acquire(tool_id)?;
            (request, state.epoch, guard)
        };

        info!("Purchasing tool {} for {:.2}", tool_id, request.price);
        let receipt = match self.payments.charge(&request).await {
            Ok(receipt) => receipt,
            Err(e) => {
                error!("Purchase of tool {} failed: {}", tool_id, e);
                return Err(e);
            }
        };

        let mut state = self.state.write().await;
        if state.epoch != epoch {
            warn!(
                "Session ended while tool {} was being purchased (transaction {})",
                tool_id, receipt.transaction_id
            );
            return Err(AuthError::Unauthenticated.into());
        }
        state.confirm_purchase(tool_id, &receipt);
        info!("Purchased tool {} (transaction {})", tool_id, receipt.transaction_id);
        Ok(state.view(tool_id))
    }
}
