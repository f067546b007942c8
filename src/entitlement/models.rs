use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::{ToolId, ToolStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Plan {
    Free,
    Pro,
    Premium,
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Plan::Free => "Free",
            Plan::Pro => "Pro",
            Plan::Premium => "Premium",
        };
        f.write_str(name)
    }
}

/// Download allowance. Travels as an integer where `-1` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum QuotaLimit {
    Unlimited,
    Limited(u32),
}

impl TryFrom<i64> for QuotaLimit {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(QuotaLimit::Unlimited),
            n if n >= 0 => u32::try_from(n)
                .map(QuotaLimit::Limited)
                .map_err(|_| format!("quota limit {} out of range", n)),
            n => Err(format!("quota limit must be -1 or non-negative, got {}", n)),
        }
    }
}

impl From<QuotaLimit> for i64 {
    fn from(limit: QuotaLimit) -> Self {
        match limit {
            QuotaLimit::Unlimited => -1,
            QuotaLimit::Limited(n) => i64::from(n),
        }
    }
}

impl fmt::Display for QuotaLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuotaLimit::Unlimited => f.write_str("∞"),
            QuotaLimit::Limited(n) => write!(f, "{}", n),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quota {
    pub used: u32,
    pub limit: QuotaLimit,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_date: Option<NaiveDate>,
}

impl Quota {
    pub fn limited(used: u32, limit: u32) -> Self {
        Self {
            used,
            limit: QuotaLimit::Limited(limit),
            reset_date: None,
        }
    }

    pub fn unlimited(used: u32) -> Self {
        Self {
            used,
            limit: QuotaLimit::Unlimited,
            reset_date: None,
        }
    }

    /// Whether one more download fits, counting `pending` downloads that
    /// already hold a slot.
    pub fn has_capacity(&self, pending: u32) -> bool {
        match self.limit {
            QuotaLimit::Unlimited => true,
            QuotaLimit::Limited(limit) => u64::from(self.used) + u64::from(pending) < u64::from(limit),
        }
    }

    pub fn remaining(&self) -> Option<u32> {
        match self.limit {
            QuotaLimit::Unlimited => None,
            QuotaLimit::Limited(limit) => Some(limit.saturating_sub(self.used)),
        }
    }

    pub fn usage_ratio(&self) -> Option<f64> {
        match self.limit {
            QuotaLimit::Unlimited => None,
            QuotaLimit::Limited(0) => Some(1.0),
            QuotaLimit::Limited(limit) => Some(f64::from(self.used) / f64::from(limit)),
        }
    }

    pub fn is_near_limit(&self, warning_ratio: f64) -> bool {
        self.usage_ratio().map_or(false, |ratio| ratio >= warning_ratio)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub plan: Plan,
    pub quota: Quota,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_date: Option<NaiveDate>,
}

/// Where a tool sits in the ownership lifecycle for the current user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EntitlementState {
    NotOwned,
    Owned(ToolStatus),
}

impl EntitlementState {
    pub fn is_downloadable(&self) -> bool {
        matches!(self, EntitlementState::Owned(ToolStatus::Active))
    }
}

/// Per-tool view handed back to callers after an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Entitlement {
    pub tool_id: ToolId,
    pub state: EntitlementState,
    pub download_count: u32,
    pub last_download: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRecord {
    pub id: Uuid,
    pub tool_id: ToolId,
    pub tool_name: String,
    pub download_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<String>,
    pub status: DownloadStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitlementSnapshot {
    pub tool_id: ToolId,
    pub purchased: bool,
    #[serde(default)]
    pub status: ToolStatus,
    #[serde(default)]
    pub download_count: u32,
    #[serde(default)]
    pub last_download: Option<DateTime<Utc>>,
}

/// Authoritative account state from the quota/entitlement service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSnapshot {
    pub user: User,
    #[serde(default)]
    pub entitlements: Vec<EntitlementSnapshot>,
    /// When present, replaces the local download history.
    #[serde(default)]
    pub history: Option<Vec<DownloadRecord>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_quota_limit_wire_format() {
        let quota: Quota = serde_json::from_value(json!({
            "used": 7, "limit": 25, "resetDate": "2024-10-01"
        }))
        .unwrap();
        assert_eq!(quota.limit, QuotaLimit::Limited(25));
        assert_eq!(quota.reset_date, NaiveDate::from_ymd_opt(2024, 10, 1));

        let quota: Quota = serde_json::from_value(json!({"used": 120, "limit": -1})).unwrap();
        assert_eq!(quota.limit, QuotaLimit::Unlimited);
        assert_eq!(serde_json::to_value(&quota).unwrap()["limit"], json!(-1));

        assert!(serde_json::from_value::<Quota>(json!({"used": 0, "limit": -2})).is_err());
    }

    #[test]
    fn test_quota_capacity() {
        let quota = Quota::limited(9, 10);
        assert!(quota.has_capacity(0));
        assert!(!quota.has_capacity(1));
        assert_eq!(quota.remaining(), Some(1));

        assert!(!Quota::limited(10, 10).has_capacity(0));
        assert!(!Quota::limited(0, 0).has_capacity(0));
        assert!(Quota::unlimited(u32::MAX).has_capacity(u32::MAX));
    }

    #[test]
    fn test_near_limit_warning() {
        assert!(!Quota::limited(7, 25).is_near_limit(0.8));
        assert!(Quota::limited(20, 25).is_near_limit(0.8));
        assert!(Quota::limited(0, 0).is_near_limit(0.8));
        assert!(!Quota::unlimited(1000).is_near_limit(0.8));
    }

    #[test]
    fn test_snapshot_deserialize() {
        let snapshot: ServerSnapshot = serde_json::from_value(json!({
            "user": {
                "id": "u-1",
                "name": "John Doe",
                "plan": "Pro",
                "quota": {"used": 2, "limit": 10}
            },
            "entitlements": [
                {"toolId": 7, "purchased": true, "status": "expired", "downloadCount": 2}
            ]
        }))
        .unwrap();

        assert_eq!(snapshot.user.plan, Plan::Pro);
        assert_eq!(snapshot.entitlements[0].status, ToolStatus::Expired);
        assert!(snapshot.history.is_none());
    }
}
