//! Entitlement module for the DevMarket client
//!
//! This module owns the user's plan and download quota, tracks which tools
//! the user owns, and gates downloads and purchases on both.

mod collaborators;
mod guard;
mod models;
pub mod simulated;
mod tracker;

pub use collaborators::{
    DownloadReceipt, DownloadRequest, DownloadService, HttpQuotaService, PaymentGateway,
    PaymentReceipt, PurchaseRequest, QuotaService,
};
pub use guard::{InFlight, InFlightGuard};
pub use models::{
    DownloadRecord, DownloadStatus, Entitlement, EntitlementSnapshot, EntitlementState, Plan,
    Quota, QuotaLimit, ServerSnapshot, User,
};
pub use tracker::EntitlementTracker;
