//! Catalog module for the DevMarket client
//!
//! Listing models, search/category filtering over the local catalog cache,
//! and the seller upload flow.

mod filter;
mod models;
mod upload;

pub use filter::{CatalogFilter, BROWSE_CATEGORIES};
pub use models::{Tool, ToolId, ToolStatus};
pub use upload::{Attachment, UploadForm, UploadService, UPLOAD_CATEGORIES};
