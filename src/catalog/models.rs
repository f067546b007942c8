use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolId(pub u64);

impl fmt::Display for ToolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    #[default]
    Active,
    Expired,
}

/// A marketplace listing as cached locally from the catalog service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub id: ToolId,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub seller: String,
    pub rating: f32,
    pub category: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub downloads: u64,
    #[serde(default)]
    pub purchased: bool,
    #[serde(default)]
    pub status: ToolStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchase_date: Option<NaiveDate>,
}

impl Tool {
    pub fn new(id: u64, name: impl Into<String>, price: f64) -> Self {
        Self {
            id: ToolId(id),
            name: name.into(),
            description: String::new(),
            price,
            seller: String::new(),
            rating: 0.0,
            category: String::new(),
            tags: BTreeSet::new(),
            downloads: 0,
            purchased: false,
            status: ToolStatus::Active,
            file_size: None,
            version: None,
            image: None,
            purchase_date: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn purchased(mut self) -> Self {
        self.purchased = true;
        self
    }

    pub fn with_status(mut self, status: ToolStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_free(&self) -> bool {
        self.price <= 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_deserialize_catalog_entry() {
        let tool: Tool = serde_json::from_value(json!({
            "id": 7,
            "name": "Vue 3 Dashboard Template",
            "description": "Modern dashboard template",
            "price": 49.99,
            "seller": "VueExpert",
            "rating": 4.9,
            "category": "Frontend",
            "tags": ["Vue", "Dashboard", "Template"],
            "purchased": true,
            "status": "expired",
            "fileSize": "5.7 MB",
            "purchaseDate": "2024-06-10"
        }))
        .unwrap();

        assert_eq!(tool.id, ToolId(7));
        assert_eq!(tool.status, ToolStatus::Expired);
        assert_eq!(tool.downloads, 0);
        assert!(tool.tags.contains("Dashboard"));
        assert_eq!(tool.file_size.as_deref(), Some("5.7 MB"));
        assert_eq!(tool.purchase_date, NaiveDate::from_ymd_opt(2024, 6, 10));
    }

    #[test]
    fn test_zero_price_is_free() {
        assert!(Tool::new(2, "API Documentation Builder", 0.0).is_free());
        assert!(!Tool::new(1, "React Component Generator", 29.99).is_free());
    }
}
