use super::models::Tool;

/// Categories offered by the browse view. `All` disables category filtering.
pub const BROWSE_CATEGORIES: [&str; 7] = [
    "All",
    "Frontend",
    "Backend",
    "DevOps",
    "Testing",
    "Mobile",
    "Utilities",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogFilter {
    query: String,
    category: Option<String>,
}

impl CatalogFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    /// Restrict to one category. Passing `"All"` clears the restriction.
    pub fn category(mut self, category: impl Into<String>) -> Self {
        let category = category.into();
        self.category = if category == "All" { None } else { Some(category) };
        self
    }

    pub fn matches(&self, tool: &Tool) -> bool {
        self.matches_query(tool) && self.matches_category(tool)
    }

    fn matches_query(&self, tool: &Tool) -> bool {
        let needle = self.query.to_lowercase();
        if needle.is_empty() {
            return true;
        }
        tool.name.to_lowercase().contains(&needle)
            || tool.description.to_lowercase().contains(&needle)
            || tool.tags.iter().any(|tag| tag.to_lowercase().contains(&needle))
    }

    fn matches_category(&self, tool: &Tool) -> bool {
        match &self.category {
            Some(category) => tool.category == *category,
            None => true,
        }
    }

    pub fn apply<'a, I>(&self, tools: I) -> Vec<Tool>
    where
        I: IntoIterator<Item = &'a Tool>,
    {
        tools
            .into_iter()
            .filter(|tool| self.matches(tool))
            .cloned()
            .collect()
    }
}
