#[cfg(test)]
#[path = "filter_test.rs"]
mod filter_test;

use crate::net::types::Business;

/// Search criteria from the listing page's category and address boxes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub category: String,
    pub address: String,
}

impl SearchQuery {
    #[must_use]
    pub fn new(category: impl Into<String>, address: impl Into<String>) -> Self {
        Self { category: category.into(), address: address.into() }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.category.trim().is_empty() && self.address.trim().is_empty()
    }

    /// Non-empty criteria as query-string pairs for `GET /api/businesses`.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&'static str, &str)> {
        let mut pairs = Vec::with_capacity(2);
        if !self.category.trim().is_empty() {
            pairs.push(("category", self.category.trim()));
        }
        if !self.address.trim().is_empty() {
            pairs.push(("address", self.address.trim()));
        }
        pairs
    }

    /// Case-insensitive substring match on category and formatted address.
    #[must_use]
    pub fn matches(&self, business: &Business) -> bool {
        contains_ci(&business.category, &self.category) && contains_ci(&business.formatted_address, &self.address)
    }
}

/// Keep the businesses matching `query`, preserving order.
#[must_use]
pub fn filter_businesses<'a>(businesses: &'a [Business], query: &SearchQuery) -> Vec<&'a Business> {
    businesses.iter().filter(|b| query.matches(b)).collect()
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    let needle = needle.trim();
    needle.is_empty() || haystack.to_lowercase().contains(&needle.to_lowercase())
}
