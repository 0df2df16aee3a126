//! Convenience builder for HTTP query parameters.
//!
//! Collects URL query pairs from optional values; empty filters are dropped so
//! list endpoints only see the parameters the caller actually set.

use std::fmt::Display;

/// Page size requested from every cloud.dk list endpoint.
pub const LIST_PAGE_SIZE: u32 = 1000;

/// Builder for assembling query parameter pairs.
#[derive(Debug, Default, Clone)]
pub struct QueryParams {
    pairs: Vec<(&'static str, String)>,
}

impl QueryParams {
    /// Create a new, empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self { pairs: Vec::new() }
    }

    /// Create a builder pre-populated with `per-page=1000`.
    #[must_use]
    pub fn paged() -> Self {
        let mut params = Self::new();
        params.push("per-page", LIST_PAGE_SIZE);
        params
    }

    /// Append a key/value pair when the value is present.
    pub fn push_opt<T>(&mut self, key: &'static str, value: Option<T>)
    where
        T: ToString,
    {
        if let Some(value) = value {
            self.pairs.push((key, value.to_string()));
        }
    }

    /// Append a filter value unless it is absent or blank.
    pub fn push_filter(&mut self, key: &'static str, value: Option<&str>) {
        self.push_opt(key, value.filter(|v| !v.trim().is_empty()));
    }

    /// Append a required key/value pair.
    pub fn push<T>(&mut self, key: &'static str, value: T)
    where
        T: Display,
    {
        self.pairs.push((key, value.to_string()));
    }

    /// Return the collected key/value pairs.
    #[must_use]
    pub fn into_pairs(self) -> Vec<(&'static str, String)> {
        self.pairs
    }

    /// Returns true if no parameters have been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}
