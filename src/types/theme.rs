use serde::{Deserialize, Serialize};

/// Longest trip a descriptor or an add-day edit may ask for
pub const MAX_TRIP_DAYS: u32 = 30;

/// Structured reading of a free-text trip request. One per pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeDescriptor {
    /// Main theme (e.g. "anime", "romantic")
    pub theme: String,
    /// Related themes used to widen an empty search
    pub related_themes: Vec<String>,
    /// Place queries, used verbatim by the search layer
    pub search_queries: Vec<String>,
    pub restaurant_queries: Vec<String>,
    pub city: String,
    pub country: String,
    /// Between 1 and [`MAX_TRIP_DAYS`]
    pub duration_days: u32,
    pub special_requirements: Vec<String>,
}

impl ThemeDescriptor {
    /// Derive a descriptor that searches a single query while keeping the trip context
    pub fn for_query(&self, query: &str) -> Self {
        Self {
            theme: query.to_string(),
            search_queries: vec![format!("{} {}", query, self.city).trim().to_string()],
            ..self.clone()
        }
    }
}
