use serde::{Deserialize, Serialize};

/// Outcome of itinerary quality validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    /// Clamped to [0, 1]
    pub quality_score: f64,
}

impl ValidationResult {
    pub fn failed(issue: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            issues: vec![issue.into()],
            suggestions: Vec::new(),
            quality_score: 0.0,
        }
    }
}
