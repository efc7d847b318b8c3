use crate::{
    core::{pipeline::Phase, steps::PipelineStep},
    types::{itinerary::Itinerary, validation::ValidationResult},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Result of a generation pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub execution_id: String,
    /// False only when no itinerary could be produced
    pub success: bool,
    /// Typed itinerary, if assembly succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub itinerary: Option<Itinerary>,
    /// External-facing document produced by finalize
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<Value>,
    pub validation: Option<ValidationResult>,
    pub steps: Vec<PipelineStep>,
    pub errors: Vec<String>,
    pub retries: u32,
    /// Every phase entered, in order
    pub phases: Vec<Phase>,
    pub duration: Duration,
}

impl PipelineRun {
    /// Number of times the run entered `phase`
    pub fn phase_visits(&self, phase: Phase) -> usize {
        self.phases.iter().filter(|entered| **entered == phase).count()
    }

    /// Generate a human-readable replay of the execution
    pub fn replay(&self) -> String {
        let mut lines = Vec::new();

        lines.push("=== Pipeline Execution Trace ===".to_string());
        lines.push(format!("Execution: {}", self.execution_id));
        lines.push(format!("Duration: {:.2}s", self.duration.as_secs_f64()));
        lines.push(format!("Retries: {}", self.retries));

        if let Some(validation) = &self.validation {
            lines.push(format!(
                "Quality: {:.2} (valid: {})",
                validation.quality_score, validation.is_valid
            ));
        }

        lines.push(String::new());
        lines.push("--- Steps ---".to_string());

        for (idx, step) in self.steps.iter().enumerate() {
            lines.push(format!("{}. {}", idx + 1, step.describe()));
        }

        if !self.errors.is_empty() {
            lines.push(String::new());
            lines.push("--- Errors ---".to_string());
            lines.extend(self.errors.iter().cloned());
        }

        if let Some(itinerary) = &self.itinerary {
            lines.push(String::new());
            lines.push("--- Itinerary ---".to_string());
            lines.push(itinerary.title.clone());
            for day in &itinerary.days {
                lines.push(format!(
                    "  {} ({} places, {} restaurants)",
                    day.title,
                    day.places.len(),
                    day.restaurants.len()
                ));
            }
        }

        lines.join("\n")
    }
}
