use std::time::Instant;

use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use super::{pipeline::Phase, steps::PipelineStep};
use crate::types::{Itinerary, PipelineRun, ThemeDescriptor, ValidationResult, Venue};

/// Mutable state threaded through one pipeline run
#[derive(Debug)]
pub struct RunState {
    pub execution_id: String,
    pub query: String,
    pub theme: Option<ThemeDescriptor>,
    pub places: Vec<Venue>,
    pub restaurants: Vec<Venue>,
    pub itinerary: Option<Itinerary>,
    pub validation: Option<ValidationResult>,
    pub document: Option<Value>,
    pub retries: u32,
    pub progress: f64,
    steps: Vec<PipelineStep>,
    errors: Vec<String>,
    phases: Vec<Phase>,
    started: Instant,
}

impl RunState {
    pub fn new(query: impl Into<String>) -> Self {
        let query = query.into();
        let mut state = Self {
            execution_id: Uuid::new_v4().to_string(),
            query: query.clone(),
            theme: None,
            places: Vec::new(),
            restaurants: Vec::new(),
            itinerary: None,
            validation: None,
            document: None,
            retries: 0,
            progress: 0.0,
            steps: Vec::new(),
            errors: Vec::new(),
            phases: Vec::new(),
            started: Instant::now(),
        };
        state.add_step(PipelineStep::Task { query });
        state
    }

    /// Record a step and log it
    pub fn add_step(&mut self, step: PipelineStep) {
        info!(
            target: "trip_planner::steps",
            execution_id = %self.execution_id,
            "{}",
            step.describe()
        );
        self.steps.push(step);
    }

    /// Record a recovered failure; the run continues
    pub fn record_error(&mut self, phase: Phase, message: impl Into<String>) {
        let message = message.into();
        warn!(
            target: "trip_planner::pipeline",
            execution_id = %self.execution_id,
            phase = phase.as_str(),
            error = %message,
            "Phase failure recovered"
        );
        self.errors.push(message.clone());
        self.steps.push(PipelineStep::Error { phase, message });
    }

    /// Keep failures reported by a component without adding a step per failure
    pub fn extend_errors(&mut self, failures: impl IntoIterator<Item = String>) {
        self.errors.extend(failures);
    }

    pub fn enter(&mut self, phase: Phase) {
        self.phases.push(phase);
    }

    pub fn complete(&mut self, phase: Phase) {
        self.progress = self.progress.max(phase.progress());
    }

    pub fn steps(&self) -> &[PipelineStep] {
        &self.steps
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn into_run(self) -> PipelineRun {
        PipelineRun {
            execution_id: self.execution_id,
            success: self.itinerary.is_some(),
            itinerary: self.itinerary,
            document: self.document,
            validation: self.validation,
            steps: self.steps,
            errors: self.errors,
            retries: self.retries,
            phases: self.phases,
            duration: self.started.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_records_task() {
        let state = RunState::new("3 days in Rome");
        assert_eq!(state.steps().len(), 1);
        assert!(matches!(state.steps()[0], PipelineStep::Task { .. }));
        assert!(Uuid::parse_str(&state.execution_id).is_ok());
    }

    #[test]
    fn test_errors_and_progress() {
        let mut state = RunState::new("q");
        state.record_error(Phase::SearchPlaces, "No theme analysis available");
        state.complete(Phase::Assemble);
        state.complete(Phase::Analyze);

        assert_eq!(state.errors(), ["No theme analysis available"]);
        assert_eq!(state.progress, 0.80);

        let run = state.into_run();
        assert!(!run.success);
        assert_eq!(run.steps.len(), 2);
    }
}
