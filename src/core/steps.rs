use serde::{Deserialize, Serialize};

use super::pipeline::Phase;

/// A single entry in the pipeline's execution log
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineStep {
    /// Request that started the run
    Task { query: String },
    /// A component finished its work for a phase
    Action {
        agent: String,
        action: String,
        result: String,
    },
    /// Validation failed and the run re-entered place search
    Retry { attempt: u32, quality_score: f64 },
    /// A phase failure that was recovered locally
    Error { phase: Phase, message: String },
}

impl PipelineStep {
    pub fn action(
        agent: impl Into<String>,
        action: impl Into<String>,
        result: impl Into<String>,
    ) -> Self {
        PipelineStep::Action {
            agent: agent.into(),
            action: action.into(),
            result: result.into(),
        }
    }

    /// Get a human-readable description of the step
    pub fn describe(&self) -> String {
        match self {
            PipelineStep::Task { query } => format!("🧭 Task: {}", query),
            PipelineStep::Action {
                agent,
                action,
                result,
            } => format!("🔧 {}::{}: {}", agent, action, result),
            PipelineStep::Retry {
                attempt,
                quality_score,
            } => format!(
                "🔁 Retry {} (quality score {:.2})",
                attempt, quality_score
            ),
            PipelineStep::Error { phase, message } => {
                format!("❌ Error in {}: {}", phase.as_str(), message)
            }
        }
    }
}
