use jsonschema::{Draft, JSONSchema};
use serde_json::Value;

use crate::{
    error::{PlannerError, Result},
    schemas::SchemaHandle,
};

/// Reported violations per payload; the rest are summarized
const REPORTED_VIOLATIONS: usize = 3;

/// Check a completion payload against the envelope schema before deserializing it.
///
/// Used for envelopes whose numeric fields index into an itinerary, where a
/// loosely typed value should reject the whole payload instead of being coerced.
pub fn validate_structured_payload(schema: &SchemaHandle, payload: &Value) -> Result<()> {
    let compiled = JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(schema.schema_json())
        .map_err(|err| {
            PlannerError::Validation(format!(
                "`{}` schema does not compile: {}",
                schema.schema_name(),
                err
            ))
        })?;

    let violations: Vec<String> = match compiled.validate(payload) {
        Ok(()) => return Ok(()),
        Err(errors) => errors
            .map(|error| {
                let at = error.instance_path.to_string();
                let at = if at.is_empty() { "<root>".to_string() } else { at };
                format!("{at}: {error}")
            })
            .collect(),
    };

    let mut summary = violations
        .iter()
        .take(REPORTED_VIOLATIONS)
        .cloned()
        .collect::<Vec<_>>()
        .join("; ");
    if violations.len() > REPORTED_VIOLATIONS {
        summary.push_str(&format!(
            " (+{} more)",
            violations.len() - REPORTED_VIOLATIONS
        ));
    }

    Err(PlannerError::Validation(format!(
        "Completion does not match `{}` schema: {}",
        schema.schema_name(),
        summary
    )))
}
