use schemars::{schema::RootSchema, JsonSchema};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::{any::type_name, sync::Arc, sync::OnceLock};

/// Cached JSON schema handle associated with a completion envelope type.
#[derive(Clone, Debug)]
pub struct SchemaHandle {
    schema_name: &'static str,
    type_name: &'static str,
    schema_json: Arc<Value>,
}

impl SchemaHandle {
    pub fn from_root_schema(
        schema_name: &'static str,
        type_name: &'static str,
        root: RootSchema,
    ) -> Self {
        let schema_json = serde_json::to_value(root).unwrap_or_default();

        Self {
            schema_name,
            type_name,
            schema_json: Arc::new(schema_json),
        }
    }

    /// Derive the handle for `T` from its `schemars` implementation
    pub fn for_type<T: JsonSchema>(schema_name: &'static str) -> Self {
        Self::from_root_schema(
            schema_name,
            type_name::<T>(),
            schemars::schema_for!(T),
        )
    }

    pub fn schema_name(&self) -> &'static str {
        self.schema_name
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn schema_json(&self) -> &Value {
        self.schema_json.as_ref()
    }

    /// Instruction block appended to prompts so the model sees the exact envelope
    pub fn prompt_instructions(&self) -> String {
        let rendered = serde_json::to_string_pretty(self.schema_json()).unwrap_or_default();
        format!(
            "Respond ONLY with a JSON object matching the `{}` schema below. No prose, no markdown.\n{}",
            self.schema_name, rendered
        )
    }
}

/// Envelope types that completions are parsed into
pub trait CompletionSchema: DeserializeOwned + Send + Sync + 'static {
    fn schema() -> &'static SchemaHandle;
}

/// Lazily build and cache a schema handle in a per-type static
pub fn cached_schema<T: JsonSchema>(
    cell: &'static OnceLock<SchemaHandle>,
    schema_name: &'static str,
) -> &'static SchemaHandle {
    cell.get_or_init(|| SchemaHandle::for_type::<T>(schema_name))
}
