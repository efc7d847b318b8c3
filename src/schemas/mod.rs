pub mod schema;
pub mod structured;
pub mod validation;

pub use schema::{cached_schema, CompletionSchema, SchemaHandle};
pub use structured::{
    extract_json, extract_json_shaped, parse_or, parse_structured, strip_code_fences, JsonShape,
    ParseMode,
};
pub use validation::validate_structured_payload;
