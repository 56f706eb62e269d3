//! JSON Schema export for the report interchange format

use crate::report::SuiteReport;

/// Generate the JSON Schema describing [`SuiteReport`] as pretty-printed JSON.
#[must_use]
pub fn generate_schema() -> String {
    let schema = schemars::schema_for!(SuiteReport);
    serde_json::to_string_pretty(&schema).unwrap_or_else(|_| "{}".to_string())
}
