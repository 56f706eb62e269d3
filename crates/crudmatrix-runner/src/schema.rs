//! Input validation and output serialization over JSON Schema documents

use std::sync::Arc;

use serde_json::Value;

use crate::store::Record;

/// A compiled object schema.
///
/// `deserialize` validates a payload and keeps only declared properties;
/// `serialize` projects a record onto the declared properties.
#[derive(Clone)]
pub struct Schema {
    name: String,
    document: Value,
    properties: Vec<String>,
    full: Arc<jsonschema::Validator>,
    partial: Arc<jsonschema::Validator>,
}

impl std::fmt::Debug for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schema")
            .field("name", &self.name)
            .field("properties", &self.properties)
            .finish_non_exhaustive()
    }
}

impl Schema {
    /// Compile a schema document.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Invalid`] if the document is not a valid JSON Schema.
    pub fn new(name: impl Into<String>, document: Value) -> Result<Self, SchemaError> {
        let name = name.into();
        let full = jsonschema::validator_for(&document).map_err(|e| SchemaError::Invalid {
            name: name.clone(),
            message: e.to_string(),
        })?;

        let mut relaxed = document.clone();
        if let Some(obj) = relaxed.as_object_mut() {
            obj.remove("required");
        }
        let partial = jsonschema::validator_for(&relaxed).map_err(|e| SchemaError::Invalid {
            name: name.clone(),
            message: e.to_string(),
        })?;

        let properties = document
            .get("properties")
            .and_then(Value::as_object)
            .map(|p| p.keys().cloned().collect())
            .unwrap_or_default();

        Ok(Self {
            name,
            document,
            properties,
            full: Arc::new(full),
            partial: Arc::new(partial),
        })
    }

    /// Object schema from a `properties` map and required field names.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Invalid`] for malformed property schemas.
    pub fn object(
        name: impl Into<String>,
        properties: Value,
        required: &[&str],
    ) -> Result<Self, SchemaError> {
        Self::new(
            name,
            serde_json::json!({
                "type": "object",
                "properties": properties,
                "required": required,
            }),
        )
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Declared property names.
    #[must_use]
    pub fn properties(&self) -> &[String] {
        &self.properties
    }

    /// Validate a full payload.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] listing every violation (at most 10).
    pub fn deserialize(&self, payload: &Value) -> Result<Record, ValidationError> {
        self.check(&self.full, payload)
    }

    /// Validate a payload subset: top-level `required` is not enforced.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] listing every violation (at most 10).
    pub fn deserialize_partial(&self, payload: &Value) -> Result<Record, ValidationError> {
        self.check(&self.partial, payload)
    }

    fn check(
        &self,
        validator: &jsonschema::Validator,
        payload: &Value,
    ) -> Result<Record, ValidationError> {
        let errors: Vec<String> = validator
            .iter_errors(payload)
            .take(10)
            .map(|e| e.to_string())
            .collect();
        if !errors.is_empty() {
            return Err(ValidationError {
                schema: self.name.clone(),
                errors,
            });
        }
        let Value::Object(obj) = payload else {
            return Err(ValidationError {
                schema: self.name.clone(),
                errors: vec!["payload must be a JSON object".into()],
            });
        };
        Ok(self.project(obj))
    }

    /// Project a record onto the declared properties; all fields when none are declared.
    #[must_use]
    pub fn serialize(&self, record: &Record) -> Value {
        Value::Object(self.project(record))
    }

    fn project(&self, record: &Record) -> Record {
        if self.properties.is_empty() {
            return record.clone();
        }
        record
            .iter()
            .filter(|(k, _)| self.properties.contains(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("schema '{name}' is invalid: {message}")]
    Invalid { name: String, message: String },
}

/// A payload was rejected by its schema (surfaced as 400).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("payload does not match '{schema}': {}", .errors.join("; "))]
pub struct ValidationError {
    pub schema: String,
    pub errors: Vec<String>,
}
