//! Suite configuration for running the matrix against a live server

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use crate::category::{Category, Dimension, DimensionRule, EndpointKind};
use crate::components::{ComponentError, ComponentSet};
use crate::resolve::{FixtureMap, ResolvableValue};

/// Suite configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteConfig {
    /// Base URL of the server to test
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Named values that `{ "$fixture" = "name" }` references resolve against
    #[serde(default)]
    pub fixture: serde_json::Map<String, Value>,

    /// Endpoints to exercise, in execution order
    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,
}

fn default_timeout() -> u64 {
    10
}

/// One endpoint and its declared component sets.
///
/// Each dimension table is keyed by category name and must contain `ok`.
///
/// ```toml
/// [[endpoints]]
/// name = "retrieve_department"
/// kind = "retrieve"
/// path = "/api/departments/{id}"
///
/// [endpoints.path_parameters]
/// ok = { "$fixture" = "department_path" }
/// not_found = { id = 999999 }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub name: String,
    pub kind: EndpointKind,
    /// Path template, e.g. `/api/departments/{id}`
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_parameters: Option<BTreeMap<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payloads: Option<BTreeMap<String, Value>>,
}

impl EndpointConfig {
    fn table(&self, dimension: Dimension) -> Option<&BTreeMap<String, Value>> {
        match dimension {
            Dimension::PathParameters => self.path_parameters.as_ref(),
            Dimension::Headers => self.headers.as_ref(),
            Dimension::Payloads => self.payloads.as_ref(),
        }
    }

    /// Build the component set declared for a dimension.
    ///
    /// Categories are ordered canonically (the table itself is unordered).
    ///
    /// # Errors
    ///
    /// Returns error on a missing `ok`, an unknown category, a category not
    /// valid for the dimension, or a table for a dimension the kind ignores.
    pub fn component_set(&self, dimension: Dimension) -> Result<Option<ComponentSet>, ConfigError> {
        let Some(table) = self.table(dimension) else {
            return Ok(None);
        };
        if self.kind.dimension_rule(dimension) == DimensionRule::NotApplicable {
            return Err(ConfigError::NotApplicable {
                endpoint: self.name.clone(),
                kind: self.kind,
                dimension,
            });
        }

        let mut declared = BTreeMap::new();
        for (key, value) in table {
            let category: Category = key.parse().map_err(|_| ConfigError::UnknownCategory {
                endpoint: self.name.clone(),
                dimension,
                category: key.clone(),
            })?;
            declared.insert(category, value);
        }

        let ok = declared
            .remove(&Category::Ok)
            .ok_or_else(|| ConfigError::MissingOk {
                endpoint: self.name.clone(),
                dimension,
            })?;
        let mut set = ComponentSet::new(dimension, ResolvableValue::from_config(ok.clone()));
        for (category, value) in declared {
            set = set
                .try_with(category, ResolvableValue::from_config(value.clone()))
                .map_err(|source| ConfigError::Component {
                    endpoint: self.name.clone(),
                    source,
                })?;
        }
        Ok(Some(set))
    }

    /// Fixture property names referenced anywhere in this endpoint.
    #[must_use]
    pub fn fixture_refs(&self) -> Vec<String> {
        Dimension::ALL
            .iter()
            .filter_map(|d| self.table(*d))
            .flat_map(|t| t.values())
            .filter_map(|v| match ResolvableValue::<Value>::from_config(v.clone()) {
                ResolvableValue::PropertyRef(name) => Some(name),
                _ => None,
            })
            .collect()
    }
}

impl SuiteConfig {
    /// Load config from file. Format follows the extension: `.json`, `.yaml`/`.yml`, else TOML.
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e.to_string()))?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => {
                serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            Some("yaml" | "yml") => {
                serde_yml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            _ => toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string())),
        }
    }

    /// Load from the first default location that exists.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] when no candidate exists.
    pub fn load_default() -> Result<Self, ConfigError> {
        let candidates = [".crudmatrix.toml", "crudmatrix.toml", ".crudmatrix.json"];

        for name in candidates {
            let path = Path::new(name);
            if path.exists() {
                return Self::load(path);
            }
        }

        Err(ConfigError::NotFound(
            candidates.iter().map(|c| (*c).to_string()).collect(),
        ))
    }

    /// Fixture for property references.
    #[must_use]
    pub fn fixture_map(&self) -> FixtureMap {
        FixtureMap::from(self.fixture.clone())
    }

    /// Check every endpoint declaration.
    ///
    /// # Errors
    ///
    /// Returns the first configuration error found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for endpoint in &self.endpoints {
            if !seen.insert(endpoint.name.as_str()) {
                return Err(ConfigError::DuplicateEndpoint(endpoint.name.clone()));
            }
            for dimension in Dimension::ALL {
                let set = endpoint.component_set(dimension)?;
                if set.is_none()
                    && endpoint.kind.dimension_rule(dimension) == DimensionRule::Required
                {
                    return Err(ConfigError::MissingDimension {
                        endpoint: endpoint.name.clone(),
                        kind: endpoint.kind,
                        dimension,
                    });
                }
            }
        }
        Ok(())
    }

    /// Create example config file
    pub fn example() -> &'static str {
        r#"# crudmatrix configuration

# Server to test
base_url = "http://localhost:8000"
timeout_secs = 10

# Values referenced as { "$fixture" = "name" }
[fixture]
department_path = { id = 1 }
read_write = { authorization = "Bearer rw-token" }
read_only = { authorization = "Bearer ro-token" }

[[endpoints]]
name = "list_departments"
kind = "list"
path = "/api/departments/"

[endpoints.headers]
ok = { "$fixture" = "read_write" }
unauthorized = {}

[[endpoints]]
name = "create_department"
kind = "create"
path = "/api/departments/"

[endpoints.headers]
ok = { "$fixture" = "read_write" }
forbidden = { "$fixture" = "read_only" }

[endpoints.payloads]
ok = { title = "dept-A" }
bad_request = { title = "" }

[[endpoints]]
name = "retrieve_department"
kind = "retrieve"
path = "/api/departments/{id}"

[endpoints.path_parameters]
ok = { "$fixture" = "department_path" }
not_found = { id = 999999 }
"#
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read {0}: {1}")]
    Io(PathBuf, String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("No config file found (looked for {})", .0.join(", "))]
    NotFound(Vec<String>),
    #[error("Endpoint '{0}' is declared more than once")]
    DuplicateEndpoint(String),
    #[error("Endpoint '{endpoint}': {dimension} has no 'ok' value")]
    MissingOk {
        endpoint: String,
        dimension: Dimension,
    },
    #[error("Endpoint '{endpoint}': unknown {dimension} category '{category}'")]
    UnknownCategory {
        endpoint: String,
        dimension: Dimension,
        category: String,
    },
    #[error("Endpoint '{endpoint}': {kind} endpoints take no {dimension}")]
    NotApplicable {
        endpoint: String,
        kind: EndpointKind,
        dimension: Dimension,
    },
    #[error("Endpoint '{endpoint}': {kind} endpoints require {dimension}")]
    MissingDimension {
        endpoint: String,
        kind: EndpointKind,
        dimension: Dimension,
    },
    #[error("Endpoint '{endpoint}': {source}")]
    Component {
        endpoint: String,
        source: ComponentError,
    },
}
