//! Dry run plan types and config validation
//!
//! Describes which scenarios *would* run and what each must return, without
//! sending any requests. Used for pre-flight validation and CI previews.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::category::{Category, Dimension, EndpointKind};
use crate::config::SuiteConfig;
use crate::matrix::ScenarioMatrix;

// ── Plan types ──

/// Complete dry run plan: endpoints, scenario counts, and config checks.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SuitePlan {
    pub endpoints: Vec<EndpointPlan>,
    /// Total scenarios that would run
    pub total_scenarios: u64,
    pub validations: Vec<Validation>,
}

/// Scenarios of a single endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EndpointPlan {
    pub name: String,
    pub kind: EndpointKind,
    /// HTTP method
    pub method: String,
    /// Path template
    pub path: String,
    pub scenarios: Vec<PlannedScenario>,
}

/// A scenario and the status it must produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PlannedScenario {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension: Option<Dimension>,
    pub category: Category,
    pub expected_status: u16,
}

impl EndpointPlan {
    /// Plan every scenario of a matrix in enumeration order.
    #[must_use]
    pub fn from_matrix<F>(
        kind: EndpointKind,
        path: impl Into<String>,
        matrix: &ScenarioMatrix<'_, F>,
    ) -> Self {
        let success = kind.success_status();
        let scenarios: Vec<PlannedScenario> = matrix
            .iter()
            .map(|s| PlannedScenario {
                name: s.name(),
                dimension: s.dimension,
                category: s.category,
                expected_status: s.category.expected_status(success),
            })
            .collect();
        Self {
            name: matrix.endpoint().to_string(),
            kind,
            method: kind.method().to_string(),
            path: path.into(),
            scenarios,
        }
    }
}

impl SuitePlan {
    pub fn push(&mut self, endpoint: EndpointPlan) {
        self.total_scenarios += endpoint.scenarios.len() as u64;
        self.endpoints.push(endpoint);
    }

    /// Plan a configured suite. Endpoints whose declaration is invalid are
    /// skipped; [`validate_config`] reports them.
    #[must_use]
    pub fn from_config(config: &SuiteConfig) -> Self {
        let mut plan = Self {
            validations: validate_config(config),
            ..Self::default()
        };
        for endpoint in &config.endpoints {
            let sets: Result<Vec<_>, _> = Dimension::ALL
                .iter()
                .map(|d| endpoint.component_set(*d))
                .collect();
            let Ok(sets) = sets else { continue };
            let matrix = sets
                .iter()
                .fold(ScenarioMatrix::new(&endpoint.name), |m, s| m.with(s.as_ref()));
            plan.push(EndpointPlan::from_matrix(
                endpoint.kind,
                endpoint.path.clone(),
                &matrix,
            ));
        }
        plan
    }
}

/// A validation check result.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Validation {
    pub check: String,
    pub status: ValidationStatus,
    pub message: String,
}

/// Status of a validation check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Ok,
    Warning,
    Error,
}

impl std::fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::Warning => write!(f, "WARNING"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

// ── Config validation ──

/// Validate config and produce validation results.
#[must_use]
pub fn validate_config(config: &SuiteConfig) -> Vec<Validation> {
    let mut checks = Vec::new();

    // Base URL
    if config.base_url.starts_with("http://") || config.base_url.starts_with("https://") {
        checks.push(Validation {
            check: "base_url".into(),
            status: ValidationStatus::Ok,
            message: format!("base_url: {}", config.base_url),
        });
    } else {
        checks.push(Validation {
            check: "base_url".into(),
            status: ValidationStatus::Warning,
            message: format!(
                "base_url: {} (missing http:// or https:// prefix)",
                config.base_url
            ),
        });
    }

    // Endpoint declarations
    if config.endpoints.is_empty() {
        checks.push(Validation {
            check: "endpoints".into(),
            status: ValidationStatus::Error,
            message: "endpoints: none declared".into(),
        });
    } else {
        match config.validate() {
            Ok(()) => checks.push(Validation {
                check: "endpoints".into(),
                status: ValidationStatus::Ok,
                message: format!("endpoints: {} declared", config.endpoints.len()),
            }),
            Err(e) => checks.push(Validation {
                check: "endpoints".into(),
                status: ValidationStatus::Error,
                message: e.to_string(),
            }),
        }
    }

    // Fixture references
    let mut missing: Vec<String> = config
        .endpoints
        .iter()
        .flat_map(|e| {
            e.fixture_refs()
                .into_iter()
                .map(move |r| (e.name.clone(), r))
        })
        .filter(|(_, r)| !config.fixture.contains_key(r))
        .map(|(endpoint, r)| format!("fixture: '{r}' referenced by {endpoint} is not defined"))
        .collect();
    missing.dedup();
    if missing.is_empty() {
        checks.push(Validation {
            check: "fixture".into(),
            status: ValidationStatus::Ok,
            message: format!("fixture: {} properties", config.fixture.len()),
        });
    } else {
        checks.extend(missing.into_iter().map(|message| Validation {
            check: "fixture".into(),
            status: ValidationStatus::Error,
            message,
        }));
    }

    checks
}

// ── Display helpers ──

impl SuitePlan {
    /// Format as human-readable terminal output.
    #[must_use]
    pub fn to_terminal(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!(
            "Dry run: {} endpoints, {} scenarios planned\n",
            self.endpoints.len(),
            self.total_scenarios,
        ));

        for ep in &self.endpoints {
            lines.push(format!(
                "{} ({} {}, {} scenarios):",
                ep.name,
                ep.method,
                ep.path,
                ep.scenarios.len()
            ));
            for s in &ep.scenarios {
                lines.push(format!("  {} -> {}", s.name, s.expected_status));
            }
            lines.push(String::new());
        }

        if !self.validations.is_empty() {
            lines.push("Config validation:".into());
            for v in &self.validations {
                lines.push(format!("  [{}] {}", v.status, v.message));
            }
        }

        lines.join("\n")
    }

    /// Returns true if any validation has Error status.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.validations
            .iter()
            .any(|v| v.status == ValidationStatus::Error)
    }

    /// Returns true if any validation has Warning status.
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        self.validations
            .iter()
            .any(|v| v.status == ValidationStatus::Warning)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example() -> SuiteConfig {
        toml::from_str(SuiteConfig::example()).unwrap()
    }

    #[test]
    fn example_plan_lists_every_scenario() {
        let plan = SuitePlan::from_config(&example());
        assert_eq!(plan.endpoints.len(), 3);
        // list: ok + unauthorized, create: ok + forbidden + bad_request, retrieve: ok + not_found
        assert_eq!(plan.total_scenarios, 7);
        assert!(!plan.has_errors());

        let create = &plan.endpoints[1];
        assert_eq!(create.method, "POST");
        assert_eq!(
            create.scenarios[1],
            PlannedScenario {
                name: "create_department__headers_forbidden".into(),
                dimension: Some(Dimension::Headers),
                category: Category::Forbidden,
                expected_status: 403,
            }
        );
        assert_eq!(create.scenarios[0].expected_status, 201);
    }

    #[test]
    fn validate_bad_base_url() {
        let cfg = SuiteConfig {
            base_url: "localhost:8080".into(),
            ..example()
        };
        let checks = validate_config(&cfg);
        let url_check = checks.iter().find(|c| c.check == "base_url").unwrap();
        assert_eq!(url_check.status, ValidationStatus::Warning);
    }

    #[test]
    fn validate_undefined_fixture_reference() {
        let mut cfg = example();
        cfg.fixture.remove("read_only");
        let checks = validate_config(&cfg);
        let errors: Vec<_> = checks
            .iter()
            .filter(|c| c.check == "fixture" && c.status == ValidationStatus::Error)
            .collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("'read_only'"));
    }

    #[test]
    fn validate_no_endpoints() {
        let cfg = SuiteConfig {
            endpoints: vec![],
            ..example()
        };
        let plan = SuitePlan::from_config(&cfg);
        assert!(plan.has_errors());
        assert_eq!(plan.total_scenarios, 0);
    }

    #[test]
    fn plan_terminal_output() {
        let plan = SuitePlan::from_config(&example());
        let text = plan.to_terminal();
        assert!(text.contains("3 endpoints, 7 scenarios planned"));
        assert!(text.contains("retrieve_department (GET /api/departments/{id}, 2 scenarios):"));
        assert!(text.contains("  retrieve_department__path_parameters_not_found -> 404"));
        assert!(text.contains("[OK] base_url: http://localhost:8000"));
    }
}
