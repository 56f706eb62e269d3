//! Suite reports and the final pass/fail verdict
//!
//! Exit codes: 0 all scenarios passed, 1 at least one assertion failed,
//! 3 the harness itself could not run scenarios (configuration errors).

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::category::{Category, Dimension, EndpointKind};
use crate::outcome::{Mismatch, ResolvedInputs};

/// How a single scenario ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioStatus {
    Pass,
    /// Response diverged from the expectation
    Fail,
    /// Scenario could not be dispatched (resolution, path template, setup, transport)
    Error,
}

impl std::fmt::Display for ScenarioStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pass => write!(f, "PASS"),
            Self::Fail => write!(f, "FAIL"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// Request as it was sent, for reproduction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RequestSnapshot {
    pub method: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// Result of one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScenarioResult {
    /// Test name, e.g. `create_department__payloads_conflict`
    pub name: String,
    pub endpoint: String,
    pub kind: EndpointKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension: Option<Dimension>,
    pub category: Category,
    pub expected_status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_status: Option<u16>,
    pub status: ScenarioStatus,
    /// Failure or error description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mismatch: Option<Mismatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<ResolvedInputs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<RequestSnapshot>,
}

impl ScenarioResult {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.status == ScenarioStatus::Pass
    }

    /// Multi-line description used in panics and terminal output.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut lines = vec![format!(
            "[{}] {} (expected {}{})",
            self.status,
            self.name,
            self.expected_status,
            self.actual_status
                .map(|s| format!(", got {s}"))
                .unwrap_or_default()
        )];
        if let Some(msg) = &self.message {
            lines.push(format!("    {msg}"));
        }
        if let Some(detail) = self.mismatch.as_ref().and_then(|m| m.detail.as_ref()) {
            lines.push(format!("    detail: {detail}"));
        }
        if let Some(inputs) = &self.inputs {
            if !inputs.path_parameters.is_empty() {
                lines.push(format!(
                    "    path_parameters: {}",
                    serde_json::Value::Object(inputs.path_parameters.clone())
                ));
            }
            if !inputs.headers.is_empty() {
                let keys: Vec<&str> = inputs.headers.keys().map(String::as_str).collect();
                lines.push(format!("    headers: {}", keys.join(", ")));
            }
            if let Some(payload) = &inputs.payload {
                lines.push(format!("    payload: {payload}"));
            }
        }
        lines.join("\n")
    }
}

/// Results of every scenario of a suite, in execution order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SuiteReport {
    pub suite: String,
    pub results: Vec<ScenarioResult>,
}

impl SuiteReport {
    #[must_use]
    pub fn new(suite: impl Into<String>) -> Self {
        Self {
            suite: suite.into(),
            results: Vec::new(),
        }
    }

    pub fn push(&mut self, result: ScenarioResult) {
        self.results.push(result);
    }

    /// Append all results of another report.
    pub fn merge(&mut self, other: SuiteReport) {
        self.results.extend(other.results);
    }

    fn count(&self, status: ScenarioStatus) -> u64 {
        self.results.iter().filter(|r| r.status == status).count() as u64
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.results.len() as u64
    }

    #[must_use]
    pub fn passed(&self) -> u64 {
        self.count(ScenarioStatus::Pass)
    }

    #[must_use]
    pub fn failed(&self) -> u64 {
        self.count(ScenarioStatus::Fail)
    }

    #[must_use]
    pub fn errored(&self) -> u64 {
        self.count(ScenarioStatus::Error)
    }

    /// Scenarios that did not pass.
    pub fn problems(&self) -> impl Iterator<Item = &ScenarioResult> {
        self.results.iter().filter(|r| !r.passed())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ScenarioResult> {
        self.results.iter().find(|r| r.name == name)
    }

    /// Determine the verdict.
    ///
    /// PASS requires at least one scenario and every scenario passing.
    #[must_use]
    pub fn verdict(&self) -> Verdict {
        let total = self.total();
        let failed = self.failed();
        let errored = self.errored();

        let exit_code = if failed > 0 {
            1
        } else if errored > 0 || total == 0 {
            3
        } else {
            0
        };

        let status = if exit_code == 0 {
            VerdictStatus::Pass
        } else {
            VerdictStatus::Fail
        };

        let reason = if status == VerdictStatus::Pass {
            format!("All {total} scenarios passed")
        } else if total == 0 {
            "No scenarios were run".to_string()
        } else {
            let mut parts = Vec::new();
            if failed > 0 {
                parts.push(format!("{failed} failed"));
            }
            if errored > 0 {
                parts.push(format!("{errored} errors (configuration/transport)"));
            }
            format!("{} of {total} scenarios: {}", failed + errored, parts.join("; "))
        };

        Verdict {
            status,
            exit_code,
            reason,
        }
    }

    /// Panic with every non-passing scenario if any exists.
    ///
    /// Meant to be called at the end of a `#[test]` function.
    #[track_caller]
    pub fn assert_all_passed(&self) {
        let verdict = self.verdict();
        if verdict.status == VerdictStatus::Pass {
            return;
        }
        let details: Vec<String> = self.problems().map(ScenarioResult::describe).collect();
        panic!(
            "suite '{}': {}\n{}",
            self.suite,
            verdict.reason,
            details.join("\n")
        );
    }

    /// Format as human-readable terminal output.
    #[must_use]
    pub fn to_terminal(&self, verbose: bool) -> String {
        let mut lines = Vec::new();
        for r in &self.results {
            if verbose || !r.passed() {
                lines.push(r.describe());
            } else {
                lines.push(format!("[{}] {}", r.status, r.name));
            }
        }
        let verdict = self.verdict();
        lines.push(String::new());
        lines.push(format!("{}: {}", verdict.status, verdict.reason));
        lines.push(format!(
            "  Scenarios: {} total, {} passed, {} failed, {} errors",
            self.total(),
            self.passed(),
            self.failed(),
            self.errored()
        ));
        lines.join("\n")
    }
}

/// Final verdict
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub status: VerdictStatus,
    pub exit_code: i32,
    pub reason: String,
}

/// Pass or fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerdictStatus {
    Pass,
    Fail,
}

impl std::fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pass => write!(f, "PASS"),
            Self::Fail => write!(f, "FAIL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::MismatchKind;

    fn result(name: &str, status: ScenarioStatus) -> ScenarioResult {
        ScenarioResult {
            name: name.into(),
            endpoint: "create_department".into(),
            kind: EndpointKind::Create,
            dimension: Some(Dimension::Payloads),
            category: Category::Conflict,
            expected_status: 409,
            actual_status: Some(if status == ScenarioStatus::Pass { 409 } else { 201 }),
            status,
            message: None,
            mismatch: None,
            inputs: None,
            request: None,
        }
    }

    #[test]
    fn all_pass_is_pass() {
        let mut report = SuiteReport::new("departments");
        report.push(result("a", ScenarioStatus::Pass));
        report.push(result("b", ScenarioStatus::Pass));
        let v = report.verdict();
        assert_eq!(v.status, VerdictStatus::Pass);
        assert_eq!(v.exit_code, 0);
        assert_eq!(v.reason, "All 2 scenarios passed");
        report.assert_all_passed();
    }

    #[test]
    fn empty_report_is_fail() {
        let v = SuiteReport::new("empty").verdict();
        assert_eq!(v.status, VerdictStatus::Fail);
        assert_eq!(v.exit_code, 3);
        assert_eq!(v.reason, "No scenarios were run");
    }

    #[test]
    fn failure_takes_precedence_over_error() {
        let mut report = SuiteReport::new("departments");
        report.push(result("a", ScenarioStatus::Fail));
        report.push(result("b", ScenarioStatus::Error));
        report.push(result("c", ScenarioStatus::Pass));
        let v = report.verdict();
        assert_eq!(v.exit_code, 1);
        assert!(v.reason.contains("1 failed"));
        assert!(v.reason.contains("1 errors"));
        assert_eq!(report.problems().count(), 2);
    }

    #[test]
    fn errors_only_exit_3() {
        let mut report = SuiteReport::new("departments");
        report.push(result("a", ScenarioStatus::Error));
        assert_eq!(report.verdict().exit_code, 3);
    }

    #[test]
    #[should_panic(expected = "create_department__payloads_conflict")]
    fn assert_all_passed_lists_failures() {
        let mut report = SuiteReport::new("departments");
        let mut r = result("create_department__payloads_conflict", ScenarioStatus::Fail);
        r.mismatch = Some(Mismatch::new(MismatchKind::Status, "409 (conflict)", "201 (ok)"));
        r.message = Some("status mismatch".into());
        report.push(r);
        report.assert_all_passed();
    }

    #[test]
    fn describe_includes_inputs() {
        let mut r = result("x", ScenarioStatus::Fail);
        r.inputs = Some(ResolvedInputs {
            path_parameters: serde_json::json!({"id": 3}).as_object().cloned().unwrap(),
            headers: BTreeMap::from([("authorization".to_string(), "Bearer t".to_string())]),
            payload: Some(serde_json::json!({"title": "a"})),
        });
        let text = r.describe();
        assert!(text.contains(r#"path_parameters: {"id":3}"#));
        assert!(text.contains("headers: authorization"));
        assert!(text.contains(r#"payload: {"title":"a"}"#));
    }

    #[test]
    fn report_serialization_roundtrip() {
        let mut report = SuiteReport::new("departments");
        report.push(result("a", ScenarioStatus::Pass));
        let json = serde_json::to_string(&report).unwrap();
        let parsed: SuiteReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, report);
    }
}
