//! Scenario outcomes and status classification

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::category::Category;

/// Inputs of a scenario after resolution against the fixture.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ResolvedInputs {
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub path_parameters: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

/// Raw result of one dispatched scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub status: u16,
    pub body: Vec<u8>,
    /// Category whose expected status equals `status`
    pub matched_category: Option<Category>,
}

impl Outcome {
    #[must_use]
    pub fn new(status: u16, body: Vec<u8>, success_status: u16) -> Self {
        Self {
            status,
            body,
            matched_category: Category::from_status(status, success_status),
        }
    }

    /// Body as lossy UTF-8, for diagnostics.
    #[must_use]
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Parse the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns a [`Mismatch`] of kind `Shape` if the body is not valid JSON.
    pub fn json(&self) -> Result<serde_json::Value, Mismatch> {
        serde_json::from_slice(&self.body).map_err(|e| {
            Mismatch::new(MismatchKind::Shape, "JSON body", truncate(&self.body_text(), 200))
                .with_detail(e.to_string())
        })
    }

    /// Assert that the status matches the expected category.
    ///
    /// # Errors
    ///
    /// Returns a [`Mismatch`] of kind `Status` on any other status code.
    pub fn check_status(&self, expected: Category, success_status: u16) -> Result<(), Mismatch> {
        let expected_status = expected.expected_status(success_status);
        if self.status == expected_status {
            return Ok(());
        }
        let actual = match self.matched_category {
            Some(c) => format!("{} ({c})", self.status),
            None => self.status.to_string(),
        };
        Err(
            Mismatch::new(MismatchKind::Status, format!("{expected_status} ({expected})"), actual)
                .with_detail(truncate(&self.body_text(), 200)),
        )
    }
}

/// What part of the response diverged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MismatchKind {
    /// Wrong status code
    Status,
    /// Body is not shaped like the endpoint kind requires
    Shape,
    /// Body differs from the re-serialized persisted record(s)
    Body,
    /// Persisted state differs from what the request should have produced
    Persistence,
}

impl std::fmt::Display for MismatchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Status => write!(f, "status"),
            Self::Shape => write!(f, "shape"),
            Self::Body => write!(f, "body"),
            Self::Persistence => write!(f, "persistence"),
        }
    }
}

/// An actual response diverging from the expected one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, thiserror::Error)]
#[error("{kind} mismatch: expected {expected}, got {actual}")]
pub struct Mismatch {
    pub kind: MismatchKind,
    pub expected: String,
    pub actual: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Mismatch {
    pub fn new(kind: MismatchKind, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self {
            kind,
            expected: expected.into(),
            actual: actual.into(),
            detail: None,
        }
    }

    /// Compare two JSON values for exact structural equality.
    ///
    /// # Errors
    ///
    /// Returns a mismatch of the given kind when the values differ.
    pub fn ensure_eq(
        kind: MismatchKind,
        expected: &serde_json::Value,
        actual: &serde_json::Value,
    ) -> Result<(), Self> {
        if expected == actual {
            Ok(())
        } else {
            Err(Self::new(kind, expected.to_string(), actual.to_string()))
        }
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Truncate on a char boundary, marking the cut.
#[must_use]
pub fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…({} bytes total)", &text[..end], text.len())
}
