//! Expectation categories, request dimensions and endpoint kinds
//!
//! Every request input is filed under one [`Dimension`] and one [`Category`].
//! The category fixes the status code a scenario must produce; the
//! [`EndpointKind`] fixes the success status and which dimensions apply.

use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Expected outcome class of a request input.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Valid input; the endpoint's success status is expected
    Ok,
    /// Input rejected by validation (400)
    BadRequest,
    /// Input collides with existing state (409)
    Conflict,
    /// Missing or unknown credentials (401)
    Unauthorized,
    /// Valid credentials without permission (403)
    Forbidden,
    /// Path refers to a record that does not exist (404)
    NotFound,
}

impl Category {
    /// Status code conventionally associated with a non-`ok` category.
    ///
    /// `Ok` has no fixed code: it depends on the endpoint kind.
    #[must_use]
    pub const fn failure_status(self) -> Option<u16> {
        match self {
            Self::Ok => None,
            Self::BadRequest => Some(400),
            Self::Conflict => Some(409),
            Self::Unauthorized => Some(401),
            Self::Forbidden => Some(403),
            Self::NotFound => Some(404),
        }
    }

    /// Status expected for this category on an endpoint whose success status is given.
    #[must_use]
    pub const fn expected_status(self, success_status: u16) -> u16 {
        match self.failure_status() {
            Some(code) => code,
            None => success_status,
        }
    }

    /// Category whose expected status equals `status`, if any.
    #[must_use]
    pub fn from_status(status: u16, success_status: u16) -> Option<Self> {
        if status == success_status {
            return Some(Self::Ok);
        }
        [
            Self::BadRequest,
            Self::Conflict,
            Self::Unauthorized,
            Self::Forbidden,
            Self::NotFound,
        ]
        .into_iter()
        .find(|c| c.failure_status() == Some(status))
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::BadRequest => "bad_request",
            Self::Conflict => "conflict",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown category name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown category '{0}'")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ok" => Ok(Self::Ok),
            "bad_request" => Ok(Self::BadRequest),
            "conflict" => Ok(Self::Conflict),
            "unauthorized" => Ok(Self::Unauthorized),
            "forbidden" => Ok(Self::Forbidden),
            "not_found" => Ok(Self::NotFound),
            other => Err(UnknownCategory(other.to_string())),
        }
    }
}

/// Independently varied part of a request.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    PathParameters,
    Headers,
    Payloads,
}

impl Dimension {
    /// Fixed enumeration order used by the matrix builder.
    pub const ALL: [Self; 3] = [Self::PathParameters, Self::Headers, Self::Payloads];

    /// Categories a component set of this dimension may declare, `ok` first.
    #[must_use]
    pub const fn categories(self) -> &'static [Category] {
        match self {
            Self::PathParameters => &[Category::Ok, Category::NotFound],
            Self::Headers => &[Category::Ok, Category::Unauthorized, Category::Forbidden],
            Self::Payloads => &[Category::Ok, Category::BadRequest, Category::Conflict],
        }
    }

    #[must_use]
    pub fn accepts(self, category: Category) -> bool {
        self.categories().contains(&category)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PathParameters => "path_parameters",
            Self::Headers => "headers",
            Self::Payloads => "payloads",
        }
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether an endpoint kind takes a dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimensionRule {
    Required,
    Optional,
    NotApplicable,
}

/// The five resource endpoint shapes (update split into full and partial).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EndpointKind {
    List,
    Create,
    Retrieve,
    Update,
    PartialUpdate,
    Delete,
}

impl EndpointKind {
    /// HTTP method used by this kind.
    #[must_use]
    pub const fn method(self) -> &'static str {
        match self {
            Self::List | Self::Retrieve => "GET",
            Self::Create => "POST",
            Self::Update => "PUT",
            Self::PartialUpdate => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// Status code of a successful request.
    #[must_use]
    pub const fn success_status(self) -> u16 {
        match self {
            Self::Create => 201,
            Self::Delete => 204,
            Self::List | Self::Retrieve | Self::Update | Self::PartialUpdate => 200,
        }
    }

    #[must_use]
    pub const fn dimension_rule(self, dimension: Dimension) -> DimensionRule {
        match (self, dimension) {
            (_, Dimension::Headers) => DimensionRule::Optional,
            (Self::List | Self::Create, Dimension::PathParameters) => DimensionRule::Optional,
            (_, Dimension::PathParameters) => DimensionRule::Required,
            (Self::Create | Self::Update | Self::PartialUpdate, Dimension::Payloads) => {
                DimensionRule::Required
            }
            (_, Dimension::Payloads) => DimensionRule::NotApplicable,
        }
    }

    /// Dimensions this kind can vary, in matrix order.
    #[must_use]
    pub fn applicable_dimensions(self) -> Vec<Dimension> {
        Dimension::ALL
            .into_iter()
            .filter(|d| self.dimension_rule(*d) != DimensionRule::NotApplicable)
            .collect()
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Create => "create",
            Self::Retrieve => "retrieve",
            Self::Update => "update",
            Self::PartialUpdate => "partial_update",
            Self::Delete => "delete",
        }
    }
}

impl std::fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_status_mapping_is_fixed() {
        assert_eq!(Category::BadRequest.failure_status(), Some(400));
        assert_eq!(Category::Conflict.failure_status(), Some(409));
        assert_eq!(Category::Unauthorized.failure_status(), Some(401));
        assert_eq!(Category::Forbidden.failure_status(), Some(403));
        assert_eq!(Category::NotFound.failure_status(), Some(404));
        assert_eq!(Category::Ok.failure_status(), None);
    }

    #[test]
    fn ok_expects_endpoint_success_status() {
        assert_eq!(Category::Ok.expected_status(201), 201);
        assert_eq!(Category::NotFound.expected_status(201), 404);
    }

    #[test]
    fn from_status_matches_category() {
        assert_eq!(Category::from_status(204, 204), Some(Category::Ok));
        assert_eq!(Category::from_status(409, 201), Some(Category::Conflict));
        assert_eq!(Category::from_status(500, 200), None);
        // 200 on a create endpoint is not the success status
        assert_eq!(Category::from_status(200, 201), None);
    }

    #[test]
    fn category_parse_roundtrip() {
        for c in [
            Category::Ok,
            Category::BadRequest,
            Category::Conflict,
            Category::Unauthorized,
            Category::Forbidden,
            Category::NotFound,
        ] {
            assert_eq!(c.as_str().parse::<Category>(), Ok(c));
        }
        assert_eq!(
            "teapot".parse::<Category>(),
            Err(UnknownCategory("teapot".into()))
        );
    }

    #[test]
    fn dimensions_accept_their_categories_only() {
        assert!(Dimension::Payloads.accepts(Category::Conflict));
        assert!(!Dimension::Payloads.accepts(Category::NotFound));
        assert!(Dimension::Headers.accepts(Category::Forbidden));
        assert!(!Dimension::PathParameters.accepts(Category::BadRequest));
    }

    #[test]
    fn endpoint_kind_metadata() {
        assert_eq!(EndpointKind::Create.success_status(), 201);
        assert_eq!(EndpointKind::Delete.success_status(), 204);
        assert_eq!(EndpointKind::PartialUpdate.method(), "PATCH");
        assert_eq!(
            EndpointKind::Retrieve.applicable_dimensions(),
            vec![Dimension::PathParameters, Dimension::Headers]
        );
        assert_eq!(
            EndpointKind::Update.dimension_rule(Dimension::Payloads),
            DimensionRule::Required
        );
        assert_eq!(
            EndpointKind::List.dimension_rule(Dimension::PathParameters),
            DimensionRule::Optional
        );
    }

    #[test]
    fn serde_names_are_snake_case() {
        assert_eq!(
            serde_json::to_string(&EndpointKind::PartialUpdate).unwrap(),
            "\"partial_update\""
        );
        let d: Dimension = serde_json::from_str("\"path_parameters\"").unwrap();
        assert_eq!(d, Dimension::PathParameters);
    }
}
