//! Minimal HTTP model shared by the router, the transports and the harness

use std::collections::BTreeMap;
use std::str::FromStr;

use crudmatrix_core::{EndpointKind, RequestSnapshot};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// Methods that change server state.
    #[must_use]
    pub const fn is_mutating(self) -> bool {
        !matches!(self, Self::Get)
    }

    #[must_use]
    pub const fn for_kind(kind: EndpointKind) -> Self {
        match kind {
            EndpointKind::List | EndpointKind::Retrieve => Self::Get,
            EndpointKind::Create => Self::Post,
            EndpointKind::Update => Self::Put,
            EndpointKind::PartialUpdate => Self::Patch,
            EndpointKind::Delete => Self::Delete,
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported HTTP method '{0}'")]
pub struct UnknownMethod(pub String);

impl FromStr for Method {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            _ => Err(UnknownMethod(s.to_string())),
        }
    }
}

/// Outgoing request. Header names are stored lower-case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Vec<u8>>,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: BTreeMap::new(),
            body: None,
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Attach a JSON body and its content type.
    #[must_use]
    pub fn with_json(mut self, body: &Value) -> Self {
        self.body = Some(body.to_string().into_bytes());
        self.with_header("content-type", "application/json")
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Path without the query string.
    #[must_use]
    pub fn route_path(&self) -> &str {
        self.path.split('?').next().unwrap_or_default()
    }

    /// Parse the body as JSON. `None` when there is no body.
    ///
    /// # Errors
    ///
    /// Returns the parse error for a malformed body.
    pub fn json(&self) -> Result<Option<Value>, serde_json::Error> {
        self.body
            .as_deref()
            .map(serde_json::from_slice::<Value>)
            .transpose()
    }

    #[must_use]
    pub fn snapshot(&self) -> RequestSnapshot {
        RequestSnapshot {
            method: self.method.to_string(),
            path: self.path.clone(),
            headers: self.headers.clone(),
            body: self
                .body
                .as_ref()
                .map(|b| String::from_utf8_lossy(b).into_owned()),
        }
    }
}

/// Response as captured by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

impl Response {
    #[must_use]
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: Vec::new(),
        }
    }

    #[must_use]
    pub fn json(status: u16, body: &Value) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        Self {
            status,
            headers,
            body: body.to_string().into_bytes(),
        }
    }

    /// Error response with a `{"detail": ...}` body.
    #[must_use]
    pub fn error(status: u16, detail: impl Into<String>) -> Self {
        Self::json(status, &serde_json::json!({ "detail": detail.into() }))
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    #[must_use]
    pub fn json_body(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn header_names_are_case_insensitive() {
        let req = Request::new(Method::Get, "/").with_header("Authorization", "Bearer x");
        assert_eq!(req.header("AUTHORIZATION"), Some("Bearer x"));
        assert!(req.headers.contains_key("authorization"));
    }

    #[test]
    fn json_body_sets_content_type() {
        let req = Request::new(Method::Post, "/api/").with_json(&json!({"title": "a"}));
        assert_eq!(req.header("content-type"), Some("application/json"));
        assert_eq!(req.json().unwrap(), Some(json!({"title": "a"})));
        assert_eq!(Request::new(Method::Get, "/").json().unwrap(), None);
    }

    #[test]
    fn route_path_drops_query() {
        let req = Request::new(Method::Get, "/api/departments/?page=2");
        assert_eq!(req.route_path(), "/api/departments/");
    }

    #[test]
    fn method_metadata() {
        assert_eq!(Method::for_kind(EndpointKind::PartialUpdate), Method::Patch);
        assert!(Method::Delete.is_mutating());
        assert!(!Method::Get.is_mutating());
        assert_eq!("patch".parse::<Method>(), Ok(Method::Patch));
        assert!("TRACE".parse::<Method>().is_err());
    }

    #[test]
    fn error_response_has_detail() {
        let resp = Response::error(404, "Not found.");
        assert_eq!(resp.json_body(), Some(json!({"detail": "Not found."})));
        assert_eq!(resp.header("Content-Type"), Some("application/json"));
    }
}
