//! Path-template router dispatching requests to handlers over a store

use std::collections::BTreeMap;
use std::sync::Arc;

use percent_encoding::percent_decode_str;

use crate::http::{Method, Request, Response};
use crate::store::Store;

/// Request plus the path parameters extracted by the route template.
#[derive(Debug)]
pub struct RouteContext<'a> {
    pub request: &'a Request,
    pub params: BTreeMap<String, String>,
}

impl RouteContext<'_> {
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

pub type Handler = Arc<dyn Fn(&RouteContext<'_>, &dyn Store) -> Response + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

fn parse_template(template: &str) -> Result<Vec<Segment>, RouteError> {
    split_path(template)
        .map(|seg| {
            if let Some(inner) = seg.strip_prefix('{') {
                let name = inner
                    .strip_suffix('}')
                    .filter(|n| !n.is_empty() && !n.contains(['{', '}']))
                    .ok_or_else(|| RouteError::InvalidTemplate(template.to_string()))?;
                Ok(Segment::Param(name.to_string()))
            } else if seg.contains(['{', '}']) {
                Err(RouteError::InvalidTemplate(template.to_string()))
            } else {
                Ok(Segment::Literal(seg.to_string()))
            }
        })
        .collect()
}

/// Templates that match the same paths, whatever their parameter names.
fn same_shape(a: &[Segment], b: &[Segment]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|pair| match pair {
            (Segment::Literal(x), Segment::Literal(y)) => x == y,
            (Segment::Param(_), Segment::Param(_)) => true,
            _ => false,
        })
}

/// Non-empty path segments; leading and trailing slashes are not significant.
fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

struct Route {
    method: Method,
    template: String,
    segments: Vec<Segment>,
    handler: Handler,
}

impl Route {
    fn matches(&self, path: &[&str]) -> Option<BTreeMap<String, String>> {
        if path.len() != self.segments.len() {
            return None;
        }
        let mut params = BTreeMap::new();
        for (segment, part) in self.segments.iter().zip(path) {
            match segment {
                Segment::Literal(lit) if lit == part => {}
                Segment::Literal(_) => return None,
                Segment::Param(name) => {
                    let value = percent_decode_str(part).decode_utf8_lossy().into_owned();
                    params.insert(name.clone(), value);
                }
            }
        }
        Some(params)
    }
}

/// Routes in registration order.
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.routes().map(|(m, t)| format!("{m} {t}")))
            .finish()
    }
}

impl Router {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a method and a `{name}` path template.
    ///
    /// # Errors
    ///
    /// Fails on a malformed template or an already registered method + template.
    pub fn register_route(
        &mut self,
        method: Method,
        template: &str,
        handler: impl Fn(&RouteContext<'_>, &dyn Store) -> Response + Send + Sync + 'static,
    ) -> Result<(), RouteError> {
        let segments = parse_template(template)?;
        if self
            .routes
            .iter()
            .any(|r| r.method == method && same_shape(&r.segments, &segments))
        {
            return Err(RouteError::Duplicate {
                method,
                template: template.to_string(),
            });
        }
        tracing::debug!(%method, template, "route registered");
        self.routes.push(Route {
            method,
            template: template.to_string(),
            segments,
            handler: Arc::new(handler),
        });
        Ok(())
    }

    /// Registered routes as `(method, template)`.
    pub fn routes(&self) -> impl Iterator<Item = (Method, &str)> {
        self.routes.iter().map(|r| (r.method, r.template.as_str()))
    }

    /// Route a request: 404 when no template matches the path, 405 when only
    /// the method differs.
    pub fn dispatch(&self, request: &Request, store: &dyn Store) -> Response {
        let path: Vec<&str> = split_path(request.route_path()).collect();
        let mut allowed = Vec::new();
        for route in &self.routes {
            let Some(params) = route.matches(&path) else {
                continue;
            };
            if route.method == request.method {
                let ctx = RouteContext { request, params };
                return (route.handler)(&ctx, store);
            }
            allowed.push(route.method.as_str());
        }
        if allowed.is_empty() {
            Response::error(404, "Not found.")
        } else {
            allowed.sort_unstable();
            allowed.dedup();
            Response::error(405, format!("Method \"{}\" not allowed.", request.method))
                .with_header("allow", allowed.join(", "))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("invalid path template '{0}'")]
    InvalidTemplate(String),
    #[error("route {method} {template} is already registered")]
    Duplicate { method: Method, template: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn echo(ctx: &RouteContext<'_>, _store: &dyn Store) -> Response {
        Response::json(200, &json!(ctx.params))
    }

    fn router() -> Router {
        let mut r = Router::new();
        r.register_route(Method::Get, "/api/departments/", echo).unwrap();
        r.register_route(Method::Get, "/api/departments/{id}", echo).unwrap();
        r.register_route(Method::Delete, "/api/departments/{id}", echo).unwrap();
        r
    }

    #[test]
    fn extracts_path_params() {
        let store = MemoryStore::new();
        let resp = router().dispatch(&Request::new(Method::Get, "/api/departments/7"), &store);
        assert_eq!(resp.status, 200);
        assert_eq!(resp.json_body(), Some(json!({"id": "7"})));
    }

    #[test]
    fn path_params_are_percent_decoded() {
        let store = MemoryStore::new();
        let resp = router().dispatch(&Request::new(Method::Get, "/api/departments/1%2F..%2F2"), &store);
        assert_eq!(resp.status, 200);
        assert_eq!(resp.json_body(), Some(json!({"id": "1/../2"})));
    }

    #[test]
    fn trailing_slash_is_insignificant() {
        let store = MemoryStore::new();
        let resp = router().dispatch(&Request::new(Method::Get, "/api/departments"), &store);
        assert_eq!(resp.status, 200);
        assert_eq!(resp.json_body(), Some(json!({})));
    }

    #[test]
    fn unknown_path_is_404_wrong_method_is_405() {
        let store = MemoryStore::new();
        let r = router();
        assert_eq!(r.dispatch(&Request::new(Method::Get, "/nope"), &store).status, 404);
        let resp = r.dispatch(&Request::new(Method::Put, "/api/departments/1"), &store);
        assert_eq!(resp.status, 405);
        assert_eq!(resp.header("allow"), Some("DELETE, GET"));
    }

    #[test]
    fn duplicate_route_is_rejected() {
        let mut r = router();
        let err = r
            .register_route(Method::Get, "api/departments/{pk}/", echo)
            .unwrap_err();
        assert!(matches!(err, RouteError::Duplicate { method: Method::Get, .. }));
    }

    #[test]
    fn malformed_templates_are_rejected() {
        let mut r = Router::new();
        for bad in ["/a/{}", "/a/{id", "/a/x{id}"] {
            assert_eq!(
                r.register_route(Method::Get, bad, echo),
                Err(RouteError::InvalidTemplate(bad.to_string()))
            );
        }
    }
}
