//! Scenario resolution and request dispatch

use std::collections::BTreeMap;

use crudmatrix_core::{
    EndpointKind, Fixture, Outcome, RequestValue, ResolutionError, ResolvedInputs, Scenario,
};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use serde_json::Value;

use crate::http::{Method, Request};
use crate::transport::{Transport, TransportError};

/// Resolve the three request slots of a scenario against the fixture.
///
/// # Errors
///
/// Returns [`ResolutionError`] for a missing or mistyped property, or when path
/// parameters or headers do not resolve to an object (of strings, for headers).
pub fn resolve_inputs<F: Fixture>(
    scenario: &Scenario<'_, F>,
    fixture: &F,
) -> Result<ResolvedInputs, ResolutionError> {
    let path_parameters = match resolve_object(scenario.path_parameters, fixture, "path_parameters")? {
        Some(map) => map,
        None => serde_json::Map::new(),
    };

    let headers = match resolve_object(scenario.headers, fixture, "headers")? {
        Some(map) => map
            .into_iter()
            .map(|(name, value)| match value {
                Value::String(s) => Ok((name.to_ascii_lowercase(), s)),
                other => Err(ResolutionError::Shape {
                    dimension: format!("headers.{name}"),
                    expected: "a string",
                    actual: other.to_string(),
                }),
            })
            .collect::<Result<BTreeMap<_, _>, _>>()?,
        None => BTreeMap::new(),
    };

    let payload = scenario
        .payload
        .map(|value| value.resolve(fixture))
        .transpose()?;

    Ok(ResolvedInputs {
        path_parameters,
        headers,
        payload,
    })
}

fn resolve_object<F: Fixture>(
    value: Option<&RequestValue<F>>,
    fixture: &F,
    dimension: &str,
) -> Result<Option<serde_json::Map<String, Value>>, ResolutionError> {
    let Some(value) = value else {
        return Ok(None);
    };
    match value.resolve(fixture)? {
        Value::Object(map) => Ok(Some(map)),
        Value::Null => Ok(Some(serde_json::Map::new())),
        other => Err(ResolutionError::Shape {
            dimension: dimension.to_string(),
            expected: "an object",
            actual: other.to_string(),
        }),
    }
}

/// A `{name}` placeholder could not be filled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathTemplateError {
    #[error("path template '{template}' has no value for '{{{name}}}'")]
    MissingParameter { template: String, name: String },
    #[error("path template '{0}' has an unbalanced brace")]
    Malformed(String),
}

/// Placeholder names of a path template, in order.
///
/// # Errors
///
/// Returns [`PathTemplateError::Malformed`] on unbalanced braces.
pub fn placeholders(template: &str) -> Result<Vec<String>, PathTemplateError> {
    let mut names = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find(['{', '}']) {
        if rest[start..].starts_with('}') {
            return Err(PathTemplateError::Malformed(template.to_string()));
        }
        let after = &rest[start + 1..];
        let end = after
            .find('}')
            .filter(|end| !after[..*end].contains('{') && *end > 0)
            .ok_or_else(|| PathTemplateError::Malformed(template.to_string()))?;
        names.push(after[..end].to_string());
        rest = &after[end + 1..];
    }
    Ok(names)
}

/// Characters escaped inside a path segment: controls, `/`, `?`, `#`, `%`,
/// braces and everything that is not allowed unescaped in a URL path.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Substitute path parameters into a template. Extra parameters are ignored.
///
/// The template is walked once; substituted values are percent-encoded as a
/// single path segment and never rescanned for placeholders.
///
/// # Errors
///
/// Returns [`PathTemplateError`] when a placeholder has no resolved key.
pub fn build_path(
    template: &str,
    params: &serde_json::Map<String, Value>,
) -> Result<String, PathTemplateError> {
    // validates brace balance up front
    placeholders(template)?;

    let mut path = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        path.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let end = after
            .find('}')
            .ok_or_else(|| PathTemplateError::Malformed(template.to_string()))?;
        let name = &after[..end];
        let value = params
            .get(name)
            .ok_or_else(|| PathTemplateError::MissingParameter {
                template: template.to_string(),
                name: name.to_string(),
            })?;
        let text = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        path.extend(utf8_percent_encode(&text, PATH_SEGMENT));
        rest = &after[end + 1..];
    }
    path.push_str(rest);
    Ok(path)
}

/// Build the request for resolved inputs.
///
/// # Errors
///
/// Returns [`PathTemplateError`] when the path cannot be built.
pub fn build_request(
    kind: EndpointKind,
    template: &str,
    inputs: &ResolvedInputs,
) -> Result<Request, PathTemplateError> {
    let path = build_path(template, &inputs.path_parameters)?;
    let mut request = Request::new(Method::for_kind(kind), path);
    for (name, value) in &inputs.headers {
        request = request.with_header(name, value.clone());
    }
    if let Some(payload) = &inputs.payload {
        request = request.with_json(payload);
    }
    Ok(request)
}

/// Send the request and capture status and raw body.
///
/// # Errors
///
/// Returns [`TransportError`] if the transport produced no response.
pub fn execute(
    transport: &dyn Transport,
    request: &Request,
    success_status: u16,
) -> Result<Outcome, TransportError> {
    let response = transport.send(request)?;
    tracing::debug!(
        method = %request.method,
        path = %request.path,
        status = response.status,
        "dispatched"
    );
    Ok(Outcome::new(response.status, response.body, success_status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crudmatrix_core::{
        Category, ComponentSet, FixtureMap, Headers, PathParameters, Payloads, ResolvableValue,
        ScenarioMatrix,
    };
    use serde_json::json;

    fn params(v: Value) -> serde_json::Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn build_path_substitutes_values() {
        let path = build_path(
            "/api/departments/{id}/employees/{employee}",
            &params(json!({"id": 3, "employee": "x7", "unused": true})),
        )
        .unwrap();
        assert_eq!(path, "/api/departments/3/employees/x7");
    }

    #[test]
    fn build_path_does_not_rescan_substituted_values() {
        let path = build_path("/a/{x}/{y}", &params(json!({"x": "{y}", "y": "1"}))).unwrap();
        assert_eq!(path, "/a/%7By%7D/1");
    }

    #[test]
    fn build_path_keeps_each_value_in_one_segment() {
        let path = build_path("/d/{id}", &params(json!({"id": "1/../2"}))).unwrap();
        assert_eq!(path, "/d/1%2F..%2F2");
        let path = build_path("/d/{id}/x", &params(json!({"id": "a?b#c d%"}))).unwrap();
        assert_eq!(path, "/d/a%3Fb%23c%20d%25/x");
    }

    #[test]
    fn build_path_reports_missing_placeholder() {
        let err = build_path("/api/departments/{id}", &params(json!({"pk": 3}))).unwrap_err();
        assert_eq!(
            err,
            PathTemplateError::MissingParameter {
                template: "/api/departments/{id}".into(),
                name: "id".into()
            }
        );
        assert_eq!(err.to_string(), "path template '/api/departments/{id}' has no value for '{id}'");
    }

    #[test]
    fn placeholders_detect_malformed_templates() {
        assert_eq!(placeholders("/a/{id}/b/{x}").unwrap(), vec!["id", "x"]);
        assert!(placeholders("/a/").unwrap().is_empty());
        for bad in ["/a/{id", "/a/id}", "/a/{}", "/a/{{id}}"] {
            assert!(
                matches!(placeholders(bad), Err(PathTemplateError::Malformed(_))),
                "{bad}"
            );
        }
    }

    #[test]
    fn resolve_inputs_uses_fixture() {
        let fixture = FixtureMap::new()
            .with("department_id", 4)
            .with("token", "Bearer rw");
        let path: ComponentSet = PathParameters::new(ResolvableValue::factory(|f: &FixtureMap| {
            json!({"id": f.property("department_id")})
        }))
        .into();
        let headers: ComponentSet = Headers::new(ResolvableValue::factory(|f: &FixtureMap| {
            json!({"Authorization": f.property("token")})
        }))
        .into();
        let payloads: ComponentSet = Payloads::new(json!({"title": "a"})).into();
        let matrix = ScenarioMatrix::new("update")
            .with(Some(&path))
            .with(Some(&headers))
            .with(Some(&payloads));
        let scenario = matrix.iter().next().unwrap();

        let inputs = resolve_inputs(&scenario, &fixture).unwrap();
        assert_eq!(inputs.path_parameters, params(json!({"id": 4})));
        assert_eq!(inputs.headers.get("authorization").map(String::as_str), Some("Bearer rw"));
        assert_eq!(inputs.payload, Some(json!({"title": "a"})));

        let req = build_request(EndpointKind::Update, "/api/departments/{id}", &inputs).unwrap();
        assert_eq!(req.method, Method::Put);
        assert_eq!(req.path, "/api/departments/4");
        assert_eq!(req.header("content-type"), Some("application/json"));
    }

    #[test]
    fn non_string_header_is_shape_error() {
        let headers: ComponentSet = Headers::new(json!({"x-count": 3})).into();
        let matrix = ScenarioMatrix::new("list").with(Some(&headers));
        let scenario = matrix.iter().next().unwrap();
        let err = resolve_inputs(&scenario, &FixtureMap::new()).unwrap_err();
        assert!(matches!(err, ResolutionError::Shape { expected: "a string", .. }));
    }

    #[test]
    fn missing_property_fails_before_dispatch() {
        let path: ComponentSet = PathParameters::new(ResolvableValue::property("nope"))
            .not_found(json!({"id": 0}))
            .into();
        let matrix = ScenarioMatrix::new("retrieve").with(Some(&path));
        let scenarios: Vec<_> = matrix.iter().collect();
        assert_eq!(scenarios[1].category, Category::NotFound);
        assert!(resolve_inputs(&scenarios[1], &FixtureMap::new()).is_ok());
        assert_eq!(
            resolve_inputs(&scenarios[0], &FixtureMap::new()),
            Err(ResolutionError::MissingProperty("nope".into()))
        );
    }
}
