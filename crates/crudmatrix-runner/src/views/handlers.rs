//! Request handling for each view kind
//!
//! Checks run in a fixed order: authentication, record lookup, payload
//! validation, persistence.

use crudmatrix_core::EndpointKind;
use serde_json::Value;

use super::ResolvedView;
use crate::auth::TokenAuth;
use crate::http::Response;
use crate::router::RouteContext;
use crate::schema::{Schema, ValidationError};
use crate::store::{Filter, Record, Store, StoreError};

type Handled = Result<Response, Response>;

pub(super) fn handler(
    view: ResolvedView,
    auth: Option<TokenAuth>,
) -> impl Fn(&RouteContext<'_>, &dyn Store) -> Response + Send + Sync + 'static {
    move |ctx: &RouteContext<'_>, store: &dyn Store| {
        let result = authorize(auth.as_ref(), ctx).and_then(|()| handle(&view, ctx, store));
        let response = result.unwrap_or_else(|err| err);
        tracing::debug!(
            view = %view.name,
            path = %ctx.request.path,
            status = response.status,
            "handled"
        );
        response
    }
}

fn authorize(auth: Option<&TokenAuth>, ctx: &RouteContext<'_>) -> Result<(), Response> {
    match auth {
        Some(auth) => auth
            .authorize(ctx.request)
            .map(|_| ())
            .map_err(|denied| Response::error(denied.status(), denied.detail())),
        None => Ok(()),
    }
}

fn handle(view: &ResolvedView, ctx: &RouteContext<'_>, store: &dyn Store) -> Handled {
    // 404 before anything else for detail routes
    let id = if view.is_detail() {
        let id = parse_id(ctx)?;
        fetch(store, &view.parent_model, id)?;
        Some(id)
    } else {
        None
    };

    match (view.kind, id, &view.scope) {
        (EndpointKind::List, Some(parent), Some(scope)) => {
            let records = store
                .query_all(&view.model, &Filter::all().eq(&scope.scope_field, parent))
                .map_err(store_error)?;
            Ok(list_response(view, &records))
        }
        (EndpointKind::List, _, _) => {
            let records = store
                .query_all(&view.model, &Filter::all())
                .map_err(store_error)?;
            Ok(list_response(view, &records))
        }
        (EndpointKind::Create, parent, scope) => {
            let mut fields = validate(input(view)?, ctx, false)?;
            if let (Some(parent), Some(scope)) = (parent, scope) {
                fields.insert(scope.scope_field.clone(), Value::from(parent));
            }
            let record = store.insert(&view.model, fields).map_err(store_error)?;
            Ok(Response::json(201, &output(view, &record)))
        }
        (EndpointKind::Retrieve, Some(id), _) => {
            let record = fetch(store, &view.model, id)?;
            Ok(Response::json(200, &output(view, &record)))
        }
        (EndpointKind::Update | EndpointKind::PartialUpdate, Some(id), _) => {
            let partial = view.kind == EndpointKind::PartialUpdate;
            let fields = validate(input(view)?, ctx, partial)?;
            let record = store.update(&view.model, id, fields).map_err(store_error)?;
            Ok(Response::json(200, &output(view, &record)))
        }
        (EndpointKind::Delete, Some(id), _) => {
            store.delete(&view.model, id).map_err(store_error)?;
            Ok(Response::empty(204))
        }
        _ => Err(Response::error(500, "view is missing its id parameter")),
    }
}

/// Non-numeric ids cannot name a record.
fn parse_id(ctx: &RouteContext<'_>) -> Result<u64, Response> {
    ctx.param("id")
        .and_then(|raw| raw.parse().ok())
        .ok_or_else(|| Response::error(404, "Not found."))
}

fn fetch(store: &dyn Store, model: &str, id: u64) -> Result<Record, Response> {
    store
        .fetch_by_id(model, id)
        .map_err(store_error)?
        .ok_or_else(|| Response::error(404, "Not found."))
}

fn input(view: &ResolvedView) -> Result<&Schema, Response> {
    view.input_schema
        .as_ref()
        .ok_or_else(|| Response::error(500, "view has no input schema"))
}

fn validate(schema: &Schema, ctx: &RouteContext<'_>, partial: bool) -> Result<Record, Response> {
    let payload = match ctx.request.json() {
        Ok(Some(payload)) => payload,
        Ok(None) => return Err(Response::error(400, "Request body is required.")),
        Err(e) => return Err(Response::error(400, format!("Malformed JSON: {e}"))),
    };
    let result = if partial {
        schema.deserialize_partial(&payload)
    } else {
        schema.deserialize(&payload)
    };
    result.map_err(|e: ValidationError| {
        Response::json(
            400,
            &serde_json::json!({ "detail": e.to_string(), "errors": e.errors }),
        )
    })
}

fn output(view: &ResolvedView, record: &Record) -> Value {
    match &view.output_schema {
        Some(schema) => schema.serialize(record),
        None => Value::Object(record.clone()),
    }
}

fn list_response(view: &ResolvedView, records: &[Record]) -> Response {
    let items: Vec<Value> = records.iter().map(|r| output(view, r)).collect();
    Response::json(200, &Value::Array(items))
}

fn store_error(err: StoreError) -> Response {
    match err {
        StoreError::UniqueViolation { .. } => Response::error(409, err.to_string()),
        StoreError::NotFound { .. } => Response::error(404, "Not found."),
        StoreError::UnknownModel(_) => {
            tracing::warn!(error = %err, "view points at an undeclared model");
            Response::error(500, err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::{ModelView, ModelViewSet, register_all};
    use crate::auth::{Access, TokenAuth};
    use crate::http::{Method, Request};
    use crate::router::Router;
    use crate::schema::Schema;
    use crate::store::{MemoryStore, RecordSource};
    use serde_json::{Value, json};

    fn setup() -> (Router, MemoryStore) {
        let store = MemoryStore::new()
            .with_model("department", &["title"])
            .with_model("employee", &[]);
        let department = Schema::object(
            "DepartmentIn",
            json!({"title": {"type": "string", "minLength": 1}}),
            &["title"],
        )
        .unwrap();
        let department_out = Schema::object(
            "DepartmentOut",
            json!({"id": {"type": "integer"}, "title": {"type": "string"}}),
            &[],
        )
        .unwrap();
        let employee = Schema::object(
            "EmployeeIn",
            json!({"name": {"type": "string"}}),
            &["name"],
        )
        .unwrap();
        let departments = ModelViewSet::builder("department", "/api/departments")
            .input_schema(department)
            .output_schema(department_out)
            .auth(
                TokenAuth::new()
                    .with_token("rw", Access::ReadWrite)
                    .with_token("ro", Access::ReadOnly),
            )
            .view(ModelView::list())
            .view(ModelView::create())
            .view(ModelView::retrieve())
            .view(ModelView::update())
            .view(ModelView::partial_update())
            .view(ModelView::delete())
            .view(ModelView::detail_list("employees", "employee", "department_id"))
            .view(
                ModelView::detail_create("employees", "employee", "department_id")
                    .with_input_schema(employee),
            )
            .build()
            .unwrap();
        let mut router = Router::new();
        register_all(&mut router, &[&departments]).unwrap();
        store.seed("department", json!({"title": "department-1"})).unwrap();
        (router, store)
    }

    fn send(
        router: &Router,
        store: &MemoryStore,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> (u16, Value) {
        let mut req = Request::new(method, path).with_header("authorization", "Bearer rw");
        if let Some(body) = body {
            req = req.with_json(&body);
        }
        let resp = router.dispatch(&req, store);
        (resp.status, resp.json_body().unwrap_or(Value::Null))
    }

    #[test]
    fn create_then_retrieve() {
        let (router, store) = setup();
        let (status, body) = send(&router, &store, Method::Post, "/api/departments/", Some(json!({"title": "dept-A"})));
        assert_eq!(status, 201);
        assert_eq!(body, json!({"id": 2, "title": "dept-A"}));
        let (status, body) = send(&router, &store, Method::Get, "/api/departments/2", None);
        assert_eq!((status, body), (200, json!({"id": 2, "title": "dept-A"})));
    }

    #[test]
    fn create_conflict_and_bad_request() {
        let (router, store) = setup();
        let (status, _) = send(&router, &store, Method::Post, "/api/departments/", Some(json!({"title": "department-1"})));
        assert_eq!(status, 409);
        let (status, body) = send(&router, &store, Method::Post, "/api/departments/", Some(json!({"title": ""})));
        assert_eq!(status, 400);
        assert!(body["errors"].as_array().is_some_and(|e| !e.is_empty()));
        assert_eq!(store.count("department"), 1);
    }

    #[test]
    fn malformed_and_missing_body_are_400() {
        let (router, store) = setup();
        let req = Request {
            body: Some(b"{not json".to_vec()),
            ..Request::new(Method::Post, "/api/departments/").with_header("authorization", "Bearer rw")
        };
        assert_eq!(router.dispatch(&req, &store).status, 400);
        let (status, _) = send(&router, &store, Method::Post, "/api/departments/", None);
        assert_eq!(status, 400);
    }

    #[test]
    fn auth_precedes_lookup() {
        let (router, store) = setup();
        let req = Request::new(Method::Get, "/api/departments/999");
        assert_eq!(router.dispatch(&req, &store).status, 401);
        let req = Request::new(Method::Delete, "/api/departments/999")
            .with_header("authorization", "Bearer ro");
        assert_eq!(router.dispatch(&req, &store).status, 403);
    }

    #[test]
    fn lookup_precedes_validation() {
        let (router, store) = setup();
        let (status, _) = send(&router, &store, Method::Put, "/api/departments/999", Some(json!({"title": ""})));
        assert_eq!(status, 404);
        let (status, _) = send(&router, &store, Method::Get, "/api/departments/abc", None);
        assert_eq!(status, 404);
    }

    #[test]
    fn partial_update_keeps_other_fields() {
        let (router, store) = setup();
        let (status, body) = send(&router, &store, Method::Patch, "/api/departments/1", Some(json!({})));
        assert_eq!((status, body), (200, json!({"id": 1, "title": "department-1"})));
        let (status, _) = send(&router, &store, Method::Put, "/api/departments/1", Some(json!({})));
        assert_eq!(status, 400);
    }

    #[test]
    fn delete_returns_204_with_empty_body() {
        let (router, store) = setup();
        let req = Request::new(Method::Delete, "/api/departments/1").with_header("authorization", "Bearer rw");
        let resp = router.dispatch(&req, &store);
        assert_eq!(resp.status, 204);
        assert!(resp.body.is_empty());
        assert_eq!(store.fetch_by_id("department", 1).unwrap(), None);
    }

    #[test]
    fn detail_scoped_children() {
        let (router, store) = setup();
        store.seed("employee", json!({"name": "other", "department_id": 99})).unwrap();
        let (status, body) = send(&router, &store, Method::Post, "/api/departments/1/employees/", Some(json!({"name": "ann"})));
        assert_eq!(status, 201);
        assert_eq!(body, json!({"name": "ann"}));
        let persisted = store.fetch_by_id("employee", 2).unwrap().unwrap();
        assert_eq!(persisted["department_id"], json!(1));
        let (status, body) = send(&router, &store, Method::Get, "/api/departments/1/employees/", None);
        assert_eq!(status, 200);
        assert_eq!(body, json!([{"id": 2, "name": "ann", "department_id": 1}]));
        let (status, _) = send(&router, &store, Method::Get, "/api/departments/7/employees/", None);
        assert_eq!(status, 404);
    }
}
