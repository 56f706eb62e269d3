//! `crudmatrix demo`: a departments/employees API exercised in process
//!
//! Shows the whole pipeline without a server: viewsets registered on a router,
//! a fresh seeded store per scenario, and persisted-state verification.

use std::sync::Arc;

use anyhow::Result;
use serde_json::json;

use crudmatrix_core::{Fixture, FixtureMap, Headers, PathParameters, Payloads, ResolvableValue};
use crudmatrix_runner::{
    Access, EndpointTest, InProcessClient, MemoryStore, ModelView, ModelViewSet, Router,
    ScenarioEnv, Schema, SetupError, TestSuite, TokenAuth, register_all,
};

const READ_WRITE: &str = "Bearer demo-rw";
const READ_ONLY: &str = "Bearer demo-ro";

fn departments() -> Result<ModelViewSet> {
    let department_in = Schema::object(
        "DepartmentIn",
        json!({
            "title": {"type": "string", "minLength": 1, "maxLength": 64},
            "floor": {"type": "integer", "minimum": 0}
        }),
        &["title"],
    )?;
    let department_out = Schema::object(
        "DepartmentOut",
        json!({
            "id": {"type": "integer"},
            "title": {"type": "string"},
            "floor": {"type": "integer"}
        }),
        &[],
    )?;
    let employee_in = Schema::object(
        "EmployeeIn",
        json!({"name": {"type": "string", "minLength": 1}}),
        &["name"],
    )?;
    let employee_out = Schema::object(
        "EmployeeOut",
        json!({
            "id": {"type": "integer"},
            "name": {"type": "string"},
            "department_id": {"type": "integer"}
        }),
        &[],
    )?;

    let viewset = ModelViewSet::builder("department", "/api/departments")
        .input_schema(department_in)
        .output_schema(department_out)
        .auth(
            TokenAuth::new()
                .with_token("demo-rw", Access::ReadWrite)
                .with_token("demo-ro", Access::ReadOnly),
        )
        .view(ModelView::list())
        .view(ModelView::create())
        .view(ModelView::retrieve())
        .view(ModelView::update())
        .view(ModelView::partial_update())
        .view(ModelView::delete())
        .view(
            ModelView::detail_list("employees", "employee", "department_id")
                .with_output_schema(employee_out.clone()),
        )
        .view(
            ModelView::detail_create("employees", "employee", "department_id")
                .with_input_schema(employee_in)
                .with_output_schema(employee_out),
        )
        .build()?;
    Ok(viewset)
}

fn setup(viewset: &ModelViewSet) -> Result<ScenarioEnv, SetupError> {
    let store = MemoryStore::new()
        .with_model("department", &["title"])
        .with_model("employee", &[]);
    let first = store.seed("department", json!({"title": "department-1", "floor": 1}))?;
    let department_id = first.get("id").cloned().unwrap_or_default();
    store.seed("department", json!({"title": "department-2", "floor": 2}))?;
    store.seed("employee", json!({"name": "ann", "department_id": department_id}))?;

    let mut router = Router::new();
    register_all(&mut router, &[viewset])?;

    let fixture = FixtureMap::new()
        .with("department_id", department_id)
        .with_computed("department_path", |f| json!({ "id": f.property("department_id") }))
        .with("read_write", json!({ "authorization": READ_WRITE }))
        .with("read_only", json!({ "authorization": READ_ONLY }));

    let client = InProcessClient::new(Arc::new(router), store.clone());
    Ok(ScenarioEnv::new(client, fixture).with_records(store))
}

fn path() -> PathParameters {
    PathParameters::new(ResolvableValue::property("department_path")).not_found(json!({"id": 999_999}))
}

fn read_headers() -> Headers {
    Headers::new(ResolvableValue::property("read_write"))
        .unauthorized(json!({"authorization": "Bearer unknown"}))
}

fn write_headers() -> Headers {
    Headers::new(ResolvableValue::property("read_write"))
        .unauthorized(json!({}))
        .forbidden(ResolvableValue::property("read_only"))
}

/// The demo suite: every view of the departments viewset.
pub fn suite() -> Result<TestSuite> {
    let viewset = departments()?;
    let shared = viewset.clone();
    let view = |name: &str, view_name: &str| EndpointTest::for_view(name, &viewset, view_name);

    let suite = TestSuite::new("departments", move || setup(&shared))
        .endpoint(view("list_departments", "list")?.headers(read_headers()))?
        .endpoint(
            view("create_department", "create")?
                .headers(write_headers())
                .payloads(
                    Payloads::new(json!({"title": "dept-A", "floor": 3}))
                        .bad_request(json!({"title": ""}))
                        .conflict(json!({"title": "department-1"})),
                ),
        )?
        .endpoint(
            view("retrieve_department", "retrieve")?
                .path_parameters(path())
                .headers(read_headers()),
        )?
        .endpoint(
            view("update_department", "update")?
                .path_parameters(path())
                .headers(write_headers())
                .payloads(
                    Payloads::new(json!({"title": "renamed", "floor": 4}))
                        .bad_request(json!({"floor": -1, "title": "x"}))
                        .conflict(json!({"title": "department-2"})),
                ),
        )?
        .endpoint(
            view("partial_update_department", "partial_update")?
                .path_parameters(path())
                .headers(write_headers())
                .payloads(Payloads::new(json!({"floor": 5})).bad_request(json!({"title": ""}))),
        )?
        .endpoint(
            view("delete_department", "delete")?
                .path_parameters(path())
                .headers(write_headers()),
        )?
        .endpoint(
            view("list_employees", "list_employees")?
                .path_parameters(path())
                .headers(read_headers()),
        )?
        .endpoint(
            view("create_employee", "create_employees")?
                .path_parameters(path())
                .headers(write_headers())
                .payloads(Payloads::new(json!({"name": "bo"})).bad_request(json!({"name": ""}))),
        )?;
    Ok(suite)
}
