//! Endpoint test adapters: success structure per endpoint kind
//!
//! Without a [`ModelBinding`] (HTTP mode, no store access) only the body shape
//! is checked. With one, the body is compared against freshly fetched,
//! re-serialized persisted state.

use std::cmp::Ordering;

use crudmatrix_core::{Dimension, EndpointKind, Mismatch, MismatchKind, Outcome, ResolvedInputs};
use serde_json::Value;

use crate::schema::Schema;
use crate::store::{Filter, Record, RecordSource, StoreError};

/// Where an endpoint's records live and how they are serialized.
#[derive(Debug, Clone)]
pub struct ModelBinding {
    pub model: String,
    pub input_schema: Option<Schema>,
    pub output_schema: Option<Schema>,
    /// Path parameter naming the record, for detail endpoints
    pub id_param: String,
    /// Detail-scoped collections: `(scope_field, path parameter holding the parent id)`
    pub scope: Option<(String, String)>,
    /// Declared list ordering, `field` or `-field` for descending.
    /// `None` compares list bodies order-insensitively.
    pub ordering: Option<String>,
}

impl ModelBinding {
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            input_schema: None,
            output_schema: None,
            id_param: "id".to_string(),
            scope: None,
            ordering: None,
        }
    }

    #[must_use]
    pub fn with_input_schema(mut self, schema: Schema) -> Self {
        self.input_schema = Some(schema);
        self
    }

    #[must_use]
    pub fn with_output_schema(mut self, schema: Schema) -> Self {
        self.output_schema = Some(schema);
        self
    }

    #[must_use]
    pub fn with_id_param(mut self, param: impl Into<String>) -> Self {
        self.id_param = param.into();
        self
    }

    #[must_use]
    pub fn scoped_by(mut self, field: impl Into<String>, param: impl Into<String>) -> Self {
        self.scope = Some((field.into(), param.into()));
        self
    }

    /// Expect list bodies in exactly this order (`-field` sorts descending).
    #[must_use]
    pub fn ordered_by(mut self, field: impl Into<String>) -> Self {
        self.ordering = Some(field.into());
        self
    }

    fn serialize(&self, record: &Record) -> Value {
        match &self.output_schema {
            Some(schema) => schema.serialize(record),
            None => Value::Object(record.clone()),
        }
    }

    /// Payload fields the endpoint would persist. `id` is never written.
    fn persisted_fields(&self, payload: &Value) -> Record {
        let Some(fields) = payload.as_object() else {
            return Record::new();
        };
        let declared = self
            .input_schema
            .as_ref()
            .map(Schema::properties)
            .filter(|p| !p.is_empty());
        fields
            .iter()
            .filter(|(k, _)| *k != "id" && declared.is_none_or(|p| p.contains(k)))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn record_id(&self, inputs: &ResolvedInputs) -> Option<u64> {
        id_from(inputs.path_parameters.get(&self.id_param)?)
    }

    fn parent_id(&self, inputs: &ResolvedInputs) -> Option<(String, u64)> {
        let (field, param) = self.scope.as_ref()?;
        Some((field.clone(), id_from(inputs.path_parameters.get(param)?)?))
    }

    fn fetch(&self, records: &dyn RecordSource, id: u64) -> Result<Option<Record>, Mismatch> {
        records.fetch_by_id(&self.model, id).map_err(store_mismatch)
    }
}

fn id_from(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn store_mismatch(err: StoreError) -> Mismatch {
    Mismatch::new(MismatchKind::Persistence, "readable store", err.to_string())
}

/// Everything a success check may look at.
pub struct SuccessContext<'a> {
    pub outcome: &'a Outcome,
    pub inputs: &'a ResolvedInputs,
    pub binding: Option<&'a ModelBinding>,
    pub records: Option<&'a dyn RecordSource>,
    /// State captured before dispatch, for updates
    pub snapshot: Option<&'a Record>,
}

impl SuccessContext<'_> {
    fn bound(&self) -> Option<(&ModelBinding, &dyn RecordSource)> {
        Some((self.binding?, self.records?))
    }
}

/// Kind-specific knowledge the harness needs to run and verify one endpoint.
pub trait EndpointAdapter: Send + Sync {
    fn kind(&self) -> EndpointKind;

    fn applicable_dimensions(&self) -> Vec<Dimension> {
        self.kind().applicable_dimensions()
    }

    fn expected_success_status(&self) -> u16 {
        self.kind().success_status()
    }

    /// Capture state before an `ok` request is dispatched.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store cannot be read.
    fn snapshot(
        &self,
        _binding: &ModelBinding,
        _records: &dyn RecordSource,
        _inputs: &ResolvedInputs,
    ) -> Result<Option<Record>, StoreError> {
        Ok(None)
    }

    /// Deep structural check of a successful response.
    ///
    /// # Errors
    ///
    /// Returns the first [`Mismatch`] found.
    fn verify_success(&self, ctx: &SuccessContext<'_>) -> Result<(), Mismatch>;
}

/// The adapter for an endpoint kind.
#[must_use]
pub fn adapter_for(kind: EndpointKind) -> Box<dyn EndpointAdapter> {
    match kind {
        EndpointKind::List => Box::new(ListAdapter),
        EndpointKind::Create => Box::new(CreateAdapter),
        EndpointKind::Retrieve => Box::new(RetrieveAdapter),
        EndpointKind::Update => Box::new(UpdateAdapter { partial: false }),
        EndpointKind::PartialUpdate => Box::new(UpdateAdapter { partial: true }),
        EndpointKind::Delete => Box::new(DeleteAdapter),
    }
}

fn json_object(outcome: &Outcome) -> Result<Value, Mismatch> {
    let body = outcome.json()?;
    if body.is_object() {
        Ok(body)
    } else {
        Err(Mismatch::new(MismatchKind::Shape, "JSON object", body.to_string()))
    }
}

fn missing_record(what: &str, id: impl std::fmt::Display) -> Mismatch {
    Mismatch::new(
        MismatchKind::Persistence,
        format!("{what} record {id}"),
        "no such record",
    )
}

// ── List ──

pub struct ListAdapter;

impl EndpointAdapter for ListAdapter {
    fn kind(&self) -> EndpointKind {
        EndpointKind::List
    }

    fn verify_success(&self, ctx: &SuccessContext<'_>) -> Result<(), Mismatch> {
        let body = ctx.outcome.json()?;
        let Value::Array(items) = body else {
            return Err(Mismatch::new(MismatchKind::Shape, "JSON array", body.to_string()));
        };
        let Some((binding, records)) = ctx.bound() else {
            return Ok(());
        };

        let filter = match binding.parent_id(ctx.inputs) {
            Some((field, parent)) => Filter::all().eq(field, parent),
            None => Filter::all(),
        };
        let mut persisted = records
            .query_all(&binding.model, &filter)
            .map_err(store_mismatch)?;

        let Some(ordering) = &binding.ordering else {
            let expected: Vec<Value> = persisted.iter().map(|r| binding.serialize(r)).collect();
            return same_elements(&expected, &items);
        };
        let (field, descending) = match ordering.strip_prefix('-') {
            Some(field) => (field, true),
            None => (ordering.as_str(), false),
        };
        persisted.sort_by(|a, b| {
            let order = compare_field(a.get(field), b.get(field));
            if descending { order.reverse() } else { order }
        });
        let expected: Vec<Value> = persisted.iter().map(|r| binding.serialize(r)).collect();
        Mismatch::ensure_eq(MismatchKind::Body, &Value::Array(expected), &Value::Array(items))
            .map_err(|m| m.with_detail(format!("list body not in '{ordering}' order")))
    }
}

/// Field order for list sorting: missing and null first, then numbers or
/// strings by value, anything else by its JSON text.
fn compare_field(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

/// Order-insensitive multiset comparison.
fn same_elements(expected: &[Value], actual: &[Value]) -> Result<(), Mismatch> {
    let mut remaining: Vec<&Value> = actual.iter().collect();
    let all_found = expected.iter().all(|want| {
        match remaining.iter().position(|got| *got == want) {
            Some(i) => {
                remaining.swap_remove(i);
                true
            }
            None => false,
        }
    });
    if all_found && remaining.is_empty() {
        return Ok(());
    }
    Err(Mismatch::new(
        MismatchKind::Body,
        Value::Array(expected.to_vec()).to_string(),
        Value::Array(actual.to_vec()).to_string(),
    )
    .with_detail("list body differs from persisted records (order-insensitive)"))
}

// ── Create ──

pub struct CreateAdapter;

impl EndpointAdapter for CreateAdapter {
    fn kind(&self) -> EndpointKind {
        EndpointKind::Create
    }

    fn verify_success(&self, ctx: &SuccessContext<'_>) -> Result<(), Mismatch> {
        let body = json_object(ctx.outcome)?;
        let Some((binding, records)) = ctx.bound() else {
            return Ok(());
        };

        let created = match body.get("id").and_then(id_from) {
            Some(id) => binding
                .fetch(records, id)?
                .ok_or_else(|| missing_record("created", id))?,
            // output schema without `id`: locate the record by its serialized form
            None => {
                let filter = match binding.parent_id(ctx.inputs) {
                    Some((field, parent)) => Filter::all().eq(field, parent),
                    None => Filter::all(),
                };
                records
                    .query_all(&binding.model, &filter)
                    .map_err(store_mismatch)?
                    .into_iter()
                    .rev()
                    .find(|r| binding.serialize(r) == body)
                    .ok_or_else(|| {
                        Mismatch::new(MismatchKind::Persistence, body.to_string(), "no matching record")
                    })?
            }
        };
        Mismatch::ensure_eq(MismatchKind::Body, &binding.serialize(&created), &body)?;

        if let Some(payload) = &ctx.inputs.payload {
            for (field, value) in binding.persisted_fields(payload) {
                let stored = created.get(&field).unwrap_or(&Value::Null);
                Mismatch::ensure_eq(MismatchKind::Persistence, &value, stored)
                    .map_err(|m| m.with_detail(format!("field '{field}'")))?;
            }
        }

        if let Some((field, parent)) = binding.parent_id(ctx.inputs) {
            Mismatch::ensure_eq(
                MismatchKind::Persistence,
                &Value::from(parent),
                created.get(&field).unwrap_or(&Value::Null),
            )
            .map_err(|m| m.with_detail(format!("scope field '{field}'")))?;
        }
        Ok(())
    }
}

// ── Retrieve ──

pub struct RetrieveAdapter;

impl EndpointAdapter for RetrieveAdapter {
    fn kind(&self) -> EndpointKind {
        EndpointKind::Retrieve
    }

    fn verify_success(&self, ctx: &SuccessContext<'_>) -> Result<(), Mismatch> {
        let body = json_object(ctx.outcome)?;
        let Some((binding, records)) = ctx.bound() else {
            return Ok(());
        };
        let id = binding
            .record_id(ctx.inputs)
            .ok_or_else(|| missing_id(binding))?;
        let record = binding
            .fetch(records, id)?
            .ok_or_else(|| missing_record("retrieved", id))?;
        Mismatch::ensure_eq(MismatchKind::Body, &binding.serialize(&record), &body)
    }
}

fn missing_id(binding: &ModelBinding) -> Mismatch {
    Mismatch::new(
        MismatchKind::Persistence,
        format!("numeric path parameter '{}'", binding.id_param),
        "none",
    )
}

// ── Update / PartialUpdate ──

pub struct UpdateAdapter {
    pub partial: bool,
}

impl EndpointAdapter for UpdateAdapter {
    fn kind(&self) -> EndpointKind {
        if self.partial {
            EndpointKind::PartialUpdate
        } else {
            EndpointKind::Update
        }
    }

    fn snapshot(
        &self,
        binding: &ModelBinding,
        records: &dyn RecordSource,
        inputs: &ResolvedInputs,
    ) -> Result<Option<Record>, StoreError> {
        match binding.record_id(inputs) {
            Some(id) => records.fetch_by_id(&binding.model, id),
            None => Ok(None),
        }
    }

    fn verify_success(&self, ctx: &SuccessContext<'_>) -> Result<(), Mismatch> {
        let body = json_object(ctx.outcome)?;
        let Some((binding, records)) = ctx.bound() else {
            return Ok(());
        };
        let id = binding
            .record_id(ctx.inputs)
            .ok_or_else(|| missing_id(binding))?;
        let updated = binding
            .fetch(records, id)?
            .ok_or_else(|| missing_record("updated", id))?;
        Mismatch::ensure_eq(MismatchKind::Body, &binding.serialize(&updated), &body)?;

        let before = ctx.snapshot.ok_or_else(|| missing_record("pre-update", id))?;
        let mut expected = before.clone();
        if let Some(payload) = &ctx.inputs.payload {
            expected.extend(binding.persisted_fields(payload));
        }
        Mismatch::ensure_eq(
            MismatchKind::Persistence,
            &binding.serialize(&expected),
            &binding.serialize(&updated),
        )
        .map_err(|m| m.with_detail("persisted record differs from snapshot merged with payload"))
    }
}

// ── Delete ──

pub struct DeleteAdapter;

impl EndpointAdapter for DeleteAdapter {
    fn kind(&self) -> EndpointKind {
        EndpointKind::Delete
    }

    fn verify_success(&self, ctx: &SuccessContext<'_>) -> Result<(), Mismatch> {
        if !ctx.outcome.body.is_empty() {
            return Err(Mismatch::new(MismatchKind::Shape, "empty body", ctx.outcome.body_text()));
        }
        let Some((binding, records)) = ctx.bound() else {
            return Ok(());
        };
        let id = binding
            .record_id(ctx.inputs)
            .ok_or_else(|| missing_id(binding))?;
        match binding.fetch(records, id)? {
            None => Ok(()),
            Some(record) => Err(Mismatch::new(
                MismatchKind::Persistence,
                format!("record {id} deleted"),
                Value::Object(record).to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, Store};
    use serde_json::json;

    fn inputs(path: Value, payload: Option<Value>) -> ResolvedInputs {
        ResolvedInputs {
            path_parameters: path.as_object().cloned().unwrap_or_default(),
            payload,
            ..ResolvedInputs::default()
        }
    }

    fn outcome(status: u16, body: &Value) -> Outcome {
        Outcome::new(status, serde_json::to_vec(body).unwrap(), status)
    }

    fn store() -> MemoryStore {
        let store = MemoryStore::new().with_model("department", &["title"]);
        store.seed("department", json!({"title": "a", "floor": 1})).unwrap();
        store.seed("department", json!({"title": "b", "floor": 2})).unwrap();
        store
    }

    fn ctx<'a>(
        outcome: &'a Outcome,
        inputs: &'a ResolvedInputs,
        binding: &'a ModelBinding,
        records: &'a dyn RecordSource,
        snapshot: Option<&'a Record>,
    ) -> SuccessContext<'a> {
        SuccessContext {
            outcome,
            inputs,
            binding: Some(binding),
            records: Some(records),
            snapshot,
        }
    }

    #[test]
    fn adapters_report_kind_defaults() {
        let delete = adapter_for(EndpointKind::Delete);
        assert_eq!(delete.expected_success_status(), 204);
        assert_eq!(delete.applicable_dimensions(), vec![Dimension::PathParameters, Dimension::Headers]);
        assert_eq!(adapter_for(EndpointKind::Create).expected_success_status(), 201);
        assert_eq!(adapter_for(EndpointKind::PartialUpdate).kind(), EndpointKind::PartialUpdate);
    }

    #[test]
    fn list_is_order_insensitive() {
        let store = store();
        let binding = ModelBinding::new("department");
        let o = outcome(200, &json!([
            {"id": 2, "title": "b", "floor": 2},
            {"id": 1, "title": "a", "floor": 1}
        ]));
        let i = inputs(json!({}), None);
        assert!(ListAdapter.verify_success(&ctx(&o, &i, &binding, &store, None)).is_ok());

        let o = outcome(200, &json!([{"id": 1, "title": "a", "floor": 1}]));
        let m = ListAdapter.verify_success(&ctx(&o, &i, &binding, &store, None)).unwrap_err();
        assert_eq!(m.kind, MismatchKind::Body);
    }

    #[test]
    fn declared_ordering_compares_exact_sequence() {
        let store = store();
        let i = inputs(json!({}), None);
        let a = json!({"id": 1, "title": "a", "floor": 1});
        let b = json!({"id": 2, "title": "b", "floor": 2});

        let by_title = ModelBinding::new("department").ordered_by("title");
        let o = outcome(200, &json!([a.clone(), b.clone()]));
        assert!(ListAdapter.verify_success(&ctx(&o, &i, &by_title, &store, None)).is_ok());
        let o = outcome(200, &json!([b, a]));
        let m = ListAdapter.verify_success(&ctx(&o, &i, &by_title, &store, None)).unwrap_err();
        assert_eq!(m.kind, MismatchKind::Body);
        assert_eq!(m.detail.as_deref(), Some("list body not in 'title' order"));

        let by_floor_desc = ModelBinding::new("department").ordered_by("-floor");
        assert!(ListAdapter.verify_success(&ctx(&o, &i, &by_floor_desc, &store, None)).is_ok());
    }

    #[test]
    fn compare_field_puts_missing_first() {
        assert_eq!(compare_field(None, Some(&json!(1))), Ordering::Less);
        assert_eq!(compare_field(Some(&json!(10)), Some(&json!(9))), Ordering::Greater);
        assert_eq!(compare_field(Some(&json!("a")), Some(&json!("b"))), Ordering::Less);
        assert_eq!(compare_field(Some(&Value::Null), None), Ordering::Equal);
    }

    #[test]
    fn list_without_binding_checks_shape_only() {
        let o = outcome(200, &json!({"results": []}));
        let i = inputs(json!({}), None);
        let c = SuccessContext { outcome: &o, inputs: &i, binding: None, records: None, snapshot: None };
        assert_eq!(ListAdapter.verify_success(&c).unwrap_err().kind, MismatchKind::Shape);
        let o = outcome(200, &json!([1, 2]));
        let c = SuccessContext { outcome: &o, ..c };
        assert!(ListAdapter.verify_success(&c).is_ok());
    }

    #[test]
    fn create_refetches_by_returned_id() {
        let store = store();
        let binding = ModelBinding::new("department");
        let i = inputs(json!({}), Some(json!({"title": "b"})));
        let o = outcome(201, &json!({"id": 2, "title": "b", "floor": 2}));
        assert!(CreateAdapter.verify_success(&ctx(&o, &i, &binding, &store, None)).is_ok());

        let o = outcome(201, &json!({"id": 9, "title": "b"}));
        let m = CreateAdapter.verify_success(&ctx(&o, &i, &binding, &store, None)).unwrap_err();
        assert_eq!(m.kind, MismatchKind::Persistence);
    }

    #[test]
    fn create_detects_payload_not_persisted() {
        let store = store();
        let binding = ModelBinding::new("department");
        let i = inputs(json!({}), Some(json!({"title": "z"})));
        let o = outcome(201, &json!({"id": 1, "title": "a", "floor": 1}));
        let m = CreateAdapter.verify_success(&ctx(&o, &i, &binding, &store, None)).unwrap_err();
        assert_eq!(m.kind, MismatchKind::Persistence);
        assert_eq!(m.detail.as_deref(), Some("field 'title'"));
    }

    #[test]
    fn create_detects_declared_field_dropped_by_endpoint() {
        let store = MemoryStore::new().with_model("department", &["title"]);
        // the endpoint stored only `title`
        store.seed("department", json!({"title": "x"})).unwrap();
        let input = Schema::object(
            "DepartmentIn",
            json!({"title": {"type": "string"}, "floor": {"type": "integer"}}),
            &["title"],
        )
        .unwrap();
        let binding = ModelBinding::new("department").with_input_schema(input);
        let i = inputs(json!({}), Some(json!({"title": "x", "floor": 4})));
        let o = outcome(201, &json!({"id": 1, "title": "x"}));

        let m = CreateAdapter.verify_success(&ctx(&o, &i, &binding, &store, None)).unwrap_err();
        assert_eq!(m.kind, MismatchKind::Persistence);
        assert_eq!(m.detail.as_deref(), Some("field 'floor'"));
    }

    #[test]
    fn partial_update_merges_snapshot_with_payload() {
        let store = store();
        let binding = ModelBinding::new("department");
        let before = store.fetch_by_id("department", 1).unwrap().unwrap();
        let i = inputs(json!({"id": 1}), Some(json!({"floor": 3})));
        let mut patch = Record::new();
        patch.insert("floor".into(), json!(3));
        store.update("department", 1, patch).unwrap();

        let o = outcome(200, &json!({"id": 1, "title": "a", "floor": 3}));
        let adapter = UpdateAdapter { partial: true };
        assert!(adapter.verify_success(&ctx(&o, &i, &binding, &store, Some(&before))).is_ok());

        // the endpoint dropped a field it should have kept
        let wrong = inputs(json!({"id": 1}), Some(json!({"floor": 3, "title": "q"})));
        let m = adapter
            .verify_success(&ctx(&o, &wrong, &binding, &store, Some(&before)))
            .unwrap_err();
        assert_eq!(m.kind, MismatchKind::Persistence);
    }

    #[test]
    fn update_snapshot_reads_record_before_dispatch() {
        let store = store();
        let binding = ModelBinding::new("department");
        let snap = UpdateAdapter { partial: false }
            .snapshot(&binding, &store, &inputs(json!({"id": "2"}), None))
            .unwrap()
            .unwrap();
        assert_eq!(snap["title"], json!("b"));
    }

    #[test]
    fn delete_requires_empty_body_and_gone_record() {
        let store = store();
        let binding = ModelBinding::new("department");
        let i = inputs(json!({"id": 1}), None);
        let o = Outcome::new(204, Vec::new(), 204);
        let m = DeleteAdapter.verify_success(&ctx(&o, &i, &binding, &store, None)).unwrap_err();
        assert_eq!(m.kind, MismatchKind::Persistence);

        store.delete("department", 1).unwrap();
        assert!(DeleteAdapter.verify_success(&ctx(&o, &i, &binding, &store, None)).is_ok());

        let o = Outcome::new(204, b"{}".to_vec(), 204);
        let m = DeleteAdapter.verify_success(&ctx(&o, &i, &binding, &store, None)).unwrap_err();
        assert_eq!(m.kind, MismatchKind::Shape);
    }
}
