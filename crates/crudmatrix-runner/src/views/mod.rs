//! Declarative model views and viewsets
//!
//! A [`ModelViewSet`] groups the views of one model under a base path. Each
//! view becomes one route; [`register_all`] registers every view of every
//! viewset explicitly.

mod handlers;

use std::collections::HashSet;

use crudmatrix_core::EndpointKind;

use crate::auth::TokenAuth;
use crate::http::Method;
use crate::router::{RouteError, Router};
use crate::schema::Schema;

/// Related collection under a parent record: `/{id}/<segment>/`.
///
/// Children are the records of `model` whose `scope_field` equals the parent id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailScope {
    pub segment: String,
    pub model: String,
    pub scope_field: String,
}

/// One endpoint of a viewset, before defaults are applied.
#[derive(Debug, Clone)]
pub struct ModelView {
    name: Option<String>,
    kind: EndpointKind,
    path: Option<String>,
    input_schema: Option<Schema>,
    output_schema: Option<Schema>,
    scope: Option<DetailScope>,
}

impl ModelView {
    fn of(kind: EndpointKind) -> Self {
        Self {
            name: None,
            kind,
            path: None,
            input_schema: None,
            output_schema: None,
            scope: None,
        }
    }

    #[must_use]
    pub fn list() -> Self {
        Self::of(EndpointKind::List)
    }

    #[must_use]
    pub fn create() -> Self {
        Self::of(EndpointKind::Create)
    }

    #[must_use]
    pub fn retrieve() -> Self {
        Self::of(EndpointKind::Retrieve)
    }

    #[must_use]
    pub fn update() -> Self {
        Self::of(EndpointKind::Update)
    }

    #[must_use]
    pub fn partial_update() -> Self {
        Self::of(EndpointKind::PartialUpdate)
    }

    #[must_use]
    pub fn delete() -> Self {
        Self::of(EndpointKind::Delete)
    }

    /// List the children of a parent record.
    #[must_use]
    pub fn detail_list(segment: &str, model: &str, scope_field: &str) -> Self {
        Self::of(EndpointKind::List).scoped(segment, model, scope_field)
    }

    /// Create a child of a parent record; `scope_field` is set to the parent id.
    #[must_use]
    pub fn detail_create(segment: &str, model: &str, scope_field: &str) -> Self {
        Self::of(EndpointKind::Create).scoped(segment, model, scope_field)
    }

    fn scoped(mut self, segment: &str, model: &str, scope_field: &str) -> Self {
        self.scope = Some(DetailScope {
            segment: segment.trim_matches('/').to_string(),
            model: model.to_string(),
            scope_field: scope_field.to_string(),
        });
        self
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Override the path relative to the viewset base path.
    #[must_use]
    pub fn at(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
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

    fn default_name(&self) -> String {
        match &self.scope {
            Some(scope) => format!("{}_{}", self.kind, scope.segment),
            None => self.kind.to_string(),
        }
    }

    fn default_path(&self) -> String {
        match (&self.scope, self.kind) {
            (Some(scope), _) => format!("/{{id}}/{}/", scope.segment),
            (None, EndpointKind::List | EndpointKind::Create) => "/".to_string(),
            (None, _) => "/{id}".to_string(),
        }
    }
}

/// A view with the viewset defaults applied.
#[derive(Debug, Clone)]
pub struct ResolvedView {
    pub name: String,
    pub kind: EndpointKind,
    pub method: Method,
    /// Full path template, base path included
    pub path: String,
    /// Model the view reads or writes (the child model for detail-scoped views)
    pub model: String,
    /// Model looked up by `{id}`: the viewset model
    pub parent_model: String,
    pub input_schema: Option<Schema>,
    pub output_schema: Option<Schema>,
    pub scope: Option<DetailScope>,
}

impl ResolvedView {
    /// Whether the view looks up a record by the `{id}` path parameter.
    #[must_use]
    pub fn is_detail(&self) -> bool {
        self.scope.is_some()
            || !matches!(self.kind, EndpointKind::List | EndpointKind::Create)
    }
}

/// Builder for [`ModelViewSet`]; validated by [`ModelViewSetBuilder::build`].
#[derive(Debug, Clone)]
pub struct ModelViewSetBuilder {
    model: String,
    base_path: String,
    input_schema: Option<Schema>,
    output_schema: Option<Schema>,
    auth: Option<TokenAuth>,
    views: Vec<ModelView>,
}

impl ModelViewSetBuilder {
    /// Default input schema for views that do not declare one.
    #[must_use]
    pub fn input_schema(mut self, schema: Schema) -> Self {
        self.input_schema = Some(schema);
        self
    }

    /// Default output schema for views that do not declare one.
    #[must_use]
    pub fn output_schema(mut self, schema: Schema) -> Self {
        self.output_schema = Some(schema);
        self
    }

    #[must_use]
    pub fn auth(mut self, auth: TokenAuth) -> Self {
        self.auth = Some(auth);
        self
    }

    #[must_use]
    pub fn view(mut self, view: ModelView) -> Self {
        self.views.push(view);
        self
    }

    /// Apply defaults and validate.
    ///
    /// # Errors
    ///
    /// Returns [`ViewSetError`] for an empty model name, duplicate view names,
    /// a mutating view without an input schema, or a detail view whose path
    /// has no `{id}` segment.
    pub fn build(self) -> Result<ModelViewSet, ViewSetError> {
        if self.model.trim().is_empty() {
            return Err(ViewSetError::EmptyModel);
        }
        let base = self.base_path.trim_end_matches('/').to_string();

        let mut seen = HashSet::new();
        let mut views = Vec::with_capacity(self.views.len());
        for view in self.views {
            let name = view.name.clone().unwrap_or_else(|| view.default_name());
            if !seen.insert(name.clone()) {
                return Err(ViewSetError::DuplicateView {
                    model: self.model.clone(),
                    view: name,
                });
            }

            let (model, default_input, default_output) = match &view.scope {
                Some(scope) => (scope.model.clone(), None, None),
                None => (
                    self.model.clone(),
                    self.input_schema.clone(),
                    self.output_schema.clone(),
                ),
            };
            let input_schema = view.input_schema.clone().or(default_input);
            let output_schema = view
                .output_schema
                .clone()
                .or(default_output)
                .or_else(|| input_schema.clone());

            let needs_input = matches!(
                view.kind,
                EndpointKind::Create | EndpointKind::Update | EndpointKind::PartialUpdate
            );
            if needs_input && input_schema.is_none() {
                return Err(ViewSetError::MissingInputSchema {
                    model: self.model.clone(),
                    view: name,
                });
            }

            let relative = view.path.clone().unwrap_or_else(|| view.default_path());
            let path = format!("{base}/{}", relative.trim_start_matches('/'));
            let is_detail = view.scope.is_some()
                || !matches!(view.kind, EndpointKind::List | EndpointKind::Create);
            if is_detail && !path.split('/').any(|segment| segment == "{id}") {
                return Err(ViewSetError::MissingIdParameter {
                    model: self.model.clone(),
                    view: name,
                    path,
                });
            }
            views.push(ResolvedView {
                name,
                kind: view.kind,
                method: Method::for_kind(view.kind),
                path,
                model,
                parent_model: self.model.clone(),
                input_schema,
                output_schema,
                scope: view.scope,
            });
        }

        Ok(ModelViewSet {
            model: self.model,
            base_path: base,
            auth: self.auth,
            views,
        })
    }
}

/// The validated views of one model.
#[derive(Debug, Clone)]
pub struct ModelViewSet {
    model: String,
    base_path: String,
    auth: Option<TokenAuth>,
    views: Vec<ResolvedView>,
}

impl ModelViewSet {
    #[must_use]
    pub fn builder(model: &str, base_path: &str) -> ModelViewSetBuilder {
        ModelViewSetBuilder {
            model: model.to_string(),
            base_path: base_path.to_string(),
            input_schema: None,
            output_schema: None,
            auth: None,
            views: Vec::new(),
        }
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[must_use]
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    #[must_use]
    pub fn view(&self, name: &str) -> Option<&ResolvedView> {
        self.views.iter().find(|v| v.name == name)
    }

    #[must_use]
    pub fn views(&self) -> &[ResolvedView] {
        &self.views
    }

    /// Register one route per view.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError`] if a route is malformed or already registered.
    pub fn register_routes(&self, router: &mut Router) -> Result<(), RouteError> {
        for view in &self.views {
            router.register_route(
                view.method,
                &view.path,
                handlers::handler(view.clone(), self.auth.clone()),
            )?;
        }
        Ok(())
    }
}

/// Register every view of every viewset.
///
/// # Errors
///
/// Returns the first [`RouteError`].
pub fn register_all(router: &mut Router, viewsets: &[&ModelViewSet]) -> Result<(), RouteError> {
    for viewset in viewsets {
        viewset.register_routes(router)?;
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ViewSetError {
    #[error("viewset model name is empty")]
    EmptyModel,
    #[error("{model}: view '{view}' is declared more than once")]
    DuplicateView { model: String, view: String },
    #[error("{model}: view '{view}' needs an input schema")]
    MissingInputSchema { model: String, view: String },
    #[error("{model}: view '{view}' looks up a record but '{path}' has no '{{id}}' segment")]
    MissingIdParameter {
        model: String,
        view: String,
        path: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn department_in() -> Schema {
        Schema::object("DepartmentIn", json!({"title": {"type": "string"}}), &["title"]).unwrap()
    }

    #[test]
    fn defaults_paths_and_names() {
        let vs = ModelViewSet::builder("department", "/api/departments/")
            .input_schema(department_in())
            .view(ModelView::list())
            .view(ModelView::retrieve())
            .view(ModelView::detail_list("employees", "employee", "department_id"))
            .build()
            .unwrap();

        let paths: Vec<(&str, &str)> = vs
            .views()
            .iter()
            .map(|v| (v.name.as_str(), v.path.as_str()))
            .collect();
        assert_eq!(
            paths,
            vec![
                ("list", "/api/departments/"),
                ("retrieve", "/api/departments/{id}"),
                ("list_employees", "/api/departments/{id}/employees/"),
            ]
        );
        let employees = vs.view("list_employees").unwrap();
        assert_eq!(employees.model, "employee");
        assert_eq!(employees.parent_model, "department");
        assert!(employees.is_detail());
        assert!(!vs.view("list").unwrap().is_detail());
        // detail-scoped views do not inherit the parent's schemas
        assert!(employees.output_schema.is_none());
        assert!(vs.view("retrieve").unwrap().output_schema.is_some());
    }

    #[test]
    fn mutating_view_requires_input_schema() {
        let err = ModelViewSet::builder("department", "/api/departments")
            .view(ModelView::create())
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            ViewSetError::MissingInputSchema {
                model: "department".into(),
                view: "create".into()
            }
        );
    }

    #[test]
    fn detail_view_path_must_name_id() {
        let err = ModelViewSet::builder("department", "/api/departments")
            .view(ModelView::retrieve().at("/{pk}"))
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            ViewSetError::MissingIdParameter {
                model: "department".into(),
                view: "retrieve".into(),
                path: "/api/departments/{pk}".into(),
            }
        );
        assert_eq!(
            err.to_string(),
            "department: view 'retrieve' looks up a record but '/api/departments/{pk}' has no '{id}' segment"
        );

        let ok = ModelViewSet::builder("department", "/api/departments")
            .view(ModelView::retrieve().at("/by-id/{id}"))
            .view(ModelView::list().at("/all"))
            .build()
            .unwrap();
        assert_eq!(ok.view("retrieve").unwrap().path, "/api/departments/by-id/{id}");
    }

    #[test]
    fn duplicate_view_names_rejected() {
        let err = ModelViewSet::builder("department", "/api/departments")
            .view(ModelView::list())
            .view(ModelView::retrieve().named("list"))
            .build()
            .unwrap_err();
        assert!(matches!(err, ViewSetError::DuplicateView { .. }));
        assert_eq!(
            ModelViewSet::builder(" ", "/x").build().unwrap_err(),
            ViewSetError::EmptyModel
        );
    }

    #[test]
    fn register_all_rejects_colliding_viewsets() {
        let a = ModelViewSet::builder("department", "/api/departments")
            .view(ModelView::list())
            .build()
            .unwrap();
        let b = ModelViewSet::builder("division", "/api/departments/")
            .view(ModelView::list())
            .build()
            .unwrap();
        let mut router = Router::new();
        assert!(matches!(
            register_all(&mut router, &[&a, &b]),
            Err(RouteError::Duplicate { .. })
        ));
        assert_eq!(router.routes().count(), 1);
    }
}
