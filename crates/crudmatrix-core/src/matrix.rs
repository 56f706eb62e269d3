//! Scenario matrix: one scenario per declared category
//!
//! The all-`ok` scenario comes first. Each declared non-`ok` category then
//! yields exactly one scenario that varies only its own dimension, in fixed
//! dimension order (path parameters → headers → payloads) and declaration
//! order within a dimension.

use crate::category::{Category, Dimension};
use crate::components::{ComponentSet, RequestValue};
use crate::resolve::FixtureMap;

/// One request configuration plus the category it is expected to fall in.
///
/// Borrowed from the matrix; cheap to create and discard.
pub struct Scenario<'a, F = FixtureMap> {
    pub endpoint: &'a str,
    /// Dimension being varied, `None` for the all-`ok` scenario
    pub dimension: Option<Dimension>,
    pub category: Category,
    pub path_parameters: Option<&'a RequestValue<F>>,
    pub headers: Option<&'a RequestValue<F>>,
    pub payload: Option<&'a RequestValue<F>>,
}

impl<F> Scenario<'_, F> {
    /// Test name: `<endpoint>__ok` or `<endpoint>__<dimension>_<category>`.
    #[must_use]
    pub fn name(&self) -> String {
        scenario_name(self.endpoint, self.dimension, self.category)
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.category == Category::Ok
    }
}

impl<F> Clone for Scenario<'_, F> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<F> Copy for Scenario<'_, F> {}

impl<F> std::fmt::Debug for Scenario<'_, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scenario")
            .field("name", &self.name())
            .field("path_parameters", &self.path_parameters)
            .field("headers", &self.headers)
            .field("payload", &self.payload)
            .finish()
    }
}

/// Build the test name for a scenario.
#[must_use]
pub fn scenario_name(endpoint: &str, dimension: Option<Dimension>, category: Category) -> String {
    match dimension {
        Some(d) => format!("{endpoint}__{d}_{category}"),
        None => format!("{endpoint}__ok"),
    }
}

/// Declared component sets of one endpoint.
pub struct ScenarioMatrix<'a, F = FixtureMap> {
    endpoint: &'a str,
    path_parameters: Option<&'a ComponentSet<F>>,
    headers: Option<&'a ComponentSet<F>>,
    payloads: Option<&'a ComponentSet<F>>,
}

impl<'a, F> ScenarioMatrix<'a, F> {
    #[must_use]
    pub fn new(endpoint: &'a str) -> Self {
        Self {
            endpoint,
            path_parameters: None,
            headers: None,
            payloads: None,
        }
    }

    /// Attach a component set to the slot of its dimension.
    #[must_use]
    pub fn with(mut self, set: Option<&'a ComponentSet<F>>) -> Self {
        if let Some(set) = set {
            match set.dimension() {
                Dimension::PathParameters => self.path_parameters = Some(set),
                Dimension::Headers => self.headers = Some(set),
                Dimension::Payloads => self.payloads = Some(set),
            }
        }
        self
    }

    #[must_use]
    pub fn endpoint(&self) -> &'a str {
        self.endpoint
    }

    fn slot(&self, dimension: Dimension) -> Option<&'a ComponentSet<F>> {
        match dimension {
            Dimension::PathParameters => self.path_parameters,
            Dimension::Headers => self.headers,
            Dimension::Payloads => self.payloads,
        }
    }

    fn base(&self, dimension: Option<Dimension>, category: Category) -> Scenario<'a, F> {
        Scenario {
            endpoint: self.endpoint,
            dimension,
            category,
            path_parameters: self.path_parameters.map(ComponentSet::ok),
            headers: self.headers.map(ComponentSet::ok),
            payload: self.payloads.map(ComponentSet::ok),
        }
    }

    /// Number of scenarios: one `ok` plus one per declared non-`ok` category.
    #[must_use]
    pub fn len(&self) -> usize {
        1 + Dimension::ALL
            .iter()
            .filter_map(|d| self.slot(*d))
            .map(|set| set.failure_categories().count())
            .sum::<usize>()
    }

    /// Never empty: the `ok` scenario always exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Enumerate scenarios lazily. Each call starts a fresh enumeration.
    pub fn iter(&self) -> impl Iterator<Item = Scenario<'a, F>> + '_ {
        let ok = std::iter::once(self.base(None, Category::Ok));
        let varied = Dimension::ALL.into_iter().flat_map(move |dimension| {
            self.slot(dimension)
                .into_iter()
                .flat_map(|set| set.failure_categories())
                .map(move |(category, value)| {
                    let mut scenario = self.base(Some(dimension), category);
                    match dimension {
                        Dimension::PathParameters => scenario.path_parameters = Some(value),
                        Dimension::Headers => scenario.headers = Some(value),
                        Dimension::Payloads => scenario.payload = Some(value),
                    }
                    scenario
                })
        });
        ok.chain(varied)
    }

    /// Scenario names in enumeration order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.iter().map(|s| s.name()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Headers, PathParameters, Payloads};
    use crate::resolve::ResolvableValue;
    use proptest::prelude::*;
    use serde_json::{Value, json};
    use std::collections::HashSet;

    fn literal(v: Option<&RequestValue>) -> Value {
        match v {
            Some(ResolvableValue::Literal(v)) => v.clone(),
            other => panic!("expected literal, got {other:?}"),
        }
    }

    #[test]
    fn ok_only_sets_yield_single_scenario() {
        let path: ComponentSet = PathParameters::new(json!({"id": 1})).into();
        let matrix = ScenarioMatrix::new("retrieve_department").with(Some(&path));
        assert_eq!(matrix.len(), 1);
        assert_eq!(matrix.names(), vec!["retrieve_department__ok"]);
    }

    #[test]
    fn each_failure_category_varies_one_dimension() {
        let path: ComponentSet = PathParameters::new(json!({"id": 1}))
            .not_found(json!({"id": 999}))
            .into();
        let payloads: ComponentSet = Payloads::new(json!({"title": "ok"}))
            .bad_request(json!({"title": ""}))
            .into();
        let matrix = ScenarioMatrix::new("update_department")
            .with(Some(&path))
            .with(Some(&payloads));

        let scenarios: Vec<_> = matrix.iter().collect();
        assert_eq!(scenarios.len(), 3);

        let not_found = &scenarios[1];
        assert_eq!(not_found.dimension, Some(Dimension::PathParameters));
        assert_eq!(literal(not_found.path_parameters), json!({"id": 999}));
        assert_eq!(literal(not_found.payload), json!({"title": "ok"}));

        let bad = &scenarios[2];
        assert_eq!(bad.category, Category::BadRequest);
        assert_eq!(literal(bad.path_parameters), json!({"id": 1}));
        assert_eq!(literal(bad.payload), json!({"title": ""}));
        assert!(bad.headers.is_none());
    }

    #[test]
    fn names_follow_dimension_order() {
        let payloads: ComponentSet = Payloads::new(json!({"title": "a"}))
            .conflict(json!({"title": "b"}))
            .bad_request(json!({}))
            .into();
        let headers: ComponentSet = Headers::new(json!({"authorization": "Bearer rw"}))
            .unauthorized(json!({}))
            .forbidden(json!({"authorization": "Bearer ro"}))
            .into();
        let path: ComponentSet = PathParameters::new(json!({"id": 1}))
            .not_found(json!({"id": 0}))
            .into();
        // attach in scrambled order; enumeration order is fixed
        let matrix = ScenarioMatrix::new("create_employee")
            .with(Some(&payloads))
            .with(Some(&headers))
            .with(Some(&path));

        insta::assert_snapshot!(matrix.names().join("\n"), @r"
        create_employee__ok
        create_employee__path_parameters_not_found
        create_employee__headers_unauthorized
        create_employee__headers_forbidden
        create_employee__payloads_conflict
        create_employee__payloads_bad_request
        ");
    }

    #[test]
    fn iteration_is_restartable() {
        let payloads: ComponentSet = Payloads::new(json!({"a": 1}))
            .bad_request(json!({"a": "x"}))
            .into();
        let matrix = ScenarioMatrix::new("create").with(Some(&payloads));
        assert_eq!(matrix.names(), matrix.names());
        assert_eq!(matrix.iter().count(), matrix.iter().count());
    }

    #[test]
    fn no_component_sets_still_has_ok() {
        let matrix: ScenarioMatrix<'_> = ScenarioMatrix::new("list_departments");
        let only = matrix.iter().next().unwrap();
        assert!(only.is_ok());
        assert!(only.path_parameters.is_none() && only.payload.is_none());
        assert_eq!(matrix.len(), 1);
    }

    fn arb_set(dimension: Dimension) -> impl Strategy<Value = ComponentSet> {
        let optional: Vec<Category> = dimension.categories()[1..].to_vec();
        proptest::sample::subsequence(optional.clone(), 0..=optional.len())
            .prop_shuffle()
            .prop_map(move |cats| {
                cats.into_iter().fold(
                    ComponentSet::new(dimension, json!({"ok": true})),
                    |set, c| set.try_with(c, json!({"c": c.as_str()})).unwrap(),
                )
            })
    }

    proptest! {
        #[test]
        fn count_is_one_plus_failure_categories(
            path in proptest::option::of(arb_set(Dimension::PathParameters)),
            headers in proptest::option::of(arb_set(Dimension::Headers)),
            payloads in proptest::option::of(arb_set(Dimension::Payloads)),
        ) {
            let matrix = ScenarioMatrix::new("ep")
                .with(path.as_ref())
                .with(headers.as_ref())
                .with(payloads.as_ref());

            let expected = 1 + [&path, &headers, &payloads]
                .iter()
                .filter_map(|s| s.as_ref())
                .map(|s| s.categories().len() - 1)
                .sum::<usize>();

            let names = matrix.names();
            prop_assert_eq!(names.len(), expected);
            prop_assert_eq!(matrix.len(), expected);
            let unique: HashSet<_> = names.iter().collect();
            prop_assert_eq!(unique.len(), names.len());
        }
    }
}
