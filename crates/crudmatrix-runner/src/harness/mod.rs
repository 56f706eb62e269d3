//! Scenario execution engine
//!
//! A [`TestSuite`] holds endpoint declarations and a setup function. Every
//! scenario gets a fresh [`ScenarioEnv`] from setup, is resolved against its
//! fixture, dispatched through its transport, classified by status, verified
//! by the endpoint adapter and finally handed to the author's hooks.
//!
//! Configuration problems (setup, resolution, path templates, transport) end
//! the scenario as an *error*; response divergence ends it as a *failure*.
//! Neither stops the remaining scenarios.

pub mod adapters;
pub mod dispatch;

use std::sync::Arc;
use std::time::Duration;

use crudmatrix_core::{
    Category, ComponentSet, ConfigError, Dimension, DimensionRule, EndpointKind, EndpointPlan,
    Fixture, FixtureMap, Headers, Mismatch, Outcome, PathParameters, Payloads, ResolutionError,
    ResolvedInputs, Scenario, ScenarioMatrix, ScenarioResult, ScenarioStatus, SuiteConfig,
    SuitePlan, SuiteReport,
};

use crate::router::RouteError;
use crate::schema::SchemaError;
use crate::store::{RecordSource, StoreError};
use crate::transport::{HttpClient, Transport, TransportError};
use crate::views::{ModelViewSet, ViewSetError};

pub use adapters::{EndpointAdapter, ModelBinding, SuccessContext, adapter_for};
pub use dispatch::{PathTemplateError, build_path, build_request, execute, resolve_inputs};

// ── Environment ──

/// Collaborators and fixture for one scenario.
pub struct ScenarioEnv<F = FixtureMap> {
    pub transport: Box<dyn Transport>,
    /// Read access to persisted state; `None` limits checks to response shape
    pub records: Option<Box<dyn RecordSource>>,
    pub fixture: F,
}

impl<F> ScenarioEnv<F> {
    pub fn new(transport: impl Transport + 'static, fixture: F) -> Self {
        Self {
            transport: Box::new(transport),
            records: None,
            fixture,
        }
    }

    #[must_use]
    pub fn with_records(mut self, records: impl RecordSource + 'static) -> Self {
        self.records = Some(Box::new(records));
        self
    }
}

type SetupFn<F> = Arc<dyn Fn() -> Result<ScenarioEnv<F>, SetupError> + Send + Sync>;

/// Setup could not build a scenario environment.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("store: {0}")]
    Store(#[from] StoreError),
    #[error("routes: {0}")]
    Route(#[from] RouteError),
    #[error("viewset: {0}")]
    ViewSet(#[from] ViewSetError),
    #[error("schema: {0}")]
    Schema(#[from] SchemaError),
    #[error("transport: {0}")]
    Transport(#[from] TransportError),
    #[error("{0}")]
    Message(String),
}

// ── Hooks ──

/// What a success or failure hook sees.
pub struct HookContext<'a, F> {
    pub scenario: &'a str,
    pub dimension: Option<Dimension>,
    pub category: Category,
    pub inputs: &'a ResolvedInputs,
    pub outcome: &'a Outcome,
    pub fixture: &'a F,
    pub records: Option<&'a dyn RecordSource>,
}

pub type Hook<F> = Arc<dyn Fn(&HookContext<'_, F>) -> Result<(), Mismatch> + Send + Sync>;

// ── Endpoint declarations ──

/// One endpoint and its declared component sets.
pub struct EndpointTest<F = FixtureMap> {
    name: String,
    kind: EndpointKind,
    path: String,
    path_parameters: Option<ComponentSet<F>>,
    headers: Option<ComponentSet<F>>,
    payloads: Option<ComponentSet<F>>,
    binding: Option<ModelBinding>,
    on_success: Option<Hook<F>>,
    on_failure: Option<Hook<F>>,
}

impl<F> EndpointTest<F> {
    pub fn new(name: impl Into<String>, kind: EndpointKind, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            path: path.into(),
            path_parameters: None,
            headers: None,
            payloads: None,
            binding: None,
            on_success: None,
            on_failure: None,
        }
    }

    /// Test a view of a viewset, verifying against the view's model and output schema.
    ///
    /// # Errors
    ///
    /// Returns [`SuiteError::UnknownView`] if the viewset has no such view.
    pub fn for_view(
        name: impl Into<String>,
        viewset: &ModelViewSet,
        view: &str,
    ) -> Result<Self, SuiteError> {
        let resolved = viewset.view(view).ok_or_else(|| SuiteError::UnknownView {
            model: viewset.model().to_string(),
            view: view.to_string(),
        })?;
        let mut binding = ModelBinding::new(&resolved.model);
        binding.input_schema = resolved.input_schema.clone();
        binding.output_schema = resolved.output_schema.clone();
        if let Some(scope) = &resolved.scope {
            binding = binding.scoped_by(&scope.scope_field, "id");
        }
        Ok(Self::new(name, resolved.kind, &resolved.path).with_binding(binding))
    }

    #[must_use]
    pub fn path_parameters(mut self, set: PathParameters<F>) -> Self {
        self.path_parameters = Some(set.into());
        self
    }

    #[must_use]
    pub fn headers(mut self, set: Headers<F>) -> Self {
        self.headers = Some(set.into());
        self
    }

    #[must_use]
    pub fn payloads(mut self, set: Payloads<F>) -> Self {
        self.payloads = Some(set.into());
        self
    }

    /// Attach a set to the slot of its own dimension.
    #[must_use]
    pub fn with_component_set(mut self, set: ComponentSet<F>) -> Self {
        match set.dimension() {
            Dimension::PathParameters => self.path_parameters = Some(set),
            Dimension::Headers => self.headers = Some(set),
            Dimension::Payloads => self.payloads = Some(set),
        }
        self
    }

    #[must_use]
    pub fn with_binding(mut self, binding: ModelBinding) -> Self {
        self.binding = Some(binding);
        self
    }

    /// Expect list bodies sorted by `field` (`-field` for descending).
    /// Only affects endpoints with a model binding.
    #[must_use]
    pub fn ordered_by(mut self, field: impl Into<String>) -> Self {
        self.binding = self.binding.map(|b| b.ordered_by(field));
        self
    }

    /// Extra assertions after a passing `ok` scenario.
    #[must_use]
    pub fn on_success(
        mut self,
        hook: impl Fn(&HookContext<'_, F>) -> Result<(), Mismatch> + Send + Sync + 'static,
    ) -> Self {
        self.on_success = Some(Arc::new(hook));
        self
    }

    /// Extra assertions after a non-`ok` scenario returned its expected status.
    #[must_use]
    pub fn on_failure(
        mut self,
        hook: impl Fn(&HookContext<'_, F>) -> Result<(), Mismatch> + Send + Sync + 'static,
    ) -> Self {
        self.on_failure = Some(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> EndpointKind {
        self.kind
    }

    fn slot(&self, dimension: Dimension) -> Option<&ComponentSet<F>> {
        match dimension {
            Dimension::PathParameters => self.path_parameters.as_ref(),
            Dimension::Headers => self.headers.as_ref(),
            Dimension::Payloads => self.payloads.as_ref(),
        }
    }

    #[must_use]
    pub fn matrix(&self) -> ScenarioMatrix<'_, F> {
        Dimension::ALL
            .into_iter()
            .fold(ScenarioMatrix::new(&self.name), |m, d| m.with(self.slot(d)))
    }

    fn validate(&self) -> Result<(), SuiteError> {
        if self.name.trim().is_empty() {
            return Err(SuiteError::EmptyName);
        }
        for dimension in Dimension::ALL {
            let declared = self.slot(dimension).is_some();
            match self.kind.dimension_rule(dimension) {
                DimensionRule::Required if !declared => {
                    return Err(SuiteError::MissingDimension {
                        endpoint: self.name.clone(),
                        kind: self.kind,
                        dimension,
                    });
                }
                DimensionRule::NotApplicable if declared => {
                    return Err(SuiteError::NotApplicable {
                        endpoint: self.name.clone(),
                        kind: self.kind,
                        dimension,
                    });
                }
                _ => {}
            }
        }
        dispatch::placeholders(&self.path).map_err(|source| SuiteError::Template {
            endpoint: self.name.clone(),
            source,
        })?;
        Ok(())
    }
}

/// A suite declaration is invalid.
#[derive(Debug, thiserror::Error)]
pub enum SuiteError {
    #[error("endpoint name is empty")]
    EmptyName,
    #[error("endpoint '{0}' is declared more than once")]
    DuplicateEndpoint(String),
    #[error("{endpoint}: {kind} endpoints require {dimension}")]
    MissingDimension {
        endpoint: String,
        kind: EndpointKind,
        dimension: Dimension,
    },
    #[error("{endpoint}: {kind} endpoints do not take {dimension}")]
    NotApplicable {
        endpoint: String,
        kind: EndpointKind,
        dimension: Dimension,
    },
    #[error("{endpoint}: {source}")]
    Template {
        endpoint: String,
        source: PathTemplateError,
    },
    #[error("viewset '{model}' has no view '{view}'")]
    UnknownView { model: String, view: String },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// A scenario could not be run to a verdict.
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("setup failed: {0}")]
    Setup(#[from] SetupError),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error(transparent)]
    PathTemplate(#[from] PathTemplateError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("pre-dispatch snapshot failed: {0}")]
    Snapshot(#[from] StoreError),
}

// ── Suite ──

/// Endpoint declarations plus the per-scenario setup.
pub struct TestSuite<F = FixtureMap> {
    name: String,
    setup: SetupFn<F>,
    endpoints: Vec<EndpointTest<F>>,
}

impl<F: Fixture> TestSuite<F> {
    pub fn new(
        name: impl Into<String>,
        setup: impl Fn() -> Result<ScenarioEnv<F>, SetupError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            setup: Arc::new(setup),
            endpoints: Vec::new(),
        }
    }

    /// Add an endpoint, validating its declaration.
    ///
    /// # Errors
    ///
    /// Returns [`SuiteError`] for a duplicate or empty name, a missing required
    /// dimension, a dimension the kind does not take, or a malformed path.
    pub fn endpoint(mut self, test: EndpointTest<F>) -> Result<Self, SuiteError> {
        test.validate()?;
        if self.endpoints.iter().any(|e| e.name == test.name) {
            return Err(SuiteError::DuplicateEndpoint(test.name));
        }
        self.endpoints.push(test);
        Ok(self)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn endpoints(&self) -> impl Iterator<Item = &EndpointTest<F>> {
        self.endpoints.iter()
    }

    /// Every scenario name, in run order.
    #[must_use]
    pub fn scenario_names(&self) -> Vec<String> {
        self.endpoints.iter().flat_map(|e| e.matrix().names()).collect()
    }

    /// Scenario names and expected statuses, without sending anything.
    #[must_use]
    pub fn plan(&self) -> SuitePlan {
        let mut plan = SuitePlan::default();
        for endpoint in &self.endpoints {
            plan.push(EndpointPlan::from_matrix(
                endpoint.kind,
                endpoint.path.clone(),
                &endpoint.matrix(),
            ));
        }
        plan
    }

    /// Run every scenario.
    #[must_use]
    pub fn run(&self) -> SuiteReport {
        self.run_filtered(|_| true)
    }

    /// Run the scenarios whose name passes the filter.
    pub fn run_filtered(&self, filter: impl Fn(&str) -> bool) -> SuiteReport {
        let mut report = SuiteReport::new(&self.name);
        for endpoint in &self.endpoints {
            let matrix = endpoint.matrix();
            for scenario in matrix.iter() {
                let name = scenario.name();
                if !filter(&name) {
                    continue;
                }
                report.push(self.run_scenario(endpoint, &scenario, name));
            }
        }
        tracing::info!(
            suite = %self.name,
            total = report.total(),
            passed = report.passed(),
            failed = report.failed(),
            errored = report.errored(),
            "suite finished"
        );
        report
    }

    fn run_scenario(
        &self,
        endpoint: &EndpointTest<F>,
        scenario: &Scenario<'_, F>,
        name: String,
    ) -> ScenarioResult {
        let mut result = ScenarioResult {
            name,
            endpoint: endpoint.name.clone(),
            kind: endpoint.kind,
            dimension: scenario.dimension,
            category: scenario.category,
            expected_status: scenario
                .category
                .expected_status(endpoint.kind.success_status()),
            actual_status: None,
            status: ScenarioStatus::Pass,
            message: None,
            mismatch: None,
            inputs: None,
            request: None,
        };

        match self.attempt(endpoint, scenario, &mut result) {
            Ok(None) => {}
            Ok(Some(mismatch)) => {
                tracing::warn!(scenario = %result.name, %mismatch, "scenario failed");
                result.status = ScenarioStatus::Fail;
                result.message = Some(mismatch.to_string());
                result.mismatch = Some(mismatch);
            }
            Err(err) => {
                tracing::warn!(scenario = %result.name, error = %err, "scenario errored");
                result.status = ScenarioStatus::Error;
                result.message = Some(err.to_string());
            }
        }
        result
    }

    /// `Ok(Some(_))` is a failed assertion, `Err(_)` a scenario that never got a verdict.
    fn attempt(
        &self,
        endpoint: &EndpointTest<F>,
        scenario: &Scenario<'_, F>,
        result: &mut ScenarioResult,
    ) -> Result<Option<Mismatch>, ScenarioError> {
        let env = (self.setup)()?;
        let inputs = resolve_inputs(scenario, &env.fixture)?;
        result.inputs = Some(inputs.clone());
        let request = build_request(endpoint.kind, &endpoint.path, &inputs)?;
        result.request = Some(request.snapshot());

        let adapter = adapter_for(endpoint.kind);
        let success = adapter.expected_success_status();
        let records = env.records.as_deref();
        let snapshot = match (scenario.is_ok(), &endpoint.binding, records) {
            (true, Some(binding), Some(records)) => adapter.snapshot(binding, records, &inputs)?,
            _ => None,
        };

        let outcome = execute(env.transport.as_ref(), &request, success)?;
        result.actual_status = Some(outcome.status);
        if let Err(mismatch) = outcome.check_status(scenario.category, success) {
            return Ok(Some(mismatch));
        }

        if scenario.is_ok() {
            let ctx = SuccessContext {
                outcome: &outcome,
                inputs: &inputs,
                binding: endpoint.binding.as_ref(),
                records,
                snapshot: snapshot.as_ref(),
            };
            if let Err(mismatch) = adapter.verify_success(&ctx) {
                return Ok(Some(mismatch));
            }
        }

        let hook = if scenario.is_ok() {
            endpoint.on_success.as_ref()
        } else {
            endpoint.on_failure.as_ref()
        };
        if let Some(hook) = hook {
            let ctx = HookContext {
                scenario: &result.name,
                dimension: scenario.dimension,
                category: scenario.category,
                inputs: &inputs,
                outcome: &outcome,
                fixture: &env.fixture,
                records,
            };
            if let Err(mismatch) = hook(&ctx) {
                return Ok(Some(mismatch));
            }
        }
        Ok(None)
    }
}

impl TestSuite<FixtureMap> {
    /// Build an HTTP-mode suite from configuration. Success checks are
    /// limited to status and response shape.
    ///
    /// # Errors
    ///
    /// Returns [`SuiteError`] if the configuration or an endpoint is invalid.
    pub fn from_config(name: impl Into<String>, config: &SuiteConfig) -> Result<Self, SuiteError> {
        config.validate()?;
        let base_url = config.base_url.clone();
        let timeout = Duration::from_secs(config.timeout_secs);
        let fixture = config.fixture_map();

        let mut suite = Self::new(name, move || {
            let client = HttpClient::new(&base_url, timeout)?;
            Ok(ScenarioEnv::new(client, fixture.clone()))
        });

        for declared in &config.endpoints {
            let mut test = EndpointTest::new(&declared.name, declared.kind, &declared.path);
            for dimension in Dimension::ALL {
                if let Some(set) = declared.component_set(dimension)? {
                    test = test.with_component_set(set);
                }
            }
            suite = suite.endpoint(test)?;
        }
        Ok(suite)
    }
}
