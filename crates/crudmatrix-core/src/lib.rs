//! crudmatrix-core: Scenario model and reporting for CRUD endpoint matrices
//!
//! This crate provides the pure types: resolvable request values, component
//! sets per dimension, the scenario matrix, outcome classification, and the
//! reports and verdicts produced from running a suite.

pub mod category;
pub mod components;
pub mod config;
pub mod generator;
pub mod matrix;
pub mod outcome;
pub mod plan;
pub mod report;
pub mod resolve;
pub mod schema;

pub use category::{Category, Dimension, DimensionRule, EndpointKind, UnknownCategory};
pub use components::{ComponentError, ComponentSet, Headers, PathParameters, Payloads, RequestValue};
pub use config::{ConfigError, EndpointConfig, SuiteConfig};
pub use generator::to_http_file;
pub use matrix::{Scenario, ScenarioMatrix, scenario_name};
pub use outcome::{Mismatch, MismatchKind, Outcome, ResolvedInputs};
pub use plan::{EndpointPlan, PlannedScenario, SuitePlan, Validation, ValidationStatus};
pub use report::{
    RequestSnapshot, ScenarioResult, ScenarioStatus, SuiteReport, Verdict, VerdictStatus,
};
pub use resolve::{FactoryFn, Fixture, FixtureMap, ResolutionError, ResolvableValue};
