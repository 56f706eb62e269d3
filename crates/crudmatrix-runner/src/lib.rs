//! crudmatrix-runner: CRUD scaffolding and the scenario execution engine
//!
//! The scaffolding modules (`http`, `router`, `schema`, `store`, `auth`,
//! `views`) are small in-process collaborators for declaring resource
//! endpoints. The `harness` drives scenario matrices against them, or against
//! a live server through [`HttpClient`].

pub mod auth;
pub mod harness;
pub mod http;
pub mod router;
pub mod schema;
pub mod store;
pub mod transport;
pub mod views;

pub use auth::{Access, Denied, TokenAuth};
pub use harness::{
    EndpointTest, HookContext, ModelBinding, PathTemplateError, ScenarioEnv, ScenarioError,
    SetupError, SuiteError, TestSuite,
};
pub use http::{Method, Request, Response};
pub use router::{RouteContext, RouteError, Router};
pub use schema::{Schema, SchemaError, ValidationError};
pub use store::{Filter, MemoryStore, Record, RecordSource, Store, StoreError};
pub use transport::{HttpClient, InProcessClient, Transport, TransportError};
pub use views::{ModelView, ModelViewSet, ViewSetError, register_all};
