//! Request transports: in-process router dispatch and blocking HTTP

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::http::{Method, Request, Response};
use crate::router::Router;
use crate::store::Store;

/// Sends one request and returns the captured response.
pub trait Transport: Send + Sync {
    /// # Errors
    ///
    /// Returns [`TransportError`] if no response could be obtained.
    fn send(&self, request: &Request) -> Result<Response, TransportError>;
}

/// Dispatches straight into a [`Router`] over a store. Never fails.
#[derive(Clone)]
pub struct InProcessClient {
    router: Arc<Router>,
    store: Arc<dyn Store>,
}

impl InProcessClient {
    pub fn new(router: Arc<Router>, store: impl Store + 'static) -> Self {
        Self {
            router,
            store: Arc::new(store),
        }
    }
}

impl Transport for InProcessClient {
    fn send(&self, request: &Request) -> Result<Response, TransportError> {
        Ok(self.router.dispatch(request, self.store.as_ref()))
    }
}

/// Blocking HTTP client against a live server.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpClient {
    /// # Errors
    ///
    /// Returns [`TransportError::Build`] if the HTTP client cannot be created.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Build(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn method(method: Method) -> reqwest::Method {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

impl Transport for HttpClient {
    fn send(&self, request: &Request) -> Result<Response, TransportError> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut req = self.client.request(Self::method(request.method), &url);
        for (name, value) in &request.headers {
            if reqwest::header::HeaderValue::from_str(value).is_err() {
                return Err(TransportError::InvalidHeader(name.clone()));
            }
            req = req.header(name, value);
        }
        if let Some(body) = &request.body {
            req = req.body(body.clone());
        }

        let resp = req.send().map_err(|e| TransportError::Send {
            url: url.clone(),
            message: e.to_string(),
        })?;

        let status = resp.status().as_u16();
        let headers: BTreeMap<String, String> = resp
            .headers()
            .iter()
            .filter_map(|(k, v)| {
                v.to_str()
                    .ok()
                    .map(|v| (k.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = resp
            .bytes()
            .map_err(|e| TransportError::Send {
                url,
                message: e.to_string(),
            })?
            .to_vec();

        Ok(Response {
            status,
            headers,
            body,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP client error: {0}")]
    Build(String),
    #[error("request to {url} failed: {message}")]
    Send { url: String, message: String },
    #[error("header '{0}' has a value that cannot be sent")]
    InvalidHeader(String),
}
