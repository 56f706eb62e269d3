//! Lazily resolved request inputs
//!
//! A [`ResolvableValue`] is a literal, a function of the fixture, or the name of
//! a fixture property. Nothing is resolved until a scenario runs, so values may
//! depend on records created during setup (e.g. their ids).

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Test-time state that property references are resolved against.
pub trait Fixture {
    /// Look up a named property. Computed properties are evaluated here.
    fn property(&self, name: &str) -> Option<Value>;
}

impl Fixture for Value {
    fn property(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl Fixture for () {
    fn property(&self, _name: &str) -> Option<Value> {
        None
    }
}

type ComputedFn = Arc<dyn Fn(&FixtureMap) -> Value + Send + Sync>;

#[derive(Clone)]
enum FixtureEntry {
    Value(Value),
    Computed(ComputedFn),
}

/// Fixture backed by named values, some of which may be computed on lookup.
#[derive(Clone, Default)]
pub struct FixtureMap {
    entries: BTreeMap<String, FixtureEntry>,
}

impl FixtureMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.entries
            .insert(name.into(), FixtureEntry::Value(value.into()));
        self
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Add a property evaluated against the map each time it is looked up.
    #[must_use]
    pub fn with_computed(
        mut self,
        name: impl Into<String>,
        f: impl Fn(&FixtureMap) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.entries
            .insert(name.into(), FixtureEntry::Computed(Arc::new(f)));
        self
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Fixture for FixtureMap {
    fn property(&self, name: &str) -> Option<Value> {
        match self.entries.get(name)? {
            FixtureEntry::Value(v) => Some(v.clone()),
            FixtureEntry::Computed(f) => Some(f(self)),
        }
    }
}

impl From<serde_json::Map<String, Value>> for FixtureMap {
    fn from(map: serde_json::Map<String, Value>) -> Self {
        Self {
            entries: map
                .into_iter()
                .map(|(k, v)| (k, FixtureEntry::Value(v)))
                .collect(),
        }
    }
}

impl fmt::Debug for FixtureMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (name, entry) in &self.entries {
            match entry {
                FixtureEntry::Value(v) => map.entry(name, v),
                FixtureEntry::Computed(_) => map.entry(name, &"<computed>"),
            };
        }
        map.finish()
    }
}

/// Function producing a value from the fixture.
pub type FactoryFn<T, F> = Arc<dyn Fn(&F) -> T + Send + Sync>;

/// A request input resolved against the fixture at execution time.
pub enum ResolvableValue<T, F = FixtureMap> {
    Literal(T),
    Factory(FactoryFn<T, F>),
    PropertyRef(String),
}

impl<T, F> ResolvableValue<T, F> {
    pub fn literal(value: T) -> Self {
        Self::Literal(value)
    }

    pub fn factory(f: impl Fn(&F) -> T + Send + Sync + 'static) -> Self {
        Self::Factory(Arc::new(f))
    }

    pub fn property(name: impl Into<String>) -> Self {
        Self::PropertyRef(name.into())
    }
}

impl<T, F> ResolvableValue<T, F>
where
    T: Clone + DeserializeOwned,
    F: Fixture,
{
    /// Resolve against the fixture. Never mutates the fixture.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError`] if a referenced property is missing or
    /// cannot be converted into `T`.
    pub fn resolve(&self, fixture: &F) -> Result<T, ResolutionError> {
        match self {
            Self::Literal(value) => Ok(value.clone()),
            Self::Factory(f) => Ok(f(fixture)),
            Self::PropertyRef(name) => {
                let value = fixture
                    .property(name)
                    .ok_or_else(|| ResolutionError::MissingProperty(name.clone()))?;
                serde_json::from_value(value).map_err(|e| ResolutionError::Conversion {
                    property: name.clone(),
                    message: e.to_string(),
                })
            }
        }
    }
}

impl<F> ResolvableValue<Value, F> {
    /// Interpret a configuration value: `{"$fixture": "name"}` is a property
    /// reference, anything else a literal.
    #[must_use]
    pub fn from_config(value: Value) -> Self {
        if let Value::Object(obj) = &value {
            if obj.len() == 1 {
                if let Some(Value::String(name)) = obj.get("$fixture") {
                    return Self::PropertyRef(name.clone());
                }
            }
        }
        Self::Literal(value)
    }
}

impl<T, F> From<T> for ResolvableValue<T, F> {
    fn from(value: T) -> Self {
        Self::Literal(value)
    }
}

impl<T: Clone, F> Clone for ResolvableValue<T, F> {
    fn clone(&self) -> Self {
        match self {
            Self::Literal(v) => Self::Literal(v.clone()),
            Self::Factory(f) => Self::Factory(Arc::clone(f)),
            Self::PropertyRef(name) => Self::PropertyRef(name.clone()),
        }
    }
}

impl<T: fmt::Debug, F> fmt::Debug for ResolvableValue<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(v) => f.debug_tuple("Literal").field(v).finish(),
            Self::Factory(_) => f.write_str("Factory(..)"),
            Self::PropertyRef(name) => f.debug_tuple("PropertyRef").field(name).finish(),
        }
    }
}

/// A value could not be resolved against the fixture.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    #[error("fixture has no property '{0}'")]
    MissingProperty(String),
    #[error("fixture property '{property}' has the wrong type: {message}")]
    Conversion { property: String, message: String },
    #[error("{dimension} must resolve to {expected}, got {actual}")]
    Shape {
        dimension: String,
        expected: &'static str,
        actual: String,
    },
}
