//! Request component sets: per-dimension values keyed by expectation category
//!
//! Every set carries an `ok` value. Other categories are optional; a category
//! that is not declared is simply not tested.

use serde_json::Value;

use crate::category::{Category, Dimension};
use crate::resolve::{FixtureMap, ResolvableValue};

/// A request input resolved to JSON at execution time.
pub type RequestValue<F = FixtureMap> = ResolvableValue<Value, F>;

/// Values for one dimension, keyed by category. Non-`ok` categories keep
/// their declaration order.
pub struct ComponentSet<F = FixtureMap> {
    dimension: Dimension,
    ok: RequestValue<F>,
    others: Vec<(Category, RequestValue<F>)>,
}

impl<F> Clone for ComponentSet<F> {
    fn clone(&self) -> Self {
        Self {
            dimension: self.dimension,
            ok: self.ok.clone(),
            others: self.others.clone(),
        }
    }
}

impl<F> std::fmt::Debug for ComponentSet<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentSet")
            .field("dimension", &self.dimension)
            .field("ok", &self.ok)
            .field("others", &self.others)
            .finish()
    }
}

impl<F> ComponentSet<F> {
    pub fn new(dimension: Dimension, ok: impl Into<RequestValue<F>>) -> Self {
        Self {
            dimension,
            ok: ok.into(),
            others: Vec::new(),
        }
    }

    /// Declare a non-`ok` category.
    ///
    /// # Errors
    ///
    /// Fails if the category is `ok`, is not valid for this dimension, or was
    /// already declared.
    pub fn try_with(
        mut self,
        category: Category,
        value: impl Into<RequestValue<F>>,
    ) -> Result<Self, ComponentError> {
        if category == Category::Ok {
            return Err(ComponentError::DuplicateCategory {
                dimension: self.dimension,
                category,
            });
        }
        if !self.dimension.accepts(category) {
            return Err(ComponentError::UnsupportedCategory {
                dimension: self.dimension,
                category,
            });
        }
        if self.get(category).is_some() {
            return Err(ComponentError::DuplicateCategory {
                dimension: self.dimension,
                category,
            });
        }
        self.others.push((category, value.into()));
        Ok(self)
    }

    /// Insert or replace a category already known to be valid for the dimension.
    fn set(mut self, category: Category, value: RequestValue<F>) -> Self {
        debug_assert!(self.dimension.accepts(category) && category != Category::Ok);
        if let Some(slot) = self.others.iter_mut().find(|(c, _)| *c == category) {
            slot.1 = value;
        } else {
            self.others.push((category, value));
        }
        self
    }

    #[must_use]
    pub fn dimension(&self) -> Dimension {
        self.dimension
    }

    #[must_use]
    pub fn ok(&self) -> &RequestValue<F> {
        &self.ok
    }

    #[must_use]
    pub fn get(&self, category: Category) -> Option<&RequestValue<F>> {
        if category == Category::Ok {
            return Some(&self.ok);
        }
        self.others
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, v)| v)
    }

    /// Declared non-`ok` categories in declaration order.
    pub fn failure_categories(&self) -> impl Iterator<Item = (Category, &RequestValue<F>)> {
        self.others.iter().map(|(c, v)| (*c, v))
    }

    /// All declared categories, `ok` first.
    #[must_use]
    pub fn categories(&self) -> Vec<Category> {
        std::iter::once(Category::Ok)
            .chain(self.others.iter().map(|(c, _)| *c))
            .collect()
    }
}

/// Path parameter values: `ok` and optionally `not_found`.
#[derive(Debug)]
pub struct PathParameters<F = FixtureMap>(ComponentSet<F>);

impl<F> PathParameters<F> {
    pub fn new(ok: impl Into<RequestValue<F>>) -> Self {
        Self(ComponentSet::new(Dimension::PathParameters, ok))
    }

    #[must_use]
    pub fn not_found(self, value: impl Into<RequestValue<F>>) -> Self {
        Self(self.0.set(Category::NotFound, value.into()))
    }
}

/// Header values: `ok` and optionally `unauthorized` / `forbidden`.
#[derive(Debug)]
pub struct Headers<F = FixtureMap>(ComponentSet<F>);

impl<F> Headers<F> {
    pub fn new(ok: impl Into<RequestValue<F>>) -> Self {
        Self(ComponentSet::new(Dimension::Headers, ok))
    }

    #[must_use]
    pub fn unauthorized(self, value: impl Into<RequestValue<F>>) -> Self {
        Self(self.0.set(Category::Unauthorized, value.into()))
    }

    #[must_use]
    pub fn forbidden(self, value: impl Into<RequestValue<F>>) -> Self {
        Self(self.0.set(Category::Forbidden, value.into()))
    }
}

/// Payload values: `ok` and optionally `bad_request` / `conflict`.
#[derive(Debug)]
pub struct Payloads<F = FixtureMap>(ComponentSet<F>);

impl<F> Payloads<F> {
    pub fn new(ok: impl Into<RequestValue<F>>) -> Self {
        Self(ComponentSet::new(Dimension::Payloads, ok))
    }

    #[must_use]
    pub fn bad_request(self, value: impl Into<RequestValue<F>>) -> Self {
        Self(self.0.set(Category::BadRequest, value.into()))
    }

    #[must_use]
    pub fn conflict(self, value: impl Into<RequestValue<F>>) -> Self {
        Self(self.0.set(Category::Conflict, value.into()))
    }
}

macro_rules! into_component_set {
    ($($ty:ident),*) => {
        $(
            impl<F> From<$ty<F>> for ComponentSet<F> {
                fn from(value: $ty<F>) -> Self {
                    value.0
                }
            }
        )*
    };
}

into_component_set!(PathParameters, Headers, Payloads);

/// Invalid component set declaration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ComponentError {
    #[error("{dimension} cannot declare category '{category}'")]
    UnsupportedCategory {
        dimension: Dimension,
        category: Category,
    },
    #[error("{dimension} declares category '{category}' more than once")]
    DuplicateCategory {
        dimension: Dimension,
        category: Category,
    },
}
