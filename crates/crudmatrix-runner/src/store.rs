//! Persistence collaborator: record lookup for verification, mutation for endpoints
//!
//! [`MemoryStore`] is a cloneable handle; every clone sees the same tables.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value;

/// A persisted record. Always carries a numeric `id`.
pub type Record = serde_json::Map<String, Value>;

/// Equality filter over record fields. Empty matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    equals: Vec<(String, Value)>,
}

impl Filter {
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.equals.push((field.into(), value.into()));
        self
    }

    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        self.equals
            .iter()
            .all(|(field, value)| record.get(field) == Some(value))
    }
}

/// Read access used by the harness to compare responses with persisted state.
pub trait RecordSource: Send + Sync {
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownModel`] for an undeclared model.
    fn fetch_by_id(&self, model: &str, id: u64) -> Result<Option<Record>, StoreError>;

    /// Records matching the filter, in id order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownModel`] for an undeclared model.
    fn query_all(&self, model: &str, filter: &Filter) -> Result<Vec<Record>, StoreError>;
}

/// Mutations performed by endpoints.
pub trait Store: RecordSource {
    /// Insert a record and assign its id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UniqueViolation`] when a unique field collides.
    fn insert(&self, model: &str, fields: Record) -> Result<Record, StoreError>;

    /// Merge fields into an existing record. The id never changes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] or [`StoreError::UniqueViolation`].
    fn update(&self, model: &str, id: u64, fields: Record) -> Result<Record, StoreError>;

    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no record has this id.
    fn delete(&self, model: &str, id: u64) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("unknown model '{0}'")]
    UnknownModel(String),
    #[error("{model} with id {id} does not exist")]
    NotFound { model: String, id: u64 },
    #[error("{model}.{field} must be unique, '{value}' already exists")]
    UniqueViolation {
        model: String,
        field: String,
        value: String,
    },
}

#[derive(Debug, Default)]
struct Table {
    next_id: u64,
    unique: Vec<String>,
    rows: BTreeMap<u64, Record>,
}

impl Table {
    fn check_unique(&self, model: &str, id: Option<u64>, record: &Record) -> Result<(), StoreError> {
        for field in &self.unique {
            let Some(value) = record.get(field) else {
                continue;
            };
            let taken = self
                .rows
                .iter()
                .any(|(row_id, row)| Some(*row_id) != id && row.get(field) == Some(value));
            if taken {
                return Err(StoreError::UniqueViolation {
                    model: model.to_string(),
                    field: field.clone(),
                    value: match value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    },
                });
            }
        }
        Ok(())
    }
}

/// In-memory store with auto-increment ids and per-model unique fields.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<BTreeMap<String, Table>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a model and its unique fields. Redeclaring keeps existing rows.
    #[must_use]
    pub fn with_model(self, model: &str, unique: &[&str]) -> Self {
        self.write()
            .entry(model.to_string())
            .or_insert_with(|| Table {
                next_id: 1,
                ..Table::default()
            })
            .unique = unique.iter().map(|f| (*f).to_string()).collect();
        self
    }

    /// Insert from a JSON object literal, for fixtures.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] like [`Store::insert`]; non-object values insert an empty record.
    pub fn seed(&self, model: &str, fields: Value) -> Result<Record, StoreError> {
        let fields = match fields {
            Value::Object(map) => map,
            _ => Record::new(),
        };
        self.insert(model, fields)
    }

    #[must_use]
    pub fn count(&self, model: &str) -> usize {
        self.read().get(model).map_or(0, |t| t.rows.len())
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, Table>> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, Table>> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RecordSource for MemoryStore {
    fn fetch_by_id(&self, model: &str, id: u64) -> Result<Option<Record>, StoreError> {
        let tables = self.read();
        let table = tables
            .get(model)
            .ok_or_else(|| StoreError::UnknownModel(model.to_string()))?;
        Ok(table.rows.get(&id).cloned())
    }

    fn query_all(&self, model: &str, filter: &Filter) -> Result<Vec<Record>, StoreError> {
        let tables = self.read();
        let table = tables
            .get(model)
            .ok_or_else(|| StoreError::UnknownModel(model.to_string()))?;
        Ok(table
            .rows
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }
}

impl Store for MemoryStore {
    fn insert(&self, model: &str, mut fields: Record) -> Result<Record, StoreError> {
        let mut tables = self.write();
        let table = tables
            .get_mut(model)
            .ok_or_else(|| StoreError::UnknownModel(model.to_string()))?;
        fields.remove("id");
        table.check_unique(model, None, &fields)?;

        let id = table.next_id;
        table.next_id += 1;
        fields.insert("id".to_string(), Value::from(id));
        table.rows.insert(id, fields.clone());
        Ok(fields)
    }

    fn update(&self, model: &str, id: u64, fields: Record) -> Result<Record, StoreError> {
        let mut tables = self.write();
        let table = tables
            .get_mut(model)
            .ok_or_else(|| StoreError::UnknownModel(model.to_string()))?;
        let mut merged = table
            .rows
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                model: model.to_string(),
                id,
            })?;
        for (key, value) in fields {
            if key != "id" {
                merged.insert(key, value);
            }
        }
        table.check_unique(model, Some(id), &merged)?;
        table.rows.insert(id, merged.clone());
        Ok(merged)
    }

    fn delete(&self, model: &str, id: u64) -> Result<(), StoreError> {
        let mut tables = self.write();
        let table = tables
            .get_mut(model)
            .ok_or_else(|| StoreError::UnknownModel(model.to_string()))?;
        table
            .rows
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound {
                model: model.to_string(),
                id,
            })
    }
}
