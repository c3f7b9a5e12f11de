//! Document store boundary for bloodbank.
//!
//! Components talk to persistence only through [`DocumentStore`]: insert,
//! exact-match lookup, listing, counting, and field-level updates with
//! optional upsert. [`SqliteStore`] is the bundled implementation.

pub mod migrations;
pub mod schema;
mod sqlite;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

pub use sqlite::SqliteStore;

/// A stored document: a JSON object keyed by field name.
pub type Document = Map<String, Value>;

/// Collection holding user accounts.
pub const USERS: &str = "users";
/// Collection holding donors.
pub const DONORS: &str = "donors";
/// Collection holding donation events.
pub const DONATIONS: &str = "donations";
/// Collection holding per-blood-group stock levels.
pub const INVENTORY: &str = "blood_inventory";

/// Comparison applied by a filter condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// Field equals the value.
    Eq,
    /// Field is greater than or equal to the value.
    Gte,
}

/// A single `field <op> value` condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// Top-level field name.
    pub field: String,
    /// Comparison to apply.
    pub op: Comparison,
    /// Value to compare against.
    pub value: Value,
}

/// Conjunction of conditions on top-level fields.
///
/// An empty filter matches every document in the collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    /// A filter matching every document.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Require `field == value`.
    #[must_use]
    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition {
            field: field.to_string(),
            op: Comparison::Eq,
            value: value.into(),
        });
        self
    }

    /// Require `field >= value`.
    #[must_use]
    pub fn gte(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition {
            field: field.to_string(),
            op: Comparison::Gte,
            value: value.into(),
        });
        self
    }

    /// The conditions in this filter.
    #[must_use]
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Fields fixed by equality, used to seed an upserted document.
    pub(crate) fn equalities(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.conditions
            .iter()
            .filter(|c| c.op == Comparison::Eq)
            .map(|c| (c.field.as_str(), &c.value))
    }
}

/// Field-level modifications applied by [`DocumentStore::update_one`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    set: Document,
    set_on_insert: Document,
    inc: Map<String, Value>,
}

impl Update {
    /// An update that changes nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `field` to `value`.
    #[must_use]
    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.set.insert(field.to_string(), value.into());
        self
    }

    /// Set every field of `document`, only when the update inserts.
    #[must_use]
    pub fn set_on_insert(mut self, document: Document) -> Self {
        self.set_on_insert.extend(document);
        self
    }

    /// Add `delta` to the integer `field`; a missing field counts as zero.
    #[must_use]
    pub fn inc(mut self, field: &str, delta: i64) -> Self {
        self.inc.insert(field.to_string(), Value::from(delta));
        self
    }

    /// Apply `set` and `inc` to an existing document.
    pub(crate) fn apply(&self, collection: &str, document: &mut Document) -> Result<()> {
        for (field, value) in &self.set {
            document.insert(field.clone(), value.clone());
        }
        for (field, delta) in &self.inc {
            let delta = delta.as_i64().unwrap_or_default();
            let current = match document.get(field) {
                None | Some(Value::Null) => 0,
                Some(value) => value.as_i64().ok_or_else(|| {
                    Error::invalid_document(
                        collection,
                        format!("cannot increment non-integer field `{field}`"),
                    )
                })?,
            };
            let next = current.checked_add(delta).ok_or_else(|| {
                Error::invalid_document(collection, format!("field `{field}` overflowed"))
            })?;
            document.insert(field.clone(), Value::from(next));
        }
        Ok(())
    }

    /// Build the document inserted by an upsert.
    pub(crate) fn upsert_document(&self, collection: &str, filter: &Filter) -> Result<Document> {
        let mut document = Document::new();
        for (field, value) in filter.equalities() {
            document.insert(field.to_string(), value.clone());
        }
        document.extend(self.set_on_insert.clone());
        self.apply(collection, &mut document)?;
        Ok(document)
    }
}

/// Result of [`DocumentStore::update_one`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateOutcome {
    /// Whether an existing document matched the filter.
    pub matched: bool,
    /// Whether a new document was inserted.
    pub upserted: bool,
    /// The document after the update, if one matched or was inserted.
    pub document: Option<Document>,
}

/// Document-oriented persistence used by every component.
///
/// Implementations must make `update_one` atomic: the match, the
/// modification and any upsert happen as one step.
pub trait DocumentStore {
    /// Insert a document, returning its store-assigned id.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn insert_one(&self, collection: &str, document: &Document) -> Result<i64>;

    /// Return the first document matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Document>>;

    /// Return every document matching `filter`, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn find_many(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>>;

    /// Count documents matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn count(&self, collection: &str, filter: &Filter) -> Result<u64>;

    /// Update the first document matching `filter`, inserting one if none
    /// matches and `upsert` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails or a field cannot be incremented.
    fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
        upsert: bool,
    ) -> Result<UpdateOutcome>;
}

/// Serialize a record into a document.
///
/// # Errors
///
/// Returns an error if the value does not serialize to a JSON object.
pub fn to_document<T: Serialize>(collection: &str, value: &T) -> Result<Document> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(Error::invalid_document(
            collection,
            format!("expected an object, got {other}"),
        )),
    }
}

/// Deserialize a document into a record.
///
/// # Errors
///
/// Returns an error if the document does not have the record's shape.
pub fn from_document<T: DeserializeOwned>(collection: &str, document: Document) -> Result<T> {
    serde_json::from_value(Value::Object(document))
        .map_err(|e| Error::invalid_document(collection, e.to_string()))
}
