//! `SQLite`-backed document store.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::types::Value as SqlValue;
use rusqlite::ErrorCode;
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Transaction, TransactionBehavior,
};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{migrations, Comparison, Document, DocumentStore, Filter, Update, UpdateOutcome};
use crate::error::{Error, Result};

/// Document store persisted in a single `SQLite` database file.
///
/// Each document is a row in the `documents` table holding its collection
/// name and JSON body. Updates run inside `IMMEDIATE` transactions so a
/// read-modify-write is atomic across every process sharing the file.
#[derive(Debug)]
pub struct SqliteStore {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl SqliteStore {
    /// Open or create a store at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreUnavailable`] if the database cannot be opened,
    /// or a migration error if the schema cannot be brought up to date.
    pub fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening document store at {}", path.display());
        let unavailable = |source: rusqlite::Error| Error::StoreUnavailable {
            path: path.clone(),
            source,
        };
        let conn = Connection::open(&path).map_err(unavailable)?;
        conn.busy_timeout(busy_timeout).map_err(unavailable)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(unavailable)?;

        migrations::initialize_schema(&conn)?;

        info!("Document store opened at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let path = PathBuf::from(":memory:");
        let conn = Connection::open_in_memory().map_err(|source| Error::StoreUnavailable {
            path: path.clone(),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self { path, conn })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Report a lost connection as [`Error::StoreUnavailable`].
    ///
    /// Busy or locked databases (after the busy timeout), I/O failures and
    /// files that can no longer be opened mean the store is down. Other
    /// `SQLite` errors stay [`Error::Store`].
    fn surface(&self, err: Error) -> Error {
        match err {
            Error::Store(source) if is_unreachable(&source) => {
                warn!("Document store at {} unreachable: {}", self.path.display(), source);
                Error::StoreUnavailable {
                    path: self.path.clone(),
                    source,
                }
            }
            other => other,
        }
    }

    /// Build the `WHERE` clause and its parameters for a filter.
    fn where_clause(collection: &str, filter: &Filter) -> Result<(String, Vec<SqlValue>)> {
        let mut clause = String::from("collection = ?");
        let mut values = vec![SqlValue::Text(collection.to_string())];

        for condition in filter.conditions() {
            if !is_field_name(&condition.field) {
                return Err(Error::invalid_document(
                    collection,
                    format!("invalid field name in filter: '{}'", condition.field),
                ));
            }
            let op = match condition.op {
                Comparison::Eq => "IS",
                Comparison::Gte => ">=",
            };
            clause.push_str(" AND json_extract(body, ?) ");
            clause.push_str(op);
            clause.push_str(" ?");
            values.push(SqlValue::Text(format!("$.{}", condition.field)));
            values.push(to_sql_value(&condition.value));
        }

        Ok((clause, values))
    }

    fn insert_body(conn: &Connection, collection: &str, document: &Document) -> Result<i64> {
        let body = serde_json::to_string(document)?;
        conn.execute(
            "INSERT INTO documents (collection, body) VALUES (?1, ?2)",
            params![collection, body],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn insert_one_inner(&self, collection: &str, document: &Document) -> Result<i64> {
        let id = Self::insert_body(&self.conn, collection, document)?;
        debug!("Inserted document {} into {}", id, collection);
        Ok(id)
    }

    fn find_one_inner(&self, collection: &str, filter: &Filter) -> Result<Option<Document>> {
        let (clause, values) = Self::where_clause(collection, filter)?;
        let sql = format!("SELECT body FROM documents WHERE {clause} ORDER BY id LIMIT 1");

        let body: Option<String> = self
            .conn
            .query_row(&sql, params_from_iter(values.iter()), |row| row.get(0))
            .optional()?;

        body.map(|b| parse_body(collection, &b)).transpose()
    }

    fn find_many_inner(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>> {
        let (clause, values) = Self::where_clause(collection, filter)?;
        let sql = format!("SELECT body FROM documents WHERE {clause} ORDER BY id");

        let mut stmt = self.conn.prepare(&sql)?;
        let bodies = stmt
            .query_map(params_from_iter(values.iter()), |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        bodies.iter().map(|b| parse_body(collection, b)).collect()
    }

    fn count_inner(&self, collection: &str, filter: &Filter) -> Result<u64> {
        let (clause, values) = Self::where_clause(collection, filter)?;
        let sql = format!("SELECT COUNT(*) FROM documents WHERE {clause}");

        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(values.iter()), |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    fn update_one_inner(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
        upsert: bool,
    ) -> Result<UpdateOutcome> {
        let (clause, values) = Self::where_clause(collection, filter)?;
        let sql = format!("SELECT id, body FROM documents WHERE {clause} ORDER BY id LIMIT 1");

        // Dropping the transaction on an early return rolls it back.
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;

        let existing: Option<(i64, String)> = tx
            .query_row(&sql, params_from_iter(values.iter()), |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .optional()?;

        let outcome = match existing {
            Some((id, body)) => {
                let mut document = parse_body(collection, &body)?;
                update.apply(collection, &mut document)?;
                tx.execute(
                    "UPDATE documents SET body = ?1 WHERE id = ?2",
                    params![serde_json::to_string(&document)?, id],
                )?;
                debug!("Updated document {} in {}", id, collection);
                UpdateOutcome {
                    matched: true,
                    upserted: false,
                    document: Some(document),
                }
            }
            None if upsert => {
                let document = update.upsert_document(collection, filter)?;
                let id = Self::insert_body(&tx, collection, &document)?;
                debug!("Upserted document {} into {}", id, collection);
                UpdateOutcome {
                    matched: false,
                    upserted: true,
                    document: Some(document),
                }
            }
            None => UpdateOutcome::default(),
        };

        tx.commit()?;
        Ok(outcome)
    }
}

impl DocumentStore for SqliteStore {
    fn insert_one(&self, collection: &str, document: &Document) -> Result<i64> {
        self.insert_one_inner(collection, document).map_err(|e| self.surface(e))
    }

    fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Document>> {
        self.find_one_inner(collection, filter).map_err(|e| self.surface(e))
    }

    fn find_many(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>> {
        self.find_many_inner(collection, filter).map_err(|e| self.surface(e))
    }

    fn count(&self, collection: &str, filter: &Filter) -> Result<u64> {
        self.count_inner(collection, filter).map_err(|e| self.surface(e))
    }

    fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
        upsert: bool,
    ) -> Result<UpdateOutcome> {
        self.update_one_inner(collection, filter, update, upsert).map_err(|e| self.surface(e))
    }
}

fn is_unreachable(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(
            ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::CannotOpen
                | ErrorCode::SystemIoFailure
        )
    )
}

/// Field names are restricted so they can be spliced into a JSON path.
fn is_field_name(field: &str) -> bool {
    !field.is_empty() && field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Convert a JSON value to the `SQLite` value `json_extract` yields for it.
fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => n.as_i64().map_or_else(
            || SqlValue::Real(n.as_f64().unwrap_or_default()),
            SqlValue::Integer,
        ),
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn parse_body(collection: &str, body: &str) -> Result<Document> {
    match serde_json::from_str(body)? {
        Value::Object(map) => Ok(map),
        _ => Err(Error::invalid_document(collection, "body is not a JSON object")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{to_document, INVENTORY, USERS};
    use serde_json::json;

    fn create_test_store() -> SqliteStore {
        SqliteStore::open_in_memory().expect("failed to create test store")
    }

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_open_in_memory() {
        let store = SqliteStore::open_in_memory();
        assert!(store.is_ok());
        assert_eq!(store.unwrap().path().to_string_lossy(), ":memory:");
    }

    #[test]
    fn test_insert_and_find_one() {
        let store = create_test_store();
        store
            .insert_one("donors", &doc(json!({"name": "bob", "age": 30})))
            .unwrap();

        let found = store
            .find_one("donors", &Filter::all().eq("name", "bob"))
            .unwrap()
            .unwrap();
        assert_eq!(found["age"], 30);

        let missing = store
            .find_one("donors", &Filter::all().eq("name", "carol"))
            .unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_collections_are_isolated() {
        let store = create_test_store();
        store
            .insert_one("donors", &doc(json!({"name": "bob"})))
            .unwrap();

        assert_eq!(store.count("donors", &Filter::all()).unwrap(), 1);
        assert_eq!(store.count("donations", &Filter::all()).unwrap(), 0);
        assert!(store
            .find_one("donations", &Filter::all().eq("name", "bob"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_find_many_in_insertion_order() {
        let store = create_test_store();
        for name in ["a", "b", "c"] {
            store
                .insert_one("donors", &doc(json!({"name": name, "group": "O+"})))
                .unwrap();
        }
        store
            .insert_one("donors", &doc(json!({"name": "d", "group": "A-"})))
            .unwrap();

        let all = store.find_many("donors", &Filter::all()).unwrap();
        let names: Vec<_> = all.iter().map(|d| d["name"].clone()).collect();
        assert_eq!(names, vec!["a", "b", "c", "d"]);

        let o_pos = store
            .find_many("donors", &Filter::all().eq("group", "O+"))
            .unwrap();
        assert_eq!(o_pos.len(), 3);
    }

    #[test]
    fn test_count_with_gte() {
        let store = create_test_store();
        for amount in [1, 5, 10] {
            store
                .insert_one(INVENTORY, &doc(json!({"amount": amount})))
                .unwrap();
        }
        assert_eq!(
            store
                .count(INVENTORY, &Filter::all().gte("amount", 5))
                .unwrap(),
            2
        );
    }

    #[test]
    fn test_eq_on_boolean_and_null() {
        let store = create_test_store();
        store
            .insert_one("flags", &doc(json!({"on": true, "note": null})))
            .unwrap();
        assert_eq!(
            store.count("flags", &Filter::all().eq("on", true)).unwrap(),
            1
        );
        assert_eq!(
            store
                .count("flags", &Filter::all().eq("note", Value::Null))
                .unwrap(),
            1
        );
    }

    #[test]
    fn test_update_one_increments_existing() {
        let store = create_test_store();
        store
            .insert_one(INVENTORY, &doc(json!({"blood_group": "O+", "amount": 3})))
            .unwrap();

        let outcome = store
            .update_one(
                INVENTORY,
                &Filter::all().eq("blood_group", "O+"),
                &Update::new().inc("amount", 2),
                false,
            )
            .unwrap();
        assert!(outcome.matched);
        assert!(!outcome.upserted);
        assert_eq!(outcome.document.unwrap()["amount"], 5);
    }

    #[test]
    fn test_update_one_upsert_creates() {
        let store = create_test_store();
        let outcome = store
            .update_one(
                INVENTORY,
                &Filter::all().eq("blood_group", "B+"),
                &Update::new().inc("amount", 4),
                true,
            )
            .unwrap();
        assert!(!outcome.matched);
        assert!(outcome.upserted);

        let stored = store
            .find_one(INVENTORY, &Filter::all().eq("blood_group", "B+"))
            .unwrap()
            .unwrap();
        assert_eq!(stored["amount"], 4);
        assert_eq!(store.count(INVENTORY, &Filter::all()).unwrap(), 1);
    }

    #[test]
    fn test_update_one_no_match_without_upsert() {
        let store = create_test_store();
        let outcome = store
            .update_one(
                INVENTORY,
                &Filter::all().eq("blood_group", "B+"),
                &Update::new().inc("amount", 4),
                false,
            )
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::default());
        assert_eq!(store.count(INVENTORY, &Filter::all()).unwrap(), 0);
    }

    #[test]
    fn test_conditional_update_guard() {
        let store = create_test_store();
        store
            .insert_one(INVENTORY, &doc(json!({"blood_group": "A+", "amount": 3})))
            .unwrap();

        let filter = Filter::all().eq("blood_group", "A+").gte("amount", 5);
        let outcome = store
            .update_one(INVENTORY, &filter, &Update::new().inc("amount", -5), false)
            .unwrap();
        assert!(!outcome.matched);

        let stored = store
            .find_one(INVENTORY, &Filter::all().eq("blood_group", "A+"))
            .unwrap()
            .unwrap();
        assert_eq!(stored["amount"], 3);
    }

    #[test]
    fn test_failed_update_rolls_back() {
        let store = create_test_store();
        store
            .insert_one(INVENTORY, &doc(json!({"blood_group": "A+", "amount": "x"})))
            .unwrap();

        let result = store.update_one(
            INVENTORY,
            &Filter::all().eq("blood_group", "A+"),
            &Update::new().inc("amount", 1),
            false,
        );
        assert!(result.is_err());

        // The connection is usable again after the rollback.
        let outcome = store
            .update_one(
                INVENTORY,
                &Filter::all().eq("blood_group", "A+"),
                &Update::new().set("amount", 1),
                false,
            )
            .unwrap();
        assert!(outcome.matched);
    }

    #[test]
    fn test_unique_user_names_enforced() {
        let store = create_test_store();
        let user = to_document(USERS, &json!({"name": "alice"})).unwrap();
        store.insert_one(USERS, &user).unwrap();
        assert!(store.insert_one(USERS, &user).is_err());
    }

    #[test]
    fn test_invalid_field_name_rejected() {
        let store = create_test_store();
        let err = store
            .find_one("donors", &Filter::all().eq("name') OR 1=1 --", "x"))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidDocument { .. }));
    }

    #[test]
    fn test_open_file_based() {
        let temp_dir = std::env::temp_dir();
        let db_path = temp_dir.join(format!("bloodbank_test_{}.db", std::process::id()));

        {
            let store = SqliteStore::open(&db_path, Duration::from_secs(1)).unwrap();
            store
                .insert_one("donors", &doc(json!({"name": "persisted"})))
                .unwrap();
            assert_eq!(store.path(), db_path);
        }

        let reopened = SqliteStore::open(&db_path, Duration::from_secs(1)).unwrap();
        assert_eq!(reopened.count("donors", &Filter::all()).unwrap(), 1);

        drop(reopened);
        let _ = std::fs::remove_file(&db_path);
        let _ = std::fs::remove_file(db_path.with_extension("db-wal"));
        let _ = std::fs::remove_file(db_path.with_extension("db-shm"));
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let temp_dir = std::env::temp_dir();
        let root = temp_dir.join(format!("bloodbank_test_dirs_{}", std::process::id()));
        let nested_path = root.join("nested/bloodbank.db");
        let _ = std::fs::remove_dir_all(&root);

        let store = SqliteStore::open(&nested_path, Duration::from_secs(1)).unwrap();
        assert!(nested_path.exists());

        drop(store);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn test_open_unwritable_path_is_unavailable() {
        let temp_dir = std::env::temp_dir();
        let dir_as_db = temp_dir.join(format!("bloodbank_test_isdir_{}", std::process::id()));
        std::fs::create_dir_all(&dir_as_db).unwrap();

        let err = SqliteStore::open(&dir_as_db, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, Error::StoreUnavailable { .. }));

        let _ = std::fs::remove_dir_all(&dir_as_db);
    }

    #[test]
    fn test_unreachable_codes() {
        use rusqlite::ffi;

        let busy = rusqlite::Error::SqliteFailure(ffi::Error::new(ffi::SQLITE_BUSY), None);
        assert!(is_unreachable(&busy));
        let io = rusqlite::Error::SqliteFailure(ffi::Error::new(ffi::SQLITE_IOERR), None);
        assert!(is_unreachable(&io));

        let constraint =
            rusqlite::Error::SqliteFailure(ffi::Error::new(ffi::SQLITE_CONSTRAINT), None);
        assert!(!is_unreachable(&constraint));
        assert!(!is_unreachable(&rusqlite::Error::QueryReturnedNoRows));
    }

    #[test]
    fn test_query_errors_stay_store_errors() {
        let store = create_test_store();
        let user = to_document(USERS, &json!({"name": "alice"})).unwrap();
        store.insert_one(USERS, &user).unwrap();

        let err = store.insert_one(USERS, &user).unwrap_err();
        assert!(matches!(err, Error::Store(_)));
    }

    #[test]
    fn test_locked_database_is_unavailable() {
        let db_path = std::env::temp_dir().join(format!(
            "bloodbank_test_locked_{}.db",
            std::process::id()
        ));
        let store = SqliteStore::open(&db_path, Duration::from_millis(20)).unwrap();

        // A second writer holds the write lock for the whole update attempt.
        let other = Connection::open(&db_path).unwrap();
        other.execute_batch("BEGIN IMMEDIATE").unwrap();

        let err = store
            .update_one(
                INVENTORY,
                &Filter::all().eq("blood_group", "O+"),
                &Update::new().inc("amount", 1),
                true,
            )
            .unwrap_err();
        assert!(matches!(err, Error::StoreUnavailable { ref path, .. } if path == &db_path));

        other.execute_batch("ROLLBACK").unwrap();
        drop(other);
        drop(store);
        let _ = std::fs::remove_file(&db_path);
        let _ = std::fs::remove_file(db_path.with_extension("db-wal"));
        let _ = std::fs::remove_file(db_path.with_extension("db-shm"));
    }
}
