use crate::error::{AppError, Result};
use rusqlite::backup::{Backup, Progress};
use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params_from_iter, Connection, DatabaseName};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Tables every snapshot must contain before the explorer will use it
pub const REQUIRED_TABLES: [&str; 4] = [
    "institutions",
    "savings_products",
    "web_presence",
    "membership",
];

// ============================================================================
// VALUES & ROWS
// ============================================================================

/// Scalar cell value as returned by the embedded engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// SQLite-style truthiness: NULL, 0 and empty text are false
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Integer(i) => *i != 0,
            Value::Real(f) => *f != 0.0,
            Value::Text(s) => !s.is_empty(),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Real(f) => Some(*f as i64),
            Value::Text(s) => s.trim().parse().ok(),
            Value::Null => None,
        }
    }

    fn from_ref(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(f) => Value::Real(f),
            ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
            // The snapshot schema has no BLOB columns
            ValueRef::Blob(_) => Value::Null,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Real(r) => write!(f, "{}", r),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            Value::Real(f) => ToSqlOutput::Borrowed(ValueRef::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

static NULL: Value = Value::Null;

/// One result row: column name → value
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Row(BTreeMap<String, Value>);

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: impl Into<String>, value: Value) {
        self.0.insert(column.into(), value);
    }

    /// Missing columns read as NULL
    pub fn get(&self, column: &str) -> &Value {
        self.0.get(column).unwrap_or(&NULL)
    }

    /// Non-null value rendered as text
    pub fn text(&self, column: &str) -> Option<String> {
        match self.get(column) {
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    /// Text value, empty string for NULL
    pub fn text_or_empty(&self, column: &str) -> String {
        self.text(column).unwrap_or_default()
    }

    pub fn int(&self, column: &str) -> Option<i64> {
        self.get(column).as_i64()
    }

    pub fn flag(&self, column: &str) -> bool {
        self.get(column).is_truthy()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

// ============================================================================
// QUERY GATEWAY
// ============================================================================

/// Read-only gateway over the in-memory snapshot
///
/// The connection slot stays empty until a snapshot is loaded; every query
/// issued before that fails with `AppError::NotInitialized`.
pub struct Database {
    conn: Option<Connection>,
    cache: RefCell<HashMap<String, Vec<Row>>>,
}

impl Database {
    /// Gateway with no snapshot attached yet
    pub fn uninitialized() -> Self {
        Self {
            conn: None,
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// Wrap an already-populated connection (fixtures, server workers)
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Some(conn),
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// Copy a snapshot file fully into memory
    pub fn load(path: &Path) -> Result<Self> {
        let conn = load_snapshot(path)?;
        Ok(Self::from_connection(conn))
    }

    /// Swap in a fresh snapshot and drop every memoized result
    pub fn reload(&mut self, path: &Path) -> Result<()> {
        let conn = load_snapshot(path)?;
        self.conn = Some(conn);
        self.clear_cache();
        Ok(())
    }

    /// Independent in-memory copy of the loaded snapshot, with an empty cache
    pub fn duplicate(&self) -> Result<Database> {
        let src = self.conn.as_ref().ok_or(AppError::NotInitialized)?;
        let mut dst = Connection::open_in_memory()?;
        Backup::new(src, &mut dst)?.run_to_completion(256, Duration::ZERO, None)?;
        Ok(Self::from_connection(dst))
    }

    pub fn is_initialized(&self) -> bool {
        self.conn.is_some()
    }

    /// Run a parameterized read and collect every row
    pub fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let conn = self.conn.as_ref().ok_or(AppError::NotInitialized)?;
        debug!(params = params.len(), "query: {}", compact_sql(sql));

        let mut stmt = conn.prepare(sql)?;
        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();

        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        let mut out = Vec::new();

        while let Some(row) = rows.next()? {
            let mut record = Row::new();
            for (i, name) in columns.iter().enumerate() {
                record.insert(name.clone(), Value::from_ref(row.get_ref(i)?));
            }
            out.push(record);
        }

        Ok(out)
    }

    /// First column named `count` of the first row, 0 when absent
    pub fn scalar_count(&self, sql: &str, params: &[Value]) -> Result<i64> {
        let rows = self.query(sql, params)?;
        Ok(rows.first().and_then(|r| r.int("count")).unwrap_or(0))
    }

    /// Memoized read keyed by `key`; lives until `clear_cache`
    pub fn cached_query(&self, key: &str, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        if let Some(rows) = self.cache.borrow().get(key) {
            return Ok(rows.clone());
        }

        let rows = self.query(sql, params)?;
        self.cache
            .borrow_mut()
            .insert(key.to_string(), rows.clone());
        Ok(rows)
    }

    pub fn clear_cache(&self) {
        self.cache.borrow_mut().clear();
    }

    pub fn cached_keys(&self) -> usize {
        self.cache.borrow().len()
    }
}

fn load_snapshot(path: &Path) -> Result<Connection> {
    // restore() would happily create an empty file at a missing path
    if !path.exists() {
        return Err(AppError::Missing(path.to_path_buf()));
    }

    let mut conn = Connection::open_in_memory().map_err(|source| AppError::Load {
        path: path.to_path_buf(),
        source,
    })?;
    conn.restore(DatabaseName::Main, path, None::<fn(Progress)>)
        .map_err(|source| AppError::Load {
            path: path.to_path_buf(),
            source,
        })?;

    verify_snapshot(&conn)?;
    info!("snapshot loaded into memory from {:?}", path);

    Ok(conn)
}

fn verify_snapshot(conn: &Connection) -> Result<()> {
    for table in REQUIRED_TABLES {
        let found: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |row| row.get(0),
        )?;
        if found == 0 {
            return Err(AppError::InvalidSnapshot(format!("missing table '{}'", table)));
        }
    }
    Ok(())
}

fn compact_sql(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ============================================================================
// SNAPSHOT SCHEMA
// ============================================================================

pub fn setup_snapshot_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS institutions (
            charter_number INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            city TEXT,
            state TEXT
        );

        CREATE TABLE IF NOT EXISTS savings_products (
            charter_number INTEGER NOT NULL,
            product TEXT,
            url TEXT,
            apy TEXT,
            min_balance TEXT,
            max_balance TEXT,
            last_updated TEXT
        );

        CREATE TABLE IF NOT EXISTS web_presence (
            charter_number INTEGER PRIMARY KEY,
            url TEXT,
            scraped_at TEXT
        );

        CREATE TABLE IF NOT EXISTS membership (
            charter_number INTEGER PRIMARY KEY,
            eligibility TEXT,
            field TEXT,
            url TEXT,
            updated_at TEXT,
            notes TEXT
        );

        CREATE TABLE IF NOT EXISTS snapshot_meta (
            key TEXT PRIMARY KEY,
            value TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_institutions_state ON institutions(state);
        CREATE INDEX IF NOT EXISTS idx_savings_charter ON savings_products(charter_number);",
    )?;

    Ok(())
}
