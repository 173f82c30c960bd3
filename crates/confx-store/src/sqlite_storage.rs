//! SQLite-backed storage
//!
//! One row per storage key in a key/value table. The table and column names
//! are configurable, and an optional column filter scopes every query to a
//! logical partition of the table (and is written into every inserted row).

#![allow(clippy::result_large_err)]

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;

use confx_core::storage::{Storage, StoredValues};
use confx_core::Value;
use parking_lot::Mutex;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection};

use crate::db;
use crate::errors::{from_rusqlite, invalid_identifier, Result};
use crate::migrations::apply_migrations;

pub const DEFAULT_TABLE: &str = "configs";
pub const DEFAULT_KEY_COLUMN: &str = "key";
pub const DEFAULT_VALUE_COLUMN: &str = "value";

/// Table layout and partition filter
#[derive(Debug, Clone, PartialEq)]
pub struct SqliteOptions {
    pub table: String,
    pub key_column: String,
    pub value_column: String,
    /// Column → value pairs every row of this store carries
    pub filter: BTreeMap<String, Value>,
}

impl Default for SqliteOptions {
    fn default() -> Self {
        Self {
            table: DEFAULT_TABLE.to_string(),
            key_column: DEFAULT_KEY_COLUMN.to_string(),
            value_column: DEFAULT_VALUE_COLUMN.to_string(),
            filter: BTreeMap::new(),
        }
    }
}

impl SqliteOptions {
    pub fn with_filter(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter.insert(column.into(), value.into());
        self
    }

    /// Check every identifier, since they are interpolated into SQL text
    pub fn validate(&self) -> Result<()> {
        for name in [&self.table, &self.key_column, &self.value_column]
            .into_iter()
            .chain(self.filter.keys())
        {
            if !is_identifier(name) {
                return Err(invalid_identifier(name));
            }
        }
        if self.key_column == self.value_column {
            return Err(confx_core::ConfigError::InvalidSettings {
                message: format!(
                    "key and value columns must differ, both are '{}'",
                    self.key_column
                ),
            });
        }
        for column in self.filter.keys() {
            if *column == self.key_column || *column == self.value_column {
                return Err(confx_core::ConfigError::InvalidSettings {
                    message: format!("filter column '{}' overlaps the key/value columns", column),
                });
            }
        }
        Ok(())
    }

    /// ` AND "col" IS ?` for each filter column, with the matching parameters
    fn filter_conditions(&self) -> (String, Vec<SqlValue>) {
        let mut sql = String::new();
        let mut params = Vec::with_capacity(self.filter.len());
        for (column, value) in &self.filter {
            sql.push_str(&format!(" AND \"{}\" IS ?", column));
            params.push(to_sql_value(value));
        }
        (sql, params)
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Scalars map to native storage classes; containers are stored as JSON text
pub fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Int(i) => SqlValue::Integer(*i),
        Value::Float(f) => SqlValue::Real(*f),
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::List(_) | Value::Map(_) => SqlValue::Text(value.to_json()),
    }
}

pub fn from_sql_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::String(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

pub struct SqliteStorage {
    conn: Mutex<Connection>,
    options: SqliteOptions,
}

impl SqliteStorage {
    /// Open (or create) a database file and bring its schema up to date
    pub fn open<P: AsRef<Path>>(path: P, options: SqliteOptions) -> Result<Self> {
        let conn = db::open(path)?;
        db::configure(&conn)?;
        Self::from_connection(conn, options)
    }

    pub fn open_in_memory(options: SqliteOptions) -> Result<Self> {
        Self::from_connection(db::open_in_memory()?, options)
    }

    /// Wrap an existing connection, applying the embedded migrations
    ///
    /// Migrations create the default `configs` table. A custom table named in
    /// `options` must already exist.
    pub fn from_connection(mut conn: Connection, options: SqliteOptions) -> Result<Self> {
        options.validate()?;
        apply_migrations(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            options,
        })
    }

    pub fn options(&self) -> &SqliteOptions {
        &self.options
    }

    /// Run a closure against the underlying connection
    pub fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> T) -> T {
        let conn = self.conn.lock();
        f(&*conn)
    }

    fn select_raw(&self, conn: &Connection) -> Result<Vec<(String, SqlValue)>> {
        let o = &self.options;
        let (conditions, params) = o.filter_conditions();
        let sql = format!(
            "SELECT \"{}\", \"{}\" FROM \"{}\" WHERE 1 = 1{} ORDER BY \"{}\"",
            o.key_column, o.value_column, o.table, conditions, o.key_column
        );
        let mut stmt = conn.prepare(&sql).map_err(from_rusqlite)?;
        let rows = stmt
            .query_map(params_from_iter(params.iter()), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, SqlValue>(1)?))
            })
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(from_rusqlite)?;
        Ok(rows)
    }

    fn update(&self, conn: &Connection, key: &str, value: SqlValue) -> Result<()> {
        let o = &self.options;
        let (conditions, filter_params) = o.filter_conditions();
        let sql = format!(
            "UPDATE \"{}\" SET \"{}\" = ? WHERE \"{}\" = ?{}",
            o.table, o.value_column, o.key_column, conditions
        );
        let mut params = vec![value, SqlValue::Text(key.to_string())];
        params.extend(filter_params);
        conn.execute(&sql, params_from_iter(params.iter()))
            .map_err(from_rusqlite)?;
        Ok(())
    }

    fn insert(&self, conn: &Connection, key: &str, value: SqlValue) -> Result<()> {
        let o = &self.options;
        let mut columns: Vec<String> = o.filter.keys().map(|c| format!("\"{}\"", c)).collect();
        let mut params: Vec<SqlValue> = o.filter.values().map(to_sql_value).collect();
        columns.push(format!("\"{}\"", o.key_column));
        columns.push(format!("\"{}\"", o.value_column));
        params.push(SqlValue::Text(key.to_string()));
        params.push(value);

        let placeholders = vec!["?"; params.len()].join(", ");
        let sql = format!(
            "INSERT INTO \"{}\" ({}) VALUES ({})",
            o.table,
            columns.join(", "),
            placeholders
        );
        conn.execute(&sql, params_from_iter(params.iter()))
            .map_err(from_rusqlite)?;
        Ok(())
    }
}

impl Storage for SqliteStorage {
    /// Diff against the stored rows: changed values are updated, new keys
    /// inserted, equal values left alone. Runs in one transaction.
    fn save(&self, values: &StoredValues) -> Result<bool> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(from_rusqlite)?;

        let existing: HashMap<String, SqlValue> = self.select_raw(&tx)?.into_iter().collect();
        let (mut inserted, mut updated) = (0u64, 0u64);
        for (key, value) in values {
            let new_value = to_sql_value(value);
            match existing.get(key) {
                Some(old) if *old == new_value => continue,
                Some(_) => {
                    self.update(&tx, key, new_value)?;
                    updated += 1;
                }
                None => {
                    self.insert(&tx, key, new_value)?;
                    inserted += 1;
                }
            }
        }

        tx.commit().map_err(from_rusqlite)?;
        tracing::debug!(table = %self.options.table, inserted, updated, "sqlite storage saved");
        Ok(true)
    }

    fn get(&self) -> Result<StoredValues> {
        let conn = self.conn.lock();
        let rows = self.select_raw(&conn)?;
        Ok(rows
            .into_iter()
            .map(|(key, value)| (key, from_sql_value(ValueRef::from(&value))))
            .collect())
    }

    fn clear(&self) -> Result<bool> {
        let conn = self.conn.lock();
        let o = &self.options;
        let (conditions, params) = o.filter_conditions();
        let sql = format!("DELETE FROM \"{}\" WHERE 1 = 1{}", o.table, conditions);
        conn.execute(&sql, params_from_iter(params.iter()))
            .map_err(from_rusqlite)?;
        Ok(true)
    }

    fn clear_value(&self, key: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let o = &self.options;
        let (conditions, filter_params) = o.filter_conditions();
        let sql = format!(
            "DELETE FROM \"{}\" WHERE \"{}\" = ?{}",
            o.table, o.key_column, conditions
        );
        let mut params = vec![SqlValue::Text(key.to_string())];
        params.extend(filter_params);
        conn.execute(&sql, params_from_iter(params.iter()))
            .map_err(from_rusqlite)?;
        Ok(true)
    }
}

impl fmt::Debug for SqliteStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteStorage")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
