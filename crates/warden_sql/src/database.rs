use base64::Engine as _;
use camino::Utf8Path;
use parking_lot::Mutex;
use rusqlite::{Connection, types::ValueRef};
use serde::Serialize;
use serde_json::{Map, Number, Value};
use tracing::{debug, trace};

use crate::error::{Error, Result};

/// The result of running a statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryOutput {
    /// Rows returned by a statement that produces columns, as ordered
    /// `column -> value` objects.
    Rows(Vec<Map<String, Value>>),

    /// The number of rows changed by a statement without result columns.
    Affected(usize),
}

impl QueryOutput {
    /// Render the output as JSON text for a tool result.
    #[must_use]
    pub fn to_json_string(&self) -> String {
        match self {
            Self::Rows(rows) => Value::Array(rows.iter().cloned().map(Value::Object).collect()),
            Self::Affected(n) => serde_json::json!({ "rows_affected": n }),
        }
        .to_string()
    }
}

/// A SQLite database shared by the SQL tools.
///
/// The handle is opened once at startup and passed around by `Arc`. The
/// connection itself is guarded by a mutex; concurrent writers from separate
/// threads are serialized here and otherwise rely on SQLite's own locking.
#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) the database file at `path`.
    pub fn open(path: &Utf8Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|error| Error::Open {
            path: path.to_owned(),
            error,
        })?;

        debug!(%path, "Opened database.");
        Ok(Self::from_connection(conn))
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    #[must_use]
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Execute a single statement.
    ///
    /// Statements that produce result columns return their rows, all other
    /// statements return the number of changed rows. No validation is done
    /// here; read-only callers must pass the statement through
    /// [`sanitize`](crate::sanitize) first.
    pub fn run(&self, sql: &str) -> Result<QueryOutput> {
        trace!(sql, "Running statement.");

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(sql)?;

        if stmt.column_count() == 0 {
            let affected = stmt.execute([])?;
            debug!(affected, "Statement executed.");
            return Ok(QueryOutput::Affected(affected));
        }

        let columns = stmt
            .column_names()
            .into_iter()
            .map(str::to_owned)
            .collect::<Vec<_>>();

        let mut rows = stmt.query([])?;
        let mut output = vec![];
        while let Some(row) = rows.next()? {
            let mut object = Map::with_capacity(columns.len());
            for (index, column) in columns.iter().enumerate() {
                object.insert(column.clone(), to_json(row.get_ref(index)?));
            }

            output.push(object);
        }

        debug!(rows = output.len(), "Query returned rows.");
        Ok(QueryOutput::Rows(output))
    }

    /// Execute a batch of statements without returning results.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn.lock().execute_batch(sql).map_err(Into::into)
    }

    /// The `CREATE` statements of all user tables, separated by blank lines.
    pub fn schema(&self) -> Result<String> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT sql FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' AND \
             sql IS NOT NULL ORDER BY name",
        )?;

        let statements = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(statements.join(";\n\n"))
    }
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(n) => Value::from(n),
        ValueRef::Real(n) => Number::from_f64(n).map_or(Value::Null, Value::Number),
        ValueRef::Text(text) => Value::String(String::from_utf8_lossy(text).into_owned()),
        ValueRef::Blob(blob) => Value::String(base64::engine::general_purpose::STANDARD.encode(blob)),
    }
}
