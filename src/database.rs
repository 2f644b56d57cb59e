//! SQLite access for the tool server.
//!
//! Statements are executed verbatim; the database engine decides what they
//! mean. Results are rendered as text for the model.

use crate::error::{DbChatError, Result};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, instrument};

/// Message returned for statements that produce no rows.
pub const SUCCESS_MESSAGE: &str = "Query ran successfully.";

/// Column metadata from `describe_table`.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    pub name: String,
    pub declared_type: String,
    pub not_null: bool,
    pub primary_key: bool,
}

/// SQLite database handle.
pub struct SqliteDatabase {
    conn: Mutex<Connection>,
}

impl SqliteDatabase {
    /// Open (or create) a database file.
    #[instrument(skip_all)]
    pub fn open(path: &Path, read_only: bool) -> Result<Self> {
        let conn = if read_only {
            Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_URI,
            )?
        } else {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            Connection::open(path)?
        };

        info!(
            "Opened SQLite database at {:?}{}",
            path,
            if read_only { " (read-only)" } else { "" }
        );

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory database (useful for testing).
    pub fn in_memory() -> Result<Self> {
        Ok(Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| DbChatError::InvalidInput(format!("Failed to acquire lock: {}", e)))
    }

    /// Execute one SQL statement and render its outcome.
    ///
    /// Rows come back newline-joined, one `(v1, v2, ...)` tuple per row.
    /// Single-column rows keep the trailing comma: `(42,)`.
    #[instrument(skip(self))]
    pub fn execute(&self, sql: &str) -> Result<String> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;

        if stmt.column_count() == 0 {
            let changed = stmt.execute([])?;
            debug!("Statement changed {} rows", changed);
            return Ok(if changed > 0 {
                format!("{} ({} rows affected)", SUCCESS_MESSAGE, changed)
            } else {
                SUCCESS_MESSAGE.to_string()
            });
        }

        let columns = stmt.column_count();
        let mut rows = stmt.query([])?;
        let mut lines = Vec::new();
        while let Some(row) = rows.next()? {
            let values = (0..columns)
                .map(|i| row.get_ref(i).map(render_value))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            lines.push(render_row(&values));
        }

        debug!("Query returned {} rows", lines.len());
        if lines.is_empty() {
            Ok(SUCCESS_MESSAGE.to_string())
        } else {
            Ok(lines.join("\n"))
        }
    }

    /// Names of user tables, sorted.
    pub fn list_tables(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(names)
    }

    /// Column layout of one table, in declaration order.
    pub fn describe_table(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT name, type, \"notnull\", pk FROM pragma_table_info(?1) ORDER BY cid",
        )?;
        let columns = stmt
            .query_map([table], |row| {
                Ok(ColumnInfo {
                    name: row.get(0)?,
                    declared_type: row.get(1)?,
                    not_null: row.get::<_, i64>(2)? != 0,
                    primary_key: row.get::<_, i64>(3)? != 0,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        if columns.is_empty() {
            return Err(DbChatError::InvalidInput(format!("no such table: {}", table)));
        }
        Ok(columns)
    }
}

fn render_row(values: &[String]) -> String {
    match values {
        [single] => format!("({},)", single),
        _ => format!("({})", values.join(", ")),
    }
}

fn render_value(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => "NULL".to_string(),
        ValueRef::Integer(i) => i.to_string(),
        // Debug keeps the fractional part of whole reals: 12.0, not 12
        ValueRef::Real(f) => format!("{:?}", f),
        ValueRef::Text(t) => format!("'{}'", String::from_utf8_lossy(t)),
        ValueRef::Blob(b) => format!("<blob {} bytes>", b.len()),
    }
}
