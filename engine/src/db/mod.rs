//! SQL database access
//!
//! This module wraps the SQLite database the assistant answers questions
//! over. It uses sqlx with WAL mode and exposes the three capabilities the
//! query pipeline needs: a dialect identifier, fresh schema introspection,
//! and query execution with every database fault normalized to a marked
//! error string instead of a raised error.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{ConnectOptions, Row, TypeInfo, ValueRef};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

/// Marker prefixed to every normalized execution failure. Downstream
/// components classify results by testing for this literal.
pub const DATABASE_ERROR_MARKER: &str = "Database Error:";

/// Returns true if an executor result is a normalized database failure.
pub fn is_database_error(result: &str) -> bool {
    result.contains(DATABASE_ERROR_MARKER)
}

/// Handle on the user's SQLite database
pub struct SqlDatabase {
    pool: SqlitePool,
}

impl SqlDatabase {
    /// Open the database at the given path.
    ///
    /// Creates the file if it doesn't exist and enables WAL mode for
    /// better concurrency.
    pub async fn connect(db_path: &Path) -> Result<Self> {
        info!("Opening database at: {}", db_path.display());

        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create database directory")?;
        }

        let connection_string = format!("sqlite:{}", db_path.display());
        let options = SqliteConnectOptions::from_str(&connection_string)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .disable_statement_logging();

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        debug!("Database connection established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// The SQL dialect the connected engine speaks
    pub fn dialect(&self) -> &'static str {
        "SQLite"
    }

    /// Fetch a textual description of the live schema.
    ///
    /// Returns the CREATE TABLE statements of all user tables, fetched
    /// fresh on every call; this is the model's sole grounding for valid
    /// table and column names, so it must never be cached.
    pub async fn table_info(&self) -> Result<String> {
        let statements: Vec<Option<String>> = sqlx::query_scalar(
            r#"
            SELECT sql
            FROM sqlite_master
            WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to read schema from sqlite_master")?;

        Ok(statements
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join("\n\n"))
    }

    /// Execute a query and normalize the outcome to a single string.
    ///
    /// Every execution fault (bad SQL, missing table, locked database,
    /// connection failure) is caught here and returned as
    /// `Ok("Database Error: <description>")`, never propagated as an
    /// error. The `Err` arm is reserved for faults outside execution
    /// itself (a result row that cannot be rendered as text).
    pub async fn run_query(&self, sql: &str) -> Result<String> {
        debug!("Executing query: {}", sql);

        let rows = match sqlx::query(sql).fetch_all(&self.pool).await {
            Ok(rows) => rows,
            Err(e) => return Ok(format!("{} {}", DATABASE_ERROR_MARKER, e)),
        };

        render_rows(&rows)
    }

    /// Close the database connection pool
    pub async fn close(self) {
        info!("Closing database connection");
        self.pool.close().await;
    }
}

/// Render result rows as a bracketed list of tuples,
/// e.g. `[(1, 'Alice'), (2, 'Bob')]`.
fn render_rows(rows: &[SqliteRow]) -> Result<String> {
    let mut rendered = Vec::with_capacity(rows.len());

    for row in rows {
        let mut values = Vec::with_capacity(row.len());
        for idx in 0..row.len() {
            values.push(render_value(row, idx)?);
        }
        rendered.push(format!("({})", values.join(", ")));
    }

    Ok(format!("[{}]", rendered.join(", ")))
}

/// Render a single column value as text.
///
/// SQLite values are dynamically typed, so the value's own storage class
/// decides how it is decoded.
fn render_value(row: &SqliteRow, idx: usize) -> Result<String> {
    let raw = row
        .try_get_raw(idx)
        .with_context(|| format!("Failed to read column {}", idx))?;

    if raw.is_null() {
        return Ok("NULL".to_string());
    }

    let type_name = raw.type_info().name().to_string();
    match type_name.as_str() {
        "INTEGER" => Ok(row.try_get::<i64, _>(idx)?.to_string()),
        "REAL" => Ok(row.try_get::<f64, _>(idx)?.to_string()),
        "TEXT" => Ok(format!("'{}'", row.try_get::<String, _>(idx)?)),
        "BLOB" => Ok(format!("<{} bytes>", row.try_get::<Vec<u8>, _>(idx)?.len())),
        other => anyhow::bail!("Unsupported column type {} at index {}", other, idx),
    }
}
