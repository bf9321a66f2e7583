//! Scratch SQLite database giving SQL-style filtering over one CSV file.
//!
//! The database lives in a private temporary directory that is removed when
//! the [`ScratchDb`] is dropped, on success and error paths alike.

use crate::error::{AppError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

const SCRATCH_FILE: &str = "scratch.sqlite3";
pub const SCRATCH_PREFIX: &str = "wqp-scratch";

/// SQLite allows 32766 bound parameters per statement.
const MAX_PARAMETERS: usize = 30_000;

/// A CSV file loaded into a scratch table.
#[derive(Debug, Clone)]
pub struct CsvTable {
    pub name: String,
    pub header: Vec<String>,
}

pub struct ScratchDb {
    pool: SqlitePool,
    path: PathBuf,
    // dropped last so the pool is gone before the directory is removed
    _dir: TempDir,
}

impl ScratchDb {
    /// Open a scratch database in a fresh `wqp-scratch*` directory under `root`.
    pub async fn open_in(root: &Path) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir_in(root)?;
        let path = dir.path().join(SCRATCH_FILE);

        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        debug!("Opened scratch database at {}", path.display());
        Ok(Self {
            pool,
            path,
            _dir: dir,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load a CSV file into a table named after the file stem. Every column
    /// is stored as text.
    pub async fn load_csv(&self, csv_path: &Path) -> Result<CsvTable> {
        let name = csv_path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| {
                AppError::InvalidData(format!("Invalid CSV file name: {}", csv_path.display()))
            })?
            .to_string();

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(csv_path)?;
        let header: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

        let mut seen = HashSet::new();
        if let Some(dup) = header.iter().find(|h| !seen.insert(h.as_str())) {
            return Err(AppError::InvalidData(format!(
                "Duplicate column '{}' in {}",
                dup,
                csv_path.display()
            )));
        }

        let table = quote_ident(&name);
        let columns = header
            .iter()
            .map(|h| format!("{} TEXT", quote_ident(h)))
            .collect::<Vec<_>>()
            .join(", ");

        sqlx::query(&format!("DROP TABLE IF EXISTS {}", table))
            .execute(&self.pool)
            .await?;
        sqlx::query(&format!("CREATE TABLE {} ({})", table, columns))
            .execute(&self.pool)
            .await?;

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let mut values: Vec<String> = record.iter().map(str::to_string).collect();
            values.resize(header.len(), String::new());
            rows.push(values);
        }

        let column_list = header.iter().map(|h| quote_ident(h)).collect::<Vec<_>>().join(", ");
        let chunk_size = (MAX_PARAMETERS / header.len().max(1)).max(1);

        let mut tx = self.pool.begin().await?;
        for chunk in rows.chunks(chunk_size) {
            let mut qb =
                QueryBuilder::<Sqlite>::new(format!("INSERT INTO {} ({}) ", table, column_list));
            qb.push_values(chunk, |mut b, row| {
                for value in row {
                    b.push_bind(value.clone());
                }
            });
            qb.build().execute(&mut *tx).await?;
        }
        tx.commit().await?;

        debug!("Loaded {} rows from {} into scratch table", rows.len(), name);
        Ok(CsvTable { name, header })
    }

    pub async fn create_index(&self, table: &CsvTable, column: &str) -> Result<()> {
        let statement = format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} ({} ASC)",
            quote_ident(&format!("{}_{}", column, table.name)),
            quote_ident(&table.name),
            quote_ident(column)
        );
        sqlx::query(&statement).execute(&self.pool).await?;
        Ok(())
    }

    /// Distinct values of `column`, in first-seen order. An empty value is
    /// a value like any other.
    pub async fn distinct(&self, table: &CsvTable, column: &str) -> Result<Vec<String>> {
        let statement = format!(
            "SELECT {0} FROM {1} WHERE {0} IS NOT NULL GROUP BY {0} ORDER BY min(rowid)",
            quote_ident(column),
            quote_ident(&table.name)
        );
        let values = sqlx::query_scalar::<_, String>(&statement)
            .fetch_all(&self.pool)
            .await?;
        Ok(values)
    }

    /// All rows where `column = value`, columns in header order.
    pub async fn select_where(
        &self,
        table: &CsvTable,
        column: &str,
        value: &str,
    ) -> Result<Vec<Vec<String>>> {
        let statement = format!(
            "SELECT * FROM {} WHERE {} = ? ORDER BY rowid",
            quote_ident(&table.name),
            quote_ident(column)
        );
        let rows = sqlx::query(&statement)
            .bind(value)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                (0..row.len())
                    .map(|i| {
                        row.try_get::<Option<String>, _>(i)
                            .map(Option::unwrap_or_default)
                            .map_err(AppError::from)
                    })
                    .collect::<Result<Vec<String>>>()
            })
            .collect()
    }

    /// Values of `column` matching a SQL `LIKE` pattern (`\` escapes).
    pub async fn select_like(
        &self,
        table: &CsvTable,
        column: &str,
        pattern: &str,
    ) -> Result<Vec<String>> {
        let statement = format!(
            "SELECT {0} FROM {1} WHERE {0} LIKE ? ESCAPE '\\'",
            quote_ident(column),
            quote_ident(&table.name)
        );
        let values = sqlx::query_scalar::<_, String>(&statement)
            .bind(pattern)
            .fetch_all(&self.pool)
            .await?;
        Ok(values)
    }

    /// Close the pool and remove the scratch directory.
    pub async fn close(self) {
        self.pool.close().await;
        debug!("Removed scratch database {}", self.path.display());
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
