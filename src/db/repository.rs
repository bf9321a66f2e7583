use crate::db::sink::{insert_batched, Session, DEFAULT_BATCH_SIZE};
use crate::db::Destination;
use crate::error::{AppError, Result};
use crate::row::SqlRow;
use crate::schema::InsertTemplate;
use chrono::NaiveDateTime;
use sqlx::PgPool;
use std::collections::HashSet;
use tracing::{debug, info};

/// PostgreSQL destination holding the `Stations` and `Results` tables.
///
/// Every query and insert of a run shares one [`Session`]; any failure
/// discards the connection before the error is returned.
pub struct Repository {
    pool: PgPool,
    session: Session,
    batch_size: usize,
}

impl Repository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            session: Session::new(pool.clone()),
            pool,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations completed");
        Ok(())
    }

    fn guard<T>(&mut self, result: Result<T>) -> Result<T> {
        if result.is_err() {
            self.session.discard();
        }
        result
    }

    /// Ids from `ids` with no matching row in `table.column`, in input order.
    async fn unseen(&mut self, table: &str, column: &str, ids: &[String]) -> Result<Vec<String>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let statement = format!(
            "SELECT t.id FROM UNNEST($1::text[]) AS t(id) \
             WHERE NOT EXISTS (SELECT 1 FROM \"{}\" d WHERE d.\"{}\" = t.id)",
            table, column
        );

        let result = async {
            let conn = self.session.connection().await?;
            let unseen = sqlx::query_scalar::<_, String>(&statement)
                .bind(ids.to_vec())
                .fetch_all(&mut *conn)
                .await?;
            Ok::<_, AppError>(unseen)
        }
        .await;
        let unseen: HashSet<String> = self.guard(result)?.into_iter().collect();

        debug!(
            "{} of {} {} ids are not in {}",
            unseen.len(),
            ids.len(),
            column,
            table
        );

        let mut seen_in_input = HashSet::new();
        Ok(ids
            .iter()
            .filter(|id| unseen.contains(*id) && seen_in_input.insert(id.as_str()))
            .cloned()
            .collect())
    }
}

impl Destination for Repository {
    async fn most_recent_sample_date(&mut self) -> Result<Option<NaiveDateTime>> {
        let result = async {
            let conn = self.session.connection().await?;
            let date = sqlx::query_scalar::<_, Option<NaiveDateTime>>(
                "SELECT max(\"SampleDate\") FROM \"Results\"",
            )
            .fetch_one(&mut *conn)
            .await?;
            Ok::<_, AppError>(date)
        }
        .await;
        self.guard(result)
    }

    async fn unseen_station_ids(&mut self, ids: &[String]) -> Result<Vec<String>> {
        self.unseen("Stations", "StationId", ids).await
    }

    async fn unseen_sample_ids(&mut self, ids: &[String]) -> Result<Vec<String>> {
        self.unseen("Results", "SampleId", ids).await
    }

    async fn insert_rows(&mut self, rows: &[SqlRow], template: &InsertTemplate) -> Result<usize> {
        let batch_size = self.batch_size;
        let result = insert_batched(&mut self.session, rows, template, batch_size).await;
        self.guard(result)
    }

    fn release(&mut self) {
        self.session.release();
    }
}
