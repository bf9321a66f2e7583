//! Batched statement sink over one lazily acquired connection.

use crate::error::Result;
use crate::row::SqlRow;
use crate::schema::InsertTemplate;
use sqlx::pool::PoolConnection;
use sqlx::{PgConnection, PgPool, Postgres};
use tracing::debug;

pub const DEFAULT_BATCH_SIZE: usize = 5000;

/// Executes rendered statements inside explicit transactions.
#[allow(async_fn_in_trait)]
pub trait StatementExecutor {
    async fn execute(&mut self, statement: &str) -> Result<()>;

    /// Commit the open transaction, if any.
    async fn commit(&mut self) -> Result<()>;
}

/// Render each row into `template`, execute it, and commit every
/// `batch_size` rows and once more after the last row.
///
/// Stops at the first failing row; nothing after it is attempted.
pub async fn insert_batched<E: StatementExecutor>(
    executor: &mut E,
    rows: &[SqlRow],
    template: &InsertTemplate,
    batch_size: usize,
) -> Result<usize> {
    let batch_size = batch_size.max(1);
    let mut executed = 0;

    for row in rows {
        let statement = template.render(&row.joined());
        executor.execute(&statement).await?;
        executed += 1;

        if executed % batch_size == 0 {
            debug!("Committing batch at {} statements", executed);
            executor.commit().await?;
        }
    }

    executor.commit().await?;
    Ok(executed)
}

/// One database connection for the lifetime of a run.
///
/// Acquired on first use. [`Session::discard`] closes it after a failure so
/// the next use opens a fresh one; [`Session::release`] returns it at the end
/// of the run.
pub struct Session {
    pool: PgPool,
    conn: Option<PoolConnection<Postgres>>,
    in_transaction: bool,
}

impl Session {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            conn: None,
            in_transaction: false,
        }
    }

    pub async fn connection(&mut self) -> Result<&mut PgConnection> {
        let conn = match self.conn.take() {
            Some(conn) => conn,
            None => {
                debug!("Opening database connection");
                self.pool.acquire().await?
            }
        };
        Ok(&mut **self.conn.insert(conn))
    }

    /// Close the connection without returning it to the pool. Any open
    /// transaction is rolled back by the server.
    pub fn discard(&mut self) {
        if let Some(conn) = self.conn.take() {
            debug!("Discarding database connection");
            drop(conn.detach());
        }
        self.in_transaction = false;
    }

    pub fn release(&mut self) {
        if self.in_transaction {
            self.discard();
        } else if self.conn.take().is_some() {
            debug!("Released database connection");
        }
    }
}

impl StatementExecutor for Session {
    async fn execute(&mut self, statement: &str) -> Result<()> {
        if !self.in_transaction {
            let conn = self.connection().await?;
            sqlx::raw_sql("BEGIN").execute(&mut *conn).await?;
            self.in_transaction = true;
        }

        let conn = self.connection().await?;
        sqlx::raw_sql(statement).execute(&mut *conn).await?;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        if !self.in_transaction {
            return Ok(());
        }
        let conn = self.connection().await?;
        sqlx::raw_sql("COMMIT").execute(&mut *conn).await?;
        self.in_transaction = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    #[derive(Default)]
    struct Recorder {
        log: Vec<String>,
        fail_on: Option<usize>,
        executed: usize,
    }

    impl StatementExecutor for Recorder {
        async fn execute(&mut self, statement: &str) -> Result<()> {
            self.executed += 1;
            if self.fail_on == Some(self.executed) {
                return Err(AppError::InvalidData("boom".to_string()));
            }
            self.log.push(statement.to_string());
            Ok(())
        }

        async fn commit(&mut self) -> Result<()> {
            self.log.push("COMMIT".to_string());
            Ok(())
        }
    }

    fn rows(n: usize) -> Vec<SqlRow> {
        (0..n).map(|i| SqlRow(vec![i.to_string()])).collect()
    }

    fn template() -> InsertTemplate {
        InsertTemplate::new("INSERT INTO t (a) VALUES ({})")
    }

    fn commits(log: &[String]) -> usize {
        log.iter().filter(|s| *s == "COMMIT").count()
    }

    #[tokio::test]
    async fn test_commits_every_batch_and_at_end() {
        let mut recorder = Recorder::default();

        let executed = insert_batched(&mut recorder, &rows(7), &template(), 3)
            .await
            .unwrap();

        assert_eq!(executed, 7);
        assert_eq!(recorder.log[0], "INSERT INTO t (a) VALUES (0)");
        assert_eq!(recorder.log[3], "COMMIT");
        assert_eq!(recorder.log[7], "COMMIT");
        assert_eq!(recorder.log.last().map(String::as_str), Some("COMMIT"));
        assert_eq!(commits(&recorder.log), 3);
    }

    #[tokio::test]
    async fn test_commits_once_for_empty_call() {
        let mut recorder = Recorder::default();

        insert_batched(&mut recorder, &[], &template(), DEFAULT_BATCH_SIZE)
            .await
            .unwrap();

        assert_eq!(recorder.log, vec!["COMMIT"]);
    }

    #[tokio::test]
    async fn test_error_stops_before_next_row() {
        let mut recorder = Recorder {
            fail_on: Some(2),
            ..Default::default()
        };

        let result = insert_batched(&mut recorder, &rows(5), &template(), 10).await;

        assert!(result.is_err());
        assert_eq!(recorder.executed, 2);
        assert_eq!(recorder.log, vec!["INSERT INTO t (a) VALUES (0)"]);
    }
}
