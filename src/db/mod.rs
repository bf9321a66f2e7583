pub mod repository;
pub mod sink;

pub use repository::Repository;

use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::row::SqlRow;
use crate::schema::InsertTemplate;
use chrono::NaiveDateTime;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Where transformed rows end up, and what the pipelines need to ask it.
#[allow(async_fn_in_trait)]
pub trait Destination {
    /// Latest `SampleDate` in `Results`, if any.
    async fn most_recent_sample_date(&mut self) -> Result<Option<NaiveDateTime>>;

    /// Station ids from `ids` not yet in `Stations`, in input order.
    async fn unseen_station_ids(&mut self, ids: &[String]) -> Result<Vec<String>>;

    /// Sample ids from `ids` not yet in `Results`, in input order.
    async fn unseen_sample_ids(&mut self, ids: &[String]) -> Result<Vec<String>>;

    /// Insert rendered rows, committing in batches. Returns rows written.
    async fn insert_rows(&mut self, rows: &[SqlRow], template: &InsertTemplate) -> Result<usize>;

    /// Give back the connection held for the current run.
    fn release(&mut self);
}

pub async fn connect(config: &DatabaseConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.connection_string())
        .await?;
    Ok(pool)
}
