#![allow(dead_code)]

use chrono::NaiveDateTime;
use std::collections::HashSet;
use std::path::Path;
use wqp_seeder::config::Config;
use wqp_seeder::db::Destination;
use wqp_seeder::error::{AppError, Result};
use wqp_seeder::row::SqlRow;
use wqp_seeder::schema::InsertTemplate;

/// In-memory destination recording every rendered statement.
#[derive(Default)]
pub struct MemoryDestination {
    pub last_sample_date: Option<NaiveDateTime>,
    pub stored_stations: HashSet<String>,
    pub stored_samples: HashSet<String>,
    pub statements: Vec<String>,
    pub station_queries: Vec<Vec<String>>,
    pub released: usize,
    /// 1-based `insert_rows` call that fails without writing.
    pub fail_on_insert: Option<usize>,
    pub insert_calls: usize,
}

impl MemoryDestination {
    pub fn inserts_into(&self, table: &str) -> Vec<&String> {
        let prefix = format!("INSERT INTO \"{}\"", table);
        self.statements
            .iter()
            .filter(|s| s.starts_with(&prefix))
            .collect()
    }
}

impl Destination for MemoryDestination {
    async fn most_recent_sample_date(&mut self) -> Result<Option<NaiveDateTime>> {
        Ok(self.last_sample_date)
    }

    async fn unseen_station_ids(&mut self, ids: &[String]) -> Result<Vec<String>> {
        self.station_queries.push(ids.to_vec());
        Ok(ids
            .iter()
            .filter(|id| !self.stored_stations.contains(*id))
            .cloned()
            .collect())
    }

    async fn unseen_sample_ids(&mut self, ids: &[String]) -> Result<Vec<String>> {
        Ok(ids
            .iter()
            .filter(|id| !self.stored_samples.contains(*id))
            .cloned()
            .collect())
    }

    async fn insert_rows(&mut self, rows: &[SqlRow], template: &InsertTemplate) -> Result<usize> {
        self.insert_calls += 1;
        if self.fail_on_insert == Some(self.insert_calls) {
            return Err(AppError::InvalidData(format!(
                "insert {} rejected",
                self.insert_calls
            )));
        }
        for row in rows {
            self.statements.push(template.render(&row.joined()));
        }
        Ok(rows.len())
    }

    fn release(&mut self) {
        self.released += 1;
    }
}

pub fn config(url_template: &str) -> Config {
    config_with_seed(url_template, "")
}

/// Config whose per-file scratch databases live under `scratch_dir`.
pub fn config_with_scratch(url_template: &str, scratch_dir: &Path) -> Config {
    config_with_seed(
        url_template,
        &format!("  scratch_dir: '{}'\n", scratch_dir.display()),
    )
}

fn config_with_seed(url_template: &str, extra_seed: &str) -> Config {
    let yaml = format!(
        r#"
database:
  host: localhost
  port: 5432
  name: wqp
  user: seeder
  password: secret
source:
  url_template: "{}"
  timeout_seconds: 5
  max_retries: 0
seed:
  progress_interval: 1
{}"#,
        url_template, extra_seed
    );
    Config::from_yaml(&yaml).expect("valid test config")
}

pub const STATION_HEADER: &str = "OrganizationIdentifier,OrganizationFormalName,\
MonitoringLocationIdentifier,MonitoringLocationName,LongitudeMeasure,LatitudeMeasure,StateCode";

pub const RESULT_HEADER: &str = "OrganizationIdentifier,ActivityIdentifier,ActivityStartDate,\
ActivityStartTime/Time,MonitoringLocationIdentifier,CharacteristicName,ResultMeasureValue,\
ResultMeasure/MeasureUnitCode";

/// Result CSV rows for one sample whose charge balance is computable.
pub fn balanced_sample(sample_id: &str, station_id: &str, date: &str) -> String {
    [
        ("Calcium", "40.08"),
        ("Magnesium", "24.305"),
        ("Sodium", "22.99"),
        ("Chloride", "35.45"),
        ("Sulfate", "48.03"),
        ("Bicarbonate", "61.02"),
    ]
    .iter()
    .map(|(param, value)| {
        format!(
            "ORG,{},{},10:30:00,{},{},{},mg/l\n",
            sample_id, date, station_id, param, value
        )
    })
    .collect()
}
