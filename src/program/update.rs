//! Incremental update from the water quality portal search service.

use super::{duplicate_ids, StationSource, WqpProgram};
use crate::db::Destination;
use crate::error::{AppError, Result};
use crate::fetcher::{format_url, SearchSource};
use crate::identifier;
use crate::mapping::{FieldMapping, RowInput};
use crate::row::MappedRow;
use chrono::{Local, NaiveDate};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// All result rows sharing one sample id.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleGroup {
    pub sample_id: String,
    pub rows: Vec<MappedRow>,
}

/// Group mapped result rows by `SampleId`, in order of first appearance.
pub fn group_rows_by_id(rows: Vec<MappedRow>) -> Vec<SampleGroup> {
    let mut groups: Vec<SampleGroup> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for row in rows {
        let sample_id = row.get("SampleId").unwrap_or_default().to_string();
        match index.get(&sample_id) {
            Some(&i) => groups[i].rows.push(row),
            None => {
                index.insert(sample_id.clone(), groups.len());
                groups.push(SampleGroup {
                    sample_id,
                    rows: vec![row],
                });
            }
        }
    }

    groups
}

/// Keep only the groups whose sample id is in `unseen`.
pub fn retain_unseen(mut groups: Vec<SampleGroup>, unseen: &HashSet<String>) -> Vec<SampleGroup> {
    groups.retain(|group| unseen.contains(&group.sample_id));
    groups
}

/// Distinct station ids referenced by `groups`, in order of first appearance.
pub fn station_ids(groups: &[SampleGroup]) -> Vec<String> {
    let mut seen = HashSet::new();
    groups
        .iter()
        .flat_map(|group| group.rows.iter())
        .filter_map(|row| row.get("StationId"))
        .filter(|id| !id.is_empty() && seen.insert(*id))
        .map(str::to_string)
        .collect()
}

/// Map raw station rows and keep those whose `StationId` is in `ids`.
pub fn extract_stations_by_id(
    rows: Vec<Vec<String>>,
    ids: &HashSet<String>,
    header: &[String],
    mapping: &FieldMapping,
) -> Vec<MappedRow> {
    let header = mapping.map_header(header);
    rows.into_iter()
        .map(|values| mapping.map_values(&header, values))
        .filter(|row| row.get("StationId").is_some_and(|id| ids.contains(id)))
        .collect()
}

impl<D: Destination> WqpProgram<D> {
    /// Bring the destination up to today. See [`WqpProgram::update_as_of`].
    pub async fn update(&mut self) -> Result<()> {
        self.update_as_of(Local::now().date_naive()).await
    }

    /// Fetch results sampled since the latest stored `SampleDate`, insert the
    /// sample sets not already stored, and insert any stations they reference
    /// that are missing.
    ///
    /// The destination connection is released whether or not the update
    /// succeeds.
    pub async fn update_as_of(&mut self, today: NaiveDate) -> Result<()> {
        let result = self.run_update(today).await;
        self.destination.release();
        result
    }

    async fn run_update(&mut self, today: NaiveDate) -> Result<()> {
        let last_updated = self
            .destination
            .most_recent_sample_date()
            .await?
            .ok_or(AppError::NoLastUpdated)?;
        info!("Last sample date in database: {}", last_updated.date());

        let url = format_url(
            &self.url_template,
            SearchSource::Result,
            last_updated.date(),
            today,
        );
        let response = self
            .fetcher
            .get_csv(&url)
            .await?
            .ok_or_else(|| AppError::EmptyResponse(url.clone()))?;

        let rows = self
            .result_mapping
            .map(RowInput::Many(response.rows), Some(&response.header))
            .map(|mapped| mapped.into_rows())
            .unwrap_or_default();
        let groups = group_rows_by_id(rows);
        let fetched = groups.len();

        let groups = self.remove_existing_results(groups).await?;
        info!(
            "{} of {} fetched sample sets are new",
            groups.len(),
            fetched
        );

        let new_station_ids = self.find_new_station_ids(&groups).await?;
        let new_station_ids = self.drop_stored_duplicates(new_station_ids).await?;

        if new_station_ids.is_empty() {
            info!("All stations already in database");
        } else {
            self.seed_new_stations(new_station_ids, last_updated.date(), today)
                .await?;
        }

        let mut inserted = 0;
        for group in &groups {
            inserted += self.seed_results(&group.rows).await?;
        }
        info!(
            "Inserted {} result rows for {} sample sets",
            inserted,
            groups.len()
        );

        Ok(())
    }

    async fn remove_existing_results(&mut self, groups: Vec<SampleGroup>) -> Result<Vec<SampleGroup>> {
        if groups.is_empty() {
            return Ok(groups);
        }
        let ids: Vec<String> = groups.iter().map(|g| g.sample_id.clone()).collect();
        let unseen: HashSet<String> = self
            .destination
            .unseen_sample_ids(&ids)
            .await?
            .into_iter()
            .collect();
        Ok(retain_unseen(groups, &unseen))
    }

    async fn find_new_station_ids(&mut self, groups: &[SampleGroup]) -> Result<Vec<String>> {
        let ids = station_ids(groups);
        if ids.is_empty() {
            return Ok(ids);
        }
        let unseen = self.destination.unseen_station_ids(&ids).await?;
        debug!("{} of {} referenced stations are new", unseen.len(), ids.len());
        Ok(unseen)
    }

    /// Tagged ids whose canonical form is already stored are dropped.
    async fn drop_stored_duplicates(&mut self, ids: Vec<String>) -> Result<Vec<String>> {
        let canonical: Vec<String> = ids
            .iter()
            .filter(|id| identifier::is_tagged(id))
            .map(|id| identifier::strip(id))
            .collect();
        if canonical.is_empty() {
            return Ok(ids);
        }

        let unseen_canonical: HashSet<String> = self
            .destination
            .unseen_station_ids(&canonical)
            .await?
            .into_iter()
            .collect();

        let before = ids.len();
        let ids = identifier::drop_stored_tagged(ids, &unseen_canonical);
        if ids.len() < before {
            debug!(
                "Dropped {} tagged station ids already stored in canonical form",
                before - ids.len()
            );
        }
        Ok(ids)
    }

    async fn seed_new_stations(
        &mut self,
        ids: Vec<String>,
        last_updated: NaiveDate,
        today: NaiveDate,
    ) -> Result<()> {
        info!("Fetching {} new stations", ids.len());

        let url = format_url(&self.url_template, SearchSource::Station, last_updated, today);
        let response = self
            .fetcher
            .get_csv(&url)
            .await?
            .ok_or_else(|| AppError::EmptyResponse(url.clone()))?;

        let wanted: HashSet<String> = ids.into_iter().collect();
        let stations =
            extract_stations_by_id(response.rows, &wanted, &response.header, &self.station_mapping);
        if stations.len() < wanted.len() {
            debug!(
                "Station service returned {} of {} requested stations",
                stations.len(),
                wanted.len()
            );
        }

        let duplicates = duplicate_ids(StationSource::Rows(&stations), &self.scratch_root).await?;
        let inserted = self.seed_stations(&stations, &duplicates).await?;
        info!("Inserted {} stations", inserted);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{station_mapping, STATION_ID_COLUMN};

    fn result(sample_id: &str, station_id: &str) -> MappedRow {
        vec![("SampleId", sample_id), ("StationId", station_id)]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_group_rows_by_id_sizes() {
        let mut rows: Vec<MappedRow> = (0..4).map(|_| result("same", "s")).collect();
        rows.extend((0..3).map(|i| result(&format!("distinct-{}", i), "s")));

        let groups = group_rows_by_id(rows);

        assert_eq!(groups.len(), 4);
        assert_eq!(groups[0].sample_id, "same");
        assert_eq!(groups[0].rows.len(), 4);
        assert!(groups[1..].iter().all(|g| g.rows.len() == 1));
    }

    #[test]
    fn test_retain_unseen_removes_stored_sample_ids() {
        let groups = group_rows_by_id(vec![result("a", "s"), result("b", "s"), result("c", "s")]);
        let unseen: HashSet<String> = ["b".to_string()].into_iter().collect();

        let groups = retain_unseen(groups, &unseen);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].sample_id, "b");
    }

    #[test]
    fn test_retain_unseen_keeps_ids_reported_new() {
        let groups = group_rows_by_id(vec![
            result("sampleid1", "s"),
            result("sampleid2", "s"),
            result("existingsampleid", "s"),
        ]);
        let unseen: HashSet<String> = ["sampleid1", "existingsampleid"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let groups = retain_unseen(groups, &unseen);

        let ids: Vec<&str> = groups.iter().map(|g| g.sample_id.as_str()).collect();
        assert_eq!(ids, vec!["sampleid1", "existingsampleid"]);
    }

    #[test]
    fn test_station_ids_distinct_first_seen() {
        let groups = group_rows_by_id(vec![
            result("a", "s2"),
            result("a", "s1"),
            result("b", "s2"),
            result("c", ""),
        ]);

        assert_eq!(station_ids(&groups), vec!["s2", "s1"]);
    }

    #[test]
    fn test_extract_stations_by_id() {
        let header = vec![STATION_ID_COLUMN.to_string(), "MonitoringLocationName".to_string()];
        let rows = vec![
            vec!["1".to_string(), "insert1".to_string()],
            vec!["2".to_string(), "missed".to_string()],
            vec!["3".to_string(), "insert3".to_string()],
        ];
        let ids: HashSet<String> = ["1".to_string(), "3".to_string()].into_iter().collect();

        let stations = extract_stations_by_id(rows, &ids, &header, &station_mapping());

        assert_eq!(stations.len(), 2);
        assert_eq!(stations[0].get("StationName"), Some("insert1"));
        assert_eq!(stations[1].get("StationName"), Some("insert3"));
    }
}
