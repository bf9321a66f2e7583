//! Seeding from exported CSV files on disk.

use super::{duplicate_ids, LoadState, SeedFolders, StationSource, WqpProgram};
use crate::db::Destination;
use crate::error::{AppError, Result};
use crate::mapping::{RowInput, SAMPLE_ID_COLUMN};
use crate::row::MappedRow;
use crate::scratch::ScratchDb;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// CSV files directly inside `folder`, sorted by path.
pub fn get_files(folder: &Path) -> Result<Vec<PathBuf>> {
    let pattern = folder.join("*.csv");
    let pattern = pattern
        .to_str()
        .ok_or_else(|| AppError::Config(format!("Invalid folder path: {}", folder.display())))?;

    let mut files = glob::glob(pattern)
        .map_err(|e| AppError::Config(format!("Invalid glob pattern {}: {}", pattern, e)))?
        .filter_map(|entry| entry.ok())
        .collect::<Vec<_>>();
    files.sort();

    if files.is_empty() {
        return Err(AppError::Config(format!(
            "No csv files found in {}",
            folder.display()
        )));
    }

    Ok(files)
}

/// Mean milliseconds per item over `elapsed`.
fn average_millis(elapsed: Duration, items: usize) -> u128 {
    elapsed.as_millis() / items.max(1) as u128
}

/// Header and rows of a CSV file, rows padded to the header width.
fn read_csv(path: &Path) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let header: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let mut row: Vec<String> = record?.iter().map(str::to_string).collect();
        if row.len() < header.len() {
            row.resize(header.len(), String::new());
        }
        rows.push(row);
    }

    Ok((header, rows))
}

impl<D: Destination> WqpProgram<D> {
    /// Load every station file, then every result file, from the folders
    /// given to [`WqpProgram::with_file_location`].
    ///
    /// The destination connection is released whether or not the load
    /// succeeds.
    pub async fn seed(&mut self) -> Result<()> {
        let result = self.seed_by_file().await;
        self.state = if result.is_ok() {
            LoadState::Done
        } else {
            LoadState::Failed
        };
        self.destination.release();
        result
    }

    async fn seed_by_file(&mut self) -> Result<()> {
        let folders: SeedFolders = self.folders.clone().ok_or_else(|| {
            AppError::Config(
                "You must pass a file location if you are seeding. Did you want to update?"
                    .to_string(),
            )
        })?;

        let station_files = get_files(&folders.stations)?;
        let result_files = get_files(&folders.results)?;

        self.state = LoadState::ProcessingStations;
        for file in &station_files {
            self.seed_station_file(file).await?;
        }

        self.state = LoadState::ProcessingResults;
        for file in &result_files {
            let scratch = ScratchDb::open_in(&self.scratch_root).await?;
            let result = self.seed_result_file(&scratch, file).await;
            scratch.close().await;
            result?;
        }

        Ok(())
    }

    async fn seed_station_file(&mut self, file: &Path) -> Result<()> {
        info!("Processing stations in {}", file.display());

        let duplicates = duplicate_ids(StationSource::File(file), &self.scratch_root).await?;
        debug!("{} station ids have tagged duplicates", duplicates.len());

        let (header, rows) = read_csv(file)?;
        let header = self.station_mapping.map_header(&header);
        let stations: Vec<MappedRow> = rows
            .into_iter()
            .map(|row| self.station_mapping.map_values(&header, row))
            .collect();

        let inserted = self.seed_stations(&stations, &duplicates).await?;
        info!("Inserted {} stations from {}", inserted, file.display());
        Ok(())
    }

    async fn seed_result_file(&mut self, scratch: &ScratchDb, file: &Path) -> Result<()> {
        info!("Processing results in {}", file.display());

        let table = scratch.load_csv(file).await?;
        let sample_ids = scratch.distinct(&table, SAMPLE_ID_COLUMN).await?;
        scratch.create_index(&table, SAMPLE_ID_COLUMN).await?;

        let total = sample_ids.len();
        info!("{} sample sets in {}", total, file.display());

        let started = Instant::now();
        let mut inserted = 0;

        for (i, sample_id) in sample_ids.iter().enumerate() {
            let rows = scratch.select_where(&table, SAMPLE_ID_COLUMN, sample_id).await?;
            let Some(mapped) = self
                .result_mapping
                .map(RowInput::Many(rows), Some(&table.header))
            else {
                continue;
            };

            inserted += self.seed_results(&mapped.into_rows()).await?;

            let done = i + 1;
            if done % self.progress_interval == 0 {
                info!(
                    "Processed {}/{} sample sets, {} ms on average",
                    done,
                    total,
                    average_millis(started.elapsed(), done)
                );
            }
        }

        info!(
            "Inserted {} result rows from {} in {:.1}s",
            inserted,
            file.display(),
            started.elapsed().as_secs_f64()
        );
        Ok(())
    }
}
