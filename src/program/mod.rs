//! The water quality portal program: full load from CSV exports and
//! incremental update from the search service.

pub mod full_load;
pub mod transform;
pub mod update;

pub use transform::Transformer;

use crate::config::Config;
use crate::db::Destination;
use crate::error::{AppError, Result};
use crate::fetcher::Fetcher;
use crate::identifier;
use crate::mapping::{self, FieldMapping, STATION_ID_COLUMN};
use crate::row::MappedRow;
use crate::schema::InsertTemplate;
use crate::scratch::ScratchDb;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// `LIKE` pattern for tagged station ids.
const TAGGED_PATTERN: &str = r"%\_WQX-%";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    ProcessingStations,
    ProcessingResults,
    Done,
    Failed,
}

/// `<root>/<data source>/{Stations,Results}`.
#[derive(Debug, Clone)]
pub struct SeedFolders {
    pub stations: PathBuf,
    pub results: PathBuf,
}

impl SeedFolders {
    pub fn locate(file_location: &Path, data_source: &str) -> Result<Self> {
        let parent = file_location.join(data_source);
        if !parent.is_dir() {
            return Err(AppError::Config(format!(
                "Pass in a location to the parent folder that contains {}. {}",
                data_source,
                parent.display()
            )));
        }

        let stations = parent.join("Stations");
        let results = parent.join("Results");
        for folder in [&stations, &results] {
            if !folder.is_dir() {
                return Err(AppError::Config(format!(
                    "{} folder is missing the {} child folder containing csv files.",
                    data_source,
                    folder.display()
                )));
            }
        }

        Ok(Self { stations, results })
    }
}

/// A bulk station source for [`duplicate_ids`].
pub enum StationSource<'a> {
    File(&'a Path),
    Rows(&'a [MappedRow]),
}

/// Canonical ids of tagged stations in `source`. Files are filtered through
/// a scratch database created under `scratch_root`.
pub async fn duplicate_ids(
    source: StationSource<'_>,
    scratch_root: &Path,
) -> Result<HashSet<String>> {
    match source {
        StationSource::Rows(rows) => Ok(identifier::duplicate_ids_in_rows(rows)),
        StationSource::File(path) => {
            let scratch = ScratchDb::open_in(scratch_root).await?;
            let result = async {
                let table = scratch.load_csv(path).await?;
                let tagged = scratch
                    .select_like(&table, STATION_ID_COLUMN, TAGGED_PATTERN)
                    .await?;
                Ok::<_, AppError>(identifier::duplicate_ids(tagged.iter().map(String::as_str)))
            }
            .await;
            scratch.close().await;
            result
        }
    }
}

pub struct WqpProgram<D: Destination> {
    destination: D,
    transformer: Transformer,
    fetcher: Fetcher,
    station_mapping: FieldMapping,
    result_mapping: FieldMapping,
    station_template: InsertTemplate,
    result_template: InsertTemplate,
    url_template: String,
    progress_interval: usize,
    scratch_root: PathBuf,
    folders: Option<SeedFolders>,
    state: LoadState,
}

impl<D: Destination> WqpProgram<D> {
    /// A program for updates. Use [`WqpProgram::with_file_location`] to seed.
    pub fn new(destination: D, config: &Config) -> Result<Self> {
        let transformer = Transformer::new(&config.seed.data_source);
        let station_template = transformer.station_schema().insert_template();
        let result_template = transformer.result_schema().insert_template();

        Ok(Self {
            destination,
            transformer,
            fetcher: Fetcher::new(config.source.timeout_seconds, config.source.max_retries)?,
            station_mapping: mapping::station_mapping(),
            result_mapping: mapping::result_mapping(),
            station_template,
            result_template,
            url_template: config.source.url_template.clone(),
            progress_interval: config.seed.progress_interval.max(1),
            scratch_root: config
                .seed
                .scratch_dir
                .clone()
                .unwrap_or_else(std::env::temp_dir),
            folders: None,
            state: LoadState::Idle,
        })
    }

    /// Point the program at `<file_location>/<data source>/`. Fails when the
    /// folder or its `Stations`/`Results` children are missing.
    pub fn with_file_location(mut self, file_location: &Path, data_source: &str) -> Result<Self> {
        self.folders = Some(SeedFolders::locate(file_location, data_source)?);
        Ok(self)
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn destination(&self) -> &D {
        &self.destination
    }

    pub fn into_destination(self) -> D {
        self.destination
    }

    /// Transform and insert station rows, skipping bare ids that have a
    /// tagged sibling in `duplicates`.
    async fn seed_stations(
        &mut self,
        rows: &[MappedRow],
        duplicates: &HashSet<String>,
    ) -> Result<usize> {
        let stations: Vec<_> = rows
            .iter()
            .filter(|row| {
                let id = row.get("StationId").unwrap_or_default();
                let skip = identifier::is_bare_duplicate(id, duplicates);
                if skip {
                    debug!("Skipping {} in favour of its tagged duplicate", id);
                }
                !skip
            })
            .map(|row| self.transformer.station_row(row))
            .collect();

        self.destination
            .insert_rows(&stations, &self.station_template)
            .await
    }

    /// Transform one sample id's rows, derive its charge balance, insert.
    async fn seed_results(&mut self, samples: &[MappedRow]) -> Result<usize> {
        let rows = self.transformer.result_rows(samples);
        self.destination
            .insert_rows(&rows, &self.result_template)
            .await
    }
}
