use crate::error::{AppError, Result};
use chrono::NaiveDate;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Request date format expected by the search service.
const URL_DATE_FORMAT: &str = "%m-%d-%Y";

/// Which search endpoint to hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchSource {
    Result,
    Station,
}

impl SearchSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchSource::Result => "Result",
            SearchSource::Station => "Station",
        }
    }
}

/// A CSV response split into its header and data rows.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvResponse {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

pub struct Fetcher {
    client: Client,
    max_retries: u32,
}

impl Fetcher {
    pub fn new(timeout_seconds: u64, max_retries: u32) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("wqp-seeder/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            max_retries,
        })
    }

    pub async fn download(&self, url: &str) -> Result<String> {
        debug!("Downloading {}", url);

        retry_with_backoff(self.max_retries, || async {
            let response = self.client.get(url).send().await?.error_for_status()?;
            let content = response.text().await?;
            Ok(content)
        })
        .await
    }

    /// Fetch CSV from `url`. `None` when the service returns no rows.
    pub async fn get_csv(&self, url: &str) -> Result<Option<CsvResponse>> {
        let body = self.download(url).await?;
        let response = parse_csv(&body)?;

        match &response {
            Some(csv) => info!("Service returned {} rows from {}", csv.rows.len(), url),
            None => info!("Service returned no rows from {}", url),
        }

        Ok(response)
    }
}

/// Split a CSV body into header and rows. Empty bodies, and bodies holding
/// only a header, yield `None`.
pub fn parse_csv(body: &str) -> Result<Option<CsvResponse>> {
    if body.trim().is_empty() {
        return Ok(None);
    }

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(body.as_bytes());

    let header: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut values: Vec<String> = record.iter().map(str::to_string).collect();
        values.resize(header.len(), String::new());
        rows.push(values);
    }

    if rows.is_empty() {
        return Ok(None);
    }

    Ok(Some(CsvResponse { header, rows }))
}

/// Fill the `{source}`, `{lo}` and `{hi}` placeholders of a search URL.
pub fn format_url(
    template: &str,
    source: SearchSource,
    last_updated: NaiveDate,
    today: NaiveDate,
) -> String {
    template
        .replace("{source}", source.as_str())
        .replace("{lo}", &last_updated.format(URL_DATE_FORMAT).to_string())
        .replace("{hi}", &today.format(URL_DATE_FORMAT).to_string())
}

/// Retry a future with exponential backoff
async fn retry_with_backoff<F, Fut, T>(max_retries: u32, mut f: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut retries = 0;
    loop {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                retries += 1;

                if retries > max_retries {
                    return Err(e);
                }

                // Check if error is transient (retryable)
                let should_retry = match &e {
                    AppError::Http(reqwest_err) => {
                        reqwest_err.is_timeout()
                            || reqwest_err.is_connect()
                            || reqwest_err
                                .status()
                                .map(|s| s.is_server_error())
                                .unwrap_or(false)
                    }
                    AppError::Io(_) => true,
                    _ => false,
                };

                if !should_retry {
                    return Err(e);
                }

                let delay = Duration::from_secs(2u64.pow(retries.saturating_sub(1)));
                warn!(
                    "Request failed (attempt {}/{}): {}. Retrying in {:?}...",
                    retries, max_retries, e, delay
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
