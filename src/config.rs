use crate::error::{AppError, Result};
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};

pub const DEFAULT_URL_TEMPLATE: &str = "https://www.waterqualitydata.us/{source}/search?\
sampleMedia=Water&startDateLo={lo}&startDateHi={hi}&bBox=-115%2C35.5%2C-108%2C42.5&mimeType=csv";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub seed: SeedConfig,
    #[serde(default)]
    pub scheduler: Option<SchedulerConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    #[serde(default = "default_db_port", deserialize_with = "deserialize_port")]
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_port() -> u16 {
    5432
}

fn default_max_connections() -> u32 {
    5
}

/// Custom deserializer that handles port as both number and string
///
/// Accepts:
/// - `port: 5432` (number)
/// - `port: "5432"` (string that parses to number)
/// - `port: ${DB_PORT}` (env var substituted to either)
fn deserialize_port<'de, D>(deserializer: D) -> std::result::Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PortValue {
        Number(u16),
        String(String),
    }

    match PortValue::deserialize(deserializer)? {
        PortValue::Number(n) => Ok(n),
        PortValue::String(s) => s
            .parse::<u16>()
            .map_err(|_| serde::de::Error::custom(format!("Invalid port number: '{}'", s))),
    }
}

impl DatabaseConfig {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.name
        )
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    /// Search URL with `{source}`, `{lo}` and `{hi}` placeholders.
    #[serde(default = "default_url_template")]
    pub url_template: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url_template: default_url_template(),
            timeout_seconds: default_timeout_seconds(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_url_template() -> String {
    DEFAULT_URL_TEMPLATE.to_string()
}

fn default_timeout_seconds() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct SeedConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Log progress every this many sample sets.
    #[serde(default = "default_progress_interval")]
    pub progress_interval: usize,
    #[serde(default = "default_data_source")]
    pub data_source: String,
    /// Parent directory for per-file scratch databases. Defaults to the
    /// system temp directory.
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            progress_interval: default_progress_interval(),
            data_source: default_data_source(),
            scratch_dir: None,
        }
    }
}

fn default_batch_size() -> usize {
    5000
}

fn default_progress_interval() -> usize {
    5000
}

fn default_data_source() -> String {
    "WQP".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    pub interval_minutes: u64,
    #[serde(default = "default_initial_delay")]
    pub initial_delay_seconds: u64,
}

fn default_initial_delay() -> u64 {
    10
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| AppError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        // Substitute environment variables
        let expanded = expand_env_vars(content)?;

        let config: Config = serde_yaml::from_str(&expanded)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    ///
    /// Checks for:
    /// - Unexpanded environment variables
    /// - Valid port ranges
    /// - Non-empty required fields
    /// - A usable search URL template
    /// - Positive batch sizes and intervals
    fn validate(&self) -> Result<()> {
        let fields_to_check = [
            ("DB_HOST", &self.database.host),
            ("DB_NAME", &self.database.name),
            ("DB_USER", &self.database.user),
            ("DB_PASSWORD", &self.database.password),
        ];

        for (field_name, value) in &fields_to_check {
            if value.contains("${") {
                return Err(AppError::Config(format!(
                    "{} environment variable is not set. \
                     Please set it or create a .env file. \
                     See .env.example for required variables.",
                    field_name
                )));
            }
        }

        if self.database.host.is_empty() {
            return Err(AppError::Config(
                "Database host cannot be empty".to_string(),
            ));
        }

        if self.database.name.is_empty() {
            return Err(AppError::Config(
                "Database name cannot be empty".to_string(),
            ));
        }

        if self.database.user.is_empty() {
            return Err(AppError::Config(
                "Database user cannot be empty".to_string(),
            ));
        }

        if self.database.port == 0 {
            return Err(AppError::Config("Database port cannot be 0".to_string()));
        }

        if self.database.max_connections == 0 {
            return Err(AppError::Config(
                "Database max_connections must be at least 1".to_string(),
            ));
        }

        if self.database.max_connections > 100 {
            return Err(AppError::Config(format!(
                "Database max_connections {} seems too high, maximum recommended is 100",
                self.database.max_connections
            )));
        }

        for placeholder in ["{source}", "{lo}", "{hi}"] {
            if !self.source.url_template.contains(placeholder) {
                return Err(AppError::Config(format!(
                    "Source url_template is missing the {} placeholder",
                    placeholder
                )));
            }
        }

        let sample_url = self
            .source
            .url_template
            .replace("{source}", "Result")
            .replace("{lo}", "01-01-2000")
            .replace("{hi}", "01-01-2000");
        match url::Url::parse(&sample_url) {
            Ok(parsed) if parsed.scheme() == "https" || parsed.scheme() == "http" => {}
            Ok(parsed) => {
                return Err(AppError::Config(format!(
                    "Source url_template must use HTTP or HTTPS, got: {}",
                    parsed.scheme()
                )));
            }
            Err(e) => {
                return Err(AppError::Config(format!(
                    "Invalid source url_template '{}': {}",
                    self.source.url_template, e
                )));
            }
        }

        if self.seed.batch_size == 0 {
            return Err(AppError::Config(
                "Seed batch_size must be greater than 0".to_string(),
            ));
        }

        if self.seed.progress_interval == 0 {
            return Err(AppError::Config(
                "Seed progress_interval must be greater than 0".to_string(),
            ));
        }

        if let Some(dir) = &self.seed.scratch_dir {
            if !dir.is_dir() {
                return Err(AppError::Config(format!(
                    "Seed scratch_dir {} is not a directory",
                    dir.display()
                )));
            }
        }

        if let Some(scheduler) = &self.scheduler {
            if scheduler.interval_minutes == 0 {
                return Err(AppError::Config(
                    "Scheduler interval_minutes must be greater than 0".to_string(),
                ));
            }

            if scheduler.interval_minutes < 60 {
                tracing::warn!(
                    "Scheduler interval of {} minutes is very short for daily source updates",
                    scheduler.interval_minutes
                );
            }
        }

        Ok(())
    }
}

fn expand_env_vars(content: &str) -> Result<String> {
    let mut result = content.to_string();
    let re = regex_lite::Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| AppError::Config(format!("Invalid placeholder pattern: {}", e)))?;

    let mut missing_vars = Vec::new();

    for cap in re.captures_iter(content) {
        let var_name = &cap[1];
        match std::env::var(var_name) {
            Ok(value) => {
                result = result.replace(&cap[0], &value);
            }
            Err(_) => {
                missing_vars.push(var_name.to_string());
            }
        }
    }

    if !missing_vars.is_empty() {
        return Err(AppError::Config(format!(
            "Missing required environment variable{}: {}\n\n\
             To fix this:\n\
             1. Create a .env file in the project root (copy .env.example)\n\
             2. Set the missing variable{}: export {}=<value>\n\
             3. Or set {} in your environment before running",
            if missing_vars.len() > 1 { "s" } else { "" },
            missing_vars.join(", "),
            if missing_vars.len() > 1 { "s" } else { "" },
            missing_vars[0],
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}
