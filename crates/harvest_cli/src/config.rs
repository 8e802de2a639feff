use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use harvest_core::{Credential, HarvestInput, DEFAULT_MAX_ATTEMPTS, MAX_PAGE_SIZE};
use harvest_engine::{
    ExportFormat, FetchSettings, TransportSettings, DEFAULT_API_BASE,
    DEFAULT_RATE_LIMIT_WAIT,
};
use log::LevelFilter;
use serde::{Deserialize, Serialize};

use crate::logging::LogDestination;

/// Looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "msgharvest.ron";

/// Settings read from a RON file. The access credential is never stored here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api_base: String,
    pub delay_ms: i64,
    pub page_size: u32,
    pub max_attempts: u32,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    /// Wait applied to a rate-limited response that suggests none.
    pub rate_limit_wait_ms: u64,
    pub output_dir: PathBuf,
    pub format: ExportFormat,
    pub log_level: String,
    pub log_file: PathBuf,
    pub log_destination: LogDestination,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            delay_ms: 1000,
            page_size: u32::from(MAX_PAGE_SIZE),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
            rate_limit_wait_ms: DEFAULT_RATE_LIMIT_WAIT.as_millis() as u64,
            output_dir: PathBuf::from("./output"),
            format: ExportFormat::Text,
            log_level: "info".to_string(),
            log_file: PathBuf::from("./msgharvest.log"),
            log_destination: LogDestination::Terminal,
        }
    }
}

/// Values given on the command line; each one replaces the file's value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub api_base: Option<String>,
    pub delay_ms: Option<i64>,
    pub page_size: Option<u32>,
    pub max_attempts: Option<u32>,
    pub output_dir: Option<PathBuf>,
    pub format: Option<ExportFormat>,
    pub log_level: Option<String>,
    pub log_destination: Option<LogDestination>,
}

impl AppConfig {
    /// Reads `explicit`, or `./msgharvest.ron` when it exists, or falls back
    /// to defaults. An explicit path that cannot be read is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load_from(path),
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.is_file() {
                    Self::load_from(path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        ron::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(api_base) = overrides.api_base {
            self.api_base = api_base;
        }
        if let Some(delay_ms) = overrides.delay_ms {
            self.delay_ms = delay_ms;
        }
        if let Some(page_size) = overrides.page_size {
            self.page_size = page_size;
        }
        if let Some(max_attempts) = overrides.max_attempts {
            self.max_attempts = max_attempts;
        }
        if let Some(output_dir) = overrides.output_dir {
            self.output_dir = output_dir;
        }
        if let Some(format) = overrides.format {
            self.format = format;
        }
        if let Some(log_level) = overrides.log_level {
            self.log_level = log_level;
        }
        if let Some(destination) = overrides.log_destination {
            self.log_destination = destination;
        }
    }

    pub fn level_filter(&self) -> Result<LevelFilter> {
        harvest_logging::parse_level(&self.log_level)
            .with_context(|| format!("unknown log level {:?}", self.log_level))
    }

    pub fn transport_settings(&self) -> TransportSettings {
        TransportSettings {
            api_base: self.api_base.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            ..TransportSettings::default()
        }
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            default_rate_limit_wait: Duration::from_millis(self.rate_limit_wait_ms),
        }
    }

    /// Starts a harvest input with the paging knobs of this config.
    pub fn harvest_input(
        &self,
        channel_id: Option<String>,
        credential: Option<Credential>,
        start_id: Option<String>,
        end_id: Option<String>,
    ) -> HarvestInput {
        HarvestInput {
            channel_id,
            credential,
            start_id,
            end_id,
            delay_ms: self.delay_ms,
            page_size: self.page_size,
            max_attempts: self.max_attempts,
        }
    }
}
