use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::constants::{
    DEFAULT_AGGREGATES_FILE, DEFAULT_METRICS_FILE, DEFAULT_REPORT_FILE, DEFAULT_ROWS_FILE,
    ENV_PREFIX,
};
use crate::error::{EtlError, Result};
use crate::pipeline::processing::GroupKey;

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub output: OutputConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SourceConfig {
    pub path: Option<PathBuf>,
    pub url: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: None,
            url: None,
            timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub rows_file: String,
    pub aggregates_file: String,
    pub report_file: String,
    pub write_metrics: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output"),
            rows_file: DEFAULT_ROWS_FILE.to_string(),
            aggregates_file: DEFAULT_AGGREGATES_FILE.to_string(),
            report_file: DEFAULT_REPORT_FILE.to_string(),
            write_metrics: true,
        }
    }
}

impl OutputConfig {
    pub fn rows_path(&self) -> PathBuf {
        self.dir.join(&self.rows_file)
    }

    pub fn aggregates_path(&self) -> PathBuf {
        self.dir.join(&self.aggregates_file)
    }

    pub fn report_path(&self) -> PathBuf {
        self.dir.join(&self.report_file)
    }

    pub fn metrics_path(&self) -> PathBuf {
        self.dir.join(DEFAULT_METRICS_FILE)
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub group_by: GroupKey,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("logs"),
        }
    }
}

/// Where the raw snapshot comes from
#[derive(Debug, Clone, PartialEq)]
pub enum SourceSpec {
    File(PathBuf),
    Http { url: String, timeout: Duration },
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            EtlError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load `path` when it exists, otherwise start from defaults
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Apply `TRENDING_ETL_*` environment overrides
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(format!("{}{}", ENV_PREFIX, key)).ok())
    }

    /// Apply overrides from any key lookup. Keys are the section and field joined by `_`,
    /// upper-cased, e.g. `SOURCE_PATH` or `PIPELINE_GROUP_BY`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("SOURCE_PATH") {
            self.set_source_path(PathBuf::from(path));
        }
        if let Some(url) = lookup("SOURCE_URL") {
            self.set_source_url(url);
        }
        if let Some(timeout) = lookup("SOURCE_TIMEOUT_SECONDS") {
            self.source.timeout_seconds = timeout.trim().parse().map_err(|_| {
                EtlError::Config(format!("SOURCE_TIMEOUT_SECONDS is not a number: '{}'", timeout))
            })?;
        }
        if let Some(dir) = lookup("OUTPUT_DIR") {
            self.output.dir = PathBuf::from(dir);
        }
        if let Some(flag) = lookup("OUTPUT_WRITE_METRICS") {
            self.output.write_metrics = parse_bool(&flag).ok_or_else(|| {
                EtlError::Config(format!("OUTPUT_WRITE_METRICS is not a boolean: '{}'", flag))
            })?;
        }
        if let Some(key) = lookup("PIPELINE_GROUP_BY") {
            self.pipeline.group_by = key.parse()?;
        }
        if let Some(dir) = lookup("LOGGING_DIR") {
            self.logging.dir = PathBuf::from(dir);
        }
        Ok(())
    }

    /// Select a local file source, replacing any configured URL
    pub fn set_source_path(&mut self, path: PathBuf) {
        self.source.path = Some(path);
        self.source.url = None;
    }

    /// Select an HTTP source, replacing any configured file path
    pub fn set_source_url(&mut self, url: String) {
        self.source.url = Some(url);
        self.source.path = None;
    }

    pub fn validate(&self) -> Result<()> {
        self.source_spec()?;
        if self.source.timeout_seconds == 0 {
            return Err(EtlError::Config("source.timeout_seconds must be positive".to_string()));
        }

        let files = [
            ("output.rows_file", &self.output.rows_file),
            ("output.aggregates_file", &self.output.aggregates_file),
            ("output.report_file", &self.output.report_file),
        ];
        for (name, file) in &files {
            if file.trim().is_empty() {
                return Err(EtlError::Config(format!("{} must not be empty", name)));
            }
        }
        for (i, (name, file)) in files.iter().enumerate() {
            if let Some((other, _)) = files[i + 1..].iter().find(|(_, f)| f == file) {
                return Err(EtlError::Config(format!(
                    "{} and {} both name '{}'",
                    name, other, file
                )));
            }
        }
        Ok(())
    }

    /// Exactly one of `source.path` and `source.url` must be set
    pub fn source_spec(&self) -> Result<SourceSpec> {
        match (&self.source.path, &self.source.url) {
            (Some(path), None) => Ok(SourceSpec::File(path.clone())),
            (None, Some(url)) if url.starts_with("http://") || url.starts_with("https://") => {
                Ok(SourceSpec::Http {
                    url: url.clone(),
                    timeout: Duration::from_secs(self.source.timeout_seconds),
                })
            }
            (None, Some(url)) => Err(EtlError::Config(format!(
                "source.url must be http(s): '{}'",
                url
            ))),
            (Some(_), Some(_)) => Err(EtlError::Config(
                "set either source.path or source.url, not both".to_string(),
            )),
            (None, None) => Err(EtlError::Config(
                "no source configured (source.path or source.url)".to_string(),
            )),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
