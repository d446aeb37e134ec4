use facematch_core::{ModelId, UnknownModel};
use facematch_deepface::DeepFaceConfig;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("reading config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error(transparent)]
    UnknownModel(#[from] UnknownModel),
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
}

/// Console log output style.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(()),
        }
    }
}

/// Daemon configuration.
///
/// Built from defaults, then an optional TOML file (`FACEMATCH_CONFIG`), then
/// `FACEMATCH_*` environment variables.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Listen address (default: 0.0.0.0:8000).
    pub bind: SocketAddr,
    /// JSON file holding `{"images": [...]}`, re-read on every lookup.
    pub catalog_path: PathBuf,
    /// Model used by `/match` and `/find`.
    pub model: ModelId,
    /// Root URL of the DeepFace REST server.
    pub deepface_url: String,
    /// Timeout in seconds for one comparison.
    pub compare_timeout_secs: u64,
    pub detector_backend: Option<String>,
    pub distance_metric: Option<String>,
    pub enforce_detection: bool,
    /// Query images for `/tests`.
    pub testing_dir: PathBuf,
    /// Reference images for `/tests`.
    pub faces_dir: PathBuf,
    pub log_format: LogFormat,
    /// Also write JSON log lines here, rotated daily as `<name>.YYYY-MM-DD`.
    pub log_file: Option<PathBuf>,
    /// Rotated log files kept next to `log_file`; older ones are removed.
    pub log_max_files: usize,
}

impl Default for Config {
    fn default() -> Self {
        let deepface = DeepFaceConfig::default();
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8000)),
            catalog_path: PathBuf::from("files.json"),
            model: ModelId::default(),
            deepface_url: deepface.base_url,
            compare_timeout_secs: deepface.timeout.as_secs(),
            detector_backend: None,
            distance_metric: None,
            enforce_detection: deepface.enforce_detection,
            testing_dir: PathBuf::from("testing"),
            faces_dir: PathBuf::from("faces"),
            log_format: LogFormat::Text,
            log_file: None,
            log_max_files: 7,
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let base = match std::env::var_os("FACEMATCH_CONFIG") {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        base.with_overrides(|key| std::env::var(key).ok())
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `FACEMATCH_*` overrides read through `lookup`.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(v) = parsed(&lookup, "FACEMATCH_BIND")? {
            self.bind = v;
        }
        if let Some(v) = lookup("FACEMATCH_CATALOG_PATH") {
            self.catalog_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("FACEMATCH_MODEL") {
            self.model = v.parse()?;
        }
        if let Some(v) = lookup("FACEMATCH_DEEPFACE_URL") {
            self.deepface_url = v;
        }
        if let Some(v) = parsed(&lookup, "FACEMATCH_COMPARE_TIMEOUT_SECS")? {
            self.compare_timeout_secs = v;
        }
        if let Some(v) = lookup("FACEMATCH_DETECTOR_BACKEND") {
            self.detector_backend = non_empty(v);
        }
        if let Some(v) = lookup("FACEMATCH_DISTANCE_METRIC") {
            self.distance_metric = non_empty(v);
        }
        if let Some(v) = lookup("FACEMATCH_ENFORCE_DETECTION") {
            self.enforce_detection = v != "0" && !v.eq_ignore_ascii_case("false");
        }
        if let Some(v) = lookup("FACEMATCH_TESTING_DIR") {
            self.testing_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("FACEMATCH_FACES_DIR") {
            self.faces_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("FACEMATCH_LOG_FORMAT") {
            self.log_format = v.parse().map_err(|_| ConfigError::InvalidValue {
                key: "FACEMATCH_LOG_FORMAT",
                value: v.clone(),
            })?;
        }
        if let Some(v) = lookup("FACEMATCH_LOG_FILE") {
            self.log_file = non_empty(v).map(PathBuf::from);
        }
        if let Some(v) = parsed(&lookup, "FACEMATCH_LOG_MAX_FILES")? {
            self.log_max_files = v;
        }
        if self.log_max_files == 0 {
            return Err(ConfigError::InvalidValue {
                key: "FACEMATCH_LOG_MAX_FILES",
                value: "0".to_string(),
            });
        }
        Ok(self)
    }

    /// Settings for the DeepFace comparator.
    pub fn deepface(&self) -> DeepFaceConfig {
        DeepFaceConfig {
            base_url: self.deepface_url.clone(),
            timeout: Duration::from_secs(self.compare_timeout_secs),
            detector_backend: self.detector_backend.clone(),
            distance_metric: self.distance_metric.clone(),
            enforce_detection: self.enforce_detection,
        }
    }
}

fn parsed<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        None => Ok(None),
        Some(v) => v
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value: v }),
    }
}

fn non_empty(v: String) -> Option<String> {
    if v.trim().is_empty() {
        None
    } else {
        Some(v)
    }
}
