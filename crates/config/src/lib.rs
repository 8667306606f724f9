//! Layered configuration for s3scan.
//!
//! Values are merged from, lowest precedence first:
//!
//! 1. built-in defaults ([`Config::default`]),
//! 2. a TOML file (explicit path, or `config.toml` in the platform config
//!    directory if it exists),
//! 3. `S3SCAN_*` environment variables,
//! 4. command-line [`Overrides`].
//!
//! # Example
//!
//! ```
//! use s3scan_config::{Config, Overrides};
//!
//! let overrides = Overrides { concurrency: Some(4), ..Default::default() };
//! let config = Config::load(None, overrides).unwrap();
//! assert_eq!(config.concurrency, 4);
//! ```

pub mod error;

use crate::error::{Error, ErrorKind, Result};
use directories::ProjectDirs;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_PREFIX: &str = "S3SCAN_";
pub const DEFAULT_CONCURRENCY: usize = 10;
pub const DEFAULT_MARKER_KEY: &str = "s3scan-write-probe.txt";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_REGION: &str = "us-east-1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of buckets probed in parallel.
    pub concurrency: usize,
    /// Mirror listed objects under this directory. Absent disables mirroring.
    pub dump: Option<PathBuf>,
    /// Key of the object created by the write probe.
    pub marker_key: String,
    /// Delete the write-probe object again after a successful write.
    pub cleanup_marker: bool,
    /// Per-request timeout for probe calls, in seconds. Zero disables it.
    pub timeout_secs: u64,
    /// Region used for the initial existence lookup.
    pub region: String,
    /// Custom endpoint for S3-compatible services.
    pub endpoint: Option<String>,
    /// Send unsigned requests instead of using the credential chain.
    pub anonymous: bool,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            dump: None,
            marker_key: DEFAULT_MARKER_KEY.to_string(),
            cleanup_marker: false,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            region: DEFAULT_REGION.to_string(),
            endpoint: None,
            anonymous: false,
        }
    }
}

/// Values given explicitly on the command line. `None` means "not given",
/// so lower layers keep their value.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Overrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dump: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleanup_marker: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anonymous: Option<bool>,
}

impl Config {
    /// Load and validate configuration from every layer.
    pub fn load(file: Option<&Path>, overrides: Overrides) -> Result<Self> {
        if let Some(path) = file
            && !path.is_file()
        {
            exn::bail!(ErrorKind::Load(format!("{} is not a file", path.display())));
        }
        Self::from_figment(Self::figment(file).merge(Serialized::defaults(overrides)))
    }

    /// Defaults, config file and environment; callers merge further layers on top.
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        match file {
            Some(path) => figment = figment.merge(Toml::file(path)),
            None => {
                if let Some(path) = default_path().filter(|p| p.is_file()) {
                    tracing::debug!(path = %path.display(), "Using configuration file");
                    figment = figment.merge(Toml::file(path));
                }
            },
        }
        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Config = figment.extract().map_err(|e| Error::from(ErrorKind::Load(e.to_string())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            exn::bail!(ErrorKind::Invalid("concurrency must be at least 1".to_string()));
        }
        if self.marker_key.trim().is_empty() {
            exn::bail!(ErrorKind::Invalid("marker key must not be empty".to_string()));
        }
        if self.region.trim().is_empty() {
            exn::bail!(ErrorKind::Invalid("region must not be empty".to_string()));
        }
        if self.endpoint.as_deref().is_some_and(|e| e.trim().is_empty()) {
            exn::bail!(ErrorKind::Invalid("endpoint must not be empty when set".to_string()));
        }
        Ok(())
    }

    /// Validated concurrency; falls back to 1 if validation was skipped.
    pub fn concurrency(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.concurrency).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn timeout(&self) -> Option<Duration> {
        match self.timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

/// `config.toml` inside the platform-specific configuration directory.
pub fn default_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "s3scan").map(|dirs| dirs.config_dir().join("config.toml"))
}
