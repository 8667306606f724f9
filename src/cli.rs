use clap::{Parser, ValueEnum};
use s3scan_config::Overrides;
use s3scan_storage::Format;
use std::path::PathBuf;

/// Audit S3 buckets for public access misconfiguration.
///
/// Reads one bucket per line (a bare name, `s3://name`, a path-style or a
/// virtual-hosted URL) and reports whether each exists, who the ACL opens
/// it to, and whether objects can be written and listed.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Args {
    /// File with one bucket reference per line, or `-` for piped stdin
    #[arg(short, long, value_name = "PATH")]
    pub input: PathBuf,

    /// Number of buckets probed in parallel
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    /// Download listed objects into this directory
    #[arg(short, long, value_name = "DIR")]
    pub dump: Option<PathBuf>,

    /// Configuration file (defaults to config.toml in the platform config directory)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Key of the object uploaded by the write probe
    #[arg(long)]
    pub marker_key: Option<String>,

    /// Delete the write-probe object after a successful write
    #[arg(long)]
    pub cleanup_marker: bool,

    /// Per-request timeout in seconds, 0 to disable
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Region used to look buckets up
    #[arg(long)]
    pub region: Option<String>,

    /// Custom endpoint for S3-compatible services
    #[arg(long, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Send every request unsigned (bucket lookups are always unsigned)
    #[arg(long)]
    pub anonymous: bool,

    /// Print every listed object
    #[arg(short, long)]
    pub list_objects: bool,

    /// How buckets are labelled in the report: name, uri, path or vhost
    #[arg(short, long, value_parser = parse_format, default_value = "name")]
    pub format: Format,

    /// Disable colored log output
    #[arg(short, long)]
    pub monochrome: bool,

    /// Log level, ignored when RUST_LOG is set
    #[arg(short, long, value_enum, default_value_t = Verbosity::Warning)]
    pub verbosity: Verbosity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Verbosity {
    Debug,
    Info,
    Warning,
    Error,
    Silent,
}
impl Verbosity {
    /// Default `EnvFilter` directive.
    pub fn directive(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warn",
            Self::Error => "error",
            Self::Silent => "off",
        }
    }
}

fn parse_format(value: &str) -> Result<Format, String> {
    value.parse().map_err(|err: s3scan_storage::error::Error| (*err).to_string())
}

impl Args {
    /// Only flags that were actually given override lower configuration layers.
    pub fn overrides(&self) -> Overrides {
        Overrides {
            concurrency: self.concurrency,
            dump: self.dump.clone(),
            marker_key: self.marker_key.clone(),
            cleanup_marker: self.cleanup_marker.then_some(true),
            timeout_secs: self.timeout,
            region: self.region.clone(),
            endpoint: self.endpoint.clone(),
            anonymous: self.anonymous.then_some(true),
        }
    }
}
