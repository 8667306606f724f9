mod cli;
mod error;
mod report;

use crate::cli::Args;
use crate::error::{ErrorKind, Result};
use crate::report::ConsoleReporter;
use clap::Parser;
use exn::ResultExt;
use s3scan_config::Config;
use s3scan_scanner::{InputSource, ProbeOptions, ScanOptions, ScanSummary, scan_source};
use s3scan_storage::LocalTree;
use s3scan_storage::client::{S3ClientFactory, S3Settings};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args);
    match run(args).await {
        Ok(summary) => {
            tracing::info!(processed = summary.processed, found = summary.found, "Done");
            ExitCode::SUCCESS
        },
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::FAILURE
        },
    }
}

fn init_logging(args: &Args) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.verbosity.directive()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(!args.monochrome)
        .compact()
        .init();
}

async fn run(args: Args) -> Result<ScanSummary> {
    let config = Config::load(args.config.as_deref(), args.overrides()).or_raise(|| ErrorKind::Config)?;
    tracing::debug!(?config, "Loaded configuration");

    let dump = match &config.dump {
        Some(path) => Some(LocalTree::new(path).or_raise(|| ErrorKind::Dump)?),
        None => None,
    };
    let options = ScanOptions {
        concurrency: config.concurrency(),
        probe: ProbeOptions {
            marker_key: config.marker_key.clone(),
            cleanup_marker: config.cleanup_marker,
            timeout: config.timeout(),
        },
        dump,
    };
    let factory = S3ClientFactory::load(S3Settings {
        region: config.region.clone(),
        endpoint: config.endpoint.clone(),
        anonymous: config.anonymous,
    })
    .await;

    let source = InputSource::from_arg(&args.input);
    let reporter = ConsoleReporter::new(std::io::stdout(), args.list_objects, args.format);
    scan_source(&source, &factory, reporter, options).await.or_raise(|| ErrorKind::Scan)
}
