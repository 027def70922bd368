//! Command-line front-end for the recolor service.
//!
//! ```text
//! recolor --model eccv16=models/eccv16.onnx colorize photo.jpg
//! recolor filter static/photo_eccv16.png brighten
//! recolor filters
//! ```
//!
//! Reports are printed to stdout as JSON; logs go to stderr.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use recolor::{
    Failure, FilterSpec, ModelRegistry, ModelSpec, Service, ServiceConfig, ServiceError,
};
use recolor_store::ArtifactStore;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Colorize grayscale photographs and derive filtered variants.
#[derive(Parser)]
#[command(version)]
struct Cli {
    /// Directory for raw uploads.
    #[arg(long, value_name = "DIR", default_value = recolor::config::DEFAULT_UPLOAD_DIR)]
    upload_dir: PathBuf,

    /// Directory for colorized and filtered artifacts.
    #[arg(long, value_name = "DIR", default_value = recolor::config::DEFAULT_ARTIFACT_DIR)]
    artifact_dir: PathBuf,

    /// Colorization model as NAME=PATH. Repeat for several models.
    #[arg(long = "model", value_name = "NAME=PATH")]
    models: Vec<ModelSpec>,

    /// Full configuration as JSON. Overrides the individual flags.
    #[arg(long, value_name = "JSON")]
    config_json: Option<String>,

    /// Log at debug level (`RUST_LOG` takes precedence).
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Store an image and colorize it with every configured model.
    Colorize {
        /// Image file to colorize.
        image: PathBuf,
    },
    /// Apply a filter to a stored artifact.
    Filter {
        /// Artifact name or path, e.g. `static/photo_eccv16.png`.
        artifact: String,
        /// Filter name: brighten, sharpen, false-color, tone-equalize.
        filter: String,
    },
    /// List the available filters.
    Filters,
}

fn config_from_cli(cli: &Cli) -> Result<ServiceConfig> {
    if let Some(ref json) = cli.config_json {
        return ServiceConfig::from_json(json).context("parsing --config-json");
    }
    Ok(ServiceConfig {
        upload_dir: cli.upload_dir.clone(),
        artifact_dir: cli.artifact_dir.clone(),
        models: cli.models.clone(),
    })
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("recolor={level},recolor_pipeline={level},recolor_store={level}").into()
    });
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("serializing report")?;
    println!("{json}");
    Ok(())
}

/// Print a request failure as JSON and pick the exit code.
fn report_failure(err: &ServiceError) -> Result<ExitCode> {
    let failure = Failure::from(err);
    tracing::error!(kind = %failure.kind, "{}", failure.message);
    print_json(&failure)?;
    Ok(if failure.kind.is_client_error() {
        ExitCode::from(2)
    } else {
        ExitCode::FAILURE
    })
}

fn colorize(service: &Service, image: &Path) -> Result<ExitCode> {
    let bytes = std::fs::read(image).with_context(|| format!("reading {}", image.display()))?;
    let filename = image
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("{} has no usable file name", image.display()))?;

    match service.process_upload(filename, &bytes) {
        Ok(report) => {
            print_json(&report)?;
            Ok(if report.is_complete() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Err(err) => report_failure(&err),
    }
}

fn filter(store: ArtifactStore, artifact: &str, filter: &str) -> Result<ExitCode> {
    // Filtering needs no models.
    let service = Service::new(store, recolor::ModelSet::new());
    match service.apply_filter(artifact, filter) {
        Ok(report) => {
            print_json(&report)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => report_failure(&err),
    }
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let config = config_from_cli(cli)?;
    tracing::debug!(?config, "configuration");

    match &cli.command {
        Command::Filters => {
            for spec in FilterSpec::ALL {
                println!("{:<14} (alias: {})", spec.name(), spec.legacy_name());
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Filter { artifact, filter: name } => {
            let store = ArtifactStore::open(&config.upload_dir, &config.artifact_dir)
                .context("opening artifact store")?;
            filter(store, artifact, name)
        }
        Command::Colorize { image } => match Service::start(&config, &ModelRegistry::new()) {
            Ok(service) => colorize(&service, image),
            Err(err) => report_failure(&err),
        },
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
