//! yolo-ingest: import YOLO object-detection datasets.
//!
//! An uploaded zip archive is unpacked into scratch space, its images and
//! label files are parsed, every file is uploaded to an object store, and
//! the dataset is recorded in a document catalog with one row per image.
//!
//! # Modules
//!
//! - [`ingest`]: The import pipeline ([`ingest::Importer`])
//! - [`stage`]: Archive staging and scratch cleanup
//! - [`yolo`]: YOLO directory and label parsing
//! - [`publish`]: Object-store uploads and signed access URLs
//! - [`catalog`]: Dataset and image documents
//! - [`model`]: Types shared by every stage
//! - [`config`]: Layered runtime configuration
//! - [`error`]: Error types for yolo-ingest operations

pub mod catalog;
pub mod config;
pub mod error;
pub mod ingest;
pub mod model;
pub mod publish;
pub mod stage;
pub mod yolo;

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use catalog::CatalogStore;
use config::{ConfigLayer, IngestConfig};
use ingest::{Importer, ParseSummary};
use model::{Dataset, DatasetId, ImageRecord, StorageLocator};
use publish::{ArtifactPublisher, ObjectStoreError};

pub use error::IngestError;

/// The yolo-ingest CLI application.
#[derive(Parser)]
#[command(name = "yolo-ingest")]
#[command(version, author, about)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Settings shared by every subcommand. Flags beat environment variables,
/// which beat the config file.
#[derive(clap::Args)]
struct ConfigArgs {
    /// YAML config file.
    #[arg(long, global = true, env = "YOLO_INGEST_CONFIG")]
    config: Option<PathBuf>,

    /// Object-store bucket that receives uploads.
    #[arg(long, global = true, env = "YOLO_INGEST_BUCKET")]
    bucket: Option<String>,

    /// Directory for staged archives and working directories.
    #[arg(long, global = true, env = "YOLO_INGEST_SCRATCH_DIR")]
    scratch_dir: Option<PathBuf>,

    /// Root directory of the filesystem object store.
    #[arg(long, global = true, env = "YOLO_INGEST_STORE_ROOT")]
    store_root: Option<PathBuf>,

    /// Root directory of the JSON catalog.
    #[arg(long, global = true, env = "YOLO_INGEST_CATALOG_ROOT")]
    catalog_root: Option<PathBuf>,

    /// Base URL that signed access URLs point at.
    #[arg(long, global = true, env = "YOLO_INGEST_PUBLIC_URL")]
    public_url: Option<String>,

    /// Secret used to sign access URLs.
    #[arg(long, global = true, env = "YOLO_INGEST_SIGNING_KEY", hide_env_values = true)]
    signing_key: Option<String>,

    /// Default lifetime of signed URLs, in minutes.
    #[arg(long, global = true, env = "YOLO_INGEST_URL_TTL_MINUTES")]
    url_ttl_minutes: Option<u64>,
}

impl ConfigArgs {
    fn load(self) -> Result<IngestConfig, IngestError> {
        let overrides = ConfigLayer {
            bucket: self.bucket,
            scratch_dir: self.scratch_dir,
            store_root: self.store_root,
            catalog_root: self.catalog_root,
            public_url: self.public_url,
            signing_key: self.signing_key,
            url_ttl_minutes: self.url_ttl_minutes,
        };
        IngestConfig::load(self.config.as_deref(), overrides)
    }
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Import a zipped YOLO dataset into the object store and catalog.
    Import(ImportArgs),
    /// Parse an extracted YOLO directory without uploading anything.
    Parse(ParseArgs),
    /// Print a signed, time-limited URL for a stored object.
    Sign(SignArgs),
    /// Print a cataloged dataset and its image rows as JSON.
    Show(ShowArgs),
}

#[derive(clap::Args)]
struct ImportArgs {
    /// Zip archive to import.
    archive: PathBuf,

    /// Upload file name to record instead of the archive's own name.
    #[arg(long)]
    name: Option<String>,

    /// Output format for the summary ('text' or 'json').
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    output: String,
}

#[derive(clap::Args)]
struct ParseArgs {
    /// Extracted dataset directory.
    dir: PathBuf,

    /// Output format ('text' for a summary, 'json' for every parsed image).
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    output: String,
}

#[derive(clap::Args)]
struct SignArgs {
    /// Object locator, e.g. objectstore://datasets/datasets/<id>/images/a.jpg
    locator: String,

    /// URL lifetime in minutes (defaults to the configured lifetime).
    #[arg(long)]
    ttl_minutes: Option<u64>,
}

#[derive(clap::Args)]
struct ShowArgs {
    /// Dataset id printed by `import`.
    dataset_id: String,
}

/// Run the yolo-ingest CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), IngestError> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Some(Commands::Import(args)) => run_import(cli.config.load()?, args),
        Some(Commands::Parse(args)) => run_parse(args),
        Some(Commands::Sign(args)) => run_sign(cli.config.load()?, args),
        Some(Commands::Show(args)) => run_show(cli.config.load()?, args),
        None => {
            println!("yolo-ingest {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Import YOLO object-detection datasets.");
            println!();
            println!("Run 'yolo-ingest --help' for usage information.");
            Ok(())
        }
    }
}

/// Logs go to stderr so stdout stays parseable. `RUST_LOG` overrides the
/// default `info` level.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run_import(config: IngestConfig, args: ImportArgs) -> Result<(), IngestError> {
    let filename = match args.name {
        Some(name) => name,
        None => args
            .archive
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default(),
    };
    stage::check_archive_name(&filename)?;

    let file = File::open(&args.archive).map_err(|source| IngestError::InvalidInput {
        message: format!("cannot open {}: {source}", args.archive.display()),
    })?;

    let importer = Importer::new(
        config.open_store()?,
        config.open_catalog()?,
        config.scratch_dir.clone(),
    );
    let summary = importer.import_dataset(&mut BufReader::new(file), &filename)?;

    match args.output.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&summary)?),
        _ => print!("{summary}"),
    }
    Ok(())
}

fn run_parse(args: ParseArgs) -> Result<(), IngestError> {
    let parsed = yolo::parse_yolo_dir(&args.dir)?;

    match args.output.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&parsed)?),
        _ => print!("{}", ParseSummary::from(&parsed)),
    }
    Ok(())
}

fn run_sign(config: IngestConfig, args: SignArgs) -> Result<(), IngestError> {
    let locator: StorageLocator = args.locator.parse().map_err(|source| IngestError::Signing {
        locator: args.locator.clone(),
        source: ObjectStoreError::Locator(source),
    })?;
    let ttl = match args.ttl_minutes {
        Some(minutes) => Duration::from_secs(minutes.saturating_mul(60)),
        None => config.url_ttl,
    };

    let store = config.open_store_with(config.signer()?)?;
    let url = ArtifactPublisher::new(&store).signed_access_url(&locator, ttl)?;
    println!("{url}");
    Ok(())
}

fn run_show(config: IngestConfig, args: ShowArgs) -> Result<(), IngestError> {
    let id: DatasetId = args
        .dataset_id
        .parse()
        .map_err(|source| IngestError::InvalidInput {
            message: format!("'{}' is not a dataset id: {source}", args.dataset_id),
        })?;

    let catalog = config.open_catalog()?;
    let read_error = |source: catalog::CatalogError| IngestError::Catalog {
        operation: "read",
        source,
    };
    let dataset = catalog
        .dataset(&id)
        .map_err(read_error)?
        .ok_or_else(|| IngestError::InvalidInput {
            message: format!("no dataset with id {id}"),
        })?;
    let images = catalog.images_for_dataset(&id).map_err(read_error)?;

    let view = DatasetView {
        dataset: &dataset,
        images: &images,
    };
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}

#[derive(Serialize)]
struct DatasetView<'a> {
    dataset: &'a Dataset,
    images: &'a [ImageRecord],
}
