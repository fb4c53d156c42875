//! tsload CLI
//!
//! Loads a CSV file into an InfluxDB 1.x compatible server.
//!
//! ## Usage
//!
//! ```bash
//! # Import with defaults (http://localhost:8086, database "test", measurement "data")
//! tsload data.csv
//!
//! # Tags, a custom timestamp layout and a target database
//! tsload data.csv -d metrics -m cpu --tags host,region --timestamp-format "02/01/2006 15:04"
//!
//! # Settings from a YAML file, with flags taking precedence
//! tsload data.csv --config tsload.yml --batch-size 1000
//!
//! # Print the points as JSON instead of sending them
//! tsload data.csv --dry-run
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tsload_importer::{
    ensure_database, open_csv, DryRunStore, HttpStoreClient, ImportConfig, IngestSummary,
    Ingestor, StoreClient,
};

#[derive(Parser)]
#[command(name = "tsload")]
#[command(author, version, about = "Load CSV files into an InfluxDB compatible time series database")]
struct Cli {
    /// Path to the CSV file
    file: PathBuf,

    /// YAML config file; flags override its values
    #[arg(short, long, env = "TSLOAD_CONFIG")]
    config: Option<PathBuf>,

    /// Server URL
    #[arg(short, long, env = "TSLOAD_SERVER")]
    server: Option<String>,

    /// Target database
    #[arg(short, long, env = "TSLOAD_DATABASE")]
    database: Option<String>,

    #[arg(short, long, env = "TSLOAD_USERNAME")]
    username: Option<String>,

    #[arg(short, long, env = "TSLOAD_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Measurement name for the imported data
    #[arg(short, long, env = "TSLOAD_MEASUREMENT")]
    measurement: Option<String>,

    /// Points per write request
    #[arg(short, long, env = "TSLOAD_BATCH_SIZE")]
    batch_size: Option<usize>,

    /// Columns to treat as tags (comma-separated)
    #[arg(long, env = "TSLOAD_TAGS")]
    tags: Option<String>,

    /// Column name containing timestamps
    #[arg(short = 't', long, env = "TSLOAD_TIMESTAMP_COLUMN")]
    timestamp_column: Option<String>,

    /// Timestamp layout written as the reference time 2006-01-02 15:04:05, or "unix"
    #[arg(short = 'f', long, env = "TSLOAD_TIMESTAMP_FORMAT")]
    timestamp_format: Option<String>,

    /// Fail instead of creating a missing database
    #[arg(long, env = "TSLOAD_NO_AUTO_CREATE")]
    no_auto_create: bool,

    /// Store integer-looking values as floats
    #[arg(long, env = "TSLOAD_FORCE_FLOAT")]
    force_float: bool,

    /// Store every field value as a string
    #[arg(long, env = "TSLOAD_FORCE_STRING")]
    force_string: bool,

    /// Treat the text "null" as a missing value
    #[arg(long, env = "TSLOAD_TREAT_NULL")]
    treat_null: bool,

    /// Write attempts per batch before giving up (0 = retry forever)
    #[arg(long, env = "TSLOAD_MAX_WRITE_ATTEMPTS")]
    max_write_attempts: Option<u32>,

    /// HTTP request timeout in seconds
    #[arg(long, env = "TSLOAD_HTTP_TIMEOUT")]
    http_timeout: Option<u64>,

    /// Log the stored count of the first field after every batch
    #[arg(long, env = "TSLOAD_REPORT_COUNT")]
    report_count: bool,

    /// Read the file and print points as JSON lines instead of sending them
    #[arg(long)]
    dry_run: bool,
}

impl Cli {
    /// Config file (or defaults) with every given flag applied on top
    fn import_config(&self) -> Result<ImportConfig> {
        let mut config = match &self.config {
            Some(path) => ImportConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => ImportConfig::default(),
        };

        if let Some(server) = &self.server {
            config.server_address = server.clone();
        }
        if let Some(database) = &self.database {
            config.database_name = database.clone();
        }
        if self.username.is_some() {
            config.username = self.username.clone();
        }
        if self.password.is_some() {
            config.password = self.password.clone();
        }
        if let Some(measurement) = &self.measurement {
            config.measurement_name = measurement.clone();
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(tags) = &self.tags {
            config.tag_columns = tags.clone();
        }
        if let Some(column) = &self.timestamp_column {
            config.timestamp_column = column.clone();
        }
        if let Some(format) = &self.timestamp_format {
            config.timestamp_format = format.clone();
        }
        if let Some(attempts) = self.max_write_attempts {
            config.max_write_attempts = attempts;
        }
        if let Some(timeout) = self.http_timeout {
            config.http_timeout_seconds = timeout;
        }
        config.disable_auto_create_database |= self.no_auto_create;
        config.force_float |= self.force_float;
        config.force_string |= self.force_string;
        config.treat_null_token_as_absent |= self.treat_null;
        config.report_count |= self.report_count;

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.import_config()?;

    if !cli.file.exists() {
        anyhow::bail!("File not found: {}", cli.file.display());
    }

    info!("Reading CSV file: {}", cli.file.display());
    info!("Configuration:");
    info!("  Server: {}", config.server_address);
    info!("  Database: {}", config.database_name);
    info!("  Measurement: {}", config.measurement_name);
    info!("  Timestamp column: {} ({})", config.timestamp_column, config.timestamp_format);
    info!("  Tag columns: {:?}", config.tag_names());
    info!("  Batch size: {}", config.batch_size);

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping import");
            ctrl_c.cancel();
        }
    });

    if cli.dry_run {
        let store = DryRunStore::new(&config.database_name);
        return import(&cli, &config, store, cancel, false).await;
    }

    info!("Connecting to server: {}", config.server_address);
    let client =
        HttpStoreClient::new(&config.store_config()).context("Failed to create client")?;
    let created = ensure_database(
        &client,
        &config.database_name,
        !config.disable_auto_create_database,
    )
    .await
    .context("Failed to prepare database")?;
    if created {
        info!("Created database '{}'", config.database_name);
    }

    import(&cli, &config, client, cancel, true).await
}

async fn import<C: StoreClient>(
    cli: &Cli,
    config: &ImportConfig,
    client: C,
    cancel: CancellationToken,
    show_progress: bool,
) -> Result<()> {
    let ingestor = Ingestor::new(config, client)?.with_cancellation(cancel);
    let mut reader = open_csv(&cli.file).context("Failed to open CSV file")?;

    let progress = if show_progress {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .context("Invalid progress style template")?,
        );
        bar
    } else {
        ProgressBar::hidden()
    };

    let start = Instant::now();
    let summary = ingestor
        .run_with_progress(reader.records(), |summary: &IngestSummary| {
            let elapsed = start.elapsed().as_secs_f64();
            let rate = if elapsed > 0.0 {
                summary.points_written as f64 / elapsed
            } else {
                0.0
            };
            progress.set_message(format!(
                "{} points written ({} batches) - {:.0} pts/sec",
                summary.points_written, summary.batches_written, rate
            ));
        })
        .await
        .context("Import failed")?;

    progress.finish_with_message(format!("{} points written - done", summary.points_written));

    let total_duration = start.elapsed();

    eprintln!("\nImport complete:");
    eprintln!("  Rows read: {}", summary.rows_read);
    eprintln!("  Points imported: {}", summary.points_written);
    if summary.rows_skipped > 0 {
        eprintln!("  Rows skipped (no fields): {}", summary.rows_skipped);
    }
    if summary.invalid_timestamps > 0 {
        eprintln!("  Unparsable timestamps: {}", summary.invalid_timestamps);
    }
    eprintln!("  Batches written: {}", summary.batches_written);
    eprintln!("  Total time: {:.2}s", total_duration.as_secs_f64());

    Ok(())
}
