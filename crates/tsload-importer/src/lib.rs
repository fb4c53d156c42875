//! tsload - Bulk CSV loader for InfluxDB 1.x compatible time series servers
//!
//! The first CSV row names the columns. One configured column carries the
//! timestamp, a configured set of columns become tags and every other column
//! becomes a field whose type is inferred from its text. Points are written in
//! batches, each batch retried with exponential backoff until the server
//! accepts it.
//!
//! ## Usage
//!
//! ```no_run
//! use tsload_importer::{ensure_database, open_csv, HttpStoreClient, ImportConfig, Ingestor};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ImportConfig {
//!         database_name: "metrics".into(),
//!         tag_columns: "host,region".into(),
//!         ..Default::default()
//!     };
//!
//!     let client = HttpStoreClient::new(&config.store_config())?;
//!     ensure_database(&client, &config.database_name, true).await?;
//!
//!     let mut reader = open_csv("data.csv")?;
//!     let ingestor = Ingestor::new(&config, client)?;
//!     let summary = ingestor.run(reader.records()).await?;
//!
//!     println!("Imported {} points", summary.points_written);
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod classify;
pub mod config;
pub mod error;
pub mod header;
pub mod ingest;
pub mod layout;
pub mod mapper;
pub mod retry;
pub mod store;
pub mod writer;

pub use batch::{BatchAccumulator, DEFAULT_BATCH_SIZE};
pub use classify::{Classifier, ClassifierOptions, TypedValue};
pub use config::ImportConfig;
pub use error::{HeaderError, ImportError, Result, TimestampError};
pub use header::{Column, ColumnRole, Header};
pub use ingest::{csv_reader, open_csv, IngestSummary, Ingestor};
pub use layout::{ReferenceLayout, TimeLayout, DEFAULT_LAYOUT, UNIX_LAYOUT};
pub use mapper::{MappedRow, RecordMapper};
pub use retry::{BackoffPolicy, FlushOutcome, RetryState, Sleeper, TokioSleeper, WriteRetryExecutor};
pub use store::{ensure_database, DryRunStore, StoreClient, WriteResult};
pub use writer::{points_to_line_protocol, HttpStoreClient, HttpStoreConfig};
