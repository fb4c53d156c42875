//! Ingestion driver
//!
//! Reads the header row once, then maps every later row into a point, collects
//! points into batches and hands each full batch to the write-retry executor.
//! The remainder is flushed when the input ends. Everything runs sequentially,
//! so the input is never read faster than the store accepts batches.

use crate::batch::BatchAccumulator;
use crate::classify::Classifier;
use crate::config::ImportConfig;
use crate::error::{ImportError, Result};
use crate::header::Header;
use crate::mapper::RecordMapper;
use crate::retry::{Sleeper, TokioSleeper, WriteRetryExecutor};
use crate::store::StoreClient;
use csv::{ReaderBuilder, StringRecord};
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Counters for a finished (or in-progress) run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    /// Data rows read, excluding the header
    pub rows_read: u64,
    /// Points the store accepted
    pub points_written: u64,
    /// Rows dropped because they produced no fields
    pub rows_skipped: u64,
    /// Cells that looked like timestamps but failed to parse
    pub invalid_timestamps: u64,
    /// Successful write requests
    pub batches_written: u64,
}

/// CSV reader where the header is just the first record.
///
/// Row length is checked by the ingestor so the error can name the row.
pub fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader)
}

/// Open a CSV file for ingestion
pub fn open_csv(path: impl AsRef<Path>) -> Result<csv::Reader<File>> {
    let file = File::open(path.as_ref())?;
    Ok(csv_reader(file))
}

/// Drives one load from a row source into a store
pub struct Ingestor<C, S = TokioSleeper> {
    client: C,
    executor: WriteRetryExecutor<S>,
    classifier: Classifier,
    measurement: String,
    tag_names: HashSet<String>,
    timestamp_column: String,
    batch_size: usize,
    report_count: bool,
    cancel: CancellationToken,
}

impl<C: StoreClient> Ingestor<C, TokioSleeper> {
    /// Ingestor with the configured backoff on the tokio timer
    pub fn new(config: &ImportConfig, client: C) -> Result<Self> {
        let executor =
            WriteRetryExecutor::new(config.backoff_policy(), config.max_write_attempts);
        Self::with_executor(config, client, executor)
    }
}

impl<C: StoreClient, S: Sleeper> Ingestor<C, S> {
    /// Ingestor with a caller-supplied executor
    pub fn with_executor(
        config: &ImportConfig,
        client: C,
        executor: WriteRetryExecutor<S>,
    ) -> Result<Self> {
        config.validate()?;
        let classifier = Classifier::new(&config.timestamp_format, config.classifier_options())?;

        Ok(Self {
            client,
            executor,
            classifier,
            measurement: config.measurement_name.clone(),
            tag_names: config.tag_names(),
            timestamp_column: config.timestamp_column.clone(),
            batch_size: config.batch_size,
            report_count: config.report_count,
            cancel: CancellationToken::new(),
        })
    }

    /// Stop between rows and between write attempts once `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.executor = self.executor.with_cancellation(cancel.clone());
        self.cancel = cancel;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Ingest all rows; the first row is the header
    pub async fn run<I>(&self, rows: I) -> Result<IngestSummary>
    where
        I: IntoIterator<Item = csv::Result<StringRecord>>,
    {
        self.run_with_progress(rows, |_| {}).await
    }

    /// Ingest all rows, calling `on_flush` after every successful batch write
    pub async fn run_with_progress<I, F>(&self, rows: I, mut on_flush: F) -> Result<IngestSummary>
    where
        I: IntoIterator<Item = csv::Result<StringRecord>>,
        F: FnMut(&IngestSummary),
    {
        let mut summary = IngestSummary::default();
        let mut rows = rows.into_iter();

        let header_row = match rows.next() {
            Some(row) => row?,
            None => {
                warn!("Input is empty, nothing to import");
                return Ok(summary);
            }
        };
        let header = Header::validate(header_row.iter(), &self.tag_names, &self.timestamp_column)?;
        debug!("Columns: {:?}", header.columns());

        let mapper = RecordMapper::new(self.measurement.as_str(), header, self.classifier.clone());
        let mut batch = BatchAccumulator::new(self.batch_size);

        for (index, record) in rows.enumerate() {
            if self.cancel.is_cancelled() {
                return Err(ImportError::Cancelled);
            }

            let record = record?;
            let row = index as u64 + 1;
            summary.rows_read += 1;

            if record.len() != mapper.header().len() {
                return Err(ImportError::RowLength {
                    row,
                    expected: mapper.header().len(),
                    actual: record.len(),
                });
            }

            let mapped = mapper.map(record.iter(), row);
            summary.invalid_timestamps += mapped.invalid_timestamps as u64;
            match mapped.point {
                Some(point) => batch.append(point),
                None => summary.rows_skipped += 1,
            }

            if batch.is_full() {
                self.flush(&mut batch, mapper.header(), &mut summary).await?;
                on_flush(&summary);
            }
        }

        // Send the remainder
        if !batch.is_empty() {
            self.flush(&mut batch, mapper.header(), &mut summary).await?;
            on_flush(&summary);
        }

        info!("Done (wrote {} points)", summary.points_written);
        Ok(summary)
    }

    async fn flush(
        &self,
        batch: &mut BatchAccumulator,
        header: &Header,
        summary: &mut IngestSummary,
    ) -> Result<()> {
        let outcome = self.executor.flush(&self.client, batch.points()).await?;
        batch.drain();

        summary.points_written += outcome.points as u64;
        summary.batches_written += 1;
        debug!(
            "Batch {} written ({} points, {} attempt(s))",
            summary.batches_written, outcome.points, outcome.attempts
        );

        if self.report_count {
            match self.client.count(&self.measurement, header.first_field()).await {
                Ok(count) => info!("count: {}", count),
                Err(e) => warn!("Failed to count rows: {}", e),
            }
        }
        Ok(())
    }
}
