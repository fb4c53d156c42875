//! Time series store abstraction

use crate::error::{ImportError, Result};
use async_trait::async_trait;
use std::io::Write;
use std::sync::Mutex;
use tracing::info;
use tsload_core::Point;

/// Result of a write operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteResult {
    /// Number of points written
    pub points_written: usize,
    /// Bytes sent
    pub bytes_sent: usize,
}

/// Operations the loader needs from a time series store
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Names of all databases on the server
    async fn list_databases(&self) -> Result<Vec<String>>;

    /// Create a database
    async fn create_database(&self, name: &str) -> Result<()>;

    /// Write one batch; the whole batch succeeds or fails
    async fn write(&self, points: &[Point]) -> Result<WriteResult>;

    /// Number of stored values of `field` in `measurement`
    async fn count(&self, measurement: &str, field: &str) -> Result<u64>;
}

/// Make sure `database` exists, creating it unless `auto_create` is off.
///
/// Returns whether the database was created.
pub async fn ensure_database<C>(client: &C, database: &str, auto_create: bool) -> Result<bool>
where
    C: StoreClient + ?Sized,
{
    let databases = client.list_databases().await?;
    if databases.iter().any(|name| name == database) {
        return Ok(false);
    }

    if !auto_create {
        return Err(ImportError::Config(format!(
            "Database '{}' does not exist",
            database
        )));
    }

    info!("Creating database '{}'", database);
    client.create_database(database).await?;
    Ok(true)
}

/// Store used by dry runs: prints each point as a JSON line instead of sending it
pub struct DryRunStore {
    database: String,
    out: Mutex<Box<dyn Write + Send>>,
}

impl DryRunStore {
    /// Dry-run store printing to stdout
    pub fn new(database: impl Into<String>) -> Self {
        Self::with_writer(database, std::io::stdout())
    }

    pub fn with_writer(database: impl Into<String>, out: impl Write + Send + 'static) -> Self {
        Self {
            database: database.into(),
            out: Mutex::new(Box::new(out)),
        }
    }
}

#[async_trait]
impl StoreClient for DryRunStore {
    async fn list_databases(&self) -> Result<Vec<String>> {
        Ok(vec![self.database.clone()])
    }

    async fn create_database(&self, _name: &str) -> Result<()> {
        Ok(())
    }

    async fn write(&self, points: &[Point]) -> Result<WriteResult> {
        // Render the whole batch first so a failed write never emits part of it
        let mut text = String::new();
        for point in points {
            let line = serde_json::to_string(point)
                .map_err(|e| ImportError::Io(std::io::Error::other(e)))?;
            text.push_str(&line);
            text.push('\n');
        }

        let mut out = self
            .out
            .lock()
            .map_err(|_| ImportError::Io(std::io::Error::other("dry-run output lock poisoned")))?;
        out.write_all(text.as_bytes())?;
        out.flush()?;

        Ok(WriteResult {
            points_written: points.len(),
            bytes_sent: text.len(),
        })
    }

    async fn count(&self, _measurement: &str, _field: &str) -> Result<u64> {
        Ok(0)
    }
}
