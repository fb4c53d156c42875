//! HTTP client for InfluxDB 1.x compatible servers
//!
//! Databases are listed and created through `/query`, points are sent to
//! `/write` as line protocol with nanosecond precision.

use crate::error::{ImportError, Result};
use crate::store::{StoreClient, WriteResult};
use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use tsload_core::{format_timestamp, FieldValue, Point};

/// Connection settings for [`HttpStoreClient`]
#[derive(Debug, Clone)]
pub struct HttpStoreConfig {
    pub server_url: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout: Duration,
}

/// HTTP client for writing to an InfluxDB compatible server
pub struct HttpStoreClient {
    client: reqwest::Client,
    base_url: String,
    database: String,
    username: Option<String>,
    password: Option<String>,
}

impl HttpStoreClient {
    /// Create a new client; fails if the server address is not a valid URL
    pub fn new(config: &HttpStoreConfig) -> Result<Self> {
        Url::parse(&config.server_url).map_err(|e| {
            ImportError::Config(format!("Invalid server address '{}': {}", config.server_url, e))
        })?;

        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        let mut base_url = config.server_url.clone();
        // Remove trailing slash
        if base_url.ends_with('/') {
            base_url.pop();
        }

        Ok(Self {
            client,
            base_url,
            database: config.database.clone(),
            username: config.username.clone().filter(|u| !u.is_empty()),
            password: config.password.clone(),
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.username {
            Some(user) => request.basic_auth(user, self.password.as_deref()),
            None => request,
        }
    }

    /// Run an InfluxQL statement and return its first result
    async fn query(
        &self,
        statement: &str,
        database: Option<&str>,
        post: bool,
    ) -> Result<StatementResult> {
        let url = format!("{}/query", self.base_url);
        let mut params = vec![("q", statement)];
        if let Some(db) = database {
            params.push(("db", db));
        }

        let request = if post {
            self.client.post(&url)
        } else {
            self.client.get(&url)
        };
        let response = self.authorize(request.query(&params)).send().await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ImportError::Connectivity(format!(
                "not authorized to run '{}' ({})",
                statement, status
            )));
        }
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ImportError::Server {
                status: status.as_u16(),
                message,
            });
        }

        let body: QueryResponse = response.json().await?;
        if let Some(error) = body.error {
            return Err(ImportError::Server {
                status: status.as_u16(),
                message: error,
            });
        }

        let result = body.results.into_iter().next().unwrap_or_default();
        if let Some(error) = result.error {
            return Err(ImportError::Server {
                status: status.as_u16(),
                message: error,
            });
        }
        Ok(result)
    }
}

#[async_trait]
impl StoreClient for HttpStoreClient {
    async fn list_databases(&self) -> Result<Vec<String>> {
        let result = self
            .query("SHOW DATABASES", None, false)
            .await
            .map_err(|e| match e {
                ImportError::Http(e) => ImportError::Connectivity(format!(
                    "server {} is unreachable: {}",
                    self.base_url, e
                )),
                other => other,
            })?;

        let series = result.series.into_iter().next().ok_or_else(|| {
            ImportError::Connectivity("database listing is empty (check credentials)".into())
        })?;

        Ok(series
            .values
            .into_iter()
            .filter_map(|row| row.into_iter().next())
            .filter_map(|name| name.as_str().map(str::to_string))
            .collect())
    }

    async fn create_database(&self, name: &str) -> Result<()> {
        let statement = format!("CREATE DATABASE \"{}\"", escape_identifier(name));
        self.query(&statement, None, true).await?;
        Ok(())
    }

    async fn write(&self, points: &[Point]) -> Result<WriteResult> {
        if points.is_empty() {
            return Ok(WriteResult {
                points_written: 0,
                bytes_sent: 0,
            });
        }

        // Convert points to line protocol
        let line_protocol = points_to_line_protocol(points);
        let bytes_sent = line_protocol.len();

        let url = format!("{}/write", self.base_url);
        let request = self
            .client
            .post(&url)
            .query(&[("db", self.database.as_str()), ("precision", "ns")])
            .body(line_protocol);
        let response = self.authorize(request).send().await?;

        if response.status().is_success() {
            debug!("Sent {} points ({} bytes)", points.len(), bytes_sent);
            Ok(WriteResult {
                points_written: points.len(),
                bytes_sent,
            })
        } else {
            let status = response.status().as_u16();
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            Err(ImportError::Server { status, message })
        }
    }

    async fn count(&self, measurement: &str, field: &str) -> Result<u64> {
        let statement = format!(
            "SELECT count(\"{}\") FROM \"{}\"",
            escape_identifier(field),
            escape_identifier(measurement)
        );
        let result = self
            .query(&statement, Some(self.database.as_str()), false)
            .await?;

        Ok(result
            .series
            .first()
            .and_then(|s| s.values.first())
            .and_then(|row| row.get(1))
            .and_then(|v| v.as_u64())
            .unwrap_or(0))
    }
}

#[derive(Debug, Default, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<StatementResult>,
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StatementResult {
    #[serde(default)]
    series: Vec<SeriesResult>,
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SeriesResult {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

/// Convert points to InfluxDB line protocol format
pub fn points_to_line_protocol(points: &[Point]) -> String {
    let mut lines = Vec::with_capacity(points.len());

    for point in points {
        let mut line = escape_measurement(&point.measurement);

        // Add tags
        for tag in &point.tags {
            line.push(',');
            line.push_str(&escape_key(&tag.key));
            line.push('=');
            line.push_str(&escape_key(&tag.value));
        }

        // Add fields
        line.push(' ');
        let fields: Vec<String> = point
            .fields
            .iter()
            .map(|f| {
                let value = match &f.value {
                    FieldValue::Float(v) => format!("{}", v),
                    FieldValue::Integer(v) => format!("{}i", v),
                    FieldValue::Boolean(v) => format!("{}", v),
                    FieldValue::String(v) => format!("\"{}\"", escape_string_value(v)),
                    FieldValue::Timestamp(v) => format!("\"{}\"", format_timestamp(*v)),
                };
                format!("{}={}", escape_key(&f.key), value)
            })
            .collect();
        line.push_str(&fields.join(","));

        // Without a timestamp the server assigns its own
        if let Some(ts) = point.timestamp {
            line.push(' ');
            line.push_str(&ts.to_string());
        }

        lines.push(line);
    }

    lines.join("\n")
}

/// Escape special characters in measurement names
fn escape_measurement(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace(',', "\\,")
        .replace(' ', "\\ ")
}

/// Escape special characters in tag keys, tag values and field keys.
///
/// Backslashes are doubled so a trailing one cannot swallow the separator,
/// and line breaks are escaped so a value never ends the line.
fn escape_key(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace(',', "\\,")
        .replace('=', "\\=")
        .replace(' ', "\\ ")
}

/// Escape special characters in string field values
fn escape_string_value(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
}

/// Escape a double-quoted InfluxQL identifier
fn escape_identifier(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_points_to_line_protocol() {
        let points = vec![Point::builder("data")
            .timestamp(1704067200000000000)
            .tag("host", "serverA")
            .field("cpu", 93.5_f64)
            .field("ok", true)
            .build()
            .unwrap()];

        let line = points_to_line_protocol(&points);
        assert_eq!(line, "data,host=serverA cpu=93.5,ok=true 1704067200000000000");
    }

    #[test]
    fn test_value_types_and_missing_timestamp() {
        let points = vec![
            Point::builder("system")
                .field("mem", 8192_i64)
                .field("name", "db \"primary\"")
                .field("seen", FieldValue::Timestamp(1704067200000000000))
                .build()
                .unwrap(),
            Point::builder("system")
                .timestamp(5)
                .field("load", 1.0_f64)
                .build()
                .unwrap(),
        ];

        let text = points_to_line_protocol(&points);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(
            lines[0],
            "system mem=8192i,name=\"db \\\"primary\\\"\",seen=\"2024-01-01T00:00:00Z\""
        );
        assert_eq!(lines[1], "system load=1 5");
    }

    #[test]
    fn test_escape_special_chars() {
        assert_eq!(escape_key("host,name"), "host\\,name");
        assert_eq!(escape_key("us west"), "us\\ west");
        assert_eq!(escape_key("a=b"), "a\\=b");
        assert_eq!(escape_measurement("my data,x"), "my\\ data\\,x");
        assert_eq!(escape_string_value("hello \"world\""), "hello \\\"world\\\"");
        assert_eq!(escape_identifier("we\"ird"), "we\\\"ird");
    }

    #[test]
    fn test_trailing_backslash_keeps_separators() {
        let point = Point::builder("disk")
            .tag("path", "C:\\")
            .tag("share", "\\\\srv\\x y")
            .field("used", 1_i64)
            .build()
            .unwrap();

        assert_eq!(
            points_to_line_protocol(&[point]),
            "disk,path=C:\\\\,share=\\\\\\\\srv\\\\x\\ y used=1i"
        );
        assert_eq!(escape_measurement("a\\"), "a\\\\");
        assert_eq!(escape_key("end\\"), "end\\\\");
    }

    #[test]
    fn test_line_breaks_stay_on_one_line() {
        let point = Point::builder("notes")
            .tag("author", "first\nsecond\r")
            .field("text", "multi\nline")
            .build()
            .unwrap();

        let text = points_to_line_protocol(&[point.clone(), point]);
        assert_eq!(text.lines().count(), 2);
        assert_eq!(
            text.lines().next(),
            Some("notes,author=first\\nsecond\\r text=\"multi\\nline\"")
        );
    }

    #[test]
    fn test_invalid_server_address() {
        let config = HttpStoreConfig {
            server_url: "not a url".into(),
            database: "test".into(),
            username: None,
            password: None,
            timeout: Duration::from_secs(1),
        };
        assert!(matches!(
            HttpStoreClient::new(&config),
            Err(ImportError::Config(_))
        ));
    }
}
