//! Result sink
//!
//! The orchestrator drives a `ResultSink` from a single task, so rows are
//! appended whole and in completion order. `CsvSink` writes the
//! `ramo,estrato,total,area` file.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};

use crate::error::{Error, Result};
use crate::fetcher::FetchResult;

/// Output header: activity, stratum, total, area.
pub const CSV_HEADER: [&str; 4] = ["ramo", "estrato", "total", "area"];

const LINE_TERMINATOR: &str = "\r\n";

/// One output row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRow {
    pub activity: String,
    pub stratum: u8,
    pub total: u64,
    pub area: String,
}

impl From<FetchResult> for ResultRow {
    fn from(result: FetchResult) -> Self {
        Self {
            activity: result.task.activity,
            stratum: result.task.stratum,
            total: result.count,
            area: result.task.area,
        }
    }
}

/// Ordered appender for result rows.
///
/// Uses `Pin<Box<dyn Future>>` so the orchestrator can take `&mut dyn ResultSink`.
pub trait ResultSink: Send {
    fn write_row<'a>(
        &'a mut self,
        row: &'a ResultRow,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

    fn flush(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Comma-separated output with CRLF line endings.
#[derive(Debug)]
pub struct CsvSink<W> {
    writer: BufWriter<W>,
    rows: u64,
}

impl CsvSink<File> {
    /// Create (or truncate) `path` and write the header.
    pub async fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)
            .await
            .map_err(|e| Error::io(path, e))?;
        Self::new(file).await
    }
}

impl<W: AsyncWrite + Unpin + Send> CsvSink<W> {
    pub async fn new(writer: W) -> Result<Self> {
        let mut sink = Self {
            writer: BufWriter::new(writer),
            rows: 0,
        };
        sink.write_record(&CSV_HEADER).await?;
        Ok(sink)
    }

    /// Data rows written so far (header excluded).
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Flush and hand back the underlying writer.
    pub async fn into_inner(mut self) -> Result<W> {
        self.writer.flush().await.map_err(Error::Sink)?;
        Ok(self.writer.into_inner())
    }

    async fn write_record<S: AsRef<str>>(&mut self, fields: &[S]) -> Result<()> {
        let mut line = String::new();
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                line.push(',');
            }
            push_field(&mut line, field.as_ref());
        }
        line.push_str(LINE_TERMINATOR);
        self.writer
            .write_all(line.as_bytes())
            .await
            .map_err(Error::Sink)
    }
}

impl<W: AsyncWrite + Unpin + Send> ResultSink for CsvSink<W> {
    fn write_row<'a>(
        &'a mut self,
        row: &'a ResultRow,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let fields = [
                row.activity.clone(),
                row.stratum.to_string(),
                row.total.to_string(),
                row.area.clone(),
            ];
            self.write_record(&fields).await?;
            self.rows += 1;
            Ok(())
        })
    }

    fn flush(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move { self.writer.flush().await.map_err(Error::Sink) })
    }
}

/// Append a field, quoting it when it contains a delimiter, quote or newline.
fn push_field(line: &mut String, field: &str) {
    if field.contains([',', '"', '\r', '\n']) {
        line.push('"');
        line.push_str(&field.replace('"', "\"\""));
        line.push('"');
    } else {
        line.push_str(field);
    }
}
