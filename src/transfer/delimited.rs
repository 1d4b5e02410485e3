// src/transfer/delimited.rs

//! CSV/TSV transfer over a [`ConnectionFactory`] and a [`FileSystem`].
//!
//! Export runs the query, writes a header row plus one line per result row
//! and reports the row count. Import reads the file, treats the first
//! record as the header and inserts every following record into the
//! target table with positional parameters. XLSX is declared in the data
//! model but not handled here; it yields a failed report.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use futures::future::BoxFuture;
use serde_json::Value;
use tracing::{debug, info};

use super::{ExportRequest, ImportRequest, TransferReport, TransferStrategy};
use crate::context::ProgressSink;
use crate::db::{self, ConnectionFactory, DbConnection};
use crate::fs::FileSystem;
use crate::types::FileFormat;

const PROGRESS_EVERY: u64 = 1000;

pub struct DelimitedTextTransfer {
    connections: Arc<dyn ConnectionFactory>,
    fs: Arc<dyn FileSystem>,
}

impl DelimitedTextTransfer {
    pub fn new(connections: Arc<dyn ConnectionFactory>, fs: Arc<dyn FileSystem>) -> Self {
        Self { connections, fs }
    }
}

impl TransferStrategy for DelimitedTextTransfer {
    fn export<'a>(&'a self, request: ExportRequest<'a>) -> BoxFuture<'a, Result<TransferReport>> {
        Box::pin(async move {
            let Some(delimiter) = delimiter_for(request.format) else {
                return Ok(unsupported(request.format, "export"));
            };

            let mut conn = self.connections.connect(request.connection).await?;
            let outcome = with_timeout(
                request.timeout,
                "Export",
                export_rows(conn.as_mut(), request.query, delimiter, request.on_progress),
            )
            .await;
            db::close_quietly(conn).await;

            let (text, rows) = outcome?;
            self.fs
                .write(request.output_path, text.as_bytes())
                .with_context(|| format!("writing export to {:?}", request.output_path))?;

            info!(
                path = %request.output_path.display(),
                rows,
                format = %request.format,
                "export written"
            );
            Ok(TransferReport::ok(
                rows,
                format!("Exported {rows} rows to {}", request.output_path.display()),
            ))
        })
    }

    fn import<'a>(&'a self, request: ImportRequest<'a>) -> BoxFuture<'a, Result<TransferReport>> {
        Box::pin(async move {
            let Some(delimiter) = delimiter_for(request.format) else {
                return Ok(unsupported(request.format, "import"));
            };

            if !self.fs.exists(request.source_path) {
                return Ok(TransferReport::failed(format!(
                    "Source file not found: {}",
                    request.source_path.display()
                )));
            }

            let text = self.fs.read_to_string(request.source_path)?;
            let mut records = parse_records(&text, delimiter).into_iter();
            let Some(header) = records.next() else {
                return Ok(TransferReport::failed(format!(
                    "Source file is empty: {}",
                    request.source_path.display()
                )));
            };
            let body: Vec<Vec<String>> = records.collect();

            let mut conn = self.connections.connect(request.connection).await?;
            let outcome = with_timeout(
                request.timeout,
                "Import",
                import_rows(
                    conn.as_mut(),
                    request.target_table,
                    &header,
                    &body,
                    request.on_progress,
                ),
            )
            .await;
            db::close_quietly(conn).await;

            let rows = outcome?;
            info!(
                table = %request.target_table,
                source = %request.source_path.display(),
                rows,
                "import finished"
            );
            Ok(TransferReport::ok(
                rows,
                format!("Imported {rows} rows into {}", request.target_table),
            ))
        })
    }
}

fn delimiter_for(format: FileFormat) -> Option<char> {
    match format {
        FileFormat::Csv => Some(','),
        FileFormat::Tsv => Some('\t'),
        FileFormat::Xlsx => None,
    }
}

fn unsupported(format: FileFormat, direction: &str) -> TransferReport {
    TransferReport::failed(format!("{format} {direction} is not supported"))
}

async fn with_timeout<T>(
    timeout: Option<Duration>,
    what: &str,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
            anyhow!("{what} timed out after {} seconds", limit.as_secs())
        })?,
        None => fut.await,
    }
}

fn report(progress: Option<&ProgressSink>, message: String) {
    if let Some(sink) = progress {
        sink(&message);
    }
}

async fn export_rows(
    conn: &mut dyn DbConnection,
    query: &str,
    delimiter: char,
    progress: Option<&ProgressSink>,
) -> Result<(String, u64)> {
    let mut reader = conn.query(query).await?;

    let header: Vec<String> = (0..reader.field_count())
        .map(|i| reader.name(i).to_string())
        .collect();
    let mut out = String::new();
    push_record(&mut out, header.iter().map(String::as_str), delimiter);

    let mut rows = 0u64;
    while reader.read().await? {
        let cells: Vec<String> = (0..header.len())
            .map(|i| db::value_to_text(&reader.value(i)))
            .collect();
        push_record(&mut out, cells.iter().map(String::as_str), delimiter);
        rows += 1;
        if rows % PROGRESS_EVERY == 0 {
            report(progress, format!("Exported {rows} rows..."));
        }
    }

    Ok((out, rows))
}

async fn import_rows(
    conn: &mut dyn DbConnection,
    table: &str,
    header: &[String],
    body: &[Vec<String>],
    progress: Option<&ProgressSink>,
) -> Result<u64> {
    let statement = insert_statement(table, header);
    debug!(%statement, "prepared import statement");

    let mut rows = 0u64;
    for (line, record) in body.iter().enumerate() {
        if record.len() == 1 && record[0].is_empty() {
            continue;
        }
        let params: Vec<Value> = (0..header.len())
            .map(|i| match record.get(i) {
                Some(cell) if !cell.is_empty() => Value::String(cell.clone()),
                _ => Value::Null,
            })
            .collect();
        conn.execute(&statement, &params)
            .await
            .with_context(|| format!("inserting record {}", line + 2))?;
        rows += 1;
        if rows % PROGRESS_EVERY == 0 {
            report(progress, format!("Imported {rows} rows..."));
        }
    }
    Ok(rows)
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn insert_statement(table: &str, header: &[String]) -> String {
    let columns: Vec<String> = header.iter().map(|c| quote_ident(c)).collect();
    let params: Vec<String> = (1..=header.len()).map(|i| format!("?{i}")).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table),
        columns.join(", "),
        params.join(", ")
    )
}

fn push_record<'s>(out: &mut String, cells: impl Iterator<Item = &'s str>, delimiter: char) {
    let mut first = true;
    for cell in cells {
        if !first {
            out.push(delimiter);
        }
        first = false;
        push_field(out, cell, delimiter);
    }
    out.push('\n');
}

fn push_field(out: &mut String, cell: &str, delimiter: char) {
    let needs_quotes = cell.contains(delimiter)
        || cell.contains('"')
        || cell.contains('\n')
        || cell.contains('\r');
    if needs_quotes {
        out.push('"');
        out.push_str(&cell.replace('"', "\"\""));
        out.push('"');
    } else {
        out.push_str(cell);
    }
}

/// Split delimited text into records. Quoted fields may contain the
/// delimiter, doubled quotes and line breaks. A trailing newline does not
/// produce an extra record.
pub(crate) fn parse_records(text: &str, delimiter: char) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' if field.is_empty() => in_quotes = true,
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
            }
            c if c == delimiter => record.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }

    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }
    records
}
