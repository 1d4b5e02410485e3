// src/transfer/mod.rs

//! Export/import strategy boundary.
//!
//! Export and import nodes validate their own configuration and resolve
//! variables, then hand the actual file codec and transport work to a
//! [`TransferStrategy`]. [`delimited`] provides a CSV/TSV strategy.

pub mod delimited;

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use futures::future::BoxFuture;
use serde::Serialize;

use crate::context::ProgressSink;
use crate::db::ConnectionDescriptor;
use crate::types::FileFormat;

pub use delimited::DelimitedTextTransfer;

pub struct ExportRequest<'a> {
    pub connection: &'a ConnectionDescriptor,
    pub query: &'a str,
    pub output_path: &'a Path,
    pub format: FileFormat,
    pub timeout: Option<Duration>,
    pub on_progress: Option<&'a ProgressSink>,
}

pub struct ImportRequest<'a> {
    pub connection: &'a ConnectionDescriptor,
    pub source_path: &'a Path,
    pub target_table: &'a str,
    pub format: FileFormat,
    pub timeout: Option<Duration>,
    pub on_progress: Option<&'a ProgressSink>,
}

/// What a strategy reports back. `success == false` with a message is an
/// expected failure; `Err` is reserved for unexpected ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferReport {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<u64>,
}

impl TransferReport {
    pub fn ok(rows: u64, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            rows: Some(rows),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            rows: None,
        }
    }
}

pub trait TransferStrategy: Send + Sync {
    fn export<'a>(&'a self, request: ExportRequest<'a>) -> BoxFuture<'a, Result<TransferReport>>;

    fn import<'a>(&'a self, request: ImportRequest<'a>) -> BoxFuture<'a, Result<TransferReport>>;
}
