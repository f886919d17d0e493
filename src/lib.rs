//! Ingestion pipeline for keyed nutrition-fact datasets.
//!
//! One record per 7-character food code. Uploads arrive as raw bytes in
//! an unknown encoding and flow through: optional decompression ->
//! encoding detection -> tab-separated parsing -> per-row validation ->
//! batched application to an abstract keyed store.
//!
//! - [`IngestPipeline::ingest`] runs the whole pipeline and returns an
//!   [`IngestReport`] `{ added, updated, failed, errors }`.
//! - [`NutrientStore`] is the store boundary; [`MemoryStore`] is the
//!   bundled reference implementation.
//! - [`DatasetService`] is the read surface (lookup, name search).
//
mod apply;
mod codes;
mod decode;
mod pipeline;
mod record;
mod service;
mod store;
mod table;
mod validate;

pub use crate::codes::NutrientCode;
pub use crate::decode::{decode, Decoded};
pub use crate::pipeline::{IngestLimits, IngestPipeline};
pub use crate::record::{
    FoodCode, IngestMode, IngestReport, IngestRow, NutritionRecord, RowError,
};
pub use crate::service::{DatasetService, LookupError};
pub use crate::store::{MemoryStore, NutrientStore, StoreError};
pub use crate::table::{parse_table, DataRow, ParsedTable};
pub use crate::validate::{DatasetProfile, RowValidator, MAX_NAME_LEN};

use thiserror::Error;

/// Whole-call (structural) failures. Row-level problems never surface
/// here; they are collected into the report.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Empty file")]
    EmptyFile,
    #[error("File too large: {size} bytes (limit {limit})")]
    FileTooLarge { size: usize, limit: usize },
    #[error("Too many rows (limit {limit})")]
    TooManyRows { limit: usize },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv_async::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type IngestResult<T> = std::result::Result<T, IngestError>;
