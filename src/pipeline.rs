//! Ingestion orchestrator: decompress, decode, parse, validate, apply.

use std::sync::Arc;

use async_compression::tokio::bufread::{GzipDecoder, ZstdDecoder};
use bytes::Bytes;
use tokio::io::{AsyncReadExt, BufReader};
use tracing::{info, warn};

use crate::apply;
use crate::decode;
use crate::record::{IngestMode, IngestReport, RowError};
use crate::store::NutrientStore;
use crate::table;
use crate::validate::{DatasetProfile, RowValidator};
use crate::{IngestError, IngestResult};

/// Size and reporting limits for one ingestion call.
#[derive(Debug, Clone)]
pub struct IngestLimits {
    pub max_file_bytes: usize,
    pub max_rows: usize,
    pub batch_size: usize,
    /// Error messages reported verbatim; `failed` always counts all.
    pub max_reported_errors: usize,
}

impl Default for IngestLimits {
    fn default() -> Self {
        Self {
            max_file_bytes: 50 * 1024 * 1024,
            max_rows: 100_000,
            batch_size: 1_000,
            max_reported_errors: 10,
        }
    }
}

/// The full ingestion pipeline. Stateless across calls; owns only
/// configuration and the store handle, so tests can build independent
/// instances with different profiles or limits.
pub struct IngestPipeline {
    profile: DatasetProfile,
    limits: IngestLimits,
    store: Arc<dyn NutrientStore>,
}

impl IngestPipeline {
    pub fn new(store: Arc<dyn NutrientStore>) -> Self {
        Self::with_config(store, DatasetProfile::default(), IngestLimits::default())
    }

    pub fn with_config(
        store: Arc<dyn NutrientStore>,
        profile: DatasetProfile,
        limits: IngestLimits,
    ) -> Self {
        Self {
            profile,
            limits,
            store,
        }
    }

    /// Run one ingestion call.
    ///
    /// Structural problems (empty or oversize payload, row limit,
    /// broken compression) fail the whole call; row-level problems are
    /// collected into the report. Batches committed before a later
    /// failure stay committed (per-batch atomicity). Operators should
    /// treat a partially failed run as at-least-once and re-run the
    /// file: rows replace their own prior values.
    pub async fn ingest(
        &self,
        payload: Bytes,
        filename: &str,
        mode: IngestMode,
    ) -> IngestResult<IngestReport> {
        if payload.is_empty() {
            return Err(IngestError::EmptyFile);
        }
        if payload.len() > self.limits.max_file_bytes {
            return Err(IngestError::FileTooLarge {
                size: payload.len(),
                limit: self.limits.max_file_bytes,
            });
        }
        info!(filename, bytes = payload.len(), ?mode, "starting ingestion");

        let raw = inflate(&payload, filename).await?;
        if raw.is_empty() {
            return Err(IngestError::EmptyFile);
        }
        if raw.len() > self.limits.max_file_bytes {
            return Err(IngestError::FileTooLarge {
                size: raw.len(),
                limit: self.limits.max_file_bytes,
            });
        }

        let decoded = decode::decode(&raw);
        if decoded.lossy {
            warn!(
                filename,
                encoding = decoded.encoding.name(),
                "decoded with replacement characters; continuing"
            );
        }

        let parsed =
            table::parse_table(&decoded.text, &self.profile.code_column, self.limits.max_rows)
                .await?;

        let validator = RowValidator::new(&self.profile, &parsed.headers);
        let mut valid = Vec::new();
        let mut errors: Vec<RowError> = Vec::new();
        for row in &parsed.rows {
            match validator.validate(row) {
                Ok(ingest_row) => valid.push(ingest_row),
                Err(err) => errors.push(err),
            }
        }

        let outcome = apply::apply_rows(
            self.store.as_ref(),
            valid,
            mode,
            self.limits.batch_size,
        )
        .await?;

        errors.extend(outcome.errors);
        errors.sort_by_key(|err| err.line);
        let failed = errors.len();
        let report = IngestReport {
            added: outcome.added,
            updated: outcome.updated,
            failed,
            errors: errors
                .into_iter()
                .take(self.limits.max_reported_errors)
                .map(|err| err.message)
                .collect(),
        };
        info!(
            added = report.added,
            updated = report.updated,
            failed = report.failed,
            "ingestion finished"
        );
        Ok(report)
    }
}

/// Transparently decompress gzip/zstd payloads, keyed off magic bytes
/// with the advisory filename as a fallback hint.
async fn inflate(payload: &Bytes, filename: &str) -> IngestResult<Vec<u8>> {
    if payload.starts_with(&[0x1f, 0x8b]) || filename.ends_with(".gz") {
        let mut out = Vec::new();
        let mut decoder = GzipDecoder::new(BufReader::new(payload.as_ref()));
        decoder.read_to_end(&mut out).await?;
        Ok(out)
    } else if payload.starts_with(&[0x28, 0xb5, 0x2f, 0xfd]) || filename.ends_with(".zst") {
        let mut out = Vec::new();
        let mut decoder = ZstdDecoder::new(BufReader::new(payload.as_ref()));
        decoder.read_to_end(&mut out).await?;
        Ok(out)
    } else {
        Ok(payload.to_vec())
    }
}
