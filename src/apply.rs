//! Batched application of validated rows to the store.
//!
//! Atomicity is per batch, not per file: each store call either fully
//! applies or leaves the store unchanged, and batches committed before
//! a later failure stay committed. Re-running the same file is safe
//! because rows replace their own prior values.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::record::{FoodCode, IngestMode, IngestRow, NutritionRecord, RowError};
use crate::store::{NutrientStore, StoreError};

/// Aggregated result of applying one upload's validated rows.
#[derive(Debug, Default)]
pub struct ApplyOutcome {
    pub added: usize,
    pub updated: usize,
    pub failed: usize,
    pub errors: Vec<RowError>,
}

/// Apply validated rows in fixed-size batches.
///
/// Incremental mode learns which codes were genuinely new through an
/// insert-only pass and updates the rest; the store only reports
/// totals, so a single upsert could not split added from updated.
/// Replace mode clears the store first, making every batch a pure
/// insert. A whole-batch failure is retried once as single-row
/// operations to isolate the offending rows.
pub async fn apply_rows(
    store: &dyn NutrientStore,
    rows: Vec<IngestRow>,
    mode: IngestMode,
    batch_size: usize,
) -> Result<ApplyOutcome, StoreError> {
    let rows = dedup_last_wins(rows);
    let batch_size = batch_size.max(1);
    let mut outcome = ApplyOutcome::default();

    if mode == IngestMode::Replace {
        let removed = store.clear().await?;
        debug!(removed, "cleared store for full replacement");
    }

    for batch in rows.chunks(batch_size) {
        match mode {
            IngestMode::Incremental => apply_incremental(store, batch, &mut outcome).await,
            IngestMode::Replace => apply_insert_only(store, batch, &mut outcome).await,
        }
        debug!(
            rows = batch.len(),
            added = outcome.added,
            updated = outcome.updated,
            failed = outcome.failed,
            "batch applied"
        );
    }

    Ok(outcome)
}

/// Duplicate codes inside one upload resolve deterministically: the
/// last occurrence in file order wins, matching what re-ingesting the
/// file would produce. Superseded rows count as nothing.
fn dedup_last_wins(rows: Vec<IngestRow>) -> Vec<IngestRow> {
    let mut last: HashMap<FoodCode, usize> = HashMap::with_capacity(rows.len());
    for (idx, row) in rows.iter().enumerate() {
        last.insert(row.record.code.clone(), idx);
    }
    if last.len() == rows.len() {
        return rows;
    }
    debug!(
        superseded = rows.len() - last.len(),
        "duplicate codes in upload; keeping the last occurrence"
    );
    rows.into_iter()
        .enumerate()
        .filter(|(idx, row)| last[&row.record.code] == *idx)
        .map(|(_, row)| row)
        .collect()
}

async fn apply_incremental(
    store: &dyn NutrientStore,
    batch: &[IngestRow],
    outcome: &mut ApplyOutcome,
) {
    let records = batch_records(batch);
    let inserted: HashSet<FoodCode> = match store.insert_missing(&records).await {
        Ok(codes) => codes.into_iter().collect(),
        Err(err) => {
            warn!(error = %err, rows = batch.len(), "batch insert failed; retrying rows individually");
            return retry_incremental_rows(store, batch, outcome).await;
        }
    };
    outcome.added += inserted.len();

    let remaining: Vec<&IngestRow> = batch
        .iter()
        .filter(|row| !inserted.contains(&row.record.code))
        .collect();
    if remaining.is_empty() {
        return;
    }

    let updates: Vec<NutritionRecord> = remaining.iter().map(|row| row.record.clone()).collect();
    match store.upsert(&updates).await {
        Ok(affected) => {
            if affected as usize != updates.len() {
                debug!(affected, expected = updates.len(), "store reported an unexpected affected count");
            }
            outcome.updated += updates.len();
        }
        Err(err) => {
            warn!(error = %err, rows = remaining.len(), "batch update failed; retrying rows individually");
            for row in remaining {
                match store.upsert(std::slice::from_ref(&row.record)).await {
                    Ok(_) => outcome.updated += 1,
                    Err(_) => fail_row(outcome, row),
                }
            }
        }
    }
}

async fn retry_incremental_rows(
    store: &dyn NutrientStore,
    batch: &[IngestRow],
    outcome: &mut ApplyOutcome,
) {
    for row in batch {
        let single = std::slice::from_ref(&row.record);
        match store.insert_missing(single).await {
            Ok(codes) if !codes.is_empty() => outcome.added += 1,
            Ok(_) => match store.upsert(single).await {
                Ok(_) => outcome.updated += 1,
                Err(_) => fail_row(outcome, row),
            },
            Err(_) => fail_row(outcome, row),
        }
    }
}

async fn apply_insert_only(
    store: &dyn NutrientStore,
    batch: &[IngestRow],
    outcome: &mut ApplyOutcome,
) {
    let records = batch_records(batch);
    match store.insert_missing(&records).await {
        Ok(inserted) => outcome.added += inserted.len(),
        Err(err) => {
            warn!(error = %err, rows = batch.len(), "batch insert failed; retrying rows individually");
            for row in batch {
                match store.insert_missing(std::slice::from_ref(&row.record)).await {
                    Ok(_) => outcome.added += 1,
                    Err(_) => fail_row(outcome, row),
                }
            }
        }
    }
}

fn batch_records(batch: &[IngestRow]) -> Vec<NutritionRecord> {
    batch.iter().map(|row| row.record.clone()).collect()
}

fn fail_row(outcome: &mut ApplyOutcome, row: &IngestRow) {
    outcome.failed += 1;
    outcome.errors.push(RowError {
        line: row.line,
        message: format!(
            "Row {}: Database error while storing '{}'",
            row.line, row.record.code
        ),
    });
}
