//! Abstract keyed store consumed by the applier, plus an in-memory
//! reference implementation.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use thiserror::Error;

use crate::record::{FoodCode, NutritionRecord};

/// Error contract for store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The batch violated a store constraint.
    #[error("constraint violation: {0}")]
    Constraint(String),
    /// The store could not be reached or the transaction failed.
    #[error("store unavailable: {0}")]
    Backend(String),
}

/// Keyed record store. Every method call is one transaction: it either
/// fully applies or leaves the store unchanged. No guarantees span two
/// calls; the applier builds its per-batch atomicity on top of this.
#[async_trait]
pub trait NutrientStore: Send + Sync {
    /// Insert the records whose codes are not yet present; existing
    /// codes are left untouched. Returns the codes actually inserted.
    async fn insert_missing(
        &self,
        batch: &[NutritionRecord],
    ) -> Result<Vec<FoodCode>, StoreError>;

    /// Insert-or-update each record. An update overwrites the names and
    /// the supplied nutrient fields and preserves nutrients absent from
    /// the incoming record. Returns the affected-row count.
    async fn upsert(&self, batch: &[NutritionRecord]) -> Result<u64, StoreError>;

    /// Remove every record. Returns the number removed.
    async fn clear(&self) -> Result<u64, StoreError>;

    /// Fetch one record by code.
    async fn get(&self, code: &FoodCode) -> Result<Option<NutritionRecord>, StoreError>;

    /// Case-insensitive substring search over the local display name,
    /// ordered by code.
    async fn search_name(
        &self,
        needle: &str,
        limit: usize,
    ) -> Result<Vec<NutritionRecord>, StoreError>;
}

/// Hash-map store used by tests and the `check` binary. Real
/// deployments implement [`NutrientStore`] over their database.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<FoodCode, NutritionRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl NutrientStore for MemoryStore {
    async fn insert_missing(
        &self,
        batch: &[NutritionRecord],
    ) -> Result<Vec<FoodCode>, StoreError> {
        let mut records = self.records.write().unwrap();
        let mut inserted = Vec::new();
        for record in batch {
            if !records.contains_key(&record.code) {
                records.insert(record.code.clone(), record.clone());
                inserted.push(record.code.clone());
            }
        }
        Ok(inserted)
    }

    async fn upsert(&self, batch: &[NutritionRecord]) -> Result<u64, StoreError> {
        let mut records = self.records.write().unwrap();
        for record in batch {
            match records.get_mut(&record.code) {
                Some(existing) => {
                    existing.name_local = record.name_local.clone();
                    if let Some(alt) = &record.name_alt {
                        existing.name_alt = Some(alt.clone());
                    }
                    existing
                        .nutrients
                        .extend(record.nutrients.iter().map(|(code, value)| (*code, *value)));
                }
                None => {
                    records.insert(record.code.clone(), record.clone());
                }
            }
        }
        Ok(batch.len() as u64)
    }

    async fn clear(&self) -> Result<u64, StoreError> {
        let mut records = self.records.write().unwrap();
        let removed = records.len() as u64;
        records.clear();
        Ok(removed)
    }

    async fn get(&self, code: &FoodCode) -> Result<Option<NutritionRecord>, StoreError> {
        Ok(self.records.read().unwrap().get(code).cloned())
    }

    async fn search_name(
        &self,
        needle: &str,
        limit: usize,
    ) -> Result<Vec<NutritionRecord>, StoreError> {
        let needle = needle.to_lowercase();
        let records = self.records.read().unwrap();
        let mut hits: Vec<NutritionRecord> = records
            .values()
            .filter(|record| record.name_local.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        hits.sort_by(|a, b| a.code.cmp(&b.code));
        hits.truncate(limit);
        Ok(hits)
    }
}
