//! Read surface of the dataset: exact lookup and name search.

use std::ops::RangeInclusive;
use std::sync::Arc;

use thiserror::Error;

use crate::record::{FoodCode, NutritionRecord};
use crate::store::{NutrientStore, StoreError};

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("Invalid food code format: {0}")]
    InvalidCode(String),
    #[error("Food code {0} not found")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Read-side service over the keyed store.
pub struct DatasetService {
    store: Arc<dyn NutrientStore>,
    code_letters: RangeInclusive<char>,
}

impl DatasetService {
    pub fn new(store: Arc<dyn NutrientStore>) -> Self {
        Self::with_code_letters(store, 'B'..='Y')
    }

    pub fn with_code_letters(
        store: Arc<dyn NutrientStore>,
        code_letters: RangeInclusive<char>,
    ) -> Self {
        Self {
            store,
            code_letters,
        }
    }

    /// Exact lookup. The raw code is grammar-checked before the store
    /// is consulted.
    pub async fn get(&self, raw_code: &str) -> Result<NutritionRecord, LookupError> {
        let code = FoodCode::parse(raw_code, &self.code_letters)
            .ok_or_else(|| LookupError::InvalidCode(raw_code.to_string()))?;
        self.store
            .get(&code)
            .await?
            .ok_or_else(|| LookupError::NotFound(code.to_string()))
    }

    /// Case-insensitive substring search over the local display name.
    /// A blank query returns no results.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<NutritionRecord>, LookupError> {
        let needle = query.trim();
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.store.search_name(needle, limit).await?)
    }
}
