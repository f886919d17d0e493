//! Per-row validation: identifier grammar, display names, nutrient
//! cells with locale-tolerant number parsing.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use crate::codes::NutrientCode;
use crate::record::{FoodCode, IngestRow, NutritionRecord, RowError};
use crate::table::DataRow;

/// Display names longer than this are rejected.
pub const MAX_NAME_LEN: usize = 255;

/// Deployment-level description of the dataset wire format.
#[derive(Debug, Clone)]
pub struct DatasetProfile {
    pub code_column: String,
    pub name_column: String,
    pub alt_name_column: String,
    /// Allowed leading letters of a food code.
    pub code_letters: RangeInclusive<char>,
    /// Recognized nutrient columns; headers outside this set are ignored.
    pub nutrient_codes: Vec<NutrientCode>,
    /// Reject rows that carry no nutrient value at all.
    pub require_nutrients: bool,
}

impl Default for DatasetProfile {
    fn default() -> Self {
        Self {
            code_column: "SBLS".to_string(),
            name_column: "ST".to_string(),
            alt_name_column: "STE".to_string(),
            code_letters: 'B'..='Y',
            nutrient_codes: NutrientCode::ALL.to_vec(),
            require_nutrients: false,
        }
    }
}

enum ColumnRole {
    Code,
    Name,
    AltName,
    Nutrient(NutrientCode),
    Ignored,
}

/// Per-file validator: the column plan is resolved once against the
/// normalized header, then rows are checked independently.
pub struct RowValidator {
    plan: Vec<ColumnRole>,
    code_idx: usize,
    letters: RangeInclusive<char>,
    require_nutrients: bool,
}

impl RowValidator {
    pub fn new(profile: &DatasetProfile, headers: &[String]) -> Self {
        let plan: Vec<ColumnRole> = headers
            .iter()
            .map(|header| {
                if header.eq_ignore_ascii_case(&profile.code_column) {
                    ColumnRole::Code
                } else if header.eq_ignore_ascii_case(&profile.name_column) {
                    ColumnRole::Name
                } else if header.eq_ignore_ascii_case(&profile.alt_name_column) {
                    ColumnRole::AltName
                } else {
                    match NutrientCode::from_label(header) {
                        Some(code) if profile.nutrient_codes.contains(&code) => {
                            ColumnRole::Nutrient(code)
                        }
                        _ => ColumnRole::Ignored,
                    }
                }
            })
            .collect();
        let code_idx = plan
            .iter()
            .position(|role| matches!(role, ColumnRole::Code))
            .unwrap_or(0);
        Self {
            plan,
            code_idx,
            letters: profile.code_letters.clone(),
            require_nutrients: profile.require_nutrients,
        }
    }

    /// Validate one row. Nutrient cells are best-effort: unparseable or
    /// negative values are dropped without failing the row.
    pub fn validate(&self, row: &DataRow) -> Result<IngestRow, RowError> {
        let line = row.line;
        let cell = |idx: usize| row.cells.get(idx).map(String::as_str).unwrap_or("");

        let raw_code = cell(self.code_idx);
        let code = FoodCode::parse(raw_code, &self.letters).ok_or_else(|| RowError {
            line,
            message: format!(
                "Row {line}: Missing or invalid identifier '{}'",
                raw_code.trim()
            ),
        })?;

        let mut name: Option<String> = None;
        let mut alt_name: Option<String> = None;
        let mut nutrients: BTreeMap<NutrientCode, f64> = BTreeMap::new();
        for (idx, role) in self.plan.iter().enumerate() {
            match role {
                ColumnRole::Name => {
                    let value = cell(idx).trim();
                    if !value.is_empty() {
                        name = Some(value.to_string());
                    }
                }
                ColumnRole::AltName => {
                    let value = cell(idx).trim();
                    if !value.is_empty() {
                        alt_name = Some(value.to_string());
                    }
                }
                ColumnRole::Nutrient(code) => {
                    if let Some(value) = parse_quantity(cell(idx)) {
                        nutrients.insert(*code, value);
                    }
                }
                ColumnRole::Code | ColumnRole::Ignored => {}
            }
        }

        // The alternate name stands in when the local one is missing.
        let (name_local, name_alt) = match (name, alt_name) {
            (Some(local), alt) => (local, alt),
            (None, Some(alt)) => (alt, None),
            (None, None) => {
                return Err(RowError {
                    line,
                    message: format!("Row {line}: Missing name"),
                })
            }
        };
        if name_local.chars().count() > MAX_NAME_LEN {
            return Err(RowError {
                line,
                message: format!("Row {line}: Name too long"),
            });
        }

        if self.require_nutrients && nutrients.is_empty() {
            return Err(RowError {
                line,
                message: format!("Row {line}: No nutrient values"),
            });
        }

        Ok(IngestRow {
            line,
            record: NutritionRecord {
                code,
                name_local,
                name_alt,
                nutrients,
            },
        })
    }
}

/// Parse a nutrient cell. Returns `None` for blanks, unparseable text,
/// and negative values; successful values are rounded to 3 fractional
/// digits.
fn parse_quantity(cell: &str) -> Option<f64> {
    let raw = cell.trim();
    if raw.is_empty() {
        return None;
    }
    let value: f64 = normalize_decimal(raw).parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    Some((value * 1000.0).round() / 1000.0)
}

/// `1.234,56` -> `1234.56`, `1,234.56` -> `1234.56`, `50,5` -> `50.5`.
/// When both separators occur, the one that appears first is the
/// thousands separator.
fn normalize_decimal(raw: &str) -> String {
    let dot = raw.find('.');
    let comma = raw.find(',');
    match (dot, comma) {
        (Some(d), Some(c)) if d < c => raw.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => raw.replace(',', ""),
        (None, Some(_)) => raw.replace(',', "."),
        _ => raw.to_string(),
    }
}
