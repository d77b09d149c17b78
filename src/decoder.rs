//! Positional row decoding.
//!
//! The store hands back each row as an ordered list of column values. A row is
//! decoded by zipping those values onto a table's field list. No coercion
//! happens here: numbers, strings and nulls come out exactly as they went in.

use std::str::FromStr;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{PipelineError, PipelineResult};

/// How to treat a row whose width differs from its field list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeMode {
    /// Zip to the shorter side, dropping the excess.
    #[default]
    Lenient,
    /// Reject the row.
    Strict,
}

impl FromStr for DecodeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lenient" => Ok(Self::Lenient),
            "strict" => Ok(Self::Strict),
            other => Err(format!("unknown decode mode '{}'", other)),
        }
    }
}

/// A row keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DecodedRow(Map<String, Value>);

impl DecodedRow {
    /// Look up a field. A missing field means the row and the contract disagree.
    pub fn get(&self, field: &str) -> PipelineResult<&Value> {
        self.0
            .get(field)
            .ok_or_else(|| PipelineError::Decode(format!("missing field '{}'", field)))
    }

    /// Owned copy of a field's value.
    pub fn value(&self, field: &str) -> PipelineResult<Value> {
        self.get(field).cloned()
    }
}

/// Decode a single row against `fields`.
pub fn decode_row(
    fields: &[&str],
    values: Vec<Value>,
    mode: DecodeMode,
) -> PipelineResult<DecodedRow> {
    if values.len() != fields.len() {
        match mode {
            DecodeMode::Strict => {
                return Err(PipelineError::Decode(format!(
                    "expected {} columns, got {}",
                    fields.len(),
                    values.len()
                )));
            }
            DecodeMode::Lenient => {
                warn!(
                    "Row width {} does not match {} fields, truncating",
                    values.len(),
                    fields.len()
                );
            }
        }
    }

    let map = fields
        .iter()
        .zip(values)
        .map(|(field, value)| (field.to_string(), value))
        .collect();

    Ok(DecodedRow(map))
}

/// Decode every row of a result set, stopping at the first failure.
pub fn decode_rows(
    fields: &[&str],
    rows: Vec<Vec<Value>>,
    mode: DecodeMode,
) -> PipelineResult<Vec<DecodedRow>> {
    rows.into_iter()
        .map(|values| decode_row(fields, values, mode))
        .collect()
}
