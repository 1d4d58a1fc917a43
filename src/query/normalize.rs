//! Record normalization
//!
//! The billing API returns loosely-typed records whose field sets can differ
//! from row to row. Normalization turns them into a rectangle: every row holds
//! every column, in first-seen column order, with `null` filling the gaps.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;

use crate::client::RawRecord;
use crate::error::{LitehouseError, Result};

/// Rectangular record set
///
/// Invariant: every row has exactly the keys in `columns`, in that order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecordSet {
    columns: Vec<String>,
    rows: Vec<RawRecord>,
}

impl RecordSet {
    /// Build a record set from raw records
    #[must_use]
    pub fn normalize(raw: Vec<RawRecord>) -> Self {
        let columns = {
            let mut columns = Vec::new();
            let mut seen = HashSet::new();
            for key in raw.iter().flat_map(|record| record.keys()) {
                if seen.insert(key.as_str()) {
                    columns.push(key.clone());
                }
            }
            columns
        };

        let rows = raw
            .into_iter()
            .map(|mut record| {
                columns
                    .iter()
                    .map(|column| (column.clone(), record.remove(column).unwrap_or(Value::Null)))
                    .collect::<Map<_, _>>()
            })
            .collect();

        Self { columns, rows }
    }

    /// Build a record set from a JSON array of objects
    pub fn from_json(value: Value) -> Result<Self> {
        let Value::Array(items) = value else {
            return Err(LitehouseError::invalid_input("Expected a JSON array of records"));
        };

        let raw = items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| match item {
                Value::Object(record) => Ok(record),
                other => Err(LitehouseError::invalid_input(format!(
                    "Record {idx} is not a JSON object (found {})",
                    json_kind(&other)
                ))),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::normalize(raw))
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn rows(&self) -> &[RawRecord] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn into_rows(self) -> Vec<RawRecord> {
        self.rows
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
