//! Table data: what engines return and what gets written to CSV.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Name of the column that records the source page of every row.
pub const PAGE_COLUMN: &str = "page";

/// Engine reply: `{"tables": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TableSet {
    #[serde(default)]
    pub tables: Vec<RawTable>,
}

/// One table as an engine reported it, before normalisation.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawTable {
    #[serde(default, deserialize_with = "cells")]
    pub headers: Vec<String>,
    #[serde(default, deserialize_with = "rows")]
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }
}

/// A normalised table from one page: rectangular, with named columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Table {
    /// 1-indexed source page.
    pub page: usize,
    /// Position of the table on its page, 0-based.
    pub index: usize,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Normalise a raw table. Returns `None` when it has no rows.
    ///
    /// Without headers the columns are named by position (`"0"`, `"1"`, …).
    /// Short rows are padded with empty cells; cells past the last header get
    /// positional names too.
    pub fn from_raw(page: usize, index: usize, raw: RawTable) -> Option<Table> {
        let RawTable { mut headers, mut rows } = raw;
        if rows.is_empty() {
            return None;
        }

        let width = rows
            .iter()
            .map(Vec::len)
            .max()
            .unwrap_or(0)
            .max(headers.len());
        for i in headers.len()..width {
            headers.push(i.to_string());
        }
        for row in &mut rows {
            row.resize(width, String::new());
        }

        Some(Table {
            page,
            index,
            headers,
            rows,
        })
    }

    /// `(rows, columns)`, counting the leading `page` column.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.headers.len() + 1)
    }
}

/// Render a JSON cell as CSV text. `null` becomes an empty cell.
pub fn cell_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

fn cells<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values: Option<Vec<Value>> = Option::deserialize(deserializer)?;
    Ok(values
        .unwrap_or_default()
        .iter()
        .map(cell_to_string)
        .collect())
}

fn rows<'de, D>(deserializer: D) -> Result<Vec<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let values: Option<Vec<Value>> = Option::deserialize(deserializer)?;
    Ok(values
        .unwrap_or_default()
        .into_iter()
        .map(|row| match row {
            Value::Array(cells) => cells.iter().map(cell_to_string).collect(),
            // A bare scalar row is a one-column row.
            scalar => vec![cell_to_string(&scalar)],
        })
        .collect())
}
