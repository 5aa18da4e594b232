// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Normalization of provider record batches.
//!
//! Providers return whatever shape they like. A batch is shown as a table
//! only when it is a list of items that each carry a `properties` object;
//! anything else is kept verbatim and shown as JSON.

use std::fmt::Write as _;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One record: provider-defined field names to values.
pub type Record = Map<String, Value>;

/// Records with a column set discovered at load time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Union of every record's field names, in first-appearance order.
    pub fields: Vec<String>,
    pub rows: Vec<Record>,
}

impl Table {
    /// Display text for the cell at `field` in `row`. Missing cells are empty.
    pub fn cell(&self, row: &Record, field: &str) -> String {
        row.get(field).map(display_value).unwrap_or_default()
    }

    /// Render as a left-aligned text table.
    pub fn render(&self) -> String {
        let cells: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| self.fields.iter().map(|f| self.cell(row, f)).collect())
            .collect();

        let mut widths: Vec<usize> = self.fields.iter().map(|f| f.chars().count()).collect();
        for row in &cells {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let mut out = String::new();
        push_line(&mut out, self.fields.iter().map(String::as_str), &widths);
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        push_line(&mut out, rule.iter().map(String::as_str), &widths);
        for row in &cells {
            push_line(&mut out, row.iter().map(String::as_str), &widths);
        }
        out
    }
}

fn push_line<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>, widths: &[usize]) {
    let line: Vec<String> =
        cells.zip(widths).map(|(cell, &width)| format!("{cell:<width$}")).collect();
    let _ = writeln!(out, "{}", line.join(" | ").trim_end());
}

/// One batch of records from a single load call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum RecordPage {
    TableRows(Table),
    OpaqueDocument(Value),
}

impl RecordPage {
    /// Classify a load response by its top-level shape.
    pub fn from_value(value: Value) -> Self {
        match tabulate(&value) {
            Some(table) => Self::TableRows(table),
            None => Self::OpaqueDocument(value),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::TableRows(table) => table.rows.len(),
            Self::OpaqueDocument(Value::Array(items)) => items.len(),
            Self::OpaqueDocument(Value::Null) => 0,
            Self::OpaqueDocument(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Text table for rows, pretty JSON otherwise.
    pub fn render(&self) -> String {
        match self {
            Self::TableRows(table) => table.render(),
            Self::OpaqueDocument(value) => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
        }
    }
}

/// Build a table when every item is an object with an object `properties`
/// and at least one field exists across them.
fn tabulate(value: &Value) -> Option<Table> {
    let items = value.as_array().filter(|items| !items.is_empty())?;

    let mut rows = Vec::with_capacity(items.len());
    for item in items {
        rows.push(item.get("properties")?.as_object()?.clone());
    }

    let fields: IndexSet<&String> = rows.iter().flat_map(|row| row.keys()).collect();
    if fields.is_empty() {
        return None;
    }
    let fields = fields.into_iter().cloned().collect();
    Some(Table { fields, rows })
}

/// Strings show bare, `null` shows empty, everything else as compact JSON.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
