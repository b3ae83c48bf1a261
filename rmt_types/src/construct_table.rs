//! The construct table: one row per construct, naming the barcode it was
//! tagged with and where its reference files live.

use anyhow::{Context, Result};
use csv::StringRecord;
use itertools::Itertools;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Columns every construct table must carry.
pub const BARCODE_COLUMNS: [&str; 3] = ["barcode", "barcode_seq", "construct"];

/// Old column names and their current replacement.
const LEGACY_COLUMNS: [(&str, &str); 2] = [("name", "construct"), ("type", "data_type")];

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    #[error("{column} column is required in the table! columns are {}", .columns.join(", "))]
    MissingColumn {
        column: String,
        columns: Vec<String>,
    },

    #[error("row {row} (construct {construct}) has no value in column {column}")]
    MissingValue {
        row: usize,
        construct: String,
        column: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructRow {
    /// Barcode identifier, expected to be unique within a table.
    pub barcode: String,
    /// Barcode sequence as it appears in the reads.
    pub barcode_seq: String,
    pub construct: String,
    /// Stem of the FASTA and secondary structure files of the construct.
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub data_type: Option<String>,
}

impl ConstructRow {
    /// The `code` of this row. `row` is only used for the error message.
    pub fn require_code(&self, row: usize) -> Result<&str, TableError> {
        self.code.as_deref().ok_or_else(|| TableError::MissingValue {
            row,
            construct: self.construct.clone(),
            column: "code",
        })
    }

    /// The `data_type` of this row. `row` is only used for the error message.
    pub fn require_data_type(&self, row: usize) -> Result<&str, TableError> {
        self.data_type
            .as_deref()
            .ok_or_else(|| TableError::MissingValue {
                row,
                construct: self.construct.clone(),
                column: "data_type",
            })
    }
}

/// Rename legacy columns, leaving a column alone if its replacement is already present.
fn normalize_legacy_columns(mut columns: Vec<String>) -> Vec<String> {
    for (old, new) in LEGACY_COLUMNS {
        let Some(pos) = columns.iter().position(|c| c == old) else {
            continue;
        };
        if columns.iter().any(|c| c == new) {
            warn!("both '{old}' and '{new}' columns are present, ignoring '{old}'");
            continue;
        }
        warn!("renaming '{old}' column to '{new}'");
        columns[pos] = new.to_string();
    }
    columns
}

/// Check that every column in `required` is present in `columns`.
pub fn check_columns<T: AsRef<str>>(columns: &[String], required: &[T]) -> Result<(), TableError> {
    for column in required {
        let column = column.as_ref();
        if !columns.iter().any(|c| c == column) {
            return Err(TableError::MissingColumn {
                column: column.to_string(),
                columns: columns.to_vec(),
            });
        }
    }
    Ok(())
}

/// A construct table, loaded once from a CSV file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstructTable {
    columns: Vec<String>,
    rows: Vec<ConstructRow>,
}

impl ConstructTable {
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| path.display().to_string())?;
        Self::from_reader(BufReader::new(file))
            .with_context(|| format!("reading construct table {}", path.display()))
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let columns = normalize_legacy_columns(rdr.headers()?.iter().map(String::from).collect());
        check_columns(&columns, &BARCODE_COLUMNS[..])?;
        let headers = StringRecord::from(columns.clone());

        let rows: Vec<ConstructRow> = rdr
            .records()
            .enumerate()
            .map(|(i, record)| -> Result<ConstructRow> {
                record?
                    .deserialize(Some(&headers))
                    .with_context(|| format!("parsing row {}", i + 1))
            })
            .try_collect()?;

        Ok(ConstructTable { columns, rows })
    }

    /// Column names after legacy renames.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[ConstructRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn check_columns<T: AsRef<str>>(&self, required: &[T]) -> Result<(), TableError> {
        check_columns(&self.columns, required)
    }

    /// Render the barcode columns as a GitHub flavoured markdown table.
    pub fn to_markdown(&self) -> String {
        let cells: Vec<[&str; 3]> = self
            .rows
            .iter()
            .map(|r| [r.barcode.as_str(), r.barcode_seq.as_str(), r.construct.as_str()])
            .collect();
        let widths: Vec<usize> = (0..BARCODE_COLUMNS.len())
            .map(|i| {
                cells
                    .iter()
                    .map(|row| row[i].len())
                    .chain(std::iter::once(BARCODE_COLUMNS[i].len()))
                    .max()
                    .unwrap_or_default()
            })
            .collect();

        let format_row = |row: &[&str]| {
            format!(
                "| {} |",
                row.iter()
                    .zip(&widths)
                    .map(|(cell, &w)| format!("{cell:<w$}"))
                    .join(" | ")
            )
        };
        let rule = format!(
            "|{}|",
            widths.iter().map(|&w| "-".repeat(w + 2)).join("|")
        );

        std::iter::once(format_row(&BARCODE_COLUMNS[..]))
            .chain(std::iter::once(rule))
            .chain(cells.iter().map(|row| format_row(&row[..])))
            .join("\n")
    }
}
