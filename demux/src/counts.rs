//! Per-barcode read counts reported by novobarcode.

use anyhow::{Context, Result};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemuxCount {
    pub id: String,
    pub tag: String,
    pub count: u64,
}

/// Read counts in the order reported. The last row holds the reads that
/// could not be assigned to any barcode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DemuxCounts {
    rows: Vec<DemuxCount>,
}

/// Parse a whitespace separated line of an id, an optional tag and a whole
/// read count.
fn parse_line(line: &str) -> Option<DemuxCount> {
    let tokens = line.split_whitespace().collect_vec();
    let (last, rest) = tokens.split_last()?;
    let count: f64 = last.parse().ok()?;
    if !count.is_finite() || count < 0.0 || count.fract() != 0.0 {
        return None;
    }
    let (id, tag) = match rest {
        [] => return None,
        [id] => (id.to_string(), String::new()),
        [id, tag @ ..] => (id.to_string(), tag.join(" ")),
    };
    Some(DemuxCount {
        id,
        tag,
        count: count as u64,
    })
}

impl DemuxCounts {
    pub fn new(rows: Vec<DemuxCount>) -> Self {
        DemuxCounts { rows }
    }

    /// Parse the report novobarcode prints on stdout. Comment lines starting
    /// with `#` are skipped, as is every line not ending in a number.
    pub fn parse(output: &str) -> Self {
        let rows = output
            .lines()
            .filter(|l| !l.starts_with('#'))
            .filter_map(parse_line)
            .collect();
        DemuxCounts { rows }
    }

    pub fn rows(&self) -> &[DemuxCount] {
        &self.rows
    }

    /// Total number of reads, the sum of the count column.
    pub fn total(&self) -> u64 {
        self.rows.iter().map(|r| r.count).sum()
    }

    /// Reads without a barcode, the count of the last row.
    pub fn no_call(&self) -> u64 {
        self.rows.last().map_or(0, |r| r.count)
    }

    /// Reads assigned to a barcode.
    pub fn matched(&self) -> u64 {
        self.total() - self.no_call()
    }

    /// Write the table as CSV with the columns `id,tag,count`.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path).with_context(|| path.display().to_string())?;
        for row in &self.rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn read_csv(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path).with_context(|| path.display().to_string())?;
        let rows = reader.deserialize().try_collect()?;
        Ok(DemuxCounts { rows })
    }
}
