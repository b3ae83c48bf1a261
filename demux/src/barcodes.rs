//! Barcode definition files handed to the demultiplexing programs.

use anyhow::{bail, Context, Result};
use itertools::Itertools;
use log::{info, warn};
use rmt_types::{ConstructRow, ConstructTable, STAGED_R1_FASTQ, STAGED_R2_FASTQ};
use std::collections::HashSet;
use std::path::Path;

/// Header lines of a novobarcode barcode file: tolerated edit distance and
/// the index read format.
const NOVOBARCODE_HEADER: &str = "Distance\t4\nFormat\t5\n";

/// The rows of a construct table with a unique barcode id, in table order.
#[derive(Debug)]
pub struct BarcodeSet<'a> {
    unique: Vec<&'a ConstructRow>,
    duplicates: Vec<String>,
}

impl<'a> BarcodeSet<'a> {
    /// Keep the first row of every barcode id. Later rows reusing an id are
    /// skipped with a warning.
    pub fn from_table(table: &'a ConstructTable) -> Self {
        info!("constructs:\n\n{}\n", table.to_markdown());

        let mut seen = HashSet::new();
        let mut unique = Vec::new();
        let mut duplicates = Vec::new();
        for row in table.rows() {
            if !seen.insert(row.barcode.as_str()) {
                warn!(
                    "{} has been used more than once this may be an issue",
                    row.barcode
                );
                duplicates.push(row.barcode.clone());
                continue;
            }
            unique.push(row);
        }

        info!("{} unique barcodes found from csv file", unique.len());
        if duplicates.is_empty() {
            info!("no barcode conflicts detected");
        }
        BarcodeSet { unique, duplicates }
    }

    pub fn rows(&self) -> &[&'a ConstructRow] {
        &self.unique
    }

    /// Barcode ids of the skipped rows, one entry per skipped row.
    pub fn duplicates(&self) -> &[String] {
        &self.duplicates
    }

    /// Tab separated novobarcode format: two header lines then `id<TAB>sequence`.
    pub fn novobarcode_file(&self) -> String {
        let body: String = self
            .unique
            .iter()
            .map(|row| format!("{}\t{}\n", row.barcode, row.barcode_seq))
            .collect();
        format!("{NOVOBARCODE_HEADER}{body}")
    }

    /// Tab separated sabre format: `sequence<TAB>read 1 output<TAB>read 2 output`,
    /// writing into one directory per barcode sequence.
    pub fn sabre_file(&self) -> String {
        self.unique
            .iter()
            .map(|row| {
                let seq = &row.barcode_seq;
                format!("{seq}\t{seq}/{STAGED_R1_FASTQ}\t{seq}/{STAGED_R2_FASTQ}\n")
            })
            .collect()
    }
}

/// Read back the `(id, sequence)` records of a novobarcode barcode file.
pub fn read_novobarcode_file(path: &Path) -> Result<Vec<(String, String)>> {
    let contents = std::fs::read_to_string(path).with_context(|| path.display().to_string())?;
    let mut lines = contents.lines();
    let header: String = lines.by_ref().take(2).map(|l| format!("{l}\n")).collect();
    if header != NOVOBARCODE_HEADER {
        bail!(
            "{} does not start with the novobarcode header {NOVOBARCODE_HEADER:?}",
            path.display()
        );
    }
    lines
        .filter(|l| !l.trim().is_empty())
        .map(|line| {
            let Some((id, seq)) = line.split('\t').collect_tuple() else {
                bail!("malformed line in {}: {line:?}", path.display());
            };
            Ok((id.to_string(), seq.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "\
barcode,barcode_seq,construct
A1,AAAGAAT,mttr6
A2,TTCGAAT,uucg
A1,GGGGAAT,mttr6_repeat
A3,CCCGAAT,gaaa
A2,TTCGAAT,uucg_again
";

    #[test]
    fn test_duplicates_are_skipped() -> Result<()> {
        let table = ConstructTable::from_reader(TABLE.as_bytes())?;
        let barcodes = BarcodeSet::from_table(&table);
        assert_eq!(barcodes.rows().len(), table.len() - barcodes.duplicates().len());
        assert_eq!(barcodes.duplicates(), ["A1", "A2"]);
        assert_eq!(
            barcodes.rows().iter().map(|r| r.construct.as_str()).collect_vec(),
            ["mttr6", "uucg", "gaaa"]
        );
        Ok(())
    }

    /// Keeps the warnings logged by any test of this binary.
    struct WarningLog(std::sync::Mutex<Vec<String>>);

    impl log::Log for WarningLog {
        fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
            metadata.level() <= log::Level::Warn
        }

        fn log(&self, record: &log::Record<'_>) {
            if self.enabled(record.metadata()) {
                if let Ok(mut lines) = self.0.lock() {
                    lines.push(record.args().to_string());
                }
            }
        }

        fn flush(&self) {}
    }

    static WARNINGS: WarningLog = WarningLog(std::sync::Mutex::new(Vec::new()));

    #[test]
    fn test_one_warning_per_duplicate() -> Result<()> {
        // no other test installs a logger
        log::set_logger(&WARNINGS).ok();
        log::set_max_level(log::LevelFilter::Warn);

        let table = ConstructTable::from_reader(
            "barcode,barcode_seq,construct\nW7,AAAGAAT,a\nW7,TTCGAAT,b\nW8,CCCGAAT,c\nW7,GGGGAAT,d\n"
                .as_bytes(),
        )?;
        let barcodes = BarcodeSet::from_table(&table);
        assert_eq!(barcodes.duplicates(), ["W7", "W7"]);

        let lines = WARNINGS.0.lock().map(|l| l.clone()).unwrap_or_default();
        let count = |id: &str| {
            lines
                .iter()
                .filter(|l| l.starts_with(&format!("{id} has been used more than once")))
                .count()
        };
        assert_eq!(count("W7"), 2);
        assert_eq!(count("W8"), 0);
        Ok(())
    }

    #[test]
    fn test_novobarcode_file() -> Result<()> {
        let table = ConstructTable::from_reader(TABLE.as_bytes())?;
        let barcodes = BarcodeSet::from_table(&table);
        assert_eq!(
            barcodes.novobarcode_file(),
            "Distance\t4\nFormat\t5\nA1\tAAAGAAT\nA2\tTTCGAAT\nA3\tCCCGAAT\n"
        );

        let dir = tempfile::tempdir()?;
        let path = dir.path().join("rtb_barcodes.fa");
        std::fs::write(&path, barcodes.novobarcode_file())?;
        let expected: Vec<_> = barcodes
            .rows()
            .iter()
            .map(|r| (r.barcode.clone(), r.barcode_seq.clone()))
            .collect();
        assert_eq!(read_novobarcode_file(&path)?, expected);
        Ok(())
    }

    #[test]
    fn test_read_novobarcode_file_rejects_missing_header() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("barcodes.fa");
        std::fs::write(&path, "A1\tAAAGAAT\n")?;
        assert!(read_novobarcode_file(&path).is_err());
        Ok(())
    }

    #[test]
    fn test_sabre_file() -> Result<()> {
        let table = ConstructTable::from_reader(TABLE.as_bytes())?;
        let barcodes = BarcodeSet::from_table(&table);
        let expected = "\
AAAGAAT\tAAAGAAT/test_S1_L001_R1_001.fastq\tAAAGAAT/test_S1_L001_R2_001.fastq
TTCGAAT\tTTCGAAT/test_S1_L001_R1_001.fastq\tTTCGAAT/test_S1_L001_R2_001.fastq
CCCGAAT\tCCCGAAT/test_S1_L001_R1_001.fastq\tCCCGAAT/test_S1_L001_R2_001.fastq
";
        assert_eq!(barcodes.sabre_file(), expected);
        Ok(())
    }
}
