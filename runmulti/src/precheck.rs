//! Checks that every file a multi-run needs is present and readable, before
//! anything is launched.

use bio::io::fasta;
use fastq_pair::{find_paired_fastqs, validate_fastq_file, FastqError, PairedFastqFiles};
use log::error;
use rmt_types::construct_table::check_columns;
use rmt_types::{ConstructRow, ConstructTable, TableError, STAGED_FASTQ_PREFIX};
use std::fs::File;
use std::path::{Path, PathBuf};

/// Columns of a secondary structure table.
pub const STRUCTURE_COLUMNS: [&str; 3] = ["name", "sequence", "structure"];

fn fastq_layout(root: &Path) -> String {
    format!(
        "{} directory structure should be as follows: each BARCODE directory \
         should be the sequence of the barcode as it appears in the construct table\n\
         --DATA_PATH/\n  |--BARCODE_1/\n     |--test_S1_L001_R1_001.fastq\n     \
         |--test_S1_L001_R2_001.fastq",
        root.display()
    )
}

fn fasta_layout(root: &Path) -> String {
    format!(
        "{} directory structure should be as follows: each fasta file should be \
         named code.fasta\n--FASTA_PATH/\n  |--code_1.fasta\n  |--code_2.fasta",
        root.display()
    )
}

fn table_layout(root: &Path) -> String {
    format!(
        "{} directory structure should be as follows: each structure table should \
         be named code.csv with the columns {}\n--TABLE_PATH/\n  |--code_1.csv\n  \
         |--code_2.csv",
        root.display(),
        STRUCTURE_COLUMNS.join(", ")
    )
}

#[derive(Debug, thiserror::Error)]
pub enum PrecheckError {
    #[error("barcode directory {path:?} does not exist\n{}", fastq_layout(.root))]
    MissingBarcodeDir { path: PathBuf, root: PathBuf },

    #[error("no fastqs exist in barcode directory {path:?}\n{}", fastq_layout(.root))]
    MissingFastqs {
        path: PathBuf,
        root: PathBuf,
        #[source]
        source: FastqError,
    },

    #[error("fastq file {path:?} is not a valid fastq\n{}", fastq_layout(.root))]
    InvalidFastq { path: PathBuf, root: PathBuf },

    #[error("fasta file {path:?} does not exist\n{}", fasta_layout(.root))]
    MissingFasta { path: PathBuf, root: PathBuf },

    #[error("fasta file {path:?} is not a valid fasta\n{}", fasta_layout(.root))]
    InvalidFasta { path: PathBuf, root: PathBuf },

    #[error("structure table {path:?} does not exist\n{}", table_layout(.root))]
    MissingStructureTable { path: PathBuf, root: PathBuf },

    #[error("structure table {path:?} is not valid: {reason}\n{}", table_layout(.root))]
    InvalidStructureTable {
        path: PathBuf,
        root: PathBuf,
        reason: String,
    },

    #[error("cannot find program '{program}', please install it")]
    MissingProgram { program: String },

    #[error(transparent)]
    Table(#[from] TableError),
}

/// Resolve the read pair of one row: `<data_root>/<barcode_seq>/test_S1*`.
pub(crate) fn row_fastqs(
    row: &ConstructRow,
    data_root: &Path,
) -> Result<PairedFastqFiles, PrecheckError> {
    let dir = data_root.join(&row.barcode_seq);
    if !dir.is_dir() {
        return Err(PrecheckError::MissingBarcodeDir {
            path: dir,
            root: data_root.to_path_buf(),
        });
    }
    find_paired_fastqs(dir.join(STAGED_FASTQ_PREFIX)).map_err(|source| {
        PrecheckError::MissingFastqs {
            path: dir,
            root: data_root.to_path_buf(),
            source,
        }
    })
}

/// Every row must have a directory named by its barcode sequence under
/// `data_root`, holding a well formed read pair.
pub fn valid_fastq_files(table: &ConstructTable, data_root: &Path) -> Result<(), PrecheckError> {
    for row in table.rows() {
        let pair = row_fastqs(row, data_root)?;
        for fastq in [pair.read_1(), pair.read_2()] {
            if !validate_fastq_file(fastq.path()) {
                return Err(PrecheckError::InvalidFastq {
                    path: fastq.path().to_path_buf(),
                    root: data_root.to_path_buf(),
                });
            }
        }
    }
    Ok(())
}

fn is_valid_fasta(path: &Path) -> bool {
    let Ok(file) = File::open(path) else {
        return false;
    };
    let mut n_records = 0;
    for record in fasta::Reader::new(file).records() {
        match record {
            Ok(record) if record.check().is_ok() && !record.seq().is_empty() => n_records += 1,
            _ => return false,
        }
    }
    n_records > 0
}

/// Every row must have a FASTA file `<fasta_root>/<code>.fasta` with at least
/// one record.
pub fn valid_fasta_files(table: &ConstructTable, fasta_root: &Path) -> Result<(), PrecheckError> {
    table.check_columns(&["code"][..])?;
    for (i, row) in table.rows().iter().enumerate() {
        let path = fasta_root.join(format!("{}.fasta", row.require_code(i)?));
        let root = fasta_root.to_path_buf();
        if !path.is_file() {
            return Err(PrecheckError::MissingFasta { path, root });
        }
        if !is_valid_fasta(&path) {
            return Err(PrecheckError::InvalidFasta { path, root });
        }
    }
    Ok(())
}

fn check_structure_table(path: &Path) -> Result<(), String> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| e.to_string())?;
    let columns: Vec<String> = reader
        .headers()
        .map_err(|e| e.to_string())?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    check_columns(&columns, &STRUCTURE_COLUMNS[..]).map_err(|e| e.to_string())?;
    let mut n_rows = 0;
    for record in reader.records() {
        record.map_err(|e| e.to_string())?;
        n_rows += 1;
    }
    if n_rows == 0 {
        return Err("it has no rows".to_string());
    }
    Ok(())
}

/// Every row must have a secondary structure table `<table_root>/<code>.csv`.
pub fn valid_table_files(table: &ConstructTable, table_root: &Path) -> Result<(), PrecheckError> {
    table.check_columns(&["code"][..])?;
    for (i, row) in table.rows().iter().enumerate() {
        let path = table_root.join(format!("{}.csv", row.require_code(i)?));
        let root = table_root.to_path_buf();
        if !path.is_file() {
            return Err(PrecheckError::MissingStructureTable { path, root });
        }
        if let Err(reason) = check_structure_table(&path) {
            return Err(PrecheckError::InvalidStructureTable { path, root, reason });
        }
    }
    Ok(())
}

/// Run every check. The first failure is logged and returned.
pub fn precheck(
    table: &ConstructTable,
    data_root: &Path,
    fasta_root: &Path,
    table_root: &Path,
) -> Result<(), PrecheckError> {
    let result = valid_fastq_files(table, data_root)
        .and_then(|()| valid_fasta_files(table, fasta_root))
        .and_then(|()| valid_table_files(table, table_root));
    if let Err(err) = &result {
        error!("{err}");
    }
    result
}

#[cfg(test)]
pub(crate) mod testing {
    use anyhow::Result;
    use std::path::{Path, PathBuf};

    pub const TABLE: &str = "\
barcode,barcode_seq,construct,code,data_type
A1,AAAGAAT,mttr6,C0001,DMS
A2,TTCGAAT,uucg,C0002,DMS
";

    pub struct Layout {
        pub data_root: PathBuf,
        pub fasta_root: PathBuf,
        pub table_root: PathBuf,
    }

    /// Create demultiplexed reads, fastas and structure tables for [`TABLE`].
    pub fn write_layout(root: &Path) -> Result<Layout> {
        let data_root = root.join("demultiplexed");
        let seq_root = root.join("seq");
        let fasta_root = seq_root.join("fasta");
        let table_root = seq_root.join("rna");
        std::fs::create_dir_all(&fasta_root)?;
        std::fs::create_dir_all(&table_root)?;
        for (seq, code) in [("AAAGAAT", "C0001"), ("TTCGAAT", "C0002")] {
            let dir = data_root.join(seq);
            std::fs::create_dir_all(&dir)?;
            for read in ["R1", "R2"] {
                std::fs::write(
                    dir.join(format!("test_S1_L001_{read}_001.fastq")),
                    "@read1\nGGAAGAUCGAGUAGA\n+\nIIIIIIIIIIIIIII\n",
                )?;
            }
            std::fs::write(
                fasta_root.join(format!("{code}.fasta")),
                format!(">{code}\nGGAAGAUCGAGUAGAUCAAAGAAT\n"),
            )?;
            std::fs::write(
                table_root.join(format!("{code}.csv")),
                format!("name,sequence,structure\n{code},GGAAGAUC,((....))\n"),
            )?;
        }
        Ok(Layout {
            data_root,
            fasta_root,
            table_root,
        })
    }
}
