//! Locate and validate a read-1/read-2 FASTQ pair on disk.
//!
//! Files are paired by the Illumina `bcl2fastq` naming convention: the
//! read-1 file carries `_R1_` in its name and the read-2 file `_R2_`,
//! e.g. `C0098_S1_L001_R1_001.fastq.gz`.

use bio::io::fastq;
use glob::Pattern;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Marker in the file name of a read-1 FASTQ.
pub const R1_MARKER: &str = "_R1_";
/// Marker in the file name of a read-2 FASTQ.
pub const R2_MARKER: &str = "_R2_";

#[derive(Debug, thiserror::Error)]
pub enum FastqError {
    #[error("FASTQ file {path:?} does not exist")]
    DoesNotExist { path: PathBuf },

    #[error(
        "FASTQ file {path:?} is not R1 or R2. The file name must contain either \
         {R1_MARKER} or {R2_MARKER}"
    )]
    InvalidName { path: PathBuf },

    #[error("Expected {expected} but {path:?} is not marked as such")]
    WrongRead {
        path: PathBuf,
        expected: &'static str,
    },

    #[error("Could not find paired FASTQ files in {location}")]
    NotFound { location: String },

    #[error("Found more than one {marker} FASTQ file in {location}: {}", join_paths(.candidates))]
    Ambiguous {
        location: String,
        marker: &'static str,
        candidates: Vec<PathBuf>,
    },

    #[error("Invalid search pattern {pattern}")]
    BadPattern {
        pattern: String,
        source: glob::PatternError,
    },

    #[error(transparent)]
    Unreadable(#[from] glob::GlobError),
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths.iter().map(|p| p.display()).join(", ")
}

/// An existing FASTQ file, classified as read 1 or read 2 by its name.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "PathBuf", into = "PathBuf")]
pub struct FastqFile {
    path: PathBuf,
}

impl FastqFile {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, FastqError> {
        let path = path.into();
        if !path.exists() {
            return Err(FastqError::DoesNotExist { path });
        }
        let fq = FastqFile { path };
        if !fq.is_r1() && !fq.is_r2() {
            return Err(FastqError::InvalidName { path: fq.path });
        }
        Ok(fq)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn is_compressed(&self) -> bool {
        self.file_name().ends_with(".gz")
    }

    pub fn is_r1(&self) -> bool {
        self.file_name().contains(R1_MARKER)
    }

    pub fn is_r2(&self) -> bool {
        self.file_name().contains(R2_MARKER)
    }
}

impl TryFrom<PathBuf> for FastqFile {
    type Error = FastqError;

    fn try_from(path: PathBuf) -> Result<Self, Self::Error> {
        FastqFile::new(path)
    }
}

impl From<FastqFile> for PathBuf {
    fn from(fq: FastqFile) -> PathBuf {
        fq.path
    }
}

impl AsRef<Path> for FastqFile {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

impl fmt::Display for FastqFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.path.display(), f)
    }
}

/// A read-1 FASTQ and its read-2 mate.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PairedFastqFiles {
    read_1: FastqFile,
    read_2: FastqFile,
}

impl PairedFastqFiles {
    pub fn new(read_1: FastqFile, read_2: FastqFile) -> Result<Self, FastqError> {
        if !read_1.is_r1() {
            return Err(FastqError::WrongRead {
                path: read_1.path,
                expected: "read 1",
            });
        }
        if !read_2.is_r2() {
            return Err(FastqError::WrongRead {
                path: read_2.path,
                expected: "read 2",
            });
        }
        Ok(PairedFastqFiles { read_1, read_2 })
    }

    pub fn read_1(&self) -> &FastqFile {
        &self.read_1
    }

    pub fn read_2(&self) -> &FastqFile {
        &self.read_2
    }

    /// True only when both mates are gzip compressed.
    pub fn is_compressed(&self) -> bool {
        self.read_1.is_compressed() && self.read_2.is_compressed()
    }
}

fn glob_sorted(pattern: &str) -> Result<Vec<PathBuf>, FastqError> {
    let paths = glob::glob(pattern).map_err(|source| FastqError::BadPattern {
        pattern: pattern.to_string(),
        source,
    })?;
    let mut paths: Vec<_> = paths.collect::<Result<_, _>>()?;
    paths.sort();
    Ok(paths)
}

fn exactly_one(
    mut candidates: Vec<PathBuf>,
    location: &str,
    marker: &'static str,
) -> Result<PathBuf, FastqError> {
    match candidates.len() {
        0 => Err(FastqError::NotFound {
            location: location.to_string(),
        }),
        1 => Ok(candidates.remove(0)),
        _ => Err(FastqError::Ambiguous {
            location: location.to_string(),
            marker,
            candidates,
        }),
    }
}

/// Find the single `*_R1_*` / `*_R2_*` pair in `location`.
///
/// `location` is either a directory, searched for `<dir>/*_R1_*`, or a path
/// prefix such as `<dir>/test_S1`, in which case `<prefix>*_R1_*` is searched.
pub fn find_paired_fastqs(location: impl AsRef<Path>) -> Result<PairedFastqFiles, FastqError> {
    let location = location.as_ref();
    let display = location.display().to_string();
    let base = Pattern::escape(&location.to_string_lossy());
    let prefix = if location.is_dir() {
        format!("{}/", base.trim_end_matches('/'))
    } else {
        base
    };

    let r1 = glob_sorted(&format!("{prefix}*{R1_MARKER}*"))?;
    let r2 = glob_sorted(&format!("{prefix}*{R2_MARKER}*"))?;
    if r1.is_empty() || r2.is_empty() {
        return Err(FastqError::NotFound { location: display });
    }
    let r1 = exactly_one(r1, &display, R1_MARKER)?;
    let r2 = exactly_one(r2, &display, R2_MARKER)?;

    PairedFastqFiles::new(FastqFile::new(r1)?, FastqFile::new(r2)?)
}

/// Check that a FASTQ file, plain or gzipped, starts with a well formed record.
pub fn validate_fastq_file(path: impl AsRef<Path>) -> bool {
    let path = path.as_ref();
    let Ok(file) = File::open(path) else {
        return false;
    };
    let reader: Box<dyn BufRead> = if path.to_string_lossy().ends_with(".gz") {
        Box::new(BufReader::new(flate2::read::MultiGzDecoder::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };
    match fastq::Reader::new(reader).records().next() {
        Some(Ok(record)) => record.check().is_ok(),
        _ => false,
    }
}
