//! Split a paired FASTQ run into per-barcode reads with an external program.
//!
//! Two programs are supported, [`novobarcode::NovobarcodeDemultiplexer`] and
//! [`sabre::SabreDemultiplexer`], selected through [`Demultiplexer`]. Both
//! stage the input pair under fixed names inside the output directory, write
//! a barcode definition file from the construct table and run the program
//! there. No process wide state is touched: the program gets the output
//! directory as its working directory.

pub mod barcodes;
pub mod counts;
pub mod novobarcode;
pub mod sabre;

use anyhow::{Context, Result};
use fastq_pair::{FastqFile, PairedFastqFiles};
use io_utils::{decompress_gz, find_program};
use itertools::Itertools;
use log::info;
use parameters_yaml::{DemultiplexParams, DemuxBackend};
use rmt_types::{ConstructTable, NO_CALL_DIR, STAGED_R1_FASTQ, STAGED_R2_FASTQ};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

pub use barcodes::BarcodeSet;
pub use counts::{DemuxCount, DemuxCounts};
pub use novobarcode::NovobarcodeDemultiplexer;
pub use sabre::SabreDemultiplexer;

#[derive(Debug, thiserror::Error)]
pub enum DemuxError {
    #[error("{path:?} does not exist")]
    MissingOutputDir { path: PathBuf },

    #[error("cannot find program '{program}', please install it")]
    MissingProgram { program: String },

    #[error("{program} failed with {status}:\n{output}")]
    ToolFailed {
        program: String,
        status: ExitStatus,
        output: String,
    },

    #[error("{program} did not produce {path:?}, nothing was generated")]
    NothingGenerated { program: String, path: PathBuf },
}

/// What a demultiplexing run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemuxSummary {
    /// Number of barcodes written to the barcode definition file.
    pub unique_barcodes: usize,
    /// Barcode ids of the rows skipped as duplicates.
    pub duplicates: Vec<String>,
    /// Read counts, for programs that report them.
    pub counts: Option<DemuxCounts>,
}

/// A program that splits reads by barcode.
pub trait Demultiplex {
    /// Store the runtime options for later `execute` calls.
    fn configure(&mut self, params: &DemultiplexParams);

    /// Demultiplex `fastqs` into `output_dir`, which must exist.
    fn execute(
        &self,
        table: &ConstructTable,
        fastqs: &PairedFastqFiles,
        output_dir: &Path,
    ) -> Result<DemuxSummary>;
}

/// The supported demultiplexing programs.
#[derive(Debug, Clone)]
pub enum Demultiplexer {
    Novobarcode(NovobarcodeDemultiplexer),
    Sabre(SabreDemultiplexer),
}

impl Demultiplexer {
    pub fn new(backend: DemuxBackend) -> Self {
        match backend {
            DemuxBackend::Novobarcode => Demultiplexer::Novobarcode(Default::default()),
            DemuxBackend::Sabre => Demultiplexer::Sabre(Default::default()),
        }
    }

    /// Build the demultiplexer named by `params.backend`, configured with `params`.
    pub fn from_params(params: &DemultiplexParams) -> Self {
        let mut demultiplexer = Demultiplexer::new(params.backend);
        demultiplexer.configure(params);
        demultiplexer
    }
}

impl Demultiplex for Demultiplexer {
    fn configure(&mut self, params: &DemultiplexParams) {
        match self {
            Demultiplexer::Novobarcode(d) => d.configure(params),
            Demultiplexer::Sabre(d) => d.configure(params),
        }
    }

    fn execute(
        &self,
        table: &ConstructTable,
        fastqs: &PairedFastqFiles,
        output_dir: &Path,
    ) -> Result<DemuxSummary> {
        match self {
            Demultiplexer::Novobarcode(d) => d.execute(table, fastqs, output_dir),
            Demultiplexer::Sabre(d) => d.execute(table, fastqs, output_dir),
        }
    }
}

pub(crate) fn check_output_dir(output_dir: &Path) -> Result<(), DemuxError> {
    if output_dir.is_dir() {
        Ok(())
    } else {
        Err(DemuxError::MissingOutputDir {
            path: output_dir.to_path_buf(),
        })
    }
}

fn stage_one(fastq: &FastqFile, dest: &Path) -> Result<()> {
    if fastq.is_compressed() {
        info!("unzipping {fastq} -> {}", dest.display());
        decompress_gz(fastq.path(), dest)?;
    } else {
        info!("copying {fastq} -> {}", dest.display());
        std::fs::copy(fastq.path(), dest)
            .with_context(|| format!("copying {fastq} to {}", dest.display()))?;
    }
    Ok(())
}

/// Place uncompressed copies of the pair in `output_dir` under the canonical
/// staged names and return their paths.
pub fn stage_fastqs(fastqs: &PairedFastqFiles, output_dir: &Path) -> Result<(PathBuf, PathBuf)> {
    let r1 = output_dir.join(STAGED_R1_FASTQ);
    let r2 = output_dir.join(STAGED_R2_FASTQ);
    stage_one(fastqs.read_1(), &r1)?;
    stage_one(fastqs.read_2(), &r2)?;
    Ok((r1, r2))
}

/// Remove the staged inputs and the unmatched reads as requested by `params`.
pub(crate) fn clean_up(params: &DemultiplexParams, output_dir: &Path) -> Result<()> {
    if params.delete_fastqs {
        info!("deleting copied fastq files");
        for name in [STAGED_R1_FASTQ, STAGED_R2_FASTQ] {
            let path = output_dir.join(name);
            std::fs::remove_file(&path).with_context(|| path.display().to_string())?;
        }
    }
    if params.delete_non_barcoded {
        info!("deleting reads that do not have a barcode");
        let path = output_dir.join(NO_CALL_DIR);
        std::fs::remove_dir_all(&path).with_context(|| path.display().to_string())?;
    }
    Ok(())
}

/// Run `program` synchronously in `working_dir` and return its stdout and stderr.
/// A non-zero exit is an error carrying both streams.
pub(crate) fn run_tool<I, S>(
    program: &Path,
    args: I,
    working_dir: &Path,
) -> Result<(String, String)>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let name = program.display().to_string();
    let resolved =
        find_program(program).ok_or_else(|| DemuxError::MissingProgram { program: name.clone() })?;

    let args = args
        .into_iter()
        .map(|a| a.as_ref().to_os_string())
        .collect_vec();
    info!(
        "running: `{name} {}`",
        args.iter().map(|a| a.to_string_lossy()).join(" ")
    );
    let output = Command::new(&resolved)
        .args(&args)
        .current_dir(working_dir)
        .output()
        .with_context(|| format!("running {name} in {}", working_dir.display()))?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    if !output.status.success() {
        return Err(DemuxError::ToolFailed {
            program: name,
            status: output.status,
            output: format!("{stdout}{stderr}"),
        }
        .into());
    }
    Ok((stdout, stderr))
}
