use crate::barcodes::BarcodeSet;
use crate::counts::DemuxCounts;
use crate::{check_output_dir, clean_up, run_tool, stage_fastqs};
use crate::{Demultiplex, DemuxError, DemuxSummary};
use anyhow::{Context, Result};
use fastq_pair::PairedFastqFiles;
use log::info;
use parameters_yaml::DemultiplexParams;
use rmt_types::{ConstructTable, NO_CALL_DIR, STAGED_R1_FASTQ, STAGED_R2_FASTQ};
use std::path::{Path, PathBuf};

/// Barcode definition file written for novobarcode.
pub const BARCODE_FILE: &str = "rtb_barcodes.fa";
/// Per-barcode read counts parsed from the novobarcode report.
pub const COUNTS_CSV: &str = "demultiplex.csv";

#[derive(Debug, Clone)]
pub struct NovobarcodeDemultiplexer {
    program: PathBuf,
    params: DemultiplexParams,
}

impl Default for NovobarcodeDemultiplexer {
    fn default() -> Self {
        NovobarcodeDemultiplexer {
            program: PathBuf::from("novobarcode"),
            params: DemultiplexParams::default(),
        }
    }
}

impl NovobarcodeDemultiplexer {
    /// Use `program` instead of looking up `novobarcode` on the PATH.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn params(&self) -> &DemultiplexParams {
        &self.params
    }
}

impl Demultiplex for NovobarcodeDemultiplexer {
    fn configure(&mut self, params: &DemultiplexParams) {
        self.params = params.clone();
    }

    fn execute(
        &self,
        table: &ConstructTable,
        fastqs: &PairedFastqFiles,
        output_dir: &Path,
    ) -> Result<DemuxSummary> {
        check_output_dir(output_dir)?;
        stage_fastqs(fastqs, output_dir)?;

        info!("preparing {BARCODE_FILE} file for demultiplexing");
        let barcodes = BarcodeSet::from_table(table);
        let barcode_file = output_dir.join(BARCODE_FILE);
        std::fs::write(&barcode_file, barcodes.novobarcode_file())
            .with_context(|| barcode_file.display().to_string())?;

        let (stdout, stderr) = run_tool(
            &self.program,
            ["-b", BARCODE_FILE, "-f", STAGED_R1_FASTQ, STAGED_R2_FASTQ],
            output_dir,
        )?;
        info!("output from novobarcode:\n{stdout}{stderr}");

        let counts = DemuxCounts::parse(&stdout);
        counts.write_csv(&output_dir.join(COUNTS_CSV))?;
        info!("total number of reads: {}", counts.total());
        info!("total number of data reads: {}", counts.matched());

        let no_call_dir = output_dir.join(NO_CALL_DIR);
        if !no_call_dir.is_dir() {
            return Err(DemuxError::NothingGenerated {
                program: self.program.display().to_string(),
                path: no_call_dir,
            }
            .into());
        }

        clean_up(&self.params, output_dir)?;

        Ok(DemuxSummary {
            unique_barcodes: barcodes.rows().len(),
            duplicates: barcodes.duplicates().to_vec(),
            counts: Some(counts),
        })
    }
}
