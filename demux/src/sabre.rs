use crate::barcodes::BarcodeSet;
use crate::{check_output_dir, clean_up, run_tool, stage_fastqs};
use crate::{Demultiplex, DemuxSummary};
use anyhow::{Context, Result};
use fastq_pair::PairedFastqFiles;
use io_utils::gzip_files;
use log::info;
use parameters_yaml::DemultiplexParams;
use rmt_types::{ConstructTable, NO_CALL_DIR, STAGED_R1_FASTQ, STAGED_R2_FASTQ};
use std::path::{Path, PathBuf};

pub const BARCODE_FILE: &str = "barcode.txt";

/// Maximum number of mismatches sabre tolerates in a barcode.
const MAX_MISMATCHES: &str = "4";

#[derive(Debug, Clone)]
pub struct SabreDemultiplexer {
    program: PathBuf,
    params: DemultiplexParams,
}

impl Default for SabreDemultiplexer {
    fn default() -> Self {
        SabreDemultiplexer {
            program: PathBuf::from("sabre"),
            params: DemultiplexParams::default(),
        }
    }
}

impl SabreDemultiplexer {
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn params(&self) -> &DemultiplexParams {
        &self.params
    }
}

impl Demultiplex for SabreDemultiplexer {
    fn configure(&mut self, params: &DemultiplexParams) {
        self.params = params.clone();
    }

    /// Sabre writes one directory per barcode sequence plus `NC`, each holding
    /// a read pair. The per-barcode pairs are gzipped afterwards.
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
        std::fs::write(&barcode_file, barcodes.sabre_file())
            .with_context(|| barcode_file.display().to_string())?;
        for row in barcodes.rows() {
            let dir = output_dir.join(&row.barcode_seq);
            std::fs::create_dir_all(&dir).with_context(|| dir.display().to_string())?;
        }
        let no_call_dir = output_dir.join(NO_CALL_DIR);
        std::fs::create_dir_all(&no_call_dir).with_context(|| no_call_dir.display().to_string())?;

        let no_call_r1 = format!("{NO_CALL_DIR}/{STAGED_R1_FASTQ}");
        let no_call_r2 = format!("{NO_CALL_DIR}/{STAGED_R2_FASTQ}");
        let (stdout, stderr) = run_tool(
            &self.program,
            [
                "pe",
                "-f",
                STAGED_R1_FASTQ,
                "-r",
                STAGED_R2_FASTQ,
                "-b",
                BARCODE_FILE,
                "-u",
                no_call_r1.as_str(),
                "-w",
                no_call_r2.as_str(),
                "-m",
                MAX_MISMATCHES,
            ],
            output_dir,
        )?;
        info!("output from sabre:\n{stdout}{stderr}");

        for row in barcodes.rows() {
            let compressed = gzip_files(&output_dir.join(&row.barcode_seq))?;
            info!("compressed {} files for {}", compressed.len(), row.barcode);
        }

        clean_up(&self.params, output_dir)?;

        Ok(DemuxSummary {
            unique_barcodes: barcodes.rows().len(),
            duplicates: barcodes.duplicates().to_vec(),
            counts: None,
        })
    }
}
