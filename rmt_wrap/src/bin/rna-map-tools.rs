//! rna-map-tools
#![deny(missing_docs)]

use anyhow::{Context, Result};
use clap::Parser;
use demux::{Demultiplex, Demultiplexer};
use fastq_pair::find_paired_fastqs;
use log::{info, warn};
use parameters_yaml::DemuxBackend;
use rmt_types::ConstructTable;
use rmt_wrap::download::{self, resolve_download_dir, BASESPACE_ENV};
use rmt_wrap::utils::CliPath;
use rmt_wrap::{load_params, logging};
use runmulti::{RunMultiInputs, ANALYSIS_DIR, PROCESSED_DIR};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

const CMD: &str = "rna-map-tools";

/// Download, demultiplex and map chemical probing sequencing runs
#[derive(Parser, Debug)]
#[clap(name = CMD, version)]
struct RnaMapTools {
    #[clap(subcommand)]
    subcmd: SubCommand,
}

#[derive(Parser, Debug)]
enum SubCommand {
    /// Download a run using the bs command line tool.
    #[clap(name = "download")]
    Download(Download),

    /// Demultiplex paired fastq files given 3' end barcodes.
    #[clap(name = "demultiplex")]
    Demultiplex(DemultiplexCmd),

    /// Run rna-map on every construct of a demultiplexed run.
    #[clap(name = "runmulti")]
    RunMulti(RunMulti),
}

#[derive(Parser, Debug)]
struct Download {
    /// Name of the BaseSpace project to download.
    run_name: String,

    /// Root directory of where data should be downloaded, defaults to $BASESPACE.
    #[clap(short = 'd', long = "download-dir")]
    download_dir: Option<PathBuf>,

    /// YAML parameter file.
    #[clap(long)]
    params: Option<CliPath>,

    /// Log debug messages.
    #[clap(long)]
    debug: bool,
}

#[derive(Parser, Debug)]
struct DemultiplexCmd {
    /// Construct table with the columns barcode, barcode_seq and construct.
    csv: CliPath,

    /// Directory holding the paired fastq files of the run.
    fastq_dir: CliPath,

    /// Existing directory receiving the demultiplexed reads.
    #[clap(long, default_value = ".")]
    output_dir: PathBuf,

    /// Demultiplexing program, overrides demultiplex.backend of the parameters.
    #[clap(long)]
    backend: Option<DemuxBackend>,

    /// YAML parameter file.
    #[clap(long)]
    params: Option<CliPath>,

    /// Log debug messages.
    #[clap(long)]
    debug: bool,
}

#[derive(Parser, Debug)]
struct RunMulti {
    /// Construct table with the columns barcode, barcode_seq, construct, code and data_type.
    csv: CliPath,

    /// Demultiplexed reads, one directory per barcode sequence.
    data_dir: CliPath,

    /// Sequence data root holding fasta/<code>.fasta and rna/<code>.csv.
    seq_path: CliPath,

    /// Directory of <code>.fasta files, defaults to SEQ_PATH/fasta.
    #[clap(long)]
    fasta_dir: Option<CliPath>,

    /// Directory of <code>.csv structure tables, defaults to SEQ_PATH/rna.
    #[clap(long)]
    table_dir: Option<CliPath>,

    /// Existing directory receiving processed/ and analysis/.
    #[clap(long, default_value = ".")]
    run_dir: PathBuf,

    /// Do not show the output of rna-map.
    #[clap(long)]
    hide_rna_map_output: bool,

    /// YAML parameter file.
    #[clap(long)]
    params: Option<CliPath>,

    /// Log debug messages.
    #[clap(long)]
    debug: bool,
}

/// Log into `<dir>/<name>` when `dir` exists, otherwise only to stderr.
fn init_logging(dir: &Path, name: &str, debug: bool) -> Result<()> {
    let log_file = dir.is_dir().then(|| dir.join(name));
    logging::init(log_file.as_deref(), debug)
}

fn run_download(args: Download) -> Result<ExitCode> {
    let download_dir =
        resolve_download_dir(args.download_dir.as_deref(), std::env::var_os(BASESPACE_ENV));
    let log_dir = download_dir.as_deref().unwrap_or(Path::new("."));
    init_logging(log_dir, "download.log", args.debug)?;

    let download_dir = download_dir?;
    let params = load_params(args.params.as_deref())?;
    let pair = download::download(&args.run_name, &download_dir, &params.download)?;
    info!("read 1: {}", pair.read_1());
    info!("read 2: {}", pair.read_2());
    Ok(ExitCode::SUCCESS)
}

fn run_demultiplex(args: DemultiplexCmd) -> Result<ExitCode> {
    init_logging(&args.output_dir, "demultiplex.log", args.debug)?;

    let mut params = load_params(args.params.as_deref())?;
    if let Some(backend) = args.backend {
        params.demultiplex.backend = backend;
    }
    let table = ConstructTable::from_path(&args.csv)?;
    let fastqs = find_paired_fastqs(&args.fastq_dir)?;
    info!(
        "demultiplexing {} and {} with {}",
        fastqs.read_1(),
        fastqs.read_2(),
        params.demultiplex.backend
    );

    let summary = Demultiplexer::from_params(&params.demultiplex)
        .execute(&table, &fastqs, &args.output_dir)
        .context("demultiplexing failed")?;
    if !summary.duplicates.is_empty() {
        warn!(
            "skipped {} rows with a duplicated barcode",
            summary.duplicates.len()
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn run_runmulti(args: RunMulti) -> Result<ExitCode> {
    init_logging(&args.run_dir, "run_multi.log", args.debug)?;

    let mut params = load_params(args.params.as_deref())?;
    if args.hide_rna_map_output {
        params.runmulti.hide_rna_map_output = true;
    }
    let table = ConstructTable::from_path(&args.csv)?;

    let mut inputs = RunMultiInputs::from_seq_root(
        args.run_dir.clone(),
        args.data_dir.into(),
        &args.seq_path,
    );
    if let Some(fasta_dir) = args.fasta_dir {
        inputs.fasta_root = fasta_dir.into();
    }
    if let Some(table_dir) = args.table_dir {
        inputs.table_root = table_dir.into();
    }
    info!("creating {PROCESSED_DIR}/ all rna-map runs will go here");
    info!("creating {ANALYSIS_DIR}/ all finalized analysis will go here");

    let dirs = runmulti::runmulti(&table, &inputs, &params.runmulti)?;
    info!("finished {} rna-map runs", dirs.len());
    Ok(ExitCode::SUCCESS)
}

fn inner_main() -> Result<ExitCode> {
    let opts = RnaMapTools::parse();
    match opts.subcmd {
        SubCommand::Download(args) => run_download(args),
        SubCommand::Demultiplex(args) => run_demultiplex(args),
        SubCommand::RunMulti(args) => run_runmulti(args),
    }
}

fn main() -> ExitCode {
    match inner_main() {
        Ok(exit_code) => exit_code,
        Err(err) => {
            rmt_wrap::utils::print_error_chain(&err);
            ExitCode::FAILURE
        }
    }
}
