//! Run rna-map once per construct of a demultiplexed sequencing run.
//!
//! Every input is checked by [`precheck`] before the first rna-map process
//! starts, so a missing file never leaves a run half done.

pub mod precheck;

use anyhow::{ensure, Context, Result};
use io_utils::find_program;
use itertools::Itertools;
use log::info;
use parameters_yaml::RunMultiParams;
use rmt_types::ConstructTable;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

pub use precheck::{precheck, valid_fasta_files, valid_fastq_files, valid_table_files, PrecheckError};

pub const PROCESSED_DIR: &str = "processed";
pub const ANALYSIS_DIR: &str = "analysis";

/// Where a multi-run reads its inputs and writes its outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunMultiInputs {
    /// Existing directory receiving `processed/` and `analysis/`.
    pub run_dir: PathBuf,
    /// Demultiplexed reads, one directory per barcode sequence.
    pub data_root: PathBuf,
    /// `<code>.fasta` reference sequences.
    pub fasta_root: PathBuf,
    /// `<code>.csv` secondary structure tables.
    pub table_root: PathBuf,
}

impl RunMultiInputs {
    /// Inputs laid out as `<seq_root>/fasta` and `<seq_root>/rna`.
    pub fn from_seq_root(run_dir: PathBuf, data_root: PathBuf, seq_root: &Path) -> Self {
        RunMultiInputs {
            run_dir,
            data_root,
            fasta_root: seq_root.join("fasta"),
            table_root: seq_root.join("rna"),
        }
    }
}

/// One rna-map invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RnaMapJob {
    /// `processed/<construct>_<code>_<data_type>`, the working directory.
    pub dir: PathBuf,
    pub fasta: PathBuf,
    pub fastq_1: PathBuf,
    pub fastq_2: PathBuf,
    pub dot_bracket: PathBuf,
}

impl RnaMapJob {
    pub fn args(&self, params_file: Option<&Path>) -> Vec<PathBuf> {
        let mut args = vec![
            "-fa".into(),
            self.fasta.clone(),
            "-fq1".into(),
            self.fastq_1.clone(),
            "-fq2".into(),
            self.fastq_2.clone(),
            "--dot-bracket".into(),
            self.dot_bracket.clone(),
        ];
        if let Some(params_file) = params_file {
            args.push("--param-file".into());
            args.push(params_file.to_path_buf());
        }
        args
    }
}

/// Build one job per table row. The reads are sequenced from the reverse
/// strand, so read 2 is passed as the first mate and read 1 as the second.
pub fn plan_jobs(table: &ConstructTable, inputs: &RunMultiInputs) -> Result<Vec<RnaMapJob>> {
    let processed = inputs.run_dir.join(PROCESSED_DIR);
    table
        .rows()
        .iter()
        .enumerate()
        .map(|(i, row)| -> Result<RnaMapJob> {
            let code = row.require_code(i)?;
            let data_type = row.require_data_type(i)?;
            let pair = precheck::row_fastqs(row, &inputs.data_root)?;
            Ok(RnaMapJob {
                dir: processed.join(format!("{}_{code}_{data_type}", row.construct)),
                fasta: inputs.fasta_root.join(format!("{code}.fasta")),
                fastq_1: pair.read_2().path().to_path_buf(),
                fastq_2: pair.read_1().path().to_path_buf(),
                dot_bracket: inputs.table_root.join(format!("{code}.csv")),
            })
        })
        .collect()
}

/// Check all inputs, then run rna-map for every construct of `table`.
/// Returns the per-construct output directories.
pub fn runmulti(
    table: &ConstructTable,
    inputs: &RunMultiInputs,
    params: &RunMultiParams,
) -> Result<Vec<PathBuf>> {
    runmulti_with(Path::new("rna-map"), table, inputs, params)
}

/// [`runmulti`] with an explicit rna-map executable.
pub fn runmulti_with(
    program: &Path,
    table: &ConstructTable,
    inputs: &RunMultiInputs,
    params: &RunMultiParams,
) -> Result<Vec<PathBuf>> {
    ensure!(
        inputs.run_dir.is_dir(),
        "{} does not exist cannot run multi",
        inputs.run_dir.display()
    );
    let program = find_program(program).ok_or_else(|| PrecheckError::MissingProgram {
        program: program.display().to_string(),
    })?;
    precheck(
        table,
        &inputs.data_root,
        &inputs.fasta_root,
        &inputs.table_root,
    )?;
    // rna-map runs inside each job directory, so relative paths would not resolve there.
    let params_file = match &params.rna_map_params_file {
        Some(path) => {
            ensure!(
                path.is_file(),
                "rna-map parameter file {} does not exist",
                path.display()
            );
            let path = std::fs::canonicalize(path)
                .with_context(|| format!("resolving {}", path.display()))?;
            Some(path)
        }
        None => None,
    };

    let jobs = plan_jobs(table, inputs)?;
    for dir in [PROCESSED_DIR, ANALYSIS_DIR] {
        let path = inputs.run_dir.join(dir);
        std::fs::create_dir_all(&path).with_context(|| path.display().to_string())?;
    }

    for job in &jobs {
        std::fs::create_dir_all(&job.dir).with_context(|| job.dir.display().to_string())?;
        let args = job.args(params_file.as_deref());
        info!(
            "running: `{} {}` in {}",
            program.display(),
            args.iter().map(|a| a.display()).join(" "),
            job.dir.display()
        );

        let mut cmd = Command::new(&program);
        cmd.args(&args).current_dir(&job.dir);
        if params.hide_rna_map_output {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
        }
        let status = cmd
            .status()
            .with_context(|| format!("running {}", program.display()))?;
        ensure!(
            status.success(),
            "rna-map failed in {} with {status}",
            job.dir.display()
        );
    }
    Ok(jobs.into_iter().map(|job| job.dir).collect())
}

#[cfg(test)]
mod tests {
    use super::precheck::testing::*;
    use super::*;

    fn inputs(root: &Path, layout: Layout) -> RunMultiInputs {
        RunMultiInputs {
            run_dir: root.to_path_buf(),
            data_root: layout.data_root,
            fasta_root: layout.fasta_root,
            table_root: layout.table_root,
        }
    }

    #[test]
    fn test_plan_jobs() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let layout = write_layout(dir.path())?;
        let data_root = layout.data_root.clone();
        let inputs = inputs(dir.path(), layout);
        let table = ConstructTable::from_reader(TABLE.as_bytes())?;

        let jobs = plan_jobs(&table, &inputs)?;
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].dir, dir.path().join("processed/mttr6_C0001_DMS"));
        assert_eq!(
            jobs[0].fastq_1,
            data_root.join("AAAGAAT/test_S1_L001_R2_001.fastq")
        );
        assert_eq!(
            jobs[0].fastq_2,
            data_root.join("AAAGAAT/test_S1_L001_R1_001.fastq")
        );
        assert_eq!(jobs[1].fasta, inputs.fasta_root.join("C0002.fasta"));
        assert_eq!(jobs[1].dot_bracket, inputs.table_root.join("C0002.csv"));

        let args = jobs[0].args(Some(Path::new("rna_map.yml")));
        assert_eq!(args[0], PathBuf::from("-fa"));
        assert_eq!(args[8..], [PathBuf::from("--param-file"), "rna_map.yml".into()]);
        Ok(())
    }

    #[test]
    fn test_legacy_columns() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let layout = write_layout(dir.path())?;
        let inputs = inputs(dir.path(), layout);
        let table = ConstructTable::from_reader(
            "barcode,barcode_seq,name,code,type\nA1,AAAGAAT,mttr6,C0001,DMS\n".as_bytes(),
        )?;
        let jobs = plan_jobs(&table, &inputs)?;
        assert_eq!(jobs[0].dir, dir.path().join("processed/mttr6_C0001_DMS"));
        Ok(())
    }

    #[test]
    fn test_missing_run_dir() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let layout = write_layout(dir.path())?;
        let mut inputs = inputs(dir.path(), layout);
        inputs.run_dir = dir.path().join("nope");
        let table = ConstructTable::from_reader(TABLE.as_bytes())?;
        let err = runmulti(&table, &inputs, &RunMultiParams::default()).unwrap_err();
        assert!(err.to_string().contains("does not exist cannot run multi"));
        Ok(())
    }

    #[cfg(unix)]
    mod with_fake_rna_map {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        /// Records its arguments in the working directory.
        fn fake_rna_map(dir: &Path, body: &str) -> Result<PathBuf> {
            let path = dir.join("rna-map");
            std::fs::write(&path, format!("#!/bin/sh\nset -e\n{body}"))?;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
            Ok(path)
        }

        #[test]
        fn test_runmulti() -> Result<()> {
            let dir = tempfile::tempdir()?;
            let layout = write_layout(dir.path())?;
            let inputs = inputs(dir.path(), layout);
            let program = fake_rna_map(dir.path(), "echo \"$@\" > args.txt\n")?;
            let table = ConstructTable::from_reader(TABLE.as_bytes())?;
            let params_file = dir.path().join("rna_map.yml");
            std::fs::write(&params_file, "map:\n  skip_fastqc: true\n")?;
            let params = RunMultiParams {
                rna_map_params_file: Some(params_file.clone()),
                hide_rna_map_output: true,
            };

            let dirs = runmulti_with(&program, &table, &inputs, &params)?;
            assert_eq!(
                dirs,
                [
                    dir.path().join("processed/mttr6_C0001_DMS"),
                    dir.path().join("processed/uucg_C0002_DMS")
                ]
            );
            assert!(dir.path().join(ANALYSIS_DIR).is_dir());
            let args = std::fs::read_to_string(dirs[1].join("args.txt"))?;
            assert!(args.starts_with(&format!(
                "-fa {}",
                inputs.fasta_root.join("C0002.fasta").display()
            )));
            assert!(args.contains("TTCGAAT/test_S1_L001_R2_001.fastq -fq2"));
            assert!(args
                .trim_end()
                .ends_with(&format!(
                    "--param-file {}",
                    std::fs::canonicalize(&params_file)?.display()
                )));
            Ok(())
        }

        #[test]
        fn test_relative_params_file() -> Result<()> {
            let dir = tempfile::tempdir()?;
            let layout = write_layout(dir.path())?;
            let inputs = inputs(dir.path(), layout);
            let program = fake_rna_map(
                dir.path(),
                "for last; do :; done\ntest -f \"$last\"\necho \"$last\" > params_path.txt\n",
            )?;
            let table = ConstructTable::from_reader(TABLE.as_bytes())?;

            // relative to the working directory of the test, not of rna-map
            let params_dir = tempfile::tempdir_in(".")?;
            let params_file = params_dir.path().join("rna_map.yml");
            assert!(params_file.is_relative());
            std::fs::write(&params_file, "map:\n  skip_fastqc: true\n")?;
            let params = RunMultiParams {
                rna_map_params_file: Some(params_file.clone()),
                hide_rna_map_output: true,
            };

            let dirs = runmulti_with(&program, &table, &inputs, &params)?;
            let passed = std::fs::read_to_string(dirs[0].join("params_path.txt"))?;
            assert_eq!(
                PathBuf::from(passed.trim_end()),
                std::fs::canonicalize(&params_file)?
            );
            Ok(())
        }

        #[test]
        fn test_precheck_failure_runs_nothing() -> Result<()> {
            let dir = tempfile::tempdir()?;
            let layout = write_layout(dir.path())?;
            std::fs::remove_file(layout.fasta_root.join("C0002.fasta"))?;
            let inputs = inputs(dir.path(), layout);
            let program = fake_rna_map(dir.path(), "touch args.txt\n")?;
            let table = ConstructTable::from_reader(TABLE.as_bytes())?;

            let err = runmulti_with(&program, &table, &inputs, &RunMultiParams::default())
                .unwrap_err();
            assert!(matches!(
                err.downcast_ref::<PrecheckError>(),
                Some(PrecheckError::MissingFasta { .. })
            ));
            assert!(!dir.path().join(PROCESSED_DIR).exists());
            Ok(())
        }

        #[test]
        fn test_rna_map_failure() -> Result<()> {
            let dir = tempfile::tempdir()?;
            let layout = write_layout(dir.path())?;
            let inputs = inputs(dir.path(), layout);
            let program = fake_rna_map(dir.path(), "exit 2\n")?;
            let table = ConstructTable::from_reader(TABLE.as_bytes())?;

            let err = runmulti_with(&program, &table, &inputs, &RunMultiParams::default())
                .unwrap_err();
            assert!(err.to_string().starts_with("rna-map failed in"));
            Ok(())
        }
    }
}
