//! Download a sequencing run from BaseSpace with the `bs` command line tool.

use anyhow::{ensure, Context, Result};
use fastq_pair::{find_paired_fastqs, PairedFastqFiles};
use io_utils::find_program;
use log::{debug, info};
use parameters_yaml::DownloadParams;
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};
use std::process::{Command, ExitStatus};

/// Environment variable naming the default download directory.
pub const BASESPACE_ENV: &str = "BASESPACE";

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("cannot find program '{program}', please install it")]
    MissingProgram { program: String },

    #[error("-d/--download-dir was not supplied and $BASESPACE is not set! set it or use -d/--download-dir")]
    NoDownloadDir,

    #[error("download directory {path:?} does not exist")]
    MissingDownloadDir { path: PathBuf },

    #[error("directory {path:?} already exists")]
    AlreadyExists { path: PathBuf },

    #[error("{program} failed with {status}")]
    Failed { program: String, status: ExitStatus },

    #[error("expected exactly one directory in {path:?} after the download, found {found}")]
    UnexpectedLayout { path: PathBuf, found: usize },
}

/// The directory to download into: `explicit` if given, otherwise the value of
/// `$BASESPACE` passed as `env`.
pub fn resolve_download_dir(
    explicit: Option<&Path>,
    env: Option<OsString>,
) -> Result<PathBuf, DownloadError> {
    if let Some(dir) = explicit {
        return Ok(dir.to_path_buf());
    }
    info!("-d/--download-dir was not supplied will use ${BASESPACE_ENV}");
    match env {
        Some(dir) if !dir.is_empty() => {
            let dir = PathBuf::from(dir);
            info!("${BASESPACE_ENV} -> {}", dir.display());
            Ok(dir)
        }
        _ => Err(DownloadError::NoDownloadDir),
    }
}

/// Download the BaseSpace project `run_name` into `<download_dir>/<run_name>`
/// and return the read pair it contains.
pub fn download(
    run_name: &str,
    download_dir: &Path,
    params: &DownloadParams,
) -> Result<PairedFastqFiles> {
    download_with(Path::new("bs"), run_name, download_dir, params)
}

/// [`download`] with an explicit `bs` executable.
pub fn download_with(
    program: &Path,
    run_name: &str,
    download_dir: &Path,
    params: &DownloadParams,
) -> Result<PairedFastqFiles> {
    let program = find_program(program).ok_or_else(|| DownloadError::MissingProgram {
        program: program.display().to_string(),
    })?;
    ensure!(
        matches!(
            Path::new(run_name).components().collect::<Vec<_>>()[..],
            [Component::Normal(_)]
        ),
        "run name {run_name:?} must not be empty or contain path separators"
    );
    if !download_dir.is_dir() {
        return Err(DownloadError::MissingDownloadDir {
            path: download_dir.to_path_buf(),
        }
        .into());
    }
    debug!("download_dir: {}", download_dir.display());

    let run_dir = download_dir.join(run_name);
    if run_dir.exists() {
        return Err(DownloadError::AlreadyExists { path: run_dir }.into());
    }
    std::fs::create_dir(&run_dir).with_context(|| run_dir.display().to_string())?;

    // Output is not captured, bs reports its progress on the terminal.
    info!("running: `bs download project --name {run_name}`");
    let status = Command::new(&program)
        .args(["download", "project", "--name", run_name])
        .current_dir(&run_dir)
        .status()
        .with_context(|| format!("running {}", program.display()))?;
    if !status.success() {
        return Err(DownloadError::Failed {
            program: program.display().to_string(),
            status,
        }
        .into());
    }

    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(&run_dir).with_context(|| run_dir.display().to_string())? {
        let path = entry?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    if dirs.len() != 1 {
        return Err(DownloadError::UnexpectedLayout {
            path: run_dir,
            found: dirs.len(),
        }
        .into());
    }
    let mut data_dir = dirs.remove(0);
    if params.rename_dir {
        let renamed = run_dir.join(&params.dir_name);
        info!("renaming {} to {}", data_dir.display(), renamed.display());
        std::fs::rename(&data_dir, &renamed)
            .with_context(|| format!("renaming {}", data_dir.display()))?;
        data_dir = renamed;
    }
    Ok(find_paired_fastqs(&data_dir)?)
}
