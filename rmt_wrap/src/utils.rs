use anyhow::{bail, Result};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Convert an io::error to a string and strip "(os error 2)" from the end.
fn io_error_to_string(err: &std::io::Error) -> String {
    let s = err.to_string();
    s.strip_suffix(&format!(" (os error {})", err.raw_os_error().unwrap_or(0)))
        .unwrap_or(&s)
        .to_string()
}

/// Format an error and its causes, one per line.
pub fn format_error_chain(err: &anyhow::Error) -> String {
    let error_chain = err.chain().join("\n\tCaused by: ");
    match err.downcast_ref::<std::io::Error>() {
        Some(io_err) => {
            let io_err_str = io_error_to_string(io_err);
            match err.chain().len() {
                1 => format!("ERROR: {io_err_str}"),
                2 => format!("ERROR: {io_err_str}: {err}"),
                _ => format!("ERROR: {error_chain}"),
            }
        }
        None => format!("ERROR: {error_chain}"),
    }
}

/// Print an error chain.
pub fn print_error_chain(err: &anyhow::Error) {
    println!("{}", format_error_chain(err));
}

/// An input path, canonicalized when parsed from the command line so that it
/// stays valid for child processes running in another directory.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(transparent)]
pub struct CliPath {
    path: PathBuf,
}

impl From<PathBuf> for CliPath {
    fn from(path: PathBuf) -> Self {
        CliPath { path }
    }
}

impl From<&Path> for CliPath {
    fn from(path: &Path) -> Self {
        CliPath {
            path: path.to_path_buf(),
        }
    }
}

impl FromStr for CliPath {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<CliPath> {
        match Path::new(s).canonicalize() {
            Ok(p) => Ok(CliPath::from(p)),
            Err(e) => bail!("{s}: {}", io_error_to_string(&e)),
        }
    }
}

impl Display for CliPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        Display::fmt(&self.path.display(), f)
    }
}

impl Debug for CliPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        Debug::fmt(&self.path, f)
    }
}

impl From<CliPath> for PathBuf {
    fn from(obj: CliPath) -> PathBuf {
        obj.path
    }
}

impl AsRef<Path> for CliPath {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

impl Deref for CliPath {
    type Target = Path;

    fn deref(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_cli_path() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let cli_path: CliPath = dir.path().to_str().context("utf-8 path")?.parse()?;
        assert_eq!(PathBuf::from(cli_path.clone()), dir.path().canonicalize()?);
        assert!(cli_path.is_dir());

        let missing = dir.path().join("missing.csv");
        let err = missing
            .to_str()
            .context("utf-8 path")?
            .parse::<CliPath>()
            .unwrap_err();
        assert!(err.to_string().ends_with("No such file or directory"));
        Ok(())
    }

    #[test]
    fn test_format_error_chain() {
        let err = anyhow::anyhow!("no fastqs found").context("demultiplexing failed");
        assert_eq!(
            format_error_chain(&err),
            "ERROR: demultiplexing failed\n\tCaused by: no fastqs found"
        );

        let io_err = std::io::Error::from_raw_os_error(2);
        let err = anyhow::Error::new(io_err);
        assert_eq!(format_error_chain(&err), "ERROR: No such file or directory");
    }
}
