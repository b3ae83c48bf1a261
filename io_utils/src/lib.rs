//! io_utils
#![deny(missing_docs)]

use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use log::debug;
use std::ffi::OsStr;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

// ▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓
// GZIP STUFF
// ▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓

/// Suffix carried by gzip compressed files.
pub const GZ_SUFFIX: &str = ".gz";

/// Return true if the file name ends in `.gz`.
pub fn is_gz(path: &Path) -> bool {
    path.as_os_str().to_string_lossy().ends_with(GZ_SUFFIX)
}

/// Decompress the gzip file `src` into `dest`, returning the number of bytes written.
/// `dest` is created or truncated.
pub fn decompress_gz(src: &Path, dest: &Path) -> Result<u64> {
    let reader = File::open(src).with_context(|| src.display().to_string())?;
    let mut decoder = MultiGzDecoder::new(BufReader::new(reader));
    let mut writer =
        BufWriter::new(File::create(dest).with_context(|| dest.display().to_string())?);
    let n = std::io::copy(&mut decoder, &mut writer)
        .with_context(|| format!("decompressing {} to {}", src.display(), dest.display()))?;
    writer.flush()?;
    Ok(n)
}

/// Replace `path` by its gzip compressed form `path.gz` and return the new path.
pub fn compress_in_place(path: &Path) -> Result<PathBuf> {
    let mut name = path.as_os_str().to_os_string();
    name.push(GZ_SUFFIX);
    let gz_path = PathBuf::from(name);

    {
        let mut reader =
            BufReader::new(File::open(path).with_context(|| path.display().to_string())?);
        let writer = File::create(&gz_path).with_context(|| gz_path.display().to_string())?;
        let mut encoder = GzEncoder::new(BufWriter::new(writer), Compression::default());
        std::io::copy(&mut reader, &mut encoder)
            .with_context(|| format!("compressing {}", path.display()))?;
        encoder.finish()?.flush()?;
    }

    std::fs::remove_file(path).with_context(|| path.display().to_string())?;
    Ok(gz_path)
}

/// Recursively gzip every file below `dir` that is not compressed already.
/// Returns the paths of the newly compressed files.
pub fn gzip_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut compressed = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| dir.display().to_string())? {
        let path = entry?.path();
        if path.is_dir() {
            compressed.extend(gzip_files(&path)?);
        } else if !is_gz(&path) {
            debug!("compressing {}", path.display());
            compressed.push(compress_in_place(&path)?);
        }
    }
    compressed.sort();
    Ok(compressed)
}

// ▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓
// PROGRAM LOOKUP
// ▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓

/// Locate an executable. A bare name is searched for on `$PATH`,
/// anything containing a path separator is checked directly.
pub fn find_program(program: impl AsRef<OsStr>) -> Option<PathBuf> {
    let program = Path::new(program.as_ref());
    if program.components().count() > 1 {
        return program.is_file().then(|| program.to_path_buf());
    }
    let search_path = std::env::var_os("PATH")?;
    std::env::split_paths(&search_path)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}
