//! Runs the rna-map-tools binary with fake external programs on the PATH.
#![cfg(unix)]

use anyhow::Result;
use std::ffi::OsString;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::process::{Command, Output};

const FAKE_NOVOBARCODE: &str = r##"#!/bin/sh
set -e
mkdir -p NC
echo "# fake novobarcode"
printf 'A1\tAAAGAAT\t3\n'
printf 'A2\tTTCGAAT\t1\n'
printf 'NC\t\t2\n'
"##;

const TABLE: &str = "\
barcode,barcode_seq,construct,code,data_type
A1,AAAGAAT,mttr6,C0001,DMS
A2,TTCGAAT,uucg,C0002,DMS
";

fn write_executable(dir: &Path, name: &str, body: &str) -> Result<()> {
    let path = dir.join(name);
    std::fs::write(&path, body)?;
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
    Ok(())
}

fn path_with(dir: &Path) -> Result<OsString> {
    let mut paths = vec![dir.to_path_buf()];
    paths.extend(std::env::split_paths(&std::env::var_os("PATH").unwrap_or_default()));
    Ok(std::env::join_paths(paths)?)
}

fn rna_map_tools(args: &[&str], path: &OsString) -> Result<Output> {
    Ok(Command::new(env!("CARGO_BIN_EXE_rna-map-tools"))
        .args(args)
        .env("PATH", path)
        .env_remove("BASESPACE")
        .output()?)
}

fn to_str(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn test_demultiplex() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let tools = dir.path().join("bin");
    let fastqs = dir.path().join("download");
    let output = dir.path().join("demultiplexed");
    for d in [&tools, &fastqs, &output] {
        std::fs::create_dir(d)?;
    }
    write_executable(&tools, "novobarcode", FAKE_NOVOBARCODE)?;
    for read in ["R1", "R2"] {
        std::fs::write(
            fastqs.join(format!("C0098_S1_L001_{read}_001.fastq")),
            "@r\nACGTAAAGAAT\n+\nIIIIIIIIIII\n",
        )?;
    }
    let csv = dir.path().join("data.csv");
    std::fs::write(&csv, TABLE)?;

    let out = rna_map_tools(
        &[
            "demultiplex",
            to_str(&csv),
            to_str(&fastqs),
            "--output-dir",
            to_str(&output),
        ],
        &path_with(&tools)?,
    )?;
    assert!(
        out.status.success(),
        "{}",
        String::from_utf8_lossy(&out.stdout)
    );
    assert_eq!(
        std::fs::read_to_string(output.join("demultiplex.csv"))?,
        "id,tag,count\nA1,AAAGAAT,3\nA2,TTCGAAT,1\nNC,,2\n"
    );
    assert!(!output.join("test_S1_L001_R1_001.fastq").exists());
    let log = std::fs::read_to_string(output.join("demultiplex.log"))?;
    assert!(log.contains("[INFO] - total number of reads: 6"));
    assert!(log.contains("[INFO] - total number of data reads: 4"));
    Ok(())
}

#[test]
fn test_runmulti_missing_run_dir() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let csv = dir.path().join("data.csv");
    std::fs::write(&csv, TABLE)?;
    let missing = dir.path().join("missing");

    let out = rna_map_tools(
        &[
            "runmulti",
            to_str(&csv),
            to_str(dir.path()),
            to_str(dir.path()),
            "--run-dir",
            to_str(&missing),
        ],
        &path_with(dir.path())?,
    )?;
    assert!(!out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.starts_with("ERROR: "), "{stdout}");
    assert!(stdout.contains("does not exist cannot run multi"));
    Ok(())
}

#[test]
fn test_download_without_directory() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let out = rna_map_tools(&["download", "run_1"], &path_with(dir.path())?)?;
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).contains("$BASESPACE is not set"));
    Ok(())
}

#[test]
fn test_unknown_backend() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let out = rna_map_tools(
        &[
            "demultiplex",
            to_str(dir.path()),
            to_str(dir.path()),
            "--backend",
            "bcl2fastq",
        ],
        &path_with(dir.path())?,
    )?;
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&out.stderr).contains("unknown demultiplex backend"));
    Ok(())
}
