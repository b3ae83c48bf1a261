//! Logger setup for the command line tool.

use anyhow::{Context, Result};
use chrono::Local;
use env_logger::{Builder, Target};
use log::LevelFilter;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

/// Copies everything written to it to stderr and to a log file.
struct Tee {
    file: File,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}

/// Install the global logger, writing `2024-01-31T12:00:00 [INFO] - message`
/// lines to stderr and, if given, also to `log_file`.
pub fn init(log_file: Option<&Path>, debug: bool) -> Result<()> {
    let mut builder = Builder::new();
    builder
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] - {}",
                Local::now().format("%Y-%m-%dT%H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter(
            None,
            if debug {
                LevelFilter::Debug
            } else {
                LevelFilter::Info
            },
        );
    if let Some(path) = log_file {
        let file = File::create(path).with_context(|| path.display().to_string())?;
        builder.target(Target::Pipe(Box::new(Tee { file })));
    }
    builder.try_init().context("logger was already initialized")?;
    Ok(())
}
