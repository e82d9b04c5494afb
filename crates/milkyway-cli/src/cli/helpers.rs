use super::CliError;
use anyhow::Context;
use milkyway_core::domain::MilkywayError;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Installs the stderr log subscriber. Stdout carries results only.
pub(super) fn init_logging(log_level: Option<&str>) -> Result<(), CliError> {
    let filter = match log_level {
        Some(directive) => EnvFilter::try_new(directive).map_err(|error| {
            CliError::Usage(format!("invalid --log-level '{directive}': {error}"))
        })?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    // a subscriber may already be installed when `run` is called repeatedly
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
    Ok(())
}

/// Result sink: the named file, or stdout.
pub(super) fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>, CliError> {
    let Some(path) = path else {
        return Ok(Box::new(std::io::stdout().lock()));
    };
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| {
            MilkywayError::io_system(
                "IO.OUTPUT",
                format!(
                    "failed to create output directory '{}': {}",
                    parent.display(),
                    source
                ),
            )
        })?;
    }
    let file = File::create(path).map_err(|source| {
        MilkywayError::io_system(
            "IO.OUTPUT",
            format!("failed to create output file '{}': {}", path.display(), source),
        )
    })?;
    Ok(Box::new(BufWriter::new(file)))
}

pub(super) fn finish_output(mut sink: Box<dyn Write>, path: Option<&Path>) -> Result<(), CliError> {
    sink.flush().with_context(|| match path {
        Some(path) => format!("failed to flush output '{}'", path.display()),
        None => "failed to flush stdout".to_string(),
    })?;
    Ok(())
}

pub(super) fn write_json<T: serde::Serialize>(
    sink: &mut dyn Write,
    value: &T,
) -> Result<(), CliError> {
    serde_json::to_writer_pretty(&mut *sink, value).context("failed to serialize JSON report")?;
    writeln!(sink).context("failed to write JSON report")?;
    Ok(())
}
