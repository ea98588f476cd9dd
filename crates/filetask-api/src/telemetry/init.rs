use anyhow::{Context, Result};
use filetask_core::{LogFormat, LogOutput, LoggingConfig};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{
    fmt::writer::BoxMakeWriter, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Build the writer selected by `output`, creating the log file's parent
/// directories when needed.
fn make_writer(config: &LoggingConfig) -> Result<BoxMakeWriter> {
    match config.output {
        LogOutput::Stdout => Ok(BoxMakeWriter::new(std::io::stdout)),
        LogOutput::Stderr => Ok(BoxMakeWriter::new(std::io::stderr)),
        LogOutput::File => {
            let path = Path::new(&config.file_path);
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create log directory {}", parent.display())
                })?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Ok(BoxMakeWriter::new(Arc::new(file)))
        }
    }
}

fn env_filter(level: &str) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(format!("{level},tower_http={level}"))
            .with_context(|| format!("Invalid log level {}", level)),
    }
}

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_telemetry(config: &LoggingConfig) -> Result<()> {
    let filter = env_filter(&config.level)?;
    let writer = make_writer(config)?;
    let ansi = config.output != LogOutput::File;
    let with_source = config.with_source;

    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_writer(writer)
                    .with_file(with_source)
                    .with_line_number(with_source),
            )
            .try_init(),
        LogFormat::Text => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(ansi)
                    .with_writer(writer)
                    .with_file(with_source)
                    .with_line_number(with_source),
            )
            .try_init(),
        LogFormat::Compact => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_ansi(ansi)
                    .with_writer(writer)
                    .with_file(with_source)
                    .with_line_number(with_source),
            )
            .try_init(),
    };
    result.context("Failed to install tracing subscriber")?;

    tracing::info!(
        level = %config.level,
        format = ?config.format,
        output = ?config.output,
        "Logging initialized"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_writer_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/logs/app.log");
        let config = LoggingConfig {
            output: LogOutput::File,
            file_path: path.to_string_lossy().into_owned(),
            ..Default::default()
        };

        make_writer(&config).unwrap();
        assert!(path.exists());
    }
}
