use crate::config::LoggingConfig;
use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, EnvFilter};

/// `<cache dir>/livefeed/livefeed.log`
pub fn default_log_file() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("livefeed").join("livefeed.log"))
}

fn env_filter(level: &str) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(level).with_context(|| format!("invalid log level `{}`", level)),
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
///
/// Headless runs log to stderr. The terminal UI owns the screen, so it logs
/// to a file through a non-blocking writer; keep the returned guard alive
/// until exit so buffered lines are flushed.
pub fn init_logging(config: &LoggingConfig, headless: bool) -> Result<Option<WorkerGuard>> {
    let filter = env_filter(&config.level)?;

    if headless {
        let builder = fmt().with_env_filter(filter).with_writer(std::io::stderr);
        let installed = if config.json {
            builder.json().flatten_event(true).try_init()
        } else {
            builder.try_init()
        };
        installed.map_err(|e| anyhow!("failed to install tracing subscriber: {}", e))?;
        return Ok(None);
    }

    let Some(path) = config.file.clone().or_else(default_log_file) else {
        return Ok(None);
    };
    let (dir, file_name) = split_log_path(&path)?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create log directory {}", dir.display()))?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let builder = fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false);
    let installed = if config.json {
        builder.json().flatten_event(true).try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow!("failed to install tracing subscriber: {}", e))?;

    Ok(Some(guard))
}

fn split_log_path(path: &Path) -> Result<(PathBuf, PathBuf)> {
    let file_name = path
        .file_name()
        .with_context(|| format!("log path {} has no file name", path.display()))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((dir, PathBuf::from(file_name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_log_path() {
        let (dir, file) = split_log_path(Path::new("/var/log/livefeed.log")).unwrap();
        assert_eq!(dir, PathBuf::from("/var/log"));
        assert_eq!(file, PathBuf::from("livefeed.log"));

        let (dir, file) = split_log_path(Path::new("feed.log")).unwrap();
        assert_eq!(dir, PathBuf::from("."));
        assert_eq!(file, PathBuf::from("feed.log"));

        assert!(split_log_path(Path::new("/")).is_err());
    }
}
