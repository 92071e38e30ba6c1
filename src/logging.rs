use std::fs::{create_dir_all, File};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use log::LevelFilter;
use simplelog::{ColorChoice, Config as LogConfig, TermLogger, TerminalMode, WriteLogger};

/// Install the process-wide logger.
///
/// With a `log_dir` everything from `Info` up goes to
/// `{log_dir}/{stem}_{timestamp}.log` and the path is returned. Without one,
/// the terminal logger stays silent unless `verbose` asks for debug output.
pub fn init(log_dir: Option<&Path>, stem: &str, verbose: bool) -> Result<Option<PathBuf>> {
    let level = if verbose {
        LevelFilter::Debug
    } else if log_dir.is_some() {
        LevelFilter::Info
    } else {
        LevelFilter::Off
    };

    match log_dir {
        Some(dir) => {
            create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
            let ts = Local::now().format("%Y%m%d_%H%M%S");
            let log_path = dir.join(format!("{stem}_{ts}.log"));
            let file = File::create(&log_path)
                .with_context(|| format!("creating {}", log_path.display()))?;
            WriteLogger::init(level, LogConfig::default(), file)?;
            Ok(Some(log_path))
        }
        None => {
            TermLogger::init(
                level,
                LogConfig::default(),
                TerminalMode::Stderr,
                ColorChoice::Auto,
            )?;
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // the only test in this binary that installs a logger
    #[test]
    fn file_logger_writes_under_log_dir() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");

        let path = init(Some(logs.as_path()), "jsonl_to_json", false).unwrap().unwrap();
        log::info!("hello from the test");
        log::logger().flush();

        assert!(path.starts_with(&logs));
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("jsonl_to_json_") && name.ends_with(".log"));
        assert!(std::fs::read_to_string(&path).unwrap().contains("hello from the test"));
    }
}
