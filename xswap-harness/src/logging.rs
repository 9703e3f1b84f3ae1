use crate::error::Result;
use chrono::Utc;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

/// Sends all log output to `<dir>/<unix seconds>.log`, created fresh for
/// this run. Level comes from `RUST_LOG`, `info` when unset.
pub fn init_file_logger(dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}.log", Utc::now().timestamp()));
    let file = File::create(&path)?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .try_init()
        .map_err(|e| crate::error::HarnessError::Config(format!("logger already installed: {}", e)))?;
    log::info!("Logging to {}", path.display());
    Ok(path)
}

/// Stderr logging for interactive runs.
pub fn init_stderr_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_file_is_named_by_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let before = Utc::now().timestamp();
        // Another test may have installed a logger first; the file is
        // created before installation either way.
        let path = match init_file_logger(dir.path()) {
            Ok(path) => path,
            Err(_) => fs::read_dir(dir.path()).unwrap().next().unwrap().unwrap().path(),
        };
        assert_eq!(path.extension().unwrap(), "log");
        let stamp: i64 = path.file_stem().unwrap().to_str().unwrap().parse().unwrap();
        assert!(stamp >= before);
    }
}
