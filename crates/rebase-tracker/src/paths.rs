use std::path::{Path, PathBuf};

const LEDGER_FILE: &str = "rebases.json";
const REDEEMED_FILE: &str = "redeemed.json";
const LOG_FILE: &str = "rebase-tracker.log.jsonl";
const CONFIG_FILE: &str = "rebase-tracker.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerPaths {
    pub config_file: PathBuf,
    pub data_dir: PathBuf,
    pub ledger_file: PathBuf,
    pub redeemed_file: PathBuf,
    pub log_file: PathBuf,
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
}

impl TrackerPaths {
    /// Paths relative to the working directory, unless overridden by
    /// `REBASE_TRACKER_DATA_DIR` / `REBASE_TRACKER_CONFIG`.
    pub fn discover() -> Self {
        let data_dir = env_path("REBASE_TRACKER_DATA_DIR").unwrap_or_else(|| PathBuf::from("data"));
        let config_file =
            env_path("REBASE_TRACKER_CONFIG").unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
        Self::with_dirs(config_file, &data_dir)
    }

    pub fn with_dirs(config_file: PathBuf, data_dir: &Path) -> Self {
        Self {
            config_file,
            data_dir: data_dir.to_path_buf(),
            ledger_file: data_dir.join(LEDGER_FILE),
            redeemed_file: data_dir.join(REDEEMED_FILE),
            log_file: data_dir.join(LOG_FILE),
        }
    }
}
