use crate::{config::TrackerConfig, paths::TrackerPaths};
use eyre::Context as _;
use std::{fs, path::PathBuf};

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

/// Apply environment variable overrides to the config (endpoints, account, tuning).
fn apply_env_overrides(cfg: &mut TrackerConfig) {
    /// Helper: if an env var is set and non-empty, apply `setter` with the trimmed value.
    fn apply_env(var: &str, setter: impl FnOnce(&str)) {
        if let Ok(u) = std::env::var(var) {
            let t = u.trim();
            if !t.is_empty() {
                setter(t);
            }
        }
    }

    apply_env("REBASE_TRACKER_INDEXER_URL", |v| {
        v.clone_into(&mut cfg.indexer.base_url);
    });
    apply_env("REBASE_TRACKER_ACCOUNT", |v| {
        v.clone_into(&mut cfg.indexer.account);
    });
    apply_env("REBASE_TRACKER_TERRA_LCD_URL", |v| {
        v.clone_into(&mut cfg.terra.lcd_url);
    });
    apply_env("REBASE_TRACKER_SOLANA_RPC_URL", |v| {
        v.clone_into(&mut cfg.solana.rpc_url);
    });
    apply_env("REBASE_TRACKER_GUARDIAN_HOSTS", |v| {
        let hosts: Vec<String> = v
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToOwned::to_owned)
            .collect();
        if !hosts.is_empty() {
            cfg.relay.hosts = hosts;
        }
    });
    apply_env("REBASE_TRACKER_MAX_RETRIES", |v| {
        if let Some(n) = parse_env_number::<u32>("REBASE_TRACKER_MAX_RETRIES", v) {
            cfg.relay.max_retries = Some(n);
        }
    });
    apply_env("REBASE_TRACKER_CHUNK_SIZE", |v| {
        if let Some(n) = parse_env_number::<usize>("REBASE_TRACKER_CHUNK_SIZE", v) {
            cfg.check.chunk_size = n;
        }
    });
}

/// Positive integer from an env override; anything else is logged and ignored.
fn parse_env_number<T>(var: &str, value: &str) -> Option<T>
where
    T: std::str::FromStr + Default + PartialEq,
    T::Err: std::fmt::Display,
{
    match value.parse::<T>() {
        Ok(n) if n != T::default() => Some(n),
        Ok(_) => {
            tracing::warn!(var, value, "override must be positive; keeping configured value");
            None
        }
        Err(e) => {
            tracing::warn!(var, value, error = %e, "unparseable override; keeping configured value");
            None
        }
    }
}

impl ConfigStore {
    pub fn new(paths: &TrackerPaths) -> Self {
        Self {
            path: paths.config_file.clone(),
        }
    }

    pub const fn path(&self) -> &PathBuf {
        &self.path
    }

    /// The config file if present, defaults otherwise; env overrides apply either way.
    pub fn load(&self) -> eyre::Result<TrackerConfig> {
        let mut cfg = if self.path.exists() {
            let s = fs::read_to_string(&self.path)
                .with_context(|| format!("read {}", self.path.display()))?;
            toml::from_str(&s).with_context(|| format!("parse {}", self.path.display()))?
        } else {
            TrackerConfig::default()
        };
        apply_env_overrides(&mut cfg);
        Ok(cfg)
    }

    pub fn save(&self, cfg: &TrackerConfig) -> eyre::Result<()> {
        let s = toml::to_string_pretty(cfg).context("serialize config")?;
        crate::fsutil::write_string_atomic(&self.path, &s)
            .with_context(|| format!("write {}", self.path.display()))
    }
}
