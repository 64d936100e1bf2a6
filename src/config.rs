//! Runtime settings.
//!
//! Sources are merged in order, later ones overriding earlier ones:
//! 1. built-in defaults
//! 2. `proofsync.toml` in the working directory, if present
//! 3. the file passed with `--config` (must exist)
//! 4. environment variables prefixed with `PROOFSYNC_`, e.g. `PROOFSYNC_DIFFICULTY=4`

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::ledger::{LedgerOptions, DEFAULT_DIFFICULTY};

pub const DEFAULT_CONFIG_FILE: &str = "proofsync.toml";
pub const ENV_PREFIX: &str = "PROOFSYNC";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub bind_addr: SocketAddr,
    /// JSON file holding the chain.
    pub chain_path: PathBuf,
    pub difficulty: usize,
    pub max_pending: Option<usize>,
    pub verify_on_load: bool,
    /// Used when `RUST_LOG` is not set.
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
            chain_path: PathBuf::from("proofsync_chain.json"),
            difficulty: DEFAULT_DIFFICULTY,
            max_pending: None,
            verify_on_load: false,
            log_filter: "proofsync=info,tower_http=info".to_string(),
        }
    }
}

impl Settings {
    pub fn load(explicit: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name(DEFAULT_CONFIG_FILE).required(false));

        if let Some(path) = explicit {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()
    }

    pub fn ledger_options(&self) -> LedgerOptions {
        LedgerOptions {
            difficulty: self.difficulty,
            max_pending: self.max_pending,
            verify_on_load: self.verify_on_load,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "difficulty = 2\nmax_pending = 8\nchain_path = \"/var/lib/proofsync/chain.json\"\n",
        )
        .unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.difficulty, 2);
        assert_eq!(settings.max_pending, Some(8));
        assert_eq!(settings.chain_path, PathBuf::from("/var/lib/proofsync/chain.json"));
        assert_eq!(settings.bind_addr, Settings::default().bind_addr);
        assert!(!settings.ledger_options().verify_on_load);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Settings::load(Some(&dir.path().join("absent.toml"))).is_err());
    }
}
