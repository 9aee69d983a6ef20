use crate::*;
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

pub const LEDGER_PATH_VAR: &str = "BALLOTCHAIN_LEDGER_PATH";
pub const DIFFICULTY_VAR: &str = "BALLOTCHAIN_DIFFICULTY";
pub const SEAL_THRESHOLD_VAR: &str = "BALLOTCHAIN_SEAL_THRESHOLD";
pub const MAX_MINING_ATTEMPTS_VAR: &str = "BALLOTCHAIN_MAX_MINING_ATTEMPTS";

/// Default number of pending votes that triggers a seal
pub const DEFAULT_SEAL_THRESHOLD: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub ledger_path: PathBuf,
    pub difficulty: usize,
    pub seal_threshold: usize,
    pub max_mining_attempts: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            ledger_path: PathBuf::from("./blockchain.json"),
            difficulty: DEFAULT_DIFFICULTY,
            seal_threshold: DEFAULT_SEAL_THRESHOLD,
            max_mining_attempts: None,
        }
    }
}

impl Config {
    /// Read the configuration from `BALLOTCHAIN_*` environment variables
    pub fn from_env() -> Result<Self, Error> {
        Self::from_vars(env::vars())
    }

    /// Build a configuration from key/value pairs, falling back to defaults
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let defaults = Config::default();

        let ledger_path = match vars.get(LEDGER_PATH_VAR) {
            Some(val) if !val.is_empty() => PathBuf::from(val),
            _ => defaults.ledger_path,
        };

        let difficulty = match vars.get(DIFFICULTY_VAR) {
            Some(val) => parse(DIFFICULTY_VAR, val)?,
            None => defaults.difficulty,
        };

        let seal_threshold = match vars.get(SEAL_THRESHOLD_VAR) {
            Some(val) => parse(SEAL_THRESHOLD_VAR, val)?,
            None => defaults.seal_threshold,
        };

        let max_mining_attempts = match vars.get(MAX_MINING_ATTEMPTS_VAR) {
            Some(val) => Some(parse(MAX_MINING_ATTEMPTS_VAR, val)?),
            None => defaults.max_mining_attempts,
        };

        let config = Config {
            ledger_path,
            difficulty,
            seal_threshold,
            max_mining_attempts,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the values against their bounds. Call again after applying overrides.
    pub fn validate(&self) -> Result<(), Error> {
        if self.seal_threshold == 0 {
            return Err(Error::Config("seal threshold must be positive".into()));
        }
        check_mining_params(self.difficulty, self.max_mining_attempts)
    }

    /// Path of the voter registry persisted next to the ledger
    pub fn registry_path(&self) -> PathBuf {
        let mut name = self
            .ledger_path
            .file_name()
            .unwrap_or_default()
            .to_os_string();
        name.push(".voters.json");
        self.ledger_path.with_file_name(name)
    }
}

fn parse<T: FromStr>(key: &str, val: &str) -> Result<T, Error> {
    val.trim().parse().map_err(|_| {
        Error::Config(format!("{} must be a non-negative integer, got {:?}", key, val))
    })
}
