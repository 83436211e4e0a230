//! Runtime settings, layered from lowest to highest precedence:
//!
//! 1. built-in defaults;
//! 2. `vitta.toml` in the working directory, or the file passed explicitly;
//! 3. `VITTA__*` environment variables, e.g. `VITTA__DATABASE__PATH`.
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::ledger_db::DEFAULT_LEDGER_DB_RELATIVE_PATH;

const DEFAULT_CONFIG_BASENAME: &str = "vitta";
const ENV_PREFIX: &str = "VITTA";
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, Deserialize)]
pub struct Database {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Log {
    pub level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database: Database,
    pub log: Log,
}

impl Settings {
    /// Loads settings. An explicit `config_path` must exist; the default
    /// `vitta.toml` is optional.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::build(config_path, Environment::with_prefix(ENV_PREFIX))
    }

    fn build(config_path: Option<&Path>, env: Environment) -> Result<Self, ConfigError> {
        let file = match config_path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_BASENAME).required(false),
        };
        let settings = Config::builder()
            .set_default("database.path", DEFAULT_LEDGER_DB_RELATIVE_PATH)?
            .set_default("log.level", DEFAULT_LOG_LEVEL)?
            .add_source(file)
            .add_source(env.prefix_separator("__").separator("__"))
            .build()?;

        settings.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger_db::test_support::create_temp_path;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let map = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        Environment::with_prefix(ENV_PREFIX).source(Some(map))
    }

    #[test]
    fn defaults_apply_without_file_or_env() {
        let settings = Settings::build(None, env(&[])).unwrap();
        assert_eq!(settings.database.path, PathBuf::from("ledger/vitta.db"));
        assert_eq!(settings.log.level, "info");
    }

    #[test]
    fn env_overrides_file_which_overrides_defaults() {
        let path = create_temp_path("vitta_settings", "toml");
        std::fs::write(&path, "[database]\npath = \"/tmp/from-file.db\"\n\n[log]\nlevel = \"debug\"\n")
            .unwrap();

        let from_file = Settings::build(Some(&path), env(&[])).unwrap();
        assert_eq!(from_file.database.path, PathBuf::from("/tmp/from-file.db"));
        assert_eq!(from_file.log.level, "debug");

        let from_env = Settings::build(Some(&path), env(&[("VITTA__LOG__LEVEL", "warn")])).unwrap();
        assert_eq!(from_env.database.path, PathBuf::from("/tmp/from-file.db"));
        assert_eq!(from_env.log.level, "warn");

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let path = create_temp_path("vitta_settings_missing", "toml");
        assert!(Settings::build(Some(&path), env(&[])).is_err());
    }
}
