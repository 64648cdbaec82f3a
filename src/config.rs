use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Environment-driven configuration for the demo binary, per
/// `SPEC_FULL.md` §4.8. The core engine itself never reads the
/// environment — these values are read once at process start and passed
/// into [`crate::frontier::Frontier::open`] as plain constructor
/// arguments.
#[derive(Debug, Clone)]
pub struct Config {
    pub politeness_delay: Duration,
    pub resumable: bool,
    pub storage_folder: PathBuf,
    pub num_worker_threads: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let politeness_delay_ms = env::var("POLITENESS_DELAY_MS")
            .unwrap_or_else(|_| "1000".to_string())
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidValue("POLITENESS_DELAY_MS", "must be a valid u64"))?;

        let resumable = env::var("RESUMABLE")
            .unwrap_or_else(|_| "true".to_string())
            .parse::<bool>()
            .map_err(|_| ConfigError::InvalidValue("RESUMABLE", "must be true or false"))?;

        let storage_folder = env::var("STORAGE_FOLDER")
            .unwrap_or_else(|_| "./frontier-data".to_string())
            .into();

        let num_worker_threads = env::var("NUM_WORKER_THREADS")
            .unwrap_or_else(|_| "4".to_string())
            .parse::<usize>()
            .map_err(|_| ConfigError::InvalidValue("NUM_WORKER_THREADS", "must be a valid usize"))?;

        Ok(Config {
            politeness_delay: Duration::from_millis(politeness_delay_ms),
            resumable,
            storage_folder,
            num_worker_threads,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_GUARD: Mutex<()> = Mutex::new(());

    fn clear_env() {
        for key in [
            "POLITENESS_DELAY_MS",
            "RESUMABLE",
            "STORAGE_FOLDER",
            "NUM_WORKER_THREADS",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn defaults_apply_when_environment_is_unset() {
        let _guard = ENV_GUARD.lock().unwrap();
        clear_env();
        let config = Config::from_env().unwrap();
        assert_eq!(config.politeness_delay, Duration::from_millis(1000));
        assert!(config.resumable);
        assert_eq!(config.num_worker_threads, 4);
    }

    #[test]
    fn invalid_numeric_value_is_a_config_error() {
        let _guard = ENV_GUARD.lock().unwrap();
        clear_env();
        env::set_var("POLITENESS_DELAY_MS", "not-a-number");
        let result = Config::from_env();
        env::remove_var("POLITENESS_DELAY_MS");
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue("POLITENESS_DELAY_MS", _))
        ));
    }
}
