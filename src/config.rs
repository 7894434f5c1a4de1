use std::{fs, path::Path};

use serde::Deserialize;

use crate::{ProcflowError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// number of async worker threads, range [1, 32768), defaults to 16
    pub async_worker_thread_number: u16,
    /// engine config
    pub engine: EngineConfig,
    /// parallel node defaults
    pub parallel: ParallelConfig,
    /// expression evaluator config
    pub expression: ExpressionConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// maximum node executions in one run before the instance is failed
    pub max_steps: usize,
    /// timeout in seconds for synchronous nodes that declare none
    pub default_node_timeout: Option<u64>,
    /// capacity of the async node outcome queue
    pub async_queue_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ParallelConfig {
    /// used when a parallel node omits `maxConcurrency`
    pub default_max_concurrency: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExpressionConfig {
    /// number of expression safety verdicts kept in memory
    pub cache_size: usize,
    /// extra terms rejected in expressions
    pub denylist: Vec<String>,
    /// milliseconds one evaluation may run before it is interrupted
    pub timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            async_worker_thread_number: 16,
            engine: EngineConfig::default(),
            parallel: ParallelConfig::default(),
            expression: ExpressionConfig::default(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_steps: 1000,
            default_node_timeout: None,
            async_queue_size: 1024,
        }
    }
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            default_max_concurrency: 4,
        }
    }
}

impl Default for ExpressionConfig {
    fn default() -> Self {
        Self {
            cache_size: 1024,
            denylist: Vec::new(),
            timeout_ms: 1000,
        }
    }
}

impl Config {
    pub fn create<T: AsRef<Path>>(path: T) -> Result<Self> {
        let data = fs::read_to_string(path.as_ref())
            .map_err(|e| ProcflowError::Config(format!("failed to load config file {:?}: {}", path.as_ref(), e)))?;

        Self::load_from_str(data.as_str())
    }

    pub fn load_from_str(toml_str: &str) -> Result<Self> {
        let config = toml::from_str::<Config>(toml_str)?;
        if config.async_worker_thread_number == 0 {
            return Err(ProcflowError::Config("async_worker_thread_number must be at least 1".into()));
        }
        if config.expression.timeout_ms == 0 {
            return Err(ProcflowError::Config("expression.timeout_ms must be at least 1".into()));
        }
        if config.engine.async_queue_size == 0 {
            return Err(ProcflowError::Config("engine.async_queue_size must be at least 1".into()));
        }
        if config.parallel.default_max_concurrency == 0 {
            return Err(ProcflowError::Config("parallel.default_max_concurrency must be at least 1".into()));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod test {
    use crate::Config;

    #[test]
    fn test_config_deserialize() {
        let toml_str = r#"
        async_worker_thread_number = 10

        [engine]
        max_steps = 50
        default_node_timeout = 30

        [parallel]
        default_max_concurrency = 8

        [expression]
        denylist = ["sleep"]
        timeout_ms = 250
        "#;
        let config = Config::load_from_str(toml_str).unwrap();
        assert_eq!(config.async_worker_thread_number, 10);
        assert_eq!(config.engine.max_steps, 50);
        assert_eq!(config.engine.default_node_timeout, Some(30));
        assert_eq!(config.engine.async_queue_size, 1024);
        assert_eq!(config.parallel.default_max_concurrency, 8);
        assert_eq!(config.expression.cache_size, 1024);
        assert_eq!(config.expression.denylist, vec!["sleep".to_string()]);
        assert_eq!(config.expression.timeout_ms, 250);
    }

    #[test]
    fn test_config_defaults_and_errors() {
        let config = Config::load_from_str("").unwrap();
        assert_eq!(config.async_worker_thread_number, 16);
        assert_eq!(config.engine.max_steps, 1000);
        assert_eq!(config.parallel.default_max_concurrency, 4);

        assert!(Config::load_from_str("async_worker_thread_number = 0").is_err());
        assert!(Config::load_from_str("[expression]\ntimeout_ms = 0").is_err());
        assert!(Config::load_from_str("[engine]\nasync_queue_size = 0").is_err());
        assert!(Config::load_from_str("[engine]\nmax_steps = \"many\"").is_err());
        assert!(Config::create("/definitely/not/here.toml").is_err());
    }
}
