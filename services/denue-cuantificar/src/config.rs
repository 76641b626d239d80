//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! Tokens are never stored in the TOML itself: they come from `--tokens`,
//! the DENUE_TOKENS env var or a `tokens_file`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use common::Secret;
use denue::ClientConfig;
use denue::config::{DEFAULT_BASE_URL, DEFAULT_WORKERS};
use serde::Deserialize;
use transport::RetryPolicy;

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "denue-cuantificar.toml";

pub const DEFAULT_OUTPUT: &str = "denue_municipal.csv";

/// Root configuration
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub api: ApiConfig,
    pub transport: TransportConfig,
    pub pool: PoolConfig,
    pub run: RunConfig,
}

/// Remote API settings
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub discovery_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 60,
            discovery_timeout_secs: 30,
        }
    }
}

/// Retry and connection pool settings for the HTTP client
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransportConfig {
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_secs: u64,
    /// Idle connections kept per host. Defaults to the worker count.
    pub pool_max_idle_per_host: Option<usize>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_retries: policy.max_retries,
            backoff_base_ms: policy.backoff_base.as_millis() as u64,
            backoff_max_secs: policy.backoff_max.as_secs(),
            pool_max_idle_per_host: None,
        }
    }
}

/// Credential pool settings
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolConfig {
    pub retirement_threshold: u32,
    /// File with tokens, one per line or comma separated.
    pub tokens_file: Option<PathBuf>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            retirement_threshold: credential_pool::DEFAULT_RETIREMENT_THRESHOLD,
            tokens_file: None,
        }
    }
}

/// Run settings, overridable from the command line
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub workers: usize,
    pub output: PathBuf,
    /// Prometheus text snapshot written when the run ends.
    pub metrics_file: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            output: PathBuf::from(DEFAULT_OUTPUT),
            metrics_file: None,
        }
    }
}

impl Config {
    /// Load and validate a TOML file. Missing sections and keys take defaults.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| common::Error::io(path, e))?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the config named on the command line or in DENUE_CONFIG, which
    /// must exist; otherwise the default file if present, else defaults.
    pub fn discover(cli_path: Option<&Path>) -> common::Result<(Self, Option<PathBuf>)> {
        if let Some(path) = Self::resolve_path(cli_path) {
            return Ok((Self::load(&path)?, Some(path)));
        }
        let default = PathBuf::from(DEFAULT_CONFIG_FILE);
        if default.is_file() {
            return Ok((Self::load(&default)?, Some(default)));
        }
        Ok((Self::default(), None))
    }

    /// Explicit config path from CLI arg or DENUE_CONFIG env var.
    pub fn resolve_path(cli_path: Option<&Path>) -> Option<PathBuf> {
        if let Some(p) = cli_path {
            return Some(p.to_path_buf());
        }
        std::env::var_os("DENUE_CONFIG")
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
    }

    pub fn validate(&self) -> common::Result<()> {
        let base_url = &self.api.base_url;
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(common::Error::Config(format!(
                "api.base_url must start with http:// or https://, got: {base_url}"
            )));
        }
        if self.api.timeout_secs == 0 {
            return Err(common::Error::Config(
                "api.timeout_secs must be greater than 0".into(),
            ));
        }
        if self.api.discovery_timeout_secs == 0 {
            return Err(common::Error::Config(
                "api.discovery_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.transport.pool_max_idle_per_host == Some(0) {
            return Err(common::Error::Config(
                "transport.pool_max_idle_per_host must be greater than 0".into(),
            ));
        }
        if self.pool.retirement_threshold == 0 {
            return Err(common::Error::Config(
                "pool.retirement_threshold must be greater than 0".into(),
            ));
        }
        if self.run.workers == 0 {
            return Err(common::Error::Config(
                "run.workers must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Apply command-line overrides, then re-validate.
    pub fn apply_overrides(
        &mut self,
        workers: Option<usize>,
        output: Option<PathBuf>,
        metrics_file: Option<PathBuf>,
    ) -> common::Result<()> {
        if let Some(workers) = workers {
            self.run.workers = workers;
        }
        if let Some(output) = output {
            self.run.output = output;
        }
        if metrics_file.is_some() {
            self.run.metrics_file = metrics_file;
        }
        self.validate()
    }

    /// Resolve tokens: `--tokens` > DENUE_TOKENS > `pool.tokens_file`.
    ///
    /// An empty result is not an error here; the caller decides.
    pub fn resolve_tokens(&self, cli_tokens: Option<&str>) -> common::Result<Vec<Secret<String>>> {
        if let Some(tokens) = cli_tokens {
            return Ok(split_tokens(tokens));
        }
        if let Ok(tokens) = std::env::var("DENUE_TOKENS") {
            return Ok(split_tokens(&tokens));
        }
        if let Some(ref path) = self.pool.tokens_file {
            let contents = std::fs::read_to_string(path).map_err(|e| common::Error::io(path, e))?;
            return Ok(split_tokens(&contents));
        }
        Ok(Vec::new())
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.api.base_url.clone(),
            request_timeout: Duration::from_secs(self.api.timeout_secs),
            discovery_timeout: Duration::from_secs(self.api.discovery_timeout_secs),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.transport.max_retries,
            backoff_base: Duration::from_millis(self.transport.backoff_base_ms),
            backoff_max: Duration::from_secs(self.transport.backoff_max_secs),
            ..RetryPolicy::default()
        }
    }

    /// Idle connections per host: configured value, else one per worker.
    pub fn max_idle_per_host(&self) -> usize {
        self.transport
            .pool_max_idle_per_host
            .unwrap_or(self.run.workers)
    }
}

/// Tokens separated by commas and/or newlines. Blanks are dropped.
fn split_tokens(raw: &str) -> Vec<Secret<String>> {
    raw.split([',', '\n'])
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| Secret::new(t.to_owned()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mutex to serialize tests that mutate environment variables, preventing
    /// data races when tests run in parallel.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    fn exposed(tokens: &[Secret<String>]) -> Vec<&str> {
        tokens.iter().map(|t| t.expose().as_str()).collect()
    }

    fn write_config(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_full_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
[api]
base_url = "http://127.0.0.1:9000/Cuantificar"
timeout_secs = 20
discovery_timeout_secs = 10

[transport]
max_retries = 2
backoff_base_ms = 100
backoff_max_secs = 5
pool_max_idle_per_host = 16

[pool]
retirement_threshold = 5
tokens_file = "/etc/denue/tokens"

[run]
workers = 8
output = "out.csv"
metrics_file = "denue.prom"
"#,
        );

        let config = Config::load(&path).unwrap();
        assert_eq!(config.api.base_url, "http://127.0.0.1:9000/Cuantificar");
        assert_eq!(config.client_config().request_timeout, Duration::from_secs(20));
        assert_eq!(config.client_config().discovery_timeout, Duration::from_secs(10));

        let policy = config.retry_policy();
        assert_eq!(policy.max_retries, 2);
        assert_eq!(policy.backoff_base, Duration::from_millis(100));
        assert_eq!(policy.backoff_max, Duration::from_secs(5));
        assert_eq!(policy.retry_statuses, RetryPolicy::default().retry_statuses);

        assert_eq!(config.pool.retirement_threshold, 5);
        assert_eq!(config.pool.tokens_file, Some(PathBuf::from("/etc/denue/tokens")));
        assert_eq!(config.run.workers, 8);
        assert_eq!(config.run.output, PathBuf::from("out.csv"));
        assert_eq!(config.run.metrics_file, Some(PathBuf::from("denue.prom")));
        assert_eq!(config.max_idle_per_host(), 16);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "");

        let config = Config::load(&path).unwrap();
        assert_eq!(config.api.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.api.timeout_secs, 60);
        assert_eq!(config.api.discovery_timeout_secs, 30);
        assert_eq!(config.transport.max_retries, 5);
        assert_eq!(config.transport.backoff_base_ms, 500);
        assert_eq!(config.pool.retirement_threshold, 3);
        assert_eq!(config.run.workers, 50);
        assert_eq!(config.run.output, PathBuf::from(DEFAULT_OUTPUT));
        assert_eq!(config.max_idle_per_host(), 50);
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Path::new("/nonexistent/path/config.toml")).unwrap_err();
        assert!(matches!(err, common::Error::Io { .. }));
    }

    #[test]
    fn test_load_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "not valid {{{{ toml");
        assert!(matches!(Config::load(&path), Err(common::Error::Toml(_))));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[run]\nthreads = 4\n");
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = tempfile::tempdir().unwrap();
        for (toml, needle) in [
            ("[api]\nbase_url = \"ftp://example.com\"", "base_url"),
            ("[api]\ntimeout_secs = 0", "timeout_secs"),
            ("[api]\ndiscovery_timeout_secs = 0", "discovery_timeout_secs"),
            ("[transport]\npool_max_idle_per_host = 0", "pool_max_idle_per_host"),
            ("[pool]\nretirement_threshold = 0", "retirement_threshold"),
            ("[run]\nworkers = 0", "workers"),
        ] {
            let path = write_config(&dir, toml);
            let err = Config::load(&path).unwrap_err();
            assert!(
                matches!(err, common::Error::Config(ref msg) if msg.contains(needle)),
                "{toml}: {err}"
            );
        }
    }

    #[test]
    fn test_overrides_replace_file_values() {
        let mut config = Config::default();
        config
            .apply_overrides(Some(4), Some(PathBuf::from("x.csv")), None)
            .unwrap();
        assert_eq!(config.run.workers, 4);
        assert_eq!(config.run.output, PathBuf::from("x.csv"));
        assert_eq!(config.run.metrics_file, None);

        assert!(config.apply_overrides(Some(0), None, None).is_err());
    }

    #[test]
    fn test_resolve_path_precedence() {
        let _lock = ENV_MUTEX.lock().unwrap();

        unsafe { set_env("DENUE_CONFIG", "/from/env.toml") };
        assert_eq!(
            Config::resolve_path(Some(Path::new("/from/cli.toml"))),
            Some(PathBuf::from("/from/cli.toml"))
        );
        assert_eq!(
            Config::resolve_path(None),
            Some(PathBuf::from("/from/env.toml"))
        );

        unsafe { remove_env("DENUE_CONFIG") };
        assert_eq!(Config::resolve_path(None), None);
    }

    #[test]
    fn test_discover_requires_explicit_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("DENUE_CONFIG") };

        assert!(Config::discover(Some(Path::new("/nonexistent/denue.toml"))).is_err());
    }

    #[test]
    fn test_tokens_from_cli_win() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("DENUE_TOKENS", "env-token") };

        let config = Config::default();
        let tokens = config.resolve_tokens(Some(" a, b ,,c ")).unwrap();
        assert_eq!(exposed(&tokens), vec!["a", "b", "c"]);

        unsafe { remove_env("DENUE_TOKENS") };
    }

    #[test]
    fn test_tokens_from_env_over_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("tokens");
        std::fs::write(&file, "file-token\n").unwrap();

        let mut config = Config::default();
        config.pool.tokens_file = Some(file);

        unsafe { set_env("DENUE_TOKENS", "env-1,env-2") };
        let tokens = config.resolve_tokens(None).unwrap();
        assert_eq!(exposed(&tokens), vec!["env-1", "env-2"]);

        unsafe { remove_env("DENUE_TOKENS") };
        let tokens = config.resolve_tokens(None).unwrap();
        assert_eq!(exposed(&tokens), vec!["file-token"]);
    }

    #[test]
    fn test_tokens_file_lines_and_commas() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("DENUE_TOKENS") };

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("tokens");
        std::fs::write(&file, "t1\r\n\nt2,t3\n  \n").unwrap();

        let mut config = Config::default();
        config.pool.tokens_file = Some(file);
        let tokens = config.resolve_tokens(None).unwrap();
        assert_eq!(exposed(&tokens), vec!["t1", "t2", "t3"]);
    }

    #[test]
    fn test_missing_tokens_file_is_error() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("DENUE_TOKENS") };

        let mut config = Config::default();
        config.pool.tokens_file = Some(PathBuf::from("/nonexistent/tokens"));
        assert!(config.resolve_tokens(None).is_err());
    }

    #[test]
    fn test_no_token_source_is_empty() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("DENUE_TOKENS") };

        assert!(Config::default().resolve_tokens(None).unwrap().is_empty());
    }
}
