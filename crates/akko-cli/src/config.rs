use akko_cache::CacheSettings;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Configuration file layout (`akko.toml`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive, e.g. "info" or "akko_cache=debug"
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        EnvFilter::try_new(&self.logging.level)
            .map_err(|e| format!("logging.level is invalid: {e}"))?;
        self.cache.validate()
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::Path;

    pub const DEFAULT_CONFIG_FILE: &str = "akko.toml";

    /// Load `path` (or `./akko.toml` when present), then apply environment
    /// overrides, e.g. `AKKO__CACHE__REDIS__URL=redis://cache:6379`.
    pub fn load_config(path: Option<&Path>) -> Result<AppConfig, String> {
        let env = Environment::with_prefix("AKKO")
            .try_parsing(true)
            .separator("__");
        load_with_env(path, env)
    }

    pub(crate) fn load_with_env(path: Option<&Path>, env: Environment) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(format!("config file not found: {}", p.display()));
                }
                builder = builder.add_source(File::from(p.to_path_buf()));
            }
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path.to_path_buf()));
                }
            }
        }
        builder = builder.add_source(env);

        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use akko_cache::ValueCodec;
    use config::Environment;
    use std::io::Write;
    use std::time::Duration;

    fn toml_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn env(vars: &[(&str, &str)]) -> Environment {
        let source: config::Map<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::with_prefix("AKKO")
            .try_parsing(true)
            .separator("__")
            .source(Some(source))
    }

    #[test]
    fn test_load_from_file() {
        let file = toml_file(
            r#"
            [logging]
            level = "debug"

            [cache]
            key_prefix = "akko"

            [cache.redis]
            enabled = true
            url = "redis://cache:6379"
            codec = "msgpack"

            [cache.policies.menu]
            local_max_entries = 50
            "#,
        );

        let cfg = loader::load_with_env(Some(file.path()), env(&[])).unwrap();
        assert_eq!(cfg.logging.level, "debug");
        assert!(cfg.cache.redis.enabled);
        assert_eq!(cfg.cache.redis.codec, ValueCodec::MessagePack);

        let menu = cfg.cache.policy_table().policy_for("menu");
        assert_eq!(menu.local_max_entries, 50);
        assert_eq!(menu.key_prefix, "akko:menu");
    }

    #[test]
    fn test_env_overrides_file() {
        let file = toml_file(
            r#"
            [cache.redis]
            url = "redis://from-file:6379"
            "#,
        );

        let cfg = loader::load_with_env(
            Some(file.path()),
            env(&[
                ("AKKO__CACHE__REDIS__URL", "redis://from-env:6379"),
                ("AKKO__CACHE__MULTI_LEVEL", "false"),
                ("AKKO__CACHE__POLICIES__USER__DISTRIBUTED_TTL_SECS", "7200"),
            ]),
        )
        .unwrap();

        assert_eq!(cfg.cache.redis.url, "redis://from-env:6379");
        assert!(!cfg.cache.multi_level);
        let user = cfg.cache.policy_table().policy_for("user");
        assert_eq!(user.distributed_ttl, Duration::from_secs(7200));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        let err = loader::load_with_env(Some(&missing), env(&[])).unwrap_err();
        assert!(err.contains("not found"));
    }

    #[test]
    fn test_invalid_policy_is_rejected() {
        let file = toml_file(
            r#"
            [cache.policies.role]
            local_ttl_secs = 7200
            distributed_ttl_secs = 60
            "#,
        );
        let err = loader::load_with_env(Some(file.path()), env(&[])).unwrap_err();
        assert!(err.contains("role"));
    }

    #[test]
    fn test_defaults_without_file() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.cache.multi_level);
        assert!(cfg.validate().is_ok());
    }
}
