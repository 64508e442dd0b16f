use infrakit_core::{HttpConfig, InfraError, Result};
use std::path::Path;
use toml::{Table, Value};
use tracing::{debug, info};

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "INFRAKIT_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "infrakit.toml";

pub const HTTP_ADDRESS: &str = "app.http.address";
pub const HTTP_PORT: &str = "app.http.port";
pub const HTTP_ENGINE: &str = "app.http.engine";
pub const KEYVAL_URL: &str = "app.keyval.url";
pub const QUEUE_URL: &str = "app.queue.url";

const KNOWN_KEYS: [&str; 5] = [HTTP_ADDRESS, HTTP_PORT, HTTP_ENGINE, KEYVAL_URL, QUEUE_URL];

/// Layered settings: built-in defaults, then a TOML file, then the
/// environment (`app.http.port` is overridden by `APP_HTTP_PORT`).
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    values: Table,
}

impl Default for Config {
    fn default() -> Self {
        let mut config = Self {
            values: Table::new(),
        };
        config.set(HTTP_ADDRESS, Value::String("0.0.0.0".to_string()));
        config.set(HTTP_PORT, Value::Integer(8080));
        config.set(HTTP_ENGINE, Value::String("axum".to_string()));
        config.set(KEYVAL_URL, Value::String("memory://".to_string()));
        config.set(QUEUE_URL, Value::String("memory://".to_string()));
        config
    }
}

impl Config {
    /// Loads the process configuration.
    ///
    /// A missing default file is skipped; a file named through
    /// `INFRAKIT_CONFIG` must exist.
    pub fn load() -> Result<Self> {
        let explicit = std::env::var(CONFIG_PATH_ENV).ok();
        let path = explicit
            .clone()
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

        let mut config = if explicit.is_some() || Path::new(&path).exists() {
            Self::from_file(&path)?
        } else {
            debug!(%path, "No configuration file, using defaults");
            Self::default()
        };
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            InfraError::ConfigError(format!("unable to read {}: {e}", path.display()))
        })?;
        let config = Self::from_toml_str(&content)?;
        info!(path = %path.display(), "Loaded configuration file");
        Ok(config)
    }

    /// Parses `content` over the defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: Table = toml::from_str(content)
            .map_err(|e| InfraError::ConfigError(format!("TOML parsing error: {e}")))?;
        let mut config = Self::default();
        merge(&mut config.values, file);
        Ok(config)
    }

    /// Overrides known keys from variables named like `APP_HTTP_PORT`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for key in KNOWN_KEYS {
            let name = env_name(key);
            if let Some(raw) = lookup(&name) {
                debug!(%key, env = %name, "Configuration overridden from environment");
                let value = match raw.parse::<i64>() {
                    Ok(number) => Value::Integer(number),
                    Err(_) => Value::String(raw),
                };
                self.set(key, value);
            }
        }
    }

    /// Sets a dotted key, creating intermediate tables.
    pub fn set(&mut self, key: &str, value: Value) {
        let mut parts: Vec<&str> = key.split('.').collect();
        let Some(leaf) = parts.pop() else {
            return;
        };
        let mut table = &mut self.values;
        for part in parts {
            let entry = table
                .entry(part.to_string())
                .or_insert_with(|| Value::Table(Table::new()));
            if !entry.is_table() {
                *entry = Value::Table(Table::new());
            }
            let Value::Table(inner) = entry else {
                return;
            };
            table = inner;
        }
        table.insert(leaf.to_string(), value);
    }

    /// Looks up a dotted key such as `app.http.port`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        let mut parts = key.split('.');
        let mut value = self.values.get(parts.next()?)?;
        for part in parts {
            value = value.as_table()?.get(part)?;
        }
        Some(value)
    }

    pub fn get_str(&self, key: &str, default: &str) -> String {
        match self.get(key) {
            Some(Value::String(text)) => text.clone(),
            Some(Value::Integer(number)) => number.to_string(),
            _ => default.to_string(),
        }
    }

    pub fn get_int(&self, key: &str, default: i64) -> i64 {
        match self.get(key) {
            Some(Value::Integer(number)) => *number,
            Some(Value::String(text)) => text.parse().unwrap_or(default),
            _ => default,
        }
    }

    pub fn http_config(&self) -> Result<HttpConfig> {
        let port = self.get_int(HTTP_PORT, 8080);
        let port = u16::try_from(port)
            .map_err(|_| InfraError::ConfigError(format!("{HTTP_PORT} out of range: {port}")))?;
        Ok(HttpConfig::new(self.get_str(HTTP_ADDRESS, "0.0.0.0"), port))
    }

    pub fn http_engine(&self) -> String {
        self.get_str(HTTP_ENGINE, "axum")
    }

    pub fn keyval_url(&self) -> String {
        self.get_str(KEYVAL_URL, "memory://")
    }

    pub fn queue_url(&self) -> String {
        self.get_str(QUEUE_URL, "memory://")
    }
}

fn env_name(key: &str) -> String {
    key.replace('.', "_").to_ascii_uppercase()
}

fn merge(base: &mut Table, overlay: Table) {
    for (key, value) in overlay {
        match value {
            Value::Table(incoming) => {
                if let Some(Value::Table(existing)) = base.get_mut(&key) {
                    merge(existing, incoming);
                    continue;
                }
                base.insert(key, Value::Table(incoming));
            }
            other => {
                base.insert(key, other);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.http_config().unwrap(), HttpConfig::new("0.0.0.0", 8080));
        assert_eq!(config.http_engine(), "axum");
        assert_eq!(config.keyval_url(), "memory://");
        assert_eq!(config.queue_url(), "memory://");
    }

    #[test]
    fn test_file_overrides_defaults_and_keeps_the_rest() {
        let config = Config::from_toml_str(
            r#"
            [app.http]
            port = 9090

            [app.keyval]
            url = "redis://127.0.0.1:6379/0"
            "#,
        )
        .unwrap();

        assert_eq!(config.get_int(HTTP_PORT, 0), 9090);
        assert_eq!(config.get_str(HTTP_ADDRESS, ""), "0.0.0.0");
        assert_eq!(config.keyval_url(), "redis://127.0.0.1:6379/0");
        assert_eq!(config.queue_url(), "memory://");
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = Config::from_toml_str("[app.http]\nport = 9090\n").unwrap();
        let env = HashMap::from([
            ("APP_HTTP_PORT".to_string(), "7070".to_string()),
            ("APP_QUEUE_URL".to_string(), "redis://queue:6379".to_string()),
        ]);
        config.apply_env(|name| env.get(name).cloned());

        assert_eq!(config.http_config().unwrap().port, 7070);
        assert_eq!(config.queue_url(), "redis://queue:6379");
    }

    #[test]
    fn test_get_missing_and_mistyped_keys() {
        let config = Config::from_toml_str("[app.http]\nport = \"abc\"\n").unwrap();
        assert!(config.get("app.nothing.here").is_none());
        assert!(config.get("app.http.port.deeper").is_none());
        assert_eq!(config.get_int(HTTP_PORT, 8080), 8080);
        assert_eq!(config.get_str("app.http.missing", "fallback"), "fallback");
    }

    #[test]
    fn test_port_out_of_range_is_config_error() {
        let config = Config::from_toml_str("[app.http]\nport = 70000\n").unwrap();
        assert!(matches!(
            config.http_config(),
            Err(InfraError::ConfigError(_))
        ));
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let err = Config::from_toml_str("[app.http\nport = 1").unwrap_err();
        assert!(matches!(err, InfraError::ConfigError(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[app.http]\nengine = \"axum\"\naddress = \"127.0.0.1\"").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.get_str(HTTP_ADDRESS, ""), "127.0.0.1");

        let missing = Config::from_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(missing, InfraError::ConfigError(_)));
    }

    #[test]
    fn test_set_replaces_scalar_with_table() {
        let mut config = Config::default();
        config.set("app.http", Value::Integer(1));
        config.set(HTTP_PORT, Value::Integer(81));
        assert_eq!(config.get_int(HTTP_PORT, 0), 81);
    }
}
