//! Server settings from environment variables (after `.env` is loaded by the binary).

use crate::error::ConfigError;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Clone, Debug)]
pub struct Settings {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub entity_config: PathBuf,
    pub db_max_connections: u32,
    pub api_prefix: String,
    pub run_migrations: bool,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env` with an injectable source; unset keys take defaults.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Settings {
            database_url: get("DATABASE_URL").unwrap_or_else(|| "postgres://localhost/chinook".into()),
            bind_addr: parse(&get, "BIND_ADDR", "0.0.0.0:3000")?,
            entity_config: get("ENTITY_CONFIG")
                .unwrap_or_else(|| "demos/chinook/entities.json".into())
                .into(),
            db_max_connections: parse(&get, "DB_MAX_CONNECTIONS", "5")?,
            api_prefix: get("API_PREFIX").unwrap_or_else(|| "/api/v1".into()),
            run_migrations: parse_bool(&get, "RUN_MIGRATIONS", true)?,
        })
    }
}

fn parse<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get(key).unwrap_or_else(|| default.to_string());
    raw.trim()
        .parse()
        .map_err(|e| ConfigError::Load(format!("{}={:?}: {}", key, raw, e)))
}

fn parse_bool(get: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> Result<bool, ConfigError> {
    match get(key).as_deref().map(str::trim) {
        None => Ok(default),
        Some(v) if ["1", "true", "yes", "on"].iter().any(|t| v.eq_ignore_ascii_case(t)) => Ok(true),
        Some(v) if ["0", "false", "no", "off"].iter().any(|f| v.eq_ignore_ascii_case(f)) => Ok(false),
        Some(v) => Err(ConfigError::Load(format!("{}={:?}: expected a boolean", key, v))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(pairs: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let env: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Settings::from_lookup(|k| env.get(k).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let s = settings(&[]).unwrap();
        assert_eq!(s.bind_addr.port(), 3000);
        assert_eq!(s.db_max_connections, 5);
        assert_eq!(s.api_prefix, "/api/v1");
        assert!(s.run_migrations);
    }

    #[test]
    fn overrides_and_malformed_values() {
        let s = settings(&[("RUN_MIGRATIONS", "off"), ("DB_MAX_CONNECTIONS", "12")]).unwrap();
        assert!(!s.run_migrations);
        assert_eq!(s.db_max_connections, 12);
        assert!(matches!(settings(&[("BIND_ADDR", "nowhere")]), Err(ConfigError::Load(_))));
        assert!(matches!(settings(&[("RUN_MIGRATIONS", "maybe")]), Err(ConfigError::Load(_))));
    }
}
