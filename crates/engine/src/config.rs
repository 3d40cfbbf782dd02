use std::str::FromStr;
use std::time::Duration;

/// How a resolved staff drop is committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignMode {
    /// Buffer the assignment in the pending-change ledger until `save()`.
    Buffered,
    /// Call the single-assignment endpoint right away.
    Immediate,
}

impl FromStr for AssignMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buffered" => Ok(Self::Buffered),
            "immediate" => Ok(Self::Immediate),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got '{value}'")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Engine configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Planning API base URL.
    pub api_url: String,
    /// How long a cached month stays fresh.
    pub cache_ttl: Duration,
    /// Prefetch the months adjacent to each rendered month.
    pub prefetch: bool,
    pub assign_mode: AssignMode,
    /// Transport timeout of the HTTP client.
    pub request_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000".into(),
            cache_ttl: Duration::from_secs(300),
            prefetch: true,
            assign_mode: AssignMode::Buffered,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                         | Default                 |
    /// |---------------------------------|-------------------------|
    /// | `PLANNING_API_URL`              | `http://localhost:8000` |
    /// | `PLANNING_CACHE_TTL_SECS`       | `300`                   |
    /// | `PLANNING_PREFETCH`             | `true`                  |
    /// | `PLANNING_ASSIGN_MODE`          | `buffered`              |
    /// | `PLANNING_REQUEST_TIMEOUT_SECS` | `30`                    |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_url = lookup("PLANNING_API_URL")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.api_url);

        let cache_ttl = match lookup("PLANNING_CACHE_TTL_SECS") {
            Some(v) => Duration::from_secs(parse_u64("PLANNING_CACHE_TTL_SECS", &v)?),
            None => defaults.cache_ttl,
        };

        let prefetch = match lookup("PLANNING_PREFETCH") {
            Some(v) => parse_bool("PLANNING_PREFETCH", &v)?,
            None => defaults.prefetch,
        };

        let assign_mode = match lookup("PLANNING_ASSIGN_MODE") {
            Some(v) => v.parse().map_err(|_| ConfigError::Invalid {
                var: "PLANNING_ASSIGN_MODE",
                expected: "'buffered' or 'immediate'",
                value: v.clone(),
            })?,
            None => defaults.assign_mode,
        };

        let request_timeout = match lookup("PLANNING_REQUEST_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(parse_u64("PLANNING_REQUEST_TIMEOUT_SECS", &v)?),
            None => defaults.request_timeout,
        };

        Ok(Self {
            api_url,
            cache_ttl,
            prefetch,
            assign_mode,
            request_timeout,
        })
    }
}

fn parse_u64(var: &'static str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        var,
        expected: "a non-negative integer",
        value: value.to_string(),
    })
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            expected: "a boolean",
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = EngineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.api_url, "http://localhost:8000");
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
        assert!(config.prefetch);
        assert_eq!(config.assign_mode, AssignMode::Buffered);
    }

    #[test]
    fn overrides_are_parsed() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("PLANNING_API_URL", "https://rh.example.org"),
            ("PLANNING_CACHE_TTL_SECS", "60"),
            ("PLANNING_PREFETCH", "off"),
            ("PLANNING_ASSIGN_MODE", "Immediate"),
            ("PLANNING_REQUEST_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();
        assert_eq!(config.api_url, "https://rh.example.org");
        assert_eq!(config.cache_ttl, Duration::from_secs(60));
        assert!(!config.prefetch);
        assert_eq!(config.assign_mode, AssignMode::Immediate);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn invalid_values_are_reported() {
        let err = EngineConfig::from_lookup(lookup(&[("PLANNING_CACHE_TTL_SECS", "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains("PLANNING_CACHE_TTL_SECS"));

        let err = EngineConfig::from_lookup(lookup(&[("PLANNING_ASSIGN_MODE", "later")]))
            .unwrap_err();
        assert!(err.to_string().contains("later"));
    }
}
