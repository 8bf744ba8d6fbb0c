//! Monitor configuration, read from the environment (and `.env`).
//!
//! | variable             | default                  |
//! |----------------------|--------------------------|
//! | `VITALS_KERNEL_URL`  | `http://127.0.0.1:8080`  |
//! | `VITALS_API_KEY`     | none (kernel answers 401)|
//! | `VITALS_POLL_MS`     | 500                      |
//! | `VITALS_LOG_POLL_MS` | 2000                     |
//! | `VITALS_WINDOW`      | 120                      |

use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    pub kernel_url: String,
    pub api_key: Option<String>,
    pub poll_interval: Duration,
    pub log_poll_interval: Duration,
    /// Readings requested per device on each poll
    pub window: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            kernel_url: "http://127.0.0.1:8080".to_string(),
            api_key: None,
            poll_interval: Duration::from_millis(500),
            log_poll_interval: Duration::from_millis(2000),
            window: 120,
        }
    }
}

impl MonitorConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let value = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Self {
            kernel_url: value("VITALS_KERNEL_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.kernel_url),
            api_key: value("VITALS_API_KEY"),
            poll_interval: value("VITALS_POLL_MS")
                .and_then(|v| parse_millis("VITALS_POLL_MS", &v))
                .unwrap_or(defaults.poll_interval),
            log_poll_interval: value("VITALS_LOG_POLL_MS")
                .and_then(|v| parse_millis("VITALS_LOG_POLL_MS", &v))
                .unwrap_or(defaults.log_poll_interval),
            window: value("VITALS_WINDOW")
                .and_then(|v| match v.parse::<usize>() {
                    Ok(n) if n > 0 => Some(n),
                    _ => {
                        warn!("ignoring invalid VITALS_WINDOW={v}");
                        None
                    }
                })
                .unwrap_or(defaults.window),
        }
    }
}

fn parse_millis(key: &str, raw: &str) -> Option<Duration> {
    match raw.parse::<u64>() {
        Ok(ms) if ms > 0 => Some(Duration::from_millis(ms)),
        _ => {
            warn!("ignoring invalid {key}={raw}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> MonitorConfig {
        let env: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        MonitorConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        assert_eq!(config_from(&[]), MonitorConfig::default());
    }

    #[test]
    fn test_overrides_and_invalid_values() {
        let cfg = config_from(&[
            ("VITALS_KERNEL_URL", "http://ward-3:9000/"),
            ("VITALS_API_KEY", "k"),
            ("VITALS_POLL_MS", "250"),
            ("VITALS_LOG_POLL_MS", "soon"),
            ("VITALS_WINDOW", "0"),
        ]);
        assert_eq!(cfg.kernel_url, "http://ward-3:9000");
        assert_eq!(cfg.api_key.as_deref(), Some("k"));
        assert_eq!(cfg.poll_interval, Duration::from_millis(250));
        assert_eq!(cfg.log_poll_interval, Duration::from_millis(2000));
        assert_eq!(cfg.window, 120);
    }
}
