//! watchdog.toml configuration parser.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Printed when the configuration file cannot be found.
pub const EXAMPLE_CONFIG: &str = r#"bind_addr = "0.0.0.0:8079"
interval = "5m"
slack_webhooks = ["https://hooks.slack.com/services/T000/B000/XXXX"]
check_certificate_expiry = ["https://privacybydesign.foundation"]

[check_scheme_managers]
"https://privacybydesign.foundation/schememanager/pbdf" = """
-----BEGIN PUBLIC KEY-----
MFkwEwYHKoZIzj0CAQYIKoZIzj0DAQcDQgAELzHV5ipBimWpuZIDaQQd+KmNpNop
dpBeCqpDwf+Grrw9ReODb6nwlsPJ/c/gqLnc+Y3sKOAJ2bFGI+jHBSsglg==
-----END PUBLIC KEY-----
"""

[[health_checks]]
request_url = "https://privacybydesign.foundation/health"
response_body_contains = "ok"
"#;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogConfig {
    /// Address the status page listens on.
    pub bind_addr: String,
    /// Pause between the end of one check cycle and the start of the next.
    #[serde(with = "duration_str")]
    pub interval: Duration,
    /// Per-request timeout for health checks.
    #[serde(with = "duration_str")]
    pub request_timeout: Duration,
    /// Delay between launching consecutive health check tasks.
    #[serde(with = "duration_str")]
    pub stagger: Duration,
    pub retry: RetryConfig,
    pub slack_webhooks: Vec<String>,
    pub health_checks: Vec<HealthCheckSpec>,
    pub check_certificate_expiry: Vec<String>,
    pub check_timestamp_servers: Vec<String>,
    /// Scheme manager URL → pinned PEM public key.
    pub check_scheme_managers: BTreeMap<String, String>,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8079".to_string(),
            interval: Duration::from_secs(5 * 60),
            request_timeout: Duration::from_secs(3),
            stagger: Duration::from_millis(10),
            retry: RetryConfig::default(),
            slack_webhooks: Vec::new(),
            health_checks: Vec::new(),
            check_certificate_expiry: Vec::new(),
            check_timestamp_servers: Vec::new(),
            check_scheme_managers: BTreeMap::new(),
        }
    }
}

/// Retry budget for a single health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    #[serde(with = "duration_str")]
    pub min_backoff: Duration,
    #[serde(with = "duration_str")]
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 4,
            min_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
        }
    }
}

/// One configured HTTP health check.
///
/// Read-only after load: the method and status defaults are resolved
/// through accessors, never written back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthCheckSpec {
    pub request_url: String,
    pub request_method: Option<String>,
    pub request_headers: BTreeMap<String, String>,
    pub request_body: String,

    pub response_status_code_equals: Option<u16>,
    pub response_header_contains: BTreeMap<String, String>,
    pub response_body_contains: String,
}

impl HealthCheckSpec {
    /// A GET check expecting 200 from `url`.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            request_url: url.into(),
            ..Default::default()
        }
    }

    /// Request method, `GET` when unset.
    pub fn method(&self) -> &str {
        match self.request_method.as_deref() {
            Some(m) if !m.is_empty() => m,
            _ => "GET",
        }
    }

    /// Expected status code, 200 when unset.
    pub fn expected_status(&self) -> u16 {
        match self.response_status_code_equals {
            Some(code) if code != 0 => code,
            _ => 200,
        }
    }
}

impl WatchdogConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: WatchdogConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.interval.is_zero() {
            return Err(ConfigError::Invalid("interval must be non-zero".to_string()));
        }
        if self.retry.max_backoff < self.retry.min_backoff {
            return Err(ConfigError::Invalid(
                "retry.max_backoff must not be below retry.min_backoff".to_string(),
            ));
        }
        Ok(())
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Total number of configured targets across all check categories.
    pub fn target_count(&self) -> usize {
        self.health_checks.len()
            + self.check_certificate_expiry.len()
            + self.check_timestamp_servers.len()
            + self.check_scheme_managers.len()
    }
}

/// Parse a duration string like "5s", "500ms", "1m", "2h".
///
/// A bare number is taken as seconds.
pub fn parse_duration(s: &str) -> ConfigResult<Duration> {
    let s = s.trim();
    let invalid = || ConfigError::Duration(s.to_string());
    let (number, scale, millis) = if let Some(ms) = s.strip_suffix("ms") {
        (ms, 1, true)
    } else if let Some(secs) = s.strip_suffix('s') {
        (secs, 1, false)
    } else if let Some(mins) = s.strip_suffix('m') {
        (mins, 60, false)
    } else if let Some(hours) = s.strip_suffix('h') {
        (hours, 3600, false)
    } else {
        (s, 1, false)
    };

    let value = number
        .trim()
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(scale))
        .ok_or_else(invalid)?;
    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

fn format_duration(d: Duration) -> String {
    let millis = d.as_millis();
    if millis % 1000 != 0 {
        return format!("{millis}ms");
    }
    let secs = d.as_secs();
    if secs != 0 && secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else if secs != 0 && secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{secs}s")
    }
}

mod duration_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Seconds(u64),
    }

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_duration(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Seconds(secs) => Ok(Duration::from_secs(secs)),
            Raw::Text(text) => super::parse_duration(&text).map_err(de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_empty_file() {
        let config = WatchdogConfig::from_toml_str("").unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8079");
        assert_eq!(config.interval, Duration::from_secs(300));
        assert_eq!(config.request_timeout, Duration::from_secs(3));
        assert_eq!(config.stagger, Duration::from_millis(10));
        assert_eq!(config.retry.max_retries, 4);
        assert_eq!(config.target_count(), 0);
    }

    #[test]
    fn example_config_parses() {
        let config = WatchdogConfig::from_toml_str(EXAMPLE_CONFIG).unwrap();
        assert_eq!(config.slack_webhooks.len(), 1);
        assert_eq!(config.check_scheme_managers.len(), 1);
        assert_eq!(config.health_checks.len(), 1);
        assert_eq!(config.health_checks[0].response_body_contains, "ok");
        let pk = config.check_scheme_managers.values().next().unwrap();
        assert!(pk.contains("BEGIN PUBLIC KEY"));
    }

    #[test]
    fn parse_full_health_check() {
        let toml_str = r#"
interval = "30s"

[retry]
max_retries = 2
min_backoff = "100ms"
max_backoff = "1s"

[[health_checks]]
request_url = "https://api.example.org/health"
request_method = "POST"
request_body = "{}"
request_headers = { Accept = "application/json" }
response_status_code_equals = 204
response_header_contains = { "X-Status" = "ok", "X-Region" = "eu" }
"#;
        let config = WatchdogConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.interval, Duration::from_secs(30));
        assert_eq!(config.retry.max_retries, 2);
        assert_eq!(config.retry.min_backoff, Duration::from_millis(100));

        let check = &config.health_checks[0];
        assert_eq!(check.method(), "POST");
        assert_eq!(check.expected_status(), 204);
        assert_eq!(check.request_headers["Accept"], "application/json");
        // BTreeMap keeps header assertions in a stable order.
        let keys: Vec<_> = check.response_header_contains.keys().collect();
        assert_eq!(keys, vec!["X-Region", "X-Status"]);
    }

    #[test]
    fn health_check_defaults_are_not_written_back() {
        let check = HealthCheckSpec::get("http://localhost/");
        assert_eq!(check.method(), "GET");
        assert_eq!(check.expected_status(), 200);
        assert!(check.request_method.is_none());
        assert!(check.response_status_code_equals.is_none());
    }

    #[test]
    fn zero_interval_rejected() {
        let err = WatchdogConfig::from_toml_str("interval = \"0s\"").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn bad_duration_rejected() {
        let err = WatchdogConfig::from_toml_str("interval = \"soon\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn numeric_duration_is_seconds() {
        let config = WatchdogConfig::from_toml_str("interval = 90").unwrap();
        assert_eq!(config.interval, Duration::from_secs(90));
    }

    #[test]
    fn from_file_reports_missing_path() {
        let err = WatchdogConfig::from_file(Path::new("/nonexistent/watchdog.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn from_file_reads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watchdog.toml");
        std::fs::write(&path, "bind_addr = \"127.0.0.1:9000\"\n").unwrap();
        let config = WatchdogConfig::from_file(&path).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:9000");
    }

    #[test]
    fn round_trips_through_toml() {
        let config = WatchdogConfig::from_toml_str(EXAMPLE_CONFIG).unwrap();
        let rendered = config.to_toml_string().unwrap();
        assert!(rendered.contains("interval = \"5m\""));
        assert!(rendered.contains("stagger = \"10ms\""));
    }

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("10").unwrap(), Duration::from_secs(10));
        assert!(matches!(parse_duration("abc"), Err(ConfigError::Duration(s)) if s == "abc"));
    }

    #[test]
    fn oversized_duration_is_rejected() {
        assert!(matches!(
            parse_duration("999999999999999999h"),
            Err(ConfigError::Duration(_))
        ));
        assert!(matches!(
            parse_duration("999999999999999999999m"),
            Err(ConfigError::Duration(_))
        ));

        let err = WatchdogConfig::from_toml_str("interval = \"999999999999999999h\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("invalid duration: 999999999999999999h"));
    }
}
