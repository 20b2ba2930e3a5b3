//! Serializable engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::backoff::DEFAULT_LADDER_MS;

/// Prefix of every environment variable read by [`EngineConfig::from_env`].
pub const ENV_PREFIX: &str = "OFFLINE_DISPATCH_";

/// Engine configuration. Durations are in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Base URL probed by the reachability gate.
    pub base_endpoint: Option<String>,
    /// How long a dispatch may stay unanswered before it times out.
    pub dispatch_timeout_ms: u64,
    /// Window after a successful probe during which probing is skipped.
    /// While unreachable, the probe is retried every three cooldowns.
    pub probe_cooldown_ms: u64,
    /// Probe connect timeout.
    pub probe_connect_timeout_ms: u64,
    /// Probe read timeout.
    pub probe_read_timeout_ms: u64,
    /// Retry delays, shortest first.
    pub backoff_ladder_ms: Vec<u64>,
    /// Initial connectivity reported by the connectivity gate.
    pub initially_online: bool,
    /// Name of the worker thread.
    pub worker_thread_name: String,
    /// Capacity of the in-memory audit sink created by the builder.
    pub audit_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_endpoint: None,
            dispatch_timeout_ms: 30_000,
            probe_cooldown_ms: 10_000,
            probe_connect_timeout_ms: 3_000,
            probe_read_timeout_ms: 10_000,
            backoff_ladder_ms: DEFAULT_LADDER_MS.to_vec(),
            initially_online: true,
            worker_thread_name: "offline-dispatch".into(),
            audit_capacity: 256,
        }
    }
}

impl EngineConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(endpoint) = &self.base_endpoint {
            if endpoint.trim().is_empty() {
                return Err("base_endpoint must not be blank".into());
            }
        }
        if self.dispatch_timeout_ms == 0 {
            return Err("dispatch_timeout_ms must be greater than 0".into());
        }
        if self.probe_cooldown_ms == 0 {
            return Err("probe_cooldown_ms must be greater than 0".into());
        }
        if self.probe_connect_timeout_ms == 0 || self.probe_read_timeout_ms == 0 {
            return Err("probe timeouts must be greater than 0".into());
        }
        if self.backoff_ladder_ms.is_empty() {
            return Err("backoff_ladder_ms must have at least one rung".into());
        }
        if self.backoff_ladder_ms.windows(2).any(|w| w[0] > w[1]) {
            return Err("backoff_ladder_ms must be non-decreasing".into());
        }
        if self.worker_thread_name.trim().is_empty() {
            return Err("worker_thread_name must not be blank".into());
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load `.env` if present, then overlay `OFFLINE_DISPATCH_*` variables on
    /// the defaults and validate.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Overlay variables resolved by `lookup` on the defaults and validate.
    ///
    /// `lookup` receives full variable names such as
    /// `OFFLINE_DISPATCH_DISPATCH_TIMEOUT_MS`.
    pub fn from_vars<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |suffix: &str| lookup(&format!("{ENV_PREFIX}{suffix}"));
        let mut cfg = Self::default();

        if let Some(v) = get("BASE_ENDPOINT") {
            cfg.base_endpoint = Some(v);
        }
        if let Some(v) = get("DISPATCH_TIMEOUT_MS") {
            cfg.dispatch_timeout_ms = parse_num("DISPATCH_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = get("PROBE_COOLDOWN_MS") {
            cfg.probe_cooldown_ms = parse_num("PROBE_COOLDOWN_MS", &v)?;
        }
        if let Some(v) = get("PROBE_CONNECT_TIMEOUT_MS") {
            cfg.probe_connect_timeout_ms = parse_num("PROBE_CONNECT_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = get("PROBE_READ_TIMEOUT_MS") {
            cfg.probe_read_timeout_ms = parse_num("PROBE_READ_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = get("BACKOFF_LADDER_MS") {
            cfg.backoff_ladder_ms = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| parse_num("BACKOFF_LADDER_MS", s))
                .collect::<Result<_, _>>()?;
        }
        if let Some(v) = get("INITIALLY_ONLINE") {
            cfg.initially_online = match v.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                other => return Err(format!("{ENV_PREFIX}INITIALLY_ONLINE: invalid bool `{other}`")),
            };
        }
        if let Some(v) = get("WORKER_THREAD_NAME") {
            cfg.worker_thread_name = v;
        }
        if let Some(v) = get("AUDIT_CAPACITY") {
            cfg.audit_capacity = parse_num("AUDIT_CAPACITY", &v)?;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Base endpoint with a trailing `/`, if configured.
    #[must_use]
    pub fn normalized_endpoint(&self) -> Option<String> {
        self.base_endpoint.as_deref().map(normalize_endpoint)
    }

    /// Dispatch timeout.
    #[must_use]
    pub const fn dispatch_timeout(&self) -> Duration {
        Duration::from_millis(self.dispatch_timeout_ms)
    }

    /// Probe cooldown.
    #[must_use]
    pub const fn probe_cooldown(&self) -> Duration {
        Duration::from_millis(self.probe_cooldown_ms)
    }

    /// Probe connect timeout.
    #[must_use]
    pub const fn probe_connect_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_connect_timeout_ms)
    }

    /// Probe read timeout.
    #[must_use]
    pub const fn probe_read_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_read_timeout_ms)
    }
}

/// Append a trailing `/` unless already present.
#[must_use]
pub fn normalize_endpoint(endpoint: &str) -> String {
    let trimmed = endpoint.trim();
    if trimmed.ends_with('/') {
        trimmed.to_owned()
    } else {
        format!("{trimmed}/")
    }
}

fn parse_num<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, String>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| format!("{ENV_PREFIX}{name}: {e}"))
}
