//! Configuration for the job-completion wait (push first, then poll).

use std::time::Duration;

use crate::error::CoreError;

/// Default bound on how long to wait for a push before polling (10 min).
pub const DEFAULT_PUSH_TIMEOUT_SECS: u64 = 600;

/// Default spacing between status queries.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 15;

/// Tunables for `CompletionWaiter` and `StatusPoller`.
#[derive(Debug, Clone, PartialEq)]
pub struct WaitConfig {
    /// Whether the push channel should be attempted at all.
    pub push_enabled: bool,
    /// Bounded wait for a push before falling back to polling.
    pub push_timeout: Duration,
    /// Fixed interval between status queries.
    pub poll_interval: Duration,
    /// Optional overall polling deadline. `None` polls until terminal.
    pub poll_max_wait: Option<Duration>,
    /// Consecutive transport failures tolerated before polling gives up.
    /// Zero makes the first transport error fatal.
    pub poll_transport_retries: u32,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            push_enabled: true,
            push_timeout: Duration::from_secs(DEFAULT_PUSH_TIMEOUT_SECS),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            poll_max_wait: None,
            poll_transport_retries: 0,
        }
    }
}

impl WaitConfig {
    /// Load from the process environment.
    ///
    /// | Env Var                  | Default |
    /// |--------------------------|---------|
    /// | `PUSH_ENABLED`           | `true`  |
    /// | `PUSH_TIMEOUT_SECS`      | `600`   |
    /// | `POLL_INTERVAL_SECS`     | `15`    |
    /// | `POLL_MAX_WAIT_SECS`     | unset   |
    /// | `POLL_TRANSPORT_RETRIES` | `0`     |
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary key lookup (used by `from_env` and tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let push_enabled = match lookup("PUSH_ENABLED") {
            Some(raw) => parse_bool("PUSH_ENABLED", &raw)?,
            None => defaults.push_enabled,
        };
        let push_timeout = match lookup("PUSH_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(parse_u64("PUSH_TIMEOUT_SECS", &raw)?),
            None => defaults.push_timeout,
        };
        let poll_interval = match lookup("POLL_INTERVAL_SECS") {
            Some(raw) => Duration::from_secs(parse_u64("POLL_INTERVAL_SECS", &raw)?),
            None => defaults.poll_interval,
        };
        let poll_max_wait = match lookup("POLL_MAX_WAIT_SECS") {
            Some(raw) if !raw.trim().is_empty() => Some(Duration::from_secs(parse_u64(
                "POLL_MAX_WAIT_SECS",
                &raw,
            )?)),
            _ => None,
        };
        let poll_transport_retries = match lookup("POLL_TRANSPORT_RETRIES") {
            Some(raw) => raw.trim().parse::<u32>().map_err(|_| {
                CoreError::Validation(format!(
                    "POLL_TRANSPORT_RETRIES must be a non-negative integer, got '{raw}'"
                ))
            })?,
            None => defaults.poll_transport_retries,
        };

        let config = Self {
            push_enabled,
            push_timeout,
            poll_interval,
            poll_max_wait,
            poll_transport_retries,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject zero durations; a zero interval would spin against the service.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.push_timeout.is_zero() {
            return Err(CoreError::Validation(
                "push timeout must be greater than zero".into(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(CoreError::Validation(
                "poll interval must be greater than zero".into(),
            ));
        }
        if self.poll_max_wait.is_some_and(|d| d.is_zero()) {
            return Err(CoreError::Validation(
                "poll max wait must be greater than zero when set".into(),
            ));
        }
        Ok(())
    }
}

fn parse_u64(key: &str, raw: &str) -> Result<u64, CoreError> {
    raw.trim().parse::<u64>().map_err(|_| {
        CoreError::Validation(format!(
            "{key} must be a whole number of seconds, got '{raw}'"
        ))
    })
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, CoreError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(CoreError::Validation(format!(
            "{key} must be a boolean, got '{raw}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let config = WaitConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, WaitConfig::default());
        assert!(config.poll_max_wait.is_none());
    }

    #[test]
    fn reads_all_keys() {
        let config = WaitConfig::from_lookup(lookup(&[
            ("PUSH_ENABLED", "false"),
            ("PUSH_TIMEOUT_SECS", "5"),
            ("POLL_INTERVAL_SECS", "2"),
            ("POLL_MAX_WAIT_SECS", "120"),
            ("POLL_TRANSPORT_RETRIES", "3"),
        ]))
        .unwrap();

        assert!(!config.push_enabled);
        assert_eq!(config.push_timeout, Duration::from_secs(5));
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.poll_max_wait, Some(Duration::from_secs(120)));
        assert_eq!(config.poll_transport_retries, 3);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let result = WaitConfig::from_lookup(lookup(&[("POLL_INTERVAL_SECS", "0")]));
        assert_matches!(result, Err(CoreError::Validation(_)));
    }

    #[test]
    fn garbage_bool_is_rejected() {
        let result = WaitConfig::from_lookup(lookup(&[("PUSH_ENABLED", "maybe")]));
        assert_matches!(result, Err(CoreError::Validation(msg)) if msg.contains("PUSH_ENABLED"));
    }

    #[test]
    fn blank_max_wait_means_unbounded() {
        let config = WaitConfig::from_lookup(lookup(&[("POLL_MAX_WAIT_SECS", " ")])).unwrap();
        assert!(config.poll_max_wait.is_none());
    }
}
