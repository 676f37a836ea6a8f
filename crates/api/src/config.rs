use std::path::PathBuf;

use crickcast_core::error::CoreError;

/// Upper bound for `PROGRESS_TTL_SECS` (30 days).
pub const MAX_PROGRESS_TTL_SECS: u64 = 30 * 24 * 60 * 60;

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `5200`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Directory holding `ipl_{year}.json` catalogues.
    pub data_dir: PathBuf,
    /// Root of the per-match artifact folders.
    pub output_dir: PathBuf,
    /// How long finished jobs stay visible in progress queries.
    pub progress_ttl_secs: u64,
    /// JSON mirror of the completed-video log. Unset keeps it in memory.
    pub completed_videos_file: Option<PathBuf>,
    /// Where raw push bodies are archived. Set `WEBHOOK_LOG_DIR` empty to
    /// turn archiving off.
    pub webhook_log_dir: Option<PathBuf>,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                 |
    /// |-------------------------|-------------------------|
    /// | `HOST`                  | `0.0.0.0`               |
    /// | `PORT`                  | `5200`                  |
    /// | `CORS_ORIGINS`          | `http://localhost:5200` |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                    |
    /// | `DATA_DIR`              | `data`                  |
    /// | `OUTPUT_DIR`            | `commentaries`          |
    /// | `PROGRESS_TTL_SECS`     | `3600`                  |
    /// | `COMPLETED_VIDEOS_FILE` | unset                   |
    /// | `WEBHOOK_LOG_DIR`       | `webhook_logs`          |
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".into());

        let port: u16 = parse_or(&lookup, "PORT", 5200)?;

        let cors_origins: Vec<String> = lookup("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5200".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 30)?;
        let progress_ttl_secs: u64 = parse_or(&lookup, "PROGRESS_TTL_SECS", 3600)?;
        if progress_ttl_secs > MAX_PROGRESS_TTL_SECS {
            return Err(CoreError::Validation(format!(
                "PROGRESS_TTL_SECS must be at most {MAX_PROGRESS_TTL_SECS}, got {progress_ttl_secs}"
            )));
        }

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            data_dir: lookup("DATA_DIR").unwrap_or_else(|| "data".into()).into(),
            output_dir: lookup("OUTPUT_DIR")
                .unwrap_or_else(|| "commentaries".into())
                .into(),
            progress_ttl_secs,
            completed_videos_file: lookup("COMPLETED_VIDEOS_FILE")
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            webhook_log_dir: match lookup("WEBHOOK_LOG_DIR") {
                None => Some(PathBuf::from("webhook_logs")),
                Some(dir) if dir.trim().is_empty() => None,
                Some(dir) => Some(PathBuf::from(dir)),
            },
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, CoreError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| CoreError::Validation(format!("{key} must be a valid number, got '{raw}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ServerConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.port, 5200);
        assert_eq!(config.output_dir, PathBuf::from("commentaries"));
        assert!(config.completed_videos_file.is_none());
        assert_eq!(config.webhook_log_dir, Some(PathBuf::from("webhook_logs")));
    }

    #[test]
    fn empty_webhook_log_dir_disables_archiving() {
        let config = ServerConfig::from_lookup(|k| (k == "WEBHOOK_LOG_DIR").then(String::new)).unwrap();
        assert!(config.webhook_log_dir.is_none());
    }

    #[test]
    fn rejects_bad_port() {
        let result = ServerConfig::from_lookup(|k| (k == "PORT").then(|| "http".into()));
        assert!(result.is_err());
    }

    #[test]
    fn rejects_progress_ttl_beyond_bound() {
        let too_long = ServerConfig::from_lookup(|k| {
            (k == "PROGRESS_TTL_SECS").then(|| u64::MAX.to_string())
        });
        assert!(matches!(too_long, Err(CoreError::Validation(_))));

        let at_bound = ServerConfig::from_lookup(|k| {
            (k == "PROGRESS_TTL_SECS").then(|| MAX_PROGRESS_TTL_SECS.to_string())
        })
        .unwrap();
        assert_eq!(at_bound.progress_ttl_secs, MAX_PROGRESS_TTL_SECS);
    }

    #[test]
    fn splits_origins() {
        let config = ServerConfig::from_lookup(|k| {
            (k == "CORS_ORIGINS").then(|| "http://a.test, http://b.test,".into())
        })
        .unwrap();
        assert_eq!(config.cors_origins, ["http://a.test", "http://b.test"]);
    }
}
