use crickcast_core::error::CoreError;
use crickcast_core::wait_config::WaitConfig;

pub const DEFAULT_BASE_URL: &str = "https://api.heygen.com";
pub const DEFAULT_UPLOAD_URL: &str = "https://upload.heygen.com";
pub const DEFAULT_AVATAR_ID: &str = "Artur_sitting_sofacasual_front";

/// Connection and rendering settings for the video generation service.
#[derive(Debug, Clone)]
pub struct VideoGenConfig {
    pub api_key: String,
    /// REST base URL (generate, status, avatars).
    pub base_url: String,
    /// Asset upload base URL.
    pub upload_url: String,
    pub avatar_id: String,
    pub width: u32,
    pub height: u32,
    /// Ask the service for watermarked test renders.
    pub test_mode: bool,
    /// Public URL the service should push completion events to.
    pub webhook_url: Option<String>,
}

impl VideoGenConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var             | Default                           |
    /// |---------------------|-----------------------------------|
    /// | `HEYGEN_API_KEY`    | required                          |
    /// | `HEYGEN_BASE_URL`   | `https://api.heygen.com`          |
    /// | `HEYGEN_UPLOAD_URL` | `https://upload.heygen.com`       |
    /// | `HEYGEN_AVATAR_ID`  | `Artur_sitting_sofacasual_front`  |
    /// | `VIDEO_WIDTH`       | `1280`                            |
    /// | `VIDEO_HEIGHT`      | `720`                             |
    /// | `USE_TEST_MODE`     | `true`                            |
    /// | `WEBHOOK_URL`       | unset (push unavailable)          |
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("HEYGEN_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| CoreError::Validation("HEYGEN_API_KEY must be set".into()))?;

        let text = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let dimension = |key: &str, default: u32| -> Result<u32, CoreError> {
            match lookup(key) {
                Some(raw) => raw
                    .trim()
                    .parse::<u32>()
                    .ok()
                    .filter(|v| *v > 0)
                    .ok_or_else(|| {
                        CoreError::Validation(format!("{key} must be a positive integer, got '{raw}'"))
                    }),
                None => Ok(default),
            }
        };

        Ok(Self {
            api_key,
            base_url: trim_slash(text("HEYGEN_BASE_URL", DEFAULT_BASE_URL)),
            upload_url: trim_slash(text("HEYGEN_UPLOAD_URL", DEFAULT_UPLOAD_URL)),
            avatar_id: text("HEYGEN_AVATAR_ID", DEFAULT_AVATAR_ID),
            width: dimension("VIDEO_WIDTH", 1280)?,
            height: dimension("VIDEO_HEIGHT", 720)?,
            test_mode: lookup("USE_TEST_MODE")
                .map(|v| v.trim().eq_ignore_ascii_case("true"))
                .unwrap_or(true),
            webhook_url: lookup("WEBHOOK_URL").filter(|u| !u.trim().is_empty()),
        })
    }

    /// Push is only usable when enabled and the service has somewhere to send it.
    pub fn push_available(&self, wait: &WaitConfig) -> bool {
        wait.push_enabled && self.webhook_url.is_some()
    }
}

fn trim_slash(url: String) -> String {
    url.trim_end_matches('/').to_string()
}
