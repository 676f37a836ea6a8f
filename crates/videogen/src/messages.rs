//! Request and response bodies for the video generation REST API.
//!
//! Every response is wrapped as `{"error": ..., "data": {...}}`.

use serde::{Deserialize, Serialize};

/// Push events requested on every submission that carries a webhook.
pub const WEBHOOK_EVENTS: &[&str] = &["video.complete", "video.failed"];

/// Response envelope shared by all endpoints.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct UploadData {
    pub url: Option<String>,
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateData {
    pub video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VideoStatusData {
    pub status: Option<String>,
    pub video_url: Option<String>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct AvatarList {
    #[serde(default)]
    pub avatars: Vec<Avatar>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Avatar {
    pub avatar_id: String,
    pub avatar_name: Option<String>,
    pub gender: Option<String>,
    pub preview_image_url: Option<String>,
    #[serde(default)]
    pub is_public: bool,
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

/// Body of `POST /v2/video/generate`.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    pub video_inputs: Vec<VideoInput>,
    pub dimension: Dimension,
    pub title: String,
    pub test: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook: Option<Webhook>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VideoInput {
    pub character: Character,
    pub voice: Voice,
}

#[derive(Debug, Clone, Serialize)]
pub struct Character {
    #[serde(rename = "type")]
    pub kind: String,
    pub avatar_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Voice {
    #[serde(rename = "type")]
    pub kind: String,
    pub audio_url: String,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Dimension {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Webhook {
    pub url: String,
    pub events: Vec<String>,
}

impl GenerateRequest {
    /// Avatar lip-synced to an uploaded audio asset.
    pub fn avatar_with_audio(
        avatar_id: &str,
        audio_url: &str,
        dimension: Dimension,
        title: &str,
        test: bool,
    ) -> Self {
        Self {
            video_inputs: vec![VideoInput {
                character: Character {
                    kind: "avatar".into(),
                    avatar_id: avatar_id.to_string(),
                },
                voice: Voice {
                    kind: "audio".into(),
                    audio_url: audio_url.to_string(),
                },
            }],
            dimension,
            title: title.to_string(),
            test,
            callback_id: None,
            webhook: None,
        }
    }

    /// Ask the service to push completion to `url`, tagged with `callback_id`.
    pub fn with_webhook(mut self, callback_id: &str, url: &str) -> Self {
        self.callback_id = Some(callback_id.to_string());
        self.webhook = Some(Webhook {
            url: url.to_string(),
            events: WEBHOOK_EVENTS.iter().map(|e| e.to_string()).collect(),
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn request_without_webhook_omits_push_fields() {
        let req = GenerateRequest::avatar_with_audio(
            "a1",
            "https://assets/a.mp3",
            Dimension { width: 1280, height: 720 },
            "IPL 2024 - Match 1",
            true,
        );
        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(body["video_inputs"][0]["character"]["type"], "avatar");
        assert_eq!(body["video_inputs"][0]["voice"]["audio_url"], "https://assets/a.mp3");
        assert_eq!(body["dimension"], json!({"width": 1280, "height": 720}));
        assert!(body.get("callback_id").is_none());
        assert!(body.get("webhook").is_none());
    }

    #[test]
    fn request_with_webhook_lists_events() {
        let req = GenerateRequest::avatar_with_audio("a1", "u", Dimension { width: 1, height: 1 }, "t", false)
            .with_webhook("video_x", "https://hooks/webhook");
        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(body["callback_id"], "video_x");
        assert_eq!(body["webhook"]["events"], json!(["video.complete", "video.failed"]));
    }

    #[test]
    fn status_envelope_tolerates_missing_fields() {
        let env: Envelope<VideoStatusData> =
            serde_json::from_value(json!({"code": 100, "data": {"status": "processing"}})).unwrap();
        let data = env.data.unwrap();
        assert_eq!(data.status.as_deref(), Some("processing"));
        assert!(data.video_url.is_none());
    }
}
