//! REST client for the video generation service.
//!
//! Wraps asset upload, video submission, status queries, artifact download
//! and avatar listing using [`reqwest`]. Every request carries the
//! `X-Api-Key` header.

use std::path::Path;

use async_trait::async_trait;
use crickcast_core::job::JobStatus;
use crickcast_events::payload::error_message;
use tokio::io::AsyncWriteExt;

use crate::config::VideoGenConfig;
use crate::messages::{
    Avatar, AvatarList, Envelope, GenerateData, GenerateRequest, UploadData, VideoStatusData,
};
use crate::poller::StatusSource;

const API_KEY_HEADER: &str = "X-Api-Key";

/// Errors from the video generation REST layer.
#[derive(Debug, thiserror::Error)]
pub enum VideoGenApiError {
    /// The HTTP request itself failed (network, DNS, TLS, body decode).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service returned a non-2xx status code.
    #[error("video service error ({status}): {body}")]
    Api { status: u16, body: String },

    /// A 2xx response without the field we needed.
    #[error("video service response is missing {0}")]
    MissingField(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// HTTP client for one video service account.
#[derive(Clone)]
pub struct VideoGenApi {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    upload_url: String,
}

impl VideoGenApi {
    pub fn new(config: &VideoGenConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    /// Reuse an existing [`reqwest::Client`] for connection pooling.
    pub fn with_client(client: reqwest::Client, config: &VideoGenConfig) -> Self {
        Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            upload_url: config.upload_url.clone(),
        }
    }

    /// Upload an MP3 file as an asset and return its public URL.
    pub async fn upload_audio(&self, path: &Path) -> Result<String, VideoGenApiError> {
        let bytes = tokio::fs::read(path).await?;
        let response = self
            .client
            .post(format!("{}/v1/asset", self.upload_url))
            .header(API_KEY_HEADER, &self.api_key)
            .header(reqwest::header::CONTENT_TYPE, "audio/mpeg")
            .body(bytes)
            .send()
            .await?;

        let envelope: Envelope<UploadData> = Self::parse_response(response).await?;
        envelope
            .data
            .and_then(|d| d.url)
            .filter(|u| !u.is_empty())
            .ok_or(VideoGenApiError::MissingField("data.url"))
    }

    /// Start a render and return the service-assigned video id.
    pub async fn submit_video(&self, request: &GenerateRequest) -> Result<String, VideoGenApiError> {
        let response = self
            .client
            .post(format!("{}/v2/video/generate", self.base_url))
            .header(API_KEY_HEADER, &self.api_key)
            .json(request)
            .send()
            .await?;

        let envelope: Envelope<GenerateData> = Self::parse_response(response).await?;
        envelope
            .data
            .and_then(|d| d.video_id)
            .filter(|id| !id.is_empty())
            .ok_or(VideoGenApiError::MissingField("data.video_id"))
    }

    /// Query the current status of a render.
    pub async fn video_status(&self, video_id: &str) -> Result<JobStatus, VideoGenApiError> {
        let response = self
            .client
            .get(format!("{}/v1/video_status.get", self.base_url))
            .header(API_KEY_HEADER, &self.api_key)
            .query(&[("video_id", video_id)])
            .send()
            .await?;

        let envelope: Envelope<VideoStatusData> = Self::parse_response(response).await?;
        let data = envelope.data.ok_or(VideoGenApiError::MissingField("data"))?;
        let status = data
            .status
            .ok_or(VideoGenApiError::MissingField("data.status"))?;
        let reason = data.error.as_ref().and_then(error_message);
        Ok(JobStatus::from_remote(&status, data.video_url, reason))
    }

    /// Stream a finished artifact to `dest`.
    ///
    /// Writes to a `.part` sibling first so a failed download never leaves
    /// a truncated file under the final name.
    pub async fn download(&self, url: &str, dest: &Path) -> Result<u64, VideoGenApiError> {
        let mut response = Self::ensure_success(self.client.get(url).send().await?).await?;

        if let Some(parent) = dest.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let partial = dest.with_extension("part");
        let mut file = tokio::fs::File::create(&partial).await?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        drop(file);
        tokio::fs::rename(&partial, dest).await?;

        tracing::info!(dest = %dest.display(), bytes = written, "Downloaded video");
        Ok(written)
    }

    pub async fn list_avatars(&self) -> Result<Vec<Avatar>, VideoGenApiError> {
        let response = self
            .client
            .get(format!("{}/v2/avatars", self.base_url))
            .header(API_KEY_HEADER, &self.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let envelope: Envelope<AvatarList> = Self::parse_response(response).await?;
        Ok(envelope.data.map(|d| d.avatars).unwrap_or_default())
    }

    // ---- private helpers ----

    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, VideoGenApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(VideoGenApiError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, VideoGenApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl StatusSource for VideoGenApi {
    async fn status(&self, job_id: &str) -> Result<JobStatus, VideoGenApiError> {
        self.video_status(job_id).await
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::messages::Dimension;

    fn api_for(server: &MockServer) -> VideoGenApi {
        let config = VideoGenConfig {
            api_key: "test-key".into(),
            base_url: server.uri(),
            upload_url: server.uri(),
            avatar_id: "a1".into(),
            width: 1280,
            height: 720,
            test_mode: true,
            webhook_url: None,
        };
        VideoGenApi::new(&config)
    }

    #[tokio::test]
    async fn upload_sends_audio_and_returns_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/asset"))
            .and(header("X-Api-Key", "test-key"))
            .and(header("content-type", "audio/mpeg"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 100,
                "data": {"id": "asset1", "url": "https://assets/asset1.mp3"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("commentary.mp3");
        tokio::fs::write(&audio, b"ID3fake").await.unwrap();

        let url = api_for(&server).upload_audio(&audio).await.unwrap();
        assert_eq!(url, "https://assets/asset1.mp3");
    }

    #[tokio::test]
    async fn upload_of_missing_file_is_io_error() {
        let server = MockServer::start().await;
        let err = api_for(&server)
            .upload_audio(Path::new("/no/such/file.mp3"))
            .await
            .unwrap_err();
        assert_matches!(err, VideoGenApiError::Io(_));
    }

    #[tokio::test]
    async fn submit_returns_video_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/video/generate"))
            .and(body_partial_json(json!({"title": "t", "callback_id": "C1"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"error": null, "data": {"video_id": "J1"}})),
            )
            .mount(&server)
            .await;

        let req = GenerateRequest::avatar_with_audio("a1", "u", Dimension { width: 1, height: 1 }, "t", true)
            .with_webhook("C1", "https://hooks/webhook");
        assert_eq!(api_for(&server).submit_video(&req).await.unwrap(), "J1");
    }

    #[tokio::test]
    async fn submit_error_status_surfaces_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/video/generate"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let req = GenerateRequest::avatar_with_audio("a1", "u", Dimension { width: 1, height: 1 }, "t", true);
        let err = api_for(&server).submit_video(&req).await.unwrap_err();
        assert_matches!(err, VideoGenApiError::Api { status: 401, ref body } if body == "bad key");
    }

    #[tokio::test]
    async fn status_maps_remote_states() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/video_status.get"))
            .and(query_param("video_id", "done"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"status": "completed", "video_url": "https://video/J1.mp4"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/video_status.get"))
            .and(query_param("video_id", "broken"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"status": "failed", "error": {"code": 40119, "message": "audio too long"}}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/video_status.get"))
            .and(query_param("video_id", "busy"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"status": "processing"}})))
            .mount(&server)
            .await;

        let api = api_for(&server);
        assert_eq!(
            api.video_status("done").await.unwrap(),
            JobStatus::Complete {
                result_reference: "https://video/J1.mp4".into()
            }
        );
        assert_eq!(
            api.video_status("broken").await.unwrap(),
            JobStatus::Failed {
                failure_reason: "audio too long".into()
            }
        );
        assert!(!api.video_status("busy").await.unwrap().is_terminal());
    }

    #[tokio::test]
    async fn status_without_data_is_missing_field() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/video_status.get"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 400})))
            .mount(&server)
            .await;

        let err = api_for(&server).video_status("J").await.unwrap_err();
        assert_matches!(err, VideoGenApiError::MissingField("data"));
    }

    #[tokio::test]
    async fn download_writes_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/J1.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 4096]))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("match").join("video.mp4");
        let written = api_for(&server)
            .download(&format!("{}/files/J1.mp4", server.uri()), &dest)
            .await
            .unwrap();

        assert_eq!(written, 4096);
        assert_eq!(tokio::fs::read(&dest).await.unwrap().len(), 4096);
        assert!(!dest.with_extension("part").exists());
    }

    #[tokio::test]
    async fn list_avatars_parses_entries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/avatars"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"avatars": [
                    {"avatar_id": "a1", "avatar_name": "Artur", "is_public": true},
                    {"avatar_id": "a2"}
                ]}
            })))
            .mount(&server)
            .await;

        let avatars = api_for(&server).list_avatars().await.unwrap();
        assert_eq!(avatars.len(), 2);
        assert!(avatars[0].is_public);
        assert!(!avatars[1].is_public);
    }
}
