use std::sync::atomic::{AtomicI16, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, Response};
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use crate::config::UploadConfig;
use crate::error::UploadError;

const IMGBB_ENDPOINT: &str = "https://api.imgbb.com/1/upload";
const CLOUDINARY_API: &str = "https://api.cloudinary.com/v1_1/";
const CHUNK_SIZE: usize = 64 * 1024;

/// Receives upload progress as whole percentages.
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// Hosts listing media and hands back a public url.
#[async_trait]
pub trait MediaUploader: Send + Sync {
    async fn upload_image(&self, bytes: Vec<u8>) -> Result<Url, UploadError>;

    /// Progress goes from 0 to 100, never backwards, and 100 is only reported
    /// once the host accepted the file.
    async fn upload_video(&self, bytes: Vec<u8>, progress: ProgressFn) -> Result<Url, UploadError>;
}

/// Forwards percentages to a [`ProgressFn`], dropping repeats and regressions.
#[derive(Clone)]
pub struct ProgressTracker {
    sink: ProgressFn,
    last: Arc<AtomicI16>,
}

impl ProgressTracker {
    pub fn new(sink: ProgressFn) -> Self { Self { sink, last: Arc::new(AtomicI16::new(-1)) } }

    pub fn report(&self, percent: u8) {
        let percent = percent.min(100);
        let prev = self.last.fetch_max(i16::from(percent), Ordering::SeqCst);
        if prev < i16::from(percent) {
            (self.sink)(percent);
        }
    }

    /// Transfer progress, held below 100 until the host confirms.
    pub fn report_bytes(&self, sent: usize, total: usize) {
        let percent = if total == 0 { 0.0 } else { (sent as f64 / total as f64 * 100.0).round() };
        self.report((percent as u8).min(99));
    }
}

/// ImgBB for images, a Cloudinary unsigned preset for videos.
pub struct HostedUploader {
    client: Client,
    config: UploadConfig,
}

impl HostedUploader {
    pub fn new(config: UploadConfig) -> Result<Self, UploadError> {
        let client = Client::builder()
            .user_agent(concat!("reelmart/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, config })
    }

    fn cloudinary(&self) -> Result<(Url, &str), UploadError> {
        let cloud = non_empty(&self.config.cloudinary_cloud_name).ok_or(UploadError::NotConfigured("cloudinary_cloud_name"))?;
        let preset = non_empty(&self.config.cloudinary_upload_preset).ok_or(UploadError::NotConfigured("cloudinary_upload_preset"))?;
        let url = Url::parse(CLOUDINARY_API)
            .and_then(|u| u.join(&format!("{cloud}/video/upload")))
            .map_err(|_| UploadError::NotConfigured("cloudinary_cloud_name"))?;
        Ok((url, preset))
    }
}

fn non_empty(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

async fn accepted_json(resp: Response) -> Result<Value, UploadError> {
    let status = resp.status();
    if !status.is_success() {
        return Err(UploadError::Rejected(status.as_u16()));
    }
    Ok(resp.json().await?)
}

pub(crate) fn imgbb_url(body: &Value) -> Result<Url, UploadError> {
    url_at(body, "/data/url")
}

pub(crate) fn cloudinary_url(body: &Value) -> Result<Url, UploadError> {
    url_at(body, "/secure_url")
}

fn url_at(body: &Value, pointer: &str) -> Result<Url, UploadError> {
    body.pointer(pointer)
        .and_then(Value::as_str)
        .and_then(|s| Url::parse(s).ok())
        .ok_or_else(|| UploadError::MissingUrl(pointer.trim_start_matches('/').replace('/', ".")))
}

#[async_trait]
impl MediaUploader for HostedUploader {
    async fn upload_image(&self, bytes: Vec<u8>) -> Result<Url, UploadError> {
        let key = non_empty(&self.config.imgbb_api_key).ok_or(UploadError::NotConfigured("imgbb_api_key"))?;
        let form = Form::new().text("key", key.to_string()).text("image", STANDARD.encode(&bytes));
        debug!(bytes = bytes.len(), "uploading image");
        let body = accepted_json(self.client.post(IMGBB_ENDPOINT).multipart(form).send().await?).await?;
        let url = imgbb_url(&body)?;
        info!(%url, "image uploaded");
        Ok(url)
    }

    async fn upload_video(&self, bytes: Vec<u8>, progress: ProgressFn) -> Result<Url, UploadError> {
        let (endpoint, preset) = self.cloudinary()?;
        let tracker = ProgressTracker::new(progress);
        tracker.report(0);

        let total = bytes.len();
        let chunks: Vec<Vec<u8>> = bytes.chunks(CHUNK_SIZE).map(<[u8]>::to_vec).collect();
        let streamed = tracker.clone();
        let mut sent = 0usize;
        let stream = futures::stream::iter(chunks.into_iter().map(move |chunk| {
            sent += chunk.len();
            streamed.report_bytes(sent, total);
            Ok::<_, std::io::Error>(chunk)
        }));
        let file = Part::stream_with_length(Body::wrap_stream(stream), total as u64)
            .file_name("video.mp4")
            .mime_str("video/mp4")?;
        let form = Form::new().part("file", file).text("upload_preset", preset.to_string());

        debug!(bytes = total, "uploading video");
        let body = accepted_json(self.client.post(endpoint).multipart(form).send().await?).await?;
        let url = cloudinary_url(&body)?;
        tracker.report(100);
        info!(%url, "video uploaded");
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    fn recorder() -> (ProgressFn, Arc<Mutex<Vec<u8>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (Arc::new(move |p| sink.lock().unwrap().push(p)), seen)
    }

    #[test]
    fn progress_is_monotonic_and_deduplicated() {
        let (sink, seen) = recorder();
        let t = ProgressTracker::new(sink);
        t.report(0);
        t.report_bytes(10, 40);
        t.report_bytes(10, 40);
        t.report_bytes(5, 40);
        t.report_bytes(40, 40);
        t.report(100);
        assert_eq!(*seen.lock().unwrap(), vec![0, 25, 99, 100]);
    }

    #[test]
    fn response_urls_are_extracted() {
        let img = json!({ "data": { "url": "https://i.ibb.co/x/photo.jpg" } });
        assert_eq!(imgbb_url(&img).unwrap().as_str(), "https://i.ibb.co/x/photo.jpg");
        let vid = json!({ "secure_url": "https://res.cloudinary.com/demo/video/upload/v1/clip.mp4" });
        assert_eq!(cloudinary_url(&vid).unwrap().host_str(), Some("res.cloudinary.com"));
        assert!(matches!(cloudinary_url(&json!({ "url": 3 })), Err(UploadError::MissingUrl(f)) if f == "secure_url"));
    }

    #[tokio::test]
    async fn missing_credentials_fail_before_any_request() {
        let up = HostedUploader::new(UploadConfig::default()).unwrap();
        assert!(matches!(up.upload_image(vec![1, 2, 3]).await, Err(UploadError::NotConfigured("imgbb_api_key"))));

        let (sink, seen) = recorder();
        let cfg = UploadConfig { cloudinary_cloud_name: Some("demo".into()), ..UploadConfig::default() };
        let up = HostedUploader::new(cfg).unwrap();
        let err = up.upload_video(vec![0; 10], sink).await.unwrap_err();
        assert!(matches!(err, UploadError::NotConfigured("cloudinary_upload_preset")));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn cloudinary_endpoint_uses_cloud_name() {
        let cfg = UploadConfig {
            cloudinary_cloud_name: Some("demo".into()),
            cloudinary_upload_preset: Some("unsigned".into()),
            ..UploadConfig::default()
        };
        let up = HostedUploader::new(cfg).unwrap();
        let (url, preset) = up.cloudinary().unwrap();
        assert_eq!(url.as_str(), "https://api.cloudinary.com/v1_1/demo/video/upload");
        assert_eq!(preset, "unsigned");
    }
}
