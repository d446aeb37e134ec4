//! Blocking HTTP client for `POST /verify`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use facematch_core::{Comparator, ComparisonError, ImageRef, ModelId, VerificationResult};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5005";
const DEFAULT_TIMEOUT_SECS: u64 = 120;
/// Longest backend error body quoted verbatim in a `ComparisonError`.
const MAX_ERROR_BODY: usize = 512;

#[derive(Error, Debug)]
pub enum DeepFaceError {
    #[error("invalid DeepFace base URL: {0:?}")]
    InvalidUrl(String),
    #[error("http client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Connection and request settings for a DeepFace server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeepFaceConfig {
    /// Server root, e.g. `http://127.0.0.1:5005`.
    pub base_url: String,
    /// Upper bound for one verify call, downloads included.
    pub timeout: Duration,
    /// Face detector the server should use (`opencv`, `retinaface`, ...).
    /// Server default when unset.
    pub detector_backend: Option<String>,
    /// `cosine`, `euclidean` or `euclidean_l2`. Server default when unset.
    pub distance_metric: Option<String>,
    /// Fail when no face is found instead of comparing whole images.
    pub enforce_detection: bool,
}

impl Default for DeepFaceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            detector_backend: None,
            distance_metric: None,
            enforce_detection: true,
        }
    }
}

#[derive(Debug, Serialize)]
struct VerifyRequest<'a> {
    img1: Cow<'a, str>,
    img2: Cow<'a, str>,
    model_name: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    detector_backend: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    distance_metric: Option<&'a str>,
    enforce_detection: bool,
}

/// Error payloads seen from the server: `{"exception": ..}` for processing
/// failures, `{"error": ..}` or `{"message": ..}` for bad requests.
#[derive(Debug, Deserialize)]
struct ErrorReply {
    exception: Option<String>,
    error: Option<String>,
    message: Option<String>,
}

impl ErrorReply {
    fn into_text(self) -> Option<String> {
        self.exception.or(self.error).or(self.message)
    }
}

/// Comparator that forwards every comparison to a DeepFace server.
pub struct DeepFaceClient {
    config: DeepFaceConfig,
    verify_url: String,
    http: Client,
}

impl DeepFaceClient {
    /// Build the client. Does not contact the server.
    ///
    /// Must not be called from inside an async runtime: the blocking reqwest
    /// client owns its own runtime.
    pub fn new(config: DeepFaceConfig) -> Result<Self, DeepFaceError> {
        let base = config.base_url.trim_end_matches('/');
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(DeepFaceError::InvalidUrl(config.base_url.clone()));
        }
        let verify_url = format!("{base}/verify");

        let http = Client::builder().timeout(config.timeout).build()?;

        tracing::info!(
            url = %verify_url,
            timeout_secs = config.timeout.as_secs(),
            detector_backend = ?config.detector_backend,
            distance_metric = ?config.distance_metric,
            "DeepFace comparator configured"
        );

        Ok(Self {
            config,
            verify_url,
            http,
        })
    }

    pub fn config(&self) -> &DeepFaceConfig {
        &self.config
    }

    pub fn verify_url(&self) -> &str {
        &self.verify_url
    }

    fn request<'a>(
        &'a self,
        img1: &'a ImageRef,
        img2: &'a ImageRef,
        model: ModelId,
    ) -> Result<VerifyRequest<'a>, ComparisonError> {
        Ok(VerifyRequest {
            img1: image_payload(img1)?,
            img2: image_payload(img2)?,
            model_name: model.as_str(),
            detector_backend: self.config.detector_backend.as_deref(),
            distance_metric: self.config.distance_metric.as_deref(),
            enforce_detection: self.config.enforce_detection,
        })
    }
}

/// What the server receives for one image.
///
/// URLs and data URIs pass through. Local files are read here and inlined
/// as a base64 data URI: the server does not share our working directory
/// or filesystem.
fn image_payload(image: &ImageRef) -> Result<Cow<'_, str>, ComparisonError> {
    let locator = image.as_str();
    if image.is_remote() || locator.starts_with("data:") {
        return Ok(Cow::Borrowed(locator));
    }

    let bytes = std::fs::read(locator)
        .map_err(|e| ComparisonError::Rejected(format!("reading {locator}: {e}")))?;
    Ok(Cow::Owned(format!(
        "data:{};base64,{}",
        mime_type(locator),
        STANDARD.encode(bytes)
    )))
}

fn mime_type(path: &str) -> &'static str {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        Some("gif") => "image/gif",
        _ => "image/jpeg",
    }
}

impl Comparator for DeepFaceClient {
    fn compare(
        &self,
        img1: &ImageRef,
        img2: &ImageRef,
        model: ModelId,
    ) -> Result<VerificationResult, ComparisonError> {
        tracing::debug!(img1 = %img1, img2 = %img2, model = %model, "verify request");

        let body = self.request(img1, img2, model)?;
        let response = self
            .http
            .post(&self.verify_url)
            .json(&body)
            .send()
            .map_err(|e| ComparisonError::Unreachable(Box::new(e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| ComparisonError::Unreachable(Box::new(e)))?;

        decode_reply(status, &body)
    }
}

/// Turn a `/verify` HTTP reply into a verdict or a comparison failure.
fn decode_reply(status: u16, body: &str) -> Result<VerificationResult, ComparisonError> {
    if (200..300).contains(&status) {
        return serde_json::from_str(body)
            .map_err(|e| ComparisonError::InvalidVerdict(format!("{e} in reply {}", clip(body))));
    }

    let text = serde_json::from_str::<ErrorReply>(body)
        .ok()
        .and_then(ErrorReply::into_text)
        .unwrap_or_else(|| clip(body).to_string());

    if status >= 500 {
        tracing::warn!(status, "DeepFace server error");
    }
    Err(ComparisonError::Rejected(format!("HTTP {status}: {text}")))
}

fn clip(body: &str) -> &str {
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERIFIED_REPLY: &str = r#"{
        "verified": true,
        "distance": 0.2563,
        "threshold": 0.4,
        "model": "DeepID",
        "detector_backend": "opencv",
        "similarity_metric": "cosine",
        "facial_areas": {
            "img1": {"x": 10, "y": 20, "w": 100, "h": 100},
            "img2": {"x": 12, "y": 18, "w": 98, "h": 101}
        },
        "time": 1.73
    }"#;

    #[test]
    fn test_decode_verified_reply() {
        let result = decode_reply(200, VERIFIED_REPLY).unwrap();
        assert!(result.verified);
        assert_eq!(result.model, ModelId::DeepId);
        assert!((result.distance - 0.2563).abs() < 1e-9);
        assert_eq!(result.threshold, Some(0.4));
        assert_eq!(result.detector_backend.as_deref(), Some("opencv"));
        assert_eq!(result.similarity_metric.as_deref(), Some("cosine"));
        assert_eq!(result.time, Some(1.73));
    }

    #[test]
    fn test_decode_minimal_reply() {
        let result =
            decode_reply(200, r#"{"verified": false, "distance": 0.9, "model": "VGG-Face"}"#)
                .unwrap();
        assert!(!result.verified);
        assert_eq!(result.model, ModelId::VggFace);
        assert_eq!(result.threshold, None);
    }

    #[test]
    fn test_decode_exception_reply() {
        let err = decode_reply(
            400,
            r#"{"exception": "Face could not be detected in numpy array."}"#,
        )
        .unwrap_err();
        match err {
            ComparisonError::Rejected(text) => {
                assert_eq!(text, "HTTP 400: Face could not be detected in numpy array.")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_decode_message_reply() {
        let err = decode_reply(400, r#"{"message": "img1 is required"}"#).unwrap_err();
        assert!(err.to_string().contains("img1 is required"));
    }

    #[test]
    fn test_decode_non_json_error() {
        let err = decode_reply(502, "<html>Bad Gateway</html>").unwrap_err();
        assert!(matches!(err, ComparisonError::Rejected(ref t) if t.contains("Bad Gateway")));
    }

    #[test]
    fn test_decode_garbage_success_is_invalid_verdict() {
        let err = decode_reply(200, r#"{"verified": "maybe"}"#).unwrap_err();
        assert!(matches!(err, ComparisonError::InvalidVerdict(_)));
    }

    #[test]
    fn test_decode_unknown_model_is_invalid_verdict() {
        let err =
            decode_reply(200, r#"{"verified": true, "distance": 0.1, "model": "Mystery"}"#)
                .unwrap_err();
        assert!(matches!(err, ComparisonError::InvalidVerdict(_)));
    }

    #[test]
    fn test_clip_long_body() {
        let body = "x".repeat(MAX_ERROR_BODY + 100);
        assert_eq!(clip(&body).len(), MAX_ERROR_BODY);
        assert_eq!(clip("short"), "short");
    }

    #[test]
    fn test_new_rejects_bad_url() {
        let config = DeepFaceConfig {
            base_url: "localhost:5005".into(),
            ..DeepFaceConfig::default()
        };
        assert!(matches!(
            DeepFaceClient::new(config),
            Err(DeepFaceError::InvalidUrl(_))
        ));
    }

    fn client_with_backend() -> DeepFaceClient {
        DeepFaceClient::new(DeepFaceConfig {
            base_url: "http://deepface:5005/".into(),
            detector_backend: Some("retinaface".into()),
            ..DeepFaceConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_request_body_fields() {
        let client = client_with_backend();
        assert_eq!(client.verify_url(), "http://deepface:5005/verify");

        let img1 = ImageRef::from("https://example.com/q.jpg");
        let img2 = ImageRef::from("https://example.com/u1.jpg");
        let request = client.request(&img1, &img2, ModelId::VggFace).unwrap();
        let body = serde_json::to_value(request).unwrap();
        assert_eq!(body["img1"], "https://example.com/q.jpg");
        assert_eq!(body["img2"], "https://example.com/u1.jpg");
        assert_eq!(body["model_name"], "VGG-Face");
        assert_eq!(body["detector_backend"], "retinaface");
        assert_eq!(body["enforce_detection"], true);
        assert!(body.get("distance_metric").is_none());
    }

    #[test]
    fn test_relative_local_image_is_inlined() {
        // "./.tmpXXXX/alice.jpg": relative to this process only
        let dir = tempfile::tempdir_in(".").unwrap();
        let path = dir.path().join("alice.jpg");
        std::fs::write(&path, b"\xFF\xD8fake-jpeg").unwrap();
        let local = ImageRef::from(path.as_path());
        assert!(path.is_relative());

        let client = client_with_backend();
        let remote = ImageRef::from("https://example.com/u1.jpg");
        let request = client.request(&local, &remote, ModelId::DeepId).unwrap();
        let body = serde_json::to_value(request).unwrap();

        let encoded = STANDARD.encode(b"\xFF\xD8fake-jpeg");
        let expected = format!("data:image/jpeg;base64,{encoded}");
        assert_eq!(body["img1"], expected.as_str());
        assert_eq!(body["img2"], "https://example.com/u1.jpg");
        assert!(!body["img1"].as_str().unwrap().contains("alice.jpg"));
    }

    #[test]
    fn test_png_and_data_uri_payloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bob.PNG");
        std::fs::write(&path, b"png").unwrap();

        let image = ImageRef::from(path.as_path());
        let payload = image_payload(&image).unwrap();
        assert!(payload.starts_with("data:image/png;base64,"));

        let inline = ImageRef::from("data:image/jpeg;base64,AAAA");
        assert_eq!(image_payload(&inline).unwrap(), "data:image/jpeg;base64,AAAA");
    }

    #[test]
    fn test_missing_local_image_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let missing = ImageRef::from(dir.path().join("ghost.jpg").as_path());
        let client = client_with_backend();

        let err = client
            .request(&missing, &"https://example.com/u1.jpg".into(), ModelId::DeepId)
            .err()
            .unwrap();
        assert!(matches!(err, ComparisonError::Rejected(ref t) if t.contains("ghost.jpg")));
    }
}
