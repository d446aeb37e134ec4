use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Opaque locator for an image: a local path or a remote URL.
///
/// Nothing here checks that the image exists or decodes; the comparator
/// backend reports that.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(String);

impl ImageRef {
    pub fn new(locator: impl Into<String>) -> Self {
        Self(locator.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for `http://` and `https://` locators.
    pub fn is_remote(&self) -> bool {
        let lower = self.0.to_ascii_lowercase();
        lower.starts_with("http://") || lower.starts_with("https://")
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ImageRef {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ImageRef {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&Path> for ImageRef {
    fn from(p: &Path) -> Self {
        Self(p.to_string_lossy().into_owned())
    }
}

/// Requested model name is not one of the supported models.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "unsupported face model: {0:?} (expected one of: {list})",
    list = ModelId::names().join(", ")
)]
pub struct UnknownModel(pub String);

/// Face recognition models the comparator backend can be asked to use.
///
/// The set is closed; declaration order is the evaluation order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelId {
    #[serde(rename = "VGG-Face")]
    VggFace,
    #[serde(rename = "Facenet")]
    Facenet,
    #[serde(rename = "Facenet512")]
    Facenet512,
    #[serde(rename = "OpenFace")]
    OpenFace,
    #[serde(rename = "DeepFace")]
    DeepFace,
    #[default]
    #[serde(rename = "DeepID")]
    DeepId,
    #[serde(rename = "ArcFace")]
    ArcFace,
    #[serde(rename = "Dlib")]
    Dlib,
    #[serde(rename = "SFace")]
    SFace,
    #[serde(rename = "GhostFaceNet")]
    GhostFaceNet,
}

impl ModelId {
    pub const ALL: [ModelId; 10] = [
        ModelId::VggFace,
        ModelId::Facenet,
        ModelId::Facenet512,
        ModelId::OpenFace,
        ModelId::DeepFace,
        ModelId::DeepId,
        ModelId::ArcFace,
        ModelId::Dlib,
        ModelId::SFace,
        ModelId::GhostFaceNet,
    ];

    /// Name as understood by the backend (e.g. `"VGG-Face"`).
    pub fn as_str(self) -> &'static str {
        match self {
            ModelId::VggFace => "VGG-Face",
            ModelId::Facenet => "Facenet",
            ModelId::Facenet512 => "Facenet512",
            ModelId::OpenFace => "OpenFace",
            ModelId::DeepFace => "DeepFace",
            ModelId::DeepId => "DeepID",
            ModelId::ArcFace => "ArcFace",
            ModelId::Dlib => "Dlib",
            ModelId::SFace => "SFace",
            ModelId::GhostFaceNet => "GhostFaceNet",
        }
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|m| m.as_str()).collect()
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelId {
    type Err = UnknownModel;

    /// Exact names are accepted, as well as case-insensitive matches.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == wanted)
            .or_else(|| {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|m| m.as_str().eq_ignore_ascii_case(wanted))
            })
            .ok_or_else(|| UnknownModel(s.to_string()))
    }
}

/// Verdict of the comparator for one image pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    /// Whether both images depict the same person.
    pub verified: bool,
    /// Distance between the two face representations. Lower = more similar.
    pub distance: f64,
    pub model: ModelId,
    /// Decision threshold the backend applied to `distance`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detector_backend: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity_metric: Option<String>,
    /// Backend-reported processing time in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<f64>,
}

/// Result of scanning a catalog for a query image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "image", rename_all = "snake_case")]
pub enum SearchOutcome {
    Found(ImageRef),
    NotFound,
}

impl SearchOutcome {
    pub fn found(&self) -> Option<&ImageRef> {
        match self {
            SearchOutcome::Found(r) => Some(r),
            SearchOutcome::NotFound => None,
        }
    }
}

/// A catalog entry the search could not compare against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedCandidate {
    pub candidate: ImageRef,
    pub error: String,
}

/// Search outcome together with the bookkeeping of the scan that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchReport {
    pub outcome: SearchOutcome,
    /// Number of comparator invocations, failed ones included.
    pub attempts: usize,
    pub skipped: Vec<SkippedCandidate>,
}

/// What happened to one (test image, catalog image, model) triple.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PairOutcome {
    Compared(VerificationResult),
    Failed { error: String },
}

/// One line of a batch evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationRecord {
    pub test_image: ImageRef,
    #[serde(rename = "db_image")]
    pub catalog_image: ImageRef,
    #[serde(rename = "model_name")]
    pub model: ModelId,
    /// Wall-clock time spent in the comparator call.
    #[serde(rename = "inf_time", serialize_with = "serialize_secs")]
    pub elapsed: Duration,
    #[serde(flatten)]
    pub outcome: PairOutcome,
}

impl EvaluationRecord {
    pub fn result(&self) -> Option<&VerificationResult> {
        match &self.outcome {
            PairOutcome::Compared(r) => Some(r),
            PairOutcome::Failed { .. } => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, PairOutcome::Failed { .. })
    }
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}
