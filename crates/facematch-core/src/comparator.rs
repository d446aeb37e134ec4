//! The comparison capability the matcher and evaluator are built on.

use crate::types::{ImageRef, ModelId, VerificationResult};
use thiserror::Error;

/// A comparator could not produce a verdict for one image pair.
///
/// Never converted into a negative verdict: callers either propagate it or
/// record it as a skipped comparison.
#[derive(Error, Debug)]
pub enum ComparisonError {
    /// The backend processed the request but refused the images
    /// (unreadable file, failed download, no face detected).
    #[error("comparison rejected: {0}")]
    Rejected(String),
    #[error("comparator unreachable: {0}")]
    Unreachable(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("comparator returned an invalid verdict: {0}")]
    InvalidVerdict(String),
}

/// Judges whether two images depict the same person.
///
/// Implementations are expected to block for the whole comparison and to be
/// stateless between calls.
pub trait Comparator {
    fn compare(
        &self,
        img1: &ImageRef,
        img2: &ImageRef,
        model: ModelId,
    ) -> Result<VerificationResult, ComparisonError>;
}

impl<C: Comparator + ?Sized> Comparator for &C {
    fn compare(
        &self,
        img1: &ImageRef,
        img2: &ImageRef,
        model: ModelId,
    ) -> Result<VerificationResult, ComparisonError> {
        (**self).compare(img1, img2, model)
    }
}

impl<C: Comparator + ?Sized> Comparator for Box<C> {
    fn compare(
        &self,
        img1: &ImageRef,
        img2: &ImageRef,
        model: ModelId,
    ) -> Result<VerificationResult, ComparisonError> {
        (**self).compare(img1, img2, model)
    }
}
