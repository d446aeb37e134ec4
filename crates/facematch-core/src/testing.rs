//! Scripted comparator shared by the unit tests of this crate.

use crate::comparator::{Comparator, ComparisonError};
use crate::types::{ImageRef, ModelId, VerificationResult};
use std::cell::RefCell;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub enum Verdict {
    Same,
    Different,
    Broken,
}

/// Answers by the second image's locator; unknown images are `Different`.
#[derive(Default)]
pub struct ScriptedComparator {
    verdicts: HashMap<String, Verdict>,
    delay: Option<Duration>,
    pub calls: RefCell<Vec<(String, String, ModelId)>>,
}

impl ScriptedComparator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, image: &str, verdict: Verdict) -> Self {
        self.verdicts.insert(image.to_string(), verdict);
        self
    }

    /// Sleep this long in every call, failing ones included.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn compared_candidates(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|(_, c, _)| c.clone()).collect()
    }
}

impl Comparator for ScriptedComparator {
    fn compare(
        &self,
        img1: &ImageRef,
        img2: &ImageRef,
        model: ModelId,
    ) -> Result<VerificationResult, ComparisonError> {
        self.calls
            .borrow_mut()
            .push((img1.to_string(), img2.to_string(), model));
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }

        let verdict = self
            .verdicts
            .get(img2.as_str())
            .copied()
            .unwrap_or(Verdict::Different);
        let verified = match verdict {
            Verdict::Same => true,
            Verdict::Different => false,
            Verdict::Broken => {
                return Err(ComparisonError::Rejected(format!(
                    "Face could not be detected in {img2}"
                )))
            }
        };
        Ok(VerificationResult {
            verified,
            distance: if verified { 0.12 } else { 0.87 },
            model,
            threshold: Some(0.4),
            detector_backend: Some("opencv".into()),
            similarity_metric: Some("cosine".into()),
            time: Some(0.5),
        })
    }
}
