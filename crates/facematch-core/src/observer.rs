//! Observability hooks for the matcher and the batch evaluator.
//!
//! The core never installs or reaches for a global logger. Callers construct
//! an [`Observer`] and hand it to [`CatalogMatcher`](crate::CatalogMatcher) or
//! [`BatchEvaluator`](crate::BatchEvaluator).

use crate::comparator::ComparisonError;
use crate::types::{EvaluationRecord, ImageRef, ModelId};
use tracing::Span;

/// Receives progress notifications. All methods default to no-ops.
pub trait Observer {
    /// A catalog candidate is about to be compared against the query.
    fn candidate_started(&self, _query: &ImageRef, _candidate: &ImageRef, _model: ModelId) {}

    /// A catalog candidate was compared and did not verify.
    fn candidate_rejected(&self, _candidate: &ImageRef, _distance: f64) {}

    /// A catalog candidate could not be compared and was skipped.
    fn candidate_failed(&self, _candidate: &ImageRef, _error: &ComparisonError) {}

    /// A batch evaluation run moved on to a new (model, test image) row.
    fn batch_row_started(&self, _model: ModelId, _test_image: &ImageRef) {}

    /// A batch comparison finished, successfully or not.
    fn pair_evaluated(&self, _record: &EvaluationRecord) {}
}

/// Observer that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl Observer for NullObserver {}

/// Emits every notification as a `tracing` event inside the given span.
#[derive(Debug, Clone)]
pub struct TracingObserver {
    span: Span,
}

impl TracingObserver {
    pub fn new(span: Span) -> Self {
        Self { span }
    }

    /// Observer bound to whatever span is current at construction.
    pub fn current() -> Self {
        Self::new(Span::current())
    }
}

impl Observer for TracingObserver {
    fn candidate_started(&self, query: &ImageRef, candidate: &ImageRef, model: ModelId) {
        self.span.in_scope(|| {
            tracing::info!(
                query = %query,
                candidate = %candidate,
                model = %model,
                "checking match"
            );
        });
    }

    fn candidate_rejected(&self, candidate: &ImageRef, distance: f64) {
        self.span.in_scope(|| {
            tracing::debug!(candidate = %candidate, distance, "match not found");
        });
    }

    fn candidate_failed(&self, candidate: &ImageRef, error: &ComparisonError) {
        self.span.in_scope(|| {
            tracing::warn!(
                candidate = %candidate,
                error = %error,
                "comparison failed; skipping candidate"
            );
        });
    }

    fn batch_row_started(&self, model: ModelId, test_image: &ImageRef) {
        self.span.in_scope(|| {
            tracing::info!(model = %model, test_image = %test_image, "processing");
        });
    }

    fn pair_evaluated(&self, record: &EvaluationRecord) {
        self.span.in_scope(|| match record.result() {
            Some(result) => tracing::info!(
                test_image = %record.test_image,
                db_image = %record.catalog_image,
                model = %record.model,
                inf_time = record.elapsed.as_secs_f64(),
                verified = result.verified,
                distance = result.distance,
                threshold = ?result.threshold,
                "pair evaluated"
            ),
            None => tracing::error!(
                test_image = %record.test_image,
                db_image = %record.catalog_image,
                model = %record.model,
                inf_time = record.elapsed.as_secs_f64(),
                error = ?record.outcome,
                "error processing pair"
            ),
        });
    }
}
