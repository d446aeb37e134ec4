//! facematch-core — Face verification and catalog lookup orchestration.
//!
//! Delegates the actual face comparison to a [`Comparator`] and builds the
//! first-hit catalog search and the exhaustive batch evaluation on top of it.

pub mod catalog;
pub mod comparator;
pub mod evaluator;
pub mod matcher;
pub mod observer;
pub mod types;

#[cfg(test)]
mod testing;

pub use catalog::{Catalog, CatalogError};
pub use comparator::{Comparator, ComparisonError};
pub use evaluator::{discover_images, BatchEvaluator, DiscoveryError};
pub use matcher::CatalogMatcher;
pub use observer::{NullObserver, Observer, TracingObserver};
pub use types::{
    EvaluationRecord, ImageRef, ModelId, PairOutcome, SearchOutcome, SearchReport,
    SkippedCandidate, UnknownModel, VerificationResult,
};
