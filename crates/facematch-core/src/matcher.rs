//! Pairwise verification and first-hit catalog search.

use crate::catalog::Catalog;
use crate::comparator::{Comparator, ComparisonError};
use crate::observer::Observer;
use crate::types::{
    ImageRef, ModelId, SearchOutcome, SearchReport, SkippedCandidate, VerificationResult,
};

/// Runs a comparator against one candidate or a whole catalog.
///
/// Borrowing both collaborators keeps construction free, so callers build
/// one per request.
pub struct CatalogMatcher<'a, C: ?Sized, O: ?Sized> {
    comparator: &'a C,
    observer: &'a O,
}

impl<'a, C, O> CatalogMatcher<'a, C, O>
where
    C: Comparator + ?Sized,
    O: Observer + ?Sized,
{
    pub fn new(comparator: &'a C, observer: &'a O) -> Self {
        Self {
            comparator,
            observer,
        }
    }

    /// Compare `query` against one `candidate`.
    ///
    /// The comparator's verdict and its errors are returned untouched.
    pub fn verify(
        &self,
        query: &ImageRef,
        candidate: &ImageRef,
        model: ModelId,
    ) -> Result<VerificationResult, ComparisonError> {
        self.comparator.compare(query, candidate, model)
    }

    /// Scan `catalog` in order and stop at the first verified candidate.
    ///
    /// Candidates that fail to compare are skipped and listed in the report.
    pub fn search(&self, query: &ImageRef, catalog: &Catalog, model: ModelId) -> SearchReport {
        let mut attempts = 0;
        let mut skipped = Vec::new();

        for candidate in catalog {
            self.observer.candidate_started(query, candidate, model);
            attempts += 1;

            match self.verify(query, candidate, model) {
                Ok(result) if result.verified => {
                    return SearchReport {
                        outcome: SearchOutcome::Found(candidate.clone()),
                        attempts,
                        skipped,
                    };
                }
                Ok(result) => self.observer.candidate_rejected(candidate, result.distance),
                Err(e) => {
                    self.observer.candidate_failed(candidate, &e);
                    skipped.push(SkippedCandidate {
                        candidate: candidate.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        SearchReport {
            outcome: SearchOutcome::NotFound,
            attempts,
            skipped,
        }
    }

    pub fn find_in_catalog(
        &self,
        query: &ImageRef,
        catalog: &Catalog,
        model: ModelId,
    ) -> SearchOutcome {
        self.search(query, catalog, model).outcome
    }
}
