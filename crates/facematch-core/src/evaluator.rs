//! Exhaustive accuracy/performance runs over models x test images x catalog images.

use crate::comparator::Comparator;
use crate::observer::Observer;
use crate::types::{EvaluationRecord, ImageRef, ModelId, PairOutcome};
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("image directory not found: {0}")]
    NotFound(PathBuf),
    #[error("walking {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// List every file below `dir`, sorted by path.
pub fn discover_images(dir: &Path) -> Result<Vec<ImageRef>, DiscoveryError> {
    if !dir.is_dir() {
        return Err(DiscoveryError::NotFound(dir.to_path_buf()));
    }

    let mut images = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|source| DiscoveryError::Walk {
            path: dir.to_path_buf(),
            source,
        })?;
        if entry.file_type().is_file() {
            images.push(ImageRef::from(entry.path()));
        }
    }
    Ok(images)
}

/// Compares every test image with every catalog image under every model.
pub struct BatchEvaluator<'a, C: ?Sized, O: ?Sized> {
    comparator: &'a C,
    observer: &'a O,
}

impl<'a, C, O> BatchEvaluator<'a, C, O>
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

    /// Run the full cross product. Models are the outer loop, test images the
    /// middle one and catalog images the inner one.
    ///
    /// Always yields `models * test_images * catalog_images` records; a failed
    /// comparison becomes a [`PairOutcome::Failed`] record.
    pub fn evaluate(
        &self,
        test_images: &[ImageRef],
        catalog_images: &[ImageRef],
        models: &[ModelId],
    ) -> Vec<EvaluationRecord> {
        let mut records =
            Vec::with_capacity(models.len() * test_images.len() * catalog_images.len());

        for &model in models {
            for test_image in test_images {
                self.observer.batch_row_started(model, test_image);
                for catalog_image in catalog_images {
                    let record = self.evaluate_pair(test_image, catalog_image, model);
                    self.observer.pair_evaluated(&record);
                    records.push(record);
                }
            }
        }

        records
    }

    fn evaluate_pair(
        &self,
        test_image: &ImageRef,
        catalog_image: &ImageRef,
        model: ModelId,
    ) -> EvaluationRecord {
        let start = Instant::now();
        let result = self.comparator.compare(test_image, catalog_image, model);
        let elapsed = start.elapsed();

        let outcome = match result {
            Ok(r) => PairOutcome::Compared(r),
            Err(e) => PairOutcome::Failed {
                error: e.to_string(),
            },
        };

        EvaluationRecord {
            test_image: test_image.clone(),
            catalog_image: catalog_image.clone(),
            model,
            elapsed,
            outcome,
        }
    }
}
