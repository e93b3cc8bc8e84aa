use std::time::Duration;

use image::DynamicImage;
use thiserror::Error;

use crate::models::Tile;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("classifier backend error: {0}")]
    Backend(String),
    #[error("classifier call timed out after {0:?}")]
    Timeout(Duration),
    #[error("classifier returned {got} scores for {expected} tiles")]
    BatchMismatch { expected: usize, got: usize },
}

/// The scoring oracle the detection cycle depends on.
///
/// Implementations score a batch of tiles cut from one image and return a
/// same-length, same-order vector of smoke probabilities in [0, 1]. The call
/// is atomic: it either returns the full batch or fails entirely; the cycle
/// performs no partial-batch recovery.
pub trait SmokeClassifier: Send + Sync {
    async fn classify(
        &self,
        image: &DynamicImage,
        tiles: &[Tile],
    ) -> Result<Vec<f64>, ClassifierError>;
}
