pub mod annotate;
pub mod classifier;
pub mod regions;
pub mod threshold;
pub mod tiler;

use std::time::Duration;

use anyhow::Context;
use image::DynamicImage;
use time::OffsetDateTime;
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::core::db::{AlertLog, DetectionLog, ScoreLedger, ScoreRecord};
use crate::models::Detection;
use classifier::{ClassifierError, SmokeClassifier};

/// InceptionV3 input edge, the tile size the original deployment classified.
pub const DEFAULT_TILE_SIZE: u32 = 299;

const DEFAULT_CLASSIFY_TIMEOUT: Duration = Duration::from_secs(60);

/// Result of one detection cycle for one (source, frame) pair.
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub detections: Vec<Detection>,
    /// Whether this cycle's detections escalated to an alert emission, after
    /// the per-source cool-down gate.
    pub alerted: bool,
}

/// Per-image smoke detection engine: tiles a frame, scores the tiles through
/// the injected classifier, filters scores against each tile's own historical
/// baseline, merges adjacent flagged tiles into detections, and gates alert
/// emission on the per-source cool-down.
pub struct SmokeDetector<C> {
    classifier: C,
    tile_size: u32,
    classify_timeout: Duration,
}

impl<C: SmokeClassifier> SmokeDetector<C> {
    pub fn new(classifier: C) -> Self {
        Self {
            classifier,
            tile_size: DEFAULT_TILE_SIZE,
            classify_timeout: DEFAULT_CLASSIFY_TIMEOUT,
        }
    }

    /// Override the tile edge length (the classifier's required input size).
    pub fn with_tile_size(mut self, tile_size: u32) -> Self {
        self.tile_size = tile_size;
        self
    }

    pub fn with_classify_timeout(mut self, classify_timeout: Duration) -> Self {
        self.classify_timeout = classify_timeout;
        self
    }

    /// Run one detection cycle over a freshly captured frame.
    ///
    /// Classifier failures abort the cycle with no scores recorded; they are
    /// retried only on the next captured frame. Ledger append failures and
    /// alert-gate failures degrade with a warning instead of failing the
    /// cycle.
    pub async fn run_cycle<D>(
        &self,
        db: &D,
        image: &DynamicImage,
        source_id: &str,
        captured_at: OffsetDateTime,
        image_ref: &str,
    ) -> anyhow::Result<CycleOutcome>
    where
        D: ScoreLedger + AlertLog + DetectionLog,
    {
        anyhow::ensure!(
            image.width() > 0 && image.height() > 0,
            "empty image from source {source_id}"
        );

        let mut tiles = tiler::tile_grid(image.width(), image.height(), self.tile_size);

        let scores = match timeout(
            self.classify_timeout,
            self.classifier.classify(image, &tiles),
        )
        .await
        {
            Ok(result) => result
                .with_context(|| format!("classifying {} tiles for {source_id}", tiles.len()))?,
            Err(_) => {
                return Err(ClassifierError::Timeout(self.classify_timeout))
                    .with_context(|| format!("classifying {} tiles for {source_id}", tiles.len()));
            }
        };
        if scores.len() != tiles.len() {
            return Err(ClassifierError::BatchMismatch {
                expected: tiles.len(),
                got: scores.len(),
            }
            .into());
        }
        for (tile, &score) in tiles.iter_mut().zip(scores.iter()) {
            debug_assert!((0.0..=1.0).contains(&score), "score {score} outside [0, 1]");
            tile.score = Some(score);
        }
        let top_score = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        info!(source_id, top_score, tiles = tiles.len(), "classified frame");

        // Missing a ledger write loses one frame of future baseline data; it
        // must not cost us the current frame's evaluation.
        let records: Vec<ScoreRecord> = tiles
            .iter()
            .filter_map(|tile| {
                tile.score
                    .map(|score| ScoreRecord::new(source_id, captured_at, tile.rect, score))
            })
            .collect();
        if let Err(error) = db.append_scores(&records).await {
            warn!(source_id, %error, "failed to append tile scores, continuing without ledger write");
        }

        let candidates = threshold::filter_candidates(db, source_id, captured_at, &tiles).await;
        let (rows, cols) = tiler::grid_shape(&tiles);
        let detections = regions::merge_regions(rows, cols, &candidates);

        let mut alerted = false;
        if !detections.is_empty() {
            let timestamp = captured_at.unix_timestamp();
            if let Err(error) = db
                .record_detections(source_id, timestamp, image_ref, &detections)
                .await
            {
                warn!(source_id, %error, "failed to record detections");
            }
            match db.should_alert(source_id, timestamp, image_ref).await {
                Ok(fire) => alerted = fire,
                Err(error) => {
                    warn!(source_id, %error, "alert gate unavailable, suppressing alert");
                }
            }
            info!(
                source_id,
                detections = detections.len(),
                alerted,
                "smoke detected"
            );
        }

        Ok(CycleOutcome {
            detections,
            alerted,
        })
    }

    /// Per-cycle error boundary: one bad frame must not stop monitoring of
    /// other sources, so failures are logged and swallowed.
    pub async fn run_cycle_guarded<D>(
        &self,
        db: &D,
        image: &DynamicImage,
        source_id: &str,
        captured_at: OffsetDateTime,
        image_ref: &str,
    ) -> Option<CycleOutcome>
    where
        D: ScoreLedger + AlertLog + DetectionLog,
    {
        match self
            .run_cycle(db, image, source_id, captured_at, image_ref)
            .await
        {
            Ok(outcome) => Some(outcome),
            Err(error) => {
                error!(source_id, %error, "detection cycle failed");
                None
            }
        }
    }
}
