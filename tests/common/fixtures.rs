use std::collections::HashMap;

use image::{DynamicImage, ImageBuffer, Rgb};
use time::{Duration, OffsetDateTime};

use smokewatch::core::db::{DetectionDb, ScoreLedger, ScoreRecord};
use smokewatch::models::{DetectionCandidate, GridPos, Tile, TileRect};
use smokewatch::{ClassifierError, SmokeClassifier};

pub const TEST_SOURCE: &str = "ridge-cam-1";

/// Noon UTC, so the ±1h time-of-day band stays well inside one day.
pub fn noon() -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(1_718_452_800).expect("valid timestamp")
}

/// Creates a flat grey test frame.
pub fn test_image(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(ImageBuffer::from_fn(width, height, |_, _| {
        Rgb([90u8, 100u8, 110u8])
    }))
}

/// Creates a DetectionDb backed by a SQLite file in a temp directory.
/// Returns both the db and the temp directory (which must be kept alive).
pub async fn create_test_db() -> (DetectionDb, tempfile::TempDir) {
    let dir = tempfile::TempDir::new().expect("Failed to create temp directory");
    let db = DetectionDb::open(dir.path().join("detect.db"))
        .await
        .expect("Failed to open detection db");
    (db, dir)
}

pub fn rect(min_x: u32, min_y: u32, max_x: u32, max_y: u32) -> TileRect {
    TileRect {
        min_x,
        min_y,
        max_x,
        max_y,
    }
}

pub fn scored_tile(row: u32, col: u32, rect: TileRect, score: f64) -> Tile {
    Tile {
        rect,
        grid: GridPos { row, col },
        score: Some(score),
    }
}

pub fn candidate(row: u32, col: u32, rect: TileRect, score: f64) -> DetectionCandidate {
    DetectionCandidate {
        tile: scored_tile(row, col, rect, score),
        score,
        history: None,
    }
}

/// Classifier that returns a scripted score per rect and `default` elsewhere.
pub struct ScriptedClassifier {
    default: f64,
    scores: HashMap<TileRect, f64>,
}

impl ScriptedClassifier {
    pub fn uniform(default: f64) -> Self {
        Self {
            default,
            scores: HashMap::new(),
        }
    }

    pub fn with_score(mut self, rect: TileRect, score: f64) -> Self {
        self.scores.insert(rect, score);
        self
    }
}

impl SmokeClassifier for ScriptedClassifier {
    async fn classify(
        &self,
        _image: &DynamicImage,
        tiles: &[Tile],
    ) -> Result<Vec<f64>, ClassifierError> {
        Ok(tiles
            .iter()
            .map(|tile| self.scores.get(&tile.rect).copied().unwrap_or(self.default))
            .collect())
    }
}

/// Classifier whose batch call always fails.
pub struct FailingClassifier;

impl SmokeClassifier for FailingClassifier {
    async fn classify(
        &self,
        _image: &DynamicImage,
        _tiles: &[Tile],
    ) -> Result<Vec<f64>, ClassifierError> {
        Err(ClassifierError::Backend("camera feed corrupt".to_string()))
    }
}

/// Seed historical score rows for one rect, spread a minute apart ending at
/// `at`.
pub async fn seed_history(
    db: &DetectionDb,
    source_id: &str,
    at: OffsetDateTime,
    rect: TileRect,
    scores: &[f64],
) {
    let records: Vec<ScoreRecord> = scores
        .iter()
        .enumerate()
        .map(|(i, &score)| ScoreRecord::new(source_id, at - Duration::minutes(i as i64), rect, score))
        .collect();
    db.append_scores(&records).await.expect("seed history");
}
