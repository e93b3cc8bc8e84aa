pub mod core;
pub mod detection;
pub mod models;

pub use detection::classifier::{ClassifierError, SmokeClassifier};
pub use detection::{CycleOutcome, DEFAULT_TILE_SIZE, SmokeDetector};
pub use models::{Detection, DetectionCandidate, GridPos, Tile, TileHistory, TileRect};
