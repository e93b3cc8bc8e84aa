use image::DynamicImage;
use serde::Serialize;

/// Rectangle in image coordinates. `max_x`/`max_y` are exclusive, so a
/// 299x299 tile anchored at the origin is `(0, 0, 299, 299)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TileRect {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl TileRect {
    pub fn width(&self) -> u32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y
    }
}

/// Position of a tile within the grid the tiler produced for one image.
/// Assigned at tile creation; used only for adjacency, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridPos {
    pub row: u32,
    pub col: u32,
}

/// One crop of a source image, the unit the classifier scores.
#[derive(Debug, Clone, Copy)]
pub struct Tile {
    pub rect: TileRect,
    pub grid: GridPos,
    /// Smoke probability in [0, 1], present once the tile has been classified.
    pub score: Option<f64>,
}

impl Tile {
    /// Extract this tile's pixels from the source image.
    ///
    /// Panics if the rect does not fit the image: tiles are derived from the
    /// image's own dimensions, so a mismatch is a contract violation rather
    /// than a recoverable runtime condition.
    pub fn crop(&self, image: &DynamicImage) -> DynamicImage {
        let r = self.rect;
        assert!(
            r.min_x < r.max_x
                && r.min_y < r.max_y
                && r.max_x <= image.width()
                && r.max_y <= image.height(),
            "tile {:?} outside {}x{} image",
            r,
            image.width(),
            image.height()
        );
        image.crop_imm(r.min_x, r.min_y, r.width(), r.height())
    }
}

/// Historical aggregate for a tile's exact rectangle, carried on a candidate
/// for audit.
#[derive(Debug, Clone, Copy)]
pub struct TileHistory {
    pub samples: i64,
    pub avg_score: f64,
    pub max_score: f64,
}

/// A classified tile that cleared its adaptive threshold.
#[derive(Debug, Clone, Copy)]
pub struct DetectionCandidate {
    pub tile: Tile,
    pub score: f64,
    /// None when the ledger had no rows for this rect in the query window
    /// (the tile passed on the score floor alone).
    pub history: Option<TileHistory>,
}

/// One merged bounding box over adjacent flagged tiles; the candidate smoke
/// event handed to the external notifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Detection {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub score: f64,
}

impl Detection {
    pub fn rect(&self) -> TileRect {
        TileRect {
            min_x: self.x,
            min_y: self.y,
            max_x: self.x + self.width,
            max_y: self.y + self.height,
        }
    }
}
