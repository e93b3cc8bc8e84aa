use std::collections::HashMap;

use image::{GrayImage, Luma};
use imageproc::region_labelling::{Connectivity, connected_components};

use crate::models::{Detection, DetectionCandidate};

struct Region {
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
    score: f64,
}

/// Merge spatially-adjacent flagged tiles into one detection per contiguous
/// blob. Smoke typically spans several overlapping tiles, so candidates whose
/// grid positions touch horizontally, vertically, or diagonally collapse into
/// a single bounding box carrying the member maximum score.
///
/// `rows`/`cols` are the grid dimensions the tiler produced for the image
/// (see [`super::tiler::grid_shape`]). An isolated candidate yields a
/// singleton detection equal to its own rect; no candidates yields no
/// detections.
pub fn merge_regions(rows: u32, cols: u32, candidates: &[DetectionCandidate]) -> Vec<Detection> {
    if candidates.is_empty() {
        return Vec::new();
    }

    let by_cell: HashMap<(u32, u32), &DetectionCandidate> = candidates
        .iter()
        .map(|candidate| {
            let grid = candidate.tile.grid;
            ((grid.col, grid.row), candidate)
        })
        .collect();

    // One pixel per grid cell, lit where the tile is flagged.
    let mask = GrayImage::from_fn(cols, rows, |x, y| {
        if by_cell.contains_key(&(x, y)) {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    });
    let labeled = connected_components(&mask, Connectivity::Eight, Luma([0u8]));

    let mut regions: HashMap<u32, Region> = HashMap::new();
    for (x, y, label) in labeled.enumerate_pixels() {
        let label = label[0];
        if label == 0 {
            continue; // background
        }
        let candidate = by_cell[&(x, y)];
        let rect = candidate.tile.rect;
        regions
            .entry(label)
            .and_modify(|region| {
                region.min_x = region.min_x.min(rect.min_x);
                region.min_y = region.min_y.min(rect.min_y);
                region.max_x = region.max_x.max(rect.max_x);
                region.max_y = region.max_y.max(rect.max_y);
                region.score = region.score.max(candidate.score);
            })
            .or_insert(Region {
                min_x: rect.min_x,
                min_y: rect.min_y,
                max_x: rect.max_x,
                max_y: rect.max_y,
                score: candidate.score,
            });
    }

    let mut detections: Vec<Detection> = regions
        .into_values()
        .map(|region| Detection {
            x: region.min_x,
            y: region.min_y,
            width: region.max_x - region.min_x,
            height: region.max_y - region.min_y,
            score: region.score,
        })
        .collect();
    detections.sort_by_key(|detection| (detection.y, detection.x));
    detections
}
