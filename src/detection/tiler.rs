use crate::models::{GridPos, Tile, TileRect};

/// Axis-adjacent segments overlap by roughly 10%.
const OVERLAP_RATIO: f64 = 1.1;

/// The trailing far-edge segment is dropped when it would duplicate this
/// fraction or more of the previous segment.
const MAX_TAIL_OVERLAP: f64 = 0.95;

/// Break the range (0, full_size) into segments of `segment_size` that are
/// equally spaced apart with approximately 10% overlap between neighbors.
///
/// A trailing segment pinned to the far edge guarantees exact coverage
/// regardless of rounding, except when that segment would be a near-duplicate
/// of the previous one (a dimension within ~5% of `segment_size`), in which
/// case the sliver at the far edge is left uncovered rather than classified
/// twice.
pub fn segment_ranges(full_size: u32, segment_size: u32) -> Vec<(u32, u32)> {
    assert!(segment_size > 0, "segment size must be positive");
    if full_size <= segment_size {
        return vec![(0, full_size)];
    }

    let half = segment_size / 2;
    let first_center = half;
    let last_center = full_size - half;
    let flex_size = (last_center - first_center) as f64;
    let num_segments = (flex_size / (segment_size as f64 / OVERLAP_RATIO)).ceil() as u32;
    let num_segments = num_segments.max(1);
    let offset = flex_size / num_segments as f64;

    let mut ranges = Vec::with_capacity(num_segments as usize + 1);
    for i in 0..num_segments {
        let center = first_center + (i as f64 * offset).round() as u32;
        let start = center - half;
        let end = (start + segment_size).min(full_size);
        ranges.push((start, end));
    }

    let tail_start = full_size - segment_size;
    let last_end = ranges.last().map(|r| r.1).unwrap_or(0);
    let overlap = last_end.saturating_sub(tail_start) as f64;
    if overlap < segment_size as f64 * MAX_TAIL_OVERLAP {
        ranges.push((tail_start, full_size));
    }
    ranges
}

/// Compute the full tile grid for an image: the cartesian product of the
/// per-axis segment ranges, in row-major order, each tile tagged with its
/// (row, col) grid position.
pub fn tile_grid(width: u32, height: u32, segment_size: u32) -> Vec<Tile> {
    let x_ranges = segment_ranges(width, segment_size);
    let y_ranges = segment_ranges(height, segment_size);

    let mut tiles = Vec::with_capacity(x_ranges.len() * y_ranges.len());
    for (row, &(min_y, max_y)) in y_ranges.iter().enumerate() {
        for (col, &(min_x, max_x)) in x_ranges.iter().enumerate() {
            tiles.push(Tile {
                rect: TileRect {
                    min_x,
                    min_y,
                    max_x,
                    max_y,
                },
                grid: GridPos {
                    row: row as u32,
                    col: col as u32,
                },
                score: None,
            });
        }
    }
    tiles
}

/// Grid dimensions (rows, cols) of a tile list produced by [`tile_grid`].
pub fn grid_shape(tiles: &[Tile]) -> (u32, u32) {
    match tiles.last() {
        // Row-major order puts the maximum indices on the final tile.
        Some(tile) => (tile.grid.row + 1, tile.grid.col + 1),
        None => (0, 0),
    }
}
