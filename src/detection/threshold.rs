use std::collections::HashMap;

use time::OffsetDateTime;
use tracing::warn;

use crate::core::db::{ScoreLedger, seconds_in_day};
use crate::models::{DetectionCandidate, Tile, TileHistory};

/// Minimum classifier score for a tile to be considered at all.
pub const SCORE_FLOOR: f64 = 0.5;

/// Historical window reaches back three and a half days...
const HISTORY_WINDOW_SECS: i64 = 60 * 60 * 84;
/// ...but excludes the most recent half day so a smoke event does not raise
/// its own threshold while it is still burning.
const RECENT_EXCLUSION_SECS: i64 = 60 * 60 * 12;
/// Same-time-of-day band: haze and glare recur at similar clock times.
const TIME_OF_DAY_BAND_SECS: i64 = 60 * 60;

/// Adaptive threshold for a tile whose historical max score is `hist_max`:
/// halfway between the max and 1.0, but never less than 0.2 above the max, so
/// chronically noisy rectangles need a real jump rather than merely clearing
/// the midpoint.
pub fn threshold_for(hist_max: f64) -> f64 {
    let halfway = (hist_max + 1.0) / 2.0;
    halfway.max(hist_max + 0.2)
}

/// Flag the classified tiles whose scores are anomalous relative to their own
/// rectangle's history at a similar time of day.
///
/// One grouped ledger query covers the whole image; tiles are matched to
/// aggregate rows by exact rect. A tile with no matching history passes on
/// the score floor alone. If the ledger query fails the filter degrades to
/// that unconstrained behavior for every tile rather than blocking the cycle.
pub async fn filter_candidates<L: ScoreLedger>(
    ledger: &L,
    source_id: &str,
    captured_at: OffsetDateTime,
    tiles: &[Tile],
) -> Vec<DetectionCandidate> {
    let top_score = tiles
        .iter()
        .filter_map(|tile| tile.score)
        .fold(f64::NEG_INFINITY, f64::max);
    if !(top_score >= SCORE_FLOOR) {
        // Nothing can pass; skip the ledger entirely.
        return Vec::new();
    }

    let timestamp = captured_at.unix_timestamp();
    let tod = seconds_in_day(captured_at);
    let history = match ledger
        .query_historical(
            source_id,
            timestamp - HISTORY_WINDOW_SECS,
            timestamp - RECENT_EXCLUSION_SECS,
            tod - TIME_OF_DAY_BAND_SECS,
            tod + TIME_OF_DAY_BAND_SECS,
        )
        .await
    {
        Ok(rows) => rows,
        Err(error) => {
            warn!(source_id, %error, "historical score query failed, falling back to score floor");
            Vec::new()
        }
    };
    let by_rect: HashMap<_, _> = history.iter().map(|row| (row.rect, row)).collect();

    let mut candidates = Vec::new();
    for tile in tiles {
        let Some(score) = tile.score else { continue };
        if score < SCORE_FLOOR {
            continue;
        }
        match by_rect.get(&tile.rect) {
            None => candidates.push(DetectionCandidate {
                tile: *tile,
                score,
                history: None,
            }),
            Some(row) => {
                if score > threshold_for(row.max_score) {
                    candidates.push(DetectionCandidate {
                        tile: *tile,
                        score,
                        history: Some(TileHistory {
                            samples: row.samples,
                            avg_score: row.avg_score,
                            max_score: row.max_score,
                        }),
                    });
                }
            }
        }
    }
    candidates
}
