use time::OffsetDateTime;

use crate::models::TileRect;

/// One persisted classifier score for one tile of one frame. Append-only;
/// keyed by (source_id, timestamp, rect).
#[derive(Debug, Clone)]
pub struct ScoreRecord {
    pub source_id: String,
    pub timestamp: i64,
    pub rect: TileRect,
    pub score: f64,
    pub seconds_in_day: i64,
}

impl ScoreRecord {
    pub fn new(source_id: &str, captured_at: OffsetDateTime, rect: TileRect, score: f64) -> Self {
        Self {
            source_id: source_id.to_string(),
            timestamp: captured_at.unix_timestamp(),
            rect,
            score,
            seconds_in_day: seconds_in_day(captured_at),
        }
    }
}

/// Seconds elapsed since the start of the timestamp's day, used to band
/// historical queries to a similar time of day.
pub fn seconds_in_day(at: OffsetDateTime) -> i64 {
    let t = at.time();
    (t.hour() as i64 * 60 + t.minute() as i64) * 60 + t.second() as i64
}

/// Aggregated score history for one exact tile rectangle.
#[derive(Debug, Clone, Copy)]
pub struct ScoreRow {
    pub rect: TileRect,
    pub samples: i64,
    pub avg_score: f64,
    pub max_score: f64,
}

/// Append-only time-series store of per-tile scores; the sole source of truth
/// for a tile's own history.
pub trait ScoreLedger: Send + Sync {
    /// Persist a batch of score records. Durable before returning.
    async fn append_scores(&self, records: &[ScoreRecord]) -> anyhow::Result<()>;

    /// Aggregate scores for one source over the window
    /// `t_low < timestamp < t_high` intersected with the time-of-day band
    /// `seconds_low < seconds_in_day < seconds_high`, grouped by exact rect.
    async fn query_historical(
        &self,
        source_id: &str,
        t_low: i64,
        t_high: i64,
        seconds_low: i64,
        seconds_high: i64,
    ) -> anyhow::Result<Vec<ScoreRow>>;
}
