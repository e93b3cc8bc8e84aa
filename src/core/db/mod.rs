mod alert;
mod detection_log;
mod score;
mod state;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use sqlx::{Connection, Row};

use crate::models::{Detection, TileRect};
use state::DbState;

pub use alert::{ALERT_COOLDOWN_SECS, AlertLog, AlertRecord};
pub use detection_log::DetectionLog;
pub use score::{ScoreLedger, ScoreRecord, ScoreRow, seconds_in_day};

/// SQLite-backed score ledger, detection log, and alert log.
///
/// Cheap to clone; cycles for different sources may share one instance.
/// Writes from different sources touch disjoint partitions, so per-statement
/// durability suffices without cross-source locking.
#[derive(Debug, Clone)]
pub struct DetectionDb {
    state: Arc<DbState>,
}

impl DetectionDb {
    pub async fn open<P: AsRef<Path>>(db_file: P) -> anyhow::Result<Self> {
        let state = DbState::open(&db_file).await.with_context(|| {
            format!("failed to open detection database {:?}", db_file.as_ref())
        })?;
        Ok(Self {
            state: Arc::new(state),
        })
    }
}

impl ScoreLedger for DetectionDb {
    async fn append_scores(&self, records: &[ScoreRecord]) -> anyhow::Result<()> {
        let mut conn = self.state.conn().await?;
        let mut tx = conn.begin().await?;
        for record in records {
            sqlx::query(
                r#"INSERT INTO scores
                (source_id, timestamp, min_x, min_y, max_x, max_y, score, seconds_in_day)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
            )
            .bind(&record.source_id)
            .bind(record.timestamp)
            .bind(record.rect.min_x)
            .bind(record.rect.min_y)
            .bind(record.rect.max_x)
            .bind(record.rect.max_y)
            .bind(record.score)
            .bind(record.seconds_in_day)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn query_historical(
        &self,
        source_id: &str,
        t_low: i64,
        t_high: i64,
        seconds_low: i64,
        seconds_high: i64,
    ) -> anyhow::Result<Vec<ScoreRow>> {
        let mut conn = self.state.conn().await?;
        let rows = sqlx::query(
            r#"SELECT min_x, min_y, max_x, max_y,
                COUNT(*) AS samples, AVG(score) AS avg_score, MAX(score) AS max_score
            FROM scores
            WHERE source_id = ?1 AND timestamp > ?2 AND timestamp < ?3
                AND seconds_in_day > ?4 AND seconds_in_day < ?5
            GROUP BY min_x, min_y, max_x, max_y"#,
        )
        .bind(source_id)
        .bind(t_low)
        .bind(t_high)
        .bind(seconds_low)
        .bind(seconds_high)
        .fetch_all(&mut *conn)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(ScoreRow {
                    rect: TileRect {
                        min_x: row.try_get("min_x")?,
                        min_y: row.try_get("min_y")?,
                        max_x: row.try_get("max_x")?,
                        max_y: row.try_get("max_y")?,
                    },
                    samples: row.try_get("samples")?,
                    avg_score: row.try_get("avg_score")?,
                    max_score: row.try_get("max_score")?,
                })
            })
            .collect()
    }
}

impl DetectionLog for DetectionDb {
    async fn record_detections(
        &self,
        source_id: &str,
        timestamp: i64,
        image_ref: &str,
        detections: &[Detection],
    ) -> anyhow::Result<()> {
        let mut conn = self.state.conn().await?;
        let mut tx = conn.begin().await?;
        for detection in detections {
            let rect = detection.rect();
            sqlx::query(
                r#"INSERT INTO detections
                (source_id, timestamp, min_x, min_y, max_x, max_y, score, image_ref)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
            )
            .bind(source_id)
            .bind(timestamp)
            .bind(rect.min_x)
            .bind(rect.min_y)
            .bind(rect.max_x)
            .bind(rect.max_y)
            .bind(detection.score)
            .bind(image_ref)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

impl AlertLog for DetectionDb {
    async fn should_alert(
        &self,
        source_id: &str,
        timestamp: i64,
        image_ref: &str,
    ) -> anyhow::Result<bool> {
        let mut conn = self.state.conn().await?;
        let mut tx = conn.begin().await?;
        let cutoff = timestamp - ALERT_COOLDOWN_SECS;
        let recent: Option<i64> =
            sqlx::query_scalar("SELECT MAX(timestamp) FROM alerts WHERE source_id = ?1 AND timestamp > ?2")
                .bind(source_id)
                .bind(cutoff)
                .fetch_one(&mut *tx)
                .await?;
        if recent.is_some() {
            // Suppressed; dropping the transaction writes nothing.
            return Ok(false);
        }
        sqlx::query("INSERT INTO alerts (source_id, timestamp, image_ref) VALUES (?1, ?2, ?3)")
            .bind(source_id)
            .bind(timestamp)
            .bind(image_ref)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn latest_alert(&self, source_id: &str) -> anyhow::Result<Option<AlertRecord>> {
        let mut conn = self.state.conn().await?;
        let row = sqlx::query(
            r#"SELECT source_id, timestamp, image_ref FROM alerts
            WHERE source_id = ?1
            ORDER BY timestamp DESC
            LIMIT 1"#,
        )
        .bind(source_id)
        .fetch_optional(&mut *conn)
        .await?;
        row.map(|row| {
            Ok(AlertRecord {
                source_id: row.try_get("source_id")?,
                timestamp: row.try_get("timestamp")?,
                image_ref: row.try_get("image_ref")?,
            })
        })
        .transpose()
    }
}
