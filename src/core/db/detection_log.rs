use crate::models::Detection;

/// Append-only audit trail of merged detections. Best-effort: the detection
/// path never reads it back.
pub trait DetectionLog: Send + Sync {
    async fn record_detections(
        &self,
        source_id: &str,
        timestamp: i64,
        image_ref: &str,
        detections: &[Detection],
    ) -> anyhow::Result<()>;
}
