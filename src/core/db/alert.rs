/// Repeat notifications for one source are suppressed for this long after an
/// alert fires.
pub const ALERT_COOLDOWN_SECS: i64 = 60 * 60 * 12;

/// One emitted alert. Append-only; the most recent row per source is the sole
/// gate for repeat notification. There is no acknowledged-incident state:
/// suppression is a pure rolling window.
#[derive(Debug, Clone)]
pub struct AlertRecord {
    pub source_id: String,
    pub timestamp: i64,
    pub image_ref: String,
}

pub trait AlertLog: Send + Sync {
    /// Returns true and records an alert if no alert for `source_id` falls
    /// within the cool-down window ending at `timestamp`; returns false
    /// without writing otherwise. The check-then-insert is one step per
    /// source; a lost race against a concurrent insert counts as suppression.
    async fn should_alert(
        &self,
        source_id: &str,
        timestamp: i64,
        image_ref: &str,
    ) -> anyhow::Result<bool>;

    /// Most recent alert for the source, if any.
    async fn latest_alert(&self, source_id: &str) -> anyhow::Result<Option<AlertRecord>>;
}
