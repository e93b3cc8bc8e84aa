mod common;

use std::sync::atomic::{AtomicUsize, Ordering};

use common::{noon, rect, scored_tile};
use smokewatch::core::db::{ScoreLedger, ScoreRecord, ScoreRow};
use smokewatch::detection::threshold::{filter_candidates, threshold_for};

/// Ledger fake that serves a fixed set of aggregate rows and counts queries.
struct CountingLedger {
    rows: Vec<ScoreRow>,
    queries: AtomicUsize,
}

impl CountingLedger {
    fn empty() -> Self {
        Self {
            rows: Vec::new(),
            queries: AtomicUsize::new(0),
        }
    }

    fn with_rows(rows: Vec<ScoreRow>) -> Self {
        Self {
            rows,
            queries: AtomicUsize::new(0),
        }
    }

    fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

impl ScoreLedger for CountingLedger {
    async fn append_scores(&self, _records: &[ScoreRecord]) -> anyhow::Result<()> {
        Ok(())
    }

    async fn query_historical(
        &self,
        _source_id: &str,
        _t_low: i64,
        _t_high: i64,
        _seconds_low: i64,
        _seconds_high: i64,
    ) -> anyhow::Result<Vec<ScoreRow>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.rows.clone())
    }
}

/// Ledger fake whose historical query always fails.
struct BrokenLedger;

impl ScoreLedger for BrokenLedger {
    async fn append_scores(&self, _records: &[ScoreRecord]) -> anyhow::Result<()> {
        Ok(())
    }

    async fn query_historical(
        &self,
        _source_id: &str,
        _t_low: i64,
        _t_high: i64,
        _seconds_low: i64,
        _seconds_high: i64,
    ) -> anyhow::Result<Vec<ScoreRow>> {
        anyhow::bail!("database is on fire too")
    }
}

#[test]
fn threshold_bounds_hold_and_are_monotonic() {
    let mut previous = f64::NEG_INFINITY;
    for step in 0..=100 {
        let hist_max = step as f64 / 100.0;
        let threshold = threshold_for(hist_max);
        assert!(threshold >= (hist_max + 1.0) / 2.0);
        assert!(threshold >= hist_max + 0.2 - 1e-12);
        assert!(threshold >= previous, "threshold decreased at {hist_max}");
        previous = threshold;
    }
    // The two regimes from the worked examples: a quiet rectangle and a
    // chronically noisy one.
    assert!((threshold_for(0.4) - 0.7).abs() < 1e-12);
    assert!((threshold_for(0.92) - 1.12).abs() < 1e-12);
}

#[tokio::test]
async fn fast_exit_below_floor_skips_the_ledger() {
    let ledger = CountingLedger::empty();
    let tiles = vec![
        scored_tile(0, 0, rect(0, 0, 299, 299), 0.49),
        scored_tile(0, 1, rect(269, 0, 568, 299), 0.2),
    ];
    let candidates = filter_candidates(&ledger, "cam", noon(), &tiles).await;
    assert!(candidates.is_empty());
    assert_eq!(ledger.query_count(), 0);
}

#[tokio::test]
async fn tile_without_history_passes_on_the_floor() {
    let ledger = CountingLedger::empty();
    let tiles = vec![
        scored_tile(0, 0, rect(0, 0, 299, 299), 0.9),
        scored_tile(0, 1, rect(269, 0, 568, 299), 0.1),
    ];
    let candidates = filter_candidates(&ledger, "cam", noon(), &tiles).await;
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].tile.rect, rect(0, 0, 299, 299));
    assert!(candidates[0].history.is_none());
    assert_eq!(ledger.query_count(), 1);
}

#[tokio::test]
async fn noisy_history_suppresses_a_strong_score() {
    // Historical max 0.92 pushes the threshold to 1.12: nothing can pass.
    let target = rect(0, 0, 299, 299);
    let ledger = CountingLedger::with_rows(vec![ScoreRow {
        rect: target,
        samples: 12,
        avg_score: 0.3,
        max_score: 0.92,
    }]);
    let tiles = vec![scored_tile(0, 0, target, 0.9)];
    let candidates = filter_candidates(&ledger, "cam", noon(), &tiles).await;
    assert!(candidates.is_empty());
}

#[tokio::test]
async fn quiet_history_lets_a_jump_through() {
    let target = rect(0, 0, 299, 299);
    let ledger = CountingLedger::with_rows(vec![ScoreRow {
        rect: target,
        samples: 8,
        avg_score: 0.2,
        max_score: 0.4,
    }]);
    let tiles = vec![scored_tile(0, 0, target, 0.75)];
    let candidates = filter_candidates(&ledger, "cam", noon(), &tiles).await;
    assert_eq!(candidates.len(), 1);
    let history = candidates[0].history.expect("history carried for audit");
    assert_eq!(history.samples, 8);
    assert!((history.max_score - 0.4).abs() < 1e-12);
}

#[tokio::test]
async fn history_for_another_rect_does_not_constrain() {
    let ledger = CountingLedger::with_rows(vec![ScoreRow {
        rect: rect(269, 0, 568, 299),
        samples: 5,
        avg_score: 0.5,
        max_score: 0.95,
    }]);
    let tiles = vec![scored_tile(0, 0, rect(0, 0, 299, 299), 0.6)];
    let candidates = filter_candidates(&ledger, "cam", noon(), &tiles).await;
    assert_eq!(candidates.len(), 1);
    assert!(candidates[0].history.is_none());
}

#[tokio::test]
async fn ledger_failure_degrades_to_the_floor() {
    let tiles = vec![
        scored_tile(0, 0, rect(0, 0, 299, 299), 0.9),
        scored_tile(0, 1, rect(269, 0, 568, 299), 0.3),
    ];
    let candidates = filter_candidates(&BrokenLedger, "cam", noon(), &tiles).await;
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].tile.rect, rect(0, 0, 299, 299));
}
