//! Attempt ledger: append-only writes with bounded retry, plus in-process
//! rolling aggregates so `/api/attempts/stats` never scans the table.

use crate::error::TrustError;
use crate::models::{AccessAttempt, Decision, NewAttempt};
use crate::services::database::{AttemptAggregates, Database};
use crate::services::metrics::EVALUATIONS_TOTAL;
use serde::Serialize;
use std::sync::Arc;
use std::sync::RwLock;
use std::time::Duration;
use tracing::{instrument, warn};

#[derive(Debug, Default)]
struct StatsInner {
    attempts: i64,
    score_sum: f64,
    denied: i64,
    challenged: i64,
}

/// Snapshot returned to clients.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StatsSnapshot {
    pub total_attempts: i64,
    pub average_score: f64,
    pub denied: i64,
    pub challenged: i64,
}

/// Rolling attempt aggregates, seeded from one SQL aggregate at startup and
/// updated incrementally on every recorded attempt.
#[derive(Debug, Default)]
pub struct LedgerStats {
    inner: RwLock<StatsInner>,
}

impl LedgerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, aggregates: AttemptAggregates) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.attempts = aggregates.attempts;
        inner.score_sum = aggregates.score_sum;
        inner.denied = aggregates.denied;
        inner.challenged = aggregates.challenged;
    }

    pub fn observe(&self, decision: Decision, total_score: f64) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.attempts += 1;
        inner.score_sum += total_score;
        match decision {
            Decision::Deny => inner.denied += 1,
            Decision::Challenge => inner.challenged += 1,
            Decision::Allow => {}
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let average_score = if inner.attempts > 0 {
            inner.score_sum / inner.attempts as f64
        } else {
            0.0
        };
        StatsSnapshot {
            total_attempts: inner.attempts,
            average_score,
            denied: inner.denied,
            challenged: inner.challenged,
        }
    }
}

/// Writes attempts to the database and keeps the rolling stats current.
#[derive(Clone)]
pub struct Ledger {
    db: Arc<Database>,
    stats: Arc<LedgerStats>,
    write_attempts: u32,
}

impl Ledger {
    pub fn new(db: Arc<Database>, stats: Arc<LedgerStats>, write_attempts: u32) -> Self {
        Self {
            db,
            stats,
            write_attempts: write_attempts.max(1),
        }
    }

    pub fn stats(&self) -> &LedgerStats {
        &self.stats
    }

    /// Record one attempt. The insert is retried up to the configured number
    /// of attempts with a short backoff; a final failure surfaces as a
    /// persistence error and the attempt is lost to the ledger, never
    /// silently swallowed.
    #[instrument(skip(self, attempt), fields(user_id = %attempt.user_id, decision = %attempt.decision))]
    pub async fn record(&self, attempt: &NewAttempt) -> Result<AccessAttempt, TrustError> {
        let mut last_err = None;
        for n in 1..=self.write_attempts {
            match self.db.insert_attempt(attempt).await {
                Ok(row) => {
                    self.stats.observe(attempt.decision, attempt.total_score);
                    EVALUATIONS_TOTAL
                        .with_label_values(&[attempt.decision.as_str()])
                        .inc();
                    return Ok(row);
                }
                Err(e) => {
                    warn!(attempt = n, error = %e, "Ledger write failed");
                    last_err = Some(e);
                    if n < self.write_attempts {
                        tokio::time::sleep(Duration::from_millis(50 * u64::from(n))).await;
                    }
                }
            }
        }

        Err(TrustError::Persistence {
            attempts: self.write_attempts,
            source: anyhow::anyhow!(
                "{}",
                last_err.map(|e| e.to_string()).unwrap_or_default()
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_empty_stats() {
        let stats = LedgerStats::new();
        let snap = stats.snapshot();
        assert_eq!(snap.total_attempts, 0);
        assert_eq!(snap.average_score, 0.0);
    }

    #[test]
    fn observe_updates_incrementally() {
        let stats = LedgerStats::new();
        stats.observe(Decision::Allow, 90.0);
        stats.observe(Decision::Deny, 30.0);
        stats.observe(Decision::Challenge, 60.0);

        let snap = stats.snapshot();
        assert_eq!(snap.total_attempts, 3);
        assert_eq!(snap.denied, 1);
        assert_eq!(snap.challenged, 1);
        assert!((snap.average_score - 60.0).abs() < f64::EPSILON);
    }

    #[test]
    fn seed_replaces_counters() {
        let stats = LedgerStats::new();
        stats.observe(Decision::Allow, 100.0);
        stats.seed(AttemptAggregates {
            attempts: 10,
            score_sum: 700.0,
            denied: 2,
            challenged: 3,
        });

        let snap = stats.snapshot();
        assert_eq!(snap.total_attempts, 10);
        assert!((snap.average_score - 70.0).abs() < f64::EPSILON);
        assert_eq!(snap.denied, 2);
        assert_eq!(snap.challenged, 3);
    }
}
