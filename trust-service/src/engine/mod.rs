//! Trust policy engine.
//!
//! Pure and deterministic: the same request context and policy always yield
//! the same score and decision. All inputs, including evaluation time, are
//! explicit; the engine never reads clocks, databases, or config on its own.

pub mod context;
pub mod posture;

use crate::models::{Decision, Policy};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::net::IpAddr;

pub use context::ContextScorer;
pub use posture::PostureScorer;

/// Engine-wide tuning, fixed at construction.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Weight applied to a factor the policy does not mention.
    pub default_factor_weight: f64,
    /// Absolute distance below the threshold within which a score is
    /// challenged instead of denied.
    pub challenge_band: f64,
}

/// Who is asking.
#[derive(Debug, Clone, Default)]
pub struct IdentityContext {
    pub username: String,
    pub group: Option<String>,
}

/// Device state at evaluation time.
#[derive(Debug, Clone, Default)]
pub struct DeviceContext {
    pub fingerprint: Option<String>,
    pub checks_passed: u32,
    pub checks_total: u32,
}

/// Network and temporal context of the request.
#[derive(Debug, Clone)]
pub struct NetworkContext {
    pub ip: Option<IpAddr>,
    pub geo_location: Option<String>,
    /// CIDR ranges of registered remote networks, treated as trusted.
    pub trusted_cidrs: Vec<String>,
    /// Evaluation time, supplied by the caller.
    pub at: DateTime<Utc>,
}

/// Full evaluation input.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub identity: IdentityContext,
    pub device: DeviceContext,
    pub network: NetworkContext,
}

/// A pluggable trust factor. Returns `None` when the factor cannot be scored
/// for this request; the engine treats that as the worst case (0).
pub trait FactorScorer: Send + Sync {
    fn name(&self) -> &str;
    fn score(&self, ctx: &RequestContext) -> Option<f64>;
}

/// Result of a trust evaluation.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub total_score: f64,
    pub decision: Decision,
    /// Factor name to clamped sub-score, in stable order.
    pub factor_scores: BTreeMap<String, f64>,
}

/// The trust engine: a fixed set of factor scorers plus engine settings.
pub struct TrustEngine {
    scorers: Vec<Box<dyn FactorScorer>>,
    settings: EngineSettings,
}

fn clamp_score(score: f64) -> f64 {
    score.clamp(0.0, 100.0)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl TrustEngine {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            scorers: vec![Box::new(PostureScorer), Box::new(ContextScorer)],
            settings,
        }
    }

    pub fn with_scorers(settings: EngineSettings, scorers: Vec<Box<dyn FactorScorer>>) -> Self {
        Self { scorers, settings }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Evaluate a request against a policy.
    ///
    /// Scores every factor named by either a registered scorer or the
    /// policy's weight map. A factor with no scorer, or whose scorer returns
    /// `None`, contributes 0. Sub-scores and the total are clamped to
    /// [0, 100] regardless of the weights in the policy.
    pub fn evaluate(&self, ctx: &RequestContext, policy: &Policy) -> Evaluation {
        let weights = policy.weights();

        let mut factor_names: Vec<&str> = self.scorers.iter().map(|s| s.name()).collect();
        for name in weights.keys() {
            if !factor_names.contains(&name.as_str()) {
                factor_names.push(name);
            }
        }

        let mut factor_scores = BTreeMap::new();
        let mut total = 0.0;
        for name in factor_names {
            let raw = self
                .scorers
                .iter()
                .find(|s| s.name() == name)
                .and_then(|s| s.score(ctx));
            let sub = clamp_score(raw.unwrap_or(0.0));
            let weight = weights
                .get(name)
                .copied()
                .unwrap_or(self.settings.default_factor_weight);
            total += weight * sub;
            factor_scores.insert(name.to_string(), round2(sub));
        }

        let total_score = round2(clamp_score(total));
        let decision = self.decide(total_score, policy.min_trust_threshold);

        Evaluation {
            total_score,
            decision,
            factor_scores,
        }
    }

    /// Map a total score onto a decision for the given threshold.
    pub fn decide(&self, total_score: f64, threshold: f64) -> Decision {
        if total_score >= threshold {
            Decision::Allow
        } else if total_score >= threshold - self.settings.challenge_band {
            Decision::Challenge
        } else {
            Decision::Deny
        }
    }
}

/// Select the policy governing a target group from a set of candidates:
/// active policies only, a group-specific policy beats the group-less
/// fallback, and among equals the most recently updated wins.
pub fn select_active_policy<'a>(
    policies: &'a [Policy],
    target_group: Option<&str>,
) -> Option<&'a Policy> {
    policies
        .iter()
        .filter(|p| p.is_active)
        .filter(|p| match (&p.target_group, target_group) {
            (None, _) => true,
            (Some(pg), Some(tg)) => pg == tg,
            (Some(_), None) => false,
        })
        .max_by_key(|p| (p.target_group.is_some(), p.updated_at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use uuid::Uuid;

    fn policy(threshold: f64, weights: serde_json::Value) -> Policy {
        Policy {
            policy_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            policy_name: "default".to_string(),
            min_trust_threshold: threshold,
            description: None,
            target_group: None,
            is_active: true,
            factor_weights: weights,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    struct FixedScorer {
        name: &'static str,
        value: Option<f64>,
    }

    impl FactorScorer for FixedScorer {
        fn name(&self) -> &str {
            self.name
        }
        fn score(&self, _ctx: &RequestContext) -> Option<f64> {
            self.value
        }
    }

    fn settings() -> EngineSettings {
        EngineSettings {
            default_factor_weight: 0.5,
            challenge_band: 15.0,
        }
    }

    fn ctx() -> RequestContext {
        RequestContext {
            identity: IdentityContext::default(),
            device: DeviceContext::default(),
            network: NetworkContext {
                ip: None,
                geo_location: None,
                trusted_cidrs: vec![],
                at: Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap(),
            },
        }
    }

    fn engine_with(scores: Vec<(&'static str, Option<f64>)>) -> TrustEngine {
        let scorers: Vec<Box<dyn FactorScorer>> = scores
            .into_iter()
            .map(|(name, value)| Box::new(FixedScorer { name, value }) as Box<dyn FactorScorer>)
            .collect();
        TrustEngine::with_scorers(settings(), scorers)
    }

    #[test]
    fn weighted_sum_in_challenge_band() {
        let engine = engine_with(vec![
            ("device_posture", Some(80.0)),
            ("context", Some(50.0)),
        ]);
        let policy = policy(70.0, json!({"device_posture": 0.6, "context": 0.4}));

        let eval = engine.evaluate(&ctx(), &policy);
        assert_eq!(eval.total_score, 68.0);
        assert_eq!(eval.decision, Decision::Challenge);
    }

    #[test]
    fn high_scores_allow() {
        let engine = engine_with(vec![
            ("device_posture", Some(90.0)),
            ("context", Some(90.0)),
        ]);
        let policy = policy(70.0, json!({"device_posture": 0.6, "context": 0.4}));

        let eval = engine.evaluate(&ctx(), &policy);
        assert_eq!(eval.total_score, 90.0);
        assert_eq!(eval.decision, Decision::Allow);
    }

    #[test]
    fn below_band_denies() {
        let engine = engine_with(vec![
            ("device_posture", Some(40.0)),
            ("context", Some(40.0)),
        ]);
        let policy = policy(70.0, json!({"device_posture": 0.6, "context": 0.4}));

        let eval = engine.evaluate(&ctx(), &policy);
        assert_eq!(eval.decision, Decision::Deny);
    }

    #[test]
    fn adversarial_weights_clamp_total() {
        let engine = engine_with(vec![
            ("device_posture", Some(100.0)),
            ("context", Some(100.0)),
        ]);
        let policy = policy(70.0, json!({"device_posture": 50.0, "context": 50.0}));

        let eval = engine.evaluate(&ctx(), &policy);
        assert_eq!(eval.total_score, 100.0);

        let negative = policy_with_negative(&engine);
        assert_eq!(negative, 0.0);
    }

    fn policy_with_negative(engine: &TrustEngine) -> f64 {
        let policy = policy(70.0, json!({"device_posture": -10.0, "context": -10.0}));
        engine.evaluate(&ctx(), &policy).total_score
    }

    #[test]
    fn unscoreable_factor_contributes_zero() {
        let engine = engine_with(vec![
            ("device_posture", None),
            ("context", Some(100.0)),
        ]);
        let policy = policy(70.0, json!({"device_posture": 0.6, "context": 0.4}));

        let eval = engine.evaluate(&ctx(), &policy);
        assert_eq!(eval.factor_scores["device_posture"], 0.0);
        assert_eq!(eval.total_score, 40.0);
        assert_eq!(eval.decision, Decision::Deny);
    }

    #[test]
    fn unknown_weighted_factor_scores_zero() {
        let engine = engine_with(vec![("context", Some(80.0))]);
        let policy = policy(70.0, json!({"context": 0.5, "geo_velocity": 0.5}));

        let eval = engine.evaluate(&ctx(), &policy);
        assert_eq!(eval.factor_scores["geo_velocity"], 0.0);
        assert_eq!(eval.total_score, 40.0);
    }

    #[test]
    fn evaluation_is_deterministic() {
        let engine = engine_with(vec![
            ("device_posture", Some(72.5)),
            ("context", Some(61.3)),
        ]);
        let policy = policy(70.0, json!({"device_posture": 0.7, "context": 0.3}));

        let first = engine.evaluate(&ctx(), &policy);
        for _ in 0..10 {
            let again = engine.evaluate(&ctx(), &policy);
            assert_eq!(again.total_score, first.total_score);
            assert_eq!(again.decision, first.decision);
            assert_eq!(again.factor_scores, first.factor_scores);
        }
    }

    #[test]
    fn active_policy_selection_prefers_group_then_recency() {
        let mut older = policy(70.0, json!({}));
        older.target_group = Some("engineering".to_string());
        older.updated_at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

        let mut newer = policy(60.0, json!({}));
        newer.target_group = Some("engineering".to_string());
        newer.updated_at = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();

        let mut global = policy(50.0, json!({}));
        global.target_group = None;
        global.updated_at = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();

        let mut inactive = policy(40.0, json!({}));
        inactive.target_group = Some("engineering".to_string());
        inactive.is_active = false;
        inactive.updated_at = Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap();

        let policies = vec![older.clone(), newer.clone(), global.clone(), inactive];

        let selected = select_active_policy(&policies, Some("engineering")).unwrap();
        assert_eq!(selected.policy_id, newer.policy_id);

        // Unknown group falls back to the group-less policy.
        let fallback = select_active_policy(&policies, Some("finance")).unwrap();
        assert_eq!(fallback.policy_id, global.policy_id);

        // No policy at all.
        assert!(select_active_policy(&[], Some("engineering")).is_none());
    }
}
