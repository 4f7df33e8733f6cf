//! End-to-end engine behaviour with the default factor scorers.

use chrono::{TimeZone, Utc};
use serde_json::json;
use trust_service::engine::{
    DeviceContext, EngineSettings, IdentityContext, NetworkContext, RequestContext, TrustEngine,
};
use trust_service::models::{Decision, Policy};
use uuid::Uuid;

fn settings() -> EngineSettings {
    EngineSettings {
        default_factor_weight: 0.5,
        challenge_band: 15.0,
    }
}

fn policy(threshold: f64, weights: serde_json::Value) -> Policy {
    Policy {
        policy_id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        policy_name: "baseline".to_string(),
        min_trust_threshold: threshold,
        description: None,
        target_group: None,
        is_active: true,
        factor_weights: weights,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn request(device: DeviceContext, ip: Option<&str>, hour: u32) -> RequestContext {
    RequestContext {
        identity: IdentityContext {
            username: "ada".to_string(),
            group: None,
        },
        device,
        network: NetworkContext {
            ip: ip.map(|s| s.parse().unwrap()),
            geo_location: None,
            trusted_cidrs: vec![],
            at: Utc.with_ymd_and_hms(2025, 6, 2, hour, 15, 0).unwrap(),
        },
    }
}

#[test]
fn healthy_device_on_private_network_is_allowed() {
    let engine = TrustEngine::new(settings());
    let policy = policy(70.0, json!({"device_posture": 0.7, "context": 0.3}));

    let ctx = request(
        DeviceContext {
            fingerprint: Some("fp-laptop".to_string()),
            checks_passed: 5,
            checks_total: 5,
        },
        Some("192.168.10.4"),
        11,
    );

    let eval = engine.evaluate(&ctx, &policy);
    // posture 100, context 100
    assert_eq!(eval.total_score, 100.0);
    assert_eq!(eval.decision, Decision::Allow);
}

#[test]
fn missing_fingerprint_drags_score_to_deny() {
    let engine = TrustEngine::new(settings());
    let policy = policy(70.0, json!({"device_posture": 0.7, "context": 0.3}));

    let ctx = request(DeviceContext::default(), Some("192.168.10.4"), 11);

    let eval = engine.evaluate(&ctx, &policy);
    // posture 0 (no fingerprint), context 100 -> 30
    assert_eq!(eval.factor_scores["device_posture"], 0.0);
    assert_eq!(eval.total_score, 30.0);
    assert_eq!(eval.decision, Decision::Deny);
}

#[test]
fn degraded_posture_off_hours_lands_in_challenge_band() {
    let engine = TrustEngine::new(settings());
    let policy = policy(70.0, json!({"device_posture": 0.7, "context": 0.3}));

    let ctx = request(
        DeviceContext {
            fingerprint: Some("fp-laptop".to_string()),
            checks_passed: 3,
            checks_total: 4,
        },
        Some("10.0.0.8"),
        22,
    );

    let eval = engine.evaluate(&ctx, &policy);
    // posture 75, context 80 (off hours, private) -> 76.5 -> allow; tighten
    assert_eq!(eval.total_score, 76.5);
    assert_eq!(eval.decision, Decision::Allow);

    let strict = self::policy(80.0, json!({"device_posture": 0.7, "context": 0.3}));
    let eval = engine.evaluate(&ctx, &strict);
    assert_eq!(eval.decision, Decision::Challenge);
}

#[test]
fn baseline_posture_when_no_checks_recorded() {
    let engine = TrustEngine::new(settings());
    let policy = policy(70.0, json!({"device_posture": 1.0}));

    let ctx = request(
        DeviceContext {
            fingerprint: Some("fp-new".to_string()),
            checks_passed: 0,
            checks_total: 0,
        },
        None,
        11,
    );

    let eval = engine.evaluate(&ctx, &policy);
    assert_eq!(eval.factor_scores["device_posture"], 50.0);
}

#[test]
fn registered_network_range_counts_as_trusted() {
    let engine = TrustEngine::new(settings());
    let policy = policy(70.0, json!({"context": 1.0}));

    let mut ctx = request(
        DeviceContext {
            fingerprint: Some("fp".to_string()),
            checks_passed: 1,
            checks_total: 1,
        },
        Some("100.64.9.1"),
        11,
    );
    ctx.network.trusted_cidrs = vec!["100.64.0.0/16".to_string()];

    let eval = engine.evaluate(&ctx, &policy);
    assert_eq!(eval.factor_scores["context"], 100.0);
}
