//! Wire-format contracts for API response types.

use chrono::Utc;
use serde_json::json;
use trust_service::models::{AccessAttempt, AttemptResponse, User, UserResponse};
use uuid::Uuid;

fn attempt() -> AccessAttempt {
    AccessAttempt {
        attempt_id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        device_id: None,
        ip_address: Some("192.168.1.10".to_string()),
        geo_location: None,
        timestamp: Utc::now(),
        decision: "challenge".to_string(),
        reason: Some("Total score 62.5, threshold 70".to_string()),
        total_score: 62.5,
        factor_scores: json!({"device_posture": 75.0, "context": 40.0}),
    }
}

fn user() -> User {
    User {
        user_id: Uuid::new_v4(),
        username: "ada".to_string(),
        email: "ada@example.com".to_string(),
        password_hash: "$argon2id$v=19$secret".to_string(),
        role: "admin".to_string(),
        external_id: None,
        display_name: None,
        job_title: None,
        department: None,
        synced_from_directory: false,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[test]
fn attempt_response_emits_decision_and_legacy_result() {
    let response = AttemptResponse::from(attempt());
    let value = serde_json::to_value(&response).unwrap();

    assert_eq!(value["decision"], "challenge");
    assert_eq!(value["result"], "challenge");
    assert_eq!(value["total_score"], 62.5);
    assert_eq!(value["factor_scores"]["device_posture"], 75.0);
}

#[test]
fn user_response_never_carries_the_password_hash() {
    let response = UserResponse::from(user());
    let value = serde_json::to_value(&response).unwrap();

    assert_eq!(value["username"], "ada");
    assert!(value.get("password_hash").is_none());
    assert!(!value.to_string().contains("argon2"));
}
