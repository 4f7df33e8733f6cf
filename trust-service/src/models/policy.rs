//! Trust policy model.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use std::collections::BTreeMap;
use uuid::Uuid;

/// A trust policy: a minimum score threshold plus a factor weight map.
/// Weights and threshold are always replaced together in a single UPDATE.
#[derive(Debug, Clone, FromRow)]
pub struct Policy {
    pub policy_id: Uuid,
    pub user_id: Uuid,
    pub policy_name: String,
    pub min_trust_threshold: f64,
    pub description: Option<String>,
    pub target_group: Option<String>,
    pub is_active: bool,
    pub factor_weights: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Policy {
    /// Parse the stored weight map. Keys are factor names, values weights.
    /// BTreeMap keeps factor iteration order stable across evaluations.
    pub fn weights(&self) -> BTreeMap<String, f64> {
        match self.factor_weights.as_object() {
            Some(map) => map
                .iter()
                .filter_map(|(k, v)| v.as_f64().map(|w| (k.clone(), w)))
                .collect(),
            None => BTreeMap::new(),
        }
    }
}
