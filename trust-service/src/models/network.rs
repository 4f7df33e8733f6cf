//! Remote network and resource models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Connector status reported by a resource heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorStatus {
    Healthy,
    Degraded,
    Unreachable,
}

impl ConnectorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unreachable => "unreachable",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "healthy" => Some(Self::Healthy),
            "degraded" => Some(Self::Degraded),
            "unreachable" => Some(Self::Unreachable),
            _ => None,
        }
    }
}

/// Derived network health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkHealth {
    Green,
    Amber,
    Red,
}

impl NetworkHealth {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Green => "green",
            Self::Amber => "amber",
            Self::Red => "red",
        }
    }
}

/// Derive network health from its resources: red if any resource is
/// unreachable, amber if any is degraded, green otherwise.
pub fn derive_health(resources: &[Resource]) -> NetworkHealth {
    let statuses: Vec<ConnectorStatus> = resources
        .iter()
        .filter_map(|r| ConnectorStatus::from_str(&r.connector_status))
        .collect();

    if statuses.contains(&ConnectorStatus::Unreachable) {
        NetworkHealth::Red
    } else if statuses.contains(&ConnectorStatus::Degraded) {
        NetworkHealth::Amber
    } else {
        NetworkHealth::Green
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RemoteNetwork {
    pub network_id: Uuid,
    pub name: String,
    pub cidr_range: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Resource {
    pub resource_id: Uuid,
    pub network_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub connector_status: String,
    pub last_checked: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(status: &str) -> Resource {
        Resource {
            resource_id: Uuid::new_v4(),
            network_id: Uuid::new_v4(),
            name: "db".to_string(),
            description: None,
            connector_status: status.to_string(),
            last_checked: None,
        }
    }

    #[test]
    fn health_green_when_empty() {
        assert_eq!(derive_health(&[]), NetworkHealth::Green);
    }

    #[test]
    fn health_red_beats_amber() {
        let resources = vec![
            resource("healthy"),
            resource("degraded"),
            resource("unreachable"),
        ];
        assert_eq!(derive_health(&resources), NetworkHealth::Red);
    }

    #[test]
    fn health_amber_when_degraded_only() {
        let resources = vec![resource("healthy"), resource("degraded")];
        assert_eq!(derive_health(&resources), NetworkHealth::Amber);
    }
}
