//! Pure reconciliation planning: given a directory record and the matching
//! local user (if any), decide what the sync should do. No I/O here.

use crate::error::TrustError;
use crate::models::{DirectoryUser, User};
use serde::Serialize;
use uuid::Uuid;

/// Why a directory record was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    DisabledInDirectory,
    NoChanges,
    Cancelled,
}

/// Directory attributes projected onto a local user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncedProfile {
    pub external_id: String,
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    pub job_title: Option<String>,
    pub department: Option<String>,
}

impl SyncedProfile {
    fn from_directory(user: &DirectoryUser) -> Result<Self, TrustError> {
        let email = user
            .email()
            .ok_or_else(|| TrustError::Validation("directory record has no email".to_string()))?;
        let username = user.username().ok_or_else(|| {
            TrustError::Validation("directory record has no principal name".to_string())
        })?;

        Ok(Self {
            external_id: user.id.clone(),
            username: username.to_string(),
            email: email.to_string(),
            display_name: user.display_name.clone(),
            job_title: user.job_title.clone(),
            department: user.department.clone(),
        })
    }

    fn matches(&self, user: &User) -> bool {
        user.external_id.as_deref() == Some(self.external_id.as_str())
            && user.display_name == self.display_name
            && user.job_title == self.job_title
            && user.department == self.department
    }
}

/// What a sync should do for one directory record.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncPlan {
    Create(SyncedProfile),
    Update { user_id: Uuid, profile: SyncedProfile },
    Skip(SkipReason),
}

/// Plan the sync of one directory record against its local match.
///
/// The match is resolved by the caller: external id first, then email.
/// Disabled directory accounts are skipped unless explicitly overridden.
/// An email-matched local user already linked to a different external id is
/// a conflict, surfaced rather than silently re-linked.
pub fn plan_sync(
    directory_user: &DirectoryUser,
    existing: Option<&User>,
    override_disabled: bool,
) -> Result<SyncPlan, TrustError> {
    if !directory_user.is_enabled() && !override_disabled {
        return Ok(SyncPlan::Skip(SkipReason::DisabledInDirectory));
    }

    let profile = SyncedProfile::from_directory(directory_user)?;

    match existing {
        None => Ok(SyncPlan::Create(profile)),
        Some(user) => {
            if let Some(linked) = user.external_id.as_deref() {
                if linked != profile.external_id {
                    return Err(TrustError::ConflictingIdentity {
                        external_id: profile.external_id,
                        user_id: user.user_id,
                    });
                }
            }
            if profile.matches(user) {
                Ok(SyncPlan::Skip(SkipReason::NoChanges))
            } else {
                Ok(SyncPlan::Update {
                    user_id: user.user_id,
                    profile,
                })
            }
        }
    }
}

/// Outcome of syncing one directory record.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SyncOutcome {
    Created { user_id: Uuid },
    Updated { user_id: Uuid },
    Skipped { reason: SkipReason },
    Failed { kind: String, message: String },
}

/// Per-record sync result carried in batch responses.
#[derive(Debug, Clone, Serialize)]
pub struct UserSyncRecord {
    pub external_id: String,
    pub username: Option<String>,
    #[serde(flatten)]
    pub outcome: SyncOutcome,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn directory_user(id: &str, enabled: bool) -> DirectoryUser {
        DirectoryUser {
            id: id.to_string(),
            display_name: Some("Ada Lovelace".to_string()),
            user_principal_name: Some("ada@example.com".to_string()),
            mail: Some("ada@example.com".to_string()),
            job_title: Some("Engineer".to_string()),
            department: Some("R&D".to_string()),
            account_enabled: Some(enabled),
        }
    }

    fn local_user(external_id: Option<&str>) -> User {
        User {
            user_id: Uuid::new_v4(),
            username: "ada@example.com".to_string(),
            email: "ada@example.com".to_string(),
            password_hash: "hash".to_string(),
            role: "regular".to_string(),
            external_id: external_id.map(|s| s.to_string()),
            display_name: Some("Ada Lovelace".to_string()),
            job_title: Some("Engineer".to_string()),
            department: Some("R&D".to_string()),
            synced_from_directory: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn new_record_plans_create() {
        let plan = plan_sync(&directory_user("ext-1", true), None, false).unwrap();
        assert!(matches!(plan, SyncPlan::Create(_)));
    }

    #[test]
    fn disabled_record_skipped_unless_overridden() {
        let user = directory_user("ext-1", false);
        let plan = plan_sync(&user, None, false).unwrap();
        assert_eq!(plan, SyncPlan::Skip(SkipReason::DisabledInDirectory));

        let overridden = plan_sync(&user, None, true).unwrap();
        assert!(matches!(overridden, SyncPlan::Create(_)));
    }

    #[test]
    fn unchanged_record_skips_with_no_changes() {
        let local = local_user(Some("ext-1"));
        let plan = plan_sync(&directory_user("ext-1", true), Some(&local), false).unwrap();
        assert_eq!(plan, SyncPlan::Skip(SkipReason::NoChanges));
    }

    #[test]
    fn changed_attributes_plan_update() {
        let mut local = local_user(Some("ext-1"));
        local.job_title = Some("Analyst".to_string());
        let plan = plan_sync(&directory_user("ext-1", true), Some(&local), false).unwrap();
        assert!(matches!(plan, SyncPlan::Update { user_id, .. } if user_id == local.user_id));
    }

    #[test]
    fn email_match_without_link_plans_update() {
        let local = local_user(None);
        let plan = plan_sync(&directory_user("ext-1", true), Some(&local), false).unwrap();
        assert!(matches!(plan, SyncPlan::Update { .. }));
    }

    #[test]
    fn different_external_id_is_a_conflict() {
        let local = local_user(Some("ext-other"));
        let err = plan_sync(&directory_user("ext-1", true), Some(&local), false).unwrap_err();
        assert!(matches!(err, TrustError::ConflictingIdentity { .. }));
    }

    #[test]
    fn missing_email_fails_validation() {
        let mut user = directory_user("ext-1", true);
        user.mail = None;
        user.user_principal_name = None;
        let err = plan_sync(&user, None, false).unwrap_err();
        assert!(matches!(err, TrustError::Validation(_)));
    }
}
