//! Reconciler behaviour against an in-memory identity store.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use trust_service::error::TrustError;
use trust_service::models::{DirectoryUser, User};
use trust_service::services::reconcile::{SkipReason, SyncOutcome, SyncedProfile};
use trust_service::services::{IdentityStore, MockDirectoryProvider, Reconciler};
use uuid::Uuid;

#[derive(Default)]
struct InMemoryStore {
    users: Mutex<Vec<User>>,
}

impl InMemoryStore {
    fn seed(self, user: User) -> Self {
        self.users.lock().unwrap().push(user);
        self
    }

    fn count(&self) -> usize {
        self.users.lock().unwrap().len()
    }
}

fn make_user(profile: &SyncedProfile, password_hash: &str) -> User {
    User {
        user_id: Uuid::new_v4(),
        username: profile.username.clone(),
        email: profile.email.clone(),
        password_hash: password_hash.to_string(),
        role: "regular".to_string(),
        external_id: Some(profile.external_id.clone()),
        display_name: profile.display_name.clone(),
        job_title: profile.job_title.clone(),
        department: profile.department.clone(),
        synced_from_directory: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[async_trait]
impl IdentityStore for InMemoryStore {
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<User>, TrustError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.external_id.as_deref() == Some(external_id))
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, TrustError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn create_synced(
        &self,
        profile: &SyncedProfile,
        password_hash: &str,
    ) -> Result<User, TrustError> {
        let user = make_user(profile, password_hash);
        self.users.lock().unwrap().push(user.clone());
        Ok(user)
    }

    async fn apply_update(
        &self,
        user_id: Uuid,
        profile: &SyncedProfile,
    ) -> Result<User, TrustError> {
        let mut users = self.users.lock().unwrap();
        let user = users
            .iter_mut()
            .find(|u| u.user_id == user_id)
            .ok_or_else(|| TrustError::Validation("no such user".to_string()))?;
        user.external_id = Some(profile.external_id.clone());
        user.display_name = profile.display_name.clone();
        user.job_title = profile.job_title.clone();
        user.department = profile.department.clone();
        user.synced_from_directory = true;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }
}

fn directory_user(id: &str, email: &str, enabled: bool) -> DirectoryUser {
    DirectoryUser {
        id: id.to_string(),
        display_name: Some(format!("User {}", id)),
        user_principal_name: Some(email.to_string()),
        mail: Some(email.to_string()),
        job_title: Some("Engineer".to_string()),
        department: Some("R&D".to_string()),
        account_enabled: Some(enabled),
    }
}

fn reconciler(
    users: Vec<DirectoryUser>,
    store: Arc<InMemoryStore>,
) -> Reconciler {
    Reconciler::new(
        Arc::new(MockDirectoryProvider::with_users(users)),
        store,
        4,
    )
}

#[tokio::test]
async fn resync_of_unchanged_users_is_idempotent() {
    let store = Arc::new(InMemoryStore::default());
    let reconciler = reconciler(
        vec![
            directory_user("ext-1", "ada@example.com", true),
            directory_user("ext-2", "grace@example.com", true),
        ],
        store.clone(),
    );

    let first = reconciler
        .sync_all(100, false, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(first.created, 2);
    assert_eq!(first.failed, 0);
    assert_eq!(store.count(), 2);

    let second = reconciler
        .sync_all(100, false, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(second.created, 0);
    assert_eq!(second.skipped, 2);
    assert_eq!(store.count(), 2);
    for record in &second.records {
        assert!(matches!(
            record.outcome,
            SyncOutcome::Skipped {
                reason: SkipReason::NoChanges
            }
        ));
    }
}

#[tokio::test]
async fn disabled_account_requires_override() {
    let store = Arc::new(InMemoryStore::default());
    let reconciler = reconciler(
        vec![directory_user("ext-1", "ada@example.com", false)],
        store.clone(),
    );

    let record = reconciler.sync_one("ext-1", false).await.unwrap().unwrap();
    assert!(matches!(
        record.outcome,
        SyncOutcome::Skipped {
            reason: SkipReason::DisabledInDirectory
        }
    ));
    assert_eq!(store.count(), 0);

    let record = reconciler.sync_one("ext-1", true).await.unwrap().unwrap();
    assert!(matches!(record.outcome, SyncOutcome::Created { .. }));
    assert_eq!(store.count(), 1);
}

#[tokio::test]
async fn unknown_external_id_yields_none() {
    let store = Arc::new(InMemoryStore::default());
    let reconciler = reconciler(vec![], store);

    let result = reconciler.sync_one("missing", false).await.unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn one_conflicting_record_does_not_stop_the_batch() {
    // A local user holds grace's email but is linked to a different
    // directory identity.
    let taken = make_user(
        &SyncedProfile {
            external_id: "ext-other".to_string(),
            username: "grace@example.com".to_string(),
            email: "grace@example.com".to_string(),
            display_name: None,
            job_title: None,
            department: None,
        },
        "hash",
    );
    let store = Arc::new(InMemoryStore::default().seed(taken));

    let users: Vec<DirectoryUser> = (1..=9)
        .map(|n| directory_user(&format!("ext-{}", n), &format!("user{}@example.com", n), true))
        .chain(std::iter::once(directory_user(
            "ext-grace",
            "grace@example.com",
            true,
        )))
        .collect();
    let reconciler = reconciler(users, store.clone());

    let result = reconciler
        .sync_all(100, false, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.total, 10);
    assert_eq!(result.created, 9);
    assert_eq!(result.failed, 1);

    let failed = result
        .records
        .iter()
        .find(|r| r.external_id == "ext-grace")
        .unwrap();
    assert!(matches!(
        &failed.outcome,
        SyncOutcome::Failed { kind, .. } if kind == "conflicting_identity"
    ));
    // 9 created plus the pre-seeded conflicting user.
    assert_eq!(store.count(), 10);
}

#[tokio::test]
async fn cancelled_batch_skips_every_record() {
    let store = Arc::new(InMemoryStore::default());
    let users: Vec<DirectoryUser> = (1..=5)
        .map(|n| directory_user(&format!("ext-{}", n), &format!("user{}@example.com", n), true))
        .collect();
    let reconciler = reconciler(users, store.clone());

    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = reconciler.sync_all(100, false, cancel).await.unwrap();
    assert_eq!(result.total, 5);
    assert_eq!(result.skipped, 5);
    assert_eq!(store.count(), 0);
    for record in &result.records {
        assert!(matches!(
            record.outcome,
            SyncOutcome::Skipped {
                reason: SkipReason::Cancelled
            }
        ));
    }
}

#[tokio::test]
async fn missing_email_is_recorded_as_failed() {
    let store = Arc::new(InMemoryStore::default());
    let mut broken = directory_user("ext-1", "ada@example.com", true);
    broken.mail = None;
    broken.user_principal_name = None;
    let reconciler = reconciler(vec![broken], store.clone());

    let result = reconciler
        .sync_all(100, false, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(result.failed, 1);
    assert!(matches!(
        &result.records[0].outcome,
        SyncOutcome::Failed { kind, .. } if kind == "validation"
    ));
    assert_eq!(store.count(), 0);
}
