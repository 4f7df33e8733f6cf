//! Directory sync reconciler: applies reconciliation plans against the
//! identity store with bounded concurrency and cooperative cancellation.

use crate::error::TrustError;
use crate::models::{DirectoryUser, User};
use crate::services::database::Database;
use crate::services::graph::DirectoryProvider;
use crate::services::metrics::SYNC_RESULTS_TOTAL;
use crate::services::reconcile::{
    SkipReason, SyncOutcome, SyncPlan, SyncedProfile, UserSyncRecord, plan_sync,
};
use crate::utils::password::{Password, hash_password};
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Persistence seam for synced identities. `Database` implements it; tests
/// use an in-memory store.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<User>, TrustError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, TrustError>;
    async fn create_synced(
        &self,
        profile: &SyncedProfile,
        password_hash: &str,
    ) -> Result<User, TrustError>;
    async fn apply_update(&self, user_id: uuid::Uuid, profile: &SyncedProfile)
        -> Result<User, TrustError>;
}

fn persistence(err: modzero_core::error::AppError) -> TrustError {
    TrustError::Persistence {
        attempts: 1,
        source: anyhow::anyhow!("{}", err),
    }
}

#[async_trait]
impl IdentityStore for Database {
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<User>, TrustError> {
        self.find_user_by_external_id(external_id)
            .await
            .map_err(persistence)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, TrustError> {
        self.find_user_by_email(email).await.map_err(persistence)
    }

    async fn create_synced(
        &self,
        profile: &SyncedProfile,
        password_hash: &str,
    ) -> Result<User, TrustError> {
        self.create_synced_user(
            &profile.username,
            &profile.email,
            password_hash,
            &profile.external_id,
            profile.display_name.as_deref(),
            profile.job_title.as_deref(),
            profile.department.as_deref(),
        )
        .await
        .map_err(persistence)
    }

    async fn apply_update(
        &self,
        user_id: uuid::Uuid,
        profile: &SyncedProfile,
    ) -> Result<User, TrustError> {
        self.apply_sync_update(
            user_id,
            &profile.external_id,
            profile.display_name.as_deref(),
            profile.job_title.as_deref(),
            profile.department.as_deref(),
        )
        .await
        .map_err(persistence)
    }
}

/// Result of a batch sync.
#[derive(Debug, Serialize)]
pub struct BatchSyncResult {
    pub total: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub records: Vec<UserSyncRecord>,
}

impl BatchSyncResult {
    fn from_records(records: Vec<UserSyncRecord>) -> Self {
        let mut result = Self {
            total: records.len(),
            created: 0,
            updated: 0,
            skipped: 0,
            failed: 0,
            records: Vec::new(),
        };
        for record in &records {
            match record.outcome {
                SyncOutcome::Created { .. } => result.created += 1,
                SyncOutcome::Updated { .. } => result.updated += 1,
                SyncOutcome::Skipped { .. } => result.skipped += 1,
                SyncOutcome::Failed { .. } => result.failed += 1,
            }
        }
        result.records = records;
        result
    }
}

/// Applies directory records to the local identity store.
pub struct Reconciler {
    directory: Arc<dyn DirectoryProvider>,
    store: Arc<dyn IdentityStore>,
    concurrency: usize,
}

impl Reconciler {
    pub fn new(
        directory: Arc<dyn DirectoryProvider>,
        store: Arc<dyn IdentityStore>,
        concurrency: usize,
    ) -> Self {
        Self {
            directory,
            store,
            concurrency: concurrency.max(1),
        }
    }

    /// Sync one directory user by external id. `Ok(None)` when the directory
    /// has no such record.
    #[instrument(skip(self), fields(external_id = %external_id))]
    pub async fn sync_one(
        &self,
        external_id: &str,
        override_disabled: bool,
    ) -> Result<Option<UserSyncRecord>, TrustError> {
        let Some(user) = self.directory.get_user(external_id).await? else {
            return Ok(None);
        };
        Ok(Some(self.apply(&user, override_disabled).await))
    }

    /// Sync up to `top` directory users. One bad record yields one failed
    /// entry; the rest of the batch continues. Cancellation stops new syncs
    /// from starting, but results of in-flight syncs are still recorded.
    #[instrument(skip(self, cancel))]
    pub async fn sync_all(
        &self,
        top: u32,
        override_disabled: bool,
        cancel: CancellationToken,
    ) -> Result<BatchSyncResult, TrustError> {
        let users = self.directory.list_users(top).await?;
        info!(count = users.len(), "Starting directory sync batch");

        let records: Vec<UserSyncRecord> = stream::iter(users)
            .map(|user| {
                let cancel = cancel.clone();
                async move {
                    if cancel.is_cancelled() {
                        return UserSyncRecord {
                            external_id: user.id.clone(),
                            username: user.username().map(|s| s.to_string()),
                            outcome: SyncOutcome::Skipped {
                                reason: SkipReason::Cancelled,
                            },
                        };
                    }
                    self.apply(&user, override_disabled).await
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let result = BatchSyncResult::from_records(records);
        info!(
            created = result.created,
            updated = result.updated,
            skipped = result.skipped,
            failed = result.failed,
            "Directory sync batch finished"
        );
        Ok(result)
    }

    /// Plan and execute the sync of one record, folding any failure into the
    /// record itself so a batch can carry on.
    async fn apply(&self, user: &DirectoryUser, override_disabled: bool) -> UserSyncRecord {
        let outcome = match self.apply_inner(user, override_disabled).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(external_id = %user.id, error = %e, "Sync failed for directory record");
                SyncOutcome::Failed {
                    kind: error_kind(&e).to_string(),
                    message: e.to_string(),
                }
            }
        };

        SYNC_RESULTS_TOTAL
            .with_label_values(&[outcome_action(&outcome)])
            .inc();

        UserSyncRecord {
            external_id: user.id.clone(),
            username: user.username().map(|s| s.to_string()),
            outcome,
        }
    }

    async fn apply_inner(
        &self,
        user: &DirectoryUser,
        override_disabled: bool,
    ) -> Result<SyncOutcome, TrustError> {
        let existing = match self.store.find_by_external_id(&user.id).await? {
            Some(found) => Some(found),
            None => match user.email() {
                Some(email) => self.store.find_by_email(email).await?,
                None => None,
            },
        };

        match plan_sync(user, existing.as_ref(), override_disabled)? {
            SyncPlan::Skip(reason) => Ok(SyncOutcome::Skipped { reason }),
            SyncPlan::Create(profile) => {
                let password_hash = throwaway_password_hash()?;
                let created = self.store.create_synced(&profile, &password_hash).await?;
                Ok(SyncOutcome::Created {
                    user_id: created.user_id,
                })
            }
            SyncPlan::Update { user_id, profile } => {
                let updated = self.store.apply_update(user_id, &profile).await?;
                Ok(SyncOutcome::Updated {
                    user_id: updated.user_id,
                })
            }
        }
    }
}

fn error_kind(err: &TrustError) -> &'static str {
    match err {
        TrustError::PolicyNotFound(_) => "policy_not_found",
        TrustError::DirectoryUnavailable(_) => "directory_unavailable",
        TrustError::Timeout(_) => "timeout",
        TrustError::ConflictingIdentity { .. } => "conflicting_identity",
        TrustError::Validation(_) => "validation",
        TrustError::Persistence { .. } => "persistence",
    }
}

fn outcome_action(outcome: &SyncOutcome) -> &'static str {
    match outcome {
        SyncOutcome::Created { .. } => "created",
        SyncOutcome::Updated { .. } => "updated",
        SyncOutcome::Skipped { .. } => "skipped",
        SyncOutcome::Failed { .. } => "failed",
    }
}

/// Synced users authenticate through the directory; the local password is a
/// random throwaway that nobody ever sees.
fn throwaway_password_hash() -> Result<String, TrustError> {
    let password: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect();
    let hash = hash_password(&Password::new(password))
        .map_err(|e| TrustError::Validation(format!("failed to hash password: {}", e)))?;
    Ok(hash.into_string())
}
