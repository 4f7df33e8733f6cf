//! Database service for trust-service.

use crate::models::{
    AccessAttempt, Decision, Device, NewAttempt, Policy, RemoteNetwork, Resource, Template, User,
};
use crate::services::metrics::DB_QUERY_DURATION;
use chrono::{DateTime, Utc};
use modzero_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

/// Filters for listing attempts.
#[derive(Debug, Clone, Default)]
pub struct AttemptFilter {
    pub user_id: Option<Uuid>,
    pub decision: Option<Decision>,
    pub since: Option<DateTime<Utc>>,
    pub limit: i64,
    pub offset: i64,
}

/// Rolling aggregate snapshot read from SQL at startup.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttemptAggregates {
    pub attempts: i64,
    pub score_sum: f64,
    pub denied: i64,
    pub challenged: i64,
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "trust-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // User Operations
    // -------------------------------------------------------------------------

    /// Create a local user.
    #[instrument(skip(self, password_hash), fields(username = %username))]
    pub async fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        role: &str,
    ) -> Result<User, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_user"])
            .start_timer();

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (user_id, username, email, password_hash, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING user_id, username, email, password_hash, role, external_id, display_name,
                      job_title, department, synced_from_directory, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(role)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "User with username '{}' or email '{}' already exists",
                    username,
                    email
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create user: {}", e)),
        })?;

        timer.observe_duration();
        info!(user_id = %user.user_id, "User created");
        Ok(user)
    }

    /// Create a user from a directory record.
    #[instrument(skip(self, password_hash), fields(external_id = %external_id))]
    #[allow(clippy::too_many_arguments)]
    pub async fn create_synced_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        external_id: &str,
        display_name: Option<&str>,
        job_title: Option<&str>,
        department: Option<&str>,
    ) -> Result<User, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_synced_user"])
            .start_timer();

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (user_id, username, email, password_hash, role, external_id,
                               display_name, job_title, department, synced_from_directory)
            VALUES ($1, $2, $3, $4, 'regular', $5, $6, $7, $8, TRUE)
            RETURNING user_id, username, email, password_hash, role, external_id, display_name,
                      job_title, department, synced_from_directory, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(external_id)
        .bind(display_name)
        .bind(job_title)
        .bind(department)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "User '{}' already exists locally",
                    username
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create synced user: {}", e)),
        })?;

        timer.observe_duration();
        Ok(user)
    }

    /// Update a synced user's directory attributes.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn apply_sync_update(
        &self,
        user_id: Uuid,
        external_id: &str,
        display_name: Option<&str>,
        job_title: Option<&str>,
        department: Option<&str>,
    ) -> Result<User, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["apply_sync_update"])
            .start_timer();

        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET external_id = $2, display_name = $3, job_title = $4, department = $5,
                synced_from_directory = TRUE, updated_at = NOW()
            WHERE user_id = $1
            RETURNING user_id, username, email, password_hash, role, external_id, display_name,
                      job_title, department, synced_from_directory, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(external_id)
        .bind(display_name)
        .bind(job_title)
        .bind(department)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update user: {}", e)))?;

        timer.observe_duration();
        Ok(user)
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT user_id, username, email, password_hash, role, external_id, display_name,
                   job_title, department, synced_from_directory, created_at, updated_at
            FROM users WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get user: {}", e)))?;
        Ok(user)
    }

    /// Look up a user by username or email, for login.
    pub async fn find_user_by_login(&self, login: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT user_id, username, email, password_hash, role, external_id, display_name,
                   job_title, department, synced_from_directory, created_at, updated_at
            FROM users WHERE username = $1 OR email = $1
            "#,
        )
        .bind(login)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to find user: {}", e)))?;
        Ok(user)
    }

    pub async fn find_user_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT user_id, username, email, password_hash, role, external_id, display_name,
                   job_title, department, synced_from_directory, created_at, updated_at
            FROM users WHERE external_id = $1
            "#,
        )
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to find user: {}", e)))?;
        Ok(user)
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT user_id, username, email, password_hash, role, external_id, display_name,
                   job_title, department, synced_from_directory, created_at, updated_at
            FROM users WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to find user: {}", e)))?;
        Ok(user)
    }

    pub async fn list_users(&self) -> Result<Vec<User>, AppError> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT user_id, username, email, password_hash, role, external_id, display_name,
                   job_title, department, synced_from_directory, created_at, updated_at
            FROM users ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list users: {}", e)))?;
        Ok(users)
    }

    /// External ids of all locally synced users.
    pub async fn list_external_ids(&self) -> Result<Vec<String>, AppError> {
        let rows = sqlx::query_as::<_, (String,)>(
            "SELECT external_id FROM users WHERE external_id IS NOT NULL",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list external ids: {}", e))
        })?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Delete a user and their devices. Historical attempts are kept.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn delete_user(&self, user_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_user"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        sqlx::query("DELETE FROM devices WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete devices: {}", e))
            })?;

        let result = sqlx::query("DELETE FROM users WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete user: {}", e))
            })?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit: {}", e))
        })?;

        timer.observe_duration();
        Ok(result.rows_affected() > 0)
    }

    // -------------------------------------------------------------------------
    // Device Operations
    // -------------------------------------------------------------------------

    /// Register a device. Re-registering the same fingerprint for the same
    /// user refreshes the existing row instead of inserting a duplicate.
    #[instrument(skip(self), fields(user_id = %user_id, device_name = %device_name))]
    pub async fn upsert_device(
        &self,
        user_id: Uuid,
        device_name: &str,
        os_version: Option<&str>,
        fingerprint: Option<&str>,
    ) -> Result<Device, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["upsert_device"])
            .start_timer();

        let device = sqlx::query_as::<_, Device>(
            r#"
            INSERT INTO devices (device_id, user_id, device_name, os_version, fingerprint)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, fingerprint) WHERE fingerprint IS NOT NULL
            DO UPDATE SET device_name = EXCLUDED.device_name,
                          os_version = EXCLUDED.os_version,
                          registered_at = NOW()
            RETURNING device_id, user_id, device_name, os_version, fingerprint,
                      checks_passed, checks_total, registered_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(device_name)
        .bind(os_version)
        .bind(fingerprint)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to register device: {}", e)))?;

        timer.observe_duration();
        Ok(device)
    }

    pub async fn get_device(&self, device_id: Uuid) -> Result<Option<Device>, AppError> {
        let device = sqlx::query_as::<_, Device>(
            r#"
            SELECT device_id, user_id, device_name, os_version, fingerprint,
                   checks_passed, checks_total, registered_at
            FROM devices WHERE device_id = $1
            "#,
        )
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get device: {}", e)))?;
        Ok(device)
    }

    /// List devices, all or for one user.
    pub async fn list_devices(&self, user_id: Option<Uuid>) -> Result<Vec<Device>, AppError> {
        let devices = sqlx::query_as::<_, Device>(
            r#"
            SELECT device_id, user_id, device_name, os_version, fingerprint,
                   checks_passed, checks_total, registered_at
            FROM devices
            WHERE $1::uuid IS NULL OR user_id = $1
            ORDER BY registered_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list devices: {}", e)))?;
        Ok(devices)
    }

    pub async fn delete_device(&self, device_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM devices WHERE device_id = $1")
            .bind(device_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete device: {}", e))
            })?;
        Ok(result.rows_affected() > 0)
    }

    // -------------------------------------------------------------------------
    // Policy Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self, factor_weights), fields(policy_name = %policy_name))]
    #[allow(clippy::too_many_arguments)]
    pub async fn create_policy(
        &self,
        owner_id: Uuid,
        policy_name: &str,
        min_trust_threshold: f64,
        description: Option<&str>,
        target_group: Option<&str>,
        factor_weights: &serde_json::Value,
    ) -> Result<Policy, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_policy"])
            .start_timer();

        let policy = sqlx::query_as::<_, Policy>(
            r#"
            INSERT INTO policies (policy_id, user_id, policy_name, min_trust_threshold,
                                  description, target_group, factor_weights)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING policy_id, user_id, policy_name, min_trust_threshold, description,
                      target_group, is_active, factor_weights, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(policy_name)
        .bind(min_trust_threshold)
        .bind(description)
        .bind(target_group)
        .bind(factor_weights)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!("Policy '{}' already exists", policy_name))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create policy: {}", e)),
        })?;

        timer.observe_duration();
        info!(policy_id = %policy.policy_id, "Policy created");
        Ok(policy)
    }

    /// Replace a policy's threshold and weight map together in one UPDATE.
    /// Concurrent evaluations see either the old pair or the new pair.
    #[instrument(skip(self, factor_weights), fields(policy_id = %policy_id))]
    #[allow(clippy::too_many_arguments)]
    pub async fn update_policy(
        &self,
        policy_id: Uuid,
        policy_name: &str,
        min_trust_threshold: f64,
        description: Option<&str>,
        target_group: Option<&str>,
        is_active: bool,
        factor_weights: &serde_json::Value,
    ) -> Result<Option<Policy>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_policy"])
            .start_timer();

        let policy = sqlx::query_as::<_, Policy>(
            r#"
            UPDATE policies
            SET policy_name = $2, min_trust_threshold = $3, description = $4,
                target_group = $5, is_active = $6, factor_weights = $7, updated_at = NOW()
            WHERE policy_id = $1
            RETURNING policy_id, user_id, policy_name, min_trust_threshold, description,
                      target_group, is_active, factor_weights, created_at, updated_at
            "#,
        )
        .bind(policy_id)
        .bind(policy_name)
        .bind(min_trust_threshold)
        .bind(description)
        .bind(target_group)
        .bind(is_active)
        .bind(factor_weights)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update policy: {}", e)))?;

        timer.observe_duration();
        Ok(policy)
    }

    pub async fn get_policy(&self, policy_id: Uuid) -> Result<Option<Policy>, AppError> {
        let policy = sqlx::query_as::<_, Policy>(
            r#"
            SELECT policy_id, user_id, policy_name, min_trust_threshold, description,
                   target_group, is_active, factor_weights, created_at, updated_at
            FROM policies WHERE policy_id = $1
            "#,
        )
        .bind(policy_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get policy: {}", e)))?;
        Ok(policy)
    }

    pub async fn list_policies(&self) -> Result<Vec<Policy>, AppError> {
        let policies = sqlx::query_as::<_, Policy>(
            r#"
            SELECT policy_id, user_id, policy_name, min_trust_threshold, description,
                   target_group, is_active, factor_weights, created_at, updated_at
            FROM policies ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list policies: {}", e)))?;
        Ok(policies)
    }

    /// Find the policy governing a target group: active, group match or
    /// group-less fallback, most recently updated first.
    #[instrument(skip(self))]
    pub async fn find_active_policy(
        &self,
        target_group: Option<&str>,
    ) -> Result<Option<Policy>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_active_policy"])
            .start_timer();

        let policy = sqlx::query_as::<_, Policy>(
            r#"
            SELECT policy_id, user_id, policy_name, min_trust_threshold, description,
                   target_group, is_active, factor_weights, created_at, updated_at
            FROM policies
            WHERE is_active AND (target_group IS NULL OR target_group = $1)
            ORDER BY (target_group IS NOT NULL) DESC, updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(target_group)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to find active policy: {}", e))
        })?;

        timer.observe_duration();
        Ok(policy)
    }

    pub async fn delete_policy(&self, policy_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM policies WHERE policy_id = $1")
            .bind(policy_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete policy: {}", e))
            })?;
        Ok(result.rows_affected() > 0)
    }

    // -------------------------------------------------------------------------
    // Attempt Operations (append-only)
    // -------------------------------------------------------------------------

    /// Insert one attempt row. Attempts are never updated or deleted.
    #[instrument(skip(self, attempt), fields(user_id = %attempt.user_id, decision = %attempt.decision))]
    pub async fn insert_attempt(&self, attempt: &NewAttempt) -> Result<AccessAttempt, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_attempt"])
            .start_timer();

        let row = sqlx::query_as::<_, AccessAttempt>(
            r#"
            INSERT INTO access_attempts (attempt_id, user_id, device_id, ip_address,
                                         geo_location, timestamp, decision, reason,
                                         total_score, factor_scores)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING attempt_id, user_id, device_id, ip_address, geo_location, timestamp,
                      decision, reason, total_score, factor_scores
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(attempt.user_id)
        .bind(attempt.device_id)
        .bind(attempt.ip_address.map(|ip| ip.to_string()))
        .bind(&attempt.geo_location)
        .bind(attempt.timestamp)
        .bind(attempt.decision.as_str())
        .bind(&attempt.reason)
        .bind(attempt.total_score)
        .bind(&attempt.factor_scores)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to insert attempt: {}", e)))?;

        timer.observe_duration();
        Ok(row)
    }

    /// List attempts, newest first.
    #[instrument(skip(self, filter))]
    pub async fn list_attempts(
        &self,
        filter: &AttemptFilter,
    ) -> Result<Vec<AccessAttempt>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_attempts"])
            .start_timer();

        let attempts = sqlx::query_as::<_, AccessAttempt>(
            r#"
            SELECT attempt_id, user_id, device_id, ip_address, geo_location, timestamp,
                   decision, reason, total_score, factor_scores
            FROM access_attempts
            WHERE ($1::uuid IS NULL OR user_id = $1)
              AND ($2::text IS NULL OR decision = $2)
              AND ($3::timestamptz IS NULL OR timestamp >= $3)
            ORDER BY timestamp DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(filter.user_id)
        .bind(filter.decision.map(|d| d.as_str()))
        .bind(filter.since)
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list attempts: {}", e)))?;

        timer.observe_duration();
        Ok(attempts)
    }

    /// One-shot aggregate used to seed the in-process rolling stats.
    #[instrument(skip(self))]
    pub async fn attempt_aggregates(&self) -> Result<AttemptAggregates, AppError> {
        let (attempts, score_sum, denied, challenged) =
            sqlx::query_as::<_, (i64, f64, i64, i64)>(
                r#"
                SELECT COUNT(*),
                       COALESCE(SUM(total_score), 0.0),
                       COUNT(*) FILTER (WHERE decision = 'deny'),
                       COUNT(*) FILTER (WHERE decision = 'challenge')
                FROM access_attempts
                "#,
            )
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to aggregate attempts: {}", e))
            })?;

        Ok(AttemptAggregates {
            attempts,
            score_sum,
            denied,
            challenged,
        })
    }

    // -------------------------------------------------------------------------
    // Template Operations
    // -------------------------------------------------------------------------

    pub async fn create_template(
        &self,
        name: &str,
        subject: &str,
        body: &str,
        template_type: &str,
    ) -> Result<Template, AppError> {
        let template = sqlx::query_as::<_, Template>(
            r#"
            INSERT INTO templates (template_id, name, subject, body, template_type)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING template_id, name, subject, body, template_type, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(subject)
        .bind(body)
        .bind(template_type)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!("Template '{}' already exists", name))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create template: {}", e)),
        })?;
        Ok(template)
    }

    pub async fn update_template(
        &self,
        template_id: Uuid,
        name: &str,
        subject: &str,
        body: &str,
        template_type: &str,
    ) -> Result<Option<Template>, AppError> {
        let template = sqlx::query_as::<_, Template>(
            r#"
            UPDATE templates
            SET name = $2, subject = $3, body = $4, template_type = $5
            WHERE template_id = $1
            RETURNING template_id, name, subject, body, template_type, created_at
            "#,
        )
        .bind(template_id)
        .bind(name)
        .bind(subject)
        .bind(body)
        .bind(template_type)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update template: {}", e))
        })?;
        Ok(template)
    }

    pub async fn get_template(&self, template_id: Uuid) -> Result<Option<Template>, AppError> {
        let template = sqlx::query_as::<_, Template>(
            r#"
            SELECT template_id, name, subject, body, template_type, created_at
            FROM templates WHERE template_id = $1
            "#,
        )
        .bind(template_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get template: {}", e)))?;
        Ok(template)
    }

    pub async fn list_templates(&self) -> Result<Vec<Template>, AppError> {
        let templates = sqlx::query_as::<_, Template>(
            r#"
            SELECT template_id, name, subject, body, template_type, created_at
            FROM templates ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list templates: {}", e))
        })?;
        Ok(templates)
    }

    pub async fn delete_template(&self, template_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM templates WHERE template_id = $1")
            .bind(template_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete template: {}", e))
            })?;
        Ok(result.rows_affected() > 0)
    }

    // -------------------------------------------------------------------------
    // Network and Resource Operations
    // -------------------------------------------------------------------------

    pub async fn create_network(
        &self,
        name: &str,
        cidr_range: &str,
    ) -> Result<RemoteNetwork, AppError> {
        let network = sqlx::query_as::<_, RemoteNetwork>(
            r#"
            INSERT INTO remote_networks (network_id, name, cidr_range)
            VALUES ($1, $2, $3)
            RETURNING network_id, name, cidr_range, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(cidr_range)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!("Network '{}' already exists", name))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create network: {}", e)),
        })?;
        Ok(network)
    }

    pub async fn get_network(&self, network_id: Uuid) -> Result<Option<RemoteNetwork>, AppError> {
        let network = sqlx::query_as::<_, RemoteNetwork>(
            "SELECT network_id, name, cidr_range, created_at FROM remote_networks WHERE network_id = $1",
        )
        .bind(network_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get network: {}", e)))?;
        Ok(network)
    }

    pub async fn list_networks(&self) -> Result<Vec<RemoteNetwork>, AppError> {
        let networks = sqlx::query_as::<_, RemoteNetwork>(
            "SELECT network_id, name, cidr_range, created_at FROM remote_networks ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list networks: {}", e)))?;
        Ok(networks)
    }

    /// CIDR ranges of all registered networks, for the context scorer.
    pub async fn list_network_cidrs(&self) -> Result<Vec<String>, AppError> {
        let rows = sqlx::query_as::<_, (String,)>("SELECT cidr_range FROM remote_networks")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to list network ranges: {}", e))
            })?;
        Ok(rows.into_iter().map(|(cidr,)| cidr).collect())
    }

    pub async fn create_resource(
        &self,
        network_id: Uuid,
        name: &str,
        description: Option<&str>,
    ) -> Result<Resource, AppError> {
        let resource = sqlx::query_as::<_, Resource>(
            r#"
            INSERT INTO resources (resource_id, network_id, name, description)
            VALUES ($1, $2, $3, $4)
            RETURNING resource_id, network_id, name, description, connector_status, last_checked
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(network_id)
        .bind(name)
        .bind(description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to create resource: {}", e))
        })?;
        Ok(resource)
    }

    pub async fn list_resources(&self, network_id: Uuid) -> Result<Vec<Resource>, AppError> {
        let resources = sqlx::query_as::<_, Resource>(
            r#"
            SELECT resource_id, network_id, name, description, connector_status, last_checked
            FROM resources WHERE network_id = $1 ORDER BY name
            "#,
        )
        .bind(network_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list resources: {}", e)))?;
        Ok(resources)
    }

    /// Connector heartbeat: record a resource's reported status.
    #[instrument(skip(self), fields(resource_id = %resource_id, status = %status))]
    pub async fn update_resource_status(
        &self,
        network_id: Uuid,
        resource_id: Uuid,
        status: &str,
    ) -> Result<Option<Resource>, AppError> {
        let resource = sqlx::query_as::<_, Resource>(
            r#"
            UPDATE resources
            SET connector_status = $3, last_checked = NOW()
            WHERE network_id = $1 AND resource_id = $2
            RETURNING resource_id, network_id, name, description, connector_status, last_checked
            "#,
        )
        .bind(network_id)
        .bind(resource_id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update resource status: {}", e))
        })?;
        Ok(resource)
    }
}
