//! Domain errors for trust evaluation and directory synchronization.

use modzero_core::error::AppError;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Errors raised by the trust engine, ledger, and directory reconciler.
#[derive(Debug, Error)]
pub enum TrustError {
    /// No active policy covers the request. Evaluation fails closed.
    #[error("no active policy for target group {0:?}")]
    PolicyNotFound(Option<String>),

    /// The directory rejected or could not serve a request.
    #[error("directory unavailable: {0}")]
    DirectoryUnavailable(String),

    /// An outbound call exceeded its deadline.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// A directory record maps onto a local user already bound to a
    /// different external identity.
    #[error("directory record {external_id} conflicts with local user {user_id}")]
    ConflictingIdentity { external_id: String, user_id: Uuid },

    #[error("validation failed: {0}")]
    Validation(String),

    /// A ledger write failed after the configured number of attempts.
    #[error("persistence failed after {attempts} attempts: {source}")]
    Persistence {
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },
}

impl From<TrustError> for AppError {
    fn from(err: TrustError) -> Self {
        match err {
            TrustError::PolicyNotFound(group) => AppError::NotFound(anyhow::anyhow!(
                "no active policy for target group {:?}",
                group
            )),
            TrustError::DirectoryUnavailable(msg) => AppError::BadGateway(msg),
            TrustError::Timeout(d) => {
                AppError::GatewayTimeout(format!("operation timed out after {:?}", d))
            }
            TrustError::ConflictingIdentity {
                external_id,
                user_id,
            } => AppError::Conflict(anyhow::anyhow!(
                "directory record {} conflicts with local user {}",
                external_id,
                user_id
            )),
            TrustError::Validation(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            TrustError::Persistence { attempts, source } => AppError::InternalError(
                anyhow::anyhow!("persistence failed after {} attempts: {}", attempts, source),
            ),
        }
    }
}
