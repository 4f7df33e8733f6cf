//! Services for trust-service.

pub mod database;
pub mod graph;
pub mod jwt;
pub mod ledger;
pub mod metrics;
pub mod reconcile;
pub mod sync;

pub use database::Database;
pub use graph::{DirectoryProvider, GraphProvider, MockDirectoryProvider};
pub use jwt::{Claims, JwtService};
pub use ledger::{Ledger, LedgerStats};
pub use metrics::{get_metrics, init_metrics};
pub use sync::{BatchSyncResult, IdentityStore, Reconciler};
