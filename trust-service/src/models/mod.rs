//! Data models for trust-service.

pub mod attempt;
pub mod device;
pub mod directory;
pub mod network;
pub mod policy;
pub mod template;
pub mod user;

pub use attempt::{AccessAttempt, AttemptResponse, Decision, NewAttempt};
pub use device::Device;
pub use directory::{ConnectionStatus, DirectoryUser};
pub use network::{ConnectorStatus, NetworkHealth, RemoteNetwork, Resource, derive_health};
pub use policy::Policy;
pub use template::{Template, TemplateType};
pub use user::{Role, User, UserResponse};
