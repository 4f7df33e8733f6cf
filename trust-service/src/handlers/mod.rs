//! HTTP handlers for the REST surface under `/api`.

pub mod attempts;
pub mod auth;
pub mod devices;
pub mod directory;
pub mod networks;
pub mod policies;
pub mod templates;
pub mod users;
