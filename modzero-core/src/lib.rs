//! modzero-core: shared infrastructure for ModZero services.

pub mod config;
pub mod error;
pub mod middleware;
pub mod observability;
