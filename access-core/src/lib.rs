//! access-core: Shared infrastructure for the access-control platform.
pub mod config;
pub mod error;
pub mod observability;
