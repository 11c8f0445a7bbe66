//! idp-core: Shared infrastructure for the identity-provider workspace.
pub mod config;
pub mod error;
pub mod middleware;
pub mod observability;
