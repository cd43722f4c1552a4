//! # connectra-core
//!
//! Core types, traits, and abstractions for the connectra B2B data
//! platform: canonical `Company`/`Contact`/`Job` records, the VQL query
//! shape, repository traits implemented by `connectra-db`/`connectra-search`,
//! deterministic UUID and canonicalization helpers, the shared error type,
//! and ambient logging/defaults/cache modules.

pub mod cache;
pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod traits;
pub mod uuid_utils;

pub use error::{Error, Result};
pub use models::*;
pub use traits::*;
