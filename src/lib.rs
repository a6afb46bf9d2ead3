//! taxiidb - versioned object store and manifest engine for TAXII-style
//! threat intelligence sharing
//!
//! Objects are stored per collection as immutable versions. A manifest
//! index records every version and decides what a filtered query returns;
//! object bodies are fetched for the rows it selects. The [`backend`]
//! facade is the only surface callers need.

pub mod backend;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod filter;
pub mod loader;
pub mod manifest;
pub mod model;
pub mod objects;
pub mod observability;
pub mod registry;
pub mod version;

pub use backend::Backend;
pub use config::StoreConfig;
pub use errors::{StoreError, StoreResult};
