//! Manifest index
//!
//! Per collection, an ordered version history for every object id. The
//! index decides which versions exist and in what order query results come
//! back; the object store only supplies bodies for rows chosen here.

mod index;

pub use index::{ManifestIndex, PutOutcome};
