//! Backend facade
//!
//! [`Backend`] composes the registries, the manifest index and the object
//! store behind one handle. Queries go through the manifest first; object
//! bodies are fetched for the rows it selects. Writes record object and
//! manifest entry as one unit per object.
//!
//! # Unknown collections
//!
//! Reads against an unknown API root or collection return empty results.
//! Writes return `NotFound`.

mod facade;
mod outcome;

pub use facade::{Backend, LISTING_FILTERS, OBJECT_FILTERS, VERSION_FILTERS};
pub use outcome::{AddOutcome, OutcomeStatus, ReportStatus, StatusReport};
