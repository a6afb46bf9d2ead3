//! Time/version codec
//!
//! Every comparison the store makes between versions, `date_added` values
//! and `added_after` bounds goes through [`VersionKey`], so manifest
//! ordering, filter predicates and "latest version" queries agree.
//!
//! Precision is one microsecond.

mod codec;
mod key;

pub use codec::{format_timestamp, parse_timestamp, parse_version, to_timestamp, to_version};
pub use key::VersionKey;
