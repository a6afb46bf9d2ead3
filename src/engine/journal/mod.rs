//! Append-only journals backing the file engine
//!
//! Record format:
//!
//! ```text
//! +------------------+
//! | Record Length    | (u32 LE, whole record)
//! +------------------+
//! | Operation        | (JSON-encoded JournalOp)
//! +------------------+
//! | Checksum         | (u32 LE, CRC32 of length + operation)
//! +------------------+
//! ```
//!
//! Every append is followed by `sync_all`. Every read verifies the checksum;
//! a mismatch or a truncated tail is reported as corruption and stops
//! startup.

mod checksum;
mod reader;
mod record;
mod writer;

pub use reader::JournalReader;
pub use record::{JournalOp, JournalRecord};
pub use writer::JournalWriter;
