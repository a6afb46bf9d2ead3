//! Observability for the store
//!
//! - Structured logging (JSON, one line per event, sorted fields)
//! - Typed lifecycle and request events
//! - Counter metrics
//!
//! Nothing here is global: a [`Logger`] and a [`MetricsRegistry`] are
//! created by whoever opens the store and handed to the backend facade,
//! which keeps them for its lifetime.
//!
//! ```ignore
//! let (logger, capture) = Logger::capture();
//! logger.event(Event::BootStart, &[("engine", "memory")]);
//! assert!(capture.contains_event("BOOT_START"));
//! ```

mod events;
mod logger;
mod metrics;

pub use events::Event;
pub use logger::{LogCapture, Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
