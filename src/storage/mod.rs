//! Persistence for readings, inference results and maintenance events
//!
//! Backends implement [`PersistenceSink`]. [`open_sink`] builds the
//! configured stack: sled wrapped in a [`FallbackSink`], or memory only.

pub mod fallback;
pub mod lockfile;
pub mod memory;
pub mod persistence;
pub mod sled_store;

pub use fallback::{open_sink, FallbackSink};
pub use lockfile::ProcessLock;
pub use memory::InMemorySink;
pub use persistence::{HistoryQuery, PersistenceError, PersistenceSink, SinkStats};
pub use sled_store::SledSink;
