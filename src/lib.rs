//! postflow - Asynchronous Batched Post Archiver
//!
//! Ingests an unbounded stream of social posts and durably persists a
//! deduplicated, typed record of each one, batching writes for throughput
//! and guaranteeing no loss of accepted data on shutdown.
//!
//! # Architecture
//!
//! ```text
//! EventSource → decode_event → EventSink (unbounded channel)
//!     ↓
//! writer task (single consumer, keyed backlog, threshold flush)
//!     ↓
//! TableStore (posts.jsonl) → TableStore (authors.jsonl)
//! ```
//!
//! Exactly two contexts touch the data: the source delivery context, which
//! decodes and enqueues without blocking, and the writer task, which alone
//! owns the backlog and the table stores. `ArchiveEngine` controls the
//! writer's lifecycle; a `ShutdownToken` threads cooperative cancellation
//! through both loops.

pub mod backoff;
pub mod config;
pub mod decoder;
pub mod engine;
pub mod listener;
pub mod records;
pub mod shutdown;
pub mod source;
pub mod store;
pub mod writer;

pub use config::{EngineConfig, Mode, DEFAULT_BACKLOG_SZ};
pub use decoder::{decode_event, DecodedRecord, RawAuthor, RawPost};
pub use engine::{ArchiveEngine, EngineError, AUTHORS_FILE, POSTS_FILE};
pub use listener::EventSink;
pub use records::{AuthorRecord, Keyed, PostRecord, UNKNOWN_FIELD};
pub use shutdown::{shutdown_pair, ShutdownHandle, ShutdownToken};
pub use source::{run_source_loop, EventSource, JsonlEventSource, SourceOutcome};
pub use store::{StoreError, TableStore};
pub use writer::WriterStats;
