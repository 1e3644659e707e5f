//! Project note synchronization engine.
//!
//! One run flows leaf-first through the pipeline: raw note text → parser →
//! entry records → aggregator (filtered by the date range filter) →
//! statistics → table renderer → markdown fragment → content merger →
//! merged text → backup & atomic writer → persisted note.
//!
//! The engine exposes a two-phase protocol: [`SyncEngine::prepare`] reads
//! and computes everything without side effects, the host decides whether
//! to call [`SyncEngine::commit`].

pub mod aggregate;
pub mod error;
pub mod filter;
pub mod merge;
pub mod parser;
pub mod pipeline;
pub mod render;
pub mod vault;
pub mod writer;


pub use error::{Result, SyncError};
pub use filter::ResolvedRange;
pub use merge::{GENERATED_BEGIN_PREFIX, GENERATED_END, MergeOutcome};
pub use pipeline::{CancelFlag, PreviewResult, RunOutcome, SyncEngine, SyncRequest};
pub use vault::FsVault;
pub use writer::{AtomicNoteWriter, WriterPhase, WriterReport};
