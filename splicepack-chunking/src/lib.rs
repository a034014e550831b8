//! # Splicepack Chunking
//!
//! Cue alignment across parallel media streams.
//!
//! Ad-break signals name a splice time, but every rendition of a program has
//! to cut at the same instant, and video can only cut cleanly at a GOP
//! boundary. This crate receives samples from N input streams plus inbound
//! SCTE-35 events, promotes each ad-break boundary to the nearest video key
//! frame, and re-emits samples and aligned [`CueEvent`]s downstream in the
//! correct order on every stream.
//!
//! # Key components
//!
//! - [`CueAlignmentHandler`] - the multi-stream alignment stage
//! - [`SyncPointQueue`] - the shared queue of future sync points
//! - [`StreamSink`] - the downstream seam the handler dispatches into
//!
//! Per-stream state is owned exclusively by the handler; the sync-point
//! queue is the only shared mutable structure and is safe to feed from
//! another thread behind an `Arc`.

pub mod cue;
pub mod error;
pub mod handler;
pub mod sync_queue;

pub use cue::{CueEvent, CueEventType, StreamData, StreamPayload};
pub use error::{ChunkingError, Result};
pub use handler::{CueAlignmentHandler, StreamSink};
pub use sync_queue::SyncPointQueue;
