//! Chunking and cue-alignment error types.

use thiserror::Error;

/// Errors raised by the cue-alignment stage.
#[derive(Error, Debug)]
pub enum ChunkingError {
    /// A sync point could not be promoted to a key frame; input video
    /// renditions are not GOP-aligned.
    #[error("Streams are not properly GOP-aligned (no promotable sync point at {time}s)")]
    NotGopAligned {
        /// Key-frame time that failed to promote, in seconds.
        time: f64,
    },

    /// A stream buffered more samples than the backpressure bound allows;
    /// the pipeline is not feeding all streams.
    #[error("Stream {stream_index} buffered {buffered} samples, exceeding the limit")]
    Backpressure {
        /// Index of the starved stream's peer.
        stream_index: usize,
        /// Number of samples buffered when the bound tripped.
        buffered: usize,
    },

    /// The sync-point queue was cancelled.
    #[error("Sync point queue is cancelled")]
    Cancelled,

    /// A stream was used before its stream info arrived.
    #[error("Invalid stream: {0}")]
    InvalidStream(String),
}

/// Result type alias for chunking operations.
pub type Result<T> = std::result::Result<T, ChunkingError>;
