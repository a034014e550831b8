//! HLS playlist error types.

use thiserror::Error;

/// Errors raised while building or writing media playlists.
#[derive(Error, Debug)]
pub enum HlsError {
    /// The media info carries no usable time scale; the stream is rejected.
    #[error("Media info does not contain a valid timescale")]
    BadMediaInfo,

    /// Playlist file I/O failed. The previous playlist stays intact since
    /// writes go through an atomic rename.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid playlist parameters.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// An operation referenced a stream that was never registered.
    #[error("Unknown stream id {0}")]
    UnknownStream(u32),
}

/// Result type alias for playlist operations.
pub type Result<T> = std::result::Result<T, HlsError>;
