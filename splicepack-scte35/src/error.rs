//! SCTE-35 error types.

use splicepack_core::BitstreamError;
use thiserror::Error;

/// Errors produced while decoding a splice information section.
#[derive(Error, Debug)]
pub enum Scte35Error {
    /// The section ended before a field could be read.
    #[error("Truncated section: {0}")]
    Truncated(#[from] BitstreamError),

    /// Only splice_insert (5) and time_signal (6) commands are supported.
    #[error("Unsupported splice command type {0}")]
    UnsupportedCommand(u8),

    /// More segmentation descriptors than the retention limit.
    #[error("Too many segmentation descriptors: {0}")]
    TooManyDescriptors(usize),

    /// The descriptor loop did not consume exactly descriptor_loop_length bytes.
    #[error("Descriptor loop mismatch: {0} bytes remaining")]
    DescriptorLoopMismatch(i64),

    /// The section CRC does not match the computed value.
    #[error("Bad CRC: expected {expected:#010x}, computed {computed:#010x}")]
    BadCrc { expected: u32, computed: u32 },

    /// A splice time was required but not present in the command.
    #[error("Splice command carries no splice time")]
    MissingSpliceTime,
}

impl From<splicepack_core::Error> for Scte35Error {
    fn from(err: splicepack_core::Error) -> Self {
        match err {
            splicepack_core::Error::Bitstream(e) => Scte35Error::Truncated(e),
            other => Scte35Error::Truncated(BitstreamError::Other(other.to_string())),
        }
    }
}

/// Result type alias for SCTE-35 operations.
pub type Result<T> = std::result::Result<T, Scte35Error>;
