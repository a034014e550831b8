//! # Splicepack Core
//!
//! Shared primitives for the splicepack HLS packaging library.
//!
//! This crate carries the pieces every other splicepack crate builds on:
//!
//! - **Bitstream access**: [`BitReader`] / [`BitWriter`] for the bit-packed
//!   section formats (SCTE-35 splice information sections).
//! - **Time scales**: [`TimeScale`] conversions between stream clock units
//!   and seconds, plus the MPEG 90 kHz constant.
//! - **Stream model**: [`StreamInfo`], [`MediaSample`], [`TextSample`], the
//!   packager-side view of elementary streams.
//! - **Errors**: the core [`Error`] hierarchy.

pub mod bitstream;
pub mod error;
pub mod stream;
pub mod time;

pub use bitstream::{BitReader, BitWriter};
pub use error::{BitstreamError, Error, Result};
pub use stream::{MediaSample, StreamInfo, StreamType, TextSample};
pub use time::{TimeScale, MPEG_TIMESCALE};
