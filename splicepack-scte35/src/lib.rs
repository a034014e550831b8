//! # Splicepack SCTE-35
//!
//! ANSI/SCTE-35 splice information section support for the splicepack HLS
//! packaging library.
//!
//! This crate decodes the bit-packed splice_info_section() format carried in
//! MPEG-2 transport streams and turns it into typed splice events for the
//! cue-alignment stage:
//!
//! - [`SpliceInfoSection`] - the full parsed section with its command and
//!   segmentation descriptors; parse and serialize are both bit-exact.
//! - [`SectionDecoder`] - pointer-field framing for raw TS packet payloads.
//! - [`Scte35Event`] - the pipeline-facing event (splice PTS, duration,
//!   classifying descriptor).
//!
//! Only splice_insert (type 5) and time_signal (type 6) commands are
//! accepted; anything else is rejected with
//! [`Scte35Error::UnsupportedCommand`].

pub mod decoder;
pub mod error;
pub mod event;
pub mod section;

pub use decoder::SectionDecoder;
pub use error::{Result, Scte35Error};
pub use event::Scte35Event;
pub use section::{
    calculate_crc32, BreakDuration, DeliveryRestrictions, SegmentationComponent,
    SegmentationDescriptor, SegmentationUpid, SpliceCommand, SpliceInfoSection, SpliceInsert,
    SpliceInsertComponent, SpliceTime, MAX_SEGMENTATION_DESCRIPTORS, SPLICE_COMMAND_INSERT,
    SPLICE_COMMAND_TIME_SIGNAL, SPLICE_DESCRIPTOR_IDENTIFIER,
};
