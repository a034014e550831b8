//! Section-data framing for SCTE-35 payloads.
//!
//! Transport-stream packets deliver section data behind a pointer field when
//! the payload-unit-start indicator is set. This decoder skips the framing
//! and hands complete sections to the parser.

use splicepack_core::BitstreamError;
use tracing::debug;

use crate::error::{Result, Scte35Error};
use crate::section::SpliceInfoSection;

/// Decodes splice information sections out of TS packet payloads.
#[derive(Debug, Default)]
pub struct SectionDecoder {
    verify_crc: bool,
    last_section: Option<SpliceInfoSection>,
}

impl SectionDecoder {
    /// Create a decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable CRC-32 verification on every decoded section.
    pub fn with_crc_verification(mut self) -> Self {
        self.verify_crc = true;
        self
    }

    /// Feed one packet payload.
    ///
    /// Payloads without the payload-unit-start indicator are partial section
    /// data and are ignored; a payload with the indicator set is expected to
    /// carry a complete section after its pointer field.
    pub fn decode(
        &mut self,
        payload_unit_start: bool,
        payload: &[u8],
    ) -> Result<Option<&SpliceInfoSection>> {
        if !payload_unit_start {
            debug!("ignoring partial section payload");
            return Ok(None);
        }

        self.reset();

        let Some(&pointer) = payload.first() else {
            return Err(Scte35Error::Truncated(BitstreamError::UnexpectedEnd));
        };
        let offset = 1 + pointer as usize;
        if payload.len() <= offset {
            return Err(Scte35Error::Truncated(BitstreamError::UnexpectedEnd));
        }

        let section = if self.verify_crc {
            SpliceInfoSection::parse_and_verify(&payload[offset..])?
        } else {
            SpliceInfoSection::parse(&payload[offset..])?
        };
        self.last_section = Some(section);
        Ok(self.last_section.as_ref())
    }

    /// The most recently decoded section.
    pub fn last_section(&self) -> Option<&SpliceInfoSection> {
        self.last_section.as_ref()
    }

    /// Drop the last decoded section.
    pub fn reset(&mut self) {
        self.last_section = None;
    }

    /// Flush the decoder, clearing any held section.
    pub fn flush(&mut self) {
        self.last_section = None;
    }
}
