//! SCTE-35 splice information section model, parser and serializer.
//!
//! Implements the binary splice_info_section() format of ANSI/SCTE 35 as
//! carried in MPEG-2 transport streams. Only the splice_insert (type 5) and
//! time_signal (type 6) commands are accepted; segmentation descriptors
//! (tag 0x02) are parsed fully, all other descriptors are skipped.

use splicepack_core::{BitReader, BitWriter};
use tracing::warn;

use crate::error::{Result, Scte35Error};

/// Splice command type value for splice_insert().
pub const SPLICE_COMMAND_INSERT: u8 = 5;
/// Splice command type value for time_signal().
pub const SPLICE_COMMAND_TIME_SIGNAL: u8 = 6;

/// Descriptor tag for segmentation_descriptor().
pub const SEGMENTATION_DESCRIPTOR_TAG: u8 = 0x02;

/// The "CUEI" identifier carried by SCTE-35 descriptors.
pub const SPLICE_DESCRIPTOR_IDENTIFIER: u32 = 0x4355_4549;

/// Maximum number of segmentation descriptors retained per section.
pub const MAX_SEGMENTATION_DESCRIPTORS: usize = 8;

/// CRC-32 polynomial used for MPEG sections (ISO/IEC 13818-1).
const CRC32_POLY: u32 = 0x04C11DB7;

/// Pre-computed CRC-32 table.
static CRC32_TABLE: [u32; 256] = {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u32) << 24;
        let mut j = 0;
        while j < 8 {
            if crc & 0x80000000 != 0 {
                crc = (crc << 1) ^ CRC32_POLY;
            } else {
                crc <<= 1;
            }
            j += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
};

/// Calculate CRC-32 for MPEG sections.
pub fn calculate_crc32(data: &[u8]) -> u32 {
    let mut crc = 0xFFFFFFFF;
    for &byte in data {
        let index = ((crc >> 24) ^ (byte as u32)) as usize;
        crc = (crc << 8) ^ CRC32_TABLE[index];
    }
    crc
}

/// splice_time(): an optional 33-bit presentation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpliceTime {
    /// 33-bit PTS in the 90 kHz clock, present when time_specified_flag is set.
    pub pts_time: Option<u64>,
}

impl SpliceTime {
    /// A splice time at the given PTS.
    pub fn at(pts_time: u64) -> Self {
        Self {
            pts_time: Some(pts_time),
        }
    }

    /// An immediate splice (no time specified).
    pub fn immediate() -> Self {
        Self { pts_time: None }
    }

    fn parse(reader: &mut BitReader<'_>) -> Result<Self> {
        let time_specified = reader.read_bit().map_err(Scte35Error::from)?;
        if time_specified {
            reader.read_bits(6).map_err(Scte35Error::from)?;
            let pts_time = reader.read_bits_u64(33).map_err(Scte35Error::from)?;
            Ok(Self {
                pts_time: Some(pts_time),
            })
        } else {
            reader.read_bits(7).map_err(Scte35Error::from)?;
            Ok(Self { pts_time: None })
        }
    }

    fn write(&self, writer: &mut BitWriter) {
        match self.pts_time {
            Some(pts) => {
                writer.write_bit(true);
                writer.write_bits(0x3F, 6);
                writer.write_bits_u64(pts & 0x1_FFFF_FFFF, 33);
            }
            None => {
                writer.write_bit(false);
                writer.write_bits(0x7F, 7);
            }
        }
    }
}

/// break_duration(): how long a splice break lasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakDuration {
    /// Whether the splice device should return automatically at the end.
    pub auto_return: bool,
    /// 33-bit duration in the 90 kHz clock.
    pub duration: u64,
}

impl BreakDuration {
    fn parse(reader: &mut BitReader<'_>) -> Result<Self> {
        let auto_return = reader.read_bit().map_err(Scte35Error::from)?;
        reader.read_bits(6).map_err(Scte35Error::from)?;
        let duration = reader.read_bits_u64(33).map_err(Scte35Error::from)?;
        Ok(Self {
            auto_return,
            duration,
        })
    }

    fn write(&self, writer: &mut BitWriter) {
        writer.write_bit(self.auto_return);
        writer.write_bits(0x3F, 6);
        writer.write_bits_u64(self.duration & 0x1_FFFF_FFFF, 33);
    }
}

/// Per-component entry of a component-mode splice_insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpliceInsertComponent {
    /// Elementary stream component tag.
    pub component_tag: u8,
    /// Component splice time, absent when the splice is immediate.
    pub splice_time: Option<SpliceTime>,
}

/// splice_insert() command body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpliceInsert {
    /// Splice event identifier.
    pub event_id: u32,
    /// Cancels a previously sent event with the same id.
    pub cancel: bool,
    /// Signals the start (true) or end (false) of a break.
    pub out_of_network: bool,
    /// Program-level splice (true) vs. component-level (false).
    pub program_splice: bool,
    /// Splice at the earliest opportunity instead of at a signalled time.
    pub splice_immediate: bool,
    /// Program splice time; present when program_splice and not immediate.
    pub splice_time: Option<SpliceTime>,
    /// Component splice entries; present when not program_splice.
    pub components: Vec<SpliceInsertComponent>,
    /// Break duration; present when duration_flag is set.
    pub break_duration: Option<BreakDuration>,
    /// Identifies the program the splice applies to.
    pub unique_program_id: u16,
    /// Avail number within the break.
    pub avail_num: u8,
    /// Expected avail count for the break.
    pub avails_expected: u8,
}

impl SpliceInsert {
    fn parse(reader: &mut BitReader<'_>) -> Result<Self> {
        let event_id = reader.read_u32().map_err(Scte35Error::from)?;
        let cancel = reader.read_bit().map_err(Scte35Error::from)?;
        reader.read_bits(7).map_err(Scte35Error::from)?;

        let mut insert = Self {
            event_id,
            cancel,
            out_of_network: false,
            program_splice: false,
            splice_immediate: false,
            splice_time: None,
            components: Vec::new(),
            break_duration: None,
            unique_program_id: 0,
            avail_num: 0,
            avails_expected: 0,
        };

        if cancel {
            return Ok(insert);
        }

        insert.out_of_network = reader.read_bit().map_err(Scte35Error::from)?;
        insert.program_splice = reader.read_bit().map_err(Scte35Error::from)?;
        let duration_flag = reader.read_bit().map_err(Scte35Error::from)?;
        insert.splice_immediate = reader.read_bit().map_err(Scte35Error::from)?;
        reader.read_bits(4).map_err(Scte35Error::from)?;

        if insert.program_splice && !insert.splice_immediate {
            insert.splice_time = Some(SpliceTime::parse(reader)?);
        }

        if !insert.program_splice {
            let component_count = reader.read_u8().map_err(Scte35Error::from)?;
            for _ in 0..component_count {
                let component_tag = reader.read_u8().map_err(Scte35Error::from)?;
                let splice_time = if insert.splice_immediate {
                    None
                } else {
                    Some(SpliceTime::parse(reader)?)
                };
                insert.components.push(SpliceInsertComponent {
                    component_tag,
                    splice_time,
                });
            }
        }

        if duration_flag {
            insert.break_duration = Some(BreakDuration::parse(reader)?);
        }

        insert.unique_program_id = reader.read_u16().map_err(Scte35Error::from)?;
        insert.avail_num = reader.read_u8().map_err(Scte35Error::from)?;
        insert.avails_expected = reader.read_u8().map_err(Scte35Error::from)?;

        Ok(insert)
    }

    fn write(&self, writer: &mut BitWriter) {
        writer.write_bits(self.event_id, 32);
        writer.write_bit(self.cancel);
        writer.write_bits(0x7F, 7);
        if self.cancel {
            return;
        }

        writer.write_bit(self.out_of_network);
        writer.write_bit(self.program_splice);
        writer.write_bit(self.break_duration.is_some());
        writer.write_bit(self.splice_immediate);
        writer.write_bits(0xF, 4);

        if self.program_splice && !self.splice_immediate {
            self.splice_time.unwrap_or_default().write(writer);
        }

        if !self.program_splice {
            writer.write_bits(self.components.len() as u32, 8);
            for component in &self.components {
                writer.write_bits(component.component_tag as u32, 8);
                if !self.splice_immediate {
                    component.splice_time.unwrap_or_default().write(writer);
                }
            }
        }

        if let Some(break_duration) = &self.break_duration {
            break_duration.write(writer);
        }

        writer.write_bits(self.unique_program_id as u32, 16);
        writer.write_bits(self.avail_num as u32, 8);
        writer.write_bits(self.avails_expected as u32, 8);
    }
}

/// The splice command carried by a section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpliceCommand {
    /// splice_insert(): explicit break start/end signalling.
    SpliceInsert(SpliceInsert),
    /// time_signal(): a bare splice time qualified by descriptors.
    TimeSignal(SpliceTime),
}

impl SpliceCommand {
    /// The wire value of the command type.
    pub fn command_type(&self) -> u8 {
        match self {
            SpliceCommand::SpliceInsert(_) => SPLICE_COMMAND_INSERT,
            SpliceCommand::TimeSignal(_) => SPLICE_COMMAND_TIME_SIGNAL,
        }
    }

    /// The splice presentation time signalled by the command, if any.
    pub fn splice_pts(&self) -> Option<u64> {
        match self {
            SpliceCommand::SpliceInsert(insert) => {
                insert.splice_time.and_then(|time| time.pts_time)
            }
            SpliceCommand::TimeSignal(time) => time.pts_time,
        }
    }

    fn write(&self, writer: &mut BitWriter) {
        match self {
            SpliceCommand::SpliceInsert(insert) => insert.write(writer),
            SpliceCommand::TimeSignal(time) => time.write(writer),
        }
    }
}

/// Delivery restriction flags of a segmentation descriptor.
///
/// Each of the named flags is a single bit on the wire;
/// device_restrictions is a 2-bit field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryRestrictions {
    /// Content may be delivered over the web.
    pub web_delivery_allowed: bool,
    /// No regional blackout applies.
    pub no_regional_blackout: bool,
    /// Recording for archive is allowed.
    pub archive_allowed: bool,
    /// 2-bit device restriction group.
    pub device_restrictions: u8,
}

/// Type-tagged unique program identifier payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SegmentationUpid {
    /// UPID type tag.
    pub upid_type: u8,
    /// Raw UPID bytes (at most 255, bounded by the 8-bit length field).
    pub data: Vec<u8>,
}

/// Per-component PTS offset of a component-mode segmentation descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentationComponent {
    /// Elementary stream component tag.
    pub component_tag: u8,
    /// 33-bit PTS offset for this component.
    pub pts_offset: u64,
}

/// segmentation_descriptor(): classifies the splice and carries the UPID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentationDescriptor {
    /// Descriptor identifier, normally "CUEI".
    pub identifier: u32,
    /// Segmentation event identifier.
    pub event_id: u32,
    /// Cancels a previously sent event with the same id.
    pub cancel: bool,
    /// Delivery restrictions; `None` when delivery is not restricted.
    pub restrictions: Option<DeliveryRestrictions>,
    /// Component PTS offsets; `None` for program-level segmentation.
    pub components: Option<Vec<SegmentationComponent>>,
    /// 40-bit segmentation duration in the 90 kHz clock, if signalled.
    pub duration: Option<u64>,
    /// Unique program identifier.
    pub upid: SegmentationUpid,
    /// Segmentation type (0x30/0x32/0x34/0x36 start, 0x31/0x33/0x35/0x37 end).
    pub segmentation_type_id: u8,
    /// Segment number within the event.
    pub segment_num: u8,
    /// Expected segment count for the event.
    pub segments_expected: u8,
    /// Sub-segment number for types 0x34/0x36. Not read from the wire; see
    /// the provider-ad-start profile note in the parser.
    pub sub_segment_num: Option<u8>,
    /// Expected sub-segment count for types 0x34/0x36. Not read from the wire.
    pub sub_segments_expected: Option<u8>,
}

impl SegmentationDescriptor {
    /// Whether this descriptor starts an ad break.
    pub fn is_start_event(&self) -> bool {
        matches!(self.segmentation_type_id, 0x30 | 0x32 | 0x34 | 0x36)
    }

    /// Whether this descriptor ends an ad break.
    pub fn is_end_event(&self) -> bool {
        matches!(self.segmentation_type_id, 0x31 | 0x33 | 0x35 | 0x37)
    }

    fn parse(reader: &mut BitReader<'_>, identifier: u32) -> Result<Self> {
        let event_id = reader.read_u32().map_err(Scte35Error::from)?;
        let cancel = reader.read_bit().map_err(Scte35Error::from)?;
        reader.read_bits(7).map_err(Scte35Error::from)?;

        let mut descriptor = Self {
            identifier,
            event_id,
            cancel,
            restrictions: None,
            components: None,
            duration: None,
            upid: SegmentationUpid::default(),
            segmentation_type_id: 0,
            segment_num: 0,
            segments_expected: 0,
            sub_segment_num: None,
            sub_segments_expected: None,
        };

        if cancel {
            return Ok(descriptor);
        }

        let program_segmentation = reader.read_bit().map_err(Scte35Error::from)?;
        let duration_flag = reader.read_bit().map_err(Scte35Error::from)?;
        let delivery_not_restricted = reader.read_bit().map_err(Scte35Error::from)?;

        if !delivery_not_restricted {
            descriptor.restrictions = Some(DeliveryRestrictions {
                web_delivery_allowed: reader.read_bit().map_err(Scte35Error::from)?,
                no_regional_blackout: reader.read_bit().map_err(Scte35Error::from)?,
                archive_allowed: reader.read_bit().map_err(Scte35Error::from)?,
                device_restrictions: reader.read_bits(2).map_err(Scte35Error::from)? as u8,
            });
        } else {
            reader.read_bits(5).map_err(Scte35Error::from)?;
        }

        if !program_segmentation {
            let component_count = reader.read_u8().map_err(Scte35Error::from)?;
            let mut components = Vec::with_capacity(component_count as usize);
            for _ in 0..component_count {
                let component_tag = reader.read_u8().map_err(Scte35Error::from)?;
                reader.read_bits(7).map_err(Scte35Error::from)?;
                let pts_offset = reader.read_bits_u64(33).map_err(Scte35Error::from)?;
                components.push(SegmentationComponent {
                    component_tag,
                    pts_offset,
                });
            }
            descriptor.components = Some(components);
        }

        if duration_flag {
            descriptor.duration = Some(reader.read_bits_u64(40).map_err(Scte35Error::from)?);
        }

        descriptor.upid.upid_type = reader.read_u8().map_err(Scte35Error::from)?;
        let upid_length = reader.read_u8().map_err(Scte35Error::from)?;
        let mut data = Vec::with_capacity(upid_length as usize);
        for _ in 0..upid_length {
            data.push(reader.read_u8().map_err(Scte35Error::from)?);
        }
        descriptor.upid.data = data;

        descriptor.segmentation_type_id = reader.read_u8().map_err(Scte35Error::from)?;
        descriptor.segment_num = reader.read_u8().map_err(Scte35Error::from)?;
        descriptor.segments_expected = reader.read_u8().map_err(Scte35Error::from)?;

        // Provider-ad-start types 0x34/0x36 define sub_segment_num and
        // sub_segments_expected, but signals in the field routinely omit
        // them; reading the two bytes here would break the descriptor loop
        // accounting for those streams, so the fields stay None.

        Ok(descriptor)
    }

    fn write_body(&self, writer: &mut BitWriter) {
        writer.write_bits(self.event_id, 32);
        writer.write_bit(self.cancel);
        writer.write_bits(0x7F, 7);
        if self.cancel {
            return;
        }

        writer.write_bit(self.components.is_none());
        writer.write_bit(self.duration.is_some());
        writer.write_bit(self.restrictions.is_none());
        match &self.restrictions {
            Some(flags) => {
                writer.write_bit(flags.web_delivery_allowed);
                writer.write_bit(flags.no_regional_blackout);
                writer.write_bit(flags.archive_allowed);
                writer.write_bits(flags.device_restrictions as u32 & 0x3, 2);
            }
            None => writer.write_bits(0x1F, 5),
        }

        if let Some(components) = &self.components {
            writer.write_bits(components.len() as u32, 8);
            for component in components {
                writer.write_bits(component.component_tag as u32, 8);
                writer.write_bits(0x7F, 7);
                writer.write_bits_u64(component.pts_offset & 0x1_FFFF_FFFF, 33);
            }
        }

        if let Some(duration) = self.duration {
            writer.write_bits_u64(duration & 0xFF_FFFF_FFFF, 40);
        }

        writer.write_bits(self.upid.upid_type as u32, 8);
        writer.write_bits(self.upid.data.len() as u32, 8);
        for &byte in &self.upid.data {
            writer.write_bits(byte as u32, 8);
        }

        writer.write_bits(self.segmentation_type_id as u32, 8);
        writer.write_bits(self.segment_num as u32, 8);
        writer.write_bits(self.segments_expected as u32, 8);
    }
}

/// One parsed splice_info_section().
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpliceInfoSection {
    /// Table identifier, 0xFC for SCTE-35.
    pub table_id: u8,
    /// section_syntax_indicator bit (0 for SCTE-35).
    pub section_syntax_indicator: bool,
    /// private_indicator bit.
    pub private_indicator: bool,
    /// Section length as carried on the wire.
    pub section_length: u16,
    /// SCTE-35 protocol version (0).
    pub protocol_version: u8,
    /// Whether the trailing part of the section is encrypted.
    pub encrypted_packet: bool,
    /// Encryption algorithm identifier.
    pub encryption_algorithm: u8,
    /// 33-bit offset added to every PTS in the section.
    pub pts_adjustment: u64,
    /// Control word index for encrypted sections.
    pub cw_index: u8,
    /// 12-bit authorization tier.
    pub tier: u16,
    /// Splice command length as carried on the wire.
    pub splice_command_length: u16,
    /// The parsed splice command.
    pub command: SpliceCommand,
    /// Retained segmentation descriptors (at most 8).
    pub descriptors: Vec<SegmentationDescriptor>,
    /// CRC over the encrypted part, present for encrypted sections.
    pub e_crc_32: Option<u32>,
    /// Section CRC-32.
    pub crc_32: u32,
}

impl SpliceInfoSection {
    /// Parse one section from a buffer starting at table_id.
    ///
    /// The buffer must contain at least `section_length + 3` bytes. The CRC
    /// is carried through unverified; use [`SpliceInfoSection::parse_and_verify`]
    /// to reject sections with a bad CRC.
    pub fn parse(data: &[u8]) -> Result<Self> {
        Self::parse_inner(data, false)
    }

    /// Parse one section and verify its CRC-32.
    pub fn parse_and_verify(data: &[u8]) -> Result<Self> {
        Self::parse_inner(data, true)
    }

    fn parse_inner(data: &[u8], verify_crc: bool) -> Result<Self> {
        let mut reader = BitReader::new(data);

        let table_id = reader.read_u8().map_err(Scte35Error::from)?;
        let section_syntax_indicator = reader.read_bit().map_err(Scte35Error::from)?;
        let private_indicator = reader.read_bit().map_err(Scte35Error::from)?;
        reader.read_bits(2).map_err(Scte35Error::from)?;
        let section_length = reader.read_bits(12).map_err(Scte35Error::from)? as u16;
        let protocol_version = reader.read_u8().map_err(Scte35Error::from)?;
        let encrypted_packet = reader.read_bit().map_err(Scte35Error::from)?;
        let encryption_algorithm = reader.read_bits(6).map_err(Scte35Error::from)? as u8;
        let pts_adjustment = reader.read_bits_u64(33).map_err(Scte35Error::from)?;
        let cw_index = reader.read_u8().map_err(Scte35Error::from)?;
        let tier = reader.read_bits(12).map_err(Scte35Error::from)? as u16;
        let splice_command_length = reader.read_bits(12).map_err(Scte35Error::from)? as u16;
        let splice_command_type = reader.read_u8().map_err(Scte35Error::from)?;

        let command = match splice_command_type {
            SPLICE_COMMAND_INSERT => SpliceCommand::SpliceInsert(SpliceInsert::parse(&mut reader)?),
            SPLICE_COMMAND_TIME_SIGNAL => SpliceCommand::TimeSignal(SpliceTime::parse(&mut reader)?),
            other => return Err(Scte35Error::UnsupportedCommand(other)),
        };

        let descriptor_loop_length = reader.read_u16().map_err(Scte35Error::from)?;
        let mut loop_remaining = descriptor_loop_length as i64;
        let mut descriptors = Vec::new();

        while loop_remaining > 0 {
            let descriptor_tag = reader.read_u8().map_err(Scte35Error::from)?;
            let descriptor_length = reader.read_u8().map_err(Scte35Error::from)?;
            let identifier = reader.read_u32().map_err(Scte35Error::from)?;

            if descriptor_tag == SEGMENTATION_DESCRIPTOR_TAG {
                if descriptors.len() == MAX_SEGMENTATION_DESCRIPTORS {
                    return Err(Scte35Error::TooManyDescriptors(descriptors.len() + 1));
                }
                descriptors.push(SegmentationDescriptor::parse(&mut reader, identifier)?);
            } else {
                warn!(
                    tag = descriptor_tag,
                    length = descriptor_length,
                    "skipping unsupported splice descriptor"
                );
                // The identifier has already been consumed.
                let skip = (descriptor_length as usize)
                    .checked_sub(4)
                    .ok_or(Scte35Error::DescriptorLoopMismatch(loop_remaining))?;
                reader.skip_bytes(skip).map_err(Scte35Error::from)?;
            }

            loop_remaining -= descriptor_length as i64 + 2;
        }

        if loop_remaining != 0 {
            return Err(Scte35Error::DescriptorLoopMismatch(loop_remaining));
        }

        let mut e_crc_32 = None;
        if encrypted_packet {
            let total_read = reader.bytes_consumed();
            let section_end = section_length as usize + 3;
            let stuffing = section_end.checked_sub(total_read + 8).ok_or(
                Scte35Error::Truncated(splicepack_core::BitstreamError::UnexpectedEnd),
            )?;
            reader.skip_bytes(stuffing).map_err(Scte35Error::from)?;
            e_crc_32 = Some(reader.read_u32().map_err(Scte35Error::from)?);
        }
        let crc_32 = reader.read_u32().map_err(Scte35Error::from)?;

        if verify_crc {
            let crc_end = section_length as usize + 3;
            if data.len() < crc_end {
                return Err(Scte35Error::Truncated(
                    splicepack_core::BitstreamError::UnexpectedEnd,
                ));
            }
            let computed = calculate_crc32(&data[..crc_end - 4]);
            if computed != crc_32 {
                return Err(Scte35Error::BadCrc {
                    expected: crc_32,
                    computed,
                });
            }
        }

        Ok(Self {
            table_id,
            section_syntax_indicator,
            private_indicator,
            section_length,
            protocol_version,
            encrypted_packet,
            encryption_algorithm,
            pts_adjustment,
            cw_index,
            tier,
            splice_command_length,
            command,
            descriptors,
            e_crc_32,
            crc_32,
        })
    }

    /// Serialize the section to bytes.
    ///
    /// section_length, splice_command_length, descriptor_loop_length and the
    /// CRC are recomputed; the stored values are ignored.
    pub fn serialize(&self) -> Vec<u8> {
        let mut command_writer = BitWriter::new();
        self.command.write(&mut command_writer);
        let command_bytes = command_writer.into_data();

        let mut descriptor_bytes = Vec::new();
        for descriptor in &self.descriptors {
            let mut body = BitWriter::new();
            descriptor.write_body(&mut body);
            let body = body.into_data();

            descriptor_bytes.push(SEGMENTATION_DESCRIPTOR_TAG);
            descriptor_bytes.push((body.len() + 4) as u8);
            descriptor_bytes.extend_from_slice(&descriptor.identifier.to_be_bytes());
            descriptor_bytes.extend_from_slice(&body);
        }

        // Everything after section_length: 11 fixed header bytes, the
        // command, the 2-byte loop length, the descriptors, the optional
        // e_crc, and the 4-byte CRC.
        let e_crc_len = if self.encrypted_packet { 4 } else { 0 };
        let section_length =
            11 + command_bytes.len() + 2 + descriptor_bytes.len() + e_crc_len + 4;

        let mut writer = BitWriter::with_capacity(section_length + 3);
        writer.write_bits(self.table_id as u32, 8);
        writer.write_bit(self.section_syntax_indicator);
        writer.write_bit(self.private_indicator);
        writer.write_bits(0x3, 2);
        writer.write_bits(section_length as u32, 12);
        writer.write_bits(self.protocol_version as u32, 8);
        writer.write_bit(self.encrypted_packet);
        writer.write_bits(self.encryption_algorithm as u32 & 0x3F, 6);
        writer.write_bits_u64(self.pts_adjustment & 0x1_FFFF_FFFF, 33);
        writer.write_bits(self.cw_index as u32, 8);
        writer.write_bits(self.tier as u32 & 0xFFF, 12);
        writer.write_bits(command_bytes.len() as u32, 12);
        writer.write_bits(self.command.command_type() as u32, 8);
        writer.write_bytes(&command_bytes);
        writer.write_bits(descriptor_bytes.len() as u32, 16);
        writer.write_bytes(&descriptor_bytes);
        if self.encrypted_packet {
            writer.write_bits(self.e_crc_32.unwrap_or(0), 32);
        }

        let mut data = writer.into_data();
        let crc = calculate_crc32(&data);
        data.extend_from_slice(&crc.to_be_bytes());
        data
    }
}
