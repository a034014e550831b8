//! Adapter from parsed sections to pipeline splice events.

use tracing::warn;

use crate::section::{SegmentationDescriptor, SpliceCommand, SpliceInfoSection};

/// A splice event extracted from one section, ready for cue alignment.
///
/// Times are in the 90 kHz PTS clock. The embedded descriptor classifies the
/// event (ad start vs. ad end) and carries the UPID and delivery flags that
/// end up in the playlist signal tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scte35Event {
    /// Splice point: pts_adjustment + the command's splice time, or the
    /// arrival PTS for immediate splices.
    pub start_time_pts: i64,
    /// Break duration in PTS ticks, 0 when not signalled.
    pub duration: i64,
    /// The segmentation descriptor that classifies this event.
    pub descriptor: SegmentationDescriptor,
}

impl Scte35Event {
    /// Build an event from a parsed section.
    ///
    /// `arrival_pts` is the PCR at section arrival; it stands in as the
    /// splice point for immediate splices that carry no time of their own.
    /// Sections without a segmentation descriptor cannot be classified and
    /// yield `None`.
    pub fn from_section(section: &SpliceInfoSection, arrival_pts: i64) -> Option<Self> {
        let Some(descriptor) = section.descriptors.first() else {
            warn!(
                command_type = section.command.command_type(),
                "splice section carries no segmentation descriptor, dropping"
            );
            return None;
        };

        let start_time_pts = match section.command.splice_pts() {
            Some(pts) => section.pts_adjustment as i64 + pts as i64,
            None => arrival_pts,
        };

        let duration = match &section.command {
            SpliceCommand::SpliceInsert(insert) => {
                insert.break_duration.map(|b| b.duration as i64)
            }
            SpliceCommand::TimeSignal(_) => None,
        }
        .or_else(|| descriptor.duration.map(|d| d as i64))
        .unwrap_or(0);

        Some(Self {
            start_time_pts,
            duration,
            descriptor: descriptor.clone(),
        })
    }

    /// Whether this event starts an ad break.
    pub fn is_start(&self) -> bool {
        self.descriptor.is_start_event()
    }

    /// Whether this event ends an ad break.
    pub fn is_end(&self) -> bool {
        self.descriptor.is_end_event()
    }
}
