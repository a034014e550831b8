//! Playlist tag building.
//!
//! HLS tags carry a positional value and/or a key=value attribute list. The
//! first field after the tag name is separated by `:`, subsequent fields by
//! `,`; `EXT-X-SIGNAL-SPAN` additionally attaches `/duration` to its
//! positional value.

use std::fmt::Write;

/// Incremental builder for one playlist tag line.
#[derive(Debug)]
pub struct Tag {
    buffer: String,
    fields: usize,
}

impl Tag {
    /// Start a tag with its name (including the leading `#`).
    pub fn new(name: &str) -> Self {
        Self {
            buffer: name.to_string(),
            fields: 0,
        }
    }

    fn separator(&mut self) {
        self.buffer.push(if self.fields == 0 { ':' } else { ',' });
        self.fields += 1;
    }

    /// Append a bare positional value, rendered with three decimals.
    pub fn add_value(&mut self, value: f64) -> &mut Self {
        self.separator();
        let _ = write!(self.buffer, "{value:.3}");
        self
    }

    /// Attach `/value` to the previous positional value.
    pub fn add_of_value(&mut self, value: f64) -> &mut Self {
        let _ = write!(self.buffer, "/{value:.3}");
        self
    }

    /// Append `key=value` with an unquoted string value.
    pub fn add_string(&mut self, key: &str, value: &str) -> &mut Self {
        self.separator();
        let _ = write!(self.buffer, "{key}={value}");
        self
    }

    /// Append `key="value"`.
    pub fn add_quoted_string(&mut self, key: &str, value: &str) -> &mut Self {
        self.separator();
        let _ = write!(self.buffer, "{key}=\"{value}\"");
        self
    }

    /// Append `key=value` with a numeric value.
    pub fn add_number(&mut self, key: &str, value: u64) -> &mut Self {
        self.separator();
        let _ = write!(self.buffer, "{key}={value}");
        self
    }

    /// Append `key="left<sep>right"`, as used by BYTERANGE attributes.
    pub fn add_quoted_number_pair(
        &mut self,
        key: &str,
        left: u64,
        separator: char,
        right: u64,
    ) -> &mut Self {
        self.separator();
        let _ = write!(self.buffer, "{key}=\"{left}{separator}{right}\"");
        self
    }

    /// Finish the tag, returning the rendered line.
    pub fn finish(self) -> String {
        self.buffer
    }
}
