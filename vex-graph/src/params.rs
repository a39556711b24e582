//! Compressor configuration (`spec.md` §6 `set_parameter`, `SPEC_FULL.md` §11).

use vex_core::error::Result;
use vex_core::wire::magic;

/// Typed configuration for a [`crate::compressor::Compressor`] run. Each
/// field corresponds to one `set_parameter` key in `spec.md` §6.
#[derive(Debug, Clone, Copy)]
pub struct Parameters {
    format_version: Option<u16>,
    compression_level: i32,
    decompression_level: i32,
    content_checksum: bool,
    compressed_checksum: bool,
    sticky_parameters: bool,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            // No version is negotiated until a caller sets one; the first
            // compress call on an unset compressor fails with
            // `formatVersion_notSet` rather than silently picking a default.
            format_version: None,
            compression_level: 0,
            decompression_level: 0,
            content_checksum: false,
            compressed_checksum: true,
            sticky_parameters: false,
        }
    }
}

impl Parameters {
    /// Start from the defaults: newest supported format version, no
    /// content checksum, a compressed checksum, and no stickiness.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the format version, validating it against `[MIN, MAX]`.
    pub fn with_format_version(mut self, version: u16) -> Result<Self> {
        magic::validate_version(version)?;
        self.format_version = Some(version);
        Ok(self)
    }

    /// Set the compression effort level (codec-specific meaning).
    pub fn with_compression_level(mut self, level: i32) -> Self {
        self.compression_level = level;
        self
    }

    /// Set the decompression effort level (codec-specific meaning).
    pub fn with_decompression_level(mut self, level: i32) -> Self {
        self.decompression_level = level;
        self
    }

    /// Enable or disable the whole-content checksum.
    pub fn with_content_checksum(mut self, enabled: bool) -> Self {
        self.content_checksum = enabled;
        self
    }

    /// Enable or disable the compressed-frame checksum.
    pub fn with_compressed_checksum(mut self, enabled: bool) -> Self {
        self.compressed_checksum = enabled;
        self
    }

    /// Whether parameters persist across calls on the same compressor
    /// instance rather than resetting to defaults each call.
    pub fn with_sticky_parameters(mut self, sticky: bool) -> Self {
        self.sticky_parameters = sticky;
        self
    }

    /// The configured format version, or `None` if no `with_format_version`
    /// call has set one yet.
    pub fn format_version(&self) -> Option<u16> {
        self.format_version
    }

    /// The configured compression level.
    pub fn compression_level(&self) -> i32 {
        self.compression_level
    }

    /// The configured decompression level.
    pub fn decompression_level(&self) -> i32 {
        self.decompression_level
    }

    /// Whether the content checksum is enabled.
    pub fn content_checksum(&self) -> bool {
        self.content_checksum
    }

    /// Whether the compressed-frame checksum is enabled.
    pub fn compressed_checksum(&self) -> bool {
        self.compressed_checksum
    }

    /// Whether parameters are sticky across calls.
    pub fn sticky_parameters(&self) -> bool {
        self.sticky_parameters
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_format_version() {
        assert!(Parameters::new().with_format_version(0).is_err());
        assert!(Parameters::new().with_format_version(magic::MAX_VERSION + 1).is_err());
    }

    #[test]
    fn defaults_leave_format_version_unset_with_compressed_checksum_only() {
        let p = Parameters::new();
        assert_eq!(p.format_version(), None);
        assert!(p.compressed_checksum());
        assert!(!p.content_checksum());
    }

    #[test]
    fn with_format_version_sets_it() {
        let p = Parameters::new().with_format_version(magic::MAX_VERSION).unwrap();
        assert_eq!(p.format_version(), Some(magic::MAX_VERSION));
    }
}
