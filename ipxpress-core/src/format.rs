//! Image formats understood by the service.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Content type used for responses that return the origin bytes verbatim.
pub const PASSTHROUGH_CONTENT_TYPE: &str = "application/octet-stream";

/// Output/input image format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Jpeg,
    Png,
    Gif,
    Webp,
    Avif,
}

impl Format {
    pub const ALL: [Format; 5] = [
        Format::Jpeg,
        Format::Png,
        Format::Gif,
        Format::Webp,
        Format::Avif,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Jpeg => "jpeg",
            Format::Png => "png",
            Format::Gif => "gif",
            Format::Webp => "webp",
            Format::Avif => "avif",
        }
    }

    /// MIME type for this format.
    pub fn content_type(&self) -> &'static str {
        match self {
            Format::Jpeg => "image/jpeg",
            Format::Png => "image/png",
            Format::Gif => "image/gif",
            Format::Webp => "image/webp",
            Format::Avif => "image/avif",
        }
    }

    /// Parse a user-supplied format name. `jpg` is accepted as an alias.
    /// Returns `None` for empty or unknown names.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Some(Format::Jpeg),
            "png" => Some(Format::Png),
            "gif" => Some(Format::Gif),
            "webp" => Some(Format::Webp),
            "avif" => Some(Format::Avif),
            _ => None,
        }
    }

    /// Sniff the format from the leading magic bytes.
    ///
    /// At least 12 bytes are required; shorter inputs are never recognised.
    pub fn detect(data: &[u8]) -> Option<Self> {
        if data.len() < 12 {
            return None;
        }

        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Format::Jpeg);
        }
        if data.starts_with(&[0x89, b'P', b'N', b'G']) {
            return Some(Format::Png);
        }
        if data.starts_with(b"GIF") {
            return Some(Format::Gif);
        }
        if &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            return Some(Format::Webp);
        }
        if &data[4..8] == b"ftyp" && (&data[8..12] == b"avif" || &data[8..12] == b"avis") {
            return Some(Format::Avif);
        }

        None
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
