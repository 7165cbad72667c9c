//! The validated, canonical set of operations requested for one image.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::format::Format;

/// Quality used when the request does not carry a valid one.
pub const DEFAULT_QUALITY: u8 = 85;

/// How the image is fitted into a `width` x `height` box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fit {
    /// Scale to fit inside the box, preserving aspect ratio.
    #[default]
    Inside,
    /// As `Inside`, then pad to the exact box with the background colour.
    Contain,
    /// Scale to cover the box, then crop the overflow at `position`.
    Cover,
    /// Stretch to the exact box.
    Fill,
    /// Scale to cover the box without cropping.
    Outside,
}

impl Fit {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "inside" => Some(Fit::Inside),
            "contain" => Some(Fit::Contain),
            "cover" => Some(Fit::Cover),
            "fill" => Some(Fit::Fill),
            "outside" => Some(Fit::Outside),
            _ => None,
        }
    }
}

/// Crop gravity for `Fit::Cover`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Position {
    #[default]
    Centre,
    Top,
    Bottom,
    Left,
    Right,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    /// Content-aware strategies; engines without saliency support treat them as `Centre`.
    Entropy,
    Attention,
}

impl Position {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "centre" | "center" => Some(Position::Centre),
            "top" | "north" => Some(Position::Top),
            "bottom" | "south" => Some(Position::Bottom),
            "left" | "west" => Some(Position::Left),
            "right" | "east" => Some(Position::Right),
            "top-left" | "left-top" | "northwest" => Some(Position::TopLeft),
            "top-right" | "right-top" | "northeast" => Some(Position::TopRight),
            "bottom-left" | "left-bottom" | "southwest" => Some(Position::BottomLeft),
            "bottom-right" | "right-bottom" | "southeast" => Some(Position::BottomRight),
            "entropy" => Some(Position::Entropy),
            "attention" => Some(Position::Attention),
            _ => None,
        }
    }

    /// Horizontal and vertical anchor in `[0, 1]`.
    pub fn anchor(&self) -> (f64, f64) {
        match self {
            Position::Centre | Position::Entropy | Position::Attention => (0.5, 0.5),
            Position::Top => (0.5, 0.0),
            Position::Bottom => (0.5, 1.0),
            Position::Left => (0.0, 0.5),
            Position::Right => (1.0, 0.5),
            Position::TopLeft => (0.0, 0.0),
            Position::TopRight => (1.0, 0.0),
            Position::BottomLeft => (0.0, 1.0),
            Position::BottomRight => (1.0, 1.0),
        }
    }
}

/// Resampling kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kernel {
    Nearest,
    Cubic,
    Mitchell,
    Lanczos2,
    #[default]
    Lanczos3,
}

impl Kernel {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "nearest" => Some(Kernel::Nearest),
            "cubic" => Some(Kernel::Cubic),
            "mitchell" => Some(Kernel::Mitchell),
            "lanczos2" => Some(Kernel::Lanczos2),
            "lanczos3" => Some(Kernel::Lanczos3),
            _ => None,
        }
    }
}

/// RGBA colour parsed from a hex string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const TRANSPARENT: Color = Color {
        r: 0,
        g: 0,
        b: 0,
        a: 0,
    };

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Parse `rgb`, `rrggbb` or `rrggbbaa`, with or without a leading `#`.
    pub fn parse_hex(value: &str) -> Option<Self> {
        let hex = value.trim().trim_start_matches('#');
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).ok();
        match hex.len() {
            3 => {
                let mut expanded = String::with_capacity(6);
                for c in hex.chars() {
                    expanded.push(c);
                    expanded.push(c);
                }
                Self::parse_hex(&expanded)
            }
            6 => Some(Color::rgb(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
            )),
            8 => Some(Color {
                r: channel(&hex[0..2])?,
                g: channel(&hex[2..4])?,
                b: channel(&hex[4..6])?,
                a: channel(&hex[6..8])?,
            }),
            _ => None,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
    }
}

/// Pixel rectangle for `extract`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

/// Border sizes for `extend`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edges {
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
}

/// Unsharp-mask parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sharpen {
    pub sigma: f32,
    pub flat: f32,
    pub jagged: f32,
}

/// Brightness/saturation multipliers and hue rotation in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Modulate {
    pub brightness: f32,
    pub saturation: f32,
    pub hue: f32,
}

/// Fully validated set of operations requested for one image.
///
/// Every optional field is `None` (or `false`/`0`) when the request did not ask
/// for it, so a default spec describes a verbatim pass-through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingSpec {
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub quality: u8,
    pub format: Option<Format>,

    // Resize options
    pub fit: Option<Fit>,
    pub position: Option<Position>,
    pub kernel: Option<Kernel>,
    pub enlarge: bool,

    // Geometry
    pub extract: Option<Region>,
    pub trim: Option<u8>,
    pub extend: Option<Edges>,
    pub rotate: u16,
    pub flip: bool,
    pub flop: bool,

    // Filters
    pub blur: Option<f32>,
    pub median: Option<u32>,
    pub sharpen: Option<Sharpen>,

    // Colour
    pub background: Option<Color>,
    pub grayscale: bool,
    pub negate: bool,
    pub normalize: bool,
    pub threshold: Option<u8>,
    pub tint: Option<Color>,
    pub gamma: Option<f32>,
    pub modulate: Option<Modulate>,
    pub flatten: bool,
}

impl ProcessingSpec {
    /// A pass-through spec for `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            width: None,
            height: None,
            quality: DEFAULT_QUALITY,
            format: None,
            fit: None,
            position: None,
            kernel: None,
            enlarge: false,
            extract: None,
            trim: None,
            extend: None,
            rotate: 0,
            flip: false,
            flop: false,
            blur: None,
            median: None,
            sharpen: None,
            background: None,
            grayscale: false,
            negate: false,
            normalize: false,
            threshold: None,
            tint: None,
            gamma: None,
            modulate: None,
            flatten: false,
        }
    }

    pub fn with_size(mut self, width: Option<u32>, height: Option<u32>) -> Self {
        self.width = width.filter(|w| *w > 0);
        self.height = height.filter(|h| *h > 0);
        self
    }

    pub fn with_format(mut self, format: Format) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = if (1..=100).contains(&quality) {
            quality
        } else {
            DEFAULT_QUALITY
        };
        self
    }

    /// True when a resize target was requested.
    pub fn has_resize(&self) -> bool {
        self.width.is_some() || self.height.is_some()
    }

    /// True if any transformation is requested against an origin in `original` format.
    ///
    /// Asking for the origin's own format without any other change is not a
    /// transformation.
    pub fn needs_processing(&self, original: Option<Format>) -> bool {
        let format_change = match self.format {
            Some(requested) => Some(requested) != original,
            None => false,
        };

        self.has_resize()
            || self.quality != DEFAULT_QUALITY
            || format_change
            || self.fit.is_some()
            || self.position.is_some()
            || self.kernel.is_some()
            || self.enlarge
            || self.extract.is_some()
            || self.trim.is_some()
            || self.extend.is_some()
            || self.rotate != 0
            || self.flip
            || self.flop
            || self.blur.is_some()
            || self.median.is_some()
            || self.sharpen.is_some()
            || self.background.is_some()
            || self.grayscale
            || self.negate
            || self.normalize
            || self.threshold.is_some()
            || self.tint.is_some()
            || self.gamma.is_some()
            || self.modulate.is_some()
            || self.flatten
    }

    /// Output format: the requested one, else the origin's, else JPEG.
    pub fn resolved_output_format(&self, original: Option<Format>) -> Format {
        self.format.or(original).unwrap_or(Format::Jpeg)
    }

    /// Background used by `extend`, `contain` padding and `flatten`.
    pub fn background_or(&self, fallback: Color) -> Color {
        self.background.unwrap_or(fallback)
    }
}
