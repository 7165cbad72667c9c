//! Deterministic cache keys.
//!
//! A key is the hex SHA-256 of a canonical encoding of every field of a
//! [`ProcessingSpec`]. Each field is written as `name=value;` in declaration
//! order, with absent optionals written as `-`, floats as raw bits and the URL
//! length-prefixed, so two specs share a key only when they are equal.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::{self, Display, Write};

use crate::spec::{Color, ProcessingSpec};

const KEY_VERSION: &str = "ipxpress/v1";

/// Fixed-length hex digest identifying one processing spec.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for `spec`.
    pub fn derive(spec: &ProcessingSpec) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(canonical_encoding(spec).as_bytes());
        CacheKey(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

struct Canonical(String);

impl Canonical {
    fn field(&mut self, name: &str, value: impl Display) {
        // Writing to a String cannot fail.
        let _ = write!(self.0, "{}={};", name, value);
    }

    fn opt<T: Display>(&mut self, name: &str, value: Option<T>) {
        match value {
            Some(v) => self.field(name, v),
            None => self.field(name, "-"),
        }
    }

    fn float(&mut self, name: &str, value: Option<f32>) {
        self.opt(name, value.map(|v| format!("{:08x}", v.to_bits())));
    }

    fn color(&mut self, name: &str, value: Option<Color>) {
        self.opt(name, value);
    }
}

fn canonical_encoding(spec: &ProcessingSpec) -> String {
    let mut c = Canonical(String::with_capacity(256 + spec.url.len()));
    c.field("v", KEY_VERSION);
    c.field("url", format!("{}:{}", spec.url.len(), spec.url));
    c.opt("w", spec.width);
    c.opt("h", spec.height);
    c.field("q", spec.quality);
    c.opt("f", spec.format);
    c.opt("fit", spec.fit.map(|v| format!("{:?}", v)));
    c.opt("pos", spec.position.map(|v| format!("{:?}", v)));
    c.opt("kernel", spec.kernel.map(|v| format!("{:?}", v)));
    c.field("enlarge", spec.enlarge);
    c.opt(
        "extract",
        spec.extract
            .map(|r| format!("{}_{}_{}_{}", r.left, r.top, r.width, r.height)),
    );
    c.opt("trim", spec.trim);
    c.opt(
        "extend",
        spec.extend
            .map(|e| format!("{}_{}_{}_{}", e.top, e.right, e.bottom, e.left)),
    );
    c.field("rotate", spec.rotate);
    c.field("flip", spec.flip);
    c.field("flop", spec.flop);
    c.float("blur", spec.blur);
    c.opt("median", spec.median);
    c.float("sharpen.sigma", spec.sharpen.map(|s| s.sigma));
    c.float("sharpen.flat", spec.sharpen.map(|s| s.flat));
    c.float("sharpen.jagged", spec.sharpen.map(|s| s.jagged));
    c.color("background", spec.background);
    c.field("grayscale", spec.grayscale);
    c.field("negate", spec.negate);
    c.field("normalize", spec.normalize);
    c.opt("threshold", spec.threshold);
    c.color("tint", spec.tint);
    c.float("gamma", spec.gamma);
    c.float("modulate.b", spec.modulate.map(|m| m.brightness));
    c.float("modulate.s", spec.modulate.map(|m| m.saturation));
    c.float("modulate.h", spec.modulate.map(|m| m.hue));
    c.field("flatten", spec.flatten);
    c.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Format;

    #[test]
    fn test_key_is_hex_sha256() {
        let key = CacheKey::derive(&ProcessingSpec::new("https://example.com/a.png"));
        assert_eq!(key.as_str().len(), 64);
        assert!(key.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_key_is_deterministic() {
        let a = ProcessingSpec::new("https://example.com/a.png").with_size(Some(600), None);
        let b = a.clone();
        assert_eq!(CacheKey::derive(&a), CacheKey::derive(&b));
    }

    #[test]
    fn test_any_field_changes_key() {
        let base = ProcessingSpec::new("https://example.com/a.png");
        let base_key = CacheKey::derive(&base);

        let mut flipped = base.clone();
        flipped.flip = true;
        let mut flopped = base.clone();
        flopped.flop = true;
        let formatted = base.clone().with_format(Format::Webp);
        let other_url = ProcessingSpec::new("https://example.com/b.png");

        let keys = [
            CacheKey::derive(&flipped),
            CacheKey::derive(&flopped),
            CacheKey::derive(&formatted),
            CacheKey::derive(&other_url),
        ];
        for key in &keys {
            assert_ne!(key, &base_key);
        }
        assert_ne!(keys[0], keys[1]);
    }

    #[test]
    fn test_width_and_height_are_not_interchangeable() {
        let w = ProcessingSpec::new("u").with_size(Some(100), None);
        let h = ProcessingSpec::new("u").with_size(None, Some(100));
        assert_ne!(CacheKey::derive(&w), CacheKey::derive(&h));
    }

    #[test]
    fn test_url_cannot_bleed_into_other_fields() {
        let a = ProcessingSpec::new("u;w=1");
        let b = ProcessingSpec::new("u").with_size(Some(1), None);
        assert_ne!(CacheKey::derive(&a), CacheKey::derive(&b));
    }
}
