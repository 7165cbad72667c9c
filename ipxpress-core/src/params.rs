//! Query-string parsing into a [`ProcessingSpec`].
//!
//! Short and long aliases are accepted for the common parameters. Plain
//! numeric and enum values are lenient: an unparseable value is ignored, as if
//! absent. Composite values (`extract`, `extend`, `sharpen`, `modulate`) and
//! colours are strict because a half-parsed geometry is never what the caller
//! meant.

use std::collections::BTreeMap;

use crate::error::ValidationError;
use crate::format::Format;
use crate::spec::{
    Color, Edges, Fit, Kernel, Modulate, Position, ProcessingSpec, Region, Sharpen,
    DEFAULT_QUALITY,
};

struct Params(BTreeMap<String, String>);

impl Params {
    /// First non-empty value among `names`, in order.
    fn get(&self, names: &[&str]) -> Option<&str> {
        names
            .iter()
            .filter_map(|name| self.0.get(*name))
            .map(|v| v.trim())
            .find(|v| !v.is_empty())
    }

    fn flag(&self, names: &[&str]) -> bool {
        self.get(names).map(parse_bool).unwrap_or(false)
    }

    fn positive_u32(&self, names: &[&str]) -> Option<u32> {
        self.get(names)
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|v| *v > 0)
    }

    fn positive_f32(&self, names: &[&str]) -> Option<f32> {
        self.get(names)
            .and_then(|v| v.parse::<f32>().ok())
            .filter(|v| v.is_finite() && *v > 0.0)
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value, "1" | "t" | "T" | "true" | "TRUE" | "True")
}

fn invalid(param: &str, value: &str, reason: &str) -> ValidationError {
    ValidationError::InvalidParameter {
        param: param.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Split `value` on `_` into exactly `n` numbers of type `T`.
fn split_numbers<T: std::str::FromStr>(
    param: &str,
    value: &str,
    n: usize,
) -> Result<Vec<T>, ValidationError> {
    let parts: Vec<&str> = value.split('_').collect();
    if parts.len() != n {
        return Err(invalid(
            param,
            value,
            &format!("expected {} values separated by '_'", n),
        ));
    }
    parts
        .iter()
        .map(|p| {
            p.trim()
                .parse::<T>()
                .map_err(|_| invalid(param, value, "not a number"))
        })
        .collect()
}

/// Parse `WxH`; anything else yields `(None, None)`.
fn parse_resize(value: &str) -> (Option<u32>, Option<u32>) {
    let mut parts = value.split(['x', 'X']);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(w), Some(h), None) => match (w.trim().parse::<u32>(), h.trim().parse::<u32>()) {
            (Ok(w), Ok(h)) => (Some(w).filter(|v| *v > 0), Some(h).filter(|v| *v > 0)),
            _ => (None, None),
        },
        _ => (None, None),
    }
}

fn parse_color(param: &str, value: &str) -> Result<Color, ValidationError> {
    Color::parse_hex(value).ok_or_else(|| invalid(param, value, "expected a hex colour"))
}

impl ProcessingSpec {
    /// Build a spec from decoded query pairs. Later duplicates win.
    ///
    /// # Errors
    ///
    /// `MissingUrl` when no `url` is present, `InvalidParameter` for malformed
    /// composite values or colours.
    pub fn from_query<I, K, V>(pairs: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let params = Params(
            pairs
                .into_iter()
                .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
                .collect(),
        );

        let url = params.get(&["url"]).ok_or(ValidationError::MissingUrl)?;
        let mut spec = ProcessingSpec::new(url);

        // `s=WxH` first, then explicit width/height override each axis.
        if let Some(size) = params.get(&["resize", "s"]) {
            let (w, h) = parse_resize(size);
            spec.width = w;
            spec.height = h;
        }
        if let Some(w) = params.positive_u32(&["width", "w"]) {
            spec.width = Some(w);
        }
        if let Some(h) = params.positive_u32(&["height", "h"]) {
            spec.height = Some(h);
        }

        spec.quality = params
            .get(&["quality", "q"])
            .and_then(|v| v.parse::<u8>().ok())
            .filter(|q| (1..=100).contains(q))
            .unwrap_or(DEFAULT_QUALITY);
        spec.format = params.get(&["format", "f"]).and_then(Format::parse);

        spec.fit = params.get(&["fit"]).and_then(Fit::parse);
        spec.position = params.get(&["position", "pos"]).and_then(Position::parse);
        spec.kernel = params.get(&["kernel"]).and_then(Kernel::parse);
        spec.enlarge = params.flag(&["enlarge"]);

        if let Some(value) = params.get(&["extract"]) {
            let v = split_numbers::<u32>("extract", value, 4)?;
            if v[2] == 0 || v[3] == 0 {
                return Err(invalid("extract", value, "width and height must be positive"));
            }
            spec.extract = Some(Region {
                left: v[0],
                top: v[1],
                width: v[2],
                height: v[3],
            });
        }
        spec.trim = params
            .get(&["trim"])
            .and_then(|v| v.parse::<u8>().ok())
            .filter(|t| *t > 0);
        if let Some(value) = params.get(&["extend"]) {
            let v = split_numbers::<u32>("extend", value, 4)?;
            if v.iter().any(|e| *e > 0) {
                spec.extend = Some(Edges {
                    top: v[0],
                    right: v[1],
                    bottom: v[2],
                    left: v[3],
                });
            }
        }
        spec.rotate = params
            .get(&["rotate"])
            .and_then(|v| v.parse::<i64>().ok())
            .map(snap_quarter_turn)
            .unwrap_or(0);
        spec.flip = params.flag(&["flip"]);
        spec.flop = params.flag(&["flop"]);

        spec.blur = params.positive_f32(&["blur"]);
        spec.median = params.positive_u32(&["median"]);
        if let Some(value) = params.get(&["sharpen"]) {
            spec.sharpen = Some(parse_sharpen(value)?);
        }

        if let Some(value) = params.get(&["background", "b"]) {
            spec.background = Some(parse_color("background", value)?);
        }
        spec.grayscale = params.flag(&["grayscale"]);
        spec.negate = params.flag(&["negate"]);
        spec.normalize = params.flag(&["normalize"]);
        spec.threshold = params
            .get(&["threshold"])
            .and_then(|v| v.parse::<u8>().ok())
            .filter(|t| *t > 0);
        if let Some(value) = params.get(&["tint"]) {
            spec.tint = Some(parse_color("tint", value)?);
        }
        spec.gamma = params.positive_f32(&["gamma"]);
        if let Some(value) = params.get(&["modulate"]) {
            spec.modulate = Some(parse_modulate(value)?);
        }
        spec.flatten = params.flag(&["flatten"]);

        Ok(spec)
    }
}

/// Nearest clockwise quarter turn in `0..360`. Halfway angles round up.
fn snap_quarter_turn(degrees: i64) -> u16 {
    let reduced = degrees.rem_euclid(360);
    ((reduced + 45) / 90 * 90 % 360) as u16
}

/// `sigma[_flat[_jagged]]`
fn parse_sharpen(value: &str) -> Result<Sharpen, ValidationError> {
    let parts: Vec<&str> = value.split('_').collect();
    if parts.len() > 3 {
        return Err(invalid("sharpen", value, "expected sigma[_flat[_jagged]]"));
    }
    let mut nums = [0.0_f32, 1.0, 2.0];
    for (slot, part) in nums.iter_mut().zip(parts.iter()) {
        *slot = part
            .trim()
            .parse::<f32>()
            .ok()
            .filter(|v| v.is_finite() && *v >= 0.0)
            .ok_or_else(|| invalid("sharpen", value, "not a non-negative number"))?;
    }
    if nums[0] <= 0.0 {
        return Err(invalid("sharpen", value, "sigma must be positive"));
    }
    Ok(Sharpen {
        sigma: nums[0],
        flat: nums[1],
        jagged: nums[2],
    })
}

/// `brightness[_saturation[_hue]]`
fn parse_modulate(value: &str) -> Result<Modulate, ValidationError> {
    let parts: Vec<&str> = value.split('_').collect();
    if parts.len() > 3 {
        return Err(invalid(
            "modulate",
            value,
            "expected brightness[_saturation[_hue]]",
        ));
    }
    let mut nums = [1.0_f32, 1.0, 0.0];
    for (slot, part) in nums.iter_mut().zip(parts.iter()) {
        *slot = part
            .trim()
            .parse::<f32>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| invalid("modulate", value, "not a number"))?;
    }
    if nums[0] < 0.0 || nums[1] < 0.0 {
        return Err(invalid(
            "modulate",
            value,
            "brightness and saturation must be non-negative",
        ));
    }
    Ok(Modulate {
        brightness: nums[0],
        saturation: nums[1],
        hue: nums[2],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(pairs: &[(&str, &str)]) -> Result<ProcessingSpec, ValidationError> {
        ProcessingSpec::from_query(pairs.iter().copied())
    }

    #[test]
    fn test_missing_url() {
        assert_eq!(parse(&[("w", "100")]), Err(ValidationError::MissingUrl));
        assert_eq!(parse(&[("url", "  ")]), Err(ValidationError::MissingUrl));
    }

    #[test]
    fn test_short_and_long_aliases() {
        let spec = parse(&[
            ("url", "https://example.com/a.jpg"),
            ("w", "600"),
            ("height", "300"),
            ("q", "70"),
            ("f", "jpg"),
        ])
        .unwrap();
        assert_eq!(spec.width, Some(600));
        assert_eq!(spec.height, Some(300));
        assert_eq!(spec.quality, 70);
        assert_eq!(spec.format, Some(Format::Jpeg));
    }

    #[test]
    fn test_resize_shorthand_and_override() {
        let spec = parse(&[("url", "u"), ("s", "200x100")]).unwrap();
        assert_eq!((spec.width, spec.height), (Some(200), Some(100)));

        let spec = parse(&[("url", "u"), ("resize", "200x100"), ("w", "50")]).unwrap();
        assert_eq!((spec.width, spec.height), (Some(50), Some(100)));

        let spec = parse(&[("url", "u"), ("s", "200by100")]).unwrap();
        assert_eq!((spec.width, spec.height), (None, None));
    }

    #[test]
    fn test_lenient_scalars_fall_back() {
        let spec = parse(&[
            ("url", "u"),
            ("w", "abc"),
            ("q", "150"),
            ("f", "tiff"),
            ("fit", "squash"),
        ])
        .unwrap();
        assert_eq!(spec.width, None);
        assert_eq!(spec.quality, DEFAULT_QUALITY);
        assert_eq!(spec.format, None);
        assert_eq!(spec.fit, None);
        assert!(!spec.needs_processing(None));
    }

    #[test]
    fn test_composite_values() {
        let spec = parse(&[
            ("url", "u"),
            ("extract", "10_20_30_40"),
            ("extend", "1_2_3_4"),
            ("sharpen", "1.5"),
            ("modulate", "1.2_0.8"),
            ("b", "#ff0000"),
        ])
        .unwrap();
        assert_eq!(
            spec.extract,
            Some(Region {
                left: 10,
                top: 20,
                width: 30,
                height: 40
            })
        );
        assert_eq!(
            spec.extend,
            Some(Edges {
                top: 1,
                right: 2,
                bottom: 3,
                left: 4
            })
        );
        assert_eq!(
            spec.sharpen,
            Some(Sharpen {
                sigma: 1.5,
                flat: 1.0,
                jagged: 2.0
            })
        );
        assert_eq!(
            spec.modulate,
            Some(Modulate {
                brightness: 1.2,
                saturation: 0.8,
                hue: 0.0
            })
        );
        assert_eq!(spec.background, Some(Color::rgb(255, 0, 0)));
    }

    #[test]
    fn test_malformed_composite_is_rejected() {
        let err = parse(&[("url", "u"), ("extract", "1_2")]).unwrap_err();
        assert!(
            matches!(err, ValidationError::InvalidParameter { ref param, .. } if param == "extract")
        );

        let err = parse(&[("url", "u"), ("tint", "notacolour")]).unwrap_err();
        assert!(
            matches!(err, ValidationError::InvalidParameter { ref param, .. } if param == "tint")
        );
    }

    #[test]
    fn test_flags_and_rotate() {
        let spec = parse(&[
            ("url", "u"),
            ("flip", "true"),
            ("flop", "0"),
            ("grayscale", "1"),
            ("rotate", "-90"),
        ])
        .unwrap();
        assert!(spec.flip);
        assert!(!spec.flop);
        assert!(spec.grayscale);
        assert_eq!(spec.rotate, 270);

        let spec = parse(&[("url", "u"), ("rotate", "100")]).unwrap();
        assert_eq!(spec.rotate, 90);
        let spec = parse(&[("url", "u"), ("rotate", "360")]).unwrap();
        assert_eq!(spec.rotate, 0);
    }

    #[test]
    fn test_rotate_extremes_do_not_overflow() {
        let spec = parse(&[("url", "u"), ("rotate", "9223372036854775807")]).unwrap();
        // i64::MAX is 7 mod 360.
        assert_eq!(spec.rotate, 0);
        let spec = parse(&[("url", "u"), ("rotate", "-9223372036854775808")]).unwrap();
        // i64::MIN is 352 mod 360.
        assert_eq!(spec.rotate, 0);
        let spec = parse(&[("url", "u"), ("rotate", "9223372036854775710")]).unwrap();
        assert_eq!(spec.rotate, 270);
    }

    #[test]
    fn test_snap_quarter_turn() {
        assert_eq!(snap_quarter_turn(44), 0);
        assert_eq!(snap_quarter_turn(45), 90);
        assert_eq!(snap_quarter_turn(-45), 0);
        assert_eq!(snap_quarter_turn(-100), 270);
        assert_eq!(snap_quarter_turn(719), 0);
    }
}
