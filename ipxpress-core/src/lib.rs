//! ipxpress core - request model and shared types
//!
//! Pure data types used by every other crate: the processing spec and its
//! query-string parser, deterministic cache keys, cache entries, image formats,
//! error enums and configuration helpers. No I/O happens here.

mod config;
mod entry;
mod error;
mod format;
mod key;
mod params;
mod spec;

pub use config::{
    env_millis, env_opt, env_or, env_secs, require_positive, require_positive_duration,
    RetryConfig,
};
pub use entry::CacheEntry;
pub use error::{
    ConfigError, FetchError, IpxError, IpxResult, TransformError, ValidationError,
};
pub use format::{Format, PASSTHROUGH_CONTENT_TYPE};
pub use key::CacheKey;
pub use spec::{
    Color, Edges, Fit, Kernel, Modulate, Position, ProcessingSpec, Region, Sharpen,
    DEFAULT_QUALITY,
};

// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_spec() -> impl Strategy<Value = ProcessingSpec> {
        (
            "https://[a-z]{1,8}\\.test/[a-z0-9]{1,12}\\.(png|jpg)",
            proptest::option::of(1u32..4000),
            proptest::option::of(1u32..4000),
            1u8..=100,
            proptest::option::of(proptest::sample::select(Format::ALL.to_vec())),
            any::<bool>(),
            any::<bool>(),
            proptest::option::of(0.1f32..20.0),
        )
            .prop_map(|(url, w, h, q, f, flip, grayscale, blur)| {
                let mut spec = ProcessingSpec::new(url)
                    .with_size(w, h)
                    .with_quality(q);
                spec.format = f;
                spec.flip = flip;
                spec.grayscale = grayscale;
                spec.blur = blur;
                spec
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Equal specs always produce equal keys.
        #[test]
        fn prop_key_deterministic(spec in arb_spec()) {
            prop_assert_eq!(CacheKey::derive(&spec), CacheKey::derive(&spec.clone()));
        }

        /// Distinct specs produce distinct keys.
        #[test]
        fn prop_key_distinct(a in arb_spec(), b in arb_spec()) {
            prop_assume!(a != b);
            prop_assert_ne!(CacheKey::derive(&a), CacheKey::derive(&b));
        }

        /// Width/height survive the query-string round trip through `from_query`.
        #[test]
        fn prop_from_query_dimensions(w in 1u32..10_000, h in 1u32..10_000) {
            let w_str = w.to_string();
            let h_str = h.to_string();
            let spec = ProcessingSpec::from_query([
                ("url", "https://img.test/a.png"),
                ("w", w_str.as_str()),
                ("h", h_str.as_str()),
            ]);
            prop_assert!(spec.is_ok());
            let spec = spec.unwrap();
            prop_assert_eq!(spec.width, Some(w));
            prop_assert_eq!(spec.height, Some(h));
        }

        /// Out-of-range quality always resolves to the default.
        #[test]
        fn prop_invalid_quality_defaults(q in 101u32..100_000) {
            let q_str = q.to_string();
            let spec = ProcessingSpec::from_query([("url", "u"), ("q", q_str.as_str())]);
            prop_assert_eq!(spec.map(|s| s.quality), Ok(DEFAULT_QUALITY));
        }
    }
}
