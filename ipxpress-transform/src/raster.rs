//! Reference engine built on the `image` crate.
//!
//! Decodes JPEG, PNG, GIF (first frame) and WebP. AVIF is encode-only.

use std::io::Cursor;

use bytes::Bytes;
use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, ImageFormat, Rgba, RgbaImage};
use ipxpress_core::{Color, Edges, Format, Kernel, Modulate, Region, Sharpen, TransformError};

use crate::engine::{ImageHandle, TransformEngine};

/// AVIF encoder speed, 1 (slowest) to 10 (fastest).
const AVIF_SPEED: u8 = 8;

#[derive(Debug, Default, Clone, Copy)]
pub struct RasterEngine;

impl RasterEngine {
    pub fn new() -> Self {
        Self
    }
}

impl TransformEngine for RasterEngine {
    fn decode(&self, source: &[u8]) -> Result<Box<dyn ImageHandle>, TransformError> {
        let img = image::load_from_memory(source).map_err(|e| TransformError::Decode {
            reason: e.to_string(),
        })?;
        Ok(Box::new(RasterImage { img }))
    }
}

/// Decoded image held by [`RasterEngine`].
#[derive(Debug)]
pub struct RasterImage {
    img: DynamicImage,
}

impl RasterImage {
    pub fn from_image(img: DynamicImage) -> Self {
        Self { img }
    }

    fn map_pixels(&mut self, f: impl Fn([u8; 4]) -> [u8; 4]) {
        let mut buf = self.img.to_rgba8();
        for pixel in buf.pixels_mut() {
            pixel.0 = f(pixel.0);
        }
        self.img = DynamicImage::ImageRgba8(buf);
    }

    fn encode_error(format: Format, err: impl ToString) -> TransformError {
        TransformError::Encode {
            format: format.to_string(),
            reason: err.to_string(),
        }
    }
}

fn filter_for(kernel: Kernel) -> FilterType {
    match kernel {
        Kernel::Nearest => FilterType::Nearest,
        Kernel::Cubic | Kernel::Mitchell => FilterType::CatmullRom,
        Kernel::Lanczos2 | Kernel::Lanczos3 => FilterType::Lanczos3,
    }
}

fn luma([r, g, b, _]: [u8; 4]) -> f32 {
    0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32
}

fn clamp_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

fn composite(pixel: [u8; 4], bg: Color) -> [u8; 3] {
    let a = pixel[3] as f32 / 255.0;
    let mix = |c: u8, b: u8| clamp_u8(c as f32 * a + b as f32 * (1.0 - a));
    [mix(pixel[0], bg.r), mix(pixel[1], bg.g), mix(pixel[2], bg.b)]
}

impl ImageHandle for RasterImage {
    fn dimensions(&self) -> (u32, u32) {
        self.img.dimensions()
    }

    fn has_alpha(&self) -> bool {
        self.img.color().has_alpha()
    }

    fn extract(&mut self, region: Region) -> Result<(), TransformError> {
        let (w, h) = self.img.dimensions();
        let fits = region.width > 0
            && region.height > 0
            && region.left as u64 + region.width as u64 <= w as u64
            && region.top as u64 + region.height as u64 <= h as u64;
        if !fits {
            return Err(TransformError::operation(
                "extract",
                format!(
                    "region {}x{}+{}+{} outside {}x{} image",
                    region.width, region.height, region.left, region.top, w, h
                ),
            ));
        }
        self.img = self
            .img
            .crop_imm(region.left, region.top, region.width, region.height);
        Ok(())
    }

    fn trim(&mut self, threshold: u8) -> Result<(), TransformError> {
        let buf = self.img.to_rgba8();
        let (w, h) = buf.dimensions();
        if w == 0 || h == 0 {
            return Ok(());
        }
        let reference = buf.get_pixel(0, 0).0;
        let differs = |p: &Rgba<u8>| {
            p.0.iter()
                .zip(reference.iter())
                .any(|(a, b)| a.abs_diff(*b) > threshold)
        };

        let (mut min_x, mut min_y, mut max_x, mut max_y) = (w, h, 0u32, 0u32);
        for (x, y, pixel) in buf.enumerate_pixels() {
            if differs(pixel) {
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);
            }
        }
        // Uniform image: nothing to keep but everything, leave it alone.
        if min_x > max_x || min_y > max_y {
            return Ok(());
        }
        self.img = self
            .img
            .crop_imm(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1);
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32, kernel: Kernel) -> Result<(), TransformError> {
        if width == 0 || height == 0 {
            return Err(TransformError::operation(
                "resize",
                format!("invalid target size {}x{}", width, height),
            ));
        }
        self.img = self.img.resize_exact(width, height, filter_for(kernel));
        Ok(())
    }

    fn extend(&mut self, edges: Edges, background: Color) -> Result<(), TransformError> {
        let (w, h) = self.img.dimensions();
        let new_w = w as u64 + edges.left as u64 + edges.right as u64;
        let new_h = h as u64 + edges.top as u64 + edges.bottom as u64;
        if new_w > u32::MAX as u64 || new_h > u32::MAX as u64 {
            return Err(TransformError::operation("extend", "border too large"));
        }
        let fill = Rgba([background.r, background.g, background.b, background.a]);
        let mut canvas = RgbaImage::from_pixel(new_w as u32, new_h as u32, fill);
        imageops::overlay(
            &mut canvas,
            &self.img.to_rgba8(),
            edges.left as i64,
            edges.top as i64,
        );
        self.img = DynamicImage::ImageRgba8(canvas);
        Ok(())
    }

    fn rotate(&mut self, degrees: u16) -> Result<(), TransformError> {
        self.img = match degrees % 360 {
            0 => return Ok(()),
            90 => self.img.rotate90(),
            180 => self.img.rotate180(),
            270 => self.img.rotate270(),
            other => {
                return Err(TransformError::operation(
                    "rotate",
                    format!("{} is not a multiple of 90", other),
                ))
            }
        };
        Ok(())
    }

    fn flip(&mut self) -> Result<(), TransformError> {
        self.img = self.img.flipv();
        Ok(())
    }

    fn flop(&mut self) -> Result<(), TransformError> {
        self.img = self.img.fliph();
        Ok(())
    }

    fn blur(&mut self, sigma: f32) -> Result<(), TransformError> {
        if !(sigma.is_finite() && sigma > 0.0) {
            return Err(TransformError::operation("blur", format!("invalid sigma {}", sigma)));
        }
        self.img = self.img.blur(sigma);
        Ok(())
    }

    fn median(&mut self, radius: u32) -> Result<(), TransformError> {
        // Approximated by a gaussian of half the radius.
        self.blur((radius as f32 / 2.0).max(0.5))
    }

    fn sharpen(&mut self, params: Sharpen) -> Result<(), TransformError> {
        if !(params.sigma.is_finite() && params.sigma > 0.0) {
            return Err(TransformError::operation(
                "sharpen",
                format!("invalid sigma {}", params.sigma),
            ));
        }
        self.img = self.img.unsharpen(params.sigma, params.flat.round() as i32);
        Ok(())
    }

    fn grayscale(&mut self) -> Result<(), TransformError> {
        self.img = self.img.grayscale();
        Ok(())
    }

    fn negate(&mut self) -> Result<(), TransformError> {
        self.img.invert();
        Ok(())
    }

    fn normalize(&mut self) -> Result<(), TransformError> {
        let buf = self.img.to_rgba8();
        let (mut lo, mut hi) = (u8::MAX, u8::MIN);
        for pixel in buf.pixels() {
            for c in &pixel.0[..3] {
                lo = lo.min(*c);
                hi = hi.max(*c);
            }
        }
        if hi <= lo {
            return Ok(());
        }
        let scale = 255.0 / (hi - lo) as f32;
        self.map_pixels(|[r, g, b, a]| {
            let s = |c: u8| clamp_u8((c.saturating_sub(lo)) as f32 * scale);
            [s(r), s(g), s(b), a]
        });
        Ok(())
    }

    fn gamma(&mut self, gamma: f32) -> Result<(), TransformError> {
        if !(gamma.is_finite() && gamma > 0.0) {
            return Err(TransformError::operation("gamma", format!("invalid gamma {}", gamma)));
        }
        let mut lut = [0u8; 256];
        for (i, slot) in lut.iter_mut().enumerate() {
            *slot = clamp_u8(255.0 * (i as f32 / 255.0).powf(1.0 / gamma));
        }
        self.map_pixels(|[r, g, b, a]| [lut[r as usize], lut[g as usize], lut[b as usize], a]);
        Ok(())
    }

    fn linear(&mut self, multiplier: f32, offset: f32) -> Result<(), TransformError> {
        if !(multiplier.is_finite() && offset.is_finite()) {
            return Err(TransformError::operation("linear", "non-finite coefficients"));
        }
        let f = |c: u8| clamp_u8(c as f32 * multiplier + offset);
        self.map_pixels(|[r, g, b, a]| [f(r), f(g), f(b), a]);
        Ok(())
    }

    fn modulate(&mut self, params: Modulate) -> Result<(), TransformError> {
        let Modulate {
            brightness,
            saturation,
            hue,
        } = params;
        if !(brightness.is_finite() && saturation.is_finite() && hue.is_finite()) {
            return Err(TransformError::operation("modulate", "non-finite parameters"));
        }
        self.map_pixels(|px| {
            let l = luma(px);
            let adjust = |c: u8| clamp_u8((l + (c as f32 - l) * saturation) * brightness);
            [adjust(px[0]), adjust(px[1]), adjust(px[2]), px[3]]
        });
        let degrees = hue.round() as i32;
        if degrees % 360 != 0 {
            self.img = self.img.huerotate(degrees);
        }
        Ok(())
    }

    fn tint(&mut self, color: Color) -> Result<(), TransformError> {
        self.map_pixels(|px| {
            let l = luma(px) / 255.0;
            [
                clamp_u8(l * color.r as f32),
                clamp_u8(l * color.g as f32),
                clamp_u8(l * color.b as f32),
                px[3],
            ]
        });
        Ok(())
    }

    fn threshold(&mut self, threshold: u8) -> Result<(), TransformError> {
        self.map_pixels(|px| {
            let v = if luma(px) >= threshold as f32 { 255 } else { 0 };
            [v, v, v, px[3]]
        });
        Ok(())
    }

    fn flatten(&mut self, background: Color) -> Result<(), TransformError> {
        if !self.has_alpha() {
            return Ok(());
        }
        let buf = self.img.to_rgba8();
        let (w, h) = buf.dimensions();
        let mut out = image::RgbImage::new(w, h);
        for (src, dst) in buf.pixels().zip(out.pixels_mut()) {
            dst.0 = composite(src.0, background);
        }
        self.img = DynamicImage::ImageRgb8(out);
        Ok(())
    }

    fn encode(&self, format: Format, quality: u8) -> Result<Bytes, TransformError> {
        let quality = quality.clamp(1, 100);
        let mut buffer = Vec::new();
        let mut cursor = Cursor::new(&mut buffer);

        match format {
            Format::Jpeg => {
                // JPEG has no alpha; composite onto white rather than black.
                let rgb = if self.has_alpha() {
                    let rgba = self.img.to_rgba8();
                    let (w, h) = rgba.dimensions();
                    let mut out = image::RgbImage::new(w, h);
                    for (src, dst) in rgba.pixels().zip(out.pixels_mut()) {
                        dst.0 = composite(src.0, Color::WHITE);
                    }
                    out
                } else {
                    self.img.to_rgb8()
                };
                let encoder = JpegEncoder::new_with_quality(&mut cursor, quality);
                rgb.write_with_encoder(encoder)
                    .map_err(|e| Self::encode_error(format, e))?;
            }
            Format::Png => {
                self.img
                    .write_to(&mut cursor, ImageFormat::Png)
                    .map_err(|e| Self::encode_error(format, e))?;
            }
            Format::Gif => {
                DynamicImage::ImageRgba8(self.img.to_rgba8())
                    .write_to(&mut cursor, ImageFormat::Gif)
                    .map_err(|e| Self::encode_error(format, e))?;
            }
            Format::Webp => {
                let encoder = WebPEncoder::new_lossless(&mut cursor);
                self.img
                    .to_rgba8()
                    .write_with_encoder(encoder)
                    .map_err(|e| Self::encode_error(format, e))?;
            }
            Format::Avif => {
                let encoder = AvifEncoder::new_with_speed_quality(&mut cursor, AVIF_SPEED, quality);
                self.img
                    .to_rgba8()
                    .write_with_encoder(encoder)
                    .map_err(|e| Self::encode_error(format, e))?;
            }
        }

        Ok(Bytes::from(buffer))
    }
}
