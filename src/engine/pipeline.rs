// src/engine/pipeline.rs
//
// Final resize stage: per-page shrink, output budget, alpha-safe resample and
// colour management, plus the pixel-operations seam it runs on.

use crate::engine::common::EngineResult;
use crate::engine::config::ThumbnailConfig;
use crate::engine::frame::{Frame, Intent, Interpretation, ProcessingProfile, SampleFormat};
use crate::engine::shrink::{resolve_shrink, ShrinkRatios};
use crate::error::ThumbnailError;
use crate::ops::RequestContext;
use fast_image_resize::{self as fir, MulDiv, PixelType, ResizeOptions};
use image::{
    DynamicImage, GrayAlphaImage, GrayImage, ImageBuffer, Luma, LumaA, Rgb, RgbImage, Rgba,
    RgbaImage,
};
use tracing::debug;

/// Pixel operations the resize stage is built on.
///
/// Every method consumes the frame and returns the replacement, so an
/// implementation may reuse buffers in place.
pub trait PixelOps {
    /// Convert to the standard processing colour space (8-bit sRGB).
    fn to_processing_space(&self, frame: Frame) -> EngineResult<Frame>;

    fn premultiply(&self, frame: Frame) -> EngineResult<Frame>;

    fn unpremultiply(&self, frame: Frame) -> EngineResult<Frame>;

    /// Resample with independent scale factors; output is
    /// `round(width * hscale)` x `round(height * vscale)`.
    fn resample(&self, frame: Frame, hscale: f64, vscale: f64) -> EngineResult<Frame>;

    /// Convert samples to `format`, keeping the channel layout.
    fn cast(&self, frame: Frame, format: SampleFormat) -> EngineResult<Frame>;

    /// Transform from the embedded profile to `target` at `depth` bits.
    ///
    /// A transforming implementation sets `output_profile` and drops
    /// `icc_profile`; one that cannot transform must leave both as they were.
    fn icc_transform(
        &self,
        frame: Frame,
        target: ProcessingProfile,
        depth: u8,
        intent: Intent,
    ) -> EngineResult<Frame>;
}

/// Default [`PixelOps`] on fast_image_resize (Lanczos3) and the image crate.
///
/// No colour-management backend is linked: `icc_transform` converts the bit
/// depth but leaves the samples in the embedded profile, keeps that profile
/// attached and leaves `output_profile` unset. Implement [`PixelOps`] over a
/// CMS for real transforms.
#[derive(Clone, Copy, Debug, Default)]
pub struct FirPixelOps;

impl PixelOps for FirPixelOps {
    fn to_processing_space(&self, frame: Frame) -> EngineResult<Frame> {
        let image = match frame.image {
            img @ (DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_)) => img,
            other if other.color().has_alpha() => DynamicImage::ImageRgba8(other.to_rgba8()),
            other => DynamicImage::ImageRgb8(other.to_rgb8()),
        };
        Ok(Frame { image, ..frame })
    }

    fn premultiply(&self, frame: Frame) -> EngineResult<Frame> {
        apply_alpha(frame, AlphaOp::Multiply)
    }

    fn unpremultiply(&self, frame: Frame) -> EngineResult<Frame> {
        apply_alpha(frame, AlphaOp::Divide)
    }

    fn resample(&self, frame: Frame, hscale: f64, vscale: f64) -> EngineResult<Frame> {
        let (src_width, src_height) = frame.dimensions();
        let dst_width = scaled_dimension(src_width, hscale);
        let dst_height = scaled_dimension(src_height, vscale);
        if (dst_width, dst_height) == (src_width, src_height) {
            return Ok(frame);
        }

        // Alpha is premultiplied by the caller when it matters
        let options = default_resize_options().use_alpha(false);
        let image = resize_image(frame.image, dst_width, dst_height, &options)?;
        Ok(Frame { image, ..frame })
    }

    fn cast(&self, frame: Frame, format: SampleFormat) -> EngineResult<Frame> {
        if frame.sample_format() == format {
            return Ok(frame);
        }
        let image = cast_image(frame.image, format);
        Ok(Frame { image, ..frame })
    }

    fn icc_transform(
        &self,
        frame: Frame,
        target: ProcessingProfile,
        depth: u8,
        intent: Intent,
    ) -> EngineResult<Frame> {
        let has_alpha = frame.has_alpha();
        let image = match (depth, has_alpha) {
            (8, false) => DynamicImage::ImageRgb8(frame.image.to_rgb8()),
            (8, true) => DynamicImage::ImageRgba8(frame.image.to_rgba8()),
            (16, false) => DynamicImage::ImageRgb16(frame.image.to_rgb16()),
            (16, true) => DynamicImage::ImageRgba16(frame.image.to_rgba16()),
            (other, _) => {
                return Err(ThumbnailError::colour_transform_failed(
                    target.as_str(),
                    format!("unsupported output depth {other}"),
                ))
            }
        };
        debug!(
            target: "lazy_thumbnail::pipeline",
            profile = target.as_str(),
            depth,
            intent = ?intent,
            "no colour-management backend, embedded profile kept"
        );
        Ok(Frame { image, ..frame })
    }
}

fn scaled_dimension(size: u32, scale: f64) -> u32 {
    ((size as f64 * scale).round_ties_even() as u32).max(1)
}

fn default_resize_options() -> ResizeOptions {
    ResizeOptions::new().resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::Lanczos3))
}

/// Resize straight to `width` x `height`, letting the resizer handle alpha.
pub(crate) fn resample_exact(
    image: DynamicImage,
    width: u32,
    height: u32,
) -> EngineResult<DynamicImage> {
    if (image.width(), image.height()) == (width, height) {
        return Ok(image);
    }
    resize_image(image, width, height, &default_resize_options())
}

// ---------------------------------------------------------------------------
// fast_image_resize plumbing
// ---------------------------------------------------------------------------

/// Raw pixels in fast_image_resize's layout (native-endian samples).
struct FirPixels {
    width: u32,
    height: u32,
    pixel_type: PixelType,
    bytes: Vec<u8>,
}

fn words_to_bytes(words: Vec<u16>) -> Vec<u8> {
    words.into_iter().flat_map(u16::to_ne_bytes).collect()
}

fn floats_to_bytes(floats: Vec<f32>) -> Vec<u8> {
    floats.into_iter().flat_map(f32::to_ne_bytes).collect()
}

fn bytes_to_words(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(|c| u16::from_ne_bytes([c[0], c[1]]))
        .collect()
}

fn bytes_to_floats(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

impl FirPixels {
    fn from_image(img: DynamicImage) -> Self {
        let (width, height) = (img.width(), img.height());
        // Take ownership of the buffer instead of copying where possible
        let (pixel_type, bytes) = match img {
            DynamicImage::ImageLuma8(b) => (PixelType::U8, b.into_raw()),
            DynamicImage::ImageLumaA8(b) => (PixelType::U8x2, b.into_raw()),
            DynamicImage::ImageRgb8(b) => (PixelType::U8x3, b.into_raw()),
            DynamicImage::ImageRgba8(b) => (PixelType::U8x4, b.into_raw()),
            DynamicImage::ImageLuma16(b) => (PixelType::U16, words_to_bytes(b.into_raw())),
            DynamicImage::ImageLumaA16(b) => (PixelType::U16x2, words_to_bytes(b.into_raw())),
            DynamicImage::ImageRgb16(b) => (PixelType::U16x3, words_to_bytes(b.into_raw())),
            DynamicImage::ImageRgba16(b) => (PixelType::U16x4, words_to_bytes(b.into_raw())),
            DynamicImage::ImageRgb32F(b) => (PixelType::F32x3, floats_to_bytes(b.into_raw())),
            DynamicImage::ImageRgba32F(b) => (PixelType::F32x4, floats_to_bytes(b.into_raw())),
            other => (PixelType::U8x4, other.to_rgba8().into_raw()),
        };
        Self {
            width,
            height,
            pixel_type,
            bytes,
        }
    }

    fn into_image(self) -> std::result::Result<DynamicImage, String> {
        let Self {
            width,
            height,
            pixel_type,
            bytes,
        } = self;
        let image = match pixel_type {
            PixelType::U8 => GrayImage::from_raw(width, height, bytes).map(DynamicImage::ImageLuma8),
            PixelType::U8x2 => {
                GrayAlphaImage::from_raw(width, height, bytes).map(DynamicImage::ImageLumaA8)
            }
            PixelType::U8x3 => RgbImage::from_raw(width, height, bytes).map(DynamicImage::ImageRgb8),
            PixelType::U8x4 => {
                RgbaImage::from_raw(width, height, bytes).map(DynamicImage::ImageRgba8)
            }
            PixelType::U16 => ImageBuffer::<Luma<u16>, _>::from_raw(width, height, bytes_to_words(&bytes))
                .map(DynamicImage::ImageLuma16),
            PixelType::U16x2 => {
                ImageBuffer::<LumaA<u16>, _>::from_raw(width, height, bytes_to_words(&bytes))
                    .map(DynamicImage::ImageLumaA16)
            }
            PixelType::U16x3 => {
                ImageBuffer::<Rgb<u16>, _>::from_raw(width, height, bytes_to_words(&bytes))
                    .map(DynamicImage::ImageRgb16)
            }
            PixelType::U16x4 => {
                ImageBuffer::<Rgba<u16>, _>::from_raw(width, height, bytes_to_words(&bytes))
                    .map(DynamicImage::ImageRgba16)
            }
            PixelType::F32x3 => {
                ImageBuffer::<Rgb<f32>, _>::from_raw(width, height, bytes_to_floats(&bytes))
                    .map(DynamicImage::ImageRgb32F)
            }
            PixelType::F32x4 => {
                ImageBuffer::<Rgba<f32>, _>::from_raw(width, height, bytes_to_floats(&bytes))
                    .map(DynamicImage::ImageRgba32F)
            }
            other => return Err(format!("unsupported pixel type {other:?}")),
        };
        image.ok_or_else(|| "pixel buffer does not match dimensions".to_string())
    }

    /// Owned fir image. Vec<u8> carries no alignment guarantee for 16-bit
    /// and float samples, so misaligned buffers are copied first.
    fn into_fir_image(self) -> std::result::Result<fir::images::Image<'static>, String> {
        let align = match self.pixel_type {
            PixelType::U16 | PixelType::U16x2 | PixelType::U16x3 | PixelType::U16x4 => 2,
            PixelType::U8 | PixelType::U8x2 | PixelType::U8x3 | PixelType::U8x4 => 1,
            _ => 4,
        };
        if self.bytes.as_ptr().align_offset(align) == 0 {
            return fir::images::Image::from_vec_u8(
                self.width,
                self.height,
                self.bytes,
                self.pixel_type,
            )
            .map_err(|e| format!("fir source image error: {e:?}"));
        }

        let mut aligned = fir::images::Image::new(self.width, self.height, self.pixel_type);
        let buffer = aligned.buffer_mut();
        if buffer.len() != self.bytes.len() {
            return Err(format!(
                "fir alignment fallback buffer mismatch. expected {} bytes, got {} bytes",
                buffer.len(),
                self.bytes.len()
            ));
        }
        buffer.copy_from_slice(&self.bytes);
        Ok(aligned)
    }
}

fn resize_image(
    image: DynamicImage,
    dst_width: u32,
    dst_height: u32,
    options: &ResizeOptions,
) -> EngineResult<DynamicImage> {
    let (src_width, src_height) = (image.width(), image.height());
    let failed = |reason: String| {
        ThumbnailError::resize_failed((src_width, src_height), (dst_width, dst_height), reason)
    };

    if src_width == 0 || src_height == 0 || dst_width == 0 || dst_height == 0 {
        return Err(failed("invalid dimensions for resize".to_string()));
    }

    let pixels = FirPixels::from_image(image);
    let pixel_type = pixels.pixel_type;
    let src_image = pixels.into_fir_image().map_err(failed)?;
    let mut dst_image = fir::images::Image::new(dst_width, dst_height, pixel_type);

    let mut resizer = fir::Resizer::new();
    resizer
        .resize(&src_image, &mut dst_image, options)
        .map_err(|e| failed(format!("fir resize error: {e:?}")))?;

    FirPixels {
        width: dst_width,
        height: dst_height,
        pixel_type,
        bytes: dst_image.into_vec(),
    }
    .into_image()
    .map_err(failed)
}

#[derive(Clone, Copy, Debug)]
enum AlphaOp {
    Multiply,
    Divide,
}

fn apply_alpha(frame: Frame, op: AlphaOp) -> EngineResult<Frame> {
    if !frame.has_alpha() {
        return Ok(frame);
    }
    let (width, height) = frame.dimensions();
    let failed =
        |reason: String| ThumbnailError::resize_failed((width, height), (width, height), reason);

    let pixels = FirPixels::from_image(frame.image);
    let pixel_type = pixels.pixel_type;
    let mut fir_image = pixels.into_fir_image().map_err(failed)?;

    let mul_div = MulDiv::default();
    match op {
        AlphaOp::Multiply => mul_div
            .multiply_alpha_inplace(&mut fir_image)
            .map_err(|e| failed(format!("failed to premultiply alpha: {e}")))?,
        AlphaOp::Divide => mul_div
            .divide_alpha_inplace(&mut fir_image)
            .map_err(|e| failed(format!("failed to unpremultiply alpha: {e}")))?,
    }

    let image = FirPixels {
        width,
        height,
        pixel_type,
        bytes: fir_image.into_vec(),
    }
    .into_image()
    .map_err(failed)?;
    Ok(Frame { image, ..frame })
}

fn cast_image(image: DynamicImage, format: SampleFormat) -> DynamicImage {
    let color = image.color();
    let (grey, alpha) = (color.channel_count() <= 2, color.has_alpha());
    match (format, grey, alpha) {
        (SampleFormat::U8, true, false) => DynamicImage::ImageLuma8(image.to_luma8()),
        (SampleFormat::U8, true, true) => DynamicImage::ImageLumaA8(image.to_luma_alpha8()),
        (SampleFormat::U8, false, false) => DynamicImage::ImageRgb8(image.to_rgb8()),
        (SampleFormat::U8, false, true) => DynamicImage::ImageRgba8(image.to_rgba8()),
        (SampleFormat::U16, true, false) => DynamicImage::ImageLuma16(image.to_luma16()),
        (SampleFormat::U16, true, true) => DynamicImage::ImageLumaA16(image.to_luma_alpha16()),
        (SampleFormat::U16, false, false) => DynamicImage::ImageRgb16(image.to_rgb16()),
        (SampleFormat::U16, false, true) => DynamicImage::ImageRgba16(image.to_rgba16()),
        (SampleFormat::F32, _, false) => DynamicImage::ImageRgb32F(image.to_rgb32f()),
        (SampleFormat::F32, _, true) => DynamicImage::ImageRgba32F(image.to_rgba32f()),
    }
}

// ---------------------------------------------------------------------------
// Resize stage
// ---------------------------------------------------------------------------

/// Pick the processing profile for an embedded-profile transform: wide gamut
/// for 16-bit RGB sources so they keep their gamut.
pub fn processing_profile(source: Interpretation) -> (ProcessingProfile, u8) {
    let profile = if source == Interpretation::Rgb16 {
        ProcessingProfile::DisplayP3
    } else {
        ProcessingProfile::Srgb
    };
    let depth = if source.is_16_bit() { 16 } else { 8 };
    (profile, depth)
}

/// Resize a decoded (possibly pre-shrunk) frame to the requested geometry.
///
/// Shrink ratios are resolved against the page height so strips are scaled
/// per page. Records the new page height in `ctx`. The only error produced
/// here is the output pixel budget; the rest come from `ops`.
pub fn process<P: PixelOps>(
    ops: &P,
    config: &ThumbnailConfig,
    ctx: &mut RequestContext,
    frame: Frame,
) -> EngineResult<Frame> {
    let source_interpretation = frame.interpretation();
    let has_profile = frame.has_profile();

    // Profiled frames keep their channels until the transform at the end
    let mut thumb = if has_profile {
        frame
    } else {
        ops.to_processing_space(frame)?
    };

    let page_height = ctx.page_height(thumb.page_height).max(1);
    let (width, height) = thumb.dimensions();

    let ShrinkRatios {
        hshrink,
        mut vshrink,
    } = resolve_shrink(width, page_height, &ctx.query);

    let target_width = (width as f64 / hshrink).round_ties_even() as u32;
    let target_page_height = (page_height as f64 / vshrink).round_ties_even() as u32;
    let mut target_height = target_page_height;

    // Strip: hit the page height exactly so no page straddles a boundary
    if height > page_height {
        let pages = (height / page_height).max(1);
        target_height = target_page_height.saturating_mul(pages);
        vshrink = height as f64 / target_height as f64;
    }

    config.enforce_output_pixels(target_width, target_height)?;

    let premultiplied_format = if thumb.has_alpha() && hshrink != 1.0 && vshrink != 1.0 {
        let format = thumb.sample_format();
        thumb = ops.cast(ops.premultiply(thumb)?, format)?;
        Some(format)
    } else {
        None
    };

    debug!(
        target: "lazy_thumbnail::pipeline",
        width,
        height,
        page_height,
        hshrink,
        vshrink,
        target_width,
        target_height,
        premultiplied = premultiplied_format.is_some(),
        "resampling"
    );

    // Scales derived from the rounded targets so the resampler lands on them
    // exactly; equal to 1/hshrink and 1/vshrink up to that rounding.
    let hscale = target_width as f64 / width as f64;
    let vscale = target_height as f64 / height as f64;
    thumb = ops.resample(thumb, hscale, vscale)?;
    thumb.page_height = target_page_height.max(1);
    ctx.update_page_height(target_page_height);

    if let Some(format) = premultiplied_format {
        thumb = ops.cast(ops.unpremultiply(thumb)?, format)?;
    }

    if has_profile {
        let (target, depth) = processing_profile(source_interpretation);
        debug!(
            target: "lazy_thumbnail::pipeline",
            profile = target.as_str(),
            depth,
            "icc transform"
        );
        thumb = ops.icc_transform(thumb, target, depth, Intent::Perceptual)?;
    }

    Ok(thumb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{FitMode, ThumbnailQuery};
    use std::cell::RefCell;
    use std::sync::Arc;

    fn rgb(width: u32, height: u32) -> Frame {
        Frame::new(DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 7 % 256) as u8, (y * 3 % 256) as u8, 90])
        })))
    }

    fn rgba(width: u32, height: u32, alpha: u8) -> Frame {
        Frame::new(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            width,
            height,
            Rgba([200, 100, 50, alpha]),
        )))
    }

    fn ctx(w: u32, h: u32) -> RequestContext {
        RequestContext::new(ThumbnailQuery::new(w, h))
    }

    /// Wraps FirPixelOps and records the order of operations.
    #[derive(Default)]
    struct RecordingOps {
        log: RefCell<Vec<String>>,
    }

    impl RecordingOps {
        fn log(&self) -> Vec<String> {
            self.log.borrow().clone()
        }

        fn push(&self, entry: impl Into<String>) {
            self.log.borrow_mut().push(entry.into());
        }
    }

    impl PixelOps for RecordingOps {
        fn to_processing_space(&self, frame: Frame) -> EngineResult<Frame> {
            self.push("srgb");
            FirPixelOps.to_processing_space(frame)
        }
        fn premultiply(&self, frame: Frame) -> EngineResult<Frame> {
            self.push("premultiply");
            FirPixelOps.premultiply(frame)
        }
        fn unpremultiply(&self, frame: Frame) -> EngineResult<Frame> {
            self.push("unpremultiply");
            FirPixelOps.unpremultiply(frame)
        }
        fn resample(&self, frame: Frame, hscale: f64, vscale: f64) -> EngineResult<Frame> {
            self.push(format!("resample {hscale:.4} {vscale:.4}"));
            FirPixelOps.resample(frame, hscale, vscale)
        }
        fn cast(&self, frame: Frame, format: SampleFormat) -> EngineResult<Frame> {
            self.push(format!("cast {format:?}"));
            FirPixelOps.cast(frame, format)
        }
        fn icc_transform(
            &self,
            frame: Frame,
            target: ProcessingProfile,
            depth: u8,
            intent: Intent,
        ) -> EngineResult<Frame> {
            self.push(format!("icc {} {depth} {intent:?}", target.as_str()));
            FirPixelOps.icc_transform(frame, target, depth, intent)
        }
    }

    mod fir_ops {
        use super::*;

        #[test]
        fn resample_uses_independent_scales() {
            let out = FirPixelOps.resample(rgb(100, 80), 0.5, 0.25).unwrap();
            assert_eq!(out.dimensions(), (50, 20));
        }

        #[test]
        fn resample_identity_is_noop() {
            let frame = rgb(10, 10);
            let before = frame.image.clone();
            let out = FirPixelOps.resample(frame, 1.0, 1.0).unwrap();
            assert_eq!(out.image, before);
        }

        #[test]
        fn resample_keeps_16_bit_samples() {
            let frame = Frame::new(DynamicImage::ImageRgba16(ImageBuffer::from_pixel(
                8,
                8,
                Rgba([40000u16, 20000, 100, 65535]),
            )));
            let out = FirPixelOps.resample(frame, 0.5, 0.5).unwrap();
            assert!(matches!(out.image, DynamicImage::ImageRgba16(_)));
            assert_eq!(out.dimensions(), (4, 4));
            let px = out.image.to_rgba16().get_pixel(1, 1).0;
            assert!(px[0].abs_diff(40000) < 64);
        }

        #[test]
        fn premultiply_scales_colour_by_alpha() {
            let out = FirPixelOps.premultiply(rgba(2, 2, 128)).unwrap();
            let px = out.image.to_rgba8().get_pixel(0, 0).0;
            assert!(px[0].abs_diff(100) <= 1);
            assert_eq!(px[3], 128);
        }

        #[test]
        fn premultiply_round_trip_restores_opaque_pixels() {
            let frame = rgba(4, 4, 255);
            let before = frame.image.clone();
            let out = FirPixelOps
                .unpremultiply(FirPixelOps.premultiply(frame).unwrap())
                .unwrap();
            assert_eq!(out.image, before);
        }

        #[test]
        fn premultiply_ignores_opaque_layouts() {
            let frame = rgb(3, 3);
            let before = frame.image.clone();
            assert_eq!(FirPixelOps.premultiply(frame).unwrap().image, before);
        }

        #[test]
        fn processing_space_is_8_bit_srgb() {
            let grey = Frame::new(DynamicImage::ImageLuma16(ImageBuffer::new(2, 2)));
            let out = FirPixelOps.to_processing_space(grey).unwrap();
            assert!(matches!(out.image, DynamicImage::ImageRgb8(_)));

            let grey_alpha = Frame::new(DynamicImage::ImageLumaA8(ImageBuffer::new(2, 2)));
            let out = FirPixelOps.to_processing_space(grey_alpha).unwrap();
            assert!(matches!(out.image, DynamicImage::ImageRgba8(_)));
        }

        #[test]
        fn cast_keeps_channel_layout() {
            let frame = Frame::new(DynamicImage::ImageLumaA8(ImageBuffer::new(2, 2)));
            let out = FirPixelOps.cast(frame, SampleFormat::U16).unwrap();
            assert!(matches!(out.image, DynamicImage::ImageLumaA16(_)));
        }

        #[test]
        fn icc_transform_converts_depth_only() {
            let frame = rgb(2, 2).with_icc_profile(Some(vec![0u8; 128]));
            let out = FirPixelOps
                .icc_transform(frame, ProcessingProfile::DisplayP3, 16, Intent::Perceptual)
                .unwrap();
            assert!(matches!(out.image, DynamicImage::ImageRgb16(_)));
            assert_eq!(out.output_profile, None);
            assert_eq!(out.icc_profile.as_deref(), Some(&vec![0u8; 128]));
        }

        #[test]
        fn icc_transform_never_relabels_untransformed_pixels() {
            let frame = rgb(3, 3).with_icc_profile(Some(vec![7u8; 128]));
            let before = frame.image.clone();
            let out = FirPixelOps
                .icc_transform(frame, ProcessingProfile::Srgb, 8, Intent::Perceptual)
                .unwrap();
            // Samples are untouched, so the source profile must still describe them
            assert_eq!(out.image, before);
            assert!(out.has_profile());
            assert_eq!(out.output_profile, None);
        }

        #[test]
        fn resample_exact_hits_requested_size() {
            let out = resample_exact(rgba(9, 7, 10).image, 3, 2).unwrap();
            assert_eq!((out.width(), out.height()), (3, 2));
        }
    }

    mod resize_stage {
        use super::*;

        #[test]
        fn width_only_resize() {
            let mut ctx = ctx(100, 0);
            let out = process(&FirPixelOps, &ThumbnailConfig::default(), &mut ctx, rgb(400, 300))
                .unwrap();
            assert_eq!(out.dimensions(), (100, 75));
            assert_eq!(ctx.recorded_page_height(), Some(75));
            assert_eq!(out.page_height, 75);
        }

        #[test]
        fn crop_overflows_one_axis() {
            let mut ctx = RequestContext::new(ThumbnailQuery::new(100, 100).with_fit(FitMode::Crop));
            let out = process(&FirPixelOps, &ThumbnailConfig::default(), &mut ctx, rgb(400, 300))
                .unwrap();
            assert_eq!(out.dimensions(), (133, 100));
        }

        #[test]
        fn strip_is_resized_per_page() {
            // 4 pages of 40x30
            let frame = rgb(40, 120).with_pages(30, 4);
            let mut ctx = ctx(20, 0);
            let out =
                process(&FirPixelOps, &ThumbnailConfig::default(), &mut ctx, frame).unwrap();
            assert_eq!(out.dimensions(), (20, 60));
            assert_eq!(ctx.recorded_page_height(), Some(15));
            assert_eq!(out.loaded_pages(), 4);
        }

        #[test]
        fn strip_vshrink_divides_evenly() {
            // 3 pages of 100x33 to width 50: page height rounds to 16 (16.5 ties to even)
            let frame = rgb(100, 99).with_pages(33, 3);
            let mut ctx = ctx(50, 0);
            let out =
                process(&FirPixelOps, &ThumbnailConfig::default(), &mut ctx, frame).unwrap();
            assert_eq!(out.height() % ctx.recorded_page_height().unwrap(), 0);
            assert_eq!(out.height(), 3 * ctx.recorded_page_height().unwrap());
        }

        #[test]
        fn carried_page_height_wins_over_frame() {
            let frame = rgb(40, 120);
            let mut ctx = ctx(20, 0);
            ctx.update_page_height(60);
            let out =
                process(&FirPixelOps, &ThumbnailConfig::default(), &mut ctx, frame).unwrap();
            assert_eq!(out.dimensions(), (20, 60));
            assert_eq!(ctx.recorded_page_height(), Some(30));
        }

        #[test]
        fn pixel_budget_fails_fast() {
            let config = ThumbnailConfig::default().with_limit_output_pixels(100_000_000);
            let ops = RecordingOps::default();
            let mut ctx = ctx(20000, 20000);
            let err = process(&ops, &config, &mut ctx, rgb(100, 100)).unwrap_err();
            assert!(matches!(
                err,
                ThumbnailError::SizeLimitExceeded { limit: 100_000_000 }
            ));
            assert!(err.to_string().contains("100000000"));
            assert!(!ops.log().iter().any(|op| op.starts_with("resample")));
            assert_eq!(ctx.recorded_page_height(), None);
        }

        #[test]
        fn alpha_is_premultiplied_around_resample() {
            let ops = RecordingOps::default();
            let mut ctx = ctx(50, 0);
            process(&ops, &ThumbnailConfig::default(), &mut ctx, rgba(100, 100, 128)).unwrap();
            assert_eq!(
                ops.log(),
                vec![
                    "srgb",
                    "premultiply",
                    "cast U8",
                    "resample 0.5000 0.5000",
                    "unpremultiply",
                    "cast U8",
                ]
            );
        }

        #[test]
        fn no_premultiply_when_an_axis_is_unscaled() {
            let ops = RecordingOps::default();
            let query = ThumbnailQuery::new(50, 100).with_fit(FitMode::IgnoreAspect);
            let mut ctx = RequestContext::new(query);
            process(&ops, &ThumbnailConfig::default(), &mut ctx, rgba(100, 100, 128)).unwrap();
            assert!(!ops.log().iter().any(|op| op == "premultiply"));
        }

        #[test]
        fn identity_keeps_pixels() {
            let frame = rgba(16, 16, 77);
            let before = frame.image.clone();
            let mut ctx = ctx(16, 16);
            let out =
                process(&FirPixelOps, &ThumbnailConfig::default(), &mut ctx, frame).unwrap();
            assert_eq!(out.image, before);
            assert_eq!(out.sample_format(), SampleFormat::U8);
        }

        #[test]
        fn profiled_16_bit_goes_to_p3() {
            let ops = RecordingOps::default();
            let frame = Frame::new(DynamicImage::ImageRgb16(ImageBuffer::new(40, 40)))
                .with_icc_profile(Some(vec![1u8; 128]));
            let mut ctx = ctx(20, 0);
            let out = process(&ops, &ThumbnailConfig::default(), &mut ctx, frame).unwrap();
            let log = ops.log();
            assert_eq!(log.first().map(String::as_str), Some("resample 0.5000 0.5000"));
            assert_eq!(log.last().map(String::as_str), Some("icc p3 16 Perceptual"));
            assert!(matches!(out.image, DynamicImage::ImageRgb16(_)));
        }

        #[test]
        fn profiled_8_bit_goes_to_srgb() {
            let ops = RecordingOps::default();
            let frame = rgb(40, 40).with_icc_profile(Some(vec![1u8; 128]));
            let mut ctx = ctx(20, 0);
            let out = process(&ops, &ThumbnailConfig::default(), &mut ctx, frame).unwrap();
            assert_eq!(ops.log().last().map(String::as_str), Some("icc srgb 8 Perceptual"));
            assert!(out.has_profile());
            assert_eq!(out.output_profile, None);
        }

        #[test]
        fn profile_choice_by_interpretation() {
            assert_eq!(
                processing_profile(Interpretation::Rgb16),
                (ProcessingProfile::DisplayP3, 16)
            );
            assert_eq!(
                processing_profile(Interpretation::Grey16),
                (ProcessingProfile::Srgb, 16)
            );
            assert_eq!(
                processing_profile(Interpretation::Srgb),
                (ProcessingProfile::Srgb, 8)
            );
        }

        #[test]
        fn profile_is_shared_not_copied() {
            let icc = Arc::new(vec![1u8; 128]);
            let mut frame = rgb(4, 4);
            frame.icc_profile = Some(Arc::clone(&icc));
            let clone = frame.clone();
            assert!(Arc::ptr_eq(
                clone.icc_profile.as_ref().unwrap(),
                frame.icc_profile.as_ref().unwrap()
            ));
        }
    }
}
