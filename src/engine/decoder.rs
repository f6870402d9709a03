// src/engine/decoder.rs
//
// Decoder seam: the Loader trait, its option bag, format detection and the
// built-in loaders (JPEG via mozjpeg, PNG via zune-png, WebP via libwebp,
// TIFF via the tiff crate, everything else via the image crate).

use crate::engine::common::run_with_panic_policy;
use crate::engine::frame::{Frame, FrameHeader};
use crate::engine::io::{extract_icc_profile, Source};
use crate::engine::pipeline::resample_exact;
use crate::engine::{MAX_DIMENSION, MAX_PIXELS};
use crate::error::ThumbnailError;
use crate::ops::ImageType;
use image::{
    AnimationDecoder, DynamicImage, GrayAlphaImage, GrayImage, ImageBuffer, ImageReader, Luma,
    LumaA, Rgb, RgbImage, Rgba, RgbaImage,
};
use mozjpeg::Decompress;
use std::io::{Cursor, Read, Seek};
use tiff::decoder::{Decoder as TiffDecoder, DecodingResult};
use tiff::tags::Tag;
use tiff::ColorType as TiffColorType;
use webp::{BitstreamFeatures, Decoder as WebPDecoder};
use zune_core::colorspace::ColorSpace;
use zune_core::options::DecoderOptions;
use zune_png::PngDecoder;

// Always LazyThumbnail errors so decode failures keep their CodecError category
type DecoderResult<T> = std::result::Result<T, ThumbnailError>;

/// TIFF tag holding an embedded ICC profile.
const TIFF_TAG_ICC_PROFILE: u16 = 34675;

/// Pixel access pattern requested from the decoder.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Access {
    /// Top-to-bottom, single pass
    #[default]
    Sequential,
    Random,
}

/// Options handed to a decoder for one decode call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LoadOptions {
    pub access: Access,
    pub fail_on_error: bool,
    /// Integer block shrink (JPEG): 1, 2, 4 or 8
    pub shrink: Option<u32>,
    /// Continuous scale factor
    pub scale: Option<f64>,
    /// First page to load
    pub page: Option<u32>,
    /// Pages to load, -1 for all
    pub n: Option<i32>,
    /// Load the embedded thumbnail instead of the primary image
    pub thumbnail: bool,
}

impl LoadOptions {
    pub fn new(fail_on_error: bool) -> Self {
        Self {
            fail_on_error,
            ..Self::default()
        }
    }

    pub fn access(mut self, access: Access) -> Self {
        self.access = access;
        self
    }

    pub fn shrink(mut self, shrink: u32) -> Self {
        self.shrink = Some(shrink);
        self
    }

    pub fn scale(mut self, scale: f64) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn n(mut self, n: i32) -> Self {
        self.n = Some(n);
        self
    }

    pub fn thumbnail(mut self, thumbnail: bool) -> Self {
        self.thumbnail = thumbnail;
        self
    }
}

/// Decoder collaborator.
///
/// Implementations must accept being called many times against the same
/// [`Source`] within one request.
pub trait Loader {
    /// Geometry only; must not decode pixels when the format allows it.
    ///
    /// The default decodes the frame, for loaders with no cheaper way to
    /// learn the geometry.
    fn header(
        &self,
        format: ImageType,
        source: &Source,
        options: &LoadOptions,
    ) -> DecoderResult<FrameHeader> {
        self.load(format, source, options).map(|frame| frame.header())
    }

    fn load(&self, format: ImageType, source: &Source, options: &LoadOptions)
        -> DecoderResult<Frame>;
}

/// Detect input format using magic bytes.
pub fn detect_format(bytes: &[u8]) -> ImageType {
    if bytes.starts_with(b"%PDF-") {
        return ImageType::Pdf;
    }
    if is_heif(bytes) {
        return ImageType::Heif;
    }
    if let Ok(format) = image::guess_format(bytes) {
        let detected = ImageType::from(format);
        if detected != ImageType::Unknown {
            return detected;
        }
    }
    if is_svg(bytes) {
        return ImageType::Svg;
    }
    ImageType::Unknown
}

fn is_heif(bytes: &[u8]) -> bool {
    if bytes.len() < 12 || &bytes[4..8] != b"ftyp" {
        return false;
    }
    matches!(
        &bytes[8..12],
        b"heic" | b"heix" | b"hevc" | b"heim" | b"heis" | b"mif1" | b"msf1" | b"avif" | b"avis"
    )
}

fn is_svg(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(1024)];
    let text = String::from_utf8_lossy(head);
    let trimmed = text.trim_start_matches('\u{feff}').trim_start();
    (trimmed.starts_with("<?xml") || trimmed.starts_with("<svg") || trimmed.starts_with("<!--"))
        && text.contains("<svg")
}

/// Check if image dimensions are within safe limits.
/// Returns an error if the image is too large (potential decompression bomb).
pub fn check_dimensions(width: u32, height: u32) -> DecoderResult<()> {
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(ThumbnailError::dimension_exceeds_limit(
            width.max(height),
            MAX_DIMENSION,
        ));
    }
    let pixels = width as u64 * height as u64;
    if pixels > MAX_PIXELS {
        return Err(ThumbnailError::pixel_count_exceeds_limit(
            pixels, MAX_PIXELS,
        ));
    }
    Ok(())
}

/// Loader backed by the codec stack linked into this crate.
///
/// PDF, SVG and HEIF are detected but not decoded here; supply a [`Loader`]
/// that wraps a renderer for those.
#[derive(Clone, Copy, Debug, Default)]
pub struct BuiltinLoader;

impl Loader for BuiltinLoader {
    fn header(
        &self,
        format: ImageType,
        source: &Source,
        options: &LoadOptions,
    ) -> DecoderResult<FrameHeader> {
        let bytes = source.bytes()?;
        match format {
            ImageType::Jpeg => jpeg_header(&bytes, options),
            ImageType::Tiff => tiff_header(&bytes, options),
            ImageType::Webp => webp_header(&bytes, options),
            ImageType::Pdf | ImageType::Svg | ImageType::Heif => {
                Err(ThumbnailError::unsupported_format(format.as_str()))
            }
            _ => generic_header(&bytes),
        }
    }

    fn load(
        &self,
        format: ImageType,
        source: &Source,
        options: &LoadOptions,
    ) -> DecoderResult<Frame> {
        let bytes = source.bytes()?;
        let frame = match format {
            ImageType::Jpeg => Frame::new(decode_jpeg_mozjpeg(&bytes, options)?),
            ImageType::Png => Frame::new(decode_png_zune(&bytes)?),
            ImageType::Webp => decode_webp(&bytes, options)?,
            ImageType::Tiff => return decode_tiff(&bytes, options),
            ImageType::Pdf | ImageType::Svg | ImageType::Heif => {
                return Err(ThumbnailError::unsupported_format(format.as_str()))
            }
            _ => Frame::new(decode_with_image_crate(&bytes)?),
        };
        Ok(frame.with_icc_profile(extract_icc_profile(&bytes)))
    }
}

fn jpeg_header(data: &[u8], options: &LoadOptions) -> DecoderResult<FrameHeader> {
    let shrink = validate_jpeg_shrink(options.shrink)?;
    run_with_panic_policy("header:mozjpeg", || {
        let decompress = Decompress::new_mem(data).map_err(|e| {
            ThumbnailError::decode_failed(format!("mozjpeg header read failed: {e:?}"))
        })?;
        // libjpeg rounds scaled output up
        let width = (decompress.width() as u32).div_ceil(shrink);
        let height = (decompress.height() as u32).div_ceil(shrink);
        Ok(FrameHeader {
            width,
            height,
            page_height: height,
            n_pages: 1,
        })
    })
}

fn validate_jpeg_shrink(shrink: Option<u32>) -> DecoderResult<u32> {
    match shrink.unwrap_or(1) {
        s @ (1 | 2 | 4 | 8) => Ok(s),
        other => Err(ThumbnailError::invalid_argument(
            "shrink",
            other.to_string(),
            "JPEG shrink-on-load supports 1, 2, 4 or 8",
        )),
    }
}

/// Decode JPEG using mozjpeg (backed by libjpeg-turbo), applying the DCT
/// block shrink while decoding.
pub fn decode_jpeg_mozjpeg(data: &[u8], options: &LoadOptions) -> DecoderResult<DynamicImage> {
    let shrink = validate_jpeg_shrink(options.shrink)?;
    run_with_panic_policy("decode:mozjpeg", || {
        if options.fail_on_error && !data.windows(2).any(|pair| pair == [0xFF, 0xD9]) {
            return Err(ThumbnailError::decode_failed(
                "mozjpeg: missing JPEG EOI marker",
            ));
        }

        let mut decompress = Decompress::new_mem(data).map_err(|e| {
            ThumbnailError::decode_failed(format!("mozjpeg decompress init failed: {e:?}"))
        })?;
        // The limit applies to what is decoded, which is the scaled size
        check_dimensions(
            (decompress.width() as u32).div_ceil(shrink),
            (decompress.height() as u32).div_ceil(shrink),
        )?;
        decompress.scale((8 / shrink) as u8);

        let mut decompress = decompress.rgb().map_err(|e| {
            ThumbnailError::decode_failed(format!("mozjpeg rgb conversion failed: {e:?}"))
        })?;

        let width = decompress.width() as u32;
        let height = decompress.height() as u32;

        let pixels: Vec<[u8; 3]> = decompress.read_scanlines().map_err(|e| {
            ThumbnailError::decode_failed(format!("mozjpeg: failed to read scanlines: {e:?}"))
        })?;
        let flat_pixels: Vec<u8> = pixels.into_iter().flatten().collect();

        let rgb_image = RgbImage::from_raw(width, height, flat_pixels).ok_or_else(|| {
            ThumbnailError::decode_failed("mozjpeg: failed to create image from raw data")
        })?;

        Ok(DynamicImage::ImageRgb8(rgb_image))
    })
}

/// Decode PNG using zune-png, keeping 16-bit samples.
pub fn decode_png_zune(data: &[u8]) -> DecoderResult<DynamicImage> {
    run_with_panic_policy("decode:png", || {
        let mut decoder = PngDecoder::new_with_options(Cursor::new(data), DecoderOptions::default());
        decoder
            .decode_headers()
            .map_err(|e| ThumbnailError::decode_failed(format!("png: header failed: {e:?}")))?;
        let info = decoder
            .info()
            .ok_or_else(|| ThumbnailError::decode_failed("png: missing header info"))?;
        let width = info.width as u32;
        let height = info.height as u32;
        check_dimensions(width, height)?;

        let colorspace = decoder
            .colorspace()
            .ok_or_else(|| ThumbnailError::decode_failed("png: missing colorspace"))?;
        let pixels = decoder
            .decode()
            .map_err(|e| ThumbnailError::decode_failed(format!("png: decode failed: {e:?}")))?;

        let build_failed = || ThumbnailError::decode_failed("png: buffer does not match header");
        let img = match (pixels, colorspace) {
            (zune_core::result::DecodingResult::U8(buf), ColorSpace::RGB) => {
                RgbImage::from_raw(width, height, buf).map(DynamicImage::ImageRgb8)
            }
            (zune_core::result::DecodingResult::U8(buf), ColorSpace::RGBA) => {
                RgbaImage::from_raw(width, height, buf).map(DynamicImage::ImageRgba8)
            }
            (zune_core::result::DecodingResult::U8(buf), ColorSpace::Luma) => {
                GrayImage::from_raw(width, height, buf).map(DynamicImage::ImageLuma8)
            }
            (zune_core::result::DecodingResult::U8(buf), ColorSpace::LumaA) => {
                GrayAlphaImage::from_raw(width, height, buf).map(DynamicImage::ImageLumaA8)
            }
            (zune_core::result::DecodingResult::U16(buf), ColorSpace::RGB) => {
                ImageBuffer::<Rgb<u16>, _>::from_raw(width, height, buf)
                    .map(DynamicImage::ImageRgb16)
            }
            (zune_core::result::DecodingResult::U16(buf), ColorSpace::RGBA) => {
                ImageBuffer::<Rgba<u16>, _>::from_raw(width, height, buf)
                    .map(DynamicImage::ImageRgba16)
            }
            (zune_core::result::DecodingResult::U16(buf), ColorSpace::Luma) => {
                ImageBuffer::<Luma<u16>, _>::from_raw(width, height, buf)
                    .map(DynamicImage::ImageLuma16)
            }
            (zune_core::result::DecodingResult::U16(buf), ColorSpace::LumaA) => {
                ImageBuffer::<LumaA<u16>, _>::from_raw(width, height, buf)
                    .map(DynamicImage::ImageLumaA16)
            }
            (_, other) => {
                return Err(ThumbnailError::decode_failed(format!(
                    "png: unsupported colorspace {:?}",
                    other
                )))
            }
        };

        img.ok_or_else(build_failed)
    })
}

/// Decode anything else using the image crate under the panic policy.
pub fn decode_with_image_crate(data: &[u8]) -> DecoderResult<DynamicImage> {
    run_with_panic_policy("decode:image", || {
        let (width, height) = read_dimensions(data)?;
        check_dimensions(width, height)?;
        image::load_from_memory(data)
            .map_err(|e| ThumbnailError::decode_failed(format!("decode failed: {e}")))
    })
}

fn read_dimensions(data: &[u8]) -> DecoderResult<(u32, u32)> {
    ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| ThumbnailError::decode_failed(format!("failed to read image header: {e}")))?
        .into_dimensions()
        .map_err(|e| ThumbnailError::decode_failed(format!("failed to read dimensions: {e}")))
}

fn generic_header(data: &[u8]) -> DecoderResult<FrameHeader> {
    let (width, height) = read_dimensions(data)?;
    Ok(FrameHeader {
        width,
        height,
        page_height: height,
        n_pages: 1,
    })
}

// ---------------------------------------------------------------------------
// WebP
// ---------------------------------------------------------------------------

fn webp_scaled(width: u32, height: u32, scale: Option<f64>) -> (u32, u32) {
    match scale {
        // libwebp's scaler never upsamples
        Some(s) if s < 1.0 => (
            ((width as f64 * s).round() as u32).max(1),
            ((height as f64 * s).round() as u32).max(1),
        ),
        _ => (width, height),
    }
}

fn webp_header(data: &[u8], options: &LoadOptions) -> DecoderResult<FrameHeader> {
    let features = BitstreamFeatures::new(data)
        .ok_or_else(|| ThumbnailError::decode_failed("webp: failed to read bitstream features"))?;
    let n_pages = if features.has_animation() {
        webp_frame_count(data)?
    } else {
        1
    };
    let pages = requested_pages(options, n_pages)?.1;
    let (width, page_height) = webp_scaled(features.width(), features.height(), options.scale);
    Ok(FrameHeader::strip(width, page_height, pages, n_pages))
}

fn webp_frame_count(data: &[u8]) -> DecoderResult<u32> {
    let decoder = image::codecs::webp::WebPDecoder::new(Cursor::new(data))
        .map_err(|e| ThumbnailError::decode_failed(format!("webp: {e}")))?;
    Ok(decoder.into_frames().count().max(1) as u32)
}

/// Resolve `(first_page, page_count)` from the options against the pages
/// available in the source.
fn requested_pages(options: &LoadOptions, n_pages: u32) -> DecoderResult<(u32, u32)> {
    let page = options.page.unwrap_or(0);
    if page >= n_pages {
        return Err(ThumbnailError::invalid_argument(
            "page",
            page.to_string(),
            format!("source has {n_pages} page(s)"),
        ));
    }
    let available = n_pages - page;
    let count = match options.n.unwrap_or(1) {
        n if n < 0 => available,
        0 => 1,
        n => (n as u32).min(available),
    };
    Ok((page, count))
}

/// Decode WebP using libwebp; animated files go through the image crate so
/// frames can be selected and stacked into a strip.
fn decode_webp(data: &[u8], options: &LoadOptions) -> DecoderResult<Frame> {
    run_with_panic_policy("decode:webp", || {
        let features = BitstreamFeatures::new(data).ok_or_else(|| {
            ThumbnailError::decode_failed("webp: failed to read bitstream features")
        })?;
        check_dimensions(features.width(), features.height())?;

        let frame = if features.has_animation() {
            decode_webp_animation(data, options)?
        } else {
            let decoded = WebPDecoder::new(data)
                .decode()
                .ok_or_else(|| ThumbnailError::decode_failed("webp: decode failed"))?;
            check_dimensions(decoded.width(), decoded.height())?;
            Frame::new(decoded.to_image())
        };

        match options.scale {
            Some(scale) if scale < 1.0 => {
                let (width, page_height) =
                    webp_scaled(frame.width(), frame.page_height, Some(scale));
                let pages = frame.loaded_pages();
                let n_pages = frame.n_pages;
                let scaled = resample_exact(frame.image, width, page_height.saturating_mul(pages))?;
                Ok(Frame::new(scaled).with_pages(page_height, n_pages))
            }
            _ => Ok(frame),
        }
    })
}

fn decode_webp_animation(data: &[u8], options: &LoadOptions) -> DecoderResult<Frame> {
    let decoder = image::codecs::webp::WebPDecoder::new(Cursor::new(data))
        .map_err(|e| ThumbnailError::decode_failed(format!("webp: {e}")))?;
    let frames = decoder
        .into_frames()
        .collect_frames()
        .map_err(|e| ThumbnailError::decode_failed(format!("webp: animation decode failed: {e}")))?;
    let n_pages = frames.len().max(1) as u32;
    let (page, count) = requested_pages(options, n_pages)?;

    let mut buffers = frames
        .into_iter()
        .skip(page as usize)
        .take(count as usize)
        .map(|f| f.into_buffer());
    let first = buffers
        .next()
        .ok_or_else(|| ThumbnailError::decode_failed("webp: animation has no frames"))?;
    let (width, page_height) = first.dimensions();
    let mut raw = first.into_raw();
    for buffer in buffers {
        raw.extend_from_slice(buffer.as_raw());
    }

    let height = page_height.saturating_mul(count);
    check_dimensions(width, height)?;
    let strip = RgbaImage::from_raw(width, height, raw)
        .ok_or_else(|| ThumbnailError::decode_failed("webp: failed to stack frames"))?;
    Ok(Frame::new(DynamicImage::ImageRgba8(strip)).with_pages(page_height, n_pages))
}

// ---------------------------------------------------------------------------
// TIFF
// ---------------------------------------------------------------------------

fn open_tiff<R: Read + Seek>(reader: R) -> DecoderResult<TiffDecoder<R>> {
    TiffDecoder::new(reader).map_err(|e| ThumbnailError::decode_failed(format!("tiff: {e}")))
}

fn tiff_error(e: tiff::TiffError) -> ThumbnailError {
    ThumbnailError::decode_failed(format!("tiff: {e}"))
}

/// Count IFDs by walking the chain; leaves the decoder on the last page.
fn tiff_page_count<R: Read + Seek>(decoder: &mut TiffDecoder<R>) -> DecoderResult<u32> {
    let mut count = 1u32;
    while decoder.more_images() {
        decoder.next_image().map_err(tiff_error)?;
        count += 1;
    }
    Ok(count)
}

fn tiff_header(data: &[u8], options: &LoadOptions) -> DecoderResult<FrameHeader> {
    let mut decoder = open_tiff(Cursor::new(data))?;
    let n_pages = tiff_page_count(&mut decoder)?;
    let (page, count) = requested_pages(options, n_pages)?;
    decoder.seek_to_image(page as usize).map_err(tiff_error)?;
    let (width, page_height) = decoder.dimensions().map_err(tiff_error)?;
    Ok(FrameHeader::strip(width, page_height, count, n_pages))
}

enum TiffSamples {
    U8(Vec<u8>),
    U16(Vec<u16>),
}

fn decode_tiff(data: &[u8], options: &LoadOptions) -> DecoderResult<Frame> {
    let mut decoder = open_tiff(Cursor::new(data))?;
    let n_pages = tiff_page_count(&mut decoder)?;
    let (page, count) = requested_pages(options, n_pages)?;

    decoder.seek_to_image(page as usize).map_err(tiff_error)?;
    let (width, page_height) = decoder.dimensions().map_err(tiff_error)?;
    check_dimensions(width, page_height.saturating_mul(count))?;
    let colortype = decoder.colortype().map_err(tiff_error)?;
    let icc = decoder
        .find_tag(Tag::Unknown(TIFF_TAG_ICC_PROFILE))
        .ok()
        .flatten()
        .and_then(|value| value.into_u8_vec().ok());

    let mut samples: Option<TiffSamples> = None;
    for index in page..page + count {
        if index != page {
            decoder.seek_to_image(index as usize).map_err(tiff_error)?;
            if decoder.dimensions().map_err(tiff_error)? != (width, page_height)
                || decoder.colortype().map_err(tiff_error)? != colortype
            {
                return Err(ThumbnailError::decode_failed(
                    "tiff: pages differ in size or colour type, cannot load as a strip",
                ));
            }
        }
        match (decoder.read_image().map_err(tiff_error)?, samples.as_mut()) {
            (DecodingResult::U8(buf), None) => samples = Some(TiffSamples::U8(buf)),
            (DecodingResult::U16(buf), None) => samples = Some(TiffSamples::U16(buf)),
            (DecodingResult::U8(buf), Some(TiffSamples::U8(acc))) => acc.extend(buf),
            (DecodingResult::U16(buf), Some(TiffSamples::U16(acc))) => acc.extend(buf),
            _ => {
                return Err(ThumbnailError::decode_failed(
                    "tiff: unsupported sample format",
                ))
            }
        }
    }

    let height = page_height.saturating_mul(count);
    let samples =
        samples.ok_or_else(|| ThumbnailError::decode_failed("tiff: no pages decoded"))?;
    let image = tiff_to_dynamic(width, height, colortype, samples)?;
    Ok(Frame::new(image)
        .with_pages(page_height, n_pages)
        .with_icc_profile(icc))
}

fn tiff_to_dynamic(
    width: u32,
    height: u32,
    colortype: TiffColorType,
    samples: TiffSamples,
) -> DecoderResult<DynamicImage> {
    let image = match (colortype, samples) {
        (TiffColorType::Gray(8), TiffSamples::U8(buf)) => {
            GrayImage::from_raw(width, height, buf).map(DynamicImage::ImageLuma8)
        }
        (TiffColorType::GrayA(8), TiffSamples::U8(buf)) => {
            GrayAlphaImage::from_raw(width, height, buf).map(DynamicImage::ImageLumaA8)
        }
        (TiffColorType::RGB(8), TiffSamples::U8(buf)) => {
            RgbImage::from_raw(width, height, buf).map(DynamicImage::ImageRgb8)
        }
        (TiffColorType::RGBA(8), TiffSamples::U8(buf)) => {
            RgbaImage::from_raw(width, height, buf).map(DynamicImage::ImageRgba8)
        }
        (TiffColorType::Gray(16), TiffSamples::U16(buf)) => {
            ImageBuffer::<Luma<u16>, _>::from_raw(width, height, buf).map(DynamicImage::ImageLuma16)
        }
        (TiffColorType::GrayA(16), TiffSamples::U16(buf)) => {
            ImageBuffer::<LumaA<u16>, _>::from_raw(width, height, buf)
                .map(DynamicImage::ImageLumaA16)
        }
        (TiffColorType::RGB(16), TiffSamples::U16(buf)) => {
            ImageBuffer::<Rgb<u16>, _>::from_raw(width, height, buf).map(DynamicImage::ImageRgb16)
        }
        (TiffColorType::RGBA(16), TiffSamples::U16(buf)) => {
            ImageBuffer::<Rgba<u16>, _>::from_raw(width, height, buf)
                .map(DynamicImage::ImageRgba16)
        }
        (other, _) => {
            return Err(ThumbnailError::unsupported_format(format!(
                "tiff colour type {other:?}"
            )))
        }
    };
    image.ok_or_else(|| ThumbnailError::decode_failed("tiff: buffer does not match header"))
}


#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::cell::RefCell;

    /// Loader that fabricates blank frames from a page table and records
    /// every call.
    #[derive(Default)]
    pub(crate) struct ScriptedLoader {
        /// (width, height) per page
        pub pages: Vec<(u32, u32)>,
        pub thumbnail: Option<(u32, u32)>,
        pub fail: bool,
        pub calls: RefCell<Vec<LoadOptions>>,
    }

    impl ScriptedLoader {
        pub(crate) fn with_pages(pages: &[(u32, u32)]) -> Self {
            Self {
                pages: pages.to_vec(),
                ..Self::default()
            }
        }

        pub(crate) fn failing(pages: &[(u32, u32)]) -> Self {
            Self {
                fail: true,
                ..Self::with_pages(pages)
            }
        }

        pub(crate) fn calls(&self) -> Vec<LoadOptions> {
            self.calls.borrow().clone()
        }

        fn page(&self, options: &LoadOptions) -> DecoderResult<(u32, u32)> {
            self.calls.borrow_mut().push(options.clone());
            if self.fail {
                return Err(ThumbnailError::decode_failed("scripted failure"));
            }
            let index = options.page.unwrap_or(0) as usize;
            self.pages
                .get(index)
                .copied()
                .ok_or_else(|| ThumbnailError::decode_failed("no such page"))
        }
    }

    impl Loader for ScriptedLoader {
        fn header(
            &self,
            _format: ImageType,
            _source: &Source,
            options: &LoadOptions,
        ) -> DecoderResult<FrameHeader> {
            let (width, height) = self.page(options)?;
            Ok(FrameHeader {
                width,
                height,
                page_height: height,
                n_pages: self.pages.len() as u32,
            })
        }

        fn load(
            &self,
            _format: ImageType,
            _source: &Source,
            options: &LoadOptions,
        ) -> DecoderResult<Frame> {
            let (mut width, mut height) = self.page(options)?;
            if options.thumbnail {
                if let Some(dims) = self.thumbnail {
                    (width, height) = dims;
                }
            }
            if let Some(shrink) = options.shrink {
                width = width.div_ceil(shrink);
                height = height.div_ceil(shrink);
            }
            if let Some(scale) = options.scale {
                width = ((width as f64 * scale).round() as u32).max(1);
                height = ((height as f64 * scale).round() as u32).max(1);
            }
            let image = DynamicImage::ImageRgb8(RgbImage::new(width, height));
            Ok(Frame::new(image).with_pages(height, self.pages.len() as u32))
        }
    }
}
