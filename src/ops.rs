// src/ops.rs
//
// Request parameters for a thumbnail run.
// Cheap to build and copy - the expensive work happens in engine::Thumbnailer.

use crate::error::ThumbnailError;
use std::fmt;
use std::str::FromStr;

/// How the source aspect ratio is reconciled with a target box.
///
/// `Crop`/`Min` and `Embed`/`Max` share the same shrink coupling; they only
/// differ in what later stages do with the overflowing or missing pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FitMode {
    /// Cover the box, overflow gets cropped later
    Crop,
    /// Cover the box, keep the overflow
    Min,
    /// Fit inside the box, pad later
    Embed,
    /// Fit inside the box
    #[default]
    Max,
    /// Stretch each axis independently
    IgnoreAspect,
}

impl FitMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FitMode::Crop => "crop",
            FitMode::Min => "min",
            FitMode::Embed => "embed",
            FitMode::Max => "max",
            FitMode::IgnoreAspect => "ignore_aspect",
        }
    }
}

impl FromStr for FitMode {
    type Err = ThumbnailError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "crop" | "cover" => Ok(FitMode::Crop),
            "min" => Ok(FitMode::Min),
            "embed" | "contain" => Ok(FitMode::Embed),
            "max" | "inside" => Ok(FitMode::Max),
            "ignore_aspect" | "fill" => Ok(FitMode::IgnoreAspect),
            other => Err(ThumbnailError::invalid_fit(other.to_string())),
        }
    }
}

impl fmt::Display for FitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detected container format of the source.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ImageType {
    Jpeg,
    Png,
    Webp,
    Tiff,
    Gif,
    Pdf,
    Svg,
    Heif,
    #[default]
    Unknown,
}

impl ImageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageType::Jpeg => "jpeg",
            ImageType::Png => "png",
            ImageType::Webp => "webp",
            ImageType::Tiff => "tiff",
            ImageType::Gif => "gif",
            ImageType::Pdf => "pdf",
            ImageType::Svg => "svg",
            ImageType::Heif => "heif",
            ImageType::Unknown => "unknown",
        }
    }

    /// Detect the format from magic bytes.
    pub fn detect(bytes: &[u8]) -> Self {
        crate::engine::decoder::detect_format(bytes)
    }

    /// Formats whose decoder can return more than one page.
    pub fn is_multi_page(&self) -> bool {
        matches!(
            self,
            ImageType::Webp | ImageType::Tiff | ImageType::Gif | ImageType::Pdf | ImageType::Heif
        )
    }
}

impl From<image::ImageFormat> for ImageType {
    fn from(format: image::ImageFormat) -> Self {
        match format {
            image::ImageFormat::Jpeg => ImageType::Jpeg,
            image::ImageFormat::Png => ImageType::Png,
            image::ImageFormat::WebP => ImageType::Webp,
            image::ImageFormat::Tiff => ImageType::Tiff,
            image::ImageFormat::Gif => ImageType::Gif,
            image::ImageFormat::Avif => ImageType::Heif,
            _ => ImageType::Unknown,
        }
    }
}

impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request parameters, read-only for the whole request.
///
/// `width`/`height` of 0 mean "not given". `n` follows the decoder
/// convention: -1 loads every page, otherwise the number of pages starting
/// at `page`.
#[derive(Clone, Debug, PartialEq)]
pub struct ThumbnailQuery {
    pub width: u32,
    pub height: u32,
    pub fit: FitMode,
    /// `we`: never upscale
    pub without_enlargement: bool,
    pub trim: bool,
    /// `gam`: 0.0 disables gamma correction
    pub gamma: f32,
    pub n: i32,
    pub page: u32,
    /// `fsol`: fast shrink-on-load
    pub fast_shrink_on_load: bool,
    /// Source format; `Unknown` lets the engine sniff the source without
    /// writing the result back here
    pub format: ImageType,
}

impl Default for ThumbnailQuery {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            fit: FitMode::Max,
            without_enlargement: false,
            trim: false,
            gamma: 0.0,
            n: 1,
            page: 0,
            fast_shrink_on_load: true,
            format: ImageType::Unknown,
        }
    }
}

impl ThumbnailQuery {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    pub fn with_width(mut self, width: u32) -> Self {
        self.width = width;
        self
    }

    pub fn with_height(mut self, height: u32) -> Self {
        self.height = height;
        self
    }

    pub fn with_fit(mut self, fit: FitMode) -> Self {
        self.fit = fit;
        self
    }

    pub fn without_enlargement(mut self, value: bool) -> Self {
        self.without_enlargement = value;
        self
    }

    pub fn with_trim(mut self, value: bool) -> Self {
        self.trim = value;
        self
    }

    pub fn with_gamma(mut self, gamma: f32) -> Self {
        self.gamma = gamma;
        self
    }

    pub fn with_pages(mut self, page: u32, n: i32) -> Self {
        self.page = page;
        self.n = n;
        self
    }

    pub fn with_fast_shrink_on_load(mut self, value: bool) -> Self {
        self.fast_shrink_on_load = value;
        self
    }

    pub fn with_format(mut self, format: ImageType) -> Self {
        self.format = format;
        self
    }

    /// At least one target axis was requested.
    pub fn has_target(&self) -> bool {
        self.width > 0 || self.height > 0
    }

    /// Shrink-on-load needs the thumbnail to be derivable from fewer source
    /// pixels. Trim and gamma both inspect the full-resolution image.
    pub fn allows_shrink_on_load(&self) -> bool {
        !self.trim && self.gamma == 0.0 && self.has_target()
    }
}

/// Per-request state threaded through the pipeline.
///
/// Owned by exactly one in-flight request. `page_height` is written once by
/// the resize stage so later stages (crop, embed, encoders) can lay out the
/// pages of a strip.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    pub query: ThumbnailQuery,
    page_height: Option<u32>,
}

impl RequestContext {
    pub fn new(query: ThumbnailQuery) -> Self {
        Self {
            query,
            page_height: None,
        }
    }

    /// Carried page height, or `default` when no stage has recorded one yet.
    pub fn page_height(&self, default: u32) -> u32 {
        self.page_height.unwrap_or(default)
    }

    pub fn recorded_page_height(&self) -> Option<u32> {
        self.page_height
    }

    pub(crate) fn update_page_height(&mut self, page_height: u32) {
        self.page_height = Some(page_height);
    }
}
