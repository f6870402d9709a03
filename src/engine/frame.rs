// src/engine/frame.rs
//
// Decoded frames and the colour state tracked alongside them.

use image::{DynamicImage, GenericImageView};
use std::sync::Arc;

/// Numeric sample format of a frame's channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleFormat {
    U8,
    U16,
    F32,
}

impl SampleFormat {
    pub fn of(img: &DynamicImage) -> Self {
        match img {
            DynamicImage::ImageLuma16(_)
            | DynamicImage::ImageLumaA16(_)
            | DynamicImage::ImageRgb16(_)
            | DynamicImage::ImageRgba16(_) => SampleFormat::U16,
            DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => SampleFormat::F32,
            _ => SampleFormat::U8,
        }
    }

    pub fn bit_depth(&self) -> u8 {
        match self {
            SampleFormat::U8 => 8,
            SampleFormat::U16 => 16,
            SampleFormat::F32 => 32,
        }
    }
}

/// Colour interpretation of the decoded pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interpretation {
    /// 8-bit greyscale
    BW,
    /// 16-bit greyscale
    Grey16,
    /// 8-bit sRGB
    Srgb,
    /// 16-bit RGB
    Rgb16,
    /// Floating-point scRGB
    Scrgb,
}

impl Interpretation {
    pub fn of(img: &DynamicImage) -> Self {
        match img {
            DynamicImage::ImageLuma8(_) | DynamicImage::ImageLumaA8(_) => Interpretation::BW,
            DynamicImage::ImageLuma16(_) | DynamicImage::ImageLumaA16(_) => Interpretation::Grey16,
            DynamicImage::ImageRgb16(_) | DynamicImage::ImageRgba16(_) => Interpretation::Rgb16,
            DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => Interpretation::Scrgb,
            _ => Interpretation::Srgb,
        }
    }

    pub fn is_16_bit(&self) -> bool {
        matches!(self, Interpretation::Grey16 | Interpretation::Rgb16)
    }
}

/// Target of an ICC transform.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessingProfile {
    Srgb,
    /// Display P3, keeps the gamut of 16-bit wide-gamut sources
    DisplayP3,
}

impl ProcessingProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingProfile::Srgb => "srgb",
            ProcessingProfile::DisplayP3 => "p3",
        }
    }
}

/// Rendering intent for profile transforms.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Intent {
    Perceptual,
    Relative,
    Saturation,
    Absolute,
}

/// Geometry of a decode without its pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameHeader {
    pub width: u32,
    pub height: u32,
    /// Height of one page; equals `height` for single-page frames
    pub page_height: u32,
    /// Pages in the source, 1 when the format has no notion of pages
    pub n_pages: u32,
}

impl FrameHeader {
    /// Header of `loaded` pages stacked into a strip. The strip height
    /// saturates at `u32::MAX` so the dimension limits reject it later.
    pub fn strip(width: u32, page_height: u32, loaded: u32, n_pages: u32) -> Self {
        Self {
            width,
            height: page_height.saturating_mul(loaded),
            page_height,
            n_pages,
        }
    }
}

/// A decoded frame plus the metadata the thumbnail stages need.
///
/// Multi-page loads are stacked vertically ("toilet roll"): `height` is
/// `page_height` times the number of loaded pages.
#[derive(Clone, Debug)]
pub struct Frame {
    pub image: DynamicImage,
    pub page_height: u32,
    pub n_pages: u32,
    pub icc_profile: Option<Arc<Vec<u8>>>,
    /// Set once the frame has been transformed to a processing profile
    pub output_profile: Option<ProcessingProfile>,
}

impl Frame {
    pub fn new(image: DynamicImage) -> Self {
        let page_height = image.height();
        Self {
            image,
            page_height,
            n_pages: 1,
            icc_profile: None,
            output_profile: None,
        }
    }

    pub fn with_pages(mut self, page_height: u32, n_pages: u32) -> Self {
        self.page_height = page_height.max(1);
        self.n_pages = n_pages.max(1);
        self
    }

    pub fn with_icc_profile(mut self, icc: Option<Vec<u8>>) -> Self {
        self.icc_profile = icc.map(Arc::new);
        self
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Pages stacked in this frame.
    pub fn loaded_pages(&self) -> u32 {
        (self.height() / self.page_height.max(1)).max(1)
    }

    pub fn has_alpha(&self) -> bool {
        self.image.color().has_alpha()
    }

    pub fn has_profile(&self) -> bool {
        self.icc_profile.is_some()
    }

    pub fn interpretation(&self) -> Interpretation {
        Interpretation::of(&self.image)
    }

    pub fn sample_format(&self) -> SampleFormat {
        SampleFormat::of(&self.image)
    }

    pub fn header(&self) -> FrameHeader {
        FrameHeader {
            width: self.width(),
            height: self.height(),
            page_height: self.page_height,
            n_pages: self.n_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb, RgbaImage};

    #[test]
    fn new_frame_is_single_page() {
        let frame = Frame::new(DynamicImage::ImageRgb8(ImageBuffer::new(8, 6)));
        assert_eq!(frame.page_height, 6);
        assert_eq!(frame.n_pages, 1);
        assert_eq!(frame.loaded_pages(), 1);
        assert!(!frame.has_alpha());
        assert!(!frame.has_profile());
    }

    #[test]
    fn strip_frame_counts_loaded_pages() {
        let frame = Frame::new(DynamicImage::ImageRgba8(RgbaImage::new(4, 12))).with_pages(3, 10);
        assert_eq!(frame.loaded_pages(), 4);
        assert_eq!(frame.header().n_pages, 10);
        assert!(frame.has_alpha());
    }

    #[test]
    fn strip_header_height_saturates() {
        let header = FrameHeader::strip(16, 65_535, 70_000, 70_000);
        assert_eq!(header.height, u32::MAX);
        assert_eq!(header.page_height, 65_535);
        assert!(crate::engine::check_dimensions(header.width, header.height).is_err());

        let header = FrameHeader::strip(16, 10, 3, 5);
        assert_eq!((header.height, header.n_pages), (30, 5));
    }

    #[test]
    fn interpretation_tracks_bit_depth() {
        let rgb16 = DynamicImage::ImageRgb16(ImageBuffer::<Rgb<u16>, Vec<u16>>::new(2, 2));
        assert_eq!(Interpretation::of(&rgb16), Interpretation::Rgb16);
        assert!(Interpretation::of(&rgb16).is_16_bit());
        assert_eq!(SampleFormat::of(&rgb16), SampleFormat::U16);

        let luma = DynamicImage::ImageLuma8(ImageBuffer::new(2, 2));
        assert_eq!(Interpretation::of(&luma), Interpretation::BW);
        assert_eq!(SampleFormat::of(&luma).bit_depth(), 8);
    }
}
