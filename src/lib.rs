// lib.rs
//
// lazy-thumbnail: shrink planning and execution for thumbnail generation
//
// Design goals:
// - Decode as few source pixels as the format allows (shrink-on-load)
// - Exploit multi-resolution TIFF pyramids
// - Alpha-safe resampling with colour management after the resize
// - Fail fast on oversized output instead of producing partial images

pub mod engine;
pub mod error;
pub mod ops;

use engine::{BuiltinLoader, LoadOptions, Loader, Source};
use error::ThumbnailError;
use ops::ImageType;

/// Header-level facts about an encoded image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectMetadata {
    pub width: u32,
    pub height: u32,
    pub n_pages: u32,
    pub format: ImageType,
}

/// Read dimensions and page count without decoding pixels where the format
/// allows it.
pub fn inspect_header_from_bytes(data: &[u8]) -> Result<InspectMetadata, ThumbnailError> {
    let format = ImageType::detect(data);
    if format == ImageType::Unknown {
        return Err(ThumbnailError::unsupported_format("unknown"));
    }
    let source = Source::from_bytes(data.to_vec());
    let header = BuiltinLoader.header(format, &source, &LoadOptions::default())?;
    Ok(InspectMetadata {
        width: header.width,
        height: header.page_height,
        n_pages: header.n_pages,
        format,
    })
}
