// src/engine/pyramid.rs
//
// Pyramid detection for tiled multi-page TIFF. Each page of a pyramid is a
// half-size copy of the page before it; picking the smallest page that still
// covers the target skips most of the decode.

use crate::engine::common::EngineResult;
use crate::engine::config::ThumbnailConfig;
use crate::engine::decoder::{Access, LoadOptions, Loader};
use crate::engine::frame::FrameHeader;
use crate::engine::io::Source;
use crate::engine::shrink::resolve_common_shrink;
use crate::ops::{ImageType, ThumbnailQuery};
use tracing::{debug, warn};

/// A pyramid level that can stand in for the full-resolution page.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PyramidCandidate {
    pub page: u32,
    pub width: u32,
    pub height: u32,
}

/// Whether `level` has the size expected for pyramid level `index` of a
/// `width` x `height` base image.
fn matches_level(
    level: &FrameHeader,
    index: u32,
    width: u32,
    height: u32,
    config: &ThumbnailConfig,
) -> bool {
    let expected_width = width.checked_shr(index).unwrap_or(0);
    let expected_height = height.checked_shr(index).unwrap_or(0);

    // Won't be exact due to rounding in the encoder
    level.width.abs_diff(expected_width) <= config.pyramid_tolerance
        && level.height.abs_diff(expected_height) <= config.pyramid_tolerance
        && level.width >= config.pyramid_min_dimension
        && level.height >= config.pyramid_min_dimension
}

/// Find the smallest page of a TIFF pyramid whose resolution is at or above
/// the target.
///
/// Pages are probed smallest first. Every page is checked even after a
/// candidate is found, and the first page that does not look like a halving
/// of the base image rejects the whole pyramid. `Ok(None)` means "decode the
/// full image".
pub fn resolve_tiff_pyramid<L: Loader>(
    loader: &L,
    source: &Source,
    probe: &FrameHeader,
    query: &ThumbnailQuery,
    config: &ThumbnailConfig,
) -> EngineResult<Option<PyramidCandidate>> {
    let n_pages = probe.n_pages.clamp(1, config.max_pages.max(1));
    if n_pages < 2 {
        return Ok(None);
    }

    let width = probe.width;
    let height = probe.page_height;
    let mut candidate: Option<PyramidCandidate> = None;

    for index in (0..n_pages).rev() {
        let options = LoadOptions::new(config.fail_on_error)
            .access(Access::Sequential)
            .page(index);
        let level = match loader.header(ImageType::Tiff, source, &options) {
            Ok(level) => level,
            Err(err) if config.fail_on_error => return Err(err),
            Err(err) => {
                warn!(
                    target: "lazy_thumbnail::pyramid",
                    page = index,
                    error = %err,
                    "pyramid probe failed, decoding full image"
                );
                return Ok(None);
            }
        };

        if !matches_level(&level, index, width, height, config) {
            debug!(
                target: "lazy_thumbnail::pyramid",
                page = index,
                level_width = level.width,
                level_height = level.height,
                expected_width = width.checked_shr(index).unwrap_or(0),
                expected_height = height.checked_shr(index).unwrap_or(0),
                "page does not fit a pyramid"
            );
            return Ok(None);
        }

        if candidate.is_none() && resolve_common_shrink(level.width, level.height, query) >= 1.0 {
            candidate = Some(PyramidCandidate {
                page: index,
                width: level.width,
                height: level.height,
            });
        }
    }

    if let Some(found) = candidate {
        debug!(
            target: "lazy_thumbnail::pyramid",
            page = found.page,
            width = found.width,
            height = found.height,
            n_pages,
            "pyramid level selected"
        );
    }
    Ok(candidate)
}
