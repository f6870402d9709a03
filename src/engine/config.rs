// src/engine/config.rs
//
// Process-lifetime configuration and the output pixel budget check.

use crate::error::ThumbnailError;

/// Default output budget, width x height. ~71 megapixels.
pub const DEFAULT_LIMIT_OUTPUT_PIXELS: u64 = 71_000_000;
/// Default cap on pages loaded or probed from one source.
pub const DEFAULT_MAX_PAGES: u32 = 256;
/// Allowed deviation (px per axis) of a pyramid level from the exact halving.
pub const DEFAULT_PYRAMID_TOLERANCE: u32 = 5;
/// Pyramid levels smaller than this on either axis are rejected.
pub const DEFAULT_PYRAMID_MIN_DIMENSION: u32 = 2;
/// Multiplier applied to JPEG shrink thresholds when `fsol` is off.
pub const DEFAULT_CONSERVATIVE_SHRINK_FACTOR: u32 = 2;

/// Immutable engine configuration, shared by every request.
///
/// The pyramid and block-shrink constants compensate for decoder rounding
/// observed in practice; they are tunable rather than derived.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThumbnailConfig {
    pub fail_on_error: bool,
    /// 0 disables the budget
    pub limit_output_pixels: u64,
    pub max_pages: u32,
    pub pyramid_tolerance: u32,
    pub pyramid_min_dimension: u32,
    pub conservative_shrink_factor: u32,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            fail_on_error: false,
            limit_output_pixels: DEFAULT_LIMIT_OUTPUT_PIXELS,
            max_pages: DEFAULT_MAX_PAGES,
            pyramid_tolerance: DEFAULT_PYRAMID_TOLERANCE,
            pyramid_min_dimension: DEFAULT_PYRAMID_MIN_DIMENSION,
            conservative_shrink_factor: DEFAULT_CONSERVATIVE_SHRINK_FACTOR,
        }
    }
}

impl ThumbnailConfig {
    /// Decoder errors are fatal, including during speculative re-decodes.
    pub fn strict() -> Self {
        Self {
            fail_on_error: true,
            ..Self::default()
        }
    }

    /// No output budget.
    pub fn unlimited() -> Self {
        Self {
            limit_output_pixels: 0,
            ..Self::default()
        }
    }

    pub fn with_fail_on_error(mut self, value: bool) -> Self {
        self.fail_on_error = value;
        self
    }

    pub fn with_limit_output_pixels(mut self, limit: u64) -> Self {
        self.limit_output_pixels = limit;
        self
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    pub fn with_pyramid_tolerance(mut self, tolerance: u32, min_dimension: u32) -> Self {
        self.pyramid_tolerance = tolerance;
        self.pyramid_min_dimension = min_dimension;
        self
    }

    pub fn with_conservative_shrink_factor(mut self, factor: u32) -> Self {
        self.conservative_shrink_factor = factor.max(1);
        self
    }

    /// Fail fast when the planned output would exceed the pixel budget.
    pub fn enforce_output_pixels(&self, width: u32, height: u32) -> Result<(), ThumbnailError> {
        if self.limit_output_pixels == 0 {
            return Ok(());
        }
        let pixels = width as u64 * height as u64;
        if pixels > self.limit_output_pixels {
            return Err(ThumbnailError::size_limit_exceeded(self.limit_output_pixels));
        }
        Ok(())
    }

    /// Number of pages to load starting at `page` from a source with
    /// `n_pages` pages. `n < 0` means every remaining page. The result is at
    /// least 1 and never more than `max_pages`.
    pub fn resolve_page_count(&self, n: i32, page: u32, n_pages: u32) -> i32 {
        let requested = match u32::try_from(n) {
            Ok(n) => n,
            Err(_) => n_pages.saturating_sub(page),
        };
        requested.clamp(1, self.max_pages.max(1)).min(i32::MAX as u32) as i32
    }
}
