// src/engine/shrink.rs
//
// Shrink planning: per-axis shrink ratios from the request geometry, and the
// block shrink factor for decoders with DCT scaling.

use crate::engine::config::ThumbnailConfig;
use crate::ops::{FitMode, ThumbnailQuery};
use tracing::debug;

/// Horizontal and vertical shrink ratios. 2.0 halves that axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShrinkRatios {
    pub hshrink: f64,
    pub vshrink: f64,
}

impl ShrinkRatios {
    pub const IDENTITY: ShrinkRatios = ShrinkRatios {
        hshrink: 1.0,
        vshrink: 1.0,
    };

    /// The smaller ratio: the most a uniform decode-time shrink may reduce.
    pub fn common(&self) -> f64 {
        self.hshrink.min(self.vshrink)
    }

    /// Output size for a source of `width` x `height`.
    pub fn target_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        (
            (width as f64 / self.hshrink).round_ties_even() as u32,
            (height as f64 / self.vshrink).round_ties_even() as u32,
        )
    }
}

/// Resolve the shrink ratios for a `width` x `height` source (use the page
/// height for strips).
///
/// Both ratios end up in `(0, width]` and `(0, height]` respectively.
pub fn resolve_shrink(width: u32, height: u32, query: &ThumbnailQuery) -> ShrinkRatios {
    let mut hshrink = 1.0;
    let mut vshrink = 1.0;

    let target_width = query.width;
    let target_height = query.height;

    if target_width > 0 && target_height > 0 {
        hshrink = width as f64 / target_width as f64;
        vshrink = height as f64 / target_height as f64;

        match query.fit {
            FitMode::Crop | FitMode::Min => {
                let shrink = hshrink.min(vshrink);
                hshrink = shrink;
                vshrink = shrink;
            }
            FitMode::Embed | FitMode::Max => {
                let shrink = hshrink.max(vshrink);
                hshrink = shrink;
                vshrink = shrink;
            }
            FitMode::IgnoreAspect => {}
        }
    } else if target_width > 0 {
        hshrink = width as f64 / target_width as f64;
        if query.fit != FitMode::IgnoreAspect {
            // Auto height
            vshrink = hshrink;
        }
    } else if target_height > 0 {
        vshrink = height as f64 / target_height as f64;
        if query.fit != FitMode::IgnoreAspect {
            // Auto width
            hshrink = vshrink;
        }
    }

    if query.without_enlargement {
        hshrink = hshrink.max(1.0);
        vshrink = vshrink.max(1.0);
    }

    // Never reduce an axis below one pixel
    ShrinkRatios {
        hshrink: hshrink.min(width.max(1) as f64),
        vshrink: vshrink.min(height.max(1) as f64),
    }
}

/// Smaller of the two ratios from [`resolve_shrink`].
pub fn resolve_common_shrink(width: u32, height: u32, query: &ThumbnailQuery) -> f64 {
    resolve_shrink(width, height, query).common()
}

/// Block shrink factor (1, 2, 4 or 8) to request from a DCT-scaling decoder.
pub fn resolve_jpeg_shrink(
    width: u32,
    height: u32,
    query: &ThumbnailQuery,
    config: &ThumbnailConfig,
) -> u32 {
    let shrink = resolve_common_shrink(width, height, query);
    let k = if query.fast_shrink_on_load {
        1.0
    } else {
        config.conservative_shrink_factor as f64
    };

    let mut factor = [8u32, 4, 2]
        .into_iter()
        .find(|&f| shrink >= f as f64 * k)
        .unwrap_or(1);

    // At an exact boundary decode-then-resample can land one pixel short of
    // the target; a smaller block shrink keeps the final resample upsizing.
    if factor > 1 && shrink as u32 == factor {
        factor /= 2;
    }

    debug!(
        target: "lazy_thumbnail::shrink",
        width,
        height,
        shrink,
        fast = query.fast_shrink_on_load,
        factor,
        "resolved block shrink"
    );
    factor
}
