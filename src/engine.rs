// src/engine.rs
//
// The core of lazy-thumbnail. Plans and executes the shrink from a source's
// header to the requested thumbnail:
// 1. Resolves per-axis shrink ratios from the request geometry
// 2. Decodes smaller where the format's decoder can shrink on load
// 3. Resamples alpha-safely and applies colour management
//
// This file is a facade over the decomposed modules in engine/

// =============================================================================
// SECURITY LIMITS
// =============================================================================

/// Maximum allowed image dimension (width or height).
/// Images larger than 32768x32768 are rejected to prevent decompression bombs.
/// This is the same limit used by libvips/sharp.
pub const MAX_DIMENSION: u32 = 32768;

/// Maximum allowed total pixels (width * height) of a decoded source.
/// 100 megapixels = 400MB uncompressed RGBA. Beyond this is likely malicious.
pub const MAX_PIXELS: u64 = 100_000_000;

// =============================================================================
// MODULE DECOMPOSITION
// =============================================================================

mod api;
mod common;
mod config;
pub mod decoder;
mod frame;
mod io;
pub mod pipeline;
pub mod pyramid;
pub mod shrink;
pub mod strategy;

pub use api::Thumbnailer;
pub use common::{run_with_panic_policy, EngineResult};
pub use config::{
    ThumbnailConfig, DEFAULT_CONSERVATIVE_SHRINK_FACTOR, DEFAULT_LIMIT_OUTPUT_PIXELS,
    DEFAULT_MAX_PAGES, DEFAULT_PYRAMID_MIN_DIMENSION, DEFAULT_PYRAMID_TOLERANCE,
};
pub use decoder::{check_dimensions, detect_format, Access, BuiltinLoader, LoadOptions, Loader};
pub use frame::{Frame, FrameHeader, Intent, Interpretation, ProcessingProfile, SampleFormat};
pub use io::{extract_icc_profile, Source};
pub use pipeline::{process, FirPixelOps, PixelOps};
pub use pyramid::{resolve_tiff_pyramid, PyramidCandidate};
pub use shrink::{resolve_common_shrink, resolve_jpeg_shrink, resolve_shrink, ShrinkRatios};
pub use strategy::{
    load_for_thumbnail, page_options, plan_reload, shrink_on_load, LoadStrategy, Reload,
};
