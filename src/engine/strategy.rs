// src/engine/strategy.rs
//
// Shrink-on-load: re-decode the source smaller when the format's decoder can
// do part of the shrink itself.

use crate::engine::common::EngineResult;
use crate::engine::config::ThumbnailConfig;
use crate::engine::decoder::{Access, LoadOptions, Loader};
use crate::engine::frame::{Frame, FrameHeader};
use crate::engine::io::Source;
use crate::engine::pyramid::resolve_tiff_pyramid;
use crate::engine::shrink::{resolve_common_shrink, resolve_jpeg_shrink};
use crate::ops::{ImageType, ThumbnailQuery};
use tracing::{debug, warn};

/// How a format's decoder can produce a smaller frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadStrategy {
    /// Integer DCT block shrink (1, 2, 4, 8)
    BlockShrink,
    /// Continuous scale against the first page, with page selection
    /// forwarded. `upsample = false` skips the reload for scales >= 1.0.
    PagedScale { upsample: bool },
    /// Continuous scale against the whole image
    Scale,
    /// Smallest adequate level of a multi-resolution pyramid
    Pyramid,
    /// Embedded low-resolution thumbnail
    EmbeddedThumbnail,
    /// No shrink-on-load support
    Unsupported,
}

impl LoadStrategy {
    pub fn for_format(format: ImageType) -> Self {
        match format {
            ImageType::Jpeg => LoadStrategy::BlockShrink,
            ImageType::Pdf => LoadStrategy::PagedScale { upsample: true },
            // libwebp's scaler must not upsize
            ImageType::Webp => LoadStrategy::PagedScale { upsample: false },
            ImageType::Tiff => LoadStrategy::Pyramid,
            ImageType::Svg => LoadStrategy::Scale,
            ImageType::Heif => LoadStrategy::EmbeddedThumbnail,
            ImageType::Png | ImageType::Gif | ImageType::Unknown => LoadStrategy::Unsupported,
        }
    }
}

/// Decode request chosen from a source's geometry.
#[derive(Clone, Debug, PartialEq)]
pub enum Reload {
    /// No reduced decode; use the full image
    Keep,
    /// Re-decode with these options
    Decode(LoadOptions),
    /// Decode the embedded thumbnail; use it only if it would not need
    /// upsizing
    Thumbnail(LoadOptions),
}

fn base_options(config: &ThumbnailConfig) -> LoadOptions {
    LoadOptions::new(config.fail_on_error).access(Access::Sequential)
}

/// Decode options for `query`, with page selection for multi-page formats.
///
/// With `n_pages` known, `n = -1` resolves to the pages left after
/// `query.page`, capped at `max_pages`. Without it (the first header read)
/// -1 is forwarded as is.
pub fn page_options(
    config: &ThumbnailConfig,
    query: &ThumbnailQuery,
    n_pages: Option<u32>,
) -> LoadOptions {
    let options = base_options(config);
    if !query.format.is_multi_page() {
        return options;
    }
    let n = match n_pages {
        Some(n_pages) => config.resolve_page_count(query.n, query.page, n_pages),
        None if query.n < 0 => -1,
        None => config.resolve_page_count(query.n, query.page, u32::MAX),
    };
    options.page(query.page).n(n)
}

/// Decide how to re-decode a source with geometry `header`.
///
/// Pyramid detection issues header reads through `loader`; every other
/// strategy is a pure function of the header.
pub fn plan_reload<L: Loader>(
    loader: &L,
    config: &ThumbnailConfig,
    query: &ThumbnailQuery,
    source: &Source,
    header: &FrameHeader,
) -> EngineResult<Reload> {
    if !query.allows_shrink_on_load() {
        return Ok(Reload::Keep);
    }

    let FrameHeader { width, height, .. } = *header;
    let reload = match LoadStrategy::for_format(query.format) {
        LoadStrategy::BlockShrink => {
            let shrink = resolve_jpeg_shrink(width, height, query, config);
            if shrink > 1 {
                Reload::Decode(base_options(config).shrink(shrink))
            } else {
                Reload::Keep
            }
        }
        LoadStrategy::PagedScale { upsample } => {
            let scale = 1.0 / resolve_common_shrink(width, header.page_height, query);
            if upsample || scale < 1.0 {
                Reload::Decode(page_options(config, query, Some(header.n_pages)).scale(scale))
            } else {
                Reload::Keep
            }
        }
        LoadStrategy::Scale => {
            let scale = 1.0 / resolve_common_shrink(width, height, query);
            Reload::Decode(base_options(config).scale(scale))
        }
        LoadStrategy::Pyramid => {
            match resolve_tiff_pyramid(loader, source, header, query, config)? {
                Some(level) => Reload::Decode(base_options(config).page(level.page)),
                None => Reload::Keep,
            }
        }
        LoadStrategy::EmbeddedThumbnail => Reload::Thumbnail(
            page_options(config, query, Some(header.n_pages)).thumbnail(true),
        ),
        LoadStrategy::Unsupported => Reload::Keep,
    };

    debug!(
        target: "lazy_thumbnail::strategy",
        format = query.format.as_str(),
        width,
        height,
        reload = ?reload,
        "shrink-on-load plan"
    );
    Ok(reload)
}

/// Execute the plan for `header`, calling `fallback` for the frame to use
/// when there is no reload or the reload is not usable.
fn reload_or<L, F>(
    loader: &L,
    config: &ThumbnailConfig,
    query: &ThumbnailQuery,
    source: &Source,
    header: &FrameHeader,
    fallback: F,
) -> EngineResult<Frame>
where
    L: Loader,
    F: FnOnce() -> EngineResult<Frame>,
{
    let (options, thumbnail) = match plan_reload(loader, config, query, source, header)? {
        Reload::Keep => return fallback(),
        Reload::Decode(options) => (options, false),
        Reload::Thumbnail(options) => (options, true),
    };

    let reloaded = match loader.load(query.format, source, &options) {
        Ok(frame) => frame,
        Err(err) if config.fail_on_error => return Err(err),
        Err(err) => {
            warn!(
                target: "lazy_thumbnail::strategy",
                format = query.format.as_str(),
                error = %err,
                "shrink-on-load decode failed, using full decode"
            );
            return fallback();
        }
    };

    if thumbnail {
        let (thumb_width, thumb_height) = reloaded.dimensions();
        // Strictly greater: a factor clipped to exactly 1.0 would still upsize
        if resolve_common_shrink(thumb_width, thumb_height, query) > 1.0 {
            debug!(
                target: "lazy_thumbnail::strategy",
                thumb_width,
                thumb_height,
                "using embedded thumbnail"
            );
            return Ok(reloaded);
        }
        debug!(
            target: "lazy_thumbnail::strategy",
            thumb_width,
            thumb_height,
            "embedded thumbnail too small"
        );
        return fallback();
    }

    Ok(reloaded)
}

/// Decode `source` for the resize stage, planned from `header` alone.
///
/// Where the format can shrink on load only the reduced frame is decoded;
/// otherwise (or when a lenient reload fails) the full image is decoded with
/// the resolved page options.
pub fn load_for_thumbnail<L: Loader>(
    loader: &L,
    config: &ThumbnailConfig,
    query: &ThumbnailQuery,
    source: &Source,
    header: &FrameHeader,
) -> EngineResult<Frame> {
    reload_or(loader, config, query, source, header, || {
        let options = page_options(config, query, Some(header.n_pages));
        loader.load(query.format, source, &options)
    })
}

/// Re-decode an already decoded `frame` smaller where the format allows it.
///
/// A failed re-decode is fatal only with `fail_on_error`; otherwise `frame`
/// is kept.
pub fn shrink_on_load<L: Loader>(
    loader: &L,
    config: &ThumbnailConfig,
    query: &ThumbnailQuery,
    source: &Source,
    frame: Frame,
) -> EngineResult<Frame> {
    let header = frame.header();
    reload_or(loader, config, query, source, &header, || Ok(frame))
}
