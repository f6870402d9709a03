// src/engine/api.rs
//
// Thumbnailer: the entry point tying decoder, shrink-on-load and the resize
// stage together for one request at a time.

use crate::engine::common::EngineResult;
use crate::engine::config::ThumbnailConfig;
use crate::engine::decoder::{detect_format, BuiltinLoader, Loader};
use crate::engine::frame::{Frame, FrameHeader};
use crate::engine::io::Source;
use crate::engine::pipeline::{process, FirPixelOps, PixelOps};
use crate::engine::strategy::{load_for_thumbnail, page_options, shrink_on_load};
use crate::error::ThumbnailError;
use crate::ops::{ImageType, RequestContext, ThumbnailQuery};
use tracing::debug;

/// Thumbnail engine.
///
/// Holds only immutable state, so one instance can serve any number of
/// requests; each request brings its own [`RequestContext`].
///
/// Usage:
/// ```no_run
/// use lazy_thumbnail::engine::{Source, ThumbnailConfig, Thumbnailer};
/// use lazy_thumbnail::ops::{RequestContext, ThumbnailQuery};
///
/// let thumbnailer = Thumbnailer::new(ThumbnailConfig::default());
/// let source = Source::map_file("photo.jpg")?;
/// let mut ctx = RequestContext::new(ThumbnailQuery::new(300, 200));
/// let frame = thumbnailer.thumbnail(&mut ctx, &source)?;
/// assert!(frame.width() <= 300);
/// # Ok::<(), lazy_thumbnail::error::ThumbnailError>(())
/// ```
#[derive(Clone, Debug)]
pub struct Thumbnailer<L = BuiltinLoader, P = FirPixelOps> {
    config: ThumbnailConfig,
    loader: L,
    pixel_ops: P,
}

impl Thumbnailer {
    /// Built-in codecs and fast_image_resize.
    pub fn new(config: ThumbnailConfig) -> Self {
        Self::with_parts(config, BuiltinLoader, FirPixelOps)
    }
}

impl Default for Thumbnailer {
    fn default() -> Self {
        Self::new(ThumbnailConfig::default())
    }
}

impl<L: Loader, P: PixelOps> Thumbnailer<L, P> {
    pub fn with_parts(config: ThumbnailConfig, loader: L, pixel_ops: P) -> Self {
        Self {
            config,
            loader,
            pixel_ops,
        }
    }

    pub fn config(&self) -> &ThumbnailConfig {
        &self.config
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// `query` with the format sniffed from `source` when the caller left it
    /// `Unknown`. Fails when no decoder can be chosen.
    pub fn resolve_query(
        &self,
        query: &ThumbnailQuery,
        source: &Source,
    ) -> EngineResult<ThumbnailQuery> {
        let resolved = self.sniff(query, source)?;
        if resolved.format == ImageType::Unknown {
            return Err(ThumbnailError::unsupported_format("unknown"));
        }
        Ok(resolved)
    }

    fn sniff(&self, query: &ThumbnailQuery, source: &Source) -> EngineResult<ThumbnailQuery> {
        let mut resolved = query.clone();
        if resolved.format == ImageType::Unknown {
            resolved.format = detect_format(&source.bytes()?);
        }
        Ok(resolved)
    }

    /// Geometry of the requested pages, without decoding pixels where the
    /// loader has a header path.
    pub fn header(&self, ctx: &RequestContext, source: &Source) -> EngineResult<FrameHeader> {
        let query = self.resolve_query(&ctx.query, source)?;
        self.read_header(&query, source)
    }

    fn read_header(&self, query: &ThumbnailQuery, source: &Source) -> EngineResult<FrameHeader> {
        let options = page_options(&self.config, query, None);
        let header = self.loader.header(query.format, source, &options)?;
        debug!(
            target: "lazy_thumbnail::pipeline",
            format = query.format.as_str(),
            width = header.width,
            height = header.height,
            page_height = header.page_height,
            n_pages = header.n_pages,
            "header read"
        );
        Ok(header)
    }

    /// Full-resolution decode of the requested pages, for callers that want
    /// the whole image before [`Thumbnailer::run`].
    ///
    /// `n = -1` is resolved against the page count from the header and
    /// capped at `max_pages`.
    pub fn probe(&self, ctx: &RequestContext, source: &Source) -> EngineResult<Frame> {
        let query = self.resolve_query(&ctx.query, source)?;
        let header = self.read_header(&query, source)?;
        let options = page_options(&self.config, &query, Some(header.n_pages));
        let frame = self.loader.load(query.format, source, &options)?;
        debug!(
            target: "lazy_thumbnail::pipeline",
            format = query.format.as_str(),
            width = frame.width(),
            height = frame.height(),
            page_height = frame.page_height,
            n_pages = frame.n_pages,
            "full decode"
        );
        Ok(frame)
    }

    /// Re-decode an already decoded frame smaller when the format supports
    /// it. An undetectable format keeps `frame`.
    pub fn shrink_on_load(
        &self,
        ctx: &RequestContext,
        source: &Source,
        frame: Frame,
    ) -> EngineResult<Frame> {
        let query = self.sniff(&ctx.query, source)?;
        shrink_on_load(&self.loader, &self.config, &query, source, frame)
    }

    /// Final resize and colour management; records the page height in `ctx`.
    pub fn process(&self, ctx: &mut RequestContext, frame: Frame) -> EngineResult<Frame> {
        process(&self.pixel_ops, &self.config, ctx, frame)
    }

    /// Shrink-on-load followed by the resize stage, for a caller that has
    /// already decoded the full frame.
    pub fn run(&self, ctx: &mut RequestContext, source: &Source, frame: Frame) -> EngineResult<Frame> {
        let frame = self.shrink_on_load(ctx, source, frame)?;
        self.process(ctx, frame)
    }

    /// Thumbnail `source`: read its header, decode only as much as the
    /// format's shrink-on-load allows, then resize.
    pub fn thumbnail(&self, ctx: &mut RequestContext, source: &Source) -> EngineResult<Frame> {
        let query = self.resolve_query(&ctx.query, source)?;
        let header = self.read_header(&query, source)?;
        let frame = load_for_thumbnail(&self.loader, &self.config, &query, source, &header)?;
        self.process(ctx, frame)
    }
}
