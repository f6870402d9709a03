// src/error.rs
//
// Unified error handling for lazy-thumbnail
// Uses thiserror for simple, type-safe error handling
//
// Error Taxonomy:
// - UserError: Invalid request parameters, recoverable
// - CodecError: Decode/resample/colour issues
// - ResourceLimit: Output budget, input dimension limits, I/O pressure
// - InternalBug: Library bugs (should not happen)

use std::borrow::Cow;
use thiserror::Error;

/// Error taxonomy used by callers to map failures onto responses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCategory {
    /// Invalid request, recoverable by the caller
    UserError,
    /// Format/decode/resample issues
    CodecError,
    /// Pixel budget, dimension limits and I/O pressure
    ResourceLimit,
    /// Library bugs (should not happen)
    InternalBug,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::UserError => "UserError",
            ErrorCategory::CodecError => "CodecError",
            ErrorCategory::ResourceLimit => "ResourceLimit",
            ErrorCategory::InternalBug => "InternalBug",
        }
    }
}

/// lazy-thumbnail error types
///
/// Only `SizeLimitExceeded` is produced by the resize stage itself; the rest
/// come from the collaborators (decoders, pixel operations, sources).
/// A rejected pyramid or embedded thumbnail is never an error.
#[derive(Debug, Error)]
pub enum ThumbnailError {
    // Size Limit Errors
    #[error("Output image exceeds pixel limit. Width x height should be less than {limit}")]
    SizeLimitExceeded { limit: u64 },

    #[error("Image dimension {dimension} exceeds maximum {max}")]
    DimensionExceedsLimit { dimension: u32, max: u32 },

    #[error("Image pixel count {pixels} exceeds maximum {max}")]
    PixelCountExceedsLimit { pixels: u64, max: u64 },

    // Source Errors
    #[error("Failed to read file '{path}': {source}")]
    FileReadFailed {
        path: Cow<'static, str>,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to memory-map file '{path}': {source}")]
    MmapFailed {
        path: Cow<'static, str>,
        #[source]
        source: std::io::Error,
    },

    // Decode Errors
    #[error("Unsupported image format: {format}")]
    UnsupportedFormat { format: Cow<'static, str> },

    #[error("Failed to decode image: {message}")]
    DecodeFailed { message: Cow<'static, str> },

    // Processing Errors
    #[error("Resize failed ({source_width}x{source_height} -> {target_width}x{target_height}): {message}")]
    ResizeFailed {
        source_width: u32,
        source_height: u32,
        target_width: u32,
        target_height: u32,
        message: Cow<'static, str>,
    },

    #[error("Colour transform to {target} failed: {message}")]
    ColourTransformFailed {
        target: Cow<'static, str>,
        message: Cow<'static, str>,
    },

    // Request Errors
    #[error("Invalid fit: '{value}'. Expected crop, min, embed, max or ignore_aspect")]
    InvalidFit { value: Cow<'static, str> },

    #[error("Invalid value for {name}: {value}. {reason}")]
    InvalidArgument {
        name: Cow<'static, str>,
        value: Cow<'static, str>,
        reason: Cow<'static, str>,
    },

    // Internal Errors
    #[error("Internal error: {message}")]
    InternalPanic { message: Cow<'static, str> },
}

impl Clone for ThumbnailError {
    fn clone(&self) -> Self {
        match self {
            Self::SizeLimitExceeded { limit } => Self::SizeLimitExceeded { limit: *limit },
            Self::DimensionExceedsLimit { dimension, max } => Self::DimensionExceedsLimit {
                dimension: *dimension,
                max: *max,
            },
            Self::PixelCountExceedsLimit { pixels, max } => Self::PixelCountExceedsLimit {
                pixels: *pixels,
                max: *max,
            },
            Self::FileReadFailed { path, source } => Self::FileReadFailed {
                path: path.clone(),
                source: std::io::Error::new(source.kind(), source.to_string()),
            },
            Self::MmapFailed { path, source } => Self::MmapFailed {
                path: path.clone(),
                source: std::io::Error::new(source.kind(), source.to_string()),
            },
            Self::UnsupportedFormat { format } => Self::UnsupportedFormat {
                format: format.clone(),
            },
            Self::DecodeFailed { message } => Self::DecodeFailed {
                message: message.clone(),
            },
            Self::ResizeFailed {
                source_width,
                source_height,
                target_width,
                target_height,
                message,
            } => Self::ResizeFailed {
                source_width: *source_width,
                source_height: *source_height,
                target_width: *target_width,
                target_height: *target_height,
                message: message.clone(),
            },
            Self::ColourTransformFailed { target, message } => Self::ColourTransformFailed {
                target: target.clone(),
                message: message.clone(),
            },
            Self::InvalidFit { value } => Self::InvalidFit {
                value: value.clone(),
            },
            Self::InvalidArgument {
                name,
                value,
                reason,
            } => Self::InvalidArgument {
                name: name.clone(),
                value: value.clone(),
                reason: reason.clone(),
            },
            Self::InternalPanic { message } => Self::InternalPanic {
                message: message.clone(),
            },
        }
    }
}

// Constructor Helpers
impl ThumbnailError {
    pub fn size_limit_exceeded(limit: u64) -> Self {
        Self::SizeLimitExceeded { limit }
    }

    pub fn dimension_exceeds_limit(dimension: u32, max: u32) -> Self {
        Self::DimensionExceedsLimit { dimension, max }
    }

    pub fn pixel_count_exceeds_limit(pixels: u64, max: u64) -> Self {
        Self::PixelCountExceedsLimit { pixels, max }
    }

    pub fn file_read_failed(path: impl Into<Cow<'static, str>>, source: std::io::Error) -> Self {
        Self::FileReadFailed {
            path: path.into(),
            source,
        }
    }

    pub fn mmap_failed(path: impl Into<Cow<'static, str>>, source: std::io::Error) -> Self {
        Self::MmapFailed {
            path: path.into(),
            source,
        }
    }

    pub fn unsupported_format(format: impl Into<Cow<'static, str>>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }

    pub fn decode_failed(message: impl Into<Cow<'static, str>>) -> Self {
        Self::DecodeFailed {
            message: message.into(),
        }
    }

    pub fn resize_failed(
        source_dims: (u32, u32),
        target_dims: (u32, u32),
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::ResizeFailed {
            source_width: source_dims.0,
            source_height: source_dims.1,
            target_width: target_dims.0,
            target_height: target_dims.1,
            message: message.into(),
        }
    }

    pub fn colour_transform_failed(
        target: impl Into<Cow<'static, str>>,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::ColourTransformFailed {
            target: target.into(),
            message: message.into(),
        }
    }

    pub fn invalid_fit(value: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidFit {
            value: value.into(),
        }
    }

    pub fn invalid_argument(
        name: impl Into<Cow<'static, str>>,
        value: impl Into<Cow<'static, str>>,
        reason: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn internal_panic(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InternalPanic {
            message: message.into(),
        }
    }

    /// Check if this error is recoverable (caller can fix it)
    ///
    /// Consistent with category():
    /// - UserError and ResourceLimit errors are recoverable (smaller target, other parameters)
    /// - CodecError and InternalBug errors are not
    pub fn is_recoverable(&self) -> bool {
        match self.category() {
            ErrorCategory::UserError | ErrorCategory::ResourceLimit => true,
            ErrorCategory::CodecError | ErrorCategory::InternalBug => false,
        }
    }

    /// Get the error category for this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidFit { .. } | Self::InvalidArgument { .. } => ErrorCategory::UserError,

            Self::UnsupportedFormat { .. }
            | Self::DecodeFailed { .. }
            | Self::ResizeFailed { .. }
            | Self::ColourTransformFailed { .. } => ErrorCategory::CodecError,

            // FileReadFailed/MmapFailed usually mean the source went away or the
            // host is under pressure; retrying with the same request may succeed.
            Self::SizeLimitExceeded { .. }
            | Self::DimensionExceedsLimit { .. }
            | Self::PixelCountExceedsLimit { .. }
            | Self::FileReadFailed { .. }
            | Self::MmapFailed { .. } => ErrorCategory::ResourceLimit,

            Self::InternalPanic { .. } => ErrorCategory::InternalBug,
        }
    }
}

// Result type alias
pub type Result<T> = std::result::Result<T, ThumbnailError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_limit_message_carries_limit() {
        let err = ThumbnailError::size_limit_exceeded(100_000_000);
        let msg = err.to_string();
        assert!(msg.contains("100000000"));
        assert!(msg.starts_with("Output image exceeds pixel limit"));
    }

    #[test]
    fn test_error_recoverable() {
        assert!(ThumbnailError::size_limit_exceeded(1).is_recoverable());
        assert!(ThumbnailError::invalid_fit("cover").is_recoverable());
        assert!(!ThumbnailError::decode_failed("test").is_recoverable());
        assert!(!ThumbnailError::internal_panic("test").is_recoverable());
    }

    #[test]
    fn test_error_category_resource_limit() {
        assert_eq!(
            ThumbnailError::size_limit_exceeded(71_000_000).category(),
            ErrorCategory::ResourceLimit
        );
        assert_eq!(
            ThumbnailError::dimension_exceeds_limit(40000, 32768).category(),
            ErrorCategory::ResourceLimit
        );
        assert_eq!(
            ThumbnailError::file_read_failed(
                "test.jpg",
                std::io::Error::from(std::io::ErrorKind::NotFound)
            )
            .category(),
            ErrorCategory::ResourceLimit
        );
    }

    #[test]
    fn test_error_category_codec_error() {
        assert_eq!(
            ThumbnailError::unsupported_format("pdf").category(),
            ErrorCategory::CodecError
        );
        assert_eq!(
            ThumbnailError::resize_failed((10, 10), (0, 5), "test").category(),
            ErrorCategory::CodecError
        );
        assert_eq!(
            ThumbnailError::colour_transform_failed("p3", "test").category(),
            ErrorCategory::CodecError
        );
    }

    #[test]
    fn test_clone_preserves_io_kind() {
        let err = ThumbnailError::mmap_failed(
            "a.tif",
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        match err.clone() {
            ThumbnailError::MmapFailed { path, source } => {
                assert_eq!(path, "a.tif");
                assert_eq!(source.kind(), std::io::ErrorKind::PermissionDenied);
            }
            other => panic!("unexpected clone: {other:?}"),
        }
    }

    #[test]
    fn test_category_as_str() {
        assert_eq!(ErrorCategory::ResourceLimit.as_str(), "ResourceLimit");
        assert_eq!(ErrorCategory::UserError.as_str(), "UserError");
    }
}
