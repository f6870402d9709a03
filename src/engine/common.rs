// src/engine/common.rs
//
// Common utilities shared across engine modules.

use crate::error::ThumbnailError;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Result type used by every engine stage.
pub type EngineResult<T> = std::result::Result<T, ThumbnailError>;

/// Run a decoder call, turning panics into `InternalPanic`.
///
/// mozjpeg reports libjpeg errors by unwinding; the native decoders must
/// never take the request thread down with them.
pub fn run_with_panic_policy<T, F>(stage: &'static str, f: F) -> EngineResult<T>
where
    F: FnOnce() -> EngineResult<T>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let detail = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic payload".to_string());
            Err(ThumbnailError::internal_panic(format!("{stage}: {detail}")))
        }
    }
}
