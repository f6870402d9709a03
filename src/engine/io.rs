// src/engine/io.rs
//
// I/O: the re-openable Source and ICC profile extraction

use crate::error::ThumbnailError;
use img_parts::{jpeg::Jpeg, png::Png, webp::WebP, ImageICC};
use memmap2::Mmap;
use std::borrow::Cow;
use std::fs::File;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Image source.
///
/// Shrink-on-load and pyramid probing re-decode the same source several
/// times per request, so every variant can be opened again from the start
/// any number of times.
#[derive(Clone, Debug)]
pub enum Source {
    /// In-memory image data
    Memory(Arc<Vec<u8>>),
    /// Memory-mapped file (zero-copy access)
    Mapped(Arc<Mmap>),
    /// File path, read from disk on every open
    Path(PathBuf),
}

impl Source {
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        Source::Memory(Arc::new(data.into()))
    }

    /// Memory-map a file. The mapping is shared by every re-open.
    pub fn map_file(path: impl AsRef<Path>) -> std::result::Result<Self, ThumbnailError> {
        let path = path.as_ref();
        let display = path.to_string_lossy().to_string();
        let file =
            File::open(path).map_err(|e| ThumbnailError::file_read_failed(display.clone(), e))?;
        // SAFETY: the mapping is read-only; callers must not truncate the file
        // while a request holds the source.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| ThumbnailError::mmap_failed(display, e))?;
        Ok(Source::Mapped(Arc::new(mmap)))
    }

    /// Bytes of the whole source, starting at offset 0.
    ///
    /// Borrowed for Memory/Mapped sources; Path sources are read again.
    pub fn bytes(&self) -> std::result::Result<Cow<'_, [u8]>, ThumbnailError> {
        match self {
            Source::Memory(data) => Ok(Cow::Borrowed(data.as_slice())),
            Source::Mapped(mmap) => Ok(Cow::Borrowed(mmap.as_ref())),
            Source::Path(path) => {
                let data = std::fs::read(path).map_err(|e| {
                    ThumbnailError::file_read_failed(path.to_string_lossy().to_string(), e)
                })?;
                Ok(Cow::Owned(data))
            }
        }
    }

    /// Open a fresh seekable reader positioned at the start.
    pub fn open(&self) -> std::result::Result<Cursor<Cow<'_, [u8]>>, ThumbnailError> {
        Ok(Cursor::new(self.bytes()?))
    }

    /// Get path if this is a Path source
    pub fn as_path(&self) -> Option<&PathBuf> {
        match self {
            Source::Path(p) => Some(p),
            Source::Memory(_) | Source::Mapped(_) => None,
        }
    }

    /// Length of the source data; 0 for Path sources until read.
    pub fn len(&self) -> usize {
        match self {
            Source::Memory(data) => data.len(),
            Source::Mapped(mmap) => mmap.len(),
            Source::Path(_) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Vec<u8>> for Source {
    fn from(data: Vec<u8>) -> Self {
        Source::Memory(Arc::new(data))
    }
}

impl From<PathBuf> for Source {
    fn from(path: PathBuf) -> Self {
        Source::Path(path)
    }
}

/// Extract ICC profile from image data.
/// Supports JPEG (APP2 marker), PNG (iCCP chunk) and WebP (ICCP chunk).
pub fn extract_icc_profile(data: &[u8]) -> Option<Vec<u8>> {
    if data.len() < 12 {
        return None;
    }

    let icc_data = if data[0] == 0xFF && data[1] == 0xD8 {
        extract_icc_from_jpeg(data)?
    } else if data[0] == 0x89 && data[1] == 0x50 && data[2] == 0x4E && data[3] == 0x47 {
        extract_icc_from_png(data)?
    } else if &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        extract_icc_from_webp(data)?
    } else {
        return None;
    };

    if validate_icc_profile(&icc_data) {
        Some(icc_data)
    } else {
        None
    }
}

/// Validate ICC profile header
/// ICC profiles must start with a 128-byte header containing specific fields
pub(crate) fn validate_icc_profile(icc_data: &[u8]) -> bool {
    if icc_data.len() < 128 {
        return false;
    }

    // Profile size field (bytes 0-3, big-endian) must match the payload
    let profile_size =
        u32::from_be_bytes([icc_data[0], icc_data[1], icc_data[2], icc_data[3]]) as usize;
    if profile_size != icc_data.len() {
        return false;
    }

    // Major version is 2, 4 or 5 in the wild
    if icc_data[8] > 10 {
        return false;
    }

    // CMM type, profile class, colour space and PCS are four-char ASCII tags
    let ascii_tag = |range: std::ops::Range<usize>| {
        icc_data[range]
            .iter()
            .all(|&byte| (32..=126).contains(&byte) || byte == 0)
    };
    ascii_tag(4..8) && ascii_tag(12..16) && ascii_tag(16..20) && ascii_tag(20..24)
}

fn extract_icc_from_jpeg(data: &[u8]) -> Option<Vec<u8>> {
    let jpeg = Jpeg::from_bytes(data.to_vec().into()).ok()?;
    jpeg.icc_profile().map(|icc| icc.to_vec())
}

fn extract_icc_from_png(data: &[u8]) -> Option<Vec<u8>> {
    let png = Png::from_bytes(data.to_vec().into()).ok()?;
    png.icc_profile().map(|icc| icc.to_vec())
}

fn extract_icc_from_webp(data: &[u8]) -> Option<Vec<u8>> {
    let webp = WebP::from_bytes(data.to_vec().into()).ok()?;
    webp.icc_profile().map(|icc| icc.to_vec())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage};
    use img_parts::Bytes;
    use std::io::{Read, Seek, SeekFrom, Write};

    pub(crate) fn minimal_icc() -> Vec<u8> {
        let mut data = vec![0u8; 128];
        data[..4].copy_from_slice(&128u32.to_be_bytes());
        data[4..8].copy_from_slice(b"ADBE");
        data[8] = 2;
        data[12..16].copy_from_slice(b"mntr");
        data[16..20].copy_from_slice(b"RGB ");
        data[20..24].copy_from_slice(b"XYZ ");
        data
    }

    fn png_bytes() -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::new(4, 4));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    pub(crate) fn png_with_icc(icc: &[u8]) -> Vec<u8> {
        let mut png = Png::from_bytes(Bytes::from(png_bytes())).unwrap();
        png.set_icc_profile(Some(Bytes::from(icc.to_vec())));
        let mut out = Vec::new();
        png.encoder().write_to(&mut out).unwrap();
        out
    }

    #[test]
    fn memory_source_reopens_from_start() {
        let source = Source::from_bytes(vec![1u8, 2, 3, 4]);
        let mut first = source.open().unwrap();
        first.seek(SeekFrom::Start(3)).unwrap();

        let mut second = source.open().unwrap();
        let mut buf = [0u8; 2];
        second.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [1, 2]);
    }

    #[test]
    fn path_source_reads_every_open() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"abc").unwrap();
        let source = Source::from(file.path().to_path_buf());
        assert_eq!(source.bytes().unwrap().as_ref(), b"abc");
        assert_eq!(source.bytes().unwrap().as_ref(), b"abc");
        assert!(source.as_path().is_some());
    }

    #[test]
    fn mapped_source_matches_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"mapped").unwrap();
        file.flush().unwrap();
        let source = Source::map_file(file.path()).unwrap();
        assert_eq!(source.len(), 6);
        assert_eq!(source.bytes().unwrap().as_ref(), b"mapped");
    }

    #[test]
    fn missing_path_is_read_error() {
        let source = Source::from(PathBuf::from("/definitely/not/here.jpg"));
        let err = source.bytes().unwrap_err();
        assert!(matches!(err, ThumbnailError::FileReadFailed { .. }));
    }

    #[test]
    fn validate_icc_profile_rules() {
        assert!(validate_icc_profile(&minimal_icc()));
        assert!(!validate_icc_profile(&[0u8; 127]));

        let mut wrong_size = minimal_icc();
        wrong_size[3] = 0xFF;
        assert!(!validate_icc_profile(&wrong_size));

        let mut bad_version = minimal_icc();
        bad_version[8] = 20;
        assert!(!validate_icc_profile(&bad_version));
    }

    #[test]
    fn extract_icc_from_png_roundtrip() {
        let icc = minimal_icc();
        let png = png_with_icc(&icc);
        assert_eq!(extract_icc_profile(&png), Some(icc));
    }

    #[test]
    fn extract_icc_absent() {
        assert!(extract_icc_profile(&png_bytes()).is_none());
        assert!(extract_icc_profile(&[0u8; 10]).is_none());
    }
}
