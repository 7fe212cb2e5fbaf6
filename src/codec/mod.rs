//! Image codec seam.
//!
//! The reconciler never touches pixel formats directly. It asks an `ImageCodec`
//! to rebuild a raster from a frame record, normalize its size, and compress it
//! for the classifier and for storage.

mod image_backend;

use std::sync::OnceLock;

use thiserror::Error;

use crate::frame::FrameError;

pub use image_backend::ImageCrateCodec;

/// Channel layout of a decoded raster. Colour input is normalized to RGB.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorLayout {
    Gray8,
    Rgb8,
}

impl ColorLayout {
    pub fn channels(self) -> usize {
        match self {
            ColorLayout::Gray8 => 1,
            ColorLayout::Rgb8 => 3,
        }
    }
}

/// In-memory decoded pixel buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    pub layout: ColorLayout,
    pub pixels: Vec<u8>,
}

/// Compressed output formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg { quality: u8 },
}

impl ImageFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Jpeg { .. } => "jpg",
        }
    }
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] FrameError),
    #[error("unsupported pixel type code {0} (8-bit gray, BGR or BGRA required)")]
    UnsupportedPixelFormat(i32),
    #[error("image decode failed: {0}")]
    Decode(String),
    #[error("image encode failed: {0}")]
    Encode(String),
}

/// Codec collaborator used by the reconciler.
pub trait ImageCodec {
    /// Rebuild a raster from raw row-major bytes.
    fn decode(
        &self,
        rows: i32,
        cols: i32,
        pixel_format_code: i32,
        bytes: &[u8],
    ) -> Result<RasterImage, CodecError>;

    /// Resize to exactly `width` x `height`.
    fn resize(
        &self,
        image: &RasterImage,
        width: u32,
        height: u32,
    ) -> Result<RasterImage, CodecError>;

    /// Compress a raster.
    fn encode(&self, image: &RasterImage, format: ImageFormat) -> Result<Vec<u8>, CodecError>;
}

/// Facts about the codec binding established at process start.
#[derive(Clone, Debug)]
pub struct CodecInfo {
    pub backend: &'static str,
    pub formats: Vec<&'static str>,
}

static CODEC_INFO: OnceLock<CodecInfo> = OnceLock::new();

/// One-time codec initialization. Repeated calls return the same binding.
pub fn init_codec() -> &'static CodecInfo {
    CODEC_INFO.get_or_init(|| {
        let info = CodecInfo {
            backend: "image",
            formats: vec!["jpeg"],
        };
        log::info!(
            "codec initialized: backend={} formats={:?}",
            info.backend,
            info.formats
        );
        info
    })
}
