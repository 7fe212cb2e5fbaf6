use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{ExtendedColorType, ImageBuffer, Luma, Rgb};

use crate::frame::{Depth, FrameError, PixelFormat};

use super::{init_codec, CodecError, ColorLayout, ImageCodec, ImageFormat, RasterImage};

/// Codec backed by the `image` crate.
///
/// Accepts 8-bit gray, packed BGR and packed BGRA input. BGR(A) is swizzled to
/// RGB at decode time; alpha is discarded since every output format is opaque.
#[derive(Clone, Debug)]
pub struct ImageCrateCodec {
    filter: FilterType,
}

impl ImageCrateCodec {
    pub fn new() -> Self {
        init_codec();
        Self {
            filter: FilterType::Triangle,
        }
    }
}

impl Default for ImageCrateCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageCodec for ImageCrateCodec {
    fn decode(
        &self,
        rows: i32,
        cols: i32,
        pixel_format_code: i32,
        bytes: &[u8],
    ) -> Result<RasterImage, CodecError> {
        if rows <= 0 || cols <= 0 {
            return Err(FrameError::InvalidDimensions { rows, cols }.into());
        }
        let format = PixelFormat::from_code(pixel_format_code)?;
        if format.depth != Depth::U8 || !matches!(format.channels, 1 | 3 | 4) {
            return Err(CodecError::UnsupportedPixelFormat(pixel_format_code));
        }
        let (width, height) = (cols as usize, rows as usize);
        let expected = width
            .checked_mul(height)
            .and_then(|v| v.checked_mul(format.channels))
            .ok_or(FrameError::DimensionOverflow)?;
        if bytes.len() != expected {
            return Err(FrameError::LengthMismatch {
                expected,
                actual: bytes.len(),
            }
            .into());
        }

        let (layout, pixels) = match format.channels {
            1 => (ColorLayout::Gray8, bytes.to_vec()),
            channels => (ColorLayout::Rgb8, swizzle_to_rgb(bytes, channels)),
        };
        Ok(RasterImage {
            width: cols as u32,
            height: rows as u32,
            layout,
            pixels,
        })
    }

    fn resize(
        &self,
        image: &RasterImage,
        width: u32,
        height: u32,
    ) -> Result<RasterImage, CodecError> {
        if image.width == width && image.height == height {
            return Ok(image.clone());
        }
        let pixels = match image.layout {
            ColorLayout::Gray8 => {
                let buf: ImageBuffer<Luma<u8>, &[u8]> =
                    ImageBuffer::from_raw(image.width, image.height, image.pixels.as_slice())
                        .ok_or_else(|| inconsistent_raster(image))?;
                imageops::resize(&buf, width, height, self.filter).into_raw()
            }
            ColorLayout::Rgb8 => {
                let buf: ImageBuffer<Rgb<u8>, &[u8]> =
                    ImageBuffer::from_raw(image.width, image.height, image.pixels.as_slice())
                        .ok_or_else(|| inconsistent_raster(image))?;
                imageops::resize(&buf, width, height, self.filter).into_raw()
            }
        };
        Ok(RasterImage {
            width,
            height,
            layout: image.layout,
            pixels,
        })
    }

    fn encode(&self, image: &RasterImage, format: ImageFormat) -> Result<Vec<u8>, CodecError> {
        match format {
            ImageFormat::Jpeg { quality } => {
                let color = match image.layout {
                    ColorLayout::Gray8 => ExtendedColorType::L8,
                    ColorLayout::Rgb8 => ExtendedColorType::Rgb8,
                };
                let mut out = Vec::new();
                JpegEncoder::new_with_quality(&mut out, quality)
                    .encode(&image.pixels, image.width, image.height, color)
                    .map_err(|e| CodecError::Encode(e.to_string()))?;
                Ok(out)
            }
        }
    }
}

fn swizzle_to_rgb(bgr: &[u8], channels: usize) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(bgr.len() / channels * 3);
    for px in bgr.chunks_exact(channels) {
        rgb.extend_from_slice(&[px[2], px[1], px[0]]);
    }
    rgb
}

fn inconsistent_raster(image: &RasterImage) -> CodecError {
    CodecError::Decode(format!(
        "raster buffer of {} bytes does not fit {}x{} {:?}",
        image.pixels.len(),
        image.width,
        image.height,
        image.layout
    ))
}
