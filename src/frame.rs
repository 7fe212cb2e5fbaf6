//! Frame records as delivered by the streaming transport.
//!
//! A `FrameRecord` carries one captured frame for one camera:
//! - Capture timestamp (the only ordering key)
//! - Raster geometry (`rows`, `cols`) and an OpenCV-style pixel type code
//! - The raw pixel buffer, base64-encoded for transport
//!
//! Nothing in this module decodes pixels into an image. It only validates that
//! the geometry and the payload agree, so the codec can trust what it is handed.

use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ----------------------------------------------------------------------------
// Timestamp
// ----------------------------------------------------------------------------

/// Capture time in milliseconds since the Unix epoch.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    pub fn as_millis(self) -> i64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ----------------------------------------------------------------------------
// PixelFormat
// ----------------------------------------------------------------------------

/// Element depth encoded in the low three bits of the type code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Depth {
    U8,
    S8,
    U16,
    S16,
    S32,
    F32,
    F64,
}

impl Depth {
    pub fn byte_size(self) -> usize {
        match self {
            Depth::U8 | Depth::S8 => 1,
            Depth::U16 | Depth::S16 => 2,
            Depth::S32 | Depth::F32 => 4,
            Depth::F64 => 8,
        }
    }
}

/// Decoded pixel type code: `depth = code & 7`, `channels = (code >> 3) + 1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelFormat {
    pub depth: Depth,
    pub channels: usize,
}

impl PixelFormat {
    pub const GRAY8: i32 = 0;
    pub const BGR8: i32 = 16;
    pub const BGRA8: i32 = 24;

    pub fn from_code(code: i32) -> Result<Self, FrameError> {
        if code < 0 {
            return Err(FrameError::UnknownPixelFormat(code));
        }
        let depth = match code & 7 {
            0 => Depth::U8,
            1 => Depth::S8,
            2 => Depth::U16,
            3 => Depth::S16,
            4 => Depth::S32,
            5 => Depth::F32,
            6 => Depth::F64,
            _ => return Err(FrameError::UnknownPixelFormat(code)),
        };
        let channels = ((code >> 3) + 1) as usize;
        Ok(Self { depth, channels })
    }

    /// Bytes occupied by one pixel.
    pub fn pixel_size(self) -> usize {
        self.depth.byte_size() * self.channels
    }
}

// ----------------------------------------------------------------------------
// FrameRecord
// ----------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame dimensions must be positive (rows={rows}, cols={cols})")]
    InvalidDimensions { rows: i32, cols: i32 },
    #[error("unknown pixel type code {0}")]
    UnknownPixelFormat(i32),
    #[error("frame dimensions overflow")]
    DimensionOverflow,
    #[error("payload is not valid base64: {0}")]
    InvalidPayload(String),
    #[error("payload length mismatch: expected {expected} bytes, decoded {actual}")]
    LengthMismatch { expected: usize, actual: usize },
}

/// One captured frame plus the metadata needed to rebuild its raster.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameRecord {
    pub camera_id: String,
    pub timestamp: Timestamp,
    pub rows: i32,
    pub cols: i32,
    /// OpenCV type code (`CV_8UC3` = 16 for packed BGR).
    #[serde(rename = "type")]
    pub pixel_format_code: i32,
    /// Base64 of the raw, row-major pixel buffer.
    pub data: String,
}

impl FrameRecord {
    /// Build a record from raw pixels, encoding the payload for transport.
    pub fn from_pixels(
        camera_id: impl Into<String>,
        timestamp: Timestamp,
        rows: i32,
        cols: i32,
        pixel_format_code: i32,
        pixels: &[u8],
    ) -> Self {
        Self {
            camera_id: camera_id.into(),
            timestamp,
            rows,
            cols,
            pixel_format_code,
            data: BASE64.encode(pixels),
        }
    }

    pub fn pixel_format(&self) -> Result<PixelFormat, FrameError> {
        PixelFormat::from_code(self.pixel_format_code)
    }

    /// Byte length implied by `rows * cols * pixel_size`.
    pub fn expected_len(&self) -> Result<usize, FrameError> {
        if self.rows <= 0 || self.cols <= 0 {
            return Err(FrameError::InvalidDimensions {
                rows: self.rows,
                cols: self.cols,
            });
        }
        let format = self.pixel_format()?;
        (self.rows as usize)
            .checked_mul(self.cols as usize)
            .and_then(|v| v.checked_mul(format.pixel_size()))
            .ok_or(FrameError::DimensionOverflow)
    }

    /// Decode the transport payload and check it against the declared geometry.
    pub fn decode_pixels(&self) -> Result<Vec<u8>, FrameError> {
        let expected = self.expected_len()?;
        let bytes = BASE64
            .decode(self.data.as_bytes())
            .map_err(|e| FrameError::InvalidPayload(e.to_string()))?;
        if bytes.len() != expected {
            return Err(FrameError::LengthMismatch {
                expected,
                actual: bytes.len(),
            });
        }
        Ok(bytes)
    }

    /// Naming key shared by every artifact derived from this frame.
    pub fn artifact_key(&self) -> String {
        format!("{}-T-{}", self.camera_id, self.timestamp.as_millis())
    }
}
