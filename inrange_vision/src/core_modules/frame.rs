// THEORY:
// The `frame` module is the bridge between the host pipeline's raw buffers and the
// pixel formats the detector works in. Camera pipelines hand over planar 4:2:0
// frames: a full-resolution luma plane followed by two quarter-size chroma planes,
// each row padded out to a stride. The detector wants packed RGB and, from that,
// HSV.
//
// Key architectural principles:
// 1.  **Borrowed Views**: `Frame` and `FrameMut` never own pixel memory. The host
//     owns the buffer and its locking; a view only lives for a single call. The
//     mutable view is the only way to annotate a frame, and it cannot outlive the
//     borrow it was created from.
// 2.  **Stride Awareness**: Every plane access goes through the geometry, so rows
//     padded beyond `width` are skipped instead of bleeding into the next row.
// 3.  **Pure Conversions**: `to_rgb` and `HsvImage::from_rgb` allocate fresh images and have no
//     side effects. Two calls on the same frame return identical buffers.

use crate::core_modules::color_model::{Hsv, rgb_to_hsv};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame dimensions must be non-zero")]
    ZeroDimensions,

    #[error("stride {stride} is smaller than width {width}")]
    StrideTooSmall { width: u32, stride: u32 },

    #[error("buffer holds {actual} bytes but the geometry needs {expected}")]
    InvalidDimensions { expected: usize, actual: usize },
}

/// Width, height and luma row stride of a planar 4:2:0 frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGeometry {
    pub width: u32,
    pub height: u32,
    pub stride: u32,
}

impl FrameGeometry {
    pub fn new(width: u32, height: u32, stride: u32) -> Result<Self, FrameError> {
        if width == 0 || height == 0 {
            return Err(FrameError::ZeroDimensions);
        }
        if stride < width {
            return Err(FrameError::StrideTooSmall { width, stride });
        }
        Ok(Self { width, height, stride })
    }

    /// Geometry with no row padding.
    pub fn packed(width: u32, height: u32) -> Result<Self, FrameError> {
        Self::new(width, height, width)
    }

    pub fn chroma_stride(&self) -> usize {
        (self.stride as usize).div_ceil(2)
    }

    pub fn chroma_height(&self) -> usize {
        (self.height as usize).div_ceil(2)
    }

    pub fn luma_len(&self) -> usize {
        self.stride as usize * self.height as usize
    }

    pub fn chroma_len(&self) -> usize {
        self.chroma_stride() * self.chroma_height()
    }

    /// Total bytes of the Y, U and V planes.
    pub fn buffer_len(&self) -> usize {
        self.luma_len() + 2 * self.chroma_len()
    }

    #[inline]
    fn luma_index(&self, x: u32, y: u32) -> usize {
        y as usize * self.stride as usize + x as usize
    }

    /// Offsets of the U and V samples covering pixel `(x, y)`.
    #[inline]
    fn chroma_indices(&self, x: u32, y: u32) -> (usize, usize) {
        let offset = (y as usize / 2) * self.chroma_stride() + x as usize / 2;
        let u = self.luma_len() + offset;
        (u, u + self.chroma_len())
    }

    fn check(&self, actual: usize) -> Result<(), FrameError> {
        let expected = self.buffer_len();
        if actual < expected {
            return Err(FrameError::InvalidDimensions { expected, actual });
        }
        Ok(())
    }
}

/// A single Y'CbCr sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Yuv {
    pub y: u8,
    pub u: u8,
    pub v: u8,
}

/// The matrix used to turn Y'CbCr into RGB. Follows the stream's color space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum YuvMatrix {
    /// Full-range BT.601, as produced by JPEG-style still and preview streams.
    #[default]
    Jpeg,
    /// Limited-range BT.601.
    Smpte170m,
    /// Limited-range BT.709.
    Rec709,
}

struct Coefficients {
    y_offset: f32,
    y_scale: f32,
    r_v: f32,
    g_u: f32,
    g_v: f32,
    b_u: f32,
}

impl YuvMatrix {
    fn coefficients(self) -> Coefficients {
        match self {
            YuvMatrix::Jpeg => Coefficients {
                y_offset: 0.0,
                y_scale: 1.0,
                r_v: 1.402,
                g_u: -0.344_136,
                g_v: -0.714_136,
                b_u: 1.772,
            },
            YuvMatrix::Smpte170m => Coefficients {
                y_offset: 16.0,
                y_scale: 1.164_383,
                r_v: 1.596_027,
                g_u: -0.391_762,
                g_v: -0.812_968,
                b_u: 2.017_232,
            },
            YuvMatrix::Rec709 => Coefficients {
                y_offset: 16.0,
                y_scale: 1.164_383,
                r_v: 1.792_741,
                g_u: -0.213_249,
                g_v: -0.532_909,
                b_u: 2.112_402,
            },
        }
    }

    #[inline]
    pub fn to_rgb(self, sample: Yuv) -> [u8; 3] {
        let c = self.coefficients();
        let y = (sample.y as f32 - c.y_offset) * c.y_scale;
        let u = sample.u as f32 - 128.0;
        let v = sample.v as f32 - 128.0;
        [
            clamp_to_byte(y + c.r_v * v),
            clamp_to_byte(y + c.g_u * u + c.g_v * v),
            clamp_to_byte(y + c.b_u * u),
        ]
    }
}

#[inline]
fn clamp_to_byte(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Full-range BT.601 encoding of one RGB pixel.
pub fn rgb_to_yuv(red: u8, green: u8, blue: u8) -> Yuv {
    let (u, v) = rgb_to_chroma(red, green, blue);
    Yuv {
        y: clamp_to_byte(0.299 * red as f32 + 0.587 * green as f32 + 0.114 * blue as f32),
        u: clamp_to_byte(u),
        v: clamp_to_byte(v),
    }
}

fn rgb_to_chroma(red: u8, green: u8, blue: u8) -> (f32, f32) {
    let (r, g, b) = (red as f32, green as f32, blue as f32);
    (
        128.0 - 0.168_736 * r - 0.331_264 * g + 0.5 * b,
        128.0 + 0.5 * r - 0.418_688 * g - 0.081_312 * b,
    )
}

/// A read-only view of a host-owned planar 4:2:0 frame.
#[derive(Clone, Copy)]
pub struct Frame<'a> {
    geometry: FrameGeometry,
    data: &'a [u8],
}

impl<'a> Frame<'a> {
    pub fn new(geometry: FrameGeometry, data: &'a [u8]) -> Result<Self, FrameError> {
        geometry.check(data.len())?;
        Ok(Self { geometry, data })
    }

    pub fn geometry(&self) -> FrameGeometry {
        self.geometry
    }

    /// The Y'CbCr sample at `(x, y)`. Chroma is shared by each 2x2 block.
    #[inline]
    pub fn sample(&self, x: u32, y: u32) -> Yuv {
        let (u, v) = self.geometry.chroma_indices(x, y);
        Yuv {
            y: self.data[self.geometry.luma_index(x, y)],
            u: self.data[u],
            v: self.data[v],
        }
    }

    /// Converts the frame into a packed RGB image of the same size.
    pub fn to_rgb(&self, matrix: YuvMatrix) -> RgbImage {
        let width = self.geometry.width;
        let mut rgb = RgbImage::new(width, self.geometry.height);
        let row_bytes = width as usize * 3;

        for (y, row) in rgb.chunks_exact_mut(row_bytes).enumerate() {
            for (x, pixel) in row.chunks_exact_mut(3).enumerate() {
                pixel.copy_from_slice(&matrix.to_rgb(self.sample(x as u32, y as u32)));
            }
        }
        rgb
    }
}

/// An exclusive, scoped view of a host-owned frame, used for in-place annotation.
pub struct FrameMut<'a> {
    geometry: FrameGeometry,
    data: &'a mut [u8],
}

impl<'a> FrameMut<'a> {
    pub fn new(geometry: FrameGeometry, data: &'a mut [u8]) -> Result<Self, FrameError> {
        geometry.check(data.len())?;
        Ok(Self { geometry, data })
    }

    pub fn geometry(&self) -> FrameGeometry {
        self.geometry
    }

    /// Reborrows the view as read-only.
    pub fn as_frame(&self) -> Frame<'_> {
        Frame {
            geometry: self.geometry,
            data: self.data,
        }
    }

    /// Writes luma for `(x, y)` and chroma for the 2x2 block containing it.
    #[inline]
    pub fn put_sample(&mut self, x: u32, y: u32, sample: Yuv) {
        let (u, v) = self.geometry.chroma_indices(x, y);
        self.data[self.geometry.luma_index(x, y)] = sample.y;
        self.data[u] = sample.u;
        self.data[v] = sample.v;
    }
}

/// A frame that owns a copy of its bytes, for handing frames across threads.
#[derive(Debug, Clone)]
pub struct OwnedFrame {
    pub geometry: FrameGeometry,
    pub data: Vec<u8>,
}

impl OwnedFrame {
    pub fn new(geometry: FrameGeometry, data: Vec<u8>) -> Result<Self, FrameError> {
        geometry.check(data.len())?;
        Ok(Self { geometry, data })
    }

    pub fn as_frame(&self) -> Frame<'_> {
        Frame {
            geometry: self.geometry,
            data: &self.data,
        }
    }

    pub fn as_frame_mut(&mut self) -> FrameMut<'_> {
        FrameMut {
            geometry: self.geometry,
            data: &mut self.data,
        }
    }

    /// Encodes an RGB image as full-range BT.601 4:2:0 with the given luma stride.
    /// Each chroma sample is the average of the 2x2 block it covers; row padding is
    /// left zeroed.
    pub fn from_rgb(rgb: &RgbImage, stride: u32) -> Result<Self, FrameError> {
        let geometry = FrameGeometry::new(rgb.width(), rgb.height(), stride)?;
        let mut data = vec![0u8; geometry.buffer_len()];

        for (x, y, pixel) in rgb.enumerate_pixels() {
            let [r, g, b] = pixel.0;
            data[geometry.luma_index(x, y)] = rgb_to_yuv(r, g, b).y;
        }

        for cy in 0..geometry.chroma_height() as u32 {
            for cx in 0..(geometry.width as usize).div_ceil(2) as u32 {
                let (mut u_sum, mut v_sum, mut count) = (0.0f32, 0.0f32, 0.0f32);
                for y in (cy * 2)..(cy * 2 + 2).min(geometry.height) {
                    for x in (cx * 2)..(cx * 2 + 2).min(geometry.width) {
                        let [r, g, b] = rgb.get_pixel(x, y).0;
                        let (u, v) = rgb_to_chroma(r, g, b);
                        u_sum += u;
                        v_sum += v;
                        count += 1.0;
                    }
                }
                let (u, v) = geometry.chroma_indices(cx * 2, cy * 2);
                data[u] = clamp_to_byte(u_sum / count);
                data[v] = clamp_to_byte(v_sum / count);
            }
        }

        Ok(Self { geometry, data })
    }
}

/// A packed 8-bit HSV image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HsvImage {
    width: u32,
    height: u32,
    pixels: Vec<Hsv>,
}

impl HsvImage {
    pub fn from_rgb(rgb: &RgbImage) -> Self {
        let pixels = rgb
            .pixels()
            .map(|p| rgb_to_hsv(p.0[0], p.0[1], p.0[2]))
            .collect();
        Self {
            width: rgb.width(),
            height: rgb.height(),
            pixels,
        }
    }

    /// Builds an image from raw HSV pixels in row-major order.
    pub fn from_pixels(width: u32, height: u32, pixels: Vec<Hsv>) -> Result<Self, FrameError> {
        let expected = width as usize * height as usize;
        if pixels.len() != expected {
            return Err(FrameError::InvalidDimensions {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self { width, height, pixels })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[Hsv] {
        &self.pixels
    }
}
