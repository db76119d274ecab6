//! Camera frame data
//!
//! A [`Frame`] is immutable once produced. The pixel buffer is shared
//! (`Arc<[u8]>`), so handing a frame from the capture thread to the tracker
//! never copies image data.

use std::sync::Arc;
use std::time::Duration;

use crate::foundation::math::Mat4;

/// Pixel layout of a captured image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 8-bit luminance only
    Gray8,
    /// 4:2:0 bi-planar luma/chroma
    Nv21,
    /// 8-bit interleaved RGB
    Rgb888,
    /// 8-bit interleaved RGBA
    Rgba8888,
}

/// Pinhole camera intrinsics in pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraIntrinsics {
    /// Focal length along x
    pub fx: f32,
    /// Focal length along y
    pub fy: f32,
    /// Principal point x
    pub cx: f32,
    /// Principal point y
    pub cy: f32,
    /// Image width the intrinsics refer to
    pub width: u32,
    /// Image height the intrinsics refer to
    pub height: u32,
}

impl CameraIntrinsics {
    /// Intrinsics for an ideal camera with the given horizontal field of view
    pub fn from_fov(width: u32, height: u32, horizontal_fov_radians: f32) -> Self {
        let fx = width as f32 * 0.5 / (horizontal_fov_radians * 0.5).tan();
        Self {
            fx,
            fy: fx,
            cx: width as f32 * 0.5,
            cy: height as f32 * 0.5,
            width,
            height,
        }
    }

    /// OpenGL-style projection matrix matching these intrinsics
    ///
    /// Camera looks down -Z; depth maps to [-1, 1].
    pub fn projection_matrix(&self, near: f32, far: f32) -> Mat4 {
        let w = self.width as f32;
        let h = self.height as f32;

        let mut result = Mat4::zeros();
        result[(0, 0)] = 2.0 * self.fx / w;
        result[(1, 1)] = 2.0 * self.fy / h;
        result[(0, 2)] = 1.0 - 2.0 * self.cx / w;
        result[(1, 2)] = 2.0 * self.cy / h - 1.0;
        result[(2, 2)] = -(far + near) / (far - near);
        result[(2, 3)] = -2.0 * far * near / (far - near);
        result[(3, 2)] = -1.0;
        result
    }
}

impl Default for CameraIntrinsics {
    fn default() -> Self {
        Self::from_fov(1920, 1080, 60f32.to_radians())
    }
}

/// Image as delivered by a [`super::CameraDevice`]
#[derive(Debug, Clone)]
pub struct CapturedImage {
    /// Pixel data
    pub data: Arc<[u8]>,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Pixel layout
    pub format: PixelFormat,
    /// Sensor timestamp (monotonic, device clock)
    pub timestamp: Duration,
}

/// Timestamped camera frame consumed by the tracker
#[derive(Debug, Clone)]
pub struct Frame {
    buffer: Arc<[u8]>,
    width: u32,
    height: u32,
    format: PixelFormat,
    timestamp: Duration,
    intrinsics: CameraIntrinsics,
    sequence: u64,
}

impl Frame {
    /// Build a frame from a captured image
    pub fn new(image: CapturedImage, intrinsics: CameraIntrinsics, sequence: u64) -> Self {
        Self {
            buffer: image.data,
            width: image.width,
            height: image.height,
            format: image.format,
            timestamp: image.timestamp,
            intrinsics,
            sequence,
        }
    }

    /// Pixel data
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixel layout
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Capture timestamp
    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }

    /// Camera intrinsics at capture time
    pub fn intrinsics(&self) -> &CameraIntrinsics {
        &self.intrinsics
    }

    /// Capture order, starting at 0 for each source
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec4;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_intrinsics_centered() {
        let intrinsics = CameraIntrinsics::default();
        assert_eq!((intrinsics.width, intrinsics.height), (1920, 1080));
        assert_relative_eq!(intrinsics.cx, 960.0);
        assert_relative_eq!(intrinsics.cy, 540.0);
    }

    #[test]
    fn test_projection_maps_near_and_far_planes() {
        let intrinsics = CameraIntrinsics::default();
        let projection = intrinsics.projection_matrix(0.1, 1000.0);

        let near = projection * Vec4::new(0.0, 0.0, -0.1, 1.0);
        let far = projection * Vec4::new(0.0, 0.0, -1000.0, 1.0);
        assert_relative_eq!(near.z / near.w, -1.0, epsilon = 1e-4);
        assert_relative_eq!(far.z / far.w, 1.0, epsilon = 1e-4);
    }
}
