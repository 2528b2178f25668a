use thiserror::Error;

use crate::shared::constants::CROP_PADDING_PX;
use crate::shared::frame::Frame;
use crate::shared::region::{FaceRegion, PixelRect};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CropError {
    #[error("crop rectangle out of bounds ({width:.1}x{height:.1} px after clamping)")]
    OutOfBounds { width: f64, height: f64 },
}

/// Cuts a padded face crop out of a frame.
///
/// The normalized box is scaled to pixels, grown by `padding` on every
/// side and clamped so the result never leaves the frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FaceCropper {
    padding: f64,
}

impl FaceCropper {
    pub fn new(padding: f64) -> Self {
        Self {
            padding: padding.max(0.0),
        }
    }

    pub fn padding(&self) -> f64 {
        self.padding
    }

    /// Pixel rectangle for `region` inside a `frame_width` × `frame_height` frame.
    ///
    /// The origin is clamped to zero and the extent to what remains of the
    /// frame past the origin. Regions that end up narrower or shorter than
    /// one pixel fail with [`CropError::OutOfBounds`].
    pub fn crop_rect(
        &self,
        frame_width: u32,
        frame_height: u32,
        region: &FaceRegion,
    ) -> Result<PixelRect, CropError> {
        let fw = frame_width as f64;
        let fh = frame_height as f64;
        let p = self.padding;

        let px = region.x * fw;
        let py = region.y * fh;
        let pw = region.width * fw;
        let ph = region.height * fh;

        let left = (px - p).max(0.0);
        let top = (py - p).max(0.0);
        let width = (pw + 2.0 * p).min(fw - left);
        let height = (ph + 2.0 * p).min(fh - top);

        let finite = [px, py, pw, ph].iter().all(|v| v.is_finite());
        if !finite || width < 1.0 || height < 1.0 {
            return Err(CropError::OutOfBounds { width, height });
        }

        // floor(left) + floor(fw - left) <= fw, so the rect stays inside.
        Ok(PixelRect {
            x: left.floor() as u32,
            y: top.floor() as u32,
            width: width.floor() as u32,
            height: height.floor() as u32,
        })
    }

    pub fn crop(&self, frame: &Frame, region: &FaceRegion) -> Result<Frame, CropError> {
        let rect = self.crop_rect(frame.width(), frame.height(), region)?;
        Ok(frame.crop(&rect))
    }
}

impl Default for FaceCropper {
    fn default() -> Self {
        Self::new(CROP_PADDING_PX)
    }
}
