use ndarray::{s, ArrayView3};

use crate::shared::region::PixelRect;

/// A single captured frame: contiguous RGB bytes in row-major order.
///
/// Frames are immutable once produced; the pipeline shares them behind
/// an `Arc` between the snapshot and in-flight crops.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    /// Copies the pixels under `rect` into a new frame carrying the same index.
    ///
    /// `rect` must lie inside the frame; callers clamp beforehand.
    pub fn crop(&self, rect: &PixelRect) -> Frame {
        let x0 = rect.x as usize;
        let y0 = rect.y as usize;
        let x1 = x0 + rect.width as usize;
        let y1 = y0 + rect.height as usize;

        let view = self.as_ndarray();
        let data: Vec<u8> = view.slice(s![y0..y1, x0..x1, ..]).iter().copied().collect();

        Frame::new(data, rect.width, rect.height, self.channels, self.index)
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction_and_accessors() {
        let data = vec![0u8; 12]; // 2x2x3
        let frame = Frame::new(data.clone(), 2, 2, 3, 5);
        assert_eq!(frame.width(), 2);
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.channels(), 3);
        assert_eq!(frame.index(), 5);
        assert_eq!(frame.data(), &data[..]);
    }

    #[test]
    #[should_panic(expected = "data length must equal width * height * channels")]
    fn test_mismatched_data_length_panics_in_debug() {
        let data = vec![0u8; 10]; // wrong size for 2x2x3
        Frame::new(data, 2, 2, 3, 0);
    }

    #[test]
    fn test_as_ndarray_shape() {
        let data = vec![0u8; 24]; // 2x4x3
        let frame = Frame::new(data, 4, 2, 3, 0);
        let arr = frame.as_ndarray();
        assert_eq!(arr.shape(), &[2, 4, 3]); // (height, width, channels)
    }

    #[test]
    fn test_crop_copies_selected_pixels() {
        // 3x3 single-channel frame with values 0..9
        let frame = Frame::new((0u8..9).collect(), 3, 3, 1, 7);
        let rect = PixelRect {
            x: 1,
            y: 1,
            width: 2,
            height: 2,
        };

        let cropped = frame.crop(&rect);

        assert_eq!(cropped.width(), 2);
        assert_eq!(cropped.height(), 2);
        assert_eq!(cropped.data(), &[4, 5, 7, 8]);
        assert_eq!(cropped.index(), 7);
    }

    #[test]
    fn test_crop_keeps_channel_interleaving() {
        // 2x1 RGB: red pixel then blue pixel
        let frame = Frame::new(vec![255, 0, 0, 0, 0, 255], 2, 1, 3, 0);
        let rect = PixelRect {
            x: 1,
            y: 0,
            width: 1,
            height: 1,
        };

        assert_eq!(frame.crop(&rect).data(), &[0, 0, 255]);
    }

    #[test]
    fn test_crop_full_frame_is_identity() {
        let frame = Frame::new(vec![9u8; 12], 2, 2, 3, 1);
        let rect = PixelRect {
            x: 0,
            y: 0,
            width: 2,
            height: 2,
        };
        assert_eq!(frame.crop(&rect), frame);
    }
}
