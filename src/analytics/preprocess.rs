use image::imageops::{self, FilterType};
use image::{flat, GrayImage, ImageBuffer, Luma, LumaA, Pixel, Rgb, RgbImage};
use serde::Deserialize;

use super::frame::FrameView;

pub const DEFAULT_TARGET_LONG_EDGE: u32 = 320;

/// Sensor-to-display rotation applied after every resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rotation {
    None,
    #[default]
    Cw90,
    Ccw90,
    R180,
}

impl Rotation {
    pub fn apply<P>(self, image: &ImageBuffer<P, Vec<P::Subpixel>>) -> ImageBuffer<P, Vec<P::Subpixel>>
    where
        P: Pixel + 'static,
    {
        match self {
            Rotation::None => image.clone(),
            Rotation::Cw90 => image::imageops::rotate90(image),
            Rotation::Ccw90 => image::imageops::rotate270(image),
            Rotation::R180 => image::imageops::rotate180(image),
        }
    }
}

/// Shared downscale + rotate stage.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    target_long_edge: u32,
    rotation: Rotation,
}

impl Preprocessor {
    pub fn new(target_long_edge: u32, rotation: Rotation) -> Self {
        Self {
            target_long_edge: target_long_edge.max(1),
            rotation,
        }
    }

    pub fn working_size(&self, width: usize, height: usize) -> (u32, u32) {
        let scale = self.target_long_edge as f64 / width.max(1) as f64;
        let w = ((width as f64 * scale).round() as u32).max(1);
        let h = ((height as f64 * scale).round() as u32).max(1);
        (w, h)
    }

    /// Downscaled, rotated luma image shared by motion and face analysis.
    /// Reads the luma plane in place.
    pub fn working_image(&self, view: &FrameView<'_>) -> Result<GrayImage, flat::Error> {
        let (w, h) = self.working_size(view.width, view.height);
        let luma = view.luma.samples(1);
        let resized = imageops::resize(&luma.as_view::<Luma<u8>>()?, w, h, FilterType::Nearest);
        Ok(self.rotation.apply(&resized))
    }

    /// Color image at `size`x`size` for network input, or `None` when the
    /// frame carries no usable chroma plane.
    ///
    /// Luma and chroma are resized separately and only the resized pixels
    /// are converted.
    pub fn color_input(&self, view: &FrameView<'_>, size: u32) -> Option<RgbImage> {
        let chroma = view.chroma?;
        let (u_off, v_off) = view.format.chroma_offsets()?;

        let luma = view.luma.samples(1);
        let luma = imageops::resize(&luma.as_view::<Luma<u8>>().ok()?, size, size, FilterType::Nearest);
        let chroma = chroma.samples(2);
        let chroma = imageops::resize(&chroma.as_view::<LumaA<u8>>().ok()?, size, size, FilterType::Nearest);

        let resized = RgbImage::from_fn(size, size, |x, y| {
            let Luma([l]) = *luma.get_pixel(x, y);
            let pair = chroma.get_pixel(x, y).0;
            Rgb(yuv_to_rgb(l, pair[u_off], pair[v_off]))
        });

        Some(self.rotation.apply(&resized))
    }
}

/// BT.601 limited-range YUV to RGB, fixed point.
pub fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = (y as i32 - 16).max(0) * 298;
    let d = u as i32 - 128;
    let e = v as i32 - 128;
    let clamp = |x: i32| ((x + 128) >> 8).clamp(0, 255) as u8;
    [
        clamp(c + 409 * e),
        clamp(c - 100 * d - 208 * e),
        clamp(c + 516 * d),
    ]
}
