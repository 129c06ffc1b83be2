use std::path::PathBuf;

use image::GrayImage;

use super::model::ModelError;
use super::signals::NormRect;

/// Fixed multi-scale search parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CascadeParams {
    pub scale_factor: f64,
    pub min_neighbors: i32,
    pub min_size: (u32, u32),
}

impl Default for CascadeParams {
    fn default() -> Self {
        Self {
            scale_factor: 1.2,
            min_neighbors: 2,
            min_size: (30, 30),
        }
    }
}

/// Region found by a cascade, in pixels of the searched image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Frontal-face cascade back-end.
pub trait FaceCascade: Send {
    /// Regions in the order the back-end reports them.
    fn detect(
        &mut self,
        image: &GrayImage,
        params: &CascadeParams,
    ) -> Result<Vec<PixelRect>, ModelError>;
}

pub struct FaceDetector {
    params: CascadeParams,
}

impl FaceDetector {
    pub fn new(params: CascadeParams) -> Self {
        Self { params }
    }

    /// Search the equalized copy of `working`; the first region wins.
    pub fn detect(&self, cascade: &mut dyn FaceCascade, working: &GrayImage) -> NormRect {
        let (width, height) = working.dimensions();
        if width == 0 || height == 0 {
            return NormRect::EMPTY;
        }

        let equalized = equalize_histogram(working);
        let regions = match cascade.detect(&equalized, &self.params) {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!(error = %e, "face search failed");
                return NormRect::EMPTY;
            }
        };

        match regions.first() {
            Some(r) => NormRect::new(
                r.x as f32 / width as f32,
                r.y as f32 / height as f32,
                r.width as f32 / width as f32,
                r.height as f32 / height as f32,
            ),
            None => NormRect::EMPTY,
        }
    }
}

/// Histogram equalization into a new image, with the same mapping as
/// OpenCV's `equalizeHist`.
pub fn equalize_histogram(image: &GrayImage) -> GrayImage {
    let mut hist = [0u32; 256];
    for &v in image.as_raw() {
        hist[v as usize] += 1;
    }

    let total: u32 = image.as_raw().len() as u32;
    let mut out = image.clone();
    let Some(first) = hist.iter().position(|&c| c != 0) else {
        return out;
    };
    if hist[first] == total {
        out.iter_mut().for_each(|v| *v = first as u8);
        return out;
    }

    let scale = 255.0 / (total - hist[first]) as f32;
    let mut lut = [0u8; 256];
    let mut sum = 0u32;
    for i in first + 1..256 {
        sum += hist[i];
        lut[i] = ((sum as f32 * scale).round()).clamp(0.0, 255.0) as u8;
    }

    out.iter_mut().for_each(|v| *v = lut[*v as usize]);
    out
}

pub fn load_cascade(paths: &[PathBuf]) -> Result<Box<dyn FaceCascade>, ModelError> {
    #[cfg(feature = "opencv")]
    {
        let path = super::model::first_path(paths)?;
        Ok(Box::new(cascade::OpenCvCascade::load(path)?))
    }
    #[cfg(not(feature = "opencv"))]
    {
        let _ = paths;
        Err(ModelError::Unavailable("opencv"))
    }
}

#[cfg(feature = "opencv")]
mod cascade {
    use std::path::Path;

    use image::GrayImage;
    use opencv::core::{Mat, Rect, Size, Vector};
    use opencv::objdetect::CascadeClassifier;
    use opencv::prelude::*;

    use super::{CascadeParams, FaceCascade, PixelRect};
    use crate::analytics::model::ModelError;

    pub struct OpenCvCascade {
        classifier: CascadeClassifier,
    }

    impl OpenCvCascade {
        pub fn load(path: &Path) -> Result<Self, ModelError> {
            let init_err = |message: String| ModelError::Init {
                path: path.to_path_buf(),
                message,
            };
            let classifier = CascadeClassifier::new(&path.to_string_lossy())
                .map_err(|e| init_err(e.to_string()))?;
            if classifier.empty().map_err(|e| init_err(e.to_string()))? {
                return Err(init_err("cascade is empty".into()));
            }
            Ok(Self { classifier })
        }
    }

    impl FaceCascade for OpenCvCascade {
        fn detect(
            &mut self,
            image: &GrayImage,
            params: &CascadeParams,
        ) -> Result<Vec<PixelRect>, ModelError> {
            let infer_err = |e: opencv::Error| ModelError::Inference(e.to_string());
            let (w, h) = image.dimensions();
            let mat = Mat::new_rows_cols_with_data(h as i32, w as i32, image.as_raw())
                .map_err(infer_err)?;

            let mut found = Vector::<Rect>::new();
            self.classifier
                .detect_multi_scale(
                    &mat,
                    &mut found,
                    params.scale_factor,
                    params.min_neighbors,
                    0,
                    Size::new(params.min_size.0 as i32, params.min_size.1 as i32),
                    Size::default(),
                )
                .map_err(infer_err)?;

            Ok(found
                .iter()
                .map(|r| PixelRect {
                    x: r.x.max(0) as u32,
                    y: r.y.max(0) as u32,
                    width: r.width.max(0) as u32,
                    height: r.height.max(0) as u32,
                })
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    struct Scripted {
        regions: Vec<PixelRect>,
        seen_equalized: Option<GrayImage>,
    }

    impl FaceCascade for Scripted {
        fn detect(
            &mut self,
            image: &GrayImage,
            params: &CascadeParams,
        ) -> Result<Vec<PixelRect>, ModelError> {
            assert_eq!(params, &CascadeParams::default());
            self.seen_equalized = Some(image.clone());
            Ok(self.regions.clone())
        }
    }

    fn two_tone() -> GrayImage {
        GrayImage::from_fn(100, 50, |x, _| Luma([if x < 50 { 100 } else { 110 }]))
    }

    #[test]
    fn first_region_wins_and_is_normalized() {
        let mut cascade = Scripted {
            regions: vec![
                PixelRect { x: 10, y: 5, width: 20, height: 10 },
                PixelRect { x: 0, y: 0, width: 90, height: 45 },
            ],
            seen_equalized: None,
        };
        let rect = FaceDetector::new(CascadeParams::default()).detect(&mut cascade, &two_tone());
        assert_eq!(rect, NormRect::new(0.1, 0.1, 0.2, 0.2));
    }

    #[test]
    fn no_region_gives_empty_rect() {
        let mut cascade = Scripted {
            regions: Vec::new(),
            seen_equalized: None,
        };
        let rect = FaceDetector::new(CascadeParams::default()).detect(&mut cascade, &two_tone());
        assert!(rect.is_empty());
    }

    #[test]
    fn search_runs_on_equalized_copy() {
        let working = two_tone();
        let mut cascade = Scripted {
            regions: Vec::new(),
            seen_equalized: None,
        };
        FaceDetector::new(CascadeParams::default()).detect(&mut cascade, &working);
        let eq = cascade.seen_equalized.unwrap();
        assert_eq!(eq.get_pixel(0, 0)[0], 0);
        assert_eq!(eq.get_pixel(99, 0)[0], 255);
        // shared input untouched
        assert_eq!(working.get_pixel(0, 0)[0], 100);
    }

    #[test]
    fn uniform_image_equalizes_to_itself() {
        let img = GrayImage::from_pixel(4, 4, Luma([42]));
        assert_eq!(equalize_histogram(&img), img);
    }
}
