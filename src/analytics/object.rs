use std::path::PathBuf;

use image::RgbImage;
use ndarray::{Array2, Array4, ArrayView2};

use super::model::ModelError;
use super::signals::NormRect;

pub const NETWORK_INPUT_SIZE: u32 = 300;
pub const DEFAULT_CONFIDENCE_CUTOFF: f32 = 0.4;

const BLOB_MEAN: f32 = 127.5;
const BLOB_SCALE: f32 = 1.0 / 127.5;

// Output row layout: [image_id, class_id, confidence, left, top, right, bottom]
const COL_CLASS: usize = 1;
const COL_CONFIDENCE: usize = 2;
const COL_LEFT: usize = 3;
const COL_TOP: usize = 4;
const COL_RIGHT: usize = 5;
const COL_BOTTOM: usize = 6;
const ROW_WIDTH: usize = 7;

pub const VOC_CLASSES: [&str; 21] = [
    "Background",
    "Plane",
    "Bicycle",
    "Bird",
    "Boat",
    "Bottle",
    "Bus",
    "Car",
    "Cat",
    "Chair",
    "Cow",
    "Table",
    "Dog",
    "Horse",
    "Motorbike",
    "Person",
    "PottedPlant",
    "Sheep",
    "Sofa",
    "Train",
    "TV",
];

#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub rect: NormRect,
    pub label: String,
    pub class_id: i64,
    pub confidence: f32,
}

/// Single-shot detector network back-end.
pub trait ObjectNetwork: Send {
    /// Forward pass returning one row per candidate, at least seven columns.
    fn forward(&mut self, blob: &Array4<f32>) -> Result<Array2<f32>, ModelError>;
}

pub fn class_name(class_id: i64) -> &'static str {
    usize::try_from(class_id)
        .ok()
        .and_then(|i| VOC_CLASSES.get(i))
        .copied()
        .unwrap_or("Unknown")
}

pub fn label_for(class_id: i64, confidence: f32) -> String {
    format!("{} {}%", class_name(class_id), (confidence * 100.0).round() as i32)
}

/// NCHW tensor in BGR channel order, `(p - 127.5) / 127.5`.
pub fn build_blob(image: &RgbImage) -> Array4<f32> {
    let (w, h) = image.dimensions();
    let mut blob = Array4::<f32>::zeros((1, 3, h as usize, w as usize));
    for (x, y, px) in image.enumerate_pixels() {
        let [r, g, b] = px.0;
        let (x, y) = (x as usize, y as usize);
        blob[[0, 0, y, x]] = (b as f32 - BLOB_MEAN) * BLOB_SCALE;
        blob[[0, 1, y, x]] = (g as f32 - BLOB_MEAN) * BLOB_SCALE;
        blob[[0, 2, y, x]] = (r as f32 - BLOB_MEAN) * BLOB_SCALE;
    }
    blob
}

/// Keep rows scoring strictly above `cutoff`, in network order.
pub fn parse_detections(
    rows: ArrayView2<'_, f32>,
    cutoff: f32,
) -> Result<Vec<Detection>, ModelError> {
    if rows.ncols() < ROW_WIDTH {
        return Err(ModelError::Shape(rows.shape().to_vec()));
    }

    let detections = rows
        .rows()
        .into_iter()
        .filter(|row| row[COL_CONFIDENCE] > cutoff)
        .map(|row| {
            let confidence = row[COL_CONFIDENCE];
            let class_id = row[COL_CLASS] as i64;
            let left = row[COL_LEFT].max(0.0);
            let top = row[COL_TOP].max(0.0);
            Detection {
                rect: NormRect::new(
                    left,
                    top,
                    row[COL_RIGHT] - left,
                    row[COL_BOTTOM] - top,
                ),
                label: label_for(class_id, confidence),
                class_id,
                confidence,
            }
        })
        .collect();

    Ok(detections)
}

pub struct ObjectDetector {
    cutoff: f32,
}

impl ObjectDetector {
    pub fn new(cutoff: f32) -> Self {
        Self { cutoff }
    }

    /// Run the network on an already resized and rotated color input.
    pub fn detect(
        &self,
        network: &mut dyn ObjectNetwork,
        input: &RgbImage,
    ) -> Result<Vec<Detection>, ModelError> {
        let blob = build_blob(input);
        let output = network.forward(&blob)?;
        parse_detections(output.view(), self.cutoff)
    }
}

pub fn load_network(paths: &[PathBuf]) -> Result<Box<dyn ObjectNetwork>, ModelError> {
    #[cfg(feature = "onnx")]
    {
        let path = super::model::first_path(paths)?;
        Ok(Box::new(onnx::OnnxNetwork::load(path)?))
    }
    #[cfg(not(feature = "onnx"))]
    {
        let _ = paths;
        Err(ModelError::Unavailable("onnx"))
    }
}

#[cfg(feature = "onnx")]
mod onnx {
    use std::fmt::Display;
    use std::path::Path;

    use ndarray::{Array2, Array4};
    use ort::session::{builder::GraphOptimizationLevel, Session};
    use ort::value::TensorRef;

    use super::{ObjectNetwork, ROW_WIDTH};
    use crate::analytics::model::ModelError;

    pub struct OnnxNetwork {
        session: Session,
    }

    fn init_error(path: &Path, e: impl Display) -> ModelError {
        ModelError::Init {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    }

    fn inference_error(e: impl Display) -> ModelError {
        ModelError::Inference(e.to_string())
    }

    impl OnnxNetwork {
        pub fn load(path: &Path) -> Result<Self, ModelError> {
            let session = Session::builder()
                .map_err(|e| init_error(path, e))?
                .with_optimization_level(GraphOptimizationLevel::Level3)
                .map_err(|e| init_error(path, e))?
                .with_intra_threads(2)
                .map_err(|e| init_error(path, e))?
                .commit_from_file(path)
                .map_err(|e| init_error(path, e))?;
            Ok(Self { session })
        }
    }

    impl ObjectNetwork for OnnxNetwork {
        fn forward(&mut self, blob: &Array4<f32>) -> Result<Array2<f32>, ModelError> {
            let tensor = TensorRef::from_array_view(blob.view())
                .map_err(inference_error)?
                .into_dyn();
            let outputs = self
                .session
                .run(ort::inputs![tensor])
                .map_err(inference_error)?;

            // SSD detection output: [1, 1, N, 7]
            let output = outputs[0]
                .try_extract_array::<f32>()
                .map_err(inference_error)?;
            let shape = output.shape().to_vec();
            let cols = shape.last().copied().unwrap_or(0);
            if cols < ROW_WIDTH {
                return Err(ModelError::Shape(shape));
            }
            let rows = output.len() / cols;
            Array2::from_shape_vec((rows, cols), output.iter().copied().collect())
                .map_err(|_| ModelError::Shape(shape))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use ndarray::array;

    struct FixedOutput(Array2<f32>);

    impl ObjectNetwork for FixedOutput {
        fn forward(&mut self, blob: &Array4<f32>) -> Result<Array2<f32>, ModelError> {
            assert_eq!(blob.shape(), &[1, 3, 300, 300]);
            Ok(self.0.clone())
        }
    }

    #[test]
    fn label_table_and_unknown() {
        assert_eq!(class_name(0), "Background");
        assert_eq!(class_name(15), "Person");
        assert_eq!(class_name(20), "TV");
        assert_eq!(class_name(21), "Unknown");
        assert_eq!(class_name(-1), "Unknown");
        assert_eq!(label_for(15, 0.876), "Person 88%");
    }

    #[test]
    fn cutoff_is_strict() {
        let rows = array![
            [0.0, 15.0, 0.4, 0.1, 0.1, 0.5, 0.5],
            [0.0, 7.0, 0.41, 0.2, 0.2, 0.6, 0.9],
            [0.0, 99.0, 0.9, 0.0, 0.0, 1.0, 1.0],
        ];
        let dets = parse_detections(rows.view(), 0.4).unwrap();
        assert_eq!(dets.len(), 2);
        assert_eq!(dets[0].label, "Car 41%");
        assert_eq!(dets[1].label, "Unknown 90%");
    }

    #[test]
    fn left_and_top_are_clamped() {
        let rows = array![[0.0, 12.0, 0.8, -0.1, -0.2, 0.5, 0.6]];
        let dets = parse_detections(rows.view(), 0.4).unwrap();
        let r = dets[0].rect;
        assert_eq!((r.x, r.y), (0.0, 0.0));
        assert!((r.w - 0.5).abs() < 1e-6);
        assert!((r.h - 0.6).abs() < 1e-6);
    }

    #[test]
    fn narrow_output_is_rejected() {
        let rows = array![[0.0, 1.0, 0.9]];
        assert!(matches!(
            parse_detections(rows.view(), 0.4),
            Err(ModelError::Shape(_))
        ));
    }

    #[test]
    fn blob_is_bgr_and_normalized() {
        let img = RgbImage::from_pixel(2, 1, Rgb([255, 0, 127]));
        let blob = build_blob(&img);
        assert_eq!(blob.shape(), &[1, 3, 1, 2]);
        assert!((blob[[0, 0, 0, 0]] - (127.0 - 127.5) / 127.5).abs() < 1e-6);
        assert!((blob[[0, 1, 0, 0]] + 1.0).abs() < 1e-6);
        assert!((blob[[0, 2, 0, 1]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn detector_runs_full_batch() {
        let mut net = FixedOutput(array![
            [0.0, 15.0, 0.95, 0.1, 0.2, 0.3, 0.4],
            [0.0, 8.0, 0.2, 0.1, 0.2, 0.3, 0.4],
        ]);
        let input = RgbImage::new(NETWORK_INPUT_SIZE, NETWORK_INPUT_SIZE);
        let dets = ObjectDetector::new(DEFAULT_CONFIDENCE_CUTOFF)
            .detect(&mut net, &input)
            .unwrap();
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].label, "Person 95%");
        assert_eq!(dets[0].class_id, 15);
    }
}
