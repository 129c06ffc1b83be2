use serde::Serialize;

use super::model::ModelState;

/// Rectangle in coordinates normalized to the analyzed image (0..=1).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct NormRect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl NormRect {
    pub const EMPTY: NormRect = NormRect {
        x: 0.0,
        y: 0.0,
        w: 0.0,
        h: 0.0,
    };

    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub fn is_empty(&self) -> bool {
        self.w <= 0.0 || self.h <= 0.0
    }
}

/// Which observable value changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Active,
    LoggingEnabled,
    FaceDetectionEnabled,
    ObjectDetectionEnabled,
    MotionEnergy,
    FaceRect,
    Detections,
}

/// Point-in-time copy of every output signal.
#[derive(Debug, Clone, Serialize)]
pub struct Signals {
    pub version: u64,
    pub active: bool,
    pub logging_enabled: bool,
    pub face_detection_enabled: bool,
    pub object_detection_enabled: bool,
    pub motion_energy: f64,
    pub face_rect: NormRect,
    pub detected_rects: Vec<NormRect>,
    pub detected_labels: Vec<String>,
    pub frame_counter: u64,
    pub face_model: ModelState,
    pub object_model: ModelState,
}

pub type Observer = Box<dyn FnMut(Signal) + Send>;

/// Registered change callbacks plus a version counter for pollers.
#[derive(Default)]
pub struct Notifier {
    observers: Vec<Observer>,
    version: u64,
}

impl Notifier {
    pub fn subscribe(&mut self, observer: Observer) {
        self.observers.push(observer);
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn emit(&mut self, signal: Signal) {
        self.version += 1;
        for observer in &mut self.observers {
            observer(signal);
        }
    }
}
