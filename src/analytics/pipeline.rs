use std::sync::Arc;

use image::GrayImage;

use crate::assets::AssetProvider;

use super::face::{self, CascadeParams, FaceCascade, FaceDetector};
use super::frame::{FrameBuffer, FrameView, MappedFrame, PixelFormat};
use super::model::{DetectorModel, ModelState};
use super::motion::{MotionDetector, DEFAULT_LUMA_THRESHOLD, DEFAULT_SMOOTHING};
use super::object::{
    self, Detection, ObjectDetector, ObjectNetwork, DEFAULT_CONFIDENCE_CUTOFF, NETWORK_INPUT_SIZE,
};
use super::preprocess::{Preprocessor, Rotation, DEFAULT_TARGET_LONG_EDGE};
use super::signals::{NormRect, Notifier, Observer, Signal, Signals};

pub const DEFAULT_FACE_CADENCE: u64 = 5;
pub const DEFAULT_OBJECT_CADENCE: u64 = 30;
pub const DEFAULT_MOTION_LOG_THRESHOLD: f64 = 0.05;

pub const FACE_CASCADE_RESOURCE: &str = "haarcascade_frontalface_default.xml";
pub const OBJECT_NETWORK_RESOURCE: &str = "MobileNetSSD_deploy.onnx";

/// Tunables shared by every stage of the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConstants {
    pub face_cadence: u64,
    pub object_cadence: u64,
    pub motion_threshold: u8,
    pub motion_log_threshold: f64,
    pub smoothing: f64,
    pub confidence_cutoff: f32,
    pub network_input: u32,
    pub target_long_edge: u32,
    pub rotation: Rotation,
    pub cascade: CascadeParams,
}

impl Default for PipelineConstants {
    fn default() -> Self {
        Self {
            face_cadence: DEFAULT_FACE_CADENCE,
            object_cadence: DEFAULT_OBJECT_CADENCE,
            motion_threshold: DEFAULT_LUMA_THRESHOLD,
            motion_log_threshold: DEFAULT_MOTION_LOG_THRESHOLD,
            smoothing: DEFAULT_SMOOTHING,
            confidence_cutoff: DEFAULT_CONFIDENCE_CUTOFF,
            network_input: NETWORK_INPUT_SIZE,
            target_long_edge: DEFAULT_TARGET_LONG_EDGE,
            rotation: Rotation::default(),
            cascade: CascadeParams::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Inactive,
    MapFailed,
    UnsupportedFormat(PixelFormat),
    InvalidFrame,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub frame_counter: u64,
    /// Changed-pixel fraction, when a baseline of matching size existed.
    pub motion_sample: Option<f64>,
    pub motion_event: bool,
    pub face_ran: bool,
    pub object_ran: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    Skipped(SkipReason),
    Processed(FrameReport),
}

pub type FaceModel = DetectorModel<Box<dyn FaceCascade>>;
pub type ObjectModel = DetectorModel<Box<dyn ObjectNetwork>>;

/// Per-frame analysis state. Every method runs on the caller's thread;
/// callers sharing one pipeline across threads serialize access themselves.
pub struct FramePipeline {
    constants: PipelineConstants,
    preprocessor: Preprocessor,
    pub(super) motion: MotionDetector,
    face: FaceDetector,
    object: ObjectDetector,
    pub(super) face_model: FaceModel,
    pub(super) object_model: ObjectModel,
    pub(super) assets: Arc<dyn AssetProvider>,
    pub(super) active: bool,
    pub(super) logging_enabled: bool,
    pub(super) face_enabled: bool,
    pub(super) object_enabled: bool,
    pub(super) face_rect: NormRect,
    pub(super) detections: Vec<Detection>,
    frame_counter: u64,
    pub(super) notifier: Notifier,
}

impl FramePipeline {
    pub fn new(
        constants: PipelineConstants,
        assets: Arc<dyn AssetProvider>,
        face_model: FaceModel,
        object_model: ObjectModel,
    ) -> Self {
        Self {
            preprocessor: Preprocessor::new(constants.target_long_edge, constants.rotation),
            motion: MotionDetector::new(constants.motion_threshold, constants.smoothing),
            face: FaceDetector::new(constants.cascade.clone()),
            object: ObjectDetector::new(constants.confidence_cutoff),
            constants,
            face_model,
            object_model,
            assets,
            active: false,
            logging_enabled: false,
            face_enabled: false,
            object_enabled: false,
            face_rect: NormRect::EMPTY,
            detections: Vec::new(),
            frame_counter: 0,
            notifier: Notifier::default(),
        }
    }

    /// Pipeline backed by the compiled-in cascade and network loaders.
    pub fn with_default_models(
        constants: PipelineConstants,
        assets: Arc<dyn AssetProvider>,
        face_resource: &str,
        object_resource: &str,
    ) -> Self {
        let face_model = DetectorModel::new(
            "face",
            vec![face_resource.to_string()],
            Box::new(face::load_cascade),
        );
        let object_model = DetectorModel::new(
            "object",
            vec![object_resource.to_string()],
            Box::new(object::load_network),
        );
        Self::new(constants, assets, face_model, object_model)
    }

    /// Analyze one frame. The buffer is mapped for the duration of the call
    /// and unmapped on every return path.
    pub fn process_frame<B: FrameBuffer + ?Sized>(&mut self, buffer: &mut B) -> FrameOutcome {
        if !self.active {
            return FrameOutcome::Skipped(SkipReason::Inactive);
        }

        let Some(mapped) = MappedFrame::map(buffer) else {
            tracing::debug!("failed to map buffer");
            return FrameOutcome::Skipped(SkipReason::MapFailed);
        };

        let format = mapped.format();
        if !format.is_supported() {
            tracing::trace!(format = format.as_str(), "unsupported pixel format");
            return FrameOutcome::Skipped(SkipReason::UnsupportedFormat(format));
        }

        let view = match mapped.view() {
            Ok(v) if v.width > 0 && v.height > 0 => v,
            Ok(_) => return FrameOutcome::Skipped(SkipReason::InvalidFrame),
            Err(e) => {
                tracing::debug!(error = %e, "invalid frame");
                return FrameOutcome::Skipped(SkipReason::InvalidFrame);
            }
        };

        let working = match self.preprocessor.working_image(&view) {
            Ok(img) => img,
            Err(e) => {
                tracing::debug!(error = %e, "luma plane not readable");
                return FrameOutcome::Skipped(SkipReason::InvalidFrame);
            }
        };

        self.frame_counter += 1;
        let frame_counter = self.frame_counter;

        let (motion_sample, motion_event) = self.run_motion(&working);
        let face_ran = self.run_face(frame_counter, &working);
        let object_ran = self.run_object(frame_counter, &view);

        FrameOutcome::Processed(FrameReport {
            frame_counter,
            motion_sample,
            motion_event,
            face_ran,
            object_ran,
        })
    }

    fn run_motion(&mut self, working: &GrayImage) -> (Option<f64>, bool) {
        let Some(score) = self.motion.process_frame(working) else {
            return (None, false);
        };
        self.notifier.emit(Signal::MotionEnergy);

        let event = self.logging_enabled && score.sample > self.constants.motion_log_threshold;
        if event {
            tracing::info!(
                sample = format!("{:.3}", score.sample),
                level = format!("{:.3}", score.level),
                "motion event"
            );
        }
        (Some(score.sample), event)
    }

    fn run_face(&mut self, frame_counter: u64, working: &GrayImage) -> bool {
        if !self.face_enabled || frame_counter % self.constants.face_cadence.max(1) != 0 {
            return false;
        }
        let Some(cascade) = self.face_model.handle_mut() else {
            return false;
        };

        self.face_rect = self.face.detect(&mut **cascade, working);
        if self.logging_enabled {
            tracing::debug!(
                frame = frame_counter,
                found = !self.face_rect.is_empty(),
                "face search"
            );
        }
        self.notifier.emit(Signal::FaceRect);
        true
    }

    fn run_object(&mut self, frame_counter: u64, view: &FrameView<'_>) -> bool {
        if !self.object_enabled || frame_counter % self.constants.object_cadence.max(1) != 0 {
            return false;
        }
        let Some(network) = self.object_model.handle_mut() else {
            return false;
        };

        let Some(input) = self.preprocessor.color_input(view, self.constants.network_input) else {
            tracing::debug!(frame = frame_counter, "frame has no chroma plane");
            return false;
        };

        match self.object.detect(&mut **network, &input) {
            Ok(detections) => {
                if self.logging_enabled {
                    for det in &detections {
                        tracing::debug!(
                            frame = frame_counter,
                            label = %det.label,
                            confidence = format!("{:.2}", det.confidence),
                            "object detected"
                        );
                    }
                }
                self.detections = detections;
                self.notifier.emit(Signal::Detections);
                true
            }
            Err(e) => {
                tracing::debug!(frame = frame_counter, error = %e, "object detection error");
                false
            }
        }
    }

    pub fn subscribe(&mut self, observer: Observer) {
        self.notifier.subscribe(observer);
    }

    pub fn version(&self) -> u64 {
        self.notifier.version()
    }

    pub fn active(&self) -> bool {
        self.active
    }

    pub fn logging_enabled(&self) -> bool {
        self.logging_enabled
    }

    pub fn face_detection_enabled(&self) -> bool {
        self.face_enabled
    }

    pub fn object_detection_enabled(&self) -> bool {
        self.object_enabled
    }

    pub fn motion_energy(&self) -> f64 {
        self.motion.level()
    }

    pub fn face_rect(&self) -> NormRect {
        self.face_rect
    }

    pub fn detections(&self) -> &[Detection] {
        &self.detections
    }

    pub fn detected_rects(&self) -> Vec<NormRect> {
        self.detections.iter().map(|d| d.rect).collect()
    }

    pub fn detected_labels(&self) -> Vec<String> {
        self.detections.iter().map(|d| d.label.clone()).collect()
    }

    pub fn frame_counter(&self) -> u64 {
        self.frame_counter
    }

    pub fn face_model_state(&self) -> ModelState {
        self.face_model.state()
    }

    pub fn object_model_state(&self) -> ModelState {
        self.object_model.state()
    }

    pub fn snapshot(&self) -> Signals {
        Signals {
            version: self.version(),
            active: self.active,
            logging_enabled: self.logging_enabled,
            face_detection_enabled: self.face_enabled,
            object_detection_enabled: self.object_enabled,
            motion_energy: self.motion_energy(),
            face_rect: self.face_rect,
            detected_rects: self.detected_rects(),
            detected_labels: self.detected_labels(),
            frame_counter: self.frame_counter,
            face_model: self.face_model_state(),
            object_model: self.object_model_state(),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    use image::GrayImage;
    use ndarray::{Array2, Array4};

    use super::*;
    use crate::analytics::face::PixelRect;
    use crate::analytics::frame::OwnedFrame;
    use crate::analytics::model::ModelError;

    pub const FACE_FILE: &str = "face.xml";
    pub const NET_FILE: &str = "net.onnx";

    pub struct TempAssets {
        pub dir: tempfile::TempDir,
    }

    impl AssetProvider for TempAssets {
        fn materialize(&self, name: &str) -> PathBuf {
            self.dir.path().join(name)
        }
    }

    pub struct FixedCascade(pub Vec<PixelRect>);

    impl FaceCascade for FixedCascade {
        fn detect(
            &mut self,
            _image: &GrayImage,
            _params: &CascadeParams,
        ) -> Result<Vec<PixelRect>, ModelError> {
            Ok(self.0.clone())
        }
    }

    pub struct FixedNetwork(pub Array2<f32>);

    impl ObjectNetwork for FixedNetwork {
        fn forward(&mut self, _blob: &Array4<f32>) -> Result<Array2<f32>, ModelError> {
            Ok(self.0.clone())
        }
    }

    /// Pipeline with fake back-ends plus init-call counters.
    pub struct Harness {
        pub pipeline: FramePipeline,
        pub face_loads: Arc<AtomicU32>,
        pub object_loads: Arc<AtomicU32>,
        pub signals: Arc<Mutex<Vec<Signal>>>,
    }

    impl Harness {
        pub fn new(constants: PipelineConstants) -> Self {
            Self::with_files(constants, true)
        }

        pub fn with_files(constants: PipelineConstants, files_present: bool) -> Self {
            let dir = tempfile::tempdir().unwrap();
            if files_present {
                std::fs::write(dir.path().join(FACE_FILE), b"cascade").unwrap();
                std::fs::write(dir.path().join(NET_FILE), b"network").unwrap();
            }
            let face_loads = Arc::new(AtomicU32::new(0));
            let object_loads = Arc::new(AtomicU32::new(0));

            let counter = face_loads.clone();
            let face_model = DetectorModel::new(
                "face",
                vec![FACE_FILE.into()],
                Box::new(move |_: &[PathBuf]| -> Result<Box<dyn FaceCascade>, ModelError> {
                    counter.fetch_add(1, Ordering::SeqCst);
                    let cascade: Box<dyn FaceCascade> = Box::new(FixedCascade(vec![PixelRect {
                        x: 24,
                        y: 32,
                        width: 48,
                        height: 64,
                    }]));
                    Ok(cascade)
                }),
            );

            let counter = object_loads.clone();
            let object_model = DetectorModel::new(
                "object",
                vec![NET_FILE.into()],
                Box::new(move |_: &[PathBuf]| -> Result<Box<dyn ObjectNetwork>, ModelError> {
                    counter.fetch_add(1, Ordering::SeqCst);
                    let rows = ndarray::array![
                        [0.0f32, 15.0, 0.9, 0.1, 0.1, 0.4, 0.8],
                        [0.0, 3.0, 0.3, 0.5, 0.5, 0.6, 0.6],
                    ];
                    let network: Box<dyn ObjectNetwork> = Box::new(FixedNetwork(rows));
                    Ok(network)
                }),
            );

            let assets: Arc<dyn AssetProvider> = Arc::new(TempAssets { dir });
            let mut pipeline = FramePipeline::new(constants, assets, face_model, object_model);
            let signals = Arc::new(Mutex::new(Vec::new()));
            let sink = signals.clone();
            pipeline.subscribe(Box::new(move |s: Signal| sink.lock().unwrap().push(s)));

            Self {
                pipeline,
                face_loads,
                object_loads,
                signals,
            }
        }

        pub fn take_signals(&self) -> Vec<Signal> {
            std::mem::take(&mut *self.signals.lock().unwrap())
        }

        pub fn face_loads(&self) -> u32 {
            self.face_loads.load(Ordering::SeqCst)
        }

        pub fn object_loads(&self) -> u32 {
            self.object_loads.load(Ordering::SeqCst)
        }
    }

    pub fn flat_frame(value: u8) -> OwnedFrame {
        OwnedFrame::from_luma(640, 480, PixelFormat::Nv12, &vec![value; 640 * 480])
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::analytics::frame::OwnedFrame;

    /// Buffer whose mapping always fails.
    struct LockedBuffer {
        unmaps: u32,
    }

    impl FrameBuffer for LockedBuffer {
        fn width(&self) -> u32 {
            640
        }

        fn height(&self) -> u32 {
            480
        }

        fn format(&self) -> PixelFormat {
            PixelFormat::Nv12
        }

        fn map(&mut self) -> bool {
            false
        }

        fn unmap(&mut self) {
            self.unmaps += 1;
        }

        fn plane(&self, _index: usize) -> Option<(&[u8], usize)> {
            None
        }
    }

    fn running_harness() -> Harness {
        let mut h = Harness::new(PipelineConstants {
            face_cadence: 1,
            object_cadence: 1,
            ..PipelineConstants::default()
        });
        h.pipeline.set_face_detection_enabled(true);
        h.pipeline.set_object_detection_enabled(true);
        h.pipeline.set_active(true);
        h.take_signals();
        h
    }

    fn process(h: &mut Harness, frame: &mut OwnedFrame) -> FrameReport {
        match h.pipeline.process_frame(frame) {
            FrameOutcome::Processed(report) => report,
            other => panic!("frame skipped: {other:?}"),
        }
    }

    #[test]
    fn inactive_pipeline_does_not_touch_buffer() {
        let mut h = Harness::new(PipelineConstants::default());
        let mut frame = flat_frame(10);
        assert_eq!(
            h.pipeline.process_frame(&mut frame),
            FrameOutcome::Skipped(SkipReason::Inactive)
        );
        assert_eq!(frame.map_count(), 0);
    }

    #[test]
    fn unsupported_format_changes_nothing() {
        let mut h = Harness::new(PipelineConstants::default());
        h.pipeline.set_face_detection_enabled(true);
        h.pipeline.set_active(true);
        h.take_signals();
        let version = h.pipeline.version();

        let mut frame = OwnedFrame::from_luma(64, 48, PixelFormat::Other, &[0; 64 * 48]);
        for _ in 0..10 {
            assert_eq!(
                h.pipeline.process_frame(&mut frame),
                FrameOutcome::Skipped(SkipReason::UnsupportedFormat(PixelFormat::Other))
            );
        }
        assert_eq!(frame.unmap_count(), 10);
        assert_eq!(h.pipeline.version(), version);
        assert!(h.take_signals().is_empty());
        assert_eq!(h.pipeline.frame_counter(), 0);
        assert_eq!(h.pipeline.motion_energy(), 0.0);
        assert!(h.pipeline.face_rect().is_empty());
        assert!(h.pipeline.detections().is_empty());
    }

    #[test]
    fn map_failure_skips_without_state_change() {
        let mut h = running_harness();
        process(&mut h, &mut flat_frame(0));
        h.take_signals();
        let version = h.pipeline.version();
        let energy = h.pipeline.motion_energy();

        let mut buffer = LockedBuffer { unmaps: 0 };
        for _ in 0..3 {
            assert_eq!(
                h.pipeline.process_frame(&mut buffer),
                FrameOutcome::Skipped(SkipReason::MapFailed)
            );
        }
        assert_eq!(buffer.unmaps, 0);
        assert_eq!(h.pipeline.frame_counter(), 1);
        assert_eq!(h.pipeline.version(), version);
        assert_eq!(h.pipeline.motion_energy(), energy);
        assert!(h.take_signals().is_empty());
    }

    #[test]
    fn truncated_luma_plane_is_skipped_and_unmapped() {
        let mut h = running_harness();
        let version = h.pipeline.version();

        let mut frame = OwnedFrame::new(640, 480, 640, PixelFormat::Nv12, vec![0; 1000]);
        assert_eq!(
            h.pipeline.process_frame(&mut frame),
            FrameOutcome::Skipped(SkipReason::InvalidFrame)
        );
        assert_eq!(frame.unmap_count(), 1);
        assert!(!frame.is_mapped());
        assert_eq!(h.pipeline.frame_counter(), 0);
        assert_eq!(h.pipeline.version(), version);
        assert!(h.take_signals().is_empty());
        assert!(h.pipeline.face_rect().is_empty());
        assert!(h.pipeline.detections().is_empty());
    }

    #[test]
    fn odd_width_frames_reach_object_detection() {
        let mut h = running_harness();
        let mut frame = OwnedFrame::from_luma(641, 480, PixelFormat::Nv12, &vec![80; 641 * 480]);
        let report = process(&mut h, &mut frame);
        assert_eq!(report.frame_counter, 1);
        assert!(report.object_ran);
        assert_eq!(h.pipeline.detected_labels(), vec!["Person 90%".to_string()]);
    }

    #[test]
    fn processed_frames_are_unmapped() {
        let mut h = Harness::new(PipelineConstants::default());
        h.pipeline.set_active(true);
        let mut frame = flat_frame(0);
        process(&mut h, &mut frame);
        process(&mut h, &mut frame);
        assert_eq!(frame.unmap_count(), 2);
        assert!(!frame.is_mapped());
    }

    #[test]
    fn motion_runs_every_frame_after_first() {
        let mut h = Harness::new(PipelineConstants::default());
        h.pipeline.set_active(true);
        h.take_signals();

        let first = process(&mut h, &mut flat_frame(0));
        assert_eq!(first.frame_counter, 1);
        assert_eq!(first.motion_sample, None);
        assert!(h.take_signals().is_empty());

        let second = process(&mut h, &mut flat_frame(200));
        assert_eq!(second.motion_sample, Some(1.0));
        assert_eq!(h.take_signals(), vec![Signal::MotionEnergy]);
        assert!((h.pipeline.motion_energy() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn identical_frames_decay_motion() {
        let mut h = Harness::new(PipelineConstants::default());
        h.pipeline.set_active(true);
        process(&mut h, &mut flat_frame(0));
        process(&mut h, &mut flat_frame(255));
        let mut level = h.pipeline.motion_energy();
        for _ in 0..10 {
            let report = process(&mut h, &mut flat_frame(255));
            assert_eq!(report.motion_sample, Some(0.0));
            let next = h.pipeline.motion_energy();
            assert!((next - level * 0.7).abs() < 1e-12);
            level = next;
        }
    }

    #[test]
    fn large_region_change_logs_motion_event() {
        let mut h = Harness::new(PipelineConstants::default());
        h.pipeline.set_active(true);
        h.pipeline.set_logging_enabled(true);

        let base = vec![50u8; 640 * 480];
        let mut changed = base.clone();
        // top tenth of the frame brightened well past the luma threshold
        for px in changed.iter_mut().take(640 * 48) {
            *px = 200;
        }
        process(&mut h, &mut OwnedFrame::from_luma(640, 480, PixelFormat::Nv21, &base));
        let report = process(
            &mut h,
            &mut OwnedFrame::from_luma(640, 480, PixelFormat::Nv21, &changed),
        );
        let sample = report.motion_sample.unwrap();
        assert!(sample > 0.05, "sample {sample}");
        assert!(report.motion_event);
    }

    #[test]
    fn motion_event_requires_logging() {
        let mut h = Harness::new(PipelineConstants::default());
        h.pipeline.set_active(true);
        process(&mut h, &mut flat_frame(0));
        let report = process(&mut h, &mut flat_frame(255));
        assert!(!report.motion_event);
    }

    #[test]
    fn cadence_gates_face_and_object_stages() {
        let mut h = Harness::new(PipelineConstants::default());
        h.pipeline.set_face_detection_enabled(true);
        h.pipeline.set_object_detection_enabled(true);
        h.pipeline.set_active(true);

        let mut frame = flat_frame(80);
        for n in 1..=60u64 {
            let report = process(&mut h, &mut frame);
            assert_eq!(report.frame_counter, n);
            assert_eq!(report.face_ran, n % 5 == 0, "face at {n}");
            assert_eq!(report.object_ran, n % 30 == 0, "object at {n}");
        }
    }

    #[test]
    fn face_rect_is_normalized_to_working_image() {
        let mut h = Harness::new(PipelineConstants::default());
        h.pipeline.set_face_detection_enabled(true);
        h.pipeline.set_active(true);
        h.take_signals();

        let mut frame = flat_frame(80);
        for _ in 0..5 {
            process(&mut h, &mut frame);
        }
        // 640x480 -> 320x240 -> rotated 240x320
        assert_eq!(h.pipeline.face_rect(), NormRect::new(0.1, 0.1, 0.2, 0.2));
        assert!(h.take_signals().contains(&Signal::FaceRect));
    }

    #[test]
    fn detections_replace_whole_batch() {
        let mut h = Harness::new(PipelineConstants {
            object_cadence: 2,
            ..PipelineConstants::default()
        });
        h.pipeline.set_object_detection_enabled(true);
        h.pipeline.set_active(true);
        h.take_signals();

        let mut frame = flat_frame(80);
        process(&mut h, &mut frame);
        process(&mut h, &mut frame);
        assert_eq!(h.pipeline.detected_labels(), vec!["Person 90%".to_string()]);
        assert_eq!(h.pipeline.detected_rects().len(), 1);
        let detection_signals = h
            .take_signals()
            .into_iter()
            .filter(|s| *s == Signal::Detections)
            .count();
        assert_eq!(detection_signals, 1);

        process(&mut h, &mut frame);
        process(&mut h, &mut frame);
        assert_eq!(h.pipeline.detections().len(), 1);
    }

    #[test]
    fn missing_models_leave_features_inert() {
        let mut h = Harness::with_files(PipelineConstants::default(), false);
        h.pipeline.set_face_detection_enabled(true);
        h.pipeline.set_object_detection_enabled(true);
        h.pipeline.set_active(true);
        assert_eq!(h.pipeline.face_model_state(), ModelState::Failed);
        assert_eq!(h.pipeline.object_model_state(), ModelState::Failed);

        let mut frame = flat_frame(80);
        for _ in 0..30 {
            let report = process(&mut h, &mut frame);
            assert!(!report.face_ran && !report.object_ran);
        }
        assert_eq!(h.face_loads(), 0);
    }

    #[test]
    fn snapshot_lists_are_parallel() {
        let mut h = Harness::new(PipelineConstants {
            object_cadence: 1,
            ..PipelineConstants::default()
        });
        h.pipeline.set_object_detection_enabled(true);
        h.pipeline.set_active(true);
        process(&mut h, &mut flat_frame(10));
        let snap = h.pipeline.snapshot();
        assert_eq!(snap.detected_rects.len(), snap.detected_labels.len());
        assert_eq!(snap.frame_counter, 1);
        assert_eq!(snap.object_model, ModelState::Ready);
    }
}
