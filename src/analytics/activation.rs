use super::pipeline::FramePipeline;
use super::signals::{NormRect, Signal};

impl FramePipeline {
    /// Models load lazily here for every enabled feature. Deactivation never
    /// unloads a model.
    pub fn set_active(&mut self, active: bool) {
        if self.active == active {
            return;
        }
        self.active = active;

        if active {
            if self.face_enabled {
                self.face_model.ensure_loaded(self.assets.as_ref(), false);
            }
            if self.object_enabled {
                self.object_model.ensure_loaded(self.assets.as_ref(), false);
            }
            tracing::info!("pipeline activated");
        } else {
            self.motion.reset();
            self.notifier.emit(Signal::MotionEnergy);
            tracing::info!("pipeline deactivated");
        }
        self.notifier.emit(Signal::Active);
    }

    pub fn set_logging_enabled(&mut self, enabled: bool) {
        if self.logging_enabled == enabled {
            return;
        }
        self.logging_enabled = enabled;
        self.notifier.emit(Signal::LoggingEnabled);
    }

    pub fn set_face_detection_enabled(&mut self, enabled: bool) {
        if self.face_enabled == enabled {
            return;
        }
        self.face_enabled = enabled;

        if enabled {
            if self.active {
                self.face_model.ensure_loaded(self.assets.as_ref(), true);
            }
        } else {
            self.face_rect = NormRect::EMPTY;
            self.notifier.emit(Signal::FaceRect);
        }
        self.notifier.emit(Signal::FaceDetectionEnabled);
    }

    pub fn set_object_detection_enabled(&mut self, enabled: bool) {
        if self.object_enabled == enabled {
            return;
        }
        self.object_enabled = enabled;

        if enabled {
            if self.active {
                self.object_model.ensure_loaded(self.assets.as_ref(), true);
            }
        } else {
            self.detections.clear();
            self.notifier.emit(Signal::Detections);
        }
        self.notifier.emit(Signal::ObjectDetectionEnabled);
    }

    /// Re-attempt loading of failed models for enabled features.
    pub fn reload_models(&mut self) {
        if !self.active {
            return;
        }
        if self.face_enabled {
            self.face_model.ensure_loaded(self.assets.as_ref(), true);
        }
        if self.object_enabled {
            self.object_model.ensure_loaded(self.assets.as_ref(), true);
        }
    }
}
