use image::GrayImage;

pub const DEFAULT_LUMA_THRESHOLD: u8 = 30;
pub const DEFAULT_SMOOTHING: f64 = 0.7;

pub struct MotionScore {
    /// Fraction of pixels whose luma changed by more than the threshold.
    pub sample: f64,
    /// Smoothed motion level after applying `sample`.
    pub level: f64,
}

/// Frame-difference motion estimator with a single-pole low-pass filter.
pub struct MotionDetector {
    previous: Option<GrayImage>,
    level: f64,
    threshold: u8,
    smoothing: f64,
}

impl MotionDetector {
    pub fn new(threshold: u8, smoothing: f64) -> Self {
        Self {
            previous: None,
            level: 0.0,
            threshold,
            smoothing: smoothing.clamp(0.0, 1.0),
        }
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    pub fn has_baseline(&self) -> bool {
        self.previous.is_some()
    }

    /// Compare `frame` with the stored baseline and refresh the baseline.
    ///
    /// Returns `None` when there was no baseline of matching dimensions; the
    /// level is left untouched in that case.
    pub fn process_frame(&mut self, frame: &GrayImage) -> Option<MotionScore> {
        let score = match &self.previous {
            Some(prev) if prev.dimensions() == frame.dimensions() => {
                let sample = changed_fraction(prev, frame, self.threshold);
                self.level = self.smoothing * self.level + (1.0 - self.smoothing) * sample;
                Some(MotionScore {
                    sample,
                    level: self.level,
                })
            }
            _ => None,
        };

        match self.previous.as_mut() {
            Some(prev) if prev.dimensions() == frame.dimensions() => {
                prev.copy_from_slice(frame.as_raw());
            }
            _ => self.previous = Some(frame.clone()),
        }

        score
    }

    /// Drop the baseline and zero the level.
    pub fn reset(&mut self) {
        self.previous = None;
        self.level = 0.0;
    }
}

fn changed_fraction(prev: &GrayImage, frame: &GrayImage, threshold: u8) -> f64 {
    let total = frame.as_raw().len();
    if total == 0 {
        return 0.0;
    }
    let changed = prev
        .as_raw()
        .iter()
        .zip(frame.as_raw())
        .filter(|(a, b)| a.abs_diff(**b) > threshold)
        .count();
    changed as f64 / total as f64
}
