use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::analytics::face::CascadeParams;
use crate::analytics::motion::{DEFAULT_LUMA_THRESHOLD, DEFAULT_SMOOTHING};
use crate::analytics::object::{DEFAULT_CONFIDENCE_CUTOFF, NETWORK_INPUT_SIZE};
use crate::analytics::preprocess::{Rotation, DEFAULT_TARGET_LONG_EDGE};
use crate::analytics::{
    PipelineConstants, PixelFormat, DEFAULT_FACE_CADENCE, DEFAULT_MOTION_LOG_THRESHOLD,
    DEFAULT_OBJECT_CADENCE, FACE_CASCADE_RESOURCE, OBJECT_NETWORK_RESOURCE,
};

const DEFAULT_CONFIG_PATH: &str = "camlens.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

fn default_source_url() -> String {
    "/dev/video0".to_string()
}

fn default_width() -> u32 {
    1920
}

fn default_height() -> u32 {
    1080
}

fn default_fps() -> u32 {
    30
}

fn default_format() -> PixelFormat {
    PixelFormat::Nv12
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_source_url")]
    pub url: String,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_format")]
    pub format: PixelFormat,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: default_source_url(),
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
            format: default_format(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_target_long_edge() -> u32 {
    DEFAULT_TARGET_LONG_EDGE
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConstantsConfig {
    #[serde(default = "default_face_cadence")]
    pub face_cadence: u64,
    #[serde(default = "default_object_cadence")]
    pub object_cadence: u64,
    #[serde(default = "default_motion_threshold")]
    pub motion_threshold: u8,
    #[serde(default = "default_motion_log_threshold")]
    pub motion_log_threshold: f64,
    #[serde(default = "default_smoothing")]
    pub smoothing: f64,
    #[serde(default = "default_confidence_cutoff")]
    pub confidence_cutoff: f32,
    #[serde(default = "default_network_input")]
    pub network_input: u32,
}

fn default_face_cadence() -> u64 {
    DEFAULT_FACE_CADENCE
}

fn default_object_cadence() -> u64 {
    DEFAULT_OBJECT_CADENCE
}

fn default_motion_threshold() -> u8 {
    DEFAULT_LUMA_THRESHOLD
}

fn default_motion_log_threshold() -> f64 {
    DEFAULT_MOTION_LOG_THRESHOLD
}

fn default_smoothing() -> f64 {
    DEFAULT_SMOOTHING
}

fn default_confidence_cutoff() -> f32 {
    DEFAULT_CONFIDENCE_CUTOFF
}

fn default_network_input() -> u32 {
    NETWORK_INPUT_SIZE
}

impl Default for ConstantsConfig {
    fn default() -> Self {
        Self {
            face_cadence: default_face_cadence(),
            object_cadence: default_object_cadence(),
            motion_threshold: default_motion_threshold(),
            motion_log_threshold: default_motion_log_threshold(),
            smoothing: default_smoothing(),
            confidence_cutoff: default_confidence_cutoff(),
            network_input: default_network_input(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub logging: bool,
    #[serde(default)]
    pub face_detection: bool,
    #[serde(default)]
    pub object_detection: bool,
    #[serde(default = "default_target_long_edge")]
    pub target_long_edge: u32,
    #[serde(default)]
    pub rotation: Rotation,
    #[serde(default)]
    pub constants: ConstantsConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            active: true,
            logging: false,
            face_detection: false,
            object_detection: false,
            target_long_edge: default_target_long_edge(),
            rotation: Rotation::default(),
            constants: ConstantsConfig::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn pipeline_constants(&self) -> PipelineConstants {
        let c = &self.constants;
        PipelineConstants {
            face_cadence: c.face_cadence,
            object_cadence: c.object_cadence,
            motion_threshold: c.motion_threshold,
            motion_log_threshold: c.motion_log_threshold,
            smoothing: c.smoothing,
            confidence_cutoff: c.confidence_cutoff,
            network_input: c.network_input,
            target_long_edge: self.target_long_edge,
            rotation: self.rotation,
            cascade: CascadeParams::default(),
        }
    }
}

fn default_face_cascade() -> String {
    FACE_CASCADE_RESOURCE.to_string()
}

fn default_object_network() -> String {
    OBJECT_NETWORK_RESOURCE.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    #[serde(default = "default_face_cascade")]
    pub face_cascade: String,
    #[serde(default = "default_object_network")]
    pub object_network: String,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            face_cascade: default_face_cascade(),
            object_network: default_object_network(),
        }
    }
}

fn default_cache_dir() -> PathBuf {
    std::env::temp_dir().join("camlens-models")
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetsConfig {
    /// Directory to copy models from; embedded models are used when unset.
    pub source_dir: Option<PathBuf>,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            source_dir: None,
            cache_dir: default_cache_dir(),
        }
    }
}

fn default_http_port() -> u16 {
    8080
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_port")]
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            port: default_http_port(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub assets: AssetsConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.source.format.is_supported() {
            return Err(ConfigError::Invalid(
                "source.format must be nv12 or nv21".into(),
            ));
        }
        if self.source.width == 0 || self.source.height == 0 {
            return Err(ConfigError::Invalid("source dimensions must be non-zero".into()));
        }
        let c = &self.analysis.constants;
        if c.face_cadence == 0 || c.object_cadence == 0 {
            return Err(ConfigError::Invalid("cadence must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&c.smoothing) {
            return Err(ConfigError::Invalid("smoothing must be within 0..=1".into()));
        }
        Ok(())
    }
}
