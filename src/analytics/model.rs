use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::assets::AssetProvider;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model resource not found: {}", .0.display())]
    MissingResource(PathBuf),
    #[error("failed to initialize model from {}: {message}", .path.display())]
    Init { path: PathBuf, message: String },
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("unexpected model output shape: {0:?}")]
    Shape(Vec<usize>),
    #[error("{0} back-end not compiled in")]
    Unavailable(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelState {
    Unloaded,
    Loading,
    Ready,
    Failed,
}

/// Builds a back-end from materialized resource paths.
pub type ModelInit<T> = Box<dyn Fn(&[PathBuf]) -> Result<T, ModelError> + Send>;

/// A lazily-loaded detector back-end owned by one pipeline.
pub struct DetectorModel<T> {
    kind: &'static str,
    resources: Vec<String>,
    init: ModelInit<T>,
    state: ModelState,
    handle: Option<T>,
    attempts: u32,
}

impl<T> DetectorModel<T> {
    pub fn new(kind: &'static str, resources: Vec<String>, init: ModelInit<T>) -> Self {
        Self {
            kind,
            resources,
            init,
            state: ModelState::Unloaded,
            handle: None,
            attempts: 0,
        }
    }

    pub fn state(&self) -> ModelState {
        self.state
    }

    /// Number of load attempts made so far.
    #[cfg(test)]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn handle_mut(&mut self) -> Option<&mut T> {
        match self.state {
            ModelState::Ready => self.handle.as_mut(),
            _ => None,
        }
    }

    /// Load the model unless it is already `Ready`. A `Failed` model is only
    /// retried when `retry_failed` is set.
    pub fn ensure_loaded(&mut self, assets: &dyn AssetProvider, retry_failed: bool) -> ModelState {
        match self.state {
            ModelState::Ready | ModelState::Loading => return self.state,
            ModelState::Failed if !retry_failed => return self.state,
            _ => {}
        }

        self.state = ModelState::Loading;
        self.attempts += 1;

        let paths: Vec<PathBuf> = self
            .resources
            .iter()
            .map(|name| assets.materialize(name))
            .collect();

        let result = match paths.iter().find(|p| !p.exists()) {
            Some(missing) => Err(ModelError::MissingResource(missing.clone())),
            None => (self.init)(&paths),
        };

        match result {
            Ok(handle) => {
                tracing::info!(model = self.kind, path = %display_paths(&paths), "model loaded");
                self.handle = Some(handle);
                self.state = ModelState::Ready;
            }
            Err(e) => {
                tracing::warn!(
                    model = self.kind,
                    attempt = self.attempts,
                    path = %display_paths(&paths),
                    error = %e,
                    "model load failed, feature disabled"
                );
                self.handle = None;
                self.state = ModelState::Failed;
            }
        }

        self.state
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(any(feature = "opencv", feature = "onnx"))]
pub(crate) fn first_path(paths: &[PathBuf]) -> Result<&std::path::Path, ModelError> {
    paths
        .first()
        .map(PathBuf::as_path)
        .ok_or_else(|| ModelError::MissingResource(PathBuf::new()))
}
