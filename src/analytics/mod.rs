mod activation;
pub mod face;
pub mod frame;
pub mod model;
pub mod motion;
pub mod object;
mod pipeline;
pub mod preprocess;
pub mod signals;

pub use frame::{FrameBuffer, OwnedFrame, PixelFormat};
pub use pipeline::{
    FrameOutcome, FramePipeline, FrameReport, PipelineConstants, SkipReason,
    DEFAULT_FACE_CADENCE, DEFAULT_MOTION_LOG_THRESHOLD, DEFAULT_OBJECT_CADENCE,
    FACE_CASCADE_RESOURCE, OBJECT_NETWORK_RESOURCE,
};
pub use signals::{NormRect, Signal, Signals};

#[cfg(test)]
pub(crate) use pipeline::testing;
