mod source;

pub use source::{FfmpegSource, SourceError};
