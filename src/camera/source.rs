use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TrySendError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thiserror::Error;

use crate::analytics::{OwnedFrame, PixelFormat};
use crate::config::SourceConfig;

const FRAME_QUEUE_DEPTH: usize = 2;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("ffmpeg not found")]
    FfmpegNotFound,
    #[error("unsupported source format: {0}")]
    UnsupportedFormat(&'static str),
}

/// Raw semi-planar frames decoded by an ffmpeg child process.
///
/// Frames the consumer has not picked up yet are dropped, never queued
/// beyond `FRAME_QUEUE_DEPTH`.
pub struct FfmpegSource {
    frame_rx: Receiver<OwnedFrame>,
    child: Option<Child>,
    _reader_handle: JoinHandle<()>,
}

impl FfmpegSource {
    pub fn new(config: &SourceConfig) -> Result<Self, SourceError> {
        let pix_fmt = match config.format {
            PixelFormat::Nv12 | PixelFormat::Nv21 => config.format.as_str(),
            PixelFormat::Other => return Err(SourceError::UnsupportedFormat("other")),
        };

        let mut child = Command::new("ffmpeg")
            .args([
                "-hide_banner",
                "-loglevel",
                "quiet",
                "-i",
                &config.url,
                "-vf",
                &format!(
                    "fps={},scale={}:{}",
                    config.fps, config.width, config.height
                ),
                "-f",
                "rawvideo",
                "-pix_fmt",
                pix_fmt,
                "pipe:1",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    SourceError::FfmpegNotFound
                } else {
                    SourceError::Io(e)
                }
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("failed to capture stdout"))?;

        let (frame_tx, frame_rx) = mpsc::sync_channel::<OwnedFrame>(FRAME_QUEUE_DEPTH);
        let (width, height, format) = (config.width, config.height, config.format);
        let frame_size = OwnedFrame::frame_size(width, height);

        let reader_handle = thread::spawn(move || {
            let mut stdout = stdout;
            let mut dropped = 0u64;
            loop {
                let mut buf = vec![0u8; frame_size];
                if stdout.read_exact(&mut buf).is_err() {
                    break;
                }
                let frame = OwnedFrame::new(width, height, width as usize, format, buf);
                match frame_tx.try_send(frame) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        dropped += 1;
                        if dropped % 100 == 1 {
                            tracing::debug!(dropped, "consumer behind, dropping frames");
                        }
                    }
                    Err(TrySendError::Disconnected(_)) => break,
                }
            }
        });

        tracing::info!(url = %config.url, width, height, format = pix_fmt, "frame source started");

        Ok(Self {
            frame_rx,
            child: Some(child),
            _reader_handle: reader_handle,
        })
    }

    /// Next decoded frame, or `None` when none arrived within `timeout`.
    pub fn next_frame(&self, timeout: Duration) -> Result<Option<OwnedFrame>, SourceError> {
        match self.frame_rx.recv_timeout(timeout) {
            Ok(frame) => Ok(Some(frame)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(SourceError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "frame source closed",
            ))),
        }
    }

    pub fn is_alive(&mut self) -> bool {
        self.child
            .as_mut()
            .map(|c| c.try_wait().ok().flatten().is_none())
            .unwrap_or(false)
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        // Kill FFmpeg so the reader thread exits
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}
