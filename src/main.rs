use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

mod analytics;
mod api;
mod assets;
mod camera;
mod config;

use analytics::{FrameOutcome, FramePipeline, Signal};
use assets::{AssetProvider, DirectoryAssets, EmbeddedAssets};
use camera::FfmpegSource;
use config::Config;

const FRAME_TIMEOUT: Duration = Duration::from_millis(500);
const RESTART_DELAY: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("camlens=debug".parse()?))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    tracing::info!(
        url = %config.source.url,
        width = config.source.width,
        height = config.source.height,
        "loaded config"
    );

    let assets: Arc<dyn AssetProvider> = match &config.assets.source_dir {
        Some(dir) => Arc::new(DirectoryAssets::new(dir, &config.assets.cache_dir)),
        None => Arc::new(EmbeddedAssets::new(&config.assets.cache_dir)),
    };

    let mut pipeline = FramePipeline::with_default_models(
        config.analysis.pipeline_constants(),
        assets,
        &config.models.face_cascade,
        &config.models.object_network,
    );
    pipeline.subscribe(Box::new(|signal: Signal| {
        tracing::trace!(?signal, "signal changed");
    }));
    pipeline.set_logging_enabled(config.analysis.logging);
    pipeline.set_face_detection_enabled(config.analysis.face_detection);
    pipeline.set_object_detection_enabled(config.analysis.object_detection);
    pipeline.set_active(config.analysis.active);

    let pipeline = Arc::new(Mutex::new(pipeline));
    let shutdown = Arc::new(AtomicBool::new(false));

    let frame_handle = {
        let pipeline = Arc::clone(&pipeline);
        let shutdown = Arc::clone(&shutdown);
        let source_config = config.source.clone();
        tokio::task::spawn_blocking(move || run_frames(source_config, pipeline, shutdown))
    };

    let state = api::AppState::new(Arc::clone(&pipeline));
    let port = config.http.port;

    tokio::select! {
        result = api::start_server(state, port) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    shutdown.store(true, Ordering::Relaxed);
    if let Err(e) = frame_handle.await {
        tracing::error!(error = %e, "frame task failed");
    }

    if let Ok(p) = pipeline.lock() {
        tracing::info!(
            frames = p.frame_counter(),
            motion = format!("{:.3}", p.motion_energy()),
            "final pipeline stats"
        );
    }
    tracing::info!("shutdown complete");

    Ok(())
}

fn run_frames(
    config: config::SourceConfig,
    pipeline: Arc<Mutex<FramePipeline>>,
    shutdown: Arc<AtomicBool>,
) {
    while !shutdown.load(Ordering::Relaxed) {
        let mut source = match FfmpegSource::new(&config) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(url = %config.url, error = %e, "failed to start frame source");
                thread::sleep(RESTART_DELAY);
                continue;
            }
        };

        while !shutdown.load(Ordering::Relaxed) {
            let mut frame = match source.next_frame(FRAME_TIMEOUT) {
                Ok(Some(frame)) => frame,
                Ok(None) if source.is_alive() => continue,
                Ok(None) | Err(_) => break,
            };

            let outcome = match pipeline.lock() {
                Ok(mut p) => p.process_frame(&mut frame),
                Err(_) => {
                    tracing::error!("pipeline lock poisoned, stopping frame processing");
                    return;
                }
            };
            match outcome {
                FrameOutcome::Processed(report) if report.face_ran || report.object_ran => {
                    tracing::trace!(
                        frame = report.frame_counter,
                        motion_sample = ?report.motion_sample,
                        motion_event = report.motion_event,
                        face = report.face_ran,
                        object = report.object_ran,
                        "detector cycle"
                    );
                }
                FrameOutcome::Processed(_) => {}
                FrameOutcome::Skipped(reason) => tracing::trace!(?reason, "frame skipped"),
            }
        }

        if !shutdown.load(Ordering::Relaxed) {
            tracing::warn!(url = %config.url, "frame source stopped, restarting");
            thread::sleep(RESTART_DELAY);
        }
    }
    tracing::info!("frame processing stopped");
}
