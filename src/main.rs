//! DetectAnimal Core - Main Entry Point

mod logic;
pub mod constants;

use std::sync::Arc;
use std::time::{Duration, Instant};

use logic::capture::{CaptureDevice, SyntheticCamera};
use logic::config::AppConfig;
use logic::display::{LogSurface, MainQueue};
use logic::view_controller::ViewController;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .init();

    log::info!("Starting {} v{}...", constants::APP_NAME, constants::APP_VERSION);

    if let Err(e) = run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::resolve()?;
    log::debug!("Config: {}", serde_json::to_string(&config)?);

    let main_queue = MainQueue::new()?;

    let model = logic::model::load_classifier(&config.model, config.classifier.max_in_flight);
    log::info!("Classifier backend: {}", model.name());

    let camera = config.camera.clone();
    let provider = Box::new(move || {
        let device = SyntheticCamera::new(camera.fps)
            .with_frame_limit(camera.frame_limit)
            .with_orientation(camera.orientation())
            .with_focal_length(camera.focal_length_px);
        Some(Box::new(device) as Box<dyn CaptureDevice>)
    });

    let controller = ViewController::new(
        &config,
        provider,
        model,
        Arc::new(LogSurface),
        main_queue.handle(),
    )?;

    controller.view_did_load();
    match controller.wait_until_ready(Duration::from_secs(10)) {
        Some(true) => log::info!("Camera running"),
        Some(false) => return Err("camera setup failed".into()),
        None => return Err("camera setup timed out".into()),
    }

    if config.run_secs > 0 {
        // Run for run_secs, or less if the camera stream ends first
        let deadline = Instant::now() + Duration::from_secs(config.run_secs);
        while controller.is_capturing() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(100));
        }
    } else {
        controller.wait_for_stream_end();
    }
    controller.shutdown();

    log::info!("Capture: {}", serde_json::to_string(&controller.capture_stats())?);
    log::info!("Classifier: {}", serde_json::to_string(&controller.classifier_status())?);
    Ok(())
}
