// Copyright 2025 coScene
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use anyhow::Result;
use clap::Parser;
use maneuver_recorder::config::{apply_env_overrides, load_config_with_env, RecorderConfig};
use maneuver_recorder::sensors::{SimulatedMotionSource, SimulatedPositionSource};
use maneuver_recorder::{
    ControlInterface, PermissionStatus, PhonePosition, RecorderError, SessionController,
    SinkFactory,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Maneuver Recorder - record labeled accelerometer + GPS trips to CSV
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (defaults are used when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for exported trips (overrides config file)
    #[arg(short, long)]
    output_dir: Option<String>,

    /// Phone position for the first session (overrides config file)
    #[arg(short, long)]
    position: Option<PhonePosition>,

    /// Simulate a denied location permission
    #[arg(long)]
    deny_location: bool,
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(run(args));
    // stdin reads park a blocking thread; don't wait for it on exit
    runtime.shutdown_timeout(Duration::from_millis(500));
    result
}

async fn run(args: Args) -> Result<()> {
    // Load configuration from file, or defaults
    let mut recorder_config = match &args.config {
        Some(path) => load_config_with_env(path)?,
        None => {
            let mut config = RecorderConfig::default();
            apply_env_overrides(&mut config)?;
            config
        }
    };

    // Apply CLI overrides
    if let Some(output_dir) = args.output_dir {
        recorder_config.sink.set_base_path(output_dir);
    }
    if let Some(position) = args.position {
        recorder_config.recorder.phone_position = position;
    }

    // Initialize tracing with configured level; RUST_LOG wins when set
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(recorder_config.logging.level.to_lowercase()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("Starting Maneuver Recorder");
    if let Some(path) = &args.config {
        info!("Loaded configuration from: {:?}", path);
    }
    info!("Export sink: {}", recorder_config.sink.backend);

    // Create export sink
    let sink = SinkFactory::create(&recorder_config.sink)?;
    sink.initialize().await?;
    if !sink.is_available().await {
        warn!("Export sink '{}' is not available yet", sink.backend_type());
    }

    let permission = if args.deny_location {
        PermissionStatus::Denied
    } else {
        PermissionStatus::Granted
    };
    let motion_source = Arc::new(SimulatedMotionSource::new());
    let position_source = Arc::new(SimulatedPositionSource::new(permission));

    let location_enabled = recorder_config.location.enabled;
    let controller = Arc::new(SessionController::new(
        recorder_config,
        motion_source,
        position_source,
        sink,
    ));

    if location_enabled {
        match controller.enable_location().await {
            Ok(()) => {}
            Err(RecorderError::PermissionDenied) => {
                warn!("GPS is required for full trips; recording with an empty fix");
            }
            Err(e) => warn!("Location feed unavailable: {}", e),
        }
    }

    let control_interface = ControlInterface::new(controller.clone());
    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();

    // Run the control interface until quit, end of input or Ctrl+C
    tokio::select! {
        result = control_interface.run(stdin, stdout) => {
            if let Err(e) = result {
                error!("Control interface error: {}", e);
            }
            info!("Control interface stopped");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    // Cleanup
    match controller.shutdown().await {
        Ok(Some(report)) => info!(
            "Saved final session {} to {}",
            report.session_id,
            report.location.display()
        ),
        Ok(None) => {}
        Err(e) => error!("Final export failed: {}", e),
    }
    info!("Maneuver Recorder shut down");

    Ok(())
}
