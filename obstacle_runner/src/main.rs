mod frames;
mod settings;

use anyhow::Context;
use frames::DirectoryFrameSource;
use obstacle_vision::config::PipelineConfig;
use obstacle_vision::core_modules::frame::GrayFrame;
use obstacle_vision::driver::CycleDriver;
use obstacle_vision::indicator::LogIndicator;
use obstacle_vision::link::{LogTransport, Transport, UartLink};
use obstacle_vision::pipeline::{Captured, ObstaclePipeline};
use obstacle_vision::sources::ScriptedRange;
use settings::{RunnerSettings, DEFAULT_DISTANCE_MM, USAGE};
use std::env;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Logging ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // --- 2. Argument Parsing & Setup ---
    let args: Vec<String> = env::args().collect();
    let settings = match RunnerSettings::from_env(&args) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{e}\n{USAGE}");
            std::process::exit(2);
        }
    };

    // --- 3. Pipeline Initialization ---
    let config = match &settings.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    info!(?config, "pipeline configuration");
    let pipeline = ObstaclePipeline::new(config)?;

    // --- 4. Camera & Range Sensor ---
    let source = DirectoryFrameSource::open(&settings.frames_dir)?;
    let sensor = match &settings.distances {
        Some(path) => {
            let script = std::fs::read_to_string(path)
                .with_context(|| format!("reading distances from {}", path.display()))?;
            ScriptedRange::parse(&script)?
        }
        None => {
            warn!(distance_mm = DEFAULT_DISTANCE_MM, "no distance script, using a constant reading");
            ScriptedRange::constant(DEFAULT_DISTANCE_MM)
        }
    };

    // --- 5. Optional Stream ---
    let publisher = Publisher::start(settings.bind.as_deref()).await?;

    // --- 6. Main Loop ---
    match &settings.serial {
        Some(device) => {
            let link = UartLink::open(device)
                .await
                .with_context(|| format!("opening {}", device.display()))?;
            run(&settings, pipeline, source, sensor, link, &publisher).await
        }
        None => {
            info!("no serial device, logging every measurement");
            run(&settings, pipeline, source, sensor, LogTransport::new(), &publisher).await
        }
    }
}

async fn run<T: Transport>(
    settings: &RunnerSettings,
    pipeline: ObstaclePipeline,
    source: DirectoryFrameSource,
    sensor: ScriptedRange,
    transport: T,
    publisher: &Publisher,
) -> anyhow::Result<()> {
    let mut driver = CycleDriver::new(pipeline, source, sensor, transport, LogIndicator::new())
        .with_cycle_interval(settings.cycle_interval);
    if let Some(max) = settings.max_cycles {
        driver = driver.with_max_cycles(max);
    }
    let stats = driver.run_with(|captured| publisher.publish(captured)).await?;
    info!(?stats, "runner finished");
    Ok(())
}

/// Hands captured frames to the stream server when one is running.
#[derive(Default)]
struct Publisher {
    #[cfg(feature = "stream")]
    bus: Option<obstacle_vision_stream::FrameBus>,
}

impl Publisher {
    #[cfg(feature = "stream")]
    async fn start(bind: Option<&str>) -> anyhow::Result<Self> {
        use obstacle_vision_stream::{start_server, FrameBus, ServerConfig};

        let Some(bind_addr) = bind else {
            return Ok(Self::default());
        };
        let bus = FrameBus::new(2);
        let server = start_server(
            bus.clone(),
            ServerConfig {
                bind_addr: bind_addr.to_string(),
            },
        )
        .await?;
        info!(addr = %server.local_addr, "streaming frames");
        Ok(Self { bus: Some(bus) })
    }

    #[cfg(not(feature = "stream"))]
    async fn start(bind: Option<&str>) -> anyhow::Result<Self> {
        if bind.is_some() {
            warn!("OV_BIND set but the runner was built without the `stream` feature");
        }
        Ok(Self::default())
    }

    fn publish(&self, captured: &Captured<GrayFrame>) {
        #[cfg(feature = "stream")]
        if let Some(bus) = &self.bus {
            if let Err(e) = bus.publish(captured.frame.image(), &captured.report) {
                warn!(error = %e, "failed to publish frame");
            }
        }
        #[cfg(not(feature = "stream"))]
        let _ = captured;
    }
}
