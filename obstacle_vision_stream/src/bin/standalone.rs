use image::{GrayImage, Luma};
use obstacle_vision::config::PipelineConfig;
use obstacle_vision::core_modules::frame::GrayFrame;
use obstacle_vision::pipeline::ObstaclePipeline;
use obstacle_vision_stream::{start_server, FrameBus, ServerConfig};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// A dark square sweeping left to right over a bright background.
fn sweep_frame(tick: u32) -> GrayFrame {
    let left = (tick * 4) % 280;
    GrayFrame::new(GrayImage::from_fn(320, 240, |x, y| {
        if (left..left + 40).contains(&x) && (100..140).contains(&y) {
            Luma([20])
        } else {
            Luma([180])
        }
    }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Bind address from env or default
    let bind = std::env::var("OV_BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string());

    let bus = FrameBus::new(2);
    let server = start_server(bus.clone(), ServerConfig { bind_addr: bind }).await?;

    // Feed a synthetic scene through the real pipeline so the stream has content.
    let mut pipeline = ObstaclePipeline::new(PipelineConfig::default())?;
    let mut ticker = tokio::time::interval(Duration::from_millis(100));
    let mut tick = 0u32;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let frame = sweep_frame(tick);
                let report = pipeline.process_frame(&frame, Some(600));
                bus.publish(frame.image(), &report)?;
                tick = tick.wrapping_add(1);
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    server.handle.abort();
    Ok(())
}
