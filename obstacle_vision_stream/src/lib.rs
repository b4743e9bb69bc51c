// THEORY:
// Frames leave the detection loop through a `FrameBus`: a broadcast channel of
// already-encoded packets plus a watch slot holding the latest metadata. The
// loop publishes and never waits on viewers. A slow viewer just lags and skips
// frames; with no viewers at all, publishing is a no-op.
//
// The HTTP side (feature `web`) subscribes per connection and turns packets
// into multipart parts as they arrive.

pub mod mjpeg;
pub mod zone;

use image::GrayImage;
use obstacle_vision::pipeline::CycleReport;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

pub use mjpeg::{encode_part, FrameMeta, FramePacket, DEFAULT_JPEG_QUALITY};
pub use zone::Zone;

#[derive(Clone)]
pub struct FrameBus {
    pub frames_tx: broadcast::Sender<FramePacket>,
    meta_tx: Arc<watch::Sender<Option<FrameMeta>>>,
    quality: u8,
}

impl FrameBus {
    pub fn new(capacity: usize) -> Self {
        let (frames_tx, _) = broadcast::channel::<FramePacket>(capacity.max(1));
        let (meta_tx, _) = watch::channel(None);
        Self {
            frames_tx,
            meta_tx: Arc::new(meta_tx),
            quality: DEFAULT_JPEG_QUALITY,
        }
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FramePacket> {
        self.frames_tx.subscribe()
    }

    pub fn latest_meta(&self) -> Option<FrameMeta> {
        *self.meta_tx.borrow()
    }

    pub fn viewers(&self) -> usize {
        self.frames_tx.receiver_count()
    }

    /// Records the cycle's metadata and, if anyone is watching, encodes and
    /// broadcasts the frame. Returns the number of viewers reached.
    pub fn publish(&self, image: &GrayImage, report: &CycleReport) -> anyhow::Result<usize> {
        let meta = FrameMeta::from_report(report);
        self.meta_tx.send_replace(Some(meta));
        if self.viewers() == 0 {
            return Ok(0);
        }
        let packet = FramePacket::encode(image, meta, self.quality)?;
        Ok(self.frames_tx.send(packet).unwrap_or(0))
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
        }
    }
}

/// A server that has bound its socket and is serving in the background.
pub struct StreamServer {
    pub local_addr: SocketAddr,
    pub handle: tokio::task::JoinHandle<()>,
}

#[cfg(feature = "web")]
pub async fn start_server(bus: FrameBus, cfg: ServerConfig) -> anyhow::Result<StreamServer> {
    use anyhow::Context;
    use axum::body::Body;
    use axum::extract::State;
    use axum::http::header;
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::Router;
    use bytes::Bytes;
    use tokio::sync::broadcast::error::RecvError;
    use tracing::{debug, error, info};

    async fn stream(State(bus): State<FrameBus>) -> impl IntoResponse {
        let mut rx = bus.subscribe();
        info!(viewers = bus.viewers(), "stream viewer connected");
        let parts = async_stream::stream! {
            loop {
                match rx.recv().await {
                    Ok(packet) => yield Ok::<Bytes, std::convert::Infallible>(encode_part(&packet)),
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "stream viewer lagging");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        };
        (
            [
                (header::CONTENT_TYPE, mjpeg::CONTENT_TYPE),
                (header::CACHE_CONTROL, "no-cache"),
                (header::PRAGMA, "no-cache"),
            ],
            Body::from_stream(parts),
        )
    }

    async fn meta(State(bus): State<FrameBus>) -> impl IntoResponse {
        match serde_json::to_string(&bus.latest_meta()) {
            Ok(json) => ([(header::CONTENT_TYPE, "application/json")], json).into_response(),
            Err(e) => (axum::http::StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
        }
    }

    let app = Router::new()
        .route("/", get(stream))
        .route("/meta", get(meta))
        .route("/healthz", get(|| async { "ok" }))
        .with_state(bus);

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr)
        .await
        .with_context(|| format!("binding stream server to {}", cfg.bind_addr))?;
    let local_addr = listener.local_addr()?;
    info!(%local_addr, "stream server listening");

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "stream server stopped");
        }
    });

    Ok(StreamServer { local_addr, handle })
}

#[cfg(not(feature = "web"))]
pub async fn start_server(_bus: FrameBus, _cfg: ServerConfig) -> anyhow::Result<StreamServer> {
    Err(anyhow::anyhow!("web feature not enabled for obstacle_vision_stream"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use obstacle_vision::config::PipelineConfig;
    use obstacle_vision::pipeline::{BlobCandidate, CycleInput, ObstaclePipeline};

    fn report() -> CycleReport {
        let mut pipeline = ObstaclePipeline::new(PipelineConfig::default()).unwrap();
        pipeline.run_cycle(CycleInput {
            frame_width: 320,
            frame_height: 240,
            brightness: 150.0,
            candidates: vec![BlobCandidate::new(250, 100, 40, 40, 1_200)],
            distance: Some(700),
        })
    }

    #[test]
    fn publishing_without_viewers_only_updates_meta() {
        let bus = FrameBus::new(2);
        let image = GrayImage::from_pixel(320, 240, Luma([150]));
        assert!(bus.latest_meta().is_none());
        assert_eq!(bus.publish(&image, &report()).unwrap(), 0);
        assert_eq!(bus.latest_meta().and_then(|m| m.zone), Some(Zone::Right));
    }

    #[tokio::test]
    async fn viewers_receive_encoded_packets() {
        let bus = FrameBus::new(2);
        let mut rx = bus.subscribe();
        let image = GrayImage::from_pixel(64, 48, Luma([150]));
        assert_eq!(bus.publish(&image, &report()).unwrap(), 1);

        let packet = rx.recv().await.unwrap();
        assert_eq!((packet.width, packet.height), (64, 48));
        assert_eq!(packet.meta.area, 1_600);
    }

    #[cfg(feature = "web")]
    mod server {
        use super::*;
        use std::time::Duration;
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpStream;

        async fn local_server(bus: FrameBus) -> StreamServer {
            start_server(
                bus,
                ServerConfig {
                    bind_addr: "127.0.0.1:0".to_string(),
                },
            )
            .await
            .unwrap()
        }

        async fn get(addr: SocketAddr, path: &str) -> String {
            let mut socket = TcpStream::connect(addr).await.unwrap();
            let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
            socket.write_all(request.as_bytes()).await.unwrap();
            let mut response = Vec::new();
            socket.read_to_end(&mut response).await.unwrap();
            String::from_utf8_lossy(&response).into_owned()
        }

        #[tokio::test]
        async fn serves_health_and_meta() {
            let bus = FrameBus::new(2);
            let server = local_server(bus.clone()).await;

            assert!(get(server.local_addr, "/healthz").await.ends_with("ok"));
            assert!(get(server.local_addr, "/meta").await.ends_with("null"));

            let image = GrayImage::from_pixel(320, 240, Luma([150]));
            bus.publish(&image, &report()).unwrap();
            let meta = get(server.local_addr, "/meta").await;
            assert!(meta.contains("\"zone\":\"RIGHT\""));
            assert!(meta.contains("\"area\":1600"));
            server.handle.abort();
        }

        #[tokio::test]
        async fn streams_multipart_frames() {
            let bus = FrameBus::new(4);
            let server = local_server(bus.clone()).await;

            let publisher = tokio::spawn({
                let bus = bus.clone();
                async move {
                    let image = GrayImage::from_pixel(64, 48, Luma([150]));
                    let report = report();
                    loop {
                        let _ = bus.publish(&image, &report);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            });

            let mut socket = TcpStream::connect(server.local_addr).await.unwrap();
            socket
                .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n")
                .await
                .unwrap();

            let mut seen = Vec::new();
            let mut buf = [0u8; 4096];
            let read = tokio::time::timeout(Duration::from_secs(5), async {
                while !String::from_utf8_lossy(&seen).contains("X-Brightness: 150") {
                    let n = socket.read(&mut buf).await.unwrap();
                    assert!(n > 0, "stream closed early");
                    seen.extend_from_slice(&buf[..n]);
                }
            })
            .await;
            assert!(read.is_ok(), "no frame within the timeout");

            let text = String::from_utf8_lossy(&seen);
            assert!(text.contains("multipart/x-mixed-replace; boundary=openmv"));
            assert!(text.contains("cache-control: no-cache"));
            assert!(text.contains("--openmv\r\nContent-Type: image/jpeg\r\nX-Zone: RIGHT\r\n"));

            publisher.abort();
            server.handle.abort();
        }
    }
}
