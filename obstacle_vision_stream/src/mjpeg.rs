// THEORY:
// The stream is a plain `multipart/x-mixed-replace` response. After the HTTP
// headers are sent once, every frame goes out as one part:
//
//   \r\n--openmv\r\n
//   Content-Type: image/jpeg\r\n
//   X-Zone: CENTER\r\n
//   X-Area: 1600\r\n
//   X-Brightness: 196\r\n
//   Content-Length: 5321\r\n
//   \r\n
//   <jpeg bytes>
//
// Browsers only look at the JPEG. The `X-` headers carry the detection summary
// for clients that parse the parts themselves. When a cycle has no target the
// zone reads `None` and the area is 0.

use bytes::{BufMut, Bytes, BytesMut};
use image::GrayImage;
use image::codecs::jpeg::JpegEncoder;
use obstacle_vision::core_modules::geometry::Measurement;
use obstacle_vision::pipeline::CycleReport;
use serde::Serialize;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::zone::Zone;

pub const BOUNDARY: &str = "openmv";
pub const CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=openmv";
pub const DEFAULT_JPEG_QUALITY: u8 = 35;

const NO_ZONE: &str = "None";

/// Detection summary attached to each streamed frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrameMeta {
    pub ts_millis: u64,
    pub zone: Option<Zone>,
    /// Bounding-box area of the target in pixels, 0 without a target.
    pub area: u64,
    /// Mean luminance of the frame, truncated.
    pub brightness: u8,
    pub measurement: Measurement,
}

impl FrameMeta {
    pub fn from_report(report: &CycleReport) -> Self {
        let detection = &report.detection;
        let (zone, area) = match &detection.target {
            Some(target) => (
                Some(Zone::from_center_x(target.centroid.x, detection.frame_width)),
                target.box_area(),
            ),
            None => (None, 0),
        };
        Self {
            ts_millis: now_millis(),
            zone,
            area,
            brightness: detection.brightness.clamp(0.0, 255.0) as u8,
            measurement: report.measurement,
        }
    }

    pub fn zone_label(&self) -> &'static str {
        self.zone.map_or(NO_ZONE, |zone| zone.as_str())
    }
}

/// One encoded frame ready to go out on the stream.
#[derive(Debug, Clone)]
pub struct FramePacket {
    pub width: u32,
    pub height: u32,
    pub data: Arc<[u8]>,
    pub meta: FrameMeta,
}

impl FramePacket {
    pub fn encode(image: &GrayImage, meta: FrameMeta, quality: u8) -> anyhow::Result<Self> {
        let jpeg = encode_jpeg(image, quality)?;
        Ok(Self {
            width: image.width(),
            height: image.height(),
            data: jpeg.into(),
            meta,
        })
    }
}

pub fn encode_jpeg(image: &GrayImage, quality: u8) -> anyhow::Result<Vec<u8>> {
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100)).encode_image(image)?;
    Ok(out)
}

/// Serializes one multipart part: boundary, headers, then the JPEG body.
pub fn encode_part(packet: &FramePacket) -> Bytes {
    let header = format!(
        "\r\n--{BOUNDARY}\r\n\
         Content-Type: image/jpeg\r\n\
         X-Zone: {}\r\n\
         X-Area: {}\r\n\
         X-Brightness: {}\r\n\
         Content-Length: {}\r\n\r\n",
        packet.meta.zone_label(),
        packet.meta.area,
        packet.meta.brightness,
        packet.data.len(),
    );
    let mut part = BytesMut::with_capacity(header.len() + packet.data.len());
    part.put_slice(header.as_bytes());
    part.put_slice(&packet.data);
    part.freeze()
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use obstacle_vision::config::PipelineConfig;
    use obstacle_vision::pipeline::{BlobCandidate, CycleInput, ObstaclePipeline};

    fn report(candidates: Vec<BlobCandidate>) -> CycleReport {
        let mut pipeline = ObstaclePipeline::new(PipelineConfig::default()).unwrap();
        pipeline.run_cycle(CycleInput {
            frame_width: 320,
            frame_height: 240,
            brightness: 187.6,
            candidates,
            distance: Some(600),
        })
    }

    #[test]
    fn meta_summarises_the_target() {
        let meta = FrameMeta::from_report(&report(vec![BlobCandidate::new(150, 100, 40, 40, 1_200)]));
        assert_eq!(meta.zone, Some(Zone::Center));
        assert_eq!(meta.area, 1_600);
        assert_eq!(meta.brightness, 187);
        assert_eq!(meta.zone_label(), "CENTER");
    }

    #[test]
    fn meta_without_a_target() {
        let meta = FrameMeta::from_report(&report(Vec::new()));
        assert_eq!(meta.zone, None);
        assert_eq!(meta.area, 0);
        assert_eq!(meta.zone_label(), "None");
    }

    #[test]
    fn part_carries_headers_then_jpeg() {
        let image = GrayImage::from_pixel(32, 24, Luma([90]));
        let meta = FrameMeta::from_report(&report(vec![BlobCandidate::new(10, 10, 30, 30, 500)]));
        let packet = FramePacket::encode(&image, meta, DEFAULT_JPEG_QUALITY).unwrap();
        let part = encode_part(&packet);

        let text = String::from_utf8_lossy(&part);
        assert!(text.starts_with("\r\n--openmv\r\nContent-Type: image/jpeg\r\n"));
        assert!(text.contains("X-Zone: LEFT\r\n"));
        assert!(text.contains("X-Area: 900\r\n"));
        assert!(text.contains("X-Brightness: 187\r\n"));
        assert!(text.contains(&format!("Content-Length: {}\r\n\r\n", packet.data.len())));

        // The body starts with the JPEG start-of-image marker.
        let body = &part[part.len() - packet.data.len()..];
        assert_eq!(&body[..2], &[0xFF, 0xD8]);
    }
}
