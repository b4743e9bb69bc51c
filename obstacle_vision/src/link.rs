// THEORY:
// The robot controller polls the module over a UART. It sends a single request
// byte, `b'r'`, and expects exactly six bytes back: the offset, width and
// distance of the current obstacle as little-endian signed 16-bit integers.
//
// The module never blocks waiting for a request. A reader task drains the
// inbound half of the port and forwards every byte over a channel; each cycle
// the driver takes at most one byte off that channel. If it was a request, the
// cycle's measurement is sent, otherwise the cycle's result is simply dropped.
//
// A closed port or a read error is forwarded the same way, so the driver sees
// it on its next poll as a transport fault and can reconnect.

use crate::core_modules::geometry::Measurement;
use crate::error::{Result, VisionError};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// The byte the controller sends to ask for a measurement.
pub const REQUEST_BYTE: u8 = b'r';
/// Size of one response frame.
pub const FRAME_LEN: usize = 6;

const INBOUND_CAPACITY: usize = 64;

/// Packs a measurement as `<hhh`: offset, width, distance, little-endian.
pub fn encode_measurement(measurement: &Measurement) -> [u8; FRAME_LEN] {
    let mut frame = [0u8; FRAME_LEN];
    frame[0..2].copy_from_slice(&measurement.x_offset_mm.to_le_bytes());
    frame[2..4].copy_from_slice(&measurement.width_mm.to_le_bytes());
    frame[4..6].copy_from_slice(&measurement.distance_mm.to_le_bytes());
    frame
}

/// The outbound side of the module: wherever measurements go.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Takes one pending request off the link without waiting. `Ok(false)`
    /// means nothing was asked for this cycle.
    fn take_request(&mut self) -> Result<bool>;

    async fn send(&mut self, measurement: &Measurement) -> Result<()>;

    /// Tears the link down and brings it back up.
    async fn reconnect(&mut self) -> Result<()>;
}

enum Inbound {
    Byte(u8),
    Closed,
    Failed(String),
}

type BoxedWriter = Box<dyn AsyncWrite + Unpin + Send>;

/// Request/response link over a serial port or any byte stream.
pub struct UartLink {
    inbound: mpsc::Receiver<Inbound>,
    writer: BoxedWriter,
    reader_task: JoinHandle<()>,
    device: Option<PathBuf>,
}

impl UartLink {
    /// Wraps an already-open byte stream. Such a link cannot be reopened.
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (inbound, reader_task) = spawn_reader(reader);
        Self {
            inbound,
            writer: Box::new(writer),
            reader_task,
            device: None,
        }
    }

    /// Opens a serial device node for reading and writing. Line settings such
    /// as the baud rate are expected to be configured on the device already.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let (reader, writer) = open_device(&path).await?;
        let mut link = Self::new(reader, writer);
        link.device = Some(path);
        info!(device = ?link.device, "uart link open");
        Ok(link)
    }

    pub fn device(&self) -> Option<&Path> {
        self.device.as_deref()
    }
}

impl Drop for UartLink {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

impl Transport for UartLink {
    fn take_request(&mut self) -> Result<bool> {
        match self.inbound.try_recv() {
            Ok(Inbound::Byte(REQUEST_BYTE)) => Ok(true),
            Ok(Inbound::Byte(other)) => {
                debug!(byte = other, "ignoring unknown request byte");
                Ok(false)
            }
            Ok(Inbound::Closed) => Err(VisionError::Transport("peer closed the link".into())),
            Ok(Inbound::Failed(e)) => Err(VisionError::Transport(e)),
            Err(TryRecvError::Empty) => Ok(false),
            Err(TryRecvError::Disconnected) => {
                Err(VisionError::Transport("link reader stopped".into()))
            }
        }
    }

    async fn send(&mut self, measurement: &Measurement) -> Result<()> {
        let frame = encode_measurement(measurement);
        self.writer
            .write_all(&frame)
            .await
            .map_err(|e| VisionError::Transport(format!("write failed: {e}")))?;
        self.writer
            .flush()
            .await
            .map_err(|e| VisionError::Transport(format!("flush failed: {e}")))
    }

    async fn reconnect(&mut self) -> Result<()> {
        let Some(path) = self.device.clone() else {
            return Err(VisionError::Transport(
                "stream-backed link cannot be reopened".into(),
            ));
        };
        self.reader_task.abort();
        let (reader, writer) = open_device(&path).await?;
        let (inbound, reader_task) = spawn_reader(reader);
        self.inbound = inbound;
        self.reader_task = reader_task;
        self.writer = Box::new(writer);
        info!(device = ?path, "uart link reopened");
        Ok(())
    }
}

async fn open_device(
    path: &Path,
) -> Result<(
    tokio::io::ReadHalf<tokio::fs::File>,
    tokio::io::WriteHalf<tokio::fs::File>,
)> {
    let file = tokio::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .await
        .map_err(|e| VisionError::Transport(format!("cannot open {}: {e}", path.display())))?;
    Ok(tokio::io::split(file))
}

fn spawn_reader<R>(mut reader: R) -> (mpsc::Receiver<Inbound>, JoinHandle<()>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(INBOUND_CAPACITY);
    let task = tokio::spawn(async move {
        let mut buf = [0u8; 32];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => {
                    let _ = tx.send(Inbound::Closed).await;
                    break;
                }
                Ok(n) => {
                    for &byte in &buf[..n] {
                        if tx.send(Inbound::Byte(byte)).await.is_err() {
                            return;
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "uart read failed");
                    let _ = tx.send(Inbound::Failed(format!("read failed: {e}"))).await;
                    break;
                }
            }
        }
    });
    (rx, task)
}

/// Answers every cycle by logging the measurement. Stands in for the UART when
/// no controller is attached.
#[derive(Debug, Default)]
pub struct LogTransport {
    sent: u64,
}

impl LogTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }
}

impl Transport for LogTransport {
    fn take_request(&mut self) -> Result<bool> {
        Ok(true)
    }

    async fn send(&mut self, measurement: &Measurement) -> Result<()> {
        self.sent += 1;
        info!(
            x_offset_mm = measurement.x_offset_mm,
            width_mm = measurement.width_mm,
            distance_mm = measurement.distance_mm,
            "measurement"
        );
        Ok(())
    }

    async fn reconnect(&mut self) -> Result<()> {
        Ok(())
    }
}
