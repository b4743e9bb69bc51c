//! Actor-owned smoothing for hosts that run cycles from several tasks.
//!
//! Filtering and selection are pure, so they run in whichever task submits the
//! cycle. The smoothing window is the only state shared between cycles; it
//! lives inside one tokio task and is only reached through its command
//! channel, which makes that channel the single point of ordering.

use crate::config::PipelineConfig;
use crate::core_modules::geometry::RawMeasurement;
use crate::core_modules::smoothing::SmoothingBuffer;
use crate::error::{Result, VisionError};
use crate::pipeline::{detect, report, CycleInput, CycleReport};
use futures::future::join_all;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

const COMMAND_CAPACITY: usize = 32;

/// What the actor returns for a recorded measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Recorded {
    smoothed: Option<RawMeasurement>,
    buffered: usize,
}

enum Command {
    Record {
        raw: RawMeasurement,
        reply: oneshot::Sender<Recorded>,
    },
    Len {
        reply: oneshot::Sender<usize>,
    },
    Clear,
}

struct SmoothingActor {
    buffer: SmoothingBuffer,
    commands: mpsc::Receiver<Command>,
}

impl SmoothingActor {
    async fn run(mut self) {
        while let Some(command) = self.commands.recv().await {
            match command {
                Command::Record { raw, reply } => {
                    let smoothed = self.buffer.record(raw);
                    let _ = reply.send(Recorded {
                        smoothed,
                        buffered: self.buffer.len(),
                    });
                }
                Command::Len { reply } => {
                    let _ = reply.send(self.buffer.len());
                }
                Command::Clear => self.buffer.clear(),
            }
        }
        debug!("smoothing actor stopped");
    }
}

pub struct ConcurrentPipeline {
    config: PipelineConfig,
    commands: mpsc::Sender<Command>,
    actor: JoinHandle<()>,
}

impl ConcurrentPipeline {
    /// Spawns the smoothing actor. Must be called inside a tokio runtime.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let (commands, receiver) = mpsc::channel(COMMAND_CAPACITY);
        let actor = SmoothingActor {
            buffer: SmoothingBuffer::new(config.smoothing_window_size),
            commands: receiver,
        };
        Ok(Self {
            config,
            commands,
            actor: tokio::spawn(actor.run()),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub async fn run_cycle(&self, input: CycleInput) -> Result<CycleReport> {
        let detection = detect(&self.config, input);
        let (smoothed, buffered) = match detection.raw {
            Ok(raw) => {
                let recorded = self
                    .request(|reply| Command::Record { raw, reply })
                    .await?;
                (recorded.smoothed, recorded.buffered)
            }
            Err(_) => (None, 0),
        };
        Ok(report(&self.config, detection, smoothed, buffered))
    }

    /// Submits every input at once. Reports come back in input order; the
    /// order in which they reach the window is the order the actor sees them.
    pub async fn run_batch(&self, inputs: Vec<CycleInput>) -> Result<Vec<CycleReport>> {
        join_all(inputs.into_iter().map(|input| self.run_cycle(input)))
            .await
            .into_iter()
            .collect()
    }

    pub async fn buffered(&self) -> Result<usize> {
        self.request(|reply| Command::Len { reply }).await
    }

    pub async fn clear(&self) -> Result<()> {
        self.commands
            .send(Command::Clear)
            .await
            .map_err(|_| actor_gone())
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| actor_gone())?;
        response.await.map_err(|_| actor_gone())
    }
}

impl Drop for ConcurrentPipeline {
    fn drop(&mut self) {
        self.actor.abort();
    }
}

fn actor_gone() -> VisionError {
    VisionError::TaskStopped("smoothing actor")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::candidate::BlobCandidate;
    use crate::core_modules::geometry::Measurement;
    use crate::pipeline::{CycleOutcome, ObstaclePipeline};

    fn input(distance: Option<i32>) -> CycleInput {
        CycleInput {
            frame_width: 320,
            frame_height: 240,
            brightness: 120.0,
            candidates: vec![BlobCandidate::new(100, 100, 40, 40, 1_000)],
            distance,
        }
    }

    #[tokio::test]
    async fn matches_the_sequential_pipeline() {
        let concurrent = ConcurrentPipeline::new(PipelineConfig::default()).unwrap();
        let mut sequential = ObstaclePipeline::new(PipelineConfig::default()).unwrap();

        for i in 0..12 {
            let distance = if i == 4 { None } else { Some(500) };
            let a = concurrent.run_cycle(input(distance)).await.unwrap();
            let b = sequential.run_cycle(input(distance));
            assert_eq!(a.measurement, b.measurement);
            assert_eq!(a.outcome, b.outcome);
        }
        assert_eq!(concurrent.buffered().await.unwrap(), 10);
    }

    #[tokio::test]
    async fn batches_share_one_window() {
        let concurrent = ConcurrentPipeline::new(PipelineConfig::default()).unwrap();
        let reports = concurrent
            .run_batch((0..10).map(|_| input(Some(500))).collect())
            .await
            .unwrap();

        let smoothed = reports
            .iter()
            .filter(|r| matches!(r.outcome, CycleOutcome::Smoothed { .. }))
            .count();
        assert_eq!(smoothed, 1);
        assert!(reports.iter().any(|r| r.measurement
            == Measurement {
                x_offset_mm: -86,
                width_mm: 57,
                distance_mm: 500
            }));

        concurrent.clear().await.unwrap();
        assert_eq!(concurrent.buffered().await.unwrap(), 0);
    }
}
