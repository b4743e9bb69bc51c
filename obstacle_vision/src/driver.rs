// THEORY:
// The driver is the outer loop around `ObstaclePipeline`. It owns every
// collaborator the module talks to and runs one cycle per tick:
//
//   step (frame + distance -> report) -> answer a pending request -> wait
//
// Faults are sorted at this boundary. A frame or range failure only spoils the
// current cycle: it is logged and the zero sentinel stands in for the
// measurement. A transport failure moves the driver into its reconnect state,
// which retries according to a bounded `ReconnectPolicy`. Red and blue stay lit
// while the link is down. When the policy runs out the driver gives up, and
// every exit path switches the indicators off.

use crate::core_modules::geometry::Measurement;
use crate::error::{Result, VisionError};
use crate::indicator::{Indicator, StatusIndicator};
use crate::link::Transport;
use crate::pipeline::{Captured, ObstaclePipeline};
use crate::reconnect::ReconnectPolicy;
use crate::sources::{FrameSource, RangeSensor};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

pub const DEFAULT_CYCLE_INTERVAL: Duration = Duration::from_millis(100);

/// Counters for one run of the driver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverStats {
    pub cycles: u64,
    /// Cycles lost to a frame or range failure.
    pub faults: u64,
    pub sent: u64,
    pub reconnects: u64,
}

pub struct CycleDriver<S, R, T, I> {
    pipeline: ObstaclePipeline,
    source: S,
    sensor: R,
    transport: T,
    indicator: I,
    reconnect: ReconnectPolicy,
    cycle_interval: Duration,
    max_cycles: Option<u64>,
    stats: DriverStats,
}

impl<S, R, T, I> CycleDriver<S, R, T, I>
where
    S: FrameSource,
    R: RangeSensor,
    T: Transport,
    I: StatusIndicator,
{
    pub fn new(pipeline: ObstaclePipeline, source: S, sensor: R, transport: T, indicator: I) -> Self {
        Self {
            pipeline,
            source,
            sensor,
            transport,
            indicator,
            reconnect: ReconnectPolicy::default(),
            cycle_interval: DEFAULT_CYCLE_INTERVAL,
            max_cycles: None,
            stats: DriverStats::default(),
        }
    }

    pub fn with_reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    pub fn with_cycle_interval(mut self, interval: Duration) -> Self {
        self.cycle_interval = interval;
        self
    }

    /// Stops after `cycles` cycles instead of running until a fault.
    pub fn with_max_cycles(mut self, cycles: u64) -> Self {
        self.max_cycles = Some(cycles);
        self
    }

    pub fn pipeline(&self) -> &ObstaclePipeline {
        &self.pipeline
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn indicator(&self) -> &I {
        &self.indicator
    }

    pub fn stats(&self) -> DriverStats {
        self.stats
    }

    pub async fn run(&mut self) -> Result<DriverStats> {
        self.run_with(|_| {}).await
    }

    /// Runs the loop, handing every successfully captured frame to `on_cycle`
    /// before its measurement is answered.
    pub async fn run_with<F>(&mut self, on_cycle: F) -> Result<DriverStats>
    where
        F: FnMut(&Captured<S::Frame>),
    {
        info!(interval = ?self.cycle_interval, max_cycles = ?self.max_cycles, "detection loop starting");
        self.indicator.set(Indicator::Green, true);
        let outcome = self.drive(on_cycle).await;
        self.indicator.all_off();
        match &outcome {
            Ok(stats) => info!(?stats, "detection loop finished"),
            Err(e) => error!(error = %e, stats = ?self.stats, "detection loop stopped"),
        }
        outcome
    }

    async fn drive<F>(&mut self, mut on_cycle: F) -> Result<DriverStats>
    where
        F: FnMut(&Captured<S::Frame>),
    {
        let mut ticker = tokio::time::interval(self.cycle_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if self.max_cycles.is_some_and(|max| self.stats.cycles >= max) {
                return Ok(self.stats);
            }
            ticker.tick().await;
            self.stats.cycles += 1;

            let measurement = match self.pipeline.step(&mut self.source, &mut self.sensor) {
                Ok(captured) => {
                    on_cycle(&captured);
                    captured.report.measurement
                }
                Err(e) if e.is_cycle_fault() => {
                    warn!(error = %e, cycle = self.stats.cycles, "cycle failed, reporting zero");
                    self.stats.faults += 1;
                    Measurement::ZERO
                }
                Err(e) => return Err(e),
            };

            match self.answer(&measurement).await {
                Ok(()) => {}
                Err(e) if e.is_transport() => {
                    warn!(error = %e, "link fault");
                    self.recover().await?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn answer(&mut self, measurement: &Measurement) -> Result<()> {
        if !self.transport.take_request()? {
            return Ok(());
        }
        self.transport.send(measurement).await?;
        self.stats.sent += 1;
        debug!(?measurement, "measurement sent");
        Ok(())
    }

    async fn recover(&mut self) -> Result<()> {
        self.indicator.set(Indicator::Red, true);
        self.indicator.set(Indicator::Blue, true);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let Some(delay) = self.reconnect.delay_for(attempt) else {
                return Err(VisionError::ReconnectExhausted(attempt - 1));
            };
            tokio::time::sleep(delay).await;
            match self.transport.reconnect().await {
                Ok(()) => {
                    self.stats.reconnects += 1;
                    self.indicator.set(Indicator::Blue, false);
                    self.indicator.set(Indicator::Red, false);
                    info!(attempt, "link re-established");
                    return Ok(());
                }
                Err(e) => warn!(attempt, error = %e, "reconnect failed"),
            }
        }
    }
}
