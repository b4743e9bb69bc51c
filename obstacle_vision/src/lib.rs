// THEORY:
// This file is the entry point for the `obstacle_vision` library crate. It
// exposes the detection core (`pipeline`) together with everything a host needs
// to run it against real hardware: configuration, the collaborator traits, the
// UART link, the reconnect policy and the cycle driver.
//
// The per-frame building blocks live in `core_modules`. They are public so the
// streaming and runner crates can reuse individual stages, but most callers
// only need `ObstaclePipeline` or `CycleDriver`.

pub mod concurrent;
pub mod config;
pub mod core_modules;
pub mod driver;
pub mod error;
pub mod indicator;
pub mod link;
pub mod pipeline;
pub mod reconnect;
pub mod sources;
