//! Runner settings: positional arguments first, then `OV_*` environment variables.

use anyhow::{bail, Context};
use std::path::PathBuf;
use std::time::Duration;

pub const USAGE: &str = "Usage: obstacle_runner <frames_dir> [serial_device]\n\
    env: OV_CONFIG, OV_DISTANCES, OV_SERIAL, OV_BIND, OV_CYCLE_MS, OV_MAX_CYCLES";

/// Distance reported when no distance script is given.
pub const DEFAULT_DISTANCE_MM: i32 = 500;

#[derive(Debug, Clone, PartialEq)]
pub struct RunnerSettings {
    pub frames_dir: PathBuf,
    pub serial: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub distances: Option<PathBuf>,
    pub bind: Option<String>,
    pub cycle_interval: Duration,
    pub max_cycles: Option<u64>,
}

impl RunnerSettings {
    pub fn from_env(args: &[String]) -> anyhow::Result<Self> {
        Self::from_sources(args, |key| std::env::var(key).ok())
    }

    /// `args` includes the program name, as `std::env::args` does.
    pub fn from_sources(
        args: &[String],
        env: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<Self> {
        let env = |key: &str| env(key).filter(|value| !value.trim().is_empty());

        let Some(frames_dir) = args.get(1) else {
            bail!("missing frames directory");
        };
        let serial = args.get(2).cloned().or_else(|| env("OV_SERIAL"));

        let cycle_ms = match env("OV_CYCLE_MS") {
            Some(value) => value
                .trim()
                .parse::<u64>()
                .with_context(|| format!("OV_CYCLE_MS={value:?}"))?,
            None => 100,
        };
        let max_cycles = env("OV_MAX_CYCLES")
            .map(|value| {
                value
                    .trim()
                    .parse::<u64>()
                    .with_context(|| format!("OV_MAX_CYCLES={value:?}"))
            })
            .transpose()?;

        Ok(Self {
            frames_dir: PathBuf::from(frames_dir),
            serial: serial.map(PathBuf::from),
            config: env("OV_CONFIG").map(PathBuf::from),
            distances: env("OV_DISTANCES").map(PathBuf::from),
            bind: env("OV_BIND"),
            cycle_interval: Duration::from_millis(cycle_ms),
            max_cycles,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn parse(list: &[&str], vars: &[(&str, &str)]) -> anyhow::Result<RunnerSettings> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RunnerSettings::from_sources(&args(list), |key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let settings = parse(&["runner", "frames"], &[]).unwrap();
        assert_eq!(settings.frames_dir, PathBuf::from("frames"));
        assert_eq!(settings.serial, None);
        assert_eq!(settings.cycle_interval, Duration::from_millis(100));
        assert_eq!(settings.max_cycles, None);
        assert_eq!(settings.bind, None);
    }

    #[test]
    fn positional_serial_wins_over_env() {
        let settings = parse(
            &["runner", "frames", "/dev/ttyUSB1"],
            &[("OV_SERIAL", "/dev/ttyS0"), ("OV_MAX_CYCLES", "25"), ("OV_CYCLE_MS", " 20 ")],
        )
        .unwrap();
        assert_eq!(settings.serial, Some(PathBuf::from("/dev/ttyUSB1")));
        assert_eq!(settings.max_cycles, Some(25));
        assert_eq!(settings.cycle_interval, Duration::from_millis(20));
    }

    #[test]
    fn blank_variables_are_unset() {
        let settings = parse(&["runner", "frames"], &[("OV_BIND", ""), ("OV_SERIAL", "  ")]).unwrap();
        assert_eq!(settings.bind, None);
        assert_eq!(settings.serial, None);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse(&["runner"], &[]).is_err());
        let err = parse(&["runner", "frames"], &[("OV_CYCLE_MS", "fast")]).unwrap_err();
        assert!(err.to_string().contains("OV_CYCLE_MS"));
    }
}
