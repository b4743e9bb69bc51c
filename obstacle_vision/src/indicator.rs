//! Status indicators.
//!
//! The module has three LEDs: red while the link is faulted, green while
//! running, blue while a link is being set up. The driver only ever switches
//! them; how that maps to hardware is up to the implementation.

use std::collections::HashMap;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Indicator {
    /// Link fault, lit until the link is back or the driver exits.
    Red,
    /// Detection loop running.
    Green,
    /// Link being (re-)established.
    Blue,
}

pub trait StatusIndicator {
    fn set(&mut self, indicator: Indicator, on: bool);

    fn all_off(&mut self) {
        for indicator in [Indicator::Red, Indicator::Green, Indicator::Blue] {
            self.set(indicator, false);
        }
    }
}

/// Records indicator state and logs changes. Used wherever there are no LEDs.
#[derive(Debug, Default, Clone)]
pub struct LogIndicator {
    state: HashMap<Indicator, bool>,
}

impl LogIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_on(&self, indicator: Indicator) -> bool {
        self.state.get(&indicator).copied().unwrap_or(false)
    }
}

impl StatusIndicator for LogIndicator {
    fn set(&mut self, indicator: Indicator, on: bool) {
        let previous = self.state.insert(indicator, on).unwrap_or(false);
        if previous != on {
            info!(?indicator, on, "indicator changed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_state_and_turns_everything_off() {
        let mut leds = LogIndicator::new();
        leds.set(Indicator::Green, true);
        leds.set(Indicator::Blue, true);
        assert!(leds.is_on(Indicator::Green));
        assert!(!leds.is_on(Indicator::Red));

        leds.all_off();
        assert!(!leds.is_on(Indicator::Green));
        assert!(!leds.is_on(Indicator::Blue));
    }
}
