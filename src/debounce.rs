// src/debounce.rs - Single-slot cooldown gate for recognized gestures
use std::time::Duration;
use tracing::trace;

use crate::tracking::GestureSymbol;

/// Rate limiter keyed by symbol identity.
///
/// A symbol gets through when it differs from the last accepted one, or when
/// more than `cooldown` has passed since that acceptance. Holding a pose
/// therefore fires once, then once more per elapsed cooldown.
#[derive(Debug, Clone)]
pub struct DebounceGate {
    cooldown: f64,
    last: Option<(GestureSymbol, f64)>,
}

impl DebounceGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown: cooldown.as_secs_f64(),
            last: None,
        }
    }

    /// `now` is in seconds on any monotonic clock.
    pub fn admit(&mut self, symbol: GestureSymbol, now: f64) -> bool {
        // Unknown/None leave the clock alone so a dropped hand can't re-arm it
        if !symbol.is_actionable() {
            return false;
        }

        let admitted = match self.last {
            None => true,
            Some((last_symbol, last_time)) => {
                symbol != last_symbol || now - last_time > self.cooldown
            }
        };

        if admitted {
            self.last = Some((symbol, now));
        } else {
            trace!("{} suppressed by cooldown", symbol);
        }
        admitted
    }

    pub fn last_accepted(&self) -> Option<(GestureSymbol, f64)> {
        self.last
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs_f64(self.cooldown)
    }

    pub fn set_cooldown(&mut self, cooldown: Duration) {
        self.cooldown = cooldown.as_secs_f64();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate(secs: f64) -> DebounceGate {
        DebounceGate::new(Duration::from_secs_f64(secs))
    }

    #[test]
    fn repeat_inside_cooldown_is_rejected() {
        let mut gate = gate(1.2);
        assert!(gate.admit(GestureSymbol::Play, 0.0));
        assert!(!gate.admit(GestureSymbol::Play, 0.5));
        assert!(gate.admit(GestureSymbol::Play, 1.3));
    }

    #[test]
    fn different_symbol_passes_immediately() {
        let mut gate = gate(1.2);
        assert!(gate.admit(GestureSymbol::Play, 0.0));
        assert!(gate.admit(GestureSymbol::Pause, 0.1));
    }

    #[test]
    fn exactly_at_cooldown_is_still_rejected() {
        let mut gate = gate(1.5);
        assert!(gate.admit(GestureSymbol::Forward, 10.0));
        assert!(!gate.admit(GestureSymbol::Forward, 11.5));
        assert!(gate.admit(GestureSymbol::Forward, 11.6));
    }

    #[test]
    fn held_pose_restarts_clock_on_each_admission() {
        let mut gate = gate(1.2);
        let admitted: Vec<f64> = (0..=12)
            .map(|i| i as f64 * 0.25)
            .filter(|t| gate.admit(GestureSymbol::Rewind, *t))
            .collect();
        assert_eq!(admitted, vec![0.0, 1.25, 2.5]);
    }

    #[test]
    fn unknown_and_none_never_admitted_or_recorded() {
        let mut gate = gate(1.2);
        assert!(!gate.admit(GestureSymbol::Unknown, 0.0));
        assert!(!gate.admit(GestureSymbol::None, 0.0));
        assert!(gate.last_accepted().is_none());

        assert!(gate.admit(GestureSymbol::Play, 1.0));
        assert!(!gate.admit(GestureSymbol::None, 1.1));
        // Dropping the hand does not reset the cooldown for Play
        assert!(!gate.admit(GestureSymbol::Play, 1.2));
        assert_eq!(gate.last_accepted(), Some((GestureSymbol::Play, 1.0)));
    }

    #[test]
    fn returning_to_previous_symbol_after_switch_is_admitted() {
        let mut gate = gate(1.2);
        assert!(gate.admit(GestureSymbol::Play, 0.0));
        assert!(gate.admit(GestureSymbol::Pause, 0.2));
        assert!(gate.admit(GestureSymbol::Play, 0.4));
    }
}
