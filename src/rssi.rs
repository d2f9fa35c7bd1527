//! RSSI Estimator: a fixed-capacity sliding window over the last N RSSI
//! samples for the currently associated AP.
//!
//! Grounded in `original_source/ifscand/ifscand.h`'s `rssi_avg` (a `val[4]`
//! ring buffer with a `wr`/`full` pair); the mean is undefined until the
//! window has seen `WINDOW` samples, matching `rssi_avg_value`'s `-1`
//! sentinel for a not-yet-full window.

/// Window capacity. `spec.md` §4.5 fixes this at 4.
pub const WINDOW: usize = 4;

/// Mean RSSI at/below which the scheduler treats the link as a critical
/// point worth rescanning over. `spec.md` §4.5/§4.6 fixes this at 8.
pub const LOW_THRESHOLD: i32 = 8;

/// Sliding window of the last [`WINDOW`] RSSI samples.
#[derive(Clone, Debug, Default)]
pub struct RssiWindow {
    samples: [i32; WINDOW],
    next: usize,
    filled: usize,
}

impl RssiWindow {
    pub fn new() -> RssiWindow {
        RssiWindow::default()
    }

    /// Writes `sample` into the next slot, wrapping, and grows `filled`
    /// until the window is full.
    pub fn add(&mut self, sample: i32) {
        self.samples[self.next] = sample;
        self.next = (self.next + 1) % WINDOW;
        if self.filled < WINDOW {
            self.filled += 1;
        }
    }

    pub fn is_full(&self) -> bool {
        self.filled == WINDOW
    }

    /// Arithmetic mean of all `WINDOW` slots, or `None` before the window
    /// has filled ("not yet meaningful").
    pub fn mean(&self) -> Option<i32> {
        if !self.is_full() {
            return None;
        }
        let sum: i32 = self.samples.iter().sum();
        Some(sum / WINDOW as i32)
    }

    /// Discards all samples. Used when a fresh association begins.
    pub fn reset(&mut self) {
        *self = RssiWindow::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_is_none_until_window_fills() {
        let mut w = RssiWindow::new();
        assert_eq!(w.mean(), None);
        w.add(-40);
        w.add(-42);
        w.add(-41);
        assert_eq!(w.mean(), None);
        w.add(-43);
        assert!(w.mean().is_some());
    }

    #[test]
    fn mean_is_arithmetic_average_of_last_window() {
        let mut w = RssiWindow::new();
        for s in [-40, -40, -40, -40] {
            w.add(s);
        }
        assert_eq!(w.mean(), Some(-40));

        // Push a fifth sample; the oldest one falls out of the window.
        w.add(-80);
        assert_eq!(w.mean(), Some((-40 * 3 + -80) / 4));
    }

    #[test]
    fn reset_clears_fill_state() {
        let mut w = RssiWindow::new();
        for s in [-40, -40, -40, -40] {
            w.add(s);
        }
        assert!(w.is_full());
        w.reset();
        assert!(!w.is_full());
        assert_eq!(w.mean(), None);
    }

    #[test]
    fn low_threshold_matches_spec_constant() {
        assert_eq!(LOW_THRESHOLD, 8);
    }
}
