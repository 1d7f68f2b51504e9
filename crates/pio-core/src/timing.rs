//! Optional observation interface (§9 Design Notes: "conditionally compiled
//! telemetry"). Never read by the core itself — a caller wraps any entry
//! point from the outside, the same role `BenchTimers`/`now()` play for the
//! ancestor crate's bench binary.

use std::cell::Cell;
use std::time::Instant;

thread_local! {
    static EPOCH: Cell<Option<Instant>> = const { Cell::new(None) };
}

/// Monotonic timestamp in seconds, relative to the first call on this
/// thread.
pub fn now() -> f64 {
    EPOCH.with(|cell| {
        let epoch = match cell.get() {
            Some(e) => e,
            None => {
                let e = Instant::now();
                cell.set(Some(e));
                e
            }
        };
        epoch.elapsed().as_secs_f64()
    })
}

/// A named interval a caller can start/stop around any core entry point.
#[derive(Debug, Clone, Copy, Default)]
pub struct Timer {
    start: f64,
    stop: f64,
}

impl Timer {
    pub fn start() -> Self {
        Timer { start: now(), stop: 0.0 }
    }

    pub fn stop(&mut self) {
        self.stop = now();
    }

    pub fn elapsed(&self) -> f64 {
        self.stop - self.start
    }
}
