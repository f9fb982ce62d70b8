//! Search limits, the stop signal, and wall-clock management.
//!
//! The stop flag is the only mutable state shared across threads: the UCI
//! input reader and the time manager both raise it, the search loop polls
//! it between iterations. Relaxed ordering is enough; the loop only needs
//! eventual visibility.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use shakmaty::Color;

/// Cross-thread search signals.
pub struct SearchSignals {
    stop: AtomicBool,
}

impl SearchSignals {
    pub fn new() -> Self {
        SearchSignals {
            stop: AtomicBool::new(false),
        }
    }

    pub fn stop(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    pub fn set_stop(&self, value: bool) {
        self.stop.store(value, Ordering::Relaxed);
    }
}

impl Default for SearchSignals {
    fn default() -> Self {
        SearchSignals::new()
    }
}

/// Budgets for one `go` command.
#[derive(Debug, Clone, Default)]
pub struct SearchLimits {
    pub wtime: Option<Duration>,
    pub btime: Option<Duration>,
    pub winc: Option<Duration>,
    pub binc: Option<Duration>,
    pub movestogo: Option<u32>,
    pub movetime: Option<Duration>,
    pub nodes: Option<u64>,
    /// Iteration cap, set programmatically rather than over UCI.
    pub iterations: Option<u64>,
    pub infinite: bool,
    pub ponder: bool,
}

impl SearchLimits {
    /// Whether the clock allocation (rather than a hard budget) governs
    /// this search.
    pub fn use_time_management(&self) -> bool {
        (self.wtime.is_some() || self.btime.is_some())
            && self.movetime.is_none()
            && self.nodes.is_none()
            && !self.infinite
    }
}

/// Margin kept in hand when stopping on the clock.
const MOVE_OVERHEAD: Duration = Duration::from_millis(10);
const DEFAULT_MOVES_TO_GO: u32 = 20;
const INFO_INTERVAL: Duration = Duration::from_secs(1);

/// Converts the clock state into a per-move budget and raises the stop
/// signal once any budget is exhausted.
pub struct TimeManager {
    start: Instant,
    maximum: Duration,
    last_info: Instant,
}

impl TimeManager {
    pub fn new(limits: &SearchLimits, us: Color) -> Self {
        let (time, inc) = match us {
            Color::White => (limits.wtime, limits.winc),
            Color::Black => (limits.btime, limits.binc),
        };
        // Remaining time spread over the moves to the control, plus half
        // the increment, but never eating the whole clock.
        let maximum = match time {
            Some(total) => {
                let mtg = limits.movestogo.unwrap_or(DEFAULT_MOVES_TO_GO).max(1);
                let budget = total / mtg + inc.unwrap_or(Duration::ZERO) / 2;
                budget.min(total.saturating_sub(Duration::from_millis(50)))
            }
            None => Duration::from_secs(60 * 60 * 24),
        };
        let now = Instant::now();
        TimeManager {
            start: now,
            maximum,
            last_info: now,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn maximum(&self) -> Duration {
        self.maximum
    }

    /// Periodic poll from the search loop: a debug line once a second, and
    /// the stop signal when a budget runs out. Never stops on its own
    /// while the GUI has the engine pondering.
    pub fn check_time(&mut self, limits: &SearchLimits, signals: &SearchSignals, nodes: u64) {
        let elapsed = self.elapsed();
        if self.last_info.elapsed() >= INFO_INTERVAL {
            self.last_info = Instant::now();
            eprintln!("nodes {} time {}", nodes, elapsed.as_millis());
        }

        if limits.ponder {
            return;
        }

        let out_of_clock = limits.use_time_management() && elapsed + MOVE_OVERHEAD >= self.maximum;
        let out_of_movetime = limits.movetime.map_or(false, |mt| elapsed >= mt);
        let out_of_nodes = limits.nodes.map_or(false, |cap| nodes >= cap);
        if out_of_clock || out_of_movetime || out_of_nodes {
            signals.set_stop(true);
        }
    }
}
