//! Reference model of the accumulator and flush cycle.
//!
//! The model tracks only what the agent must get right: the current count,
//! its day, the backlog totals and what the collector was sent. Replaying a
//! script against both the model and a [`TestAgent`](crate::TestAgent) and
//! comparing them checks the counting rules without restating them in every
//! test.

use crate::generators::Step;

/// Expected observable state after a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterModel {
    /// Window size in ticks.
    pub window_size: u32,
    /// Ticks in the current window.
    pub elapsed: u32,
    /// Day index (0 = epoch day) the current window belongs to.
    pub window_day: u32,
    /// Day index the clock is on.
    pub today: u32,
    /// `total_time` of each backlog entry, oldest first.
    pub backlog: Vec<u32>,
    /// `total_time`s of every bulk request the collector received.
    pub bulk_requests: Vec<Vec<u32>>,
    /// Number of single-window requests the collector received.
    pub window_requests: usize,
    /// Collector reachability.
    pub online: bool,
    /// Bulk endpoint answers 200.
    pub bulk_ok: bool,
    /// Single-window endpoint answers 200.
    pub window_ok: bool,
}

impl CounterModel {
    /// Creates the model of a freshly opened agent with a reachable
    /// collector.
    pub fn new(window_size: u32) -> Self {
        Self {
            window_size,
            elapsed: 0,
            window_day: 0,
            today: 0,
            backlog: Vec::new(),
            bulk_requests: Vec::new(),
            window_requests: 0,
            online: true,
            bulk_ok: true,
            window_ok: true,
        }
    }

    /// Applies one step.
    pub fn apply(&mut self, step: Step) {
        match step {
            Step::Tick => self.tick(),
            Step::NextDay => self.today += 1,
            Step::Connectivity(online) => self.online = online,
            Step::Accepting { bulk, window } => {
                self.bulk_ok = bulk;
                self.window_ok = window;
            }
            Step::Sync => {
                self.flush();
            }
            Step::Restart => {
                // load rejects a window that grew past the size while offline
                if self.elapsed > self.window_size {
                    self.elapsed = 0;
                    self.window_day = self.today;
                }
            }
        }
    }

    /// Applies every step in order.
    pub fn run(&mut self, script: &[Step]) {
        for step in script {
            self.apply(*step);
        }
    }

    /// Sum of the backlog totals.
    pub fn backlog_total(&self) -> u64 {
        self.backlog.iter().map(|t| u64::from(*t)).sum()
    }

    fn tick(&mut self) {
        if self.window_day != self.today {
            if self.elapsed > 0 {
                self.backlog.push(self.elapsed);
            }
            self.elapsed = 0;
            self.window_day = self.today;
        }

        self.elapsed += 1;
        if self.elapsed >= self.window_size && self.flush() {
            self.elapsed = 1;
        }
    }

    /// Returns true if the flush counts as a success.
    fn flush(&mut self) -> bool {
        if !self.online {
            return false;
        }

        let drained = if self.backlog.is_empty() {
            true
        } else {
            self.bulk_requests.push(self.backlog.clone());
            if self.bulk_ok {
                self.backlog.clear();
            }
            self.bulk_ok
        };
        self.window_requests += 1;

        drained || self.window_ok
    }
}
