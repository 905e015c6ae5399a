/// Observer for long-running trajectories and fits.
///
/// Purely observational: nothing reported here feeds back into results.
pub trait ProgressReporter: Sync {
    /// Called once before work starts; `total` is the final position.
    fn start(&self, _total: u64) {}
    /// Called with the absolute position reached so far.
    fn advance(&self, _position: u64) {}
    fn finish(&self) {}
}

/// Reporter that ignores every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {}

/// Spreads `increments` reports evenly over `total` units of work.
#[derive(Debug, Clone)]
pub(crate) struct ProgressCadence {
    total: usize,
    increments: usize,
    next_increment: usize,
}

impl ProgressCadence {
    pub(crate) fn new(total: usize, increments: usize) -> Self {
        ProgressCadence {
            total,
            increments: increments.max(1),
            next_increment: 1,
        }
    }

    /// Returns the increment reached at `done`, at most once per increment.
    pub(crate) fn crossed(&mut self, done: usize) -> Option<u64> {
        if self.next_increment > self.increments || self.total == 0 {
            return None;
        }
        let reached = done.saturating_mul(self.increments) / self.total;
        if reached >= self.next_increment {
            self.next_increment = reached + 1;
            Some(reached.min(self.increments) as u64)
        } else {
            None
        }
    }
}
