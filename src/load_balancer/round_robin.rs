//! Round-robin rotation over the currently eligible upstreams.

/// Shared rotation counter.
///
/// The counter advances modulo the size of the eligible set *at call time*, so
/// rotation skips or repeats entries whenever that size changes between calls.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: usize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance and return the index into an eligible set of `len` entries.
    pub fn next_index(&mut self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        self.counter = (self.counter + 1) % len;
        Some(self.counter)
    }
}
