/// Per-tick clock in seconds.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GameTime {
    pub delta_time: f64,
    pub run_time: f64,
}

impl GameTime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Negative or non-finite deltas count as zero so the clock never runs
    /// backwards.
    pub fn advance(&mut self, delta_time: f64) {
        let delta_time = if delta_time.is_finite() && delta_time > 0.0 {
            delta_time
        } else {
            0.0
        };
        self.delta_time = delta_time;
        self.run_time += delta_time;
    }
}
