const MAX_FRAME_DELTA: f32 = 0.25;

/// Converts variable frame deltas into a count of fixed-length steps.
#[derive(Debug, Clone)]
pub struct FixedTimestep {
    interval: f32,
    elapsed: f32,
}

impl FixedTimestep {
    pub fn new(rate: u32) -> Self {
        Self {
            interval: 1.0 / rate.max(1) as f32,
            elapsed: 0.0,
        }
    }

    pub fn interval(&self) -> f32 {
        self.interval
    }

    /// Adds one frame's delta, clamped to a quarter second, and returns how many
    /// whole steps are now due.
    pub fn advance(&mut self, delta: f32) -> u32 {
        self.elapsed += delta.clamp(0.0, MAX_FRAME_DELTA);
        let mut due = 0;
        while self.elapsed >= self.interval {
            self.elapsed -= self.interval;
            due += 1;
        }
        due
    }
}
