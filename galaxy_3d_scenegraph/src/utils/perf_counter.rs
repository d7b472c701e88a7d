/// Per-frame counter with running statistics.
///
/// `fetch_new_frame` rolls the counter: the current value becomes the last
/// frame value and feeds min/max/average.
#[derive(Debug, Clone, Default)]
pub struct PerfCounter {
    current: u64,
    last_frame: u64,
    min: Option<u64>,
    max: u64,
    total: u64,
    frames: u64,
}

impl PerfCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add to the current frame's value
    pub fn add_count(&mut self, count: u64) {
        self.current += count;
    }

    /// Close the current frame and start a new one
    pub fn fetch_new_frame(&mut self) {
        self.last_frame = self.current;
        self.total += self.current;
        self.frames += 1;
        self.max = self.max.max(self.current);
        self.min = Some(self.min.map_or(self.current, |m| m.min(self.current)));
        self.current = 0;
    }

    /// Value accumulated in the frame in progress
    pub fn current(&self) -> u64 {
        self.current
    }

    /// Value of the last closed frame
    pub fn last_frame(&self) -> u64 {
        self.last_frame
    }

    pub fn min(&self) -> u64 {
        self.min.unwrap_or(0)
    }

    pub fn max(&self) -> u64 {
        self.max
    }

    pub fn average(&self) -> f64 {
        if self.frames == 0 {
            0.0
        } else {
            self.total as f64 / self.frames as f64
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}
