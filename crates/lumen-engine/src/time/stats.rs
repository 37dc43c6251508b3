use super::FrameTime;

/// Frame-rate summary over one reporting interval.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FrameReport {
    pub frames: u32,
    /// Mean delta time over the interval, in seconds.
    pub mean_dt: f32,
}

impl FrameReport {
    pub fn fps(&self) -> f32 {
        if self.mean_dt > 0.0 { 1.0 / self.mean_dt } else { 0.0 }
    }
}

/// Accumulates frame times and yields a report once per interval.
#[derive(Debug, Clone)]
pub struct FrameStats {
    interval: f32,
    window_start: f32,
    frames: u32,
    dt_sum: f32,
}

impl FrameStats {
    /// `interval` is in seconds of clock time.
    pub fn new(interval: f32) -> Self {
        Self {
            interval,
            window_start: 0.0,
            frames: 0,
            dt_sum: 0.0,
        }
    }

    pub fn record(&mut self, time: &FrameTime) -> Option<FrameReport> {
        self.frames += 1;
        self.dt_sum += time.dt;

        if time.elapsed - self.window_start < self.interval {
            return None;
        }

        let report = FrameReport {
            frames: self.frames,
            mean_dt: self.dt_sum / self.frames as f32,
        };

        self.window_start = time.elapsed;
        self.frames = 0;
        self.dt_sum = 0.0;

        Some(report)
    }
}

impl Default for FrameStats {
    fn default() -> Self {
        Self::new(1.0)
    }
}
