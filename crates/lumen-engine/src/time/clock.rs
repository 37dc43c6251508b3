use std::time::{Duration, Instant};

/// Frame timing snapshot.
#[derive(Debug, Copy, Clone)]
pub struct FrameTime {
    /// Seconds elapsed since the clock started.
    pub elapsed: f32,

    /// Microseconds elapsed since the clock started.
    pub elapsed_micros: u64,

    /// Time elapsed since the previous tick, in seconds (clamped).
    pub dt: f32,

    /// Monotonic tick counter. Unlike the shader frame counter this never resets.
    pub frame_index: u64,
}

/// Monotonic clock tracking process start and the previous/current frame.
///
/// `elapsed` feeds the shader's time constant and is never clamped. Delta time
/// is clamped to avoid pathological values when the process is paused by the
/// debugger, minimized, or stalls.
#[derive(Debug, Clone)]
pub struct Clock {
    start: Instant,
    last: Instant,
    frame_index: u64,
    dt_min: Duration,
    dt_max: Duration,
}

impl Clock {
    /// Creates a clock starting now, with default clamps.
    pub fn new() -> Self {
        Self::started_at(Instant::now())
    }

    /// Creates a clock whose time origin is `start`.
    pub fn started_at(start: Instant) -> Self {
        Self {
            start,
            last: start,
            frame_index: 0,
            dt_min: Duration::from_micros(100), // 0.0001s
            dt_max: Duration::from_millis(250), // 0.25s
        }
    }

    /// Advances the clock to the current instant.
    pub fn tick(&mut self) -> FrameTime {
        self.tick_at(Instant::now())
    }

    /// Advances the clock to `now`.
    ///
    /// A timestamp earlier than the previous tick is treated as the previous
    /// tick, so `elapsed` never goes backwards.
    pub fn tick_at(&mut self, now: Instant) -> FrameTime {
        let now = now.max(self.last);
        let mut dt = now.saturating_duration_since(self.last);

        if dt < self.dt_min {
            dt = self.dt_min;
        } else if dt > self.dt_max {
            dt = self.dt_max;
        }

        self.last = now;

        let since_start = now.saturating_duration_since(self.start);
        let ft = FrameTime {
            elapsed: since_start.as_secs_f32(),
            elapsed_micros: u64::try_from(since_start.as_micros()).unwrap_or(u64::MAX),
            dt: dt.as_secs_f32(),
            frame_index: self.frame_index,
        };

        self.frame_index = self.frame_index.wrapping_add(1);

        ft
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}
