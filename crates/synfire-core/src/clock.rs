//! Discrete simulation clock

/// Step-counting clock shared by the engine and its rules
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Clock {
    step: u64,
    dt_ms: f32,
}

impl Clock {
    /// Create a clock at step zero with the given step size
    pub fn new(dt_ms: f32) -> Self {
        Self { step: 0, dt_ms }
    }

    /// Current step count
    pub fn step(&self) -> u64 {
        self.step
    }

    /// Step size in milliseconds
    pub fn dt_ms(&self) -> f32 {
        self.dt_ms
    }

    /// Current simulation time in milliseconds
    pub fn now_ms(&self) -> f32 {
        self.step as f32 * self.dt_ms
    }

    /// Advance by one step
    pub fn tick(&mut self) {
        self.step += 1;
    }

    /// Return to step zero
    pub fn reset(&mut self) {
        self.step = 0;
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new(0.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_advances() {
        let mut clock = Clock::new(0.5);
        assert_eq!(clock.now_ms(), 0.0);
        clock.tick();
        clock.tick();
        assert_eq!(clock.step(), 2);
        assert_eq!(clock.now_ms(), 1.0);
    }

    #[test]
    fn test_clock_reset() {
        let mut clock = Clock::new(0.1);
        clock.tick();
        clock.reset();
        assert_eq!(clock.step(), 0);
    }
}
