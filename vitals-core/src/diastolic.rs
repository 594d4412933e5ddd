//! Synthetic diastolic pressure fill
//!
//! Producers do not measure diastolic pressure. Until they do, the decoder
//! asks a [`DiastolicFill`] for a value on every frame. Swapping in a real
//! sensor field only means replacing the strategy.

use rand::Rng;

/// Supplies the diastolic pressure for a decoded frame
pub trait DiastolicFill: Send {
    /// Value to report alongside the given systolic pressure
    fn diastolic(&mut self, systolic_pressure: f32) -> f32;

    /// Whether the value is synthetic rather than sensor-derived
    fn is_synthetic(&self) -> bool {
        true
    }
}

/// Uniformly random diastolic pressure in `[min, max]`
#[derive(Debug, Clone)]
pub struct RandomDiastolic {
    min: f32,
    max: f32,
}

impl RandomDiastolic {
    pub const DEFAULT_MIN: f32 = 70.0;
    pub const DEFAULT_MAX: f32 = 90.0;

    /// Create a fill over `[min, max]`; the bounds are swapped if inverted
    pub fn new(min: f32, max: f32) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn range(&self) -> (f32, f32) {
        (self.min, self.max)
    }
}

impl Default for RandomDiastolic {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MIN, Self::DEFAULT_MAX)
    }
}

impl DiastolicFill for RandomDiastolic {
    fn diastolic(&mut self, _systolic_pressure: f32) -> f32 {
        rand::thread_rng().gen_range(self.min..=self.max)
    }
}

/// Constant diastolic pressure, for tests and deterministic replays
#[derive(Debug, Clone, Copy)]
pub struct FixedDiastolic(pub f32);

impl DiastolicFill for FixedDiastolic {
    fn diastolic(&mut self, _systolic_pressure: f32) -> f32 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_stays_in_range() {
        let mut fill = RandomDiastolic::default();
        for _ in 0..1000 {
            let value = fill.diastolic(120.0);
            assert!((70.0..=90.0).contains(&value), "out of range: {}", value);
        }
        assert!(fill.is_synthetic());
    }

    #[test]
    fn test_inverted_bounds_are_swapped() {
        let fill = RandomDiastolic::new(90.0, 70.0);
        assert_eq!(fill.range(), (70.0, 90.0));
    }

    #[test]
    fn test_degenerate_range() {
        let mut fill = RandomDiastolic::new(80.0, 80.0);
        assert_eq!(fill.diastolic(110.0), 80.0);
    }

    #[test]
    fn test_fixed() {
        let mut fill = FixedDiastolic(75.0);
        assert_eq!(fill.diastolic(130.0), 75.0);
    }
}
