//! Decoded vital-sign reading

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Latest decoded measurement from a producer.
///
/// `diastolic_pressure` is never measured; it comes from a
/// [`DiastolicFill`](crate::DiastolicFill) strategy at decode time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VitalReading {
    pub heart_rate: f32,
    pub systolic_pressure: f32,
    pub diastolic_pressure: f32,
    pub temperature: f32,
    pub captured_at: DateTime<Utc>,
}

impl VitalReading {
    /// Reading served before any producer has delivered a frame
    pub fn baseline() -> Self {
        Self {
            heart_rate: 70.0,
            systolic_pressure: 120.0,
            diastolic_pressure: 80.0,
            temperature: 36.5,
            captured_at: Utc::now(),
        }
    }

    /// Age of the reading relative to `now`, zero if captured in the future
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        (now - self.captured_at).max(chrono::Duration::zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baseline_values() {
        let reading = VitalReading::baseline();
        assert_eq!(reading.heart_rate, 70.0);
        assert_eq!(reading.systolic_pressure, 120.0);
        assert_eq!(reading.diastolic_pressure, 80.0);
        assert_eq!(reading.temperature, 36.5);
    }

    #[test]
    fn test_age_never_negative() {
        let reading = VitalReading::baseline();
        let earlier = reading.captured_at - chrono::Duration::seconds(5);
        assert_eq!(reading.age(earlier), chrono::Duration::zero());

        let later = reading.captured_at + chrono::Duration::seconds(3);
        assert_eq!(reading.age(later), chrono::Duration::seconds(3));
    }
}
