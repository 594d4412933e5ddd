use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vitals_core::VitalReading;

/// Message pushed to every subscriber once per tick
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VitalsMessage {
    pub patient: String,
    pub heart_rate: f32,
    pub systolic_pressure: f32,
    pub diastolic_pressure: f32,
    pub temperature: f32,
    /// Send time, seconds since the Unix epoch
    pub timestamp: f64,
}

impl VitalsMessage {
    pub fn from_reading(patient: &str, reading: &VitalReading, sent_at: DateTime<Utc>) -> Self {
        Self {
            patient: patient.to_string(),
            heart_rate: reading.heart_rate,
            systolic_pressure: reading.systolic_pressure,
            diastolic_pressure: reading.diastolic_pressure,
            temperature: reading.temperature,
            timestamp: epoch_seconds(sent_at),
        }
    }

    /// Convert message to a JSON text payload
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Fractional seconds since the Unix epoch
pub fn epoch_seconds(at: DateTime<Utc>) -> f64 {
    at.timestamp_micros() as f64 / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> VitalsMessage {
        let reading = VitalReading {
            heart_rate: 72.0,
            systolic_pressure: 118.0,
            diastolic_pressure: 81.5,
            temperature: 36.6,
            captured_at: Utc::now(),
        };
        let sent_at = DateTime::from_timestamp(1_699_000_000, 500_000_000).unwrap();
        VitalsMessage::from_reading("Patient 1", &reading, sent_at)
    }

    #[test]
    fn test_message_fields() {
        let json = sample().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["patient"], "Patient 1");
        assert_eq!(value["heart_rate"], 72.0);
        assert_eq!(value["systolic_pressure"], 118.0);
        assert_eq!(value["diastolic_pressure"], 81.5);
        assert_eq!(value["timestamp"], 1_699_000_000.5);
        assert!((value["temperature"].as_f64().unwrap() - 36.6).abs() < 1e-4);
        assert_eq!(value.as_object().unwrap().len(), 6);
    }

    #[test]
    fn test_single_line_payload() {
        let json = sample().to_json().unwrap();
        assert!(!json.contains('\n'));
        assert!(json.starts_with('{'));
    }

    #[test]
    fn test_epoch_seconds() {
        let at = DateTime::from_timestamp(10, 250_000_000).unwrap();
        assert_eq!(epoch_seconds(at), 10.25);
    }
}
