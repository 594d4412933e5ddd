//! Producer wire format
//!
//! ```text
//! Offset | Bytes | Field
//!   0    |   4   | temperature        (f32, little-endian)
//!   4    |   4   | systolic_pressure  (f32, little-endian)
//!   8    |   4   | heart_rate         (f32, little-endian)
//! ```
//!
//! Frames carry no delimiter or header; the reader always asks for exactly
//! [`FRAME_LEN`] bytes.

use chrono::Utc;

use crate::diastolic::{DiastolicFill, RandomDiastolic};
use crate::error::{FrameError, Result};
use crate::reading::VitalReading;

/// Size of one producer frame in bytes
pub const FRAME_LEN: usize = 12;

/// One raw frame as read from the wire
pub type Frame = [u8; FRAME_LEN];

/// The three measured values carried by a frame, in wire order
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameFields {
    pub temperature: f32,
    pub systolic_pressure: f32,
    pub heart_rate: f32,
}

impl FrameFields {
    /// Parse the measured values, rejecting NaN and infinities
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != FRAME_LEN {
            return Err(FrameError::InvalidLength {
                expected: FRAME_LEN,
                actual: bytes.len(),
            });
        }

        let fields = Self {
            temperature: read_f32(bytes, 0),
            systolic_pressure: read_f32(bytes, 4),
            heart_rate: read_f32(bytes, 8),
        };

        for (field, value) in [
            ("temperature", fields.temperature),
            ("systolic_pressure", fields.systolic_pressure),
            ("heart_rate", fields.heart_rate),
        ] {
            if !value.is_finite() {
                return Err(FrameError::NonFinite { field });
            }
        }

        Ok(fields)
    }

    /// Serialize to the wire layout
    pub fn to_frame(&self) -> Frame {
        let mut frame = [0u8; FRAME_LEN];
        frame[0..4].copy_from_slice(&self.temperature.to_le_bytes());
        frame[4..8].copy_from_slice(&self.systolic_pressure.to_le_bytes());
        frame[8..12].copy_from_slice(&self.heart_rate.to_le_bytes());
        frame
    }
}

fn read_f32(bytes: &[u8], offset: usize) -> f32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[offset..offset + 4]);
    f32::from_le_bytes(raw)
}

/// Encode a frame the way a producer device does
pub fn encode_frame(temperature: f32, systolic_pressure: f32, heart_rate: f32) -> Frame {
    FrameFields {
        temperature,
        systolic_pressure,
        heart_rate,
    }
    .to_frame()
}

/// Turns raw frames into readings
pub struct FrameDecoder {
    diastolic: Box<dyn DiastolicFill>,
}

impl FrameDecoder {
    pub fn new(diastolic: Box<dyn DiastolicFill>) -> Self {
        Self { diastolic }
    }

    /// Decode one frame, stamping it with the current time
    pub fn decode(&mut self, bytes: &[u8]) -> Result<VitalReading> {
        let fields = FrameFields::parse(bytes)?;

        Ok(VitalReading {
            heart_rate: fields.heart_rate,
            systolic_pressure: fields.systolic_pressure,
            diastolic_pressure: self.diastolic.diastolic(fields.systolic_pressure),
            temperature: fields.temperature,
            captured_at: Utc::now(),
        })
    }

    pub fn diastolic_is_synthetic(&self) -> bool {
        self.diastolic.is_synthetic()
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(Box::new(RandomDiastolic::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diastolic::FixedDiastolic;
    use approx::assert_relative_eq;

    #[test]
    fn test_decode_field_order() {
        let frame = encode_frame(36.6, 118.0, 72.0);
        let mut decoder = FrameDecoder::new(Box::new(FixedDiastolic(80.0)));

        let reading = decoder.decode(&frame).unwrap();
        assert_relative_eq!(reading.temperature, 36.6);
        assert_relative_eq!(reading.systolic_pressure, 118.0);
        assert_relative_eq!(reading.heart_rate, 72.0);
        assert_eq!(reading.diastolic_pressure, 80.0);
    }

    #[test]
    fn test_decode_known_bytes() {
        // 37.0, 120.0, 60.0 as little-endian f32
        let bytes = [
            0x00, 0x00, 0x14, 0x42, 0x00, 0x00, 0xF0, 0x42, 0x00, 0x00, 0x70, 0x42,
        ];
        let fields = FrameFields::parse(&bytes).unwrap();
        assert_eq!(fields.temperature, 37.0);
        assert_eq!(fields.systolic_pressure, 120.0);
        assert_eq!(fields.heart_rate, 60.0);
    }

    #[test]
    fn test_round_trip_extremes() {
        for (t, s, h) in [(0.0, 0.0, 0.0), (-40.5, 300.25, 250.0), (f32::MAX, f32::MIN, 1e-30)] {
            let fields = FrameFields::parse(&encode_frame(t, s, h)).unwrap();
            assert_eq!(fields.temperature, t);
            assert_eq!(fields.systolic_pressure, s);
            assert_eq!(fields.heart_rate, h);
        }
    }

    #[test]
    fn test_default_decoder_fills_synthetic_range() {
        let mut decoder = FrameDecoder::default();
        assert!(decoder.diastolic_is_synthetic());

        let reading = decoder.decode(&encode_frame(36.6, 118.0, 72.0)).unwrap();
        assert!((70.0..=90.0).contains(&reading.diastolic_pressure));
    }

    #[test]
    fn test_wrong_length_rejected() {
        let mut decoder = FrameDecoder::default();
        let err = decoder.decode(&[0u8; 11]).unwrap_err();
        assert!(matches!(
            err,
            FrameError::InvalidLength { expected: 12, actual: 11 }
        ));
        assert!(err.is_decode());
    }

    #[test]
    fn test_non_finite_rejected() {
        let frame = encode_frame(36.6, f32::NAN, 72.0);
        let err = FrameFields::parse(&frame).unwrap_err();
        assert!(matches!(err, FrameError::NonFinite { field: "systolic_pressure" }));

        let frame = encode_frame(36.6, 118.0, f32::INFINITY);
        assert!(FrameFields::parse(&frame).is_err());
    }
}
