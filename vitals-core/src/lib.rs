//! Vitals relay core
//!
//! Producer-side pieces of the vitals relay: fixed-size telemetry frames,
//! their decoding into vital-sign readings and the shared cell holding the
//! latest reading.
//!
//! ## Architecture
//!
//! ```text
//! Producer connection
//!   │
//!   ├─> FrameReader (12-byte frames, bounded poll wait)
//!   │     │
//!   │     └─> FrameDecoder (temperature, systolic, heart rate + DiastolicFill)
//!   │           │
//!   │           └─> VitalState::publish (whole-reading swap)
//!   │
//!   └─> Broadcast loop reads VitalState::snapshot
//! ```

pub mod diastolic;
pub mod error;
pub mod frame;
pub mod reader;
pub mod reading;
pub mod state;

pub use diastolic::{DiastolicFill, FixedDiastolic, RandomDiastolic};
pub use error::{FrameError, Result};
pub use frame::{encode_frame, Frame, FrameDecoder, FrameFields, FRAME_LEN};
pub use reader::{FrameReader, DEFAULT_FRAME_TIMEOUT};
pub use reading::VitalReading;
pub use state::VitalState;
