//! Real-time vitals broadcaster for display clients
//!
//! This crate provides a WebSocket server that pushes the latest vital-sign
//! reading to every connected display client on a fixed cadence. It manages
//! multiple concurrent subscribers, each with its own bounded outbound queue,
//! so one slow or broken client never stalls delivery to the others.
//!
//! # Features
//!
//! - WebSocket subscriber endpoint (default `0.0.0.0:6789`)
//! - One JSON text message per tick per subscriber
//! - Subscription by connecting; no handshake payload
//! - Thread-safe subscriber registry with per-subscriber writer tasks
//! - New subscriber catch-up (current reading sent immediately)
//! - Dead subscribers removed on send failure
//!
//! # Message
//!
//! ```json
//! {"patient":"Patient 1","heart_rate":72.0,"systolic_pressure":118.0,
//!  "diastolic_pressure":81.3,"temperature":36.6,"timestamp":1699000000.5}
//! ```
//!
//! # Example Usage
//!
//! ```no_run
//! use vitals_broadcaster::{BroadcasterConfig, VitalsBroadcaster};
//! use vitals_core::VitalState;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let state = VitalState::default();
//!
//!     // Create and start broadcaster
//!     let broadcaster = VitalsBroadcaster::new(BroadcasterConfig::default(), state.clone());
//!     let addr = broadcaster.start().await?;
//!     println!("subscribers connect to ws://{}", addr);
//!
//!     // Producers publish into `state`; every tick pushes the latest reading
//!
//!     // Stop broadcaster
//!     broadcaster.stop().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod broadcaster;
pub mod client;
pub mod error;
pub mod message;

// Re-exports
pub use broadcaster::{BroadcasterConfig, VitalsBroadcaster};
pub use client::{BroadcastReport, Delivery, SubscriberId, SubscriberRegistry};
pub use error::{BroadcasterError, Result};
pub use message::VitalsMessage;
