//! Shared latest-reading cell
//!
//! Written by every producer pipeline, read by the broadcast loop. The whole
//! reading is swapped under one lock, so a reader always sees a reading from
//! exactly one frame.

use std::sync::{Arc, PoisonError, RwLock};

use crate::reading::VitalReading;

#[derive(Debug, Clone, Copy)]
struct Slot {
    reading: VitalReading,
    generation: u64,
}

/// Cloneable handle to the shared latest reading
#[derive(Debug, Clone)]
pub struct VitalState {
    slot: Arc<RwLock<Slot>>,
}

impl VitalState {
    pub fn new(initial: VitalReading) -> Self {
        Self {
            slot: Arc::new(RwLock::new(Slot {
                reading: initial,
                generation: 0,
            })),
        }
    }

    /// Replace the current reading in one step
    pub fn publish(&self, reading: VitalReading) {
        // Slot is plain Copy data, a poisoned lock still holds a whole value
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Slot {
            reading,
            generation: slot.generation.wrapping_add(1),
        };
    }

    /// Copy of the current reading
    pub fn snapshot(&self) -> VitalReading {
        self.slot.read().unwrap_or_else(PoisonError::into_inner).reading
    }

    /// Copy of the current reading with the number of publishes that led to it
    pub fn snapshot_with_generation(&self) -> (VitalReading, u64) {
        let slot = *self.slot.read().unwrap_or_else(PoisonError::into_inner);
        (slot.reading, slot.generation)
    }

    /// Number of readings published since creation
    pub fn generation(&self) -> u64 {
        self.slot.read().unwrap_or_else(PoisonError::into_inner).generation
    }
}

impl Default for VitalState {
    fn default() -> Self {
        Self::new(VitalReading::baseline())
    }
}
