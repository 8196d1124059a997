// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Generational handles for resources owned on the far side of an ABI.

use alloc::vec::Vec;

use crate::{CanvasError, Result};

/// Generations live in 31 bits so a raw handle never sets bit 63.
const MAX_GENERATION: u32 = 0x7FFF_FFFF;

/// An index into a [`HandleTable`] tagged with the slot's generation.
///
/// A handle goes stale when its slot is freed; stale handles never resolve,
/// even after the slot is reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Handle {
    index: u32,
    generation: u32,
}

impl Handle {
    /// Pack into a non-zero `u64`. Bit 63 is always clear.
    #[inline]
    pub const fn to_raw(self) -> u64 {
        ((self.generation as u64) << 32) | self.index as u64
    }

    /// Unpack a raw value. Returns `None` for `0` and for values whose
    /// generation is out of range.
    #[allow(
        clippy::cast_possible_truncation,
        reason = "the two halves of the raw value are extracted deliberately"
    )]
    pub const fn from_raw(raw: u64) -> Option<Self> {
        let generation = (raw >> 32) as u32;
        if generation == 0 || generation > MAX_GENERATION {
            return None;
        }
        Some(Self {
            index: raw as u32,
            generation,
        })
    }
}

#[derive(Clone, Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slot storage addressed by [`Handle`]s.
#[derive(Clone, Debug)]
pub struct HandleTable<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> HandleTable<T> {
    /// An empty table.
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// `true` if no entry is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store `value` and return its handle.
    pub fn insert(&mut self, value: T) -> Result<Handle> {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return Ok(Handle {
                index,
                generation: slot.generation,
            });
        }
        let index = u32::try_from(self.slots.len()).map_err(|_| CanvasError::OutOfMemory)?;
        self.slots.push(Slot {
            generation: 1,
            value: Some(value),
        });
        Ok(Handle {
            index,
            generation: 1,
        })
    }

    /// Resolve a live handle.
    pub fn get(&self, handle: Handle) -> Option<&T> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.value.as_ref())
    }

    /// Resolve a live handle mutably.
    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.value.as_mut())
    }

    /// Free a handle and return its value.
    ///
    /// Freeing a stale handle returns `None` and changes nothing.
    pub fn remove(&mut self, handle: Handle) -> Option<T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = if slot.generation >= MAX_GENERATION {
            1
        } else {
            slot.generation + 1
        };
        self.free.push(handle.index);
        Some(value)
    }
}
