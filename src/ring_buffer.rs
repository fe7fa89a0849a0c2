// SPDX-License-Identifier: GPL-3.0-only

//! Fixed-capacity circular store of the most recent layers
//!
//! The slot bookkeeping lives in [`RingCursor`] so the GPU engine can keep
//! its layers in a device buffer while sharing the same write/read rules.
//! [`LayerRingBuffer`] is the host-memory store used by the CPU engine: one
//! contiguous `width * height * capacity` grid of packed RGBA8 texels.

use crate::constants::BYTES_PER_PIXEL;
use crate::errors::{PipelineError, PipelineResult};
use crate::pixel;

/// Write cursor over `capacity` slots
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RingCursor {
    capacity: usize,
    total_ingested: u64,
}

impl RingCursor {
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity > 0);
        Self {
            capacity,
            total_ingested: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Layers written since the last reset
    pub fn total_ingested(&self) -> u64 {
        self.total_ingested
    }

    /// `min(total_ingested, capacity)`
    pub fn active_count(&self) -> usize {
        self.total_ingested.min(self.capacity as u64) as usize
    }

    /// Slot the next write lands in
    pub fn write_index(&self) -> usize {
        (self.total_ingested % self.capacity as u64) as usize
    }

    /// Claim the next slot and advance
    pub fn advance(&mut self) -> usize {
        let slot = self.write_index();
        self.total_ingested += 1;
        slot
    }

    /// Active slots ordered oldest to newest
    pub fn active_slots(&self) -> impl Iterator<Item = usize> + '_ {
        let active = self.active_count();
        let start = if (self.total_ingested as usize) < self.capacity {
            0
        } else {
            self.write_index()
        };
        (0..active).map(move |i| (start + i) % self.capacity)
    }
}

/// Host-memory layer store
pub struct LayerRingBuffer {
    width: u32,
    height: u32,
    cursor: RingCursor,
    texels: Vec<u8>,
}

impl LayerRingBuffer {
    /// Allocate a zeroed store for `capacity` layers of `width x height`
    pub fn new(width: u32, height: u32, capacity: usize) -> PipelineResult<Self> {
        let total = pixel::frame_len(width, height)
            .checked_mul(capacity)
            .ok_or_else(|| {
                PipelineError::ResourceAllocation(format!(
                    "{}x{}x{} layers overflow the address space",
                    width, height, capacity
                ))
            })?;

        let mut texels = Vec::new();
        texels.try_reserve_exact(total).map_err(|e| {
            PipelineError::ResourceAllocation(format!("layer store of {} bytes: {}", total, e))
        })?;
        texels.resize(total, 0);

        Ok(Self {
            width,
            height,
            cursor: RingCursor::new(capacity),
            texels,
        })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn capacity(&self) -> usize {
        self.cursor.capacity()
    }

    pub fn cursor(&self) -> &RingCursor {
        &self.cursor
    }

    pub fn active_layer_count(&self) -> usize {
        self.cursor.active_count()
    }

    fn layer_len(&self) -> usize {
        self.width as usize * self.height as usize * BYTES_PER_PIXEL
    }

    /// Overwrite the next slot with `layer` and return its index
    ///
    /// Only that slot is touched; a wrong-sized layer leaves the store unchanged.
    pub fn write(&mut self, layer: &[u8]) -> PipelineResult<usize> {
        let expected = self.layer_len();
        if layer.len() != expected {
            return Err(PipelineError::InvalidInputSize {
                expected,
                actual: layer.len(),
            });
        }

        let slot = self.cursor.advance();
        let offset = slot * expected;
        self.texels[offset..offset + expected].copy_from_slice(layer);
        Ok(slot)
    }

    /// Packed bytes of one slot
    pub fn slot(&self, index: usize) -> &[u8] {
        let len = self.layer_len();
        &self.texels[index * len..(index + 1) * len]
    }

    /// Active layers, oldest first
    pub fn active_layers(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.cursor.active_slots().map(move |slot| self.slot(slot))
    }
}
