// SPDX-License-Identifier: GPL-3.0-only
//! Portable engine: host memory, rayon fan-out over scanlines

use super::{ComputeEngine, EngineKind, unallocated, zeroed};
use crate::config::AggregationPolicy;
use crate::errors::PipelineResult;
use crate::kernels::{self, ToneTransform};
use crate::pixel::{self, Rgba};
use crate::ring_buffer::{LayerRingBuffer, RingCursor};
use tracing::debug;

struct CpuResources {
    layers: LayerRingBuffer,
    aggregate: Vec<Rgba>,
    output: Vec<u8>,
}

#[derive(Default)]
pub struct CpuEngine {
    resources: Option<CpuResources>,
}

impl CpuEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ComputeEngine for CpuEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Cpu
    }

    fn allocate(&mut self, width: u32, height: u32, capacity: usize) -> PipelineResult<()> {
        self.resources = None;

        let pixels = width as usize * height as usize;
        let layers = LayerRingBuffer::new(width, height, capacity)?;
        let aggregate = zeroed(pixels, "aggregate estimate")?;
        let output = zeroed(pixel::frame_len(width, height), "output buffer")?;

        debug!(width, height, capacity, "Allocated CPU engine resources");
        self.resources = Some(CpuResources {
            layers,
            aggregate,
            output,
        });
        Ok(())
    }

    fn release(&mut self) {
        self.resources = None;
    }

    fn cursor(&self) -> Option<&RingCursor> {
        self.resources.as_ref().map(|r| r.layers.cursor())
    }

    fn write_layer(&mut self, layer: &[u8]) -> PipelineResult<usize> {
        let resources = self.resources.as_mut().ok_or_else(unallocated)?;
        resources.layers.write(layer)
    }

    fn aggregate(&mut self, policy: AggregationPolicy, epsilon: f32) -> PipelineResult<()> {
        let resources = self.resources.as_mut().ok_or_else(unallocated)?;
        kernels::aggregate_layers(&resources.layers, &mut resources.aggregate, policy, epsilon);
        Ok(())
    }

    fn aggregate_snapshot(&mut self) -> PipelineResult<&[Rgba]> {
        let resources = self.resources.as_ref().ok_or_else(unallocated)?;
        Ok(&resources.aggregate)
    }

    fn tone_map(&mut self, transform: ToneTransform) -> PipelineResult<&[u8]> {
        let resources = self.resources.as_mut().ok_or_else(unallocated)?;
        let (width, _) = resources.layers.dimensions();
        kernels::tone_map(
            &resources.aggregate,
            width as usize,
            transform,
            &mut resources.output,
        );
        Ok(&resources.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_EPSILON;

    #[test]
    fn test_stages_require_allocation() {
        let mut engine = CpuEngine::new();
        assert!(engine.cursor().is_none());
        assert!(engine.write_layer(&[0; 4]).is_err());
        assert!(engine.tone_map(ToneTransform::Identity).is_err());
    }

    #[test]
    fn test_single_frame_round_trip() {
        let mut engine = CpuEngine::new();
        engine.allocate(2, 1, 3).unwrap();

        let frame = [12u8, 34, 56, 255, 200, 100, 50, 255];
        engine.write_layer(&frame).unwrap();
        engine
            .aggregate(AggregationPolicy::WeightedRobust, DEFAULT_EPSILON)
            .unwrap();
        let output = engine.tone_map(ToneTransform::Identity).unwrap();
        assert_eq!(output, &frame);
    }

    #[test]
    fn test_reallocate_resets_cursor() {
        let mut engine = CpuEngine::new();
        engine.allocate(1, 1, 2).unwrap();
        engine.write_layer(&[1, 2, 3, 4]).unwrap();
        engine.write_layer(&[1, 2, 3, 4]).unwrap();
        assert_eq!(engine.cursor().unwrap().active_count(), 2);

        engine.allocate(2, 2, 2).unwrap();
        assert_eq!(engine.cursor().unwrap().total_ingested(), 0);
        assert_eq!(engine.aggregate_snapshot().unwrap().len(), 4);
    }
}
