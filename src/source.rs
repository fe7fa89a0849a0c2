// SPDX-License-Identifier: GPL-3.0-only

//! Frame sources feeding the pipeline
//!
//! A source produces packed RGBA8 frames with a row stride and a capture
//! timestamp. Two sources are bundled: a seeded synthetic low-light scene and
//! a directory of still images played back in name order.

use crate::constants::BYTES_PER_PIXEL;
use crate::errors::{PipelineError, PipelineResult};
use crate::pixel;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Nominal spacing between generated or replayed frames (30 fps)
const FRAME_INTERVAL: Duration = Duration::from_nanos(1_000_000_000 / 30);

/// One captured frame
#[derive(Clone, Debug)]
pub struct Frame {
    /// Packed RGBA8 rows, each `stride` bytes apart
    pub data: Arc<[u8]>,
    pub width: u32,
    pub height: u32,
    /// Bytes per row, may include padding
    pub stride: u32,
    /// Capture time relative to the start of the stream
    pub timestamp: Duration,
}

impl Frame {
    /// Wrap a tightly packed buffer
    pub fn packed_rgba(data: Vec<u8>, width: u32, height: u32, timestamp: Duration) -> Self {
        Self {
            data: Arc::from(data.into_boxed_slice()),
            width,
            height,
            stride: width * BYTES_PER_PIXEL as u32,
            timestamp,
        }
    }

    fn row_bytes(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }

    /// Pixel rows without stride padding
    ///
    /// Borrows the buffer when it is already tight.
    pub fn packed(&self) -> PipelineResult<Cow<'_, [u8]>> {
        let row_bytes = self.row_bytes();
        let stride = self.stride as usize;
        let height = self.height as usize;

        if stride < row_bytes {
            return Err(PipelineError::Source(format!(
                "stride {} is shorter than a {}-pixel row",
                stride, self.width
            )));
        }

        let required = match height {
            0 => 0,
            h => stride * (h - 1) + row_bytes,
        };
        if self.data.len() < required {
            return Err(PipelineError::InvalidInputSize {
                expected: required,
                actual: self.data.len(),
            });
        }

        if stride == row_bytes {
            Ok(Cow::Borrowed(&self.data[..row_bytes * height]))
        } else {
            Ok(Cow::Owned(pixel::repack_rows(
                &self.data, stride, row_bytes, height,
            )))
        }
    }
}

/// Anything that can hand out frames one at a time
///
/// `None` marks the end of the stream.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Option<PipelineResult<Frame>>;

    /// Short human-readable description for logs
    fn describe(&self) -> String;
}

/// Knobs for the synthetic scene
#[derive(Clone, Copy, Debug)]
pub struct SyntheticScene {
    /// Brightest gradient level, in 8-bit units
    pub peak_level: u8,
    /// Uniform noise amplitude, in 8-bit units
    pub noise: u8,
    /// Probability that a pixel is replaced by a white outlier
    pub sparkle_probability: f64,
}

impl Default for SyntheticScene {
    fn default() -> Self {
        Self {
            peak_level: 48,
            noise: 12,
            sparkle_probability: 0.002,
        }
    }
}

/// Seeded dim gradient with per-pixel noise and sparse white outliers
pub struct SyntheticSource {
    width: u32,
    height: u32,
    scene: SyntheticScene,
    rng: StdRng,
    remaining: Option<u64>,
    produced: u64,
}

impl SyntheticSource {
    /// `frames` limits the stream length; `None` streams forever
    pub fn new(width: u32, height: u32, frames: Option<u64>, seed: u64) -> Self {
        Self::with_scene(width, height, frames, seed, SyntheticScene::default())
    }

    pub fn with_scene(
        width: u32,
        height: u32,
        frames: Option<u64>,
        seed: u64,
        scene: SyntheticScene,
    ) -> Self {
        info!(width, height, ?frames, seed, "Synthetic source created");
        Self {
            width,
            height,
            scene,
            rng: StdRng::seed_from_u64(seed),
            remaining: frames,
            produced: 0,
        }
    }

    fn render(&mut self) -> Vec<u8> {
        let width = self.width as usize;
        let height = self.height as usize;
        let scene = self.scene;
        let span = width.max(1) + height.max(1);

        let mut data = vec![0u8; pixel::frame_len(self.width, self.height)];
        for (index, px) in data.chunks_exact_mut(BYTES_PER_PIXEL).enumerate() {
            if self.rng.gen_bool(scene.sparkle_probability) {
                px.copy_from_slice(&[255, 255, 255, 255]);
                continue;
            }

            let (x, y) = (index % width, index / width);
            let base = (scene.peak_level as usize * (x + y + 1) / span) as i32;
            let noise = scene.noise as i32;
            for (c, channel) in px[..3].iter_mut().enumerate() {
                // Slightly warm cast: red brightest, blue dimmest
                let tint = base * (4 - c as i32) / 4;
                let jitter = if noise > 0 {
                    self.rng.gen_range(-noise..=noise)
                } else {
                    0
                };
                *channel = (tint + jitter).clamp(0, 255) as u8;
            }
            px[3] = 255;
        }
        data
    }
}

impl FrameSource for SyntheticSource {
    fn next_frame(&mut self) -> Option<PipelineResult<Frame>> {
        if let Some(remaining) = self.remaining.as_mut() {
            if *remaining == 0 {
                return None;
            }
            *remaining -= 1;
        }

        let data = self.render();
        let timestamp = FRAME_INTERVAL * self.produced as u32;
        self.produced += 1;
        Some(Ok(Frame::packed_rgba(
            data,
            self.width,
            self.height,
            timestamp,
        )))
    }

    fn describe(&self) -> String {
        format!("synthetic {}x{}", self.width, self.height)
    }
}

/// Still images from one directory, in lexical file-name order
pub struct ImageSequenceSource {
    directory: PathBuf,
    files: Vec<PathBuf>,
    next: usize,
}

impl ImageSequenceSource {
    /// Collect every file in `directory` whose extension the image crate recognises
    pub fn open(directory: &Path) -> PipelineResult<Self> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(directory)? {
            let path = entry?.path();
            if path.is_file() && image::ImageFormat::from_path(&path).is_ok() {
                files.push(path);
            }
        }
        files.sort();

        if files.is_empty() {
            return Err(PipelineError::Source(format!(
                "no images found in {}",
                directory.display()
            )));
        }

        info!(
            directory = %directory.display(),
            count = files.len(),
            "Image sequence opened"
        );
        Ok(Self {
            directory: directory.to_path_buf(),
            files,
            next: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn load(&self, index: usize) -> PipelineResult<Frame> {
        let path = &self.files[index];
        debug!(path = %path.display(), "Loading image");

        let rgba = image::open(path)?.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(Frame::packed_rgba(
            rgba.into_raw(),
            width,
            height,
            FRAME_INTERVAL * index as u32,
        ))
    }
}

impl FrameSource for ImageSequenceSource {
    fn next_frame(&mut self) -> Option<PipelineResult<Frame>> {
        if self.next >= self.files.len() {
            return None;
        }
        let index = self.next;
        self.next += 1;
        Some(self.load(index))
    }

    fn describe(&self) -> String {
        format!(
            "{} images from {}",
            self.files.len(),
            self.directory.display()
        )
    }
}
