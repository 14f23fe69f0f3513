// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Fixtures shared by the integration tests.

#![allow(dead_code)]

use crossbeam_channel::{Receiver, Sender};
use std::io::{Cursor, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tessera_agents::texture_agent::{LoadReport, TextureAgent, TextureLoaderSettings};
use tessera_core::{DecodeError, FormatHandler, InputTextureInfo};
use tessera_infra::HeadlessRenderContext;
use tessera_lanes::texture_lane::BitmapLoaderLane;

pub const TIMEOUT: Duration = Duration::from_secs(10);

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A `width` x `height` PNG filled with `rgba`.
pub fn solid_png(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    encode_png(image::RgbaImage::from_pixel(width, height, image::Rgba(rgba)))
}

/// A PNG whose row `y` is filled with the gray value `y * 10`.
pub fn striped_png(width: u32, height: u32) -> Vec<u8> {
    encode_png(image::RgbaImage::from_fn(width, height, |_, y| {
        let v = (y * 10) as u8;
        image::Rgba([v, v, v, 255])
    }))
}

fn encode_png(image: image::RgbaImage) -> Vec<u8> {
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, image::ImageFormat::Png)
        .expect("PNG encoding");
    bytes.into_inner()
}

/// A 4x4 DXT1 cubemap (legacy header, all six faces) whose face `n` is one
/// block filled with byte `n`.
pub fn dds_bc1_cubemap() -> Vec<u8> {
    let mut words = [0u32; 31];
    words[0] = 124; // header size
    words[1] = 0x1 | 0x2 | 0x4 | 0x1000; // caps, height, width, pixel format
    words[2] = 4; // height
    words[3] = 4; // width
    words[6] = 1; // mips
    words[18] = 32; // pixel format size
    words[19] = 0x4; // FourCC
    words[20] = u32::from_le_bytes(*b"DXT1");
    words[26] = 0x1000 | 0x8; // texture, complex
    words[27] = 0x200 | 0xFC00; // cubemap, every face

    let mut bytes = b"DDS ".to_vec();
    for word in words {
        bytes.extend_from_slice(&word.to_le_bytes());
    }
    for face in 0..6u8 {
        bytes.extend_from_slice(&[face; 8]);
    }
    bytes
}

pub fn headless() -> Arc<HeadlessRenderContext> {
    Arc::new(HeadlessRenderContext::new())
}

/// An agent with two workers and the default handlers.
pub fn agent(context: Arc<HeadlessRenderContext>) -> TextureAgent {
    agent_with(context, TextureLoaderSettings::default())
}

pub fn agent_with(
    context: Arc<HeadlessRenderContext>,
    settings: TextureLoaderSettings,
) -> TextureAgent {
    init_logger();
    let settings = TextureLoaderSettings {
        worker_threads: 2,
        ..settings
    };
    let mut agent = TextureAgent::new(context, settings).expect("agent startup");
    agent.register_default_handlers();
    agent
}

/// Polls until `count` reports arrived.
pub fn collect(agent: &mut TextureAgent, count: usize) -> Vec<LoadReport> {
    let mut reports = Vec::new();
    agent.poll_until(count, TIMEOUT, |report| reports.push(report));
    assert_eq!(reports.len(), count, "timed out waiting for loads");
    reports
}

/// Counts decodes of a gated format, and how many ran at the same time.
#[derive(Default)]
pub struct DecodeStats {
    pub started: AtomicUsize,
    running: AtomicUsize,
    pub peak: AtomicUsize,
}

/// Decodes PNGs once per message sent to the gate.
pub struct Gate {
    pub open: Sender<()>,
    pub stats: Arc<DecodeStats>,
}

/// Registers a handler for `extension` that decodes PNGs but waits for the
/// returned gate before each decode.
pub fn gated_png(agent: &mut TextureAgent, extension: &str) -> Gate {
    let (open, gate) = crossbeam_channel::unbounded();
    let stats = Arc::new(DecodeStats::default());
    let shared = Arc::clone(&stats);
    agent.register_handler(extension, move |context| {
        Box::new(GatedLane {
            inner: BitmapLoaderLane::for_extension("png", context),
            gate: gate.clone(),
            stats: Arc::clone(&shared),
        })
    });
    Gate { open, stats }
}

struct GatedLane {
    inner: BitmapLoaderLane,
    gate: Receiver<()>,
    stats: Arc<DecodeStats>,
}

impl FormatHandler for GatedLane {
    fn container_kind(&self) -> &'static str {
        self.inner.container_kind()
    }

    fn load_data(
        &mut self,
        reader: &mut dyn Read,
        info: &mut InputTextureInfo,
    ) -> Result<(), DecodeError> {
        self.stats.started.fetch_add(1, Ordering::SeqCst);
        let running = self.stats.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.peak.fetch_max(running, Ordering::SeqCst);
        let _ = self.gate.recv_timeout(TIMEOUT);
        let result = self.inner.load_data(reader, info);
        self.stats.running.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn data_slice(&self, layer: u32, mip_level: u32) -> Option<&[u8]> {
        self.inner.data_slice(layer, mip_level)
    }

    fn data_slice_mut(&mut self, layer: u32, mip_level: u32) -> Option<&mut [u8]> {
        self.inner.data_slice_mut(layer, mip_level)
    }
}
