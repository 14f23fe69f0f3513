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

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tessera_core::{
    GpuTexture, InputTextureInfo, RenderContext, ResourceError, SamplerId, TextureFormat,
    TextureId, TextureUpload, TextureViewId,
};

/// What the context remembers about a created texture.
#[derive(Debug)]
struct HeadlessTextureEntry {
    label: String,
    info: InputTextureInfo,
    /// Copies of the uploaded slices, layer-major.
    slices: Vec<Vec<u8>>,
}

#[derive(Debug)]
struct RetiredTexture {
    due_frame: u64,
    texture: Arc<GpuTexture>,
}

/// A [`RenderContext`] without a GPU.
///
/// Uploads are validated exactly like a real device would (slice count and
/// sizes, cube layer count, format support) and kept in memory so tests and
/// tools can inspect them. Retired textures stay alive for a configurable
/// number of frames, driven by [`advance_frame`](Self::advance_frame).
#[derive(Debug)]
pub struct HeadlessRenderContext {
    textures: Mutex<HashMap<TextureId, HeadlessTextureEntry>>,
    retired: Mutex<VecDeque<RetiredTexture>>,

    next_texture_id: AtomicUsize,
    next_texture_view_id: AtomicUsize,
    next_sampler_id: AtomicUsize,

    allocated_bytes: AtomicUsize,
    frame: AtomicU64,
    wait_idle_calls: AtomicUsize,

    multithreaded_allocation: bool,
    unsupported_formats: Vec<TextureFormat>,
    retire_latency: u64,
}

impl Default for HeadlessRenderContext {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessRenderContext {
    /// Frames a retired texture is kept alive by default, as with a
    /// double-buffered swapchain.
    pub const DEFAULT_RETIRE_LATENCY: u64 = 2;

    /// Creates a context that only allocates from the polling thread and
    /// supports every format.
    pub fn new() -> Self {
        Self {
            textures: Mutex::new(HashMap::new()),
            retired: Mutex::new(VecDeque::new()),
            next_texture_id: AtomicUsize::new(0),
            next_texture_view_id: AtomicUsize::new(0),
            next_sampler_id: AtomicUsize::new(0),
            allocated_bytes: AtomicUsize::new(0),
            frame: AtomicU64::new(0),
            wait_idle_calls: AtomicUsize::new(0),
            multithreaded_allocation: false,
            unsupported_formats: Vec::new(),
            retire_latency: Self::DEFAULT_RETIRE_LATENCY,
        }
    }

    /// Advertises (or not) texture creation from worker threads.
    pub fn with_multithreaded_allocation(mut self, enabled: bool) -> Self {
        self.multithreaded_allocation = enabled;
        self
    }

    /// Makes [`RenderContext::create_texture`] reject `format`.
    pub fn with_unsupported_format(mut self, format: TextureFormat) -> Self {
        self.unsupported_formats.push(format);
        self
    }

    /// Sets how many frames a retired texture survives. Zero releases it on
    /// retirement.
    pub fn with_retire_latency(mut self, frames: u64) -> Self {
        self.retire_latency = frames;
        self
    }

    fn generate_texture_id(&self) -> TextureId {
        TextureId(self.next_texture_id.fetch_add(1, Ordering::Relaxed))
    }

    fn generate_texture_view_id(&self) -> TextureViewId {
        TextureViewId(self.next_texture_view_id.fetch_add(1, Ordering::Relaxed))
    }

    fn generate_sampler_id(&self) -> SamplerId {
        SamplerId(self.next_sampler_id.fetch_add(1, Ordering::Relaxed))
    }

    fn textures(&self) -> MutexGuard<'_, HashMap<TextureId, HeadlessTextureEntry>> {
        self.textures.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn retired(&self) -> MutexGuard<'_, VecDeque<RetiredTexture>> {
        self.retired.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn validate(&self, upload: &TextureUpload<'_>) -> Result<(), ResourceError> {
        let info = upload.info;
        if self.unsupported_formats.contains(&info.format) {
            return Err(ResourceError::UnsupportedFormat(info.format));
        }
        if info.width == 0 || info.height == 0 {
            return Err(ResourceError::InvalidUpload(format!(
                "'{}' has an empty {}x{} extent",
                upload.label, info.width, info.height
            )));
        }
        if info.is_cubemap() && info.layers != 6 {
            return Err(ResourceError::InvalidUpload(format!(
                "cubemap '{}' has {} layers",
                upload.label, info.layers
            )));
        }

        let expected = (info.layers * info.mip_levels) as usize;
        if upload.slices.len() != expected {
            return Err(ResourceError::InvalidUpload(format!(
                "'{}' provides {} slices, {} layers x {} mips need {expected}",
                upload.label,
                upload.slices.len(),
                info.layers,
                info.mip_levels
            )));
        }
        for slice in &upload.slices {
            let size = info.slice_size(slice.mip_level);
            if slice.layer >= info.layers || slice.mip_level >= info.mip_levels {
                return Err(ResourceError::InvalidUpload(format!(
                    "'{}' has an out of range slice (layer {}, mip {})",
                    upload.label, slice.layer, slice.mip_level
                )));
            }
            if slice.data.len() != size {
                return Err(ResourceError::InvalidUpload(format!(
                    "'{}' slice (layer {}, mip {}) holds {} bytes, expected {size}",
                    upload.label,
                    slice.layer,
                    slice.mip_level,
                    slice.data.len()
                )));
            }
        }
        Ok(())
    }

    /// Frees the storage of `texture`. Handles still held elsewhere keep a
    /// dead id, as a real device would leave them dangling.
    fn release(&self, texture: Arc<GpuTexture>) {
        if let Some(entry) = self.textures().remove(&texture.texture) {
            let size: usize = entry.slices.iter().map(Vec::len).sum();
            self.allocated_bytes.fetch_sub(size, Ordering::Relaxed);
            log::trace!("HeadlessRenderContext: released '{}'", entry.label);
        }
    }

    /// Ends the current frame and releases every retired texture whose
    /// latency elapsed. Returns how many were released.
    pub fn advance_frame(&self) -> usize {
        let frame = self.frame.fetch_add(1, Ordering::SeqCst) + 1;
        let due: Vec<Arc<GpuTexture>> = {
            let mut retired = self.retired();
            let mut due = Vec::new();
            while retired.front().is_some_and(|r| r.due_frame <= frame) {
                if let Some(r) = retired.pop_front() {
                    due.push(r.texture);
                }
            }
            due
        };
        let released = due.len();
        for texture in due {
            self.release(texture);
        }
        released
    }

    /// The number of frames ended so far.
    pub fn frame(&self) -> u64 {
        self.frame.load(Ordering::SeqCst)
    }

    /// Number of textures created and not yet released.
    pub fn live_textures(&self) -> usize {
        self.textures().len()
    }

    /// Checks if `id` is still alive (created and not released).
    pub fn is_alive(&self, id: TextureId) -> bool {
        self.textures().contains_key(&id)
    }

    /// Number of retired textures waiting for their frame.
    pub fn pending_retirements(&self) -> usize {
        self.retired().len()
    }

    /// How many times [`RenderContext::wait_idle`] was called.
    pub fn wait_idle_calls(&self) -> usize {
        self.wait_idle_calls.load(Ordering::SeqCst)
    }

    /// Sum of the uploaded bytes of every live texture.
    pub fn allocated_bytes(&self) -> usize {
        self.allocated_bytes.load(Ordering::Relaxed)
    }

    /// The label `id` was created with.
    pub fn label(&self, id: TextureId) -> Option<String> {
        self.textures().get(&id).map(|entry| entry.label.clone())
    }

    /// The description `id` was created from.
    pub fn texture_info(&self, id: TextureId) -> Option<InputTextureInfo> {
        self.textures().get(&id).map(|entry| entry.info)
    }

    /// A copy of one uploaded slice.
    pub fn uploaded_slice(&self, id: TextureId, layer: u32, mip_level: u32) -> Option<Vec<u8>> {
        let textures = self.textures();
        let entry = textures.get(&id)?;
        if layer >= entry.info.layers || mip_level >= entry.info.mip_levels {
            return None;
        }
        let index = (layer * entry.info.mip_levels + mip_level) as usize;
        entry.slices.get(index).cloned()
    }
}

impl RenderContext for HeadlessRenderContext {
    fn create_texture(&self, upload: &TextureUpload<'_>) -> Result<GpuTexture, ResourceError> {
        self.validate(upload)?;
        let info = *upload.info;

        let mut slices = upload.slices.clone();
        slices.sort_by_key(|s| (s.layer, s.mip_level));
        let slices: Vec<Vec<u8>> = slices.iter().map(|s| s.data.to_vec()).collect();
        let size: usize = slices.iter().map(Vec::len).sum();

        let format = if info.is_srgb() {
            info.format.to_srgb()
        } else {
            info.format
        };
        let texture = GpuTexture {
            texture: self.generate_texture_id(),
            view: self.generate_texture_view_id(),
            sampler: self.generate_sampler_id(),
            format,
            width: info.width,
            height: info.height,
            layers: info.layers,
            mip_levels: info.mip_levels,
            cube: info.is_cubemap(),
        };

        self.textures().insert(
            texture.texture,
            HeadlessTextureEntry {
                label: upload.label.to_owned(),
                info,
                slices,
            },
        );
        self.allocated_bytes.fetch_add(size, Ordering::Relaxed);
        log::debug!(
            "HeadlessRenderContext: created '{}' ({}x{}, {} layers, {} mips, {:?}) as {:?}",
            upload.label,
            info.width,
            info.height,
            info.layers,
            info.mip_levels,
            format,
            texture.texture
        );
        Ok(texture)
    }

    fn supports_multithreaded_allocation(&self) -> bool {
        self.multithreaded_allocation
    }

    fn retire(&self, texture: Arc<GpuTexture>) {
        if self.retire_latency == 0 {
            self.release(texture);
            return;
        }
        let due_frame = self.frame() + self.retire_latency;
        self.retired().push_back(RetiredTexture { due_frame, texture });
    }

    fn wait_idle(&self) {
        self.wait_idle_calls.fetch_add(1, Ordering::SeqCst);
        let drained: Vec<RetiredTexture> = self.retired().drain(..).collect();
        for retired in drained {
            self.release(retired.texture);
        }
    }
}
