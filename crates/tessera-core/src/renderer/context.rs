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

//! The rendering-context contract consumed by the loading pipeline.

use super::error::ResourceError;
use crate::texture::{InputTextureInfo, TextureFormat};
use std::fmt::Debug;
use std::sync::Arc;

/// An opaque handle to a GPU texture resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub usize);

/// An opaque handle to a GPU texture view resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureViewId(pub usize);

/// An opaque handle to a GPU sampler resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerId(pub usize);

/// A GPU-ready texture: image, view and sampler created from one upload.
///
/// Shared as `Arc<GpuTexture>`. Two handles refer to the same resource when
/// their `Arc`s are pointer-equal.
#[derive(Debug, PartialEq, Eq)]
pub struct GpuTexture {
    /// The image object.
    pub texture: TextureId,
    /// The default view over every layer and mip.
    pub view: TextureViewId,
    /// The sampler bound with the view.
    pub sampler: SamplerId,
    /// The format the image was created with, sRGB variant included.
    pub format: TextureFormat,
    /// Width of mip level 0.
    pub width: u32,
    /// Height of mip level 0.
    pub height: u32,
    /// Number of layers (six for a cubemap).
    pub layers: u32,
    /// Number of mip levels.
    pub mip_levels: u32,
    /// `true` if the view is a cube view.
    pub cube: bool,
}

/// One slice of pixel data to upload.
#[derive(Debug, Clone, Copy)]
pub struct TextureSlice<'a> {
    /// Array layer or cubemap face.
    pub layer: u32,
    /// Mip level.
    pub mip_level: u32,
    /// The tightly packed bytes of the slice.
    pub data: &'a [u8],
}

/// Everything a [`RenderContext`] needs to create a [`GpuTexture`].
#[derive(Debug, Clone)]
pub struct TextureUpload<'a> {
    /// A debug label, usually the texture identifier.
    pub label: &'a str,
    /// The normalized description of the data.
    pub info: &'a InputTextureInfo,
    /// Every slice of the texture, layer-major.
    pub slices: Vec<TextureSlice<'a>>,
}

/// The rendering context the loader hands finished pixel data to.
///
/// Implementations own the graphics device. Unless
/// [`supports_multithreaded_allocation`](Self::supports_multithreaded_allocation)
/// returns `true`, [`create_texture`](Self::create_texture) is only called from
/// the thread that polls the loader.
pub trait RenderContext: Send + Sync + Debug + 'static {
    /// Creates image, view and sampler objects and uploads every slice.
    ///
    /// ## Errors
    /// * `ResourceError::UnsupportedFormat` - If the device has no mapping for
    ///   the decoded format.
    fn create_texture(&self, upload: &TextureUpload<'_>) -> Result<GpuTexture, ResourceError>;

    /// Indicates if textures may be created from any worker thread.
    fn supports_multithreaded_allocation(&self) -> bool;

    /// Takes ownership of a resource that is no longer referenced by the
    /// loader and keeps it alive until GPU work submitted against it finished.
    fn retire(&self, texture: Arc<GpuTexture>);

    /// Blocks until the device is idle.
    fn wait_idle(&self);
}
