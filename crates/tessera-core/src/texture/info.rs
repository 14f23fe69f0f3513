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

//! The normalized result of decoding one texture container.

use super::format::{mip_extent, TextureFormat};

crate::tessera_bitflags! {
    /// Flags describing how decoded pixel data should be interpreted.
    pub struct TextureInfoFlags: u32 {
        /// Color data is sRGB-encoded.
        const SRGB = 1 << 0;
        /// The layers are the six faces of a cubemap.
        const CUBEMAP = 1 << 1;
    }
}

/// A normalized description of a decoded texture.
///
/// Produced once per successful decode by a
/// [`FormatHandler`](super::FormatHandler) and immutable afterwards. The
/// finalize step builds the GPU-side resource from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputTextureInfo {
    /// Width of mip level 0 in pixels.
    pub width: u32,
    /// Height of mip level 0 in pixels.
    pub height: u32,
    /// Number of array layers. Six for cubemaps, one face per layer.
    pub layers: u32,
    /// Number of mip levels, at least 1.
    pub mip_levels: u32,
    /// Format of the decoded pixel data.
    pub format: TextureFormat,
    /// Interpretation flags.
    pub flags: TextureInfoFlags,
}

impl Default for InputTextureInfo {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            layers: 1,
            mip_levels: 1,
            format: TextureFormat::Rgba8Unorm,
            flags: TextureInfoFlags::EMPTY,
        }
    }
}

impl InputTextureInfo {
    /// Returns `true` if the layers are cubemap faces.
    pub fn is_cubemap(&self) -> bool {
        self.flags.contains(TextureInfoFlags::CUBEMAP)
    }

    /// Returns `true` if the color data is sRGB-encoded.
    pub fn is_srgb(&self) -> bool {
        self.flags.contains(TextureInfoFlags::SRGB)
    }

    /// Width and height of `mip_level`.
    pub fn mip_size(&self, mip_level: u32) -> (u32, u32) {
        (
            mip_extent(self.width, mip_level),
            mip_extent(self.height, mip_level),
        )
    }

    /// Expected size in bytes of one (layer, mip) slice.
    pub fn slice_size(&self, mip_level: u32) -> usize {
        let (width, height) = self.mip_size(mip_level);
        self.format.slice_size(width, height)
    }

    /// Iterates every `(layer, mip_level)` pair, layer-major.
    pub fn slices(&self) -> impl Iterator<Item = (u32, u32)> {
        let mips = self.mip_levels;
        (0..self.layers).flat_map(move |layer| (0..mips).map(move |mip| (layer, mip)))
    }
}
