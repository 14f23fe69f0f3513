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

//! Pixel formats a decoder can produce.

/// Defines the memory format of the pixels produced by a decoder.
///
/// Uncompressed formats are addressed per pixel, block-compressed formats per
/// 4x4 tile. Use [`TextureFormat::block_dimensions`] and
/// [`TextureFormat::block_size`] instead of assuming one byte layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    // 8-bit formats
    /// One 8-bit unsigned normalized component.
    R8Unorm,
    /// Two 8-bit unsigned normalized components.
    Rg8Unorm,
    /// Four 8-bit unsigned normalized components (RGBA).
    Rgba8Unorm,
    /// Four 8-bit unsigned normalized components (RGBA) in the sRGB color space.
    Rgba8UnormSrgb,
    /// Four 8-bit unsigned normalized components (BGRA).
    Bgra8Unorm,
    /// Four 8-bit unsigned normalized components (BGRA) in the sRGB color space.
    Bgra8UnormSrgb,
    // Float formats
    /// Four 16-bit float components.
    Rgba16Float,
    /// Four 32-bit float components.
    Rgba32Float,
    // Block-compressed formats
    /// BC1 (DXT1), 8 bytes per 4x4 block.
    Bc1RgbaUnorm,
    /// BC1 (DXT1) in the sRGB color space.
    Bc1RgbaUnormSrgb,
    /// BC2 (DXT3), explicit 4-bit alpha, 16 bytes per block.
    Bc2RgbaUnorm,
    /// BC2 (DXT3) in the sRGB color space.
    Bc2RgbaUnormSrgb,
    /// BC3 (DXT5), interpolated alpha, 16 bytes per block.
    Bc3RgbaUnorm,
    /// BC3 (DXT5) in the sRGB color space.
    Bc3RgbaUnormSrgb,
    /// BC4, one interpolated channel, 8 bytes per block.
    Bc4RUnorm,
    /// BC5, two interpolated channels, 16 bytes per block.
    Bc5RgUnorm,
    /// BC6H unsigned half-float RGB, 16 bytes per block.
    Bc6hRgbUfloat,
    /// BC7, 16 bytes per block.
    Bc7RgbaUnorm,
    /// BC7 in the sRGB color space.
    Bc7RgbaUnormSrgb,
}

impl TextureFormat {
    /// Returns `true` for formats encoded as fixed-size 4x4 tiles.
    pub fn is_compressed(&self) -> bool {
        self.block_dimensions() != (1, 1)
    }

    /// Returns the width and height in pixels of one addressable unit.
    pub fn block_dimensions(&self) -> (u32, u32) {
        match self {
            TextureFormat::R8Unorm
            | TextureFormat::Rg8Unorm
            | TextureFormat::Rgba8Unorm
            | TextureFormat::Rgba8UnormSrgb
            | TextureFormat::Bgra8Unorm
            | TextureFormat::Bgra8UnormSrgb
            | TextureFormat::Rgba16Float
            | TextureFormat::Rgba32Float => (1, 1),
            _ => (4, 4),
        }
    }

    /// Returns the size in bytes of one addressable unit (a pixel, or a block
    /// for compressed formats).
    pub fn block_size(&self) -> u32 {
        match self {
            TextureFormat::R8Unorm => 1,
            TextureFormat::Rg8Unorm => 2,
            TextureFormat::Rgba8Unorm
            | TextureFormat::Rgba8UnormSrgb
            | TextureFormat::Bgra8Unorm
            | TextureFormat::Bgra8UnormSrgb => 4,
            TextureFormat::Rgba16Float => 8,
            TextureFormat::Rgba32Float => 16,
            TextureFormat::Bc1RgbaUnorm
            | TextureFormat::Bc1RgbaUnormSrgb
            | TextureFormat::Bc4RUnorm => 8,
            TextureFormat::Bc2RgbaUnorm
            | TextureFormat::Bc2RgbaUnormSrgb
            | TextureFormat::Bc3RgbaUnorm
            | TextureFormat::Bc3RgbaUnormSrgb
            | TextureFormat::Bc5RgUnorm
            | TextureFormat::Bc6hRgbUfloat
            | TextureFormat::Bc7RgbaUnorm
            | TextureFormat::Bc7RgbaUnormSrgb => 16,
        }
    }

    /// Returns `true` if the format itself stores sRGB-encoded color.
    pub fn is_srgb(&self) -> bool {
        matches!(
            self,
            TextureFormat::Rgba8UnormSrgb
                | TextureFormat::Bgra8UnormSrgb
                | TextureFormat::Bc1RgbaUnormSrgb
                | TextureFormat::Bc2RgbaUnormSrgb
                | TextureFormat::Bc3RgbaUnormSrgb
                | TextureFormat::Bc7RgbaUnormSrgb
        )
    }

    /// Returns the sRGB variant of this format, or the format itself when no
    /// such variant exists.
    pub fn to_srgb(self) -> Self {
        match self {
            TextureFormat::Rgba8Unorm => TextureFormat::Rgba8UnormSrgb,
            TextureFormat::Bgra8Unorm => TextureFormat::Bgra8UnormSrgb,
            TextureFormat::Bc1RgbaUnorm => TextureFormat::Bc1RgbaUnormSrgb,
            TextureFormat::Bc2RgbaUnorm => TextureFormat::Bc2RgbaUnormSrgb,
            TextureFormat::Bc3RgbaUnorm => TextureFormat::Bc3RgbaUnormSrgb,
            TextureFormat::Bc7RgbaUnorm => TextureFormat::Bc7RgbaUnormSrgb,
            other => other,
        }
    }

    /// Number of bytes in one row of blocks (or pixels) for an image `width` wide.
    pub fn bytes_per_row(&self, width: u32) -> usize {
        let (block_w, _) = self.block_dimensions();
        width.div_ceil(block_w).max(1) as usize * self.block_size() as usize
    }

    /// Number of block rows (or pixel rows) for an image `height` tall.
    pub fn block_rows(&self, height: u32) -> usize {
        let (_, block_h) = self.block_dimensions();
        height.div_ceil(block_h).max(1) as usize
    }

    /// Size in bytes of one 2D slice (one layer of one mip level).
    pub fn slice_size(&self, width: u32, height: u32) -> usize {
        self.bytes_per_row(width) * self.block_rows(height)
    }
}

/// Returns the extent of `mip_level` for a base extent, never smaller than 1.
pub fn mip_extent(base: u32, mip_level: u32) -> u32 {
    base.checked_shr(mip_level).unwrap_or(0).max(1)
}
