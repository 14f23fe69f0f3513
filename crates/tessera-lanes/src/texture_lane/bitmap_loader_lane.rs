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

//! Decoder for the bitmap family (PNG, TGA, JPEG, BMP, GIF, HDR).

use super::block_flip::flip_vertically;
use super::slices::SliceStorage;
use anyhow::{Context, Result};
use image::{DynamicImage, ImageFormat};
use std::io::Read;
use tessera_core::texture::read_all;
use tessera_core::{
    DecodeError, FormatHandler, HandlerContext, InputTextureInfo, TextureFormat, TextureInfoFlags,
};

/// A lane dedicated to decoding bitmap files on the CPU.
///
/// Every input goes through the same codec path and comes out as one layer of
/// RGBA8 with a single mip. The sRGB flag is always set; only consumers of the
/// decoded texture may decide otherwise.
#[derive(Debug, Default)]
pub struct BitmapLoaderLane {
    format: Option<ImageFormat>,
    flip_vertically: bool,
    storage: SliceStorage,
}

impl BitmapLoaderLane {
    /// Creates a lane that guesses the bitmap format from the data itself.
    pub fn new(context: &HandlerContext) -> Self {
        Self {
            format: None,
            flip_vertically: context.flip_vertically,
            storage: SliceStorage::default(),
        }
    }

    /// Creates a lane for the bitmap format conventionally stored under
    /// `extension`. Formats without a signature (TGA) need this hint.
    pub fn for_extension(extension: &str, context: &HandlerContext) -> Self {
        Self {
            format: ImageFormat::from_extension(extension),
            ..Self::new(context)
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage> {
        let image = match self.format {
            Some(format) => image::load_from_memory_with_format(bytes, format),
            None => image::load_from_memory(bytes),
        };
        image.context("Failed to decode image from memory")
    }
}

impl FormatHandler for BitmapLoaderLane {
    fn container_kind(&self) -> &'static str {
        "bitmap"
    }

    fn load_data(
        &mut self,
        reader: &mut dyn Read,
        info: &mut InputTextureInfo,
    ) -> Result<(), DecodeError> {
        let bytes = read_all(reader)?;
        let image = self
            .decode(&bytes)
            .map_err(|e| DecodeError::Malformed(format!("{e:#}")))?;

        // Convert to RGBA8 (keep in sRGB space)
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        if width == 0 || height == 0 {
            return Err(DecodeError::Malformed("image has no pixels".into()));
        }

        *info = InputTextureInfo {
            width,
            height,
            layers: 1,
            mip_levels: 1,
            format: TextureFormat::Rgba8Unorm,
            flags: TextureInfoFlags::SRGB,
        };
        self.storage = SliceStorage::single(rgba.into_raw());

        if self.flip_vertically {
            let decoded = *info;
            flip_vertically(self, &decoded).map_err(|e| DecodeError::Flip(e.to_string()))?;
        }
        Ok(())
    }

    fn data_slice(&self, layer: u32, mip_level: u32) -> Option<&[u8]> {
        self.storage.get(layer, mip_level)
    }

    fn data_slice_mut(&mut self, layer: u32, mip_level: u32) -> Option<&mut [u8]> {
        self.storage.get_mut(layer, mip_level)
    }
}
