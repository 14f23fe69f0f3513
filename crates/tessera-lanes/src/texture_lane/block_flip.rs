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

//! Vertical flip of decoded texture data that respects block geometry.
//!
//! Reversing rows of bytes corrupts block-compressed data: each block encodes a
//! 4x4 tile, so the block rows must be reversed *and* the pixel rows inside each
//! block reordered. Every slice is copied into a [`SliceView`] sized from the
//! format and extent, flipped there with the format's own primitive and copied
//! back. A slice whose decoded size disagrees with the view is left untouched.

use tessera_core::{FormatHandler, InputTextureInfo, TextureFormat};
use thiserror::Error;

/// An error that prevents the whole texture from being flipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlipError {
    /// The format has no flip that preserves its block encoding.
    #[error("format {0:?} cannot be flipped without re-encoding its blocks")]
    UnsupportedFormat(TextureFormat),
}

/// Outcome of a flip over every slice of a texture.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlipReport {
    /// Slices that were flipped.
    pub flipped: usize,
    /// Slices left untouched because their size did not match the format.
    pub skipped: usize,
}

/// Returns `true` if [`flip_vertically`] can handle `format`.
pub fn supports_flip(format: TextureFormat) -> bool {
    !matches!(
        format,
        TextureFormat::Bc6hRgbUfloat | TextureFormat::Bc7RgbaUnorm | TextureFormat::Bc7RgbaUnormSrgb
    )
}

/// Flips every `(layer, mip)` slice held by `handler` upside down.
pub fn flip_vertically<H>(handler: &mut H, info: &InputTextureInfo) -> Result<FlipReport, FlipError>
where
    H: FormatHandler + ?Sized,
{
    if !supports_flip(info.format) {
        return Err(FlipError::UnsupportedFormat(info.format));
    }

    let mut report = FlipReport::default();
    for (layer, mip_level) in info.slices() {
        let (width, height) = info.mip_size(mip_level);
        let mut view = SliceView::new(info.format, width, height);

        let Some(source) = handler.data_slice(layer, mip_level) else {
            log::error!("Flip: slice (layer {layer}, mip {mip_level}) is missing, skipping it");
            report.skipped += 1;
            continue;
        };
        if source.len() != view.len() {
            log::error!(
                "Flip: slice (layer {layer}, mip {mip_level}) holds {} bytes but a {}x{} {:?} slice needs {}, skipping it",
                source.len(),
                width,
                height,
                info.format,
                view.len()
            );
            report.skipped += 1;
            continue;
        }

        view.bytes.copy_from_slice(source);
        view.flip();

        if let Some(target) = handler.data_slice_mut(layer, mip_level) {
            target.copy_from_slice(&view.bytes);
            report.flipped += 1;
        }
    }
    Ok(report)
}

/// A single 2D slice laid out the way its format dictates.
#[derive(Debug)]
struct SliceView {
    format: TextureFormat,
    height: u32,
    bytes: Vec<u8>,
}

impl SliceView {
    fn new(format: TextureFormat, width: u32, height: u32) -> Self {
        Self {
            format,
            height,
            bytes: vec![0; format.slice_size(width, height)],
        }
    }

    fn len(&self) -> usize {
        self.bytes.len()
    }

    fn row_bytes(&self) -> usize {
        self.bytes.len() / self.format.block_rows(self.height)
    }

    fn flip(&mut self) {
        let row_bytes = self.row_bytes();
        let rows = self.format.block_rows(self.height);
        for top in 0..rows / 2 {
            let bottom = rows - 1 - top;
            let (head, tail) = self.bytes.split_at_mut(bottom * row_bytes);
            head[top * row_bytes..(top + 1) * row_bytes].swap_with_slice(&mut tail[..row_bytes]);
        }

        if self.format.is_compressed() {
            // Only the first `height` pixel rows of a lone block row are real.
            let valid_rows = self.height.min(4) as usize;
            let block_size = self.format.block_size() as usize;
            for block in self.bytes.chunks_exact_mut(block_size) {
                flip_block(self.format, block, valid_rows);
            }
        }
    }
}

fn flip_block(format: TextureFormat, block: &mut [u8], rows: usize) {
    match format {
        TextureFormat::Bc1RgbaUnorm | TextureFormat::Bc1RgbaUnormSrgb => {
            flip_color_block(block, rows)
        }
        TextureFormat::Bc2RgbaUnorm | TextureFormat::Bc2RgbaUnormSrgb => {
            flip_explicit_alpha_block(&mut block[..8], rows);
            flip_color_block(&mut block[8..], rows);
        }
        TextureFormat::Bc3RgbaUnorm | TextureFormat::Bc3RgbaUnormSrgb => {
            flip_interpolated_block(&mut block[..8], rows);
            flip_color_block(&mut block[8..], rows);
        }
        TextureFormat::Bc4RUnorm => flip_interpolated_block(block, rows),
        TextureFormat::Bc5RgUnorm => {
            flip_interpolated_block(&mut block[..8], rows);
            flip_interpolated_block(&mut block[8..], rows);
        }
        _ => {}
    }
}

/// BC1 color block: two RGB565 endpoints followed by one index byte per row.
fn flip_color_block(block: &mut [u8], rows: usize) {
    block[4..4 + rows].reverse();
}

/// BC2 alpha block: one little-endian u16 of 4-bit alphas per row.
fn flip_explicit_alpha_block(block: &mut [u8], rows: usize) {
    for top in 0..rows / 2 {
        let bottom = rows - 1 - top;
        block.swap(top * 2, bottom * 2);
        block.swap(top * 2 + 1, bottom * 2 + 1);
    }
}

/// BC3/BC4 alpha block: two endpoints and 48 bits of 3-bit indices, 12 bits
/// per row.
fn flip_interpolated_block(block: &mut [u8], rows: usize) {
    let mut bits = 0u64;
    for (i, byte) in block[2..8].iter().enumerate() {
        bits |= (*byte as u64) << (8 * i);
    }

    let row = |r: usize| (bits >> (12 * r)) & 0xFFF;
    let mut flipped = 0u64;
    for r in 0..4 {
        let source = if r < rows { rows - 1 - r } else { r };
        flipped |= row(source) << (12 * r);
    }

    for (i, byte) in block[2..8].iter_mut().enumerate() {
        *byte = (flipped >> (8 * i)) as u8;
    }
}
