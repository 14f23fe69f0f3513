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

//! Parsers for block-compressed texture containers.
//!
//! Every parser returns a [`DecodedContainer`]: the normalized
//! [`InputTextureInfo`] plus slice storage ordered layer-major, whatever order
//! the container itself stores its faces and mips in.

pub mod dds;
pub mod ktx;

use super::slices::SliceStorage;
use tessera_core::{DecodeError, InputTextureInfo, TextureFormat, TextureInfoFlags};

/// The container families understood by [`decode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    /// DirectDraw Surface, legacy and DX10 headers.
    Dds,
    /// Khronos KTX 1.1.
    Ktx,
}

impl ContainerKind {
    /// Maps a file extension to a container family.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "dds" => Some(ContainerKind::Dds),
            "ktx" => Some(ContainerKind::Ktx),
            _ => None,
        }
    }

    /// Identifies the container family from its magic bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&dds::DDS_MAGIC) {
            Some(ContainerKind::Dds)
        } else if bytes.starts_with(&ktx::KTX_IDENTIFIER) {
            Some(ContainerKind::Ktx)
        } else {
            None
        }
    }

    /// Short lowercase name, also the conventional extension.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerKind::Dds => "dds",
            ContainerKind::Ktx => "ktx",
        }
    }
}

/// A fully parsed container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedContainer {
    /// What the container holds.
    pub kind: ContainerKind,
    /// The normalized description.
    pub info: InputTextureInfo,
    /// Pixel data, one entry per `(layer, mip)`.
    pub storage: SliceStorage,
}

/// Parses any supported container, detected from its magic bytes.
pub fn decode(bytes: &[u8]) -> Result<DecodedContainer, DecodeError> {
    match ContainerKind::sniff(bytes) {
        Some(ContainerKind::Dds) => dds::parse(bytes),
        Some(ContainerKind::Ktx) => ktx::parse(bytes),
        None => Err(DecodeError::Malformed(
            "unrecognized container signature".into(),
        )),
    }
}

/// How the layers of a container map onto [`InputTextureInfo::layers`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LayerLayout {
    pub layers: u32,
    pub cubemap: bool,
}

/// Resolves the layer count from a container's array, face and depth axes.
///
/// A texture is either layered or a cubemap. A lone depth-6 image with no
/// array layers is read as a cubemap whose faces are the depth slices.
pub(crate) fn resolve_layers(
    array_layers: u32,
    faces: u32,
    depth: u32,
    mip_levels: u32,
) -> Result<LayerLayout, DecodeError> {
    let array_layers = array_layers.max(1);
    match faces {
        0 | 1 => {}
        6 if array_layers == 1 && depth <= 1 => {
            return Ok(LayerLayout {
                layers: 6,
                cubemap: true,
            })
        }
        6 => {
            return Err(DecodeError::Unsupported(
                "cubemap arrays and volume cubemaps are not supported".into(),
            ))
        }
        n => return Err(DecodeError::Malformed(format!("invalid face count {n}"))),
    }

    if depth > 1 {
        if depth == 6 && array_layers == 1 && mip_levels == 1 {
            return Ok(LayerLayout {
                layers: 6,
                cubemap: true,
            });
        }
        return Err(DecodeError::Unsupported(format!(
            "volume textures (depth {depth}) are not supported"
        )));
    }

    Ok(LayerLayout {
        layers: array_layers,
        cubemap: false,
    })
}

/// Builds the normalized info, rejecting images with no usable data.
pub(crate) fn make_info(
    width: u32,
    height: u32,
    layout: LayerLayout,
    mip_levels: u32,
    format: TextureFormat,
    srgb: bool,
) -> Result<InputTextureInfo, DecodeError> {
    if width == 0 || height == 0 {
        return Err(DecodeError::Malformed(format!(
            "container reports an empty {width}x{height} image"
        )));
    }
    let mut flags = TextureInfoFlags::EMPTY;
    flags.set(TextureInfoFlags::SRGB, srgb);
    flags.set(TextureInfoFlags::CUBEMAP, layout.cubemap);
    Ok(InputTextureInfo {
        width,
        height,
        layers: layout.layers,
        mip_levels: mip_levels.max(1),
        format,
        flags,
    })
}

/// Checks the slice layout announced by a header against the bytes that
/// follow it, before anything is sized from those counts.
///
/// The mip chain may not be longer than the base extent allows, and the
/// tightly packed payload of every `(layer, mip)` slice must fit in
/// `available`.
pub(crate) fn check_payload(info: &InputTextureInfo, available: usize) -> Result<(), DecodeError> {
    let longest_chain = 32 - info.width.max(info.height).leading_zeros();
    if info.mip_levels > longest_chain {
        return Err(DecodeError::Malformed(format!(
            "{} mip levels for a {}x{} image, at most {longest_chain} fit",
            info.mip_levels, info.width, info.height
        )));
    }

    let per_layer = (0..info.mip_levels).try_fold(0usize, |total, mip_level| {
        let (width, height) = info.mip_size(mip_level);
        info.format
            .bytes_per_row(width)
            .checked_mul(info.format.block_rows(height))
            .and_then(|size| total.checked_add(size))
    });
    let required = per_layer.and_then(|size| size.checked_mul(info.layers as usize));
    match required {
        Some(required) if required <= available => Ok(()),
        Some(required) => Err(DecodeError::Malformed(format!(
            "{} layers of {} mips need {required} bytes, {available} remain",
            info.layers, info.mip_levels
        ))),
        None => Err(DecodeError::Malformed(format!(
            "{}x{} image with {} layers and {} mips overflows",
            info.width, info.height, info.layers, info.mip_levels
        ))),
    }
}

/// Returns `len` bytes at `offset`, or a truncation error naming `what`.
pub(crate) fn take<'a>(
    bytes: &'a [u8],
    offset: usize,
    len: usize,
    what: &str,
) -> Result<&'a [u8], DecodeError> {
    offset
        .checked_add(len)
        .and_then(|end| bytes.get(offset..end))
        .ok_or_else(|| {
            DecodeError::Malformed(format!(
                "truncated {what}: needs {len} bytes at offset {offset}, file has {}",
                bytes.len()
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn faces_make_a_cubemap_regardless_of_layers() {
        let layout = resolve_layers(0, 6, 1, 3).unwrap();
        assert_eq!(
            layout,
            LayerLayout {
                layers: 6,
                cubemap: true
            }
        );
    }

    #[test]
    fn depth_six_sentinel_is_a_cubemap() {
        let layout = resolve_layers(0, 1, 6, 1).unwrap();
        assert!(layout.cubemap);
        assert_eq!(layout.layers, 6);

        assert!(resolve_layers(0, 1, 6, 2).is_err(), "mipped volumes stay volumes");
        assert!(resolve_layers(2, 1, 6, 1).is_err());
        assert!(resolve_layers(1, 1, 4, 1).is_err());
    }

    #[test]
    fn cube_arrays_are_rejected() {
        assert!(matches!(
            resolve_layers(2, 6, 1, 1),
            Err(DecodeError::Unsupported(_))
        ));
        assert!(matches!(
            resolve_layers(1, 3, 1, 1),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn unknown_signature_is_malformed() {
        assert!(matches!(
            decode(b"not a texture"),
            Err(DecodeError::Malformed(_))
        ));
    }

    fn info(width: u32, height: u32, layers: u32, mip_levels: u32) -> InputTextureInfo {
        InputTextureInfo {
            width,
            height,
            layers,
            mip_levels,
            format: TextureFormat::Bc1RgbaUnorm,
            flags: TextureInfoFlags::EMPTY,
        }
    }

    #[test]
    fn payload_must_fit_the_remaining_bytes() {
        // 8x8 BC1: 32 + 8 + 8 + 8 bytes per layer.
        assert!(check_payload(&info(8, 8, 2, 4), 112).is_ok());
        assert!(matches!(
            check_payload(&info(8, 8, 2, 4), 111),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn oversized_counts_are_rejected_without_overflow() {
        assert!(check_payload(&info(8, 8, 1, 5), usize::MAX).is_err());
        assert!(check_payload(&info(4, 4, u32::MAX, 1), 64).is_err());
        assert!(check_payload(&info(u32::MAX, u32::MAX, u32::MAX, 32), usize::MAX).is_err());
    }

    #[test]
    fn take_reports_truncation() {
        let bytes = [0u8; 8];
        assert_eq!(take(&bytes, 2, 4, "header").unwrap().len(), 4);
        assert!(take(&bytes, 6, 4, "header").is_err());
        assert!(take(&bytes, usize::MAX, 4, "header").is_err());
    }
}
