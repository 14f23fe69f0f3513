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

//! DirectDraw Surface parsing.

use super::{check_payload, make_info, resolve_layers, take, ContainerKind, DecodedContainer};
use crate::texture_lane::slices::SliceStorage;
use bytemuck::{Pod, Zeroable};
use tessera_core::{DecodeError, TextureFormat};

/// Magic bytes every DDS file starts with.
pub const DDS_MAGIC: [u8; 4] = *b"DDS ";

const HEADER_SIZE: usize = 124;
const DX10_HEADER_SIZE: usize = 20;

// Header flags
const DDSD_MIPMAPCOUNT: u32 = 0x2_0000;
const DDSD_DEPTH: u32 = 0x80_0000;

// Pixel format flags
const DDPF_FOURCC: u32 = 0x4;
const DDPF_RGB: u32 = 0x40;
const DDPF_LUMINANCE: u32 = 0x2_0000;

// Caps2
const DDSCAPS2_CUBEMAP: u32 = 0x200;
const DDSCAPS2_CUBEMAP_ALLFACES: u32 = 0xFC00;

// DX10 misc flag
const DDS_RESOURCE_MISC_TEXTURECUBE: u32 = 0x4;

const fn fourcc(code: &[u8; 4]) -> u32 {
    u32::from_le_bytes(*code)
}

const FOURCC_DX10: u32 = fourcc(b"DX10");

/// The 124-byte header following the magic.
#[allow(dead_code)]
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct DdsHeader {
    size: u32,
    flags: u32,
    height: u32,
    width: u32,
    pitch_or_linear_size: u32,
    depth: u32,
    mip_map_count: u32,
    reserved1: [u32; 11],
    pixel_format: DdsPixelFormat,
    caps: u32,
    caps2: u32,
    caps3: u32,
    caps4: u32,
    reserved2: u32,
}

#[allow(dead_code)]
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct DdsPixelFormat {
    size: u32,
    flags: u32,
    four_cc: u32,
    rgb_bit_count: u32,
    r_mask: u32,
    g_mask: u32,
    b_mask: u32,
    a_mask: u32,
}

#[allow(dead_code)]
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct Dx10Header {
    dxgi_format: u32,
    resource_dimension: u32,
    misc_flag: u32,
    array_size: u32,
    misc_flags2: u32,
}

/// Reads a little-endian `#[repr(C)]` struct made only of `u32` words.
fn read_words<T: Pod, const N: usize>(bytes: &[u8]) -> T {
    let words: [u32; N] = bytemuck::pod_read_unaligned(bytes);
    bytemuck::cast(words.map(u32::from_le))
}

/// Parses a DDS file held entirely in memory.
pub fn parse(bytes: &[u8]) -> Result<DecodedContainer, DecodeError> {
    if !bytes.starts_with(&DDS_MAGIC) {
        return Err(DecodeError::Malformed("missing DDS magic".into()));
    }
    let header: DdsHeader = read_words::<_, 31>(take(bytes, 4, HEADER_SIZE, "DDS header")?);
    if header.size as usize != HEADER_SIZE {
        return Err(DecodeError::Malformed(format!(
            "DDS header size is {}, expected {HEADER_SIZE}",
            header.size
        )));
    }

    let mut offset = 4 + HEADER_SIZE;
    let dx10 = if header.pixel_format.flags & DDPF_FOURCC != 0
        && header.pixel_format.four_cc == FOURCC_DX10
    {
        let dx10: Dx10Header =
            read_words::<_, 5>(take(bytes, offset, DX10_HEADER_SIZE, "DX10 header")?);
        offset += DX10_HEADER_SIZE;
        Some(dx10)
    } else {
        None
    };

    let (format, srgb) = match &dx10 {
        Some(dx10) => dxgi_format(dx10.dxgi_format)?,
        None => (legacy_format(&header.pixel_format)?, false),
    };

    let mip_levels = if header.flags & DDSD_MIPMAPCOUNT != 0 {
        header.mip_map_count.max(1)
    } else {
        1
    };
    let depth = if header.flags & DDSD_DEPTH != 0 {
        header.depth.max(1)
    } else {
        1
    };
    let (array_layers, faces) = match &dx10 {
        Some(dx10) if dx10.misc_flag & DDS_RESOURCE_MISC_TEXTURECUBE != 0 => (dx10.array_size, 6),
        Some(dx10) => (dx10.array_size, 1),
        None if header.caps2 & DDSCAPS2_CUBEMAP != 0 => {
            if header.caps2 & DDSCAPS2_CUBEMAP_ALLFACES != DDSCAPS2_CUBEMAP_ALLFACES {
                return Err(DecodeError::Unsupported(
                    "partial cubemaps are not supported".into(),
                ));
            }
            (1, 6)
        }
        None => (1, 1),
    };

    let layout = resolve_layers(array_layers, faces, depth, mip_levels)?;
    let info = make_info(
        header.width,
        header.height,
        layout,
        mip_levels,
        format,
        srgb,
    )?;

    check_payload(&info, bytes.len().saturating_sub(offset))?;

    // Faces (or array layers, or depth slices) are stored one after another,
    // each with its full mip chain: already layer-major.
    let mut slices = Vec::new();
    for (layer, mip_level) in info.slices() {
        let size = info.slice_size(mip_level);
        let what = format!("DDS slice (layer {layer}, mip {mip_level})");
        slices.push(take(bytes, offset, size, &what)?.to_vec());
        offset += size;
    }
    if offset < bytes.len() {
        log::debug!(
            "DDS: ignoring {} trailing bytes after the last slice",
            bytes.len() - offset
        );
    }

    let storage = SliceStorage::from_layer_major(info.layers, info.mip_levels, slices)
        .ok_or_else(|| DecodeError::Malformed("DDS slice count mismatch".into()))?;
    Ok(DecodedContainer {
        kind: ContainerKind::Dds,
        info,
        storage,
    })
}

fn legacy_format(pf: &DdsPixelFormat) -> Result<TextureFormat, DecodeError> {
    if pf.flags & DDPF_FOURCC != 0 {
        let format = match pf.four_cc {
            code if code == fourcc(b"DXT1") => TextureFormat::Bc1RgbaUnorm,
            code if code == fourcc(b"DXT2") || code == fourcc(b"DXT3") => {
                TextureFormat::Bc2RgbaUnorm
            }
            code if code == fourcc(b"DXT4") || code == fourcc(b"DXT5") => {
                TextureFormat::Bc3RgbaUnorm
            }
            code if code == fourcc(b"ATI1") || code == fourcc(b"BC4U") => TextureFormat::Bc4RUnorm,
            code if code == fourcc(b"ATI2") || code == fourcc(b"BC5U") => {
                TextureFormat::Bc5RgUnorm
            }
            code => {
                return Err(DecodeError::Unsupported(format!(
                    "DDS FourCC {:?}",
                    String::from_utf8_lossy(&code.to_le_bytes())
                )))
            }
        };
        return Ok(format);
    }

    let masks = (pf.r_mask, pf.g_mask, pf.b_mask, pf.a_mask);
    if pf.flags & DDPF_RGB != 0 && pf.rgb_bit_count == 32 {
        match masks {
            (0x0000_00FF, 0x0000_FF00, 0x00FF_0000, _) => return Ok(TextureFormat::Rgba8Unorm),
            (0x00FF_0000, 0x0000_FF00, 0x0000_00FF, _) => return Ok(TextureFormat::Bgra8Unorm),
            _ => {}
        }
    }
    if pf.flags & DDPF_LUMINANCE != 0 && pf.rgb_bit_count == 8 {
        return Ok(TextureFormat::R8Unorm);
    }

    Err(DecodeError::Unsupported(format!(
        "DDS pixel format (flags {:#x}, {} bits, masks {:#x?})",
        pf.flags, pf.rgb_bit_count, masks
    )))
}

/// Maps a `DXGI_FORMAT` to a format and its sRGB-ness.
fn dxgi_format(dxgi: u32) -> Result<(TextureFormat, bool), DecodeError> {
    let mapped = match dxgi {
        2 => (TextureFormat::Rgba32Float, false),
        10 => (TextureFormat::Rgba16Float, false),
        27 | 28 => (TextureFormat::Rgba8Unorm, false),
        29 => (TextureFormat::Rgba8Unorm, true),
        49 => (TextureFormat::Rg8Unorm, false),
        61 => (TextureFormat::R8Unorm, false),
        70 | 71 => (TextureFormat::Bc1RgbaUnorm, false),
        72 => (TextureFormat::Bc1RgbaUnorm, true),
        73 | 74 => (TextureFormat::Bc2RgbaUnorm, false),
        75 => (TextureFormat::Bc2RgbaUnorm, true),
        76 | 77 => (TextureFormat::Bc3RgbaUnorm, false),
        78 => (TextureFormat::Bc3RgbaUnorm, true),
        79 | 80 => (TextureFormat::Bc4RUnorm, false),
        82 | 83 => (TextureFormat::Bc5RgUnorm, false),
        87 | 90 => (TextureFormat::Bgra8Unorm, false),
        91 => (TextureFormat::Bgra8Unorm, true),
        94 | 95 => (TextureFormat::Bc6hRgbUfloat, false),
        97 | 98 => (TextureFormat::Bc7RgbaUnorm, false),
        99 => (TextureFormat::Bc7RgbaUnorm, true),
        other => return Err(DecodeError::Unsupported(format!("DXGI format {other}"))),
    };
    Ok(mapped)
}
