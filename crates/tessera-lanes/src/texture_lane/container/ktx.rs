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

//! Khronos KTX 1.1 parsing.
//!
//! KTX stores mip levels outermost, then array elements, faces and depth
//! slices. Uncompressed rows are padded to 4 bytes. Both are normalized here.

use super::{check_payload, make_info, resolve_layers, take, ContainerKind, DecodedContainer};
use crate::texture_lane::slices::SliceStorage;
use tessera_core::{DecodeError, TextureFormat};

/// The 12-byte file identifier.
pub const KTX_IDENTIFIER: [u8; 12] = [
    0xAB, 0x4B, 0x54, 0x58, 0x20, 0x31, 0x31, 0xBB, 0x0D, 0x0A, 0x1A, 0x0A,
];

const HEADER_WORDS: usize = 13;
const HEADER_SIZE: usize = KTX_IDENTIFIER.len() + HEADER_WORDS * 4;
const ENDIAN_REF: u32 = 0x0403_0201;

// OpenGL enums
const GL_UNSIGNED_BYTE: u32 = 0x1401;
const GL_RGBA: u32 = 0x1908;
const GL_R8: u32 = 0x8229;
const GL_RG8: u32 = 0x822B;
const GL_RGBA8: u32 = 0x8058;
const GL_SRGB8_ALPHA8: u32 = 0x8C43;
const GL_RGBA16F: u32 = 0x881A;
const GL_RGBA32F: u32 = 0x8814;
const GL_COMPRESSED_RGB_S3TC_DXT1: u32 = 0x83F0;
const GL_COMPRESSED_RGBA_S3TC_DXT1: u32 = 0x83F1;
const GL_COMPRESSED_RGBA_S3TC_DXT3: u32 = 0x83F2;
const GL_COMPRESSED_RGBA_S3TC_DXT5: u32 = 0x83F3;
const GL_COMPRESSED_SRGB_S3TC_DXT1: u32 = 0x8C4C;
const GL_COMPRESSED_SRGB_ALPHA_S3TC_DXT1: u32 = 0x8C4D;
const GL_COMPRESSED_SRGB_ALPHA_S3TC_DXT3: u32 = 0x8C4E;
const GL_COMPRESSED_SRGB_ALPHA_S3TC_DXT5: u32 = 0x8C4F;
const GL_COMPRESSED_RED_RGTC1: u32 = 0x8DBB;
const GL_COMPRESSED_RG_RGTC2: u32 = 0x8DBD;
const GL_COMPRESSED_RGBA_BPTC_UNORM: u32 = 0x8E8C;
const GL_COMPRESSED_SRGB_ALPHA_BPTC_UNORM: u32 = 0x8E8D;
const GL_COMPRESSED_RGB_BPTC_UNSIGNED_FLOAT: u32 = 0x8E8F;

#[derive(Debug, Clone, Copy)]
struct KtxHeader {
    endianness: u32,
    gl_type: u32,
    gl_internal_format: u32,
    width: u32,
    height: u32,
    depth: u32,
    array_elements: u32,
    faces: u32,
    mip_levels: u32,
    key_value_bytes: u32,
}

impl KtxHeader {
    fn read(bytes: &[u8]) -> Result<Self, DecodeError> {
        let raw = take(bytes, KTX_IDENTIFIER.len(), HEADER_WORDS * 4, "KTX header")?;
        let word = |i: usize| {
            u32::from_le_bytes([raw[i * 4], raw[i * 4 + 1], raw[i * 4 + 2], raw[i * 4 + 3]])
        };
        Ok(Self {
            endianness: word(0),
            gl_type: word(1),
            gl_internal_format: word(4),
            width: word(6),
            height: word(7),
            depth: word(8),
            array_elements: word(9),
            faces: word(10),
            mip_levels: word(11),
            key_value_bytes: word(12),
        })
    }
}

fn align4(n: usize) -> usize {
    (n + 3) & !3
}

/// Parses a little-endian KTX 1.1 file held entirely in memory.
pub fn parse(bytes: &[u8]) -> Result<DecodedContainer, DecodeError> {
    if !bytes.starts_with(&KTX_IDENTIFIER) {
        return Err(DecodeError::Malformed("missing KTX identifier".into()));
    }
    let header = KtxHeader::read(bytes)?;
    if header.endianness != ENDIAN_REF {
        return Err(DecodeError::Unsupported(
            "big-endian KTX files are not supported".into(),
        ));
    }

    let (format, srgb) = gl_format(header.gl_internal_format, header.gl_type)?;
    let mip_levels = header.mip_levels.max(1);
    let depth = header.depth.max(1);
    let layout = resolve_layers(header.array_elements, header.faces, depth, mip_levels)?;
    let info = make_info(
        header.width,
        header.height.max(1),
        layout,
        mip_levels,
        format,
        srgb,
    )?;

    // Only a non-array cubemap stores one imageSize per face.
    let per_face_size = header.faces == 6 && header.array_elements == 0;

    let mut offset = HEADER_SIZE + header.key_value_bytes as usize;
    check_payload(&info, bytes.len().saturating_sub(offset))?;

    let mut by_mip: Vec<Vec<Vec<u8>>> = Vec::new();
    for mip_level in 0..mip_levels {
        let image_size = u32::from_le_bytes(
            take(bytes, offset, 4, "KTX imageSize")?
                .try_into()
                .map_err(|_| DecodeError::Malformed("KTX imageSize".into()))?,
        ) as usize;
        offset += 4;

        if image_size == 0 {
            return Err(DecodeError::Malformed(format!(
                "KTX mip {mip_level} has an empty imageSize"
            )));
        }

        let (width, height) = info.mip_size(mip_level);
        let mut layers = Vec::new();
        if per_face_size {
            for face in 0..info.layers {
                let what = format!("KTX face {face} of mip {mip_level}");
                let data = take(bytes, offset, image_size, &what)?;
                layers.push(unpad_rows(data, format, width, height)?);
                offset += align4(image_size);
            }
        } else {
            let what = format!("KTX mip {mip_level}");
            let data = take(bytes, offset, image_size, &what)?;
            if image_size % info.layers as usize != 0 {
                return Err(DecodeError::Malformed(format!(
                    "KTX mip {mip_level} size {image_size} does not split into {} layers",
                    info.layers
                )));
            }
            for chunk in data.chunks_exact(image_size / info.layers as usize) {
                layers.push(unpad_rows(chunk, format, width, height)?);
            }
            offset += align4(image_size);
        }
        by_mip.push(layers);
    }

    // Mip-major to layer-major.
    let mut slices = Vec::new();
    for layer in 0..info.layers as usize {
        for mip in by_mip.iter_mut() {
            slices.push(std::mem::take(&mut mip[layer]));
        }
    }

    let storage = SliceStorage::from_layer_major(info.layers, info.mip_levels, slices)
        .ok_or_else(|| DecodeError::Malformed("KTX slice count mismatch".into()))?;
    Ok(DecodedContainer {
        kind: ContainerKind::Ktx,
        info,
        storage,
    })
}

/// Strips the 4-byte row alignment of uncompressed data and checks the size
/// of the resulting slice.
fn unpad_rows(
    data: &[u8],
    format: TextureFormat,
    width: u32,
    height: u32,
) -> Result<Vec<u8>, DecodeError> {
    let tight = format.slice_size(width, height);
    if data.len() == tight {
        return Ok(data.to_vec());
    }

    let row = format.bytes_per_row(width);
    let padded_row = align4(row);
    let rows = format.block_rows(height);
    if !format.is_compressed() && data.len() == padded_row * rows {
        return Ok(data
            .chunks_exact(padded_row)
            .flat_map(|r| &r[..row])
            .copied()
            .collect());
    }

    Err(DecodeError::Malformed(format!(
        "KTX image holds {} bytes, a {width}x{height} {format:?} slice needs {tight}",
        data.len()
    )))
}

fn gl_format(internal: u32, gl_type: u32) -> Result<(TextureFormat, bool), DecodeError> {
    let mapped = match internal {
        GL_R8 => (TextureFormat::R8Unorm, false),
        GL_RG8 => (TextureFormat::Rg8Unorm, false),
        GL_RGBA8 => (TextureFormat::Rgba8Unorm, false),
        GL_RGBA if gl_type == GL_UNSIGNED_BYTE => (TextureFormat::Rgba8Unorm, false),
        GL_SRGB8_ALPHA8 => (TextureFormat::Rgba8Unorm, true),
        GL_RGBA16F => (TextureFormat::Rgba16Float, false),
        GL_RGBA32F => (TextureFormat::Rgba32Float, false),
        GL_COMPRESSED_RGB_S3TC_DXT1 | GL_COMPRESSED_RGBA_S3TC_DXT1 => {
            (TextureFormat::Bc1RgbaUnorm, false)
        }
        GL_COMPRESSED_SRGB_S3TC_DXT1 | GL_COMPRESSED_SRGB_ALPHA_S3TC_DXT1 => {
            (TextureFormat::Bc1RgbaUnorm, true)
        }
        GL_COMPRESSED_RGBA_S3TC_DXT3 => (TextureFormat::Bc2RgbaUnorm, false),
        GL_COMPRESSED_SRGB_ALPHA_S3TC_DXT3 => (TextureFormat::Bc2RgbaUnorm, true),
        GL_COMPRESSED_RGBA_S3TC_DXT5 => (TextureFormat::Bc3RgbaUnorm, false),
        GL_COMPRESSED_SRGB_ALPHA_S3TC_DXT5 => (TextureFormat::Bc3RgbaUnorm, true),
        GL_COMPRESSED_RED_RGTC1 => (TextureFormat::Bc4RUnorm, false),
        GL_COMPRESSED_RG_RGTC2 => (TextureFormat::Bc5RgUnorm, false),
        GL_COMPRESSED_RGBA_BPTC_UNORM => (TextureFormat::Bc7RgbaUnorm, false),
        GL_COMPRESSED_SRGB_ALPHA_BPTC_UNORM => (TextureFormat::Bc7RgbaUnorm, true),
        GL_COMPRESSED_RGB_BPTC_UNSIGNED_FLOAT => (TextureFormat::Bc6hRgbUfloat, false),
        other => {
            return Err(DecodeError::Unsupported(format!(
                "KTX glInternalFormat {other:#x}"
            )))
        }
    };
    Ok(mapped)
}

/// Byte-level KTX writers shared by the tests of this crate.
#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// A header for `internal` with the given axes and no key/value data.
    pub fn header(
        internal: u32,
        width: u32,
        height: u32,
        array_elements: u32,
        faces: u32,
        mips: u32,
    ) -> Vec<u8> {
        let compressed = !matches!(internal, GL_R8 | GL_RG8 | GL_RGBA8 | GL_SRGB8_ALPHA8);
        let words = [
            ENDIAN_REF,
            if compressed { 0 } else { GL_UNSIGNED_BYTE },
            1,
            0,
            internal,
            0,
            width,
            height,
            0,
            array_elements,
            faces,
            mips,
            0,
        ];
        let mut bytes = KTX_IDENTIFIER.to_vec();
        for word in words {
            bytes.extend_from_slice(&word.to_le_bytes());
        }
        bytes
    }

    pub fn push_image(bytes: &mut Vec<u8>, data: &[u8]) {
        bytes.extend_from_slice(&(data.len() as u32).to_le_bytes());
        bytes.extend_from_slice(data);
        bytes.resize(align4(bytes.len()), 0);
    }

    /// A 4x4 BC1 cubemap with one imageSize per face; face `n` holds byte `n`.
    pub fn bc1_cubemap() -> Vec<u8> {
        let mut bytes = header(GL_COMPRESSED_RGBA_S3TC_DXT1, 4, 4, 0, 6, 1);
        for face in 0..6u8 {
            push_image(&mut bytes, &[face; 8]);
        }
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn cubemap_faces_become_layers() {
        let decoded = parse(&bc1_cubemap()).unwrap();
        assert_eq!(decoded.kind, ContainerKind::Ktx);
        assert!(decoded.info.is_cubemap());
        assert_eq!(decoded.info.layers, 6);
        assert_eq!(decoded.info.format, TextureFormat::Bc1RgbaUnorm);
        for face in 0..6u8 {
            assert_eq!(decoded.storage.get(face as u32, 0).unwrap(), &[face; 8]);
        }
    }

    #[test]
    fn mip_major_array_is_reordered_layer_major() {
        // 8x8 BC3, 2 elements, 2 mips: mip0 = 2x64 bytes, mip1 = 2x16 bytes.
        let mut bytes = header(GL_COMPRESSED_RGBA_S3TC_DXT5, 8, 8, 2, 1, 2);
        let mut mip0 = vec![0xA0; 64];
        mip0.extend_from_slice(&[0xA1; 64]);
        push_image(&mut bytes, &mip0);
        let mut mip1 = vec![0xB0; 16];
        mip1.extend_from_slice(&[0xB1; 16]);
        push_image(&mut bytes, &mip1);

        let decoded = parse(&bytes).unwrap();
        assert_eq!(decoded.info.layers, 2);
        assert_eq!(decoded.info.mip_levels, 2);
        assert_eq!(decoded.storage.get(0, 0).unwrap(), &[0xA0; 64][..]);
        assert_eq!(decoded.storage.get(0, 1).unwrap(), &[0xB0; 16][..]);
        assert_eq!(decoded.storage.get(1, 0).unwrap(), &[0xA1; 64][..]);
        assert_eq!(decoded.storage.get(1, 1).unwrap(), &[0xB1; 16][..]);
    }

    #[test]
    fn padded_rows_are_stripped() {
        // 3x2 R8: rows of 3 bytes padded to 4.
        let mut bytes = header(GL_R8, 3, 2, 0, 1, 1);
        push_image(&mut bytes, &[1, 2, 3, 0, 4, 5, 6, 0]);

        let decoded = parse(&bytes).unwrap();
        assert_eq!(decoded.storage.get(0, 0).unwrap(), &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn srgb_internal_format_sets_flag() {
        let mut bytes = header(GL_SRGB8_ALPHA8, 1, 1, 0, 1, 1);
        push_image(&mut bytes, &[1, 2, 3, 4]);
        let decoded = parse(&bytes).unwrap();
        assert!(decoded.info.is_srgb());
        assert_eq!(decoded.info.format, TextureFormat::Rgba8Unorm);
    }

    #[test]
    fn big_endian_is_unsupported() {
        let mut bytes = header(GL_RGBA8, 1, 1, 0, 1, 1);
        bytes[12..16].copy_from_slice(&ENDIAN_REF.to_be_bytes());
        push_image(&mut bytes, &[0; 4]);
        assert!(matches!(parse(&bytes), Err(DecodeError::Unsupported(_))));
    }

    #[test]
    fn huge_mip_count_is_malformed() {
        let mut bytes = header(GL_RGBA8, 4, 4, 0, 1, u32::MAX);
        push_image(&mut bytes, &[0; 64]);
        assert!(matches!(parse(&bytes), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn huge_array_count_is_malformed() {
        let mut bytes = header(GL_RGBA8, 4, 4, u32::MAX, 1, 1);
        push_image(&mut bytes, &[0; 64]);
        assert!(matches!(parse(&bytes), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn empty_image_size_is_malformed() {
        // Enough trailing bytes for the payload check, but imageSize says 0.
        let mut bytes = header(GL_RGBA8, 1, 1, 0, 1, 1);
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&[0; 4]);
        assert!(matches!(parse(&bytes), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn truncated_level_is_malformed() {
        let mut bytes = header(GL_COMPRESSED_RGBA_S3TC_DXT1, 8, 8, 0, 1, 2);
        push_image(&mut bytes, &[0; 32]);
        bytes.extend_from_slice(&8u32.to_le_bytes());
        bytes.extend_from_slice(&[0; 4]);
        assert!(matches!(parse(&bytes), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn missing_image_data_is_malformed() {
        let bytes = header(GL_RGBA8, 2, 2, 0, 1, 1);
        assert!(matches!(parse(&bytes), Err(DecodeError::Malformed(_))));
    }
}
