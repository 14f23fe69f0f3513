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

//! Decoder for block-compressed texture containers (DDS, KTX).

use super::block_flip::flip_vertically;
use super::container::{self, ContainerKind};
use super::slices::SliceStorage;
use std::io::Read;
use tessera_core::texture::read_all;
use tessera_core::{DecodeError, FormatHandler, HandlerContext, InputTextureInfo};

/// A lane that decodes DDS and KTX containers into per-slice storage.
///
/// The container family is detected from the data. The extension the lane was
/// created for is only used to name the container before anything was read.
#[derive(Debug)]
pub struct ContainerLoaderLane {
    kind: ContainerKind,
    flip_vertically: bool,
    storage: SliceStorage,
}

impl ContainerLoaderLane {
    /// Creates a lane expecting a DDS file.
    pub fn new(context: &HandlerContext) -> Self {
        Self {
            kind: ContainerKind::Dds,
            flip_vertically: context.flip_vertically,
            storage: SliceStorage::default(),
        }
    }

    /// Creates a lane expecting the container stored under `extension`.
    pub fn for_extension(extension: &str, context: &HandlerContext) -> Self {
        Self {
            kind: ContainerKind::from_extension(extension).unwrap_or(ContainerKind::Dds),
            ..Self::new(context)
        }
    }
}

impl FormatHandler for ContainerLoaderLane {
    fn container_kind(&self) -> &'static str {
        self.kind.as_str()
    }

    fn load_data(
        &mut self,
        reader: &mut dyn Read,
        info: &mut InputTextureInfo,
    ) -> Result<(), DecodeError> {
        let bytes = read_all(reader)?;
        let decoded = container::decode(&bytes)?;
        if decoded.kind != self.kind {
            log::debug!(
                "Container announced as {} holds {} data",
                self.kind.as_str(),
                decoded.kind.as_str()
            );
        }

        self.kind = decoded.kind;
        self.storage = decoded.storage;
        *info = decoded.info;

        if self.flip_vertically {
            let decoded = *info;
            let report =
                flip_vertically(self, &decoded).map_err(|e| DecodeError::Flip(e.to_string()))?;
            if report.skipped > 0 {
                log::warn!(
                    "Flip left {} of {} slices untouched",
                    report.skipped,
                    report.skipped + report.flipped
                );
            }
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

#[cfg(test)]
mod tests {
    use super::container::{dds, ktx};
    use super::*;
    use std::io::Cursor;
    use tessera_core::TextureFormat;

    fn load(
        bytes: &[u8],
        extension: &str,
        flip: bool,
    ) -> Result<(ContainerLoaderLane, InputTextureInfo), DecodeError> {
        let context = HandlerContext {
            flip_vertically: flip,
        };
        let mut lane = ContainerLoaderLane::for_extension(extension, &context);
        let mut info = InputTextureInfo::default();
        lane.load_data(&mut Cursor::new(bytes), &mut info)?;
        Ok((lane, info))
    }

    /// A 4x8 BC1 image: two blocks stacked vertically, each with distinct
    /// endpoints and index rows.
    fn two_block_bc1() -> Vec<u8> {
        let mut bytes = dds::fixtures::header(4, 8, 1, b"DXT1");
        bytes.extend_from_slice(&[0x11, 0x11, 0x22, 0x22, 0x00, 0x01, 0x02, 0x03]);
        bytes.extend_from_slice(&[0x33, 0x33, 0x44, 0x44, 0x10, 0x11, 0x12, 0x13]);
        bytes
    }

    #[test]
    fn test_dds_and_ktx_cubemaps_report_six_layers() {
        for (bytes, extension) in [
            (dds::fixtures::bc1_cubemap(), "dds"),
            (ktx::fixtures::bc1_cubemap(), "ktx"),
        ] {
            let (lane, info) = load(&bytes, extension, false).unwrap();
            assert!(info.is_cubemap(), "{extension}");
            assert_eq!(info.layers, 6, "{extension}");
            assert_eq!(lane.container_kind(), extension);
            for face in 0..6 {
                assert!(lane.data_slice(face, 0).is_some());
            }
        }
    }

    #[test]
    fn test_caller_layer_count_is_overridden() {
        let context = HandlerContext::default();
        let mut lane = ContainerLoaderLane::for_extension("dds", &context);
        let mut info = InputTextureInfo {
            layers: 3,
            ..InputTextureInfo::default()
        };
        lane.load_data(&mut Cursor::new(dds::fixtures::bc1_cubemap()), &mut info)
            .unwrap();
        assert_eq!(info.layers, 6);
    }

    #[test]
    fn test_flip_on_load_is_block_aware() {
        let (lane, info) = load(&two_block_bc1(), "dds", true).unwrap();
        assert_eq!(info.format, TextureFormat::Bc1RgbaUnorm);
        let data = lane.data_slice(0, 0).unwrap();
        // Block order swapped, endpoints kept, index rows reversed.
        let expected = [
            0x33, 0x33, 0x44, 0x44, 0x13, 0x12, 0x11, 0x10, //
            0x11, 0x11, 0x22, 0x22, 0x03, 0x02, 0x01, 0x00,
        ];
        assert_eq!(data, &expected[..]);
    }

    #[test]
    fn test_flip_round_trip_restores_compressed_bytes() {
        let (plain, _) = load(&two_block_bc1(), "dds", false).unwrap();
        let (mut flipped, info) = load(&two_block_bc1(), "dds", true).unwrap();
        assert_ne!(plain.data_slice(0, 0), flipped.data_slice(0, 0));

        flip_vertically(&mut flipped, &info).unwrap();
        assert_eq!(plain.data_slice(0, 0), flipped.data_slice(0, 0));
    }

    #[test]
    fn test_flip_failure_fails_the_decode() {
        let mut bytes = dds::fixtures::header(4, 4, 1, b"DX10");
        bytes.extend_from_slice(&dds::fixtures::dx10(98, 0, 1));
        bytes.extend_from_slice(&[0; 16]);

        assert!(load(&bytes, "dds", false).is_ok());
        assert!(matches!(load(&bytes, "dds", true), Err(DecodeError::Flip(_))));
    }

    #[test]
    fn test_content_wins_over_extension() {
        let (lane, _) = load(&ktx::fixtures::bc1_cubemap(), "dds", false).unwrap();
        assert_eq!(lane.container_kind(), "ktx");
    }

    #[test]
    fn test_empty_stream_fails() {
        assert!(matches!(load(&[], "dds", false), Err(DecodeError::EmptyStream)));
    }
}
