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

//! Owned storage for decoded texture slices.

/// Decoded pixel data addressed by `(layer, mip_level)`.
///
/// Slices are stored layer-major: every mip of layer 0, then every mip of
/// layer 1, and so on.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SliceStorage {
    layers: u32,
    mip_levels: u32,
    slices: Vec<Vec<u8>>,
}

impl SliceStorage {
    /// Storage holding one layer with a single mip level.
    pub fn single(data: Vec<u8>) -> Self {
        Self {
            layers: 1,
            mip_levels: 1,
            slices: vec![data],
        }
    }

    /// Builds storage from slices already ordered layer-major.
    ///
    /// Returns `None` if `slices` does not hold exactly `layers * mip_levels`
    /// entries.
    pub fn from_layer_major(layers: u32, mip_levels: u32, slices: Vec<Vec<u8>>) -> Option<Self> {
        if slices.len() != (layers as usize) * (mip_levels as usize) {
            return None;
        }
        Some(Self {
            layers,
            mip_levels,
            slices,
        })
    }

    /// Number of layers.
    pub fn layers(&self) -> u32 {
        self.layers
    }

    /// Number of mip levels per layer.
    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }

    fn index(&self, layer: u32, mip_level: u32) -> Option<usize> {
        if layer >= self.layers || mip_level >= self.mip_levels {
            return None;
        }
        Some((layer * self.mip_levels + mip_level) as usize)
    }

    /// Returns the bytes of one slice.
    pub fn get(&self, layer: u32, mip_level: u32) -> Option<&[u8]> {
        let index = self.index(layer, mip_level)?;
        self.slices.get(index).map(Vec::as_slice)
    }

    /// Returns the bytes of one slice for modification.
    pub fn get_mut(&mut self, layer: u32, mip_level: u32) -> Option<&mut [u8]> {
        let index = self.index(layer, mip_level)?;
        self.slices.get_mut(index).map(Vec::as_mut_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addresses_layer_major() {
        let storage =
            SliceStorage::from_layer_major(2, 2, vec![vec![0], vec![1], vec![2], vec![3]]).unwrap();
        assert_eq!(storage.get(0, 1), Some(&[1u8][..]));
        assert_eq!(storage.get(1, 0), Some(&[2u8][..]));
        assert_eq!(storage.get(2, 0), None);
        assert_eq!(storage.get(0, 2), None);
    }

    #[test]
    fn rejects_wrong_slice_count() {
        assert!(SliceStorage::from_layer_major(2, 2, vec![vec![0]]).is_none());
    }
}
