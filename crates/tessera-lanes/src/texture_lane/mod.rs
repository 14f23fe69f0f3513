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

//! Texture decoders and transforms.

pub mod block_flip;
pub mod container;

mod bitmap_loader_lane;
mod container_loader_lane;
mod slices;

pub use bitmap_loader_lane::BitmapLoaderLane;
pub use block_flip::{flip_vertically, FlipError, FlipReport};
pub use container_loader_lane::ContainerLoaderLane;
pub use slices::SliceStorage;

/// Extensions decoded through the shared bitmap codec path.
pub const BITMAP_EXTENSIONS: &[&str] = &["png", "tga", "jpg", "jpeg", "bmp", "gif", "hdr"];

/// Extensions decoded by the block-compressed container decoder.
pub const CONTAINER_EXTENSIONS: &[&str] = &["dds", "ktx"];
