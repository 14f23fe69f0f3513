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

//! # Tessera Core
//!
//! Foundational crate containing the types and interface contracts shared by
//! every stage of the texture loading pipeline.
//!
//! Nothing in here performs I/O or decoding. Concrete decoders live in
//! `tessera-lanes`, the render-context implementation in `tessera-infra` and the
//! orchestration (job queue, handles, reloads) in `tessera-agents`.

#![warn(missing_docs)]

pub mod renderer;
pub mod texture;
pub mod utils;

pub use renderer::{
    GpuTexture, RenderContext, ResourceError, SamplerId, TextureId, TextureSlice, TextureUpload,
    TextureViewId,
};
pub use texture::{
    mip_extent, DecodeError, FormatHandler, HandlerContext, InputTextureInfo, TextureFormat,
    TextureInfoFlags,
};
