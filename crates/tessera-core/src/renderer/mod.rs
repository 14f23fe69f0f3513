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

//! Interfaces to the rendering context that owns GPU objects.
//!
//! The loading pipeline never talks to a graphics API directly. It hands
//! normalized pixel data to a [`RenderContext`] and receives an opaque
//! [`GpuTexture`] back.

mod context;
mod error;

pub use context::*;
pub use error::*;
