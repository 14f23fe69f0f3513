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

//! Decoded texture descriptions and the decoder contract.
//!
//! A decoder ([`FormatHandler`]) turns one container file into an
//! [`InputTextureInfo`] plus random access to its pixel slices. Everything
//! downstream (flip, GPU upload, handle bookkeeping) only speaks these types.

mod format;
mod handler;
mod info;

pub use format::*;
pub use handler::*;
pub use info::*;
