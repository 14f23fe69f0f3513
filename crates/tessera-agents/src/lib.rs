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

//! # Tessera Agents
//!
//! The orchestration layer of the texture loader. The [`TextureAgent`] owns
//! the format handler registry, the load job queue and every texture handle,
//! and moves finished decodes into observable state when polled.
//!
//! [`TextureAgent`]: texture_agent::TextureAgent

#![warn(missing_docs)]

pub mod texture_agent;
