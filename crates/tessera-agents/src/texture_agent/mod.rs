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

//! Acts as the agent for texture loading.
//!
//! This module provides the public-facing API for requesting textures and
//! observing their state, and delegates the heavy lifting (container decoding,
//! vertical flips) to the lanes running on the worker pool.
//!
//! The lifecycle of a texture:
//! 1. [`TextureAgent::enqueue`] resolves a [`FormatHandler`] through the
//!    [`FormatHandlerRegistry`] and schedules a decode on the
//!    [`LoadJobQueue`]. The identifier's [`TextureHandle`] is created right
//!    away, in a pending state.
//! 2. A worker decodes the container into pixel data.
//! 3. [`TextureAgent::poll`], on the owning thread, creates the GPU resource,
//!    binds it to the handle (or binds the error texture on failure) and
//!    reports every completion.
//!
//! [`FormatHandler`]: tessera_core::FormatHandler

mod agent;
mod callback;
mod error;
mod handle;
mod job;
mod queue;
mod registry;
mod reload;
mod settings;
mod watcher;

pub use agent::{LoadReport, TextureAgent};
pub use callback::{Liveness, LivenessToken};
pub use error::{LoadError, TextureAgentError};
pub use handle::{TextureEntry, TextureFlags, TextureHandle, WeakTextureHandle, ERROR_TEXTURE_NAME};
pub use job::{JobHandle, JobState, LoadTimings, TextureSource};
pub use queue::LoadJobQueue;
pub use registry::{FormatHandlerRegistry, HandlerFactory};
pub use reload::{ReloadHandler, ReloadQueue, ShaderDependent};
pub use settings::{SettingsError, TextureLoaderSettings};
pub use watcher::TextureWatcher;
