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

//! Error types of the texture agent.

use tessera_core::{DecodeError, ResourceError, TextureFormat};
use thiserror::Error;

/// Why a load request failed, as reported to completion callbacks.
///
/// `Clone` so that every waiter of a deduplicated job receives its own copy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// No format handler is registered for the extension.
    #[error("no format handler registered for extension '{0}'")]
    FormatNotRegistered(String),

    /// The source could not be opened or read.
    #[error("I/O failure: {0}")]
    Io(String),

    /// The handler rejected the data.
    #[error("decode failure: {0}")]
    Decode(DecodeError),

    /// The data decoded fine but the render context has no mapping for it.
    #[error("decoded pixel format {0:?} is not supported by the render context")]
    UnsupportedPixelFormat(TextureFormat),

    /// The render context failed to create the resource for another reason.
    #[error("GPU resource creation failed: {0}")]
    Resource(ResourceError),

    /// The identifier was removed while its job was in flight.
    #[error("the load was canceled")]
    Canceled,

    /// The identifier is already loading from a different source.
    #[error("'{0}' is already loading from a different source")]
    IdentifierBusy(String),
}

impl From<DecodeError> for LoadError {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::Io(msg) => LoadError::Io(msg),
            other => LoadError::Decode(other),
        }
    }
}

impl From<ResourceError> for LoadError {
    fn from(err: ResourceError) -> Self {
        match err {
            ResourceError::UnsupportedFormat(format) => LoadError::UnsupportedPixelFormat(format),
            other => LoadError::Resource(other),
        }
    }
}

/// An error that prevents the agent itself from starting.
#[derive(Debug, Error)]
pub enum TextureAgentError {
    /// A worker thread could not be spawned.
    #[error("failed to spawn texture worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    /// The render context refused to create the error texture.
    #[error("failed to create the error texture: {0}")]
    ErrorTexture(#[source] ResourceError),

    /// The hot-reload watcher could not be started.
    #[error("failed to start the texture watcher: {0}")]
    Watcher(#[from] notify::Error),
}
