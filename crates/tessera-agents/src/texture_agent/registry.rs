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

//! A registry of format handlers, keyed by file extension.

use super::error::LoadError;
use ahash::AHashMap;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tessera_core::{FormatHandler, HandlerContext};
use tessera_lanes::texture_lane::{
    BitmapLoaderLane, ContainerLoaderLane, BITMAP_EXTENSIONS, CONTAINER_EXTENSIONS,
};

/// Creates a fresh decoder for one load job.
pub type HandlerFactory = Arc<dyn Fn(&HandlerContext) -> Box<dyn FormatHandler> + Send + Sync>;

struct RegistrationEntry {
    extension: String,
    factory: HandlerFactory,
}

/// Maps file extensions to [`HandlerFactory`]s.
///
/// Lookups are constant time. Registration order is kept and defines the
/// priority of [`probe`](Self::probe). Handlers are never shared: every
/// [`resolve`](Self::resolve) builds a new instance.
#[derive(Default)]
pub struct FormatHandlerRegistry {
    index: AHashMap<String, usize>,
    entries: Vec<RegistrationEntry>,
}

impl fmt::Debug for FormatHandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormatHandlerRegistry")
            .field("extensions", &self.extensions().collect::<Vec<_>>())
            .finish()
    }
}

pub(crate) fn normalize(extension: &str) -> String {
    extension.trim_start_matches('.').to_ascii_lowercase()
}

impl FormatHandlerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the bitmap and container handlers of
    /// `tessera-lanes` registered.
    pub fn with_default_handlers() -> Self {
        let mut registry = Self::new();
        registry.register_default_handlers();
        registry
    }

    /// Registers the bitmap family first, then the block-compressed containers.
    pub fn register_default_handlers(&mut self) {
        for extension in BITMAP_EXTENSIONS {
            let hint = extension.to_string();
            self.register(extension, move |context| {
                Box::new(BitmapLoaderLane::for_extension(&hint, context))
            });
        }
        for extension in CONTAINER_EXTENSIONS {
            let hint = extension.to_string();
            self.register(extension, move |context| {
                Box::new(ContainerLoaderLane::for_extension(&hint, context))
            });
        }
    }

    /// Registers `factory` for `extension` (case-insensitive, leading dot
    /// optional).
    ///
    /// Registering an extension twice replaces the factory but keeps the
    /// original priority.
    pub fn register<F>(&mut self, extension: &str, factory: F)
    where
        F: Fn(&HandlerContext) -> Box<dyn FormatHandler> + Send + Sync + 'static,
    {
        self.register_shared(extension, Arc::new(factory));
    }

    /// Registers one factory for every extension of a format family.
    pub fn register_family<F>(&mut self, extensions: &[&str], factory: F)
    where
        F: Fn(&HandlerContext) -> Box<dyn FormatHandler> + Send + Sync + 'static,
    {
        let factory: HandlerFactory = Arc::new(factory);
        for extension in extensions {
            self.register_shared(extension, Arc::clone(&factory));
        }
    }

    /// Registers an already shared factory.
    pub fn register_shared(&mut self, extension: &str, factory: HandlerFactory) {
        let extension = normalize(extension);
        match self.index.get(&extension) {
            Some(&position) => {
                log::warn!("Format handler for '.{extension}' registered twice, replacing it");
                self.entries[position].factory = factory;
            }
            None => {
                self.index.insert(extension.clone(), self.entries.len());
                self.entries.push(RegistrationEntry { extension, factory });
            }
        }
    }

    /// Checks if a handler is registered for `extension`.
    pub fn contains(&self, extension: &str) -> bool {
        self.index.contains_key(&normalize(extension))
    }

    /// Creates a new handler for `extension`.
    ///
    /// ## Errors
    /// * `LoadError::FormatNotRegistered` - If nothing is registered for it.
    pub fn resolve(
        &self,
        extension: &str,
        context: &HandlerContext,
    ) -> Result<Box<dyn FormatHandler>, LoadError> {
        let extension = normalize(extension);
        let position = self
            .index
            .get(&extension)
            .ok_or(LoadError::FormatNotRegistered(extension))?;
        Ok((self.entries[*position].factory)(context))
    }

    /// Registered extensions in registration order.
    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.extension.as_str())
    }

    /// Number of registered extensions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Checks if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks for `stem.<ext>` on disk for every registered extension, in
    /// registration order, and returns the first file found with its
    /// extension.
    pub fn probe(&self, stem: impl AsRef<Path>) -> Option<(PathBuf, String)> {
        let stem = stem.as_ref();
        self.extensions().find_map(|extension| {
            let mut candidate = OsString::from(stem.as_os_str());
            candidate.push(".");
            candidate.push(extension);
            let candidate = PathBuf::from(candidate);
            candidate
                .is_file()
                .then(|| (candidate, extension.to_string()))
        })
    }
}
