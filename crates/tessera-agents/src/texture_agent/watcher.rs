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

//! Watches the source files of loaded textures for hot reload.

use ahash::{AHashMap, AHashSet};
use crossbeam_channel::Receiver;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::fmt;
use std::path::{Path, PathBuf};

/// Maps file system changes back to texture identifiers.
///
/// Parent directories are watched instead of the files themselves, so that
/// editors replacing a file through a rename are still noticed.
pub struct TextureWatcher {
    watcher: RecommendedWatcher,
    events: Receiver<notify::Result<Event>>,
    directories: AHashMap<PathBuf, usize>,
    files: AHashMap<PathBuf, String>,
    identifiers: AHashMap<String, PathBuf>,
}

impl fmt::Debug for TextureWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextureWatcher")
            .field("directories", &self.directories.len())
            .field("files", &self.files)
            .finish()
    }
}

impl TextureWatcher {
    /// Starts the platform watcher.
    pub fn new() -> Result<Self, notify::Error> {
        let (tx, events) = crossbeam_channel::unbounded();
        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = tx.send(res);
        })?;
        Ok(Self {
            watcher,
            events,
            directories: AHashMap::new(),
            files: AHashMap::new(),
            identifiers: AHashMap::new(),
        })
    }

    /// Reports `identifier` whenever `path` is created or modified.
    ///
    /// Watching an identifier again with another path replaces the old one.
    ///
    /// ## Errors
    /// Fails if `path` does not exist or its directory cannot be watched.
    pub fn watch(&mut self, path: &Path, identifier: &str) -> Result<(), notify::Error> {
        let path = path.canonicalize().map_err(notify::Error::io)?;
        if self.identifiers.get(identifier) == Some(&path) {
            return Ok(());
        }
        self.unwatch(identifier);

        let directory = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| path.clone());
        let watchers = self.directories.get(&directory).copied().unwrap_or(0);
        if watchers == 0 {
            self.watcher.watch(&directory, RecursiveMode::NonRecursive)?;
            log::debug!("Watching '{}' for texture changes", directory.display());
        }
        self.directories.insert(directory, watchers + 1);

        self.files.insert(path.clone(), identifier.to_owned());
        self.identifiers.insert(identifier.to_owned(), path);
        Ok(())
    }

    /// Stops reporting `identifier`. Returns `false` if it was not watched.
    pub fn unwatch(&mut self, identifier: &str) -> bool {
        let Some(path) = self.identifiers.remove(identifier) else {
            return false;
        };
        self.files.remove(&path);

        let directory = path.parent().map(Path::to_path_buf).unwrap_or(path);
        if let Some(watchers) = self.directories.get_mut(&directory) {
            *watchers -= 1;
            if *watchers == 0 {
                self.directories.remove(&directory);
                if let Err(err) = self.watcher.unwatch(&directory) {
                    log::warn!("Failed to unwatch '{}': {err}", directory.display());
                }
            }
        }
        true
    }

    /// Checks if `identifier` is watched.
    pub fn is_watching(&self, identifier: &str) -> bool {
        self.identifiers.contains_key(identifier)
    }

    /// Number of directories under watch.
    pub fn watched_directories(&self) -> usize {
        self.directories.len()
    }

    /// Identifiers whose file changed since the last call, each reported
    /// once, in the order of their first event.
    pub fn drain_changed(&mut self) -> Vec<String> {
        let mut seen = AHashSet::new();
        let mut changed = Vec::new();
        for res in self.events.try_iter() {
            let event = match res {
                Ok(event) => event,
                Err(err) => {
                    log::warn!("Texture watcher error: {err}");
                    continue;
                }
            };
            if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                continue;
            }
            for path in &event.paths {
                let identifier = self.files.get(path).or_else(|| {
                    path.canonicalize()
                        .ok()
                        .and_then(|canonical| self.files.get(&canonical))
                });
                if let Some(identifier) = identifier {
                    if seen.insert(identifier.clone()) {
                        changed.push(identifier.clone());
                    }
                }
            }
        }
        changed
    }
}
