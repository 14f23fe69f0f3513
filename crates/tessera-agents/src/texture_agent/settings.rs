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

//! Configuration of the texture agent.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Settings read once when a [`TextureAgent`](super::TextureAgent) starts.
///
/// Every field has a default, so a RON file only needs the fields it changes:
///
/// ```ron
/// (
///     worker_threads: 2,
///     flip_on_load: true,
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextureLoaderSettings {
    /// Number of decode worker threads, at least one.
    pub worker_threads: usize,
    /// Flip every decoded texture vertically. Can be changed at runtime with
    /// [`TextureAgent::set_flip_on_load`](super::TextureAgent::set_flip_on_load).
    pub flip_on_load: bool,
    /// Reload textures whose source file changes on disk.
    pub hot_reload: bool,
    /// RGBA8 color of the texture bound to failed loads.
    pub error_color: [u8; 4],
}

impl Default for TextureLoaderSettings {
    fn default() -> Self {
        Self {
            worker_threads: default_worker_threads(),
            flip_on_load: false,
            hot_reload: false,
            error_color: [255, 0, 255, 255],
        }
    }
}

fn default_worker_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .clamp(1, 4)
}

/// An error raised while reading [`TextureLoaderSettings`].
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file could not be read.
    #[error("failed to read settings file '{path}': {source}")]
    Io {
        /// The file that was read.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The text is not valid RON for the settings.
    #[error("invalid texture loader settings: {0}")]
    Parse(#[from] ron::error::SpannedError),
}

impl TextureLoaderSettings {
    /// Parses settings from RON text.
    pub fn from_ron_str(text: &str) -> Result<Self, SettingsError> {
        Ok(ron::from_str(text)?)
    }

    /// Reads settings from a RON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ron_str(&text)
    }

    /// The worker count actually used, never zero.
    pub fn effective_worker_threads(&self) -> usize {
        self.worker_threads.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_keep_defaults() {
        let settings = TextureLoaderSettings::from_ron_str("(flip_on_load: true)").unwrap();
        assert!(settings.flip_on_load);
        assert!(!settings.hot_reload);
        assert_eq!(settings.error_color, [255, 0, 255, 255]);
        assert!((1..=4).contains(&settings.worker_threads));
    }

    #[test]
    fn full_settings_parse() {
        let text = "(worker_threads: 3, flip_on_load: false, hot_reload: true, error_color: (0, 0, 0, 255))";
        let settings = TextureLoaderSettings::from_ron_str(text).unwrap();
        assert_eq!(settings.worker_threads, 3);
        assert!(settings.hot_reload);
        assert_eq!(settings.error_color, [0, 0, 0, 255]);
    }

    #[test]
    fn zero_workers_still_runs_one() {
        let settings = TextureLoaderSettings {
            worker_threads: 0,
            ..Default::default()
        };
        assert_eq!(settings.effective_worker_threads(), 1);
    }

    #[test]
    fn invalid_text_is_a_parse_error() {
        assert!(matches!(
            TextureLoaderSettings::from_ron_str("(worker_threads: \"many\")"),
            Err(SettingsError::Parse(_))
        ));
    }

    #[test]
    fn reads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loader.ron");
        std::fs::write(&path, "(worker_threads: 2)").unwrap();
        assert_eq!(
            TextureLoaderSettings::from_file(&path).unwrap().worker_threads,
            2
        );
        assert!(matches!(
            TextureLoaderSettings::from_file(dir.path().join("missing.ron")),
            Err(SettingsError::Io { .. })
        ));
    }
}
