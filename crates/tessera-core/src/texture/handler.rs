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

//! The decoder contract every texture container implements.

use super::info::InputTextureInfo;
use std::fmt;
use std::io::Read;

/// A snapshot of the owning manager's state handed to handler factories.
///
/// Factories run on the thread that enqueues a load; the resulting handler
/// keeps whatever it needs from this context for the decode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandlerContext {
    /// If `true`, the handler must flip the decoded image vertically before
    /// reporting success.
    pub flip_vertically: bool,
}

/// An error produced by a [`FormatHandler`] while decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The stream contained no bytes.
    EmptyStream,
    /// Reading from the stream failed.
    Io(String),
    /// The data is not a valid container of the handler's family.
    Malformed(String),
    /// The container is valid but uses a feature the handler does not decode.
    Unsupported(String),
    /// The vertical flip could not be applied to the decoded data.
    Flip(String),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::EmptyStream => write!(f, "The texture stream is empty"),
            DecodeError::Io(msg) => write!(f, "Failed to read texture stream: {msg}"),
            DecodeError::Malformed(msg) => write!(f, "Malformed texture data: {msg}"),
            DecodeError::Unsupported(msg) => write!(f, "Unsupported texture data: {msg}"),
            DecodeError::Flip(msg) => write!(f, "Failed to flip texture: {msg}"),
        }
    }
}

impl std::error::Error for DecodeError {}

impl From<std::io::Error> for DecodeError {
    fn from(err: std::io::Error) -> Self {
        DecodeError::Io(err.to_string())
    }
}

/// A decoder for one family of texture containers.
///
/// A fresh instance is created for every load job, so implementations may keep
/// mutable state (the decoded pixel storage) without any synchronization. The
/// instance travels to a worker thread for the decode and back to the owner
/// thread for the upload, hence the `Send` bound.
pub trait FormatHandler: Send {
    /// A short name of the container family, e.g. `"bitmap"` or `"dds"`.
    fn container_kind(&self) -> &'static str;

    /// Reads the whole container from `reader`, fills `info` and keeps the
    /// decoded pixels for [`data_slice`](Self::data_slice).
    ///
    /// Cubemaps are reported with [`TextureInfoFlags::CUBEMAP`] and six
    /// layers, whatever layer count the caller assumed in `info`.
    ///
    /// [`TextureInfoFlags::CUBEMAP`]: super::TextureInfoFlags::CUBEMAP
    fn load_data(
        &mut self,
        reader: &mut dyn Read,
        info: &mut InputTextureInfo,
    ) -> Result<(), DecodeError>;

    /// Returns the decoded bytes of one slice. Cubemap faces are addressed
    /// through `layer`.
    fn data_slice(&self, layer: u32, mip_level: u32) -> Option<&[u8]>;

    /// Mutable access to one decoded slice.
    fn data_slice_mut(&mut self, layer: u32, mip_level: u32) -> Option<&mut [u8]>;
}

/// Reads a stream to its end, rejecting empty input.
pub fn read_all(reader: &mut dyn Read) -> Result<Vec<u8>, DecodeError> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    if bytes.is_empty() {
        return Err(DecodeError::EmptyStream);
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn read_all_rejects_empty_streams() {
        let mut empty = Cursor::new(Vec::<u8>::new());
        assert_eq!(read_all(&mut empty), Err(DecodeError::EmptyStream));

        let mut data = Cursor::new(vec![1u8, 2, 3]);
        assert_eq!(read_all(&mut data).unwrap(), vec![1, 2, 3]);
    }
}
