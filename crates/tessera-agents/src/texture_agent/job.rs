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

//! Load jobs and the decode stage that runs on worker threads.

use super::error::LoadError;
use std::any::Any;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tessera_core::{
    DecodeError, FormatHandler, GpuTexture, InputTextureInfo, RenderContext, ResourceError,
    TextureSlice, TextureUpload,
};

/// The lifecycle of a load job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum JobState {
    /// Waiting for a worker.
    Queued = 0,
    /// A worker is running the decoder.
    Decoding = 1,
    /// Decoded, waiting for the owner's poll.
    Succeeded = 2,
    /// Failed, waiting for the owner's poll.
    Failed = 3,
    /// Reported by a poll. Terminal.
    Finalized = 4,
}

impl JobState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => JobState::Queued,
            1 => JobState::Decoding,
            2 => JobState::Succeeded,
            3 => JobState::Failed,
            _ => JobState::Finalized,
        }
    }

    /// Checks if the job has left the worker pool.
    pub fn is_finished(&self) -> bool {
        !matches!(self, JobState::Queued | JobState::Decoding)
    }
}

/// A job state shared between the owner and the worker running the job.
#[derive(Debug)]
pub(crate) struct JobStatus(AtomicU8);

impl JobStatus {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self(AtomicU8::new(JobState::Queued as u8)))
    }

    pub(crate) fn get(&self) -> JobState {
        JobState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, state: JobState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// The receipt of one enqueue call.
///
/// Requests deduplicated onto the same decode share the `job_id` but each
/// keeps its own `ticket`.
#[derive(Debug, Clone)]
pub struct JobHandle {
    ticket: u64,
    job_id: u64,
    identifier: String,
    attached: bool,
    status: Arc<JobStatus>,
}

impl JobHandle {
    pub(crate) fn new(
        ticket: u64,
        job_id: u64,
        identifier: &str,
        attached: bool,
        status: Arc<JobStatus>,
    ) -> Self {
        Self {
            ticket,
            job_id,
            identifier: identifier.to_owned(),
            attached,
            status,
        }
    }

    /// Identifies this request in [`LoadReport`](super::LoadReport)s.
    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    /// Identifies the decode serving this request.
    pub fn job_id(&self) -> u64 {
        self.job_id
    }

    /// The texture identifier requested.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// `true` if the request joined a decode that was already in flight.
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// The current state of the decode.
    pub fn state(&self) -> JobState {
        self.status.get()
    }
}

/// Where a load job reads its container from.
pub enum TextureSource {
    /// A file, opened by the worker that decodes it.
    Path(PathBuf),
    /// An already open stream.
    Stream(Box<dyn Read + Send>),
}

impl TextureSource {
    /// A source reading from an in-memory buffer.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        TextureSource::Stream(Box::new(Cursor::new(bytes.into())))
    }

    /// The file path, if the source is a file.
    pub fn path(&self) -> Option<&Path> {
        match self {
            TextureSource::Path(path) => Some(path),
            TextureSource::Stream(_) => None,
        }
    }
}

impl fmt::Debug for TextureSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextureSource::Path(path) => f.debug_tuple("Path").field(path).finish(),
            TextureSource::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<PathBuf> for TextureSource {
    fn from(path: PathBuf) -> Self {
        TextureSource::Path(path)
    }
}

impl From<&Path> for TextureSource {
    fn from(path: &Path) -> Self {
        TextureSource::Path(path.to_path_buf())
    }
}

/// How long a job took.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadTimings {
    /// From the enqueue call to the end of the decode.
    pub queued_to_completion: Duration,
    /// From the start of the decode to its end.
    pub decode_to_completion: Duration,
}

/// A job on its way to a worker.
pub(crate) struct WorkItem {
    pub(crate) job_id: u64,
    pub(crate) identifier: String,
    pub(crate) source: TextureSource,
    pub(crate) handler: Box<dyn FormatHandler>,
    pub(crate) enqueued_at: Instant,
    pub(crate) status: Arc<JobStatus>,
    /// Set when the render context accepts allocations from any thread.
    pub(crate) eager_context: Option<Arc<dyn RenderContext>>,
}

/// A successful decode, with the handler that still owns the pixel data.
pub(crate) struct DecodedTexture {
    pub(crate) info: InputTextureInfo,
    pub(crate) container_kind: &'static str,
    pub(crate) handler: Box<dyn FormatHandler>,
    /// Already created on the worker.
    pub(crate) resource: Option<Arc<GpuTexture>>,
}

impl fmt::Debug for DecodedTexture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedTexture")
            .field("info", &self.info)
            .field("container_kind", &self.container_kind)
            .field("resource", &self.resource)
            .finish_non_exhaustive()
    }
}

/// A job on its way back from a worker.
pub(crate) struct Completion {
    pub(crate) job_id: u64,
    pub(crate) identifier: String,
    pub(crate) result: Result<DecodedTexture, LoadError>,
    pub(crate) timings: LoadTimings,
}

/// Runs the decode stage of `item`. Never panics: a panicking decoder is
/// reported as a decode failure.
pub(crate) fn run(item: WorkItem) -> Completion {
    let WorkItem {
        job_id,
        identifier,
        source,
        handler,
        enqueued_at,
        status,
        eager_context,
    } = item;

    status.set(JobState::Decoding);
    let decode_started_at = Instant::now();
    log::trace!("Decoding '{identifier}' (job {job_id})");

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        decode(&identifier, source, handler, eager_context.as_deref())
    }))
    .unwrap_or_else(|payload| {
        Err(LoadError::Decode(DecodeError::Malformed(format!(
            "decoder panicked: {}",
            panic_message(payload.as_ref())
        ))))
    });

    let finished_at = Instant::now();
    status.set(if result.is_ok() {
        JobState::Succeeded
    } else {
        JobState::Failed
    });

    Completion {
        job_id,
        identifier,
        result,
        timings: LoadTimings {
            queued_to_completion: finished_at - enqueued_at,
            decode_to_completion: finished_at - decode_started_at,
        },
    }
}

fn decode(
    label: &str,
    source: TextureSource,
    mut handler: Box<dyn FormatHandler>,
    eager_context: Option<&dyn RenderContext>,
) -> Result<DecodedTexture, LoadError> {
    let mut reader: Box<dyn Read + Send> = match source {
        TextureSource::Path(path) => {
            let file = File::open(&path)
                .map_err(|err| LoadError::Io(format!("{}: {err}", path.display())))?;
            Box::new(BufReader::new(file))
        }
        TextureSource::Stream(stream) => stream,
    };

    let mut info = InputTextureInfo::default();
    handler.load_data(&mut reader, &mut info)?;

    let resource = match eager_context {
        Some(context) => Some(Arc::new(create_gpu_texture(
            context,
            label,
            handler.as_ref(),
            &info,
        )?)),
        None => None,
    };

    Ok(DecodedTexture {
        info,
        container_kind: handler.container_kind(),
        handler,
        resource,
    })
}

/// Uploads every slice the handler decoded.
///
/// ## Errors
/// * `ResourceError::InvalidUpload` - If the handler lacks a slice `info`
///   announces.
/// * Anything [`RenderContext::create_texture`] returns.
pub(crate) fn create_gpu_texture(
    context: &dyn RenderContext,
    label: &str,
    handler: &dyn FormatHandler,
    info: &InputTextureInfo,
) -> Result<GpuTexture, ResourceError> {
    let slices = info
        .slices()
        .map(|(layer, mip_level)| {
            handler
                .data_slice(layer, mip_level)
                .map(|data| TextureSlice {
                    layer,
                    mip_level,
                    data,
                })
                .ok_or_else(|| {
                    ResourceError::InvalidUpload(format!(
                        "'{label}' has no data for layer {layer}, mip {mip_level}"
                    ))
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    context.create_texture(&TextureUpload {
        label,
        info,
        slices,
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::{TextureFormat, TextureInfoFlags};
    use tessera_infra::HeadlessRenderContext;

    /// Decodes a 2x2 RGBA image out of whatever bytes it reads.
    struct RawHandler {
        pixels: Vec<u8>,
        panic_on_load: bool,
    }

    impl RawHandler {
        fn boxed(panic_on_load: bool) -> Box<dyn FormatHandler> {
            Box::new(Self {
                pixels: Vec::new(),
                panic_on_load,
            })
        }
    }

    impl FormatHandler for RawHandler {
        fn container_kind(&self) -> &'static str {
            "raw"
        }

        fn load_data(
            &mut self,
            reader: &mut dyn Read,
            info: &mut InputTextureInfo,
        ) -> Result<(), DecodeError> {
            if self.panic_on_load {
                panic!("corrupt header");
            }
            self.pixels = tessera_core::texture::read_all(reader)?;
            if self.pixels.len() != 16 {
                return Err(DecodeError::Malformed("expected 16 bytes".into()));
            }
            *info = InputTextureInfo {
                width: 2,
                height: 2,
                format: TextureFormat::Rgba8Unorm,
                flags: TextureInfoFlags::SRGB,
                ..Default::default()
            };
            Ok(())
        }

        fn data_slice(&self, layer: u32, mip_level: u32) -> Option<&[u8]> {
            (layer == 0 && mip_level == 0).then_some(self.pixels.as_slice())
        }

        fn data_slice_mut(&mut self, layer: u32, mip_level: u32) -> Option<&mut [u8]> {
            (layer == 0 && mip_level == 0).then_some(self.pixels.as_mut_slice())
        }
    }

    fn item(source: TextureSource, handler: Box<dyn FormatHandler>) -> WorkItem {
        WorkItem {
            job_id: 7,
            identifier: "raw".into(),
            source,
            handler,
            enqueued_at: Instant::now(),
            status: JobStatus::new(),
            eager_context: None,
        }
    }

    #[test]
    fn successful_decode_keeps_handler() {
        let work = item(TextureSource::from_bytes(vec![9u8; 16]), RawHandler::boxed(false));
        let status = Arc::clone(&work.status);
        let completion = run(work);

        assert_eq!(status.get(), JobState::Succeeded);
        let decoded = completion.result.unwrap();
        assert_eq!(decoded.info.width, 2);
        assert_eq!(decoded.container_kind, "raw");
        assert_eq!(decoded.handler.data_slice(0, 0).unwrap().len(), 16);
        assert!(decoded.resource.is_none());
        assert!(completion.timings.queued_to_completion >= completion.timings.decode_to_completion);
    }

    #[test]
    fn missing_file_is_an_io_failure() {
        let dir = tempfile::tempdir().unwrap();
        let work = item(
            TextureSource::Path(dir.path().join("missing.raw")),
            RawHandler::boxed(false),
        );
        let status = Arc::clone(&work.status);
        let completion = run(work);

        assert_eq!(status.get(), JobState::Failed);
        assert!(matches!(completion.result, Err(LoadError::Io(_))));
    }

    #[test]
    fn empty_stream_is_a_decode_failure() {
        let completion = run(item(TextureSource::from_bytes(Vec::new()), RawHandler::boxed(false)));
        assert_eq!(
            completion.result.err(),
            Some(LoadError::Decode(DecodeError::EmptyStream))
        );
    }

    #[test]
    fn panicking_decoder_is_reported() {
        let completion = run(item(TextureSource::from_bytes(vec![1u8]), RawHandler::boxed(true)));
        match completion.result {
            Err(LoadError::Decode(DecodeError::Malformed(msg))) => {
                assert!(msg.contains("corrupt header"), "{msg}");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn eager_context_creates_resource_on_worker() {
        let context = Arc::new(HeadlessRenderContext::new().with_multithreaded_allocation(true));
        let mut work = item(TextureSource::from_bytes(vec![3u8; 16]), RawHandler::boxed(false));
        work.eager_context = Some(context.clone());

        let decoded = run(work).result.unwrap();
        let resource = decoded.resource.unwrap();
        assert_eq!(resource.format, TextureFormat::Rgba8UnormSrgb);
        assert_eq!(context.label(resource.texture).as_deref(), Some("raw"));
    }

    #[test]
    fn missing_slice_is_an_invalid_upload() {
        let context = HeadlessRenderContext::new();
        let handler = RawHandler {
            pixels: vec![0; 16],
            panic_on_load: false,
        };
        let info = InputTextureInfo {
            width: 2,
            height: 2,
            mip_levels: 2,
            ..Default::default()
        };
        assert!(matches!(
            create_gpu_texture(&context, "raw", &handler, &info),
            Err(ResourceError::InvalidUpload(_))
        ));
    }
}
