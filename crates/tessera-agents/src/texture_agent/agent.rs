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

//! The texture agent: the owning-thread facade of the loading pipeline.

use super::callback::LivenessToken;
use super::error::{LoadError, TextureAgentError};
use super::handle::{TextureEntry, TextureHandle, ERROR_TEXTURE_NAME};
use super::job::{create_gpu_texture, DecodedTexture, JobHandle, LoadTimings, TextureSource};
use super::queue::{FinishedJob, LoadJobQueue};
use super::registry::FormatHandlerRegistry;
use super::reload::{ReloadHandler, ReloadQueue, ShaderDependent};
use super::settings::TextureLoaderSettings;
use super::watcher::TextureWatcher;
use ahash::AHashMap;
use std::fmt;
use std::path::Path;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tessera_core::{
    FormatHandler, GpuTexture, HandlerContext, InputTextureInfo, RenderContext, TextureFormat,
    TextureInfoFlags, TextureSlice, TextureUpload,
};

/// The outcome of one load request, delivered by [`TextureAgent::poll`].
#[derive(Debug, Clone)]
pub struct LoadReport {
    /// The ticket of the [`JobHandle`] returned by the request.
    pub ticket: u64,
    /// The requested identifier.
    pub identifier: String,
    /// The identifier's handle. `None` if the request was canceled.
    pub handle: Option<TextureHandle>,
    /// The decoded description, or why the load failed.
    pub result: Result<InputTextureInfo, LoadError>,
    /// Durations measured by the worker.
    pub timings: LoadTimings,
}

impl LoadReport {
    /// Checks if the texture was loaded.
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Loads textures on a worker pool and hands them out as [`TextureHandle`]s.
///
/// The agent lives on the thread allowed to create GPU resources. Decodes
/// run in the background; [`poll`](Self::poll) finalizes what finished and
/// reports it. Every identifier maps to one handle, created at the first
/// request and kept across reloads.
pub struct TextureAgent {
    context: Arc<dyn RenderContext>,
    settings: TextureLoaderSettings,
    queue: LoadJobQueue,
    textures: AHashMap<String, TextureHandle>,
    error_texture: TextureHandle,
    error_resource: Arc<GpuTexture>,
    reload_queue: ReloadQueue,
    reload_handler: Option<ReloadHandler>,
    watcher: Option<TextureWatcher>,
    flip_on_load: bool,
}

impl fmt::Debug for TextureAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextureAgent")
            .field("settings", &self.settings)
            .field("queue", &self.queue)
            .field("textures", &self.textures.len())
            .field("reload_queue", &self.reload_queue)
            .field("hot_reload", &self.watcher.is_some())
            .field("flip_on_load", &self.flip_on_load)
            .finish()
    }
}

impl TextureAgent {
    /// Starts the worker pool and creates the error texture.
    ///
    /// The registry starts empty; see
    /// [`register_default_handlers`](Self::register_default_handlers).
    ///
    /// ## Errors
    /// * `TextureAgentError::WorkerSpawn` - If a worker thread cannot start.
    /// * `TextureAgentError::ErrorTexture` - If the context rejects the 1x1
    ///   error texture.
    /// * `TextureAgentError::Watcher` - If `hot_reload` is set and the file
    ///   watcher cannot start.
    pub fn new(
        context: Arc<dyn RenderContext>,
        settings: TextureLoaderSettings,
    ) -> Result<Self, TextureAgentError> {
        let queue = LoadJobQueue::new(
            settings.effective_worker_threads(),
            FormatHandlerRegistry::new(),
            Arc::clone(&context),
        )
        .map_err(TextureAgentError::WorkerSpawn)?;

        let error_info = InputTextureInfo {
            width: 1,
            height: 1,
            format: TextureFormat::Rgba8Unorm,
            flags: TextureInfoFlags::SRGB,
            ..Default::default()
        };
        let error_resource = Arc::new(
            context
                .create_texture(&TextureUpload {
                    label: ERROR_TEXTURE_NAME,
                    info: &error_info,
                    slices: vec![TextureSlice {
                        layer: 0,
                        mip_level: 0,
                        data: &settings.error_color,
                    }],
                })
                .map_err(TextureAgentError::ErrorTexture)?,
        );
        let error_texture =
            TextureHandle::new(TextureEntry::new(ERROR_TEXTURE_NAME, Arc::clone(&context)));
        error_texture.mark_builtin(error_info, Arc::clone(&error_resource));

        let watcher = if settings.hot_reload {
            Some(TextureWatcher::new()?)
        } else {
            None
        };

        let mut textures = AHashMap::new();
        textures.insert(ERROR_TEXTURE_NAME.to_owned(), error_texture.clone());

        log::info!(
            "TextureAgent started with {} workers (hot reload: {})",
            queue.worker_count(),
            settings.hot_reload
        );
        Ok(Self {
            context,
            flip_on_load: settings.flip_on_load,
            settings,
            queue,
            textures,
            error_texture,
            error_resource,
            reload_queue: ReloadQueue::new(),
            reload_handler: None,
            watcher,
        })
    }

    /// The settings the agent was started with.
    pub fn settings(&self) -> &TextureLoaderSettings {
        &self.settings
    }

    /// The render context resources are created on.
    pub fn context(&self) -> &Arc<dyn RenderContext> {
        &self.context
    }

    /// The job queue, for inspection.
    pub fn queue(&self) -> &LoadJobQueue {
        &self.queue
    }

    /// The format handler registry.
    pub fn registry(&self) -> &FormatHandlerRegistry {
        self.queue.registry()
    }

    /// Registers a handler factory for `extension`.
    pub fn register_handler<F>(&mut self, extension: &str, factory: F)
    where
        F: Fn(&HandlerContext) -> Box<dyn FormatHandler> + Send + Sync + 'static,
    {
        self.queue.registry_mut().register(extension, factory);
    }

    /// Registers the bitmap and block-compressed container decoders.
    pub fn register_default_handlers(&mut self) {
        self.queue.registry_mut().register_default_handlers();
    }

    /// Flips every texture decoded from now on. Jobs already enqueued keep
    /// the value they were enqueued with.
    pub fn set_flip_on_load(&mut self, flip: bool) {
        self.flip_on_load = flip;
    }

    /// The current flip toggle.
    pub fn flip_on_load(&self) -> bool {
        self.flip_on_load
    }

    /// The handle of `identifier`, if it was ever requested.
    pub fn get(&self, identifier: &str) -> Option<TextureHandle> {
        self.textures.get(identifier).cloned()
    }

    /// Number of tracked identifiers, the error texture included.
    pub fn len(&self) -> usize {
        self.textures.len()
    }

    /// Checks if only the error texture is tracked.
    pub fn is_empty(&self) -> bool {
        self.textures.len() <= 1
    }

    /// The texture bound to every failed load.
    pub fn error_texture(&self) -> &TextureHandle {
        &self.error_texture
    }

    /// The queue of objects waiting for a rebuild.
    pub fn reload_queue(&self) -> &ReloadQueue {
        &self.reload_queue
    }

    /// Requests `identifier` from `source`, decoded by the handler registered
    /// for `extension`.
    ///
    /// The identifier's handle exists as soon as this returns. A request for
    /// an identifier already loading joins that load.
    ///
    /// ## Errors
    /// * `LoadError::FormatNotRegistered` - No handler for `extension`.
    /// * `LoadError::IdentifierBusy` - The identifier is loading from another
    ///   source, or is the error texture's.
    pub fn enqueue(
        &mut self,
        identifier: &str,
        extension: &str,
        source: TextureSource,
    ) -> Result<JobHandle, LoadError> {
        if identifier == ERROR_TEXTURE_NAME {
            return Err(LoadError::IdentifierBusy(identifier.to_owned()));
        }
        let source_path = source.path().map(Path::to_path_buf);
        let context = HandlerContext {
            flip_vertically: self.flip_on_load,
        };
        let job = self.queue.enqueue(identifier, extension, source, context)?;

        // A removed identifier can rejoin its own running decode.
        let known = self.textures.contains_key(identifier);
        let handle = self.materialize(identifier);
        if job.is_attached() && known {
            return Ok(job);
        }
        handle.set_source_path(source_path.as_deref());

        if let (Some(watcher), Some(path)) = (self.watcher.as_mut(), source_path.as_deref()) {
            if let Err(err) = watcher.watch(path, identifier) {
                log::warn!("Cannot watch '{}' for '{identifier}': {err}", path.display());
            }
        }
        log::info!(
            "Loading '{identifier}' (.{extension}) as job {}",
            job.job_id()
        );
        Ok(job)
    }

    /// Requests `identifier` from a file, picking the handler from its
    /// extension.
    pub fn load(
        &mut self,
        identifier: &str,
        path: impl AsRef<Path>,
    ) -> Result<JobHandle, LoadError> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default()
            .to_owned();
        self.enqueue(identifier, &extension, TextureSource::Path(path.to_path_buf()))
    }

    /// Requests `identifier` from the first `stem.<ext>` file found, trying
    /// registered extensions in registration order.
    ///
    /// ## Errors
    /// * `LoadError::Io` - If no candidate file exists.
    pub fn load_any(
        &mut self,
        identifier: &str,
        stem: impl AsRef<Path>,
    ) -> Result<JobHandle, LoadError> {
        let stem = stem.as_ref();
        let (path, extension) = self.registry().probe(stem).ok_or_else(|| {
            LoadError::Io(format!(
                "no file found for '{}' with any registered extension",
                stem.display()
            ))
        })?;
        self.enqueue(identifier, &extension, TextureSource::Path(path))
    }

    /// Loads `identifier` again from its source file. The new resource
    /// replaces the current one when the job finishes.
    ///
    /// ## Errors
    /// * `LoadError::Io` - If the identifier is unknown or was not loaded from
    ///   a file.
    pub fn reload(&mut self, identifier: &str) -> Result<JobHandle, LoadError> {
        let path = self
            .textures
            .get(identifier)
            .and_then(|handle| handle.source_path())
            .ok_or_else(|| LoadError::Io(format!("'{identifier}' has no source file")))?;
        self.load(identifier, path)
    }

    /// Stops tracking `identifier`. An in-flight job is canceled. The handle
    /// itself lives on while consumers hold it.
    ///
    /// Returns `false` for unknown identifiers and for the error texture.
    pub fn remove(&mut self, identifier: &str) -> bool {
        if identifier == ERROR_TEXTURE_NAME {
            return false;
        }
        self.queue.cancel(identifier);
        if let Some(watcher) = self.watcher.as_mut() {
            watcher.unwatch(identifier);
        }
        let removed = self.textures.remove(identifier).is_some();
        if removed {
            log::debug!("Removed texture '{identifier}'");
        }
        removed
    }

    /// Resets and stops tracking every texture except the error texture.
    pub fn clear(&mut self) {
        for (identifier, handle) in &self.textures {
            self.queue.cancel(identifier);
            if let Some(watcher) = self.watcher.as_mut() {
                watcher.unwatch(identifier);
            }
            handle.reset();
        }
        self.textures
            .retain(|identifier, _| identifier == ERROR_TEXTURE_NAME);
        log::debug!("Cleared every texture");
    }

    /// Runs `material`'s rebuild whenever `texture`'s resource changes, as
    /// long as `material` is alive.
    pub fn track_dependency<M>(&self, material: &Rc<M>, texture: &TextureHandle)
    where
        M: ShaderDependent + 'static,
    {
        let queue = self.reload_queue.clone();
        let weak: Weak<M> = Rc::downgrade(material);
        let weak: Weak<dyn ShaderDependent> = weak;
        texture.on_resource_changed_while(LivenessToken::tied_to(material), move |_| {
            queue.mark_weak(weak.clone());
        });
    }

    /// Schedules a rebuild of `object` at the next poll.
    pub fn mark_for_reload<M>(&self, object: &Rc<M>)
    where
        M: ShaderDependent + 'static,
    {
        self.reload_queue.mark_for_reload(object);
    }

    /// Installs the function that rebuilds dependents. Until one is set,
    /// each live marked object waits with a single mark.
    pub fn set_reload_handler(&mut self, handler: impl FnMut(&Rc<dyn ShaderDependent>) + 'static) {
        self.reload_handler = Some(Box::new(handler));
    }

    /// Finalizes every job finished since the last call and reports one
    /// [`LoadReport`] per request, in completion order. Never blocks.
    ///
    /// Changed source files are re-enqueued first when hot reload is on,
    /// and pending rebuilds run last. Returns the number of reports.
    pub fn poll(&mut self, mut on_complete: impl FnMut(LoadReport)) -> usize {
        self.reload_changed_files();

        let mut reported = 0;
        for job in self.queue.drain_finished() {
            reported += self.finalize(job, &mut on_complete);
        }

        if !self.reload_queue.is_empty() && self.reload_handler.is_some() {
            self.context.wait_idle();
            let rebuilt = self.reload_queue.drain(self.reload_handler.as_mut());
            log::debug!("Rebuilt {rebuilt} texture dependents");
        }
        reported
    }

    /// Polls until `count` reports were delivered or `timeout` expired.
    /// Returns the number of reports delivered.
    pub fn poll_until(
        &mut self,
        count: usize,
        timeout: Duration,
        mut on_complete: impl FnMut(LoadReport),
    ) -> usize {
        let deadline = Instant::now() + timeout;
        let mut reported = self.poll(&mut on_complete);
        while reported < count {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                log::warn!("Gave up waiting for textures: {reported} of {count} loads reported");
                break;
            }
            self.queue.wait(remaining);
            reported += self.poll(&mut on_complete);
        }
        reported
    }

    fn materialize(&mut self, identifier: &str) -> TextureHandle {
        let context = &self.context;
        self.textures
            .entry(identifier.to_owned())
            .or_insert_with(|| {
                let entry = TextureEntry::new(identifier, Arc::clone(context));
                entry.mark_indexed();
                TextureHandle::new(entry)
            })
            .clone()
    }

    fn reload_changed_files(&mut self) {
        let Some(watcher) = self.watcher.as_mut() else {
            return;
        };
        for identifier in watcher.drain_changed() {
            match self.reload(&identifier) {
                Ok(job) => log::info!(
                    "'{identifier}' changed on disk, reloading as job {}",
                    job.job_id()
                ),
                Err(err) => log::warn!("Cannot reload '{identifier}': {err}"),
            }
        }
    }

    fn finalize(&mut self, job: FinishedJob, on_complete: &mut impl FnMut(LoadReport)) -> usize {
        job.mark_finalized();
        let FinishedJob {
            identifier,
            tickets,
            canceled,
            result,
            timings,
            ..
        } = job;

        if !canceled.is_empty() {
            log::debug!("Load of '{identifier}' was canceled for {} requests", canceled.len());
        }
        for &ticket in &canceled {
            on_complete(LoadReport {
                ticket,
                identifier: identifier.clone(),
                handle: None,
                result: Err(LoadError::Canceled),
                timings,
            });
        }

        let handle = match &result {
            Err(LoadError::Canceled) => None,
            _ => self.textures.get(&identifier).cloned(),
        };
        let Some(handle) = handle else {
            if let Ok(decoded) = result {
                self.discard(decoded);
            }
            for &ticket in &tickets {
                on_complete(LoadReport {
                    ticket,
                    identifier: identifier.clone(),
                    handle: None,
                    result: Err(LoadError::Canceled),
                    timings,
                });
            }
            return canceled.len() + tickets.len();
        };

        let result = result.and_then(|decoded| self.bind(&identifier, &handle, decoded));
        match &result {
            Ok(info) => log::info!(
                "Loaded '{identifier}' ({}x{}, {} layers, {} mips, {:?}) in {:?}",
                info.width,
                info.height,
                info.layers,
                info.mip_levels,
                info.format,
                timings.queued_to_completion
            ),
            Err(err) => {
                log::error!("Failed to load '{identifier}': {err}");
                handle.mark_failed(Arc::clone(&self.error_resource));
            }
        }

        for &ticket in &tickets {
            on_complete(LoadReport {
                ticket,
                identifier: identifier.clone(),
                handle: Some(handle.clone()),
                result: result.clone(),
                timings,
            });
        }
        canceled.len() + tickets.len()
    }

    fn bind(
        &self,
        identifier: &str,
        handle: &TextureHandle,
        decoded: DecodedTexture,
    ) -> Result<InputTextureInfo, LoadError> {
        let DecodedTexture {
            info,
            container_kind,
            handler,
            resource,
        } = decoded;
        let resource = match resource {
            Some(resource) => resource,
            None => Arc::new(create_gpu_texture(
                self.context.as_ref(),
                identifier,
                handler.as_ref(),
                &info,
            )?),
        };
        handle.mark_loaded(info, container_kind, resource);
        Ok(info)
    }

    fn discard(&self, decoded: DecodedTexture) {
        if let Some(resource) = decoded.resource {
            self.context.retire(resource);
        }
    }
}
