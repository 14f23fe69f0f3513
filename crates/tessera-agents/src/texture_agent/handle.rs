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

//! Long-lived texture handles with a swappable GPU resource.

use super::callback::{CallbackQueue, LivenessToken};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};
use std::sync::Arc;
use tessera_core::{tessera_bitflags, GpuTexture, InputTextureInfo, RenderContext};

/// Name of the texture bound to every failed load. It is never reset.
pub const ERROR_TEXTURE_NAME: &str = "__tessera_error_texture";

tessera_bitflags! {
    /// State flags of a [`TextureEntry`].
    ///
    /// `LOADED` and `ERROR` are never both set; both are clear while the first
    /// load is pending.
    pub struct TextureFlags: u32 {
        /// The entry is tracked by an agent under its name.
        const INDEXED = 1 << 0;
        /// A decoded resource is bound.
        const LOADED = 1 << 1;
        /// The last load failed and the error texture is bound.
        const ERROR = 1 << 2;
        /// The bound resource holds sRGB color.
        const SRGB = 1 << 3;
    }
}

type LoadedCallback = dyn FnOnce(&TextureEntry);
type RemoveCallback = dyn FnOnce(&TextureEntry);
type ChangedCallback = dyn FnMut(&TextureEntry);

/// The shared state behind a [`TextureHandle`].
///
/// Everything here is confined to the thread that owns the agent: callbacks
/// are registered and dispatched there, and the handle is `!Send`.
pub struct TextureEntry {
    name: String,
    source_path: RefCell<Option<PathBuf>>,
    container_kind: Cell<Option<&'static str>>,
    info: Cell<Option<InputTextureInfo>>,
    flags: Cell<TextureFlags>,
    update_counter: Cell<u64>,
    resource: RefCell<Option<Arc<GpuTexture>>>,
    /// The bound resource belongs to the error texture.
    borrowed: Cell<bool>,

    on_loaded: CallbackQueue<LoadedCallback>,
    on_remove: CallbackQueue<RemoveCallback>,
    on_resource_changed: CallbackQueue<ChangedCallback>,

    context: Arc<dyn RenderContext>,
}

impl fmt::Debug for TextureEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextureEntry")
            .field("name", &self.name)
            .field("source_path", &self.source_path.borrow())
            .field("container_kind", &self.container_kind.get())
            .field("flags", &self.flags.get())
            .field("update_counter", &self.update_counter.get())
            .field("resource", &self.resource.borrow())
            .field("on_loaded", &self.on_loaded.len())
            .field("on_remove", &self.on_remove.len())
            .field("on_resource_changed", &self.on_resource_changed.len())
            .finish()
    }
}

impl TextureEntry {
    pub(crate) fn new(name: impl Into<String>, context: Arc<dyn RenderContext>) -> Self {
        Self {
            name: name.into(),
            source_path: RefCell::new(None),
            container_kind: Cell::new(None),
            info: Cell::new(None),
            flags: Cell::new(TextureFlags::EMPTY),
            update_counter: Cell::new(0),
            resource: RefCell::new(None),
            borrowed: Cell::new(false),
            on_loaded: CallbackQueue::default(),
            on_remove: CallbackQueue::default(),
            on_resource_changed: CallbackQueue::default(),
            context,
        }
    }

    /// The identifier the texture is tracked under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The file the texture was last requested from, if any.
    pub fn source_path(&self) -> Option<PathBuf> {
        self.source_path.borrow().clone()
    }

    /// The container family of the last successful decode.
    pub fn container_kind(&self) -> Option<&'static str> {
        self.container_kind.get()
    }

    /// The description of the last successful decode.
    pub fn info(&self) -> Option<InputTextureInfo> {
        self.info.get()
    }

    /// Current state flags.
    pub fn flags(&self) -> TextureFlags {
        self.flags.get()
    }

    /// Checks if a decoded resource is bound.
    pub fn is_loaded(&self) -> bool {
        self.flags().contains(TextureFlags::LOADED)
    }

    /// Checks if the last load failed.
    pub fn is_error(&self) -> bool {
        self.flags().contains(TextureFlags::ERROR)
    }

    /// Checks if the bound resource holds sRGB color.
    pub fn is_srgb(&self) -> bool {
        self.flags().contains(TextureFlags::SRGB)
    }

    /// Checks if this is the agent's error texture.
    pub fn is_error_texture(&self) -> bool {
        self.name == ERROR_TEXTURE_NAME
    }

    /// Number of resource swaps so far.
    pub fn update_counter(&self) -> u64 {
        self.update_counter.get()
    }

    /// The currently bound GPU resource.
    pub fn resource(&self) -> Option<Arc<GpuTexture>> {
        self.resource.borrow().clone()
    }

    fn set_flag(&self, flag: TextureFlags, value: bool) {
        let mut flags = self.flags.get();
        flags.set(flag, value);
        self.flags.set(flags);
    }

    /// Runs `callback` once the texture is loaded.
    ///
    /// If it is already loaded, `callback` runs before this returns.
    /// Otherwise it is queued and runs the next time a load finishes.
    pub fn on_loaded(&self, callback: impl FnOnce(&TextureEntry) + 'static) {
        if self.is_loaded() {
            callback(self);
        } else {
            self.on_loaded.push(Box::new(callback), None);
        }
    }

    /// Runs `callback` when the entry is destroyed, before its resource is
    /// released.
    pub fn on_remove(&self, callback: impl FnOnce(&TextureEntry) + 'static) {
        self.on_remove.push(Box::new(callback), None);
    }

    /// Like [`on_remove`](Self::on_remove), skipped if `token` expired by
    /// then.
    pub fn on_remove_while(
        &self,
        token: LivenessToken,
        callback: impl FnOnce(&TextureEntry) + 'static,
    ) {
        self.on_remove.push(Box::new(callback), Some(token));
    }

    /// Runs `callback` every time the bound resource changes, the first
    /// assignment included.
    pub fn on_resource_changed(&self, callback: impl FnMut(&TextureEntry) + 'static) {
        self.on_resource_changed.push(Box::new(callback), None);
    }

    /// Like [`on_resource_changed`](Self::on_resource_changed), dropped at
    /// the first change after `token` expired.
    pub fn on_resource_changed_while(
        &self,
        token: LivenessToken,
        callback: impl FnMut(&TextureEntry) + 'static,
    ) {
        self.on_resource_changed.push(Box::new(callback), Some(token));
    }

    /// Binds `resource`.
    ///
    /// Binding the resource that is already bound does nothing. Otherwise the
    /// previous resource goes to the render context's retirement queue, the
    /// update counter increments, queued `on_loaded` callbacks run if the
    /// texture is loaded, and `on_resource_changed` callbacks run.
    pub fn set_resource(&self, resource: Arc<GpuTexture>) {
        let unchanged = self
            .resource
            .borrow()
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, &resource));
        if unchanged {
            return;
        }

        let previous = self.resource.replace(Some(resource));
        if let Some(previous) = previous {
            self.retire(previous);
        }
        self.update_counter.set(self.update_counter.get() + 1);

        if self.is_loaded() {
            self.fire_loaded();
        }
        self.fire_resource_changed();
    }

    /// Unbinds the resource, sending it to retirement, and clears `LOADED`
    /// and `ERROR`. Callback queues are left untouched.
    ///
    /// Does nothing on the error texture.
    pub fn reset(&self) {
        if self.is_error_texture() {
            return;
        }
        if let Some(previous) = self.resource.take() {
            self.retire(previous);
            self.update_counter.set(self.update_counter.get() + 1);
        }
        self.set_flag(TextureFlags::LOADED, false);
        self.set_flag(TextureFlags::ERROR, false);
    }

    pub(crate) fn mark_indexed(&self) {
        self.set_flag(TextureFlags::INDEXED, true);
    }

    pub(crate) fn set_source_path(&self, path: Option<&Path>) {
        *self.source_path.borrow_mut() = path.map(Path::to_path_buf);
    }

    /// Binds a freshly decoded resource and enters the loaded state.
    pub(crate) fn mark_loaded(
        &self,
        info: InputTextureInfo,
        container_kind: &'static str,
        resource: Arc<GpuTexture>,
    ) {
        self.info.set(Some(info));
        self.container_kind.set(Some(container_kind));
        self.set_flag(TextureFlags::SRGB, info.is_srgb());
        self.set_flag(TextureFlags::ERROR, false);
        self.set_resource(resource);

        if !self.is_loaded() {
            self.set_flag(TextureFlags::LOADED, true);
            self.fire_loaded();
        }
    }

    /// Binds the error texture's resource and enters the error state.
    ///
    /// Queued `on_loaded` callbacks still run so that waiters learn about
    /// the failure through the same channel.
    pub(crate) fn mark_failed(&self, error_resource: Arc<GpuTexture>) {
        self.set_flag(TextureFlags::LOADED, false);
        self.set_flag(TextureFlags::ERROR, true);
        self.set_resource(error_resource);
        self.borrowed.set(true);
        self.fire_loaded();
    }

    /// Marks the entry loaded without a decode. Used for the error texture.
    pub(crate) fn mark_builtin(&self, info: InputTextureInfo, resource: Arc<GpuTexture>) {
        self.info.set(Some(info));
        self.container_kind.set(Some("builtin"));
        self.set_flag(TextureFlags::SRGB, info.is_srgb());
        self.set_flag(TextureFlags::INDEXED, true);
        self.set_flag(TextureFlags::LOADED, true);
        self.set_resource(resource);
    }

    /// Hands `resource` to the render context, unless it is the error
    /// texture's, which outlives every entry.
    fn retire(&self, resource: Arc<GpuTexture>) {
        if !self.borrowed.replace(false) {
            self.context.retire(resource);
        }
    }

    fn fire_loaded(&self) {
        for listener in self.on_loaded.take() {
            if listener.is_alive() {
                (listener.callback)(self);
            }
        }
    }

    fn fire_resource_changed(&self) {
        let mut survivors = self.on_resource_changed.take();
        survivors.retain_mut(|listener| {
            if !listener.is_alive() {
                return false;
            }
            (listener.callback)(self);
            true
        });
        self.on_resource_changed.restore(survivors);
    }
}

impl Drop for TextureEntry {
    fn drop(&mut self) {
        for listener in self.on_remove.take_mut() {
            if listener.is_alive() {
                (listener.callback)(self);
            }
        }
        if let Some(resource) = self.resource.get_mut().take() {
            self.retire(resource);
        }
    }
}

/// A cheap, cloneable, thread-confined reference to a [`TextureEntry`].
///
/// Consumers keep the handle while the agent swaps the resource behind it.
#[derive(Debug, Clone)]
pub struct TextureHandle(Rc<TextureEntry>);

impl TextureHandle {
    pub(crate) fn new(entry: TextureEntry) -> Self {
        Self(Rc::new(entry))
    }

    /// A non-owning reference to the same entry.
    pub fn downgrade(&self) -> WeakTextureHandle {
        WeakTextureHandle(Rc::downgrade(&self.0))
    }

    /// Checks if both handles refer to the same entry.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Rc::ptr_eq(&a.0, &b.0)
    }

    /// A token that expires when the last strong handle is dropped.
    pub fn liveness_token(&self) -> LivenessToken {
        LivenessToken::tied_to(&self.0)
    }

    /// Number of strong handles to the entry.
    pub fn strong_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }
}

impl Deref for TextureHandle {
    type Target = TextureEntry;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// A non-owning [`TextureHandle`].
#[derive(Debug, Clone, Default)]
pub struct WeakTextureHandle(Weak<TextureEntry>);

impl WeakTextureHandle {
    /// Returns a strong handle if the entry is still alive.
    pub fn upgrade(&self) -> Option<TextureHandle> {
        self.0.upgrade().map(TextureHandle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::texture_agent::callback::Liveness;
    use std::cell::RefCell;
    use std::rc::Rc;
    use tessera_core::{TextureFormat, TextureInfoFlags, TextureSlice, TextureUpload};
    use tessera_infra::HeadlessRenderContext;

    fn context() -> Arc<HeadlessRenderContext> {
        Arc::new(HeadlessRenderContext::new().with_retire_latency(1))
    }

    fn resource(ctx: &HeadlessRenderContext) -> Arc<GpuTexture> {
        let info = pixel_info();
        let upload = TextureUpload {
            label: "pixel",
            info: &info,
            slices: vec![TextureSlice {
                layer: 0,
                mip_level: 0,
                data: &[1, 2, 3, 4],
            }],
        };
        Arc::new(ctx.create_texture(&upload).unwrap())
    }

    fn pixel_info() -> InputTextureInfo {
        InputTextureInfo {
            width: 1,
            height: 1,
            format: TextureFormat::Rgba8Unorm,
            flags: TextureInfoFlags::SRGB,
            ..Default::default()
        }
    }

    fn entry(name: &str, ctx: &Arc<HeadlessRenderContext>) -> TextureHandle {
        TextureHandle::new(TextureEntry::new(name, ctx.clone()))
    }

    #[test]
    fn test_on_loaded_fires_immediately_when_loaded() {
        let ctx = context();
        let handle = entry("tex", &ctx);
        handle.mark_loaded(pixel_info(), "bitmap", resource(&ctx));

        let fired = Rc::new(Cell::new(0));
        let counter = fired.clone();
        handle.on_loaded(move |_| counter.set(counter.get() + 1));
        assert_eq!(fired.get(), 1, "ran synchronously");
        assert_eq!(handle.on_loaded.len(), 0, "nothing was queued");
    }

    #[test]
    fn test_queued_on_loaded_fires_once_in_order() {
        let ctx = context();
        let handle = entry("tex", &ctx);
        let order = Rc::new(RefCell::new(Vec::new()));
        for i in 0..3 {
            let order = order.clone();
            handle.on_loaded(move |_| order.borrow_mut().push(i));
        }

        handle.mark_loaded(pixel_info(), "bitmap", resource(&ctx));
        handle.set_resource(resource(&ctx));
        assert_eq!(*order.borrow(), [0, 1, 2]);
        assert!(handle.is_loaded());
        assert!(handle.is_srgb());
    }

    #[test]
    fn test_set_resource_same_pointer_is_noop() {
        let ctx = context();
        let handle = entry("tex", &ctx);
        let texture = resource(&ctx);
        handle.set_resource(texture.clone());
        assert_eq!(handle.update_counter(), 1);

        handle.set_resource(texture);
        assert_eq!(handle.update_counter(), 1);
        assert_eq!(ctx.pending_retirements(), 0);
    }

    #[test]
    fn test_swap_retires_previous_resource() {
        let ctx = context();
        let handle = entry("tex", &ctx);
        let first = resource(&ctx);
        let first_id = first.texture;
        handle.set_resource(first);

        let changes = Rc::new(Cell::new(0));
        let counter = changes.clone();
        handle.on_resource_changed(move |_| counter.set(counter.get() + 1));

        handle.set_resource(resource(&ctx));
        assert_eq!(handle.update_counter(), 2);
        assert_eq!(changes.get(), 1);
        assert_eq!(ctx.pending_retirements(), 1);
        assert!(ctx.is_alive(first_id), "kept alive for in-flight frames");

        ctx.advance_frame();
        assert!(!ctx.is_alive(first_id));
    }

    #[test]
    fn test_expired_change_listener_is_pruned_on_dispatch() {
        let ctx = context();
        let handle = entry("tex", &ctx);
        let guard = Liveness::new();
        let fired = Rc::new(Cell::new(0));
        let counter = fired.clone();
        handle.on_resource_changed_while(guard.token(), move |_| counter.set(counter.get() + 1));

        handle.set_resource(resource(&ctx));
        assert_eq!(fired.get(), 1);
        drop(guard);
        assert_eq!(handle.on_resource_changed.len(), 1, "pruned lazily");

        handle.set_resource(resource(&ctx));
        assert_eq!(fired.get(), 1);
        assert_eq!(handle.on_resource_changed.len(), 0);
    }

    #[test]
    fn test_drop_fires_on_remove_fifo_before_release() {
        let ctx = context();
        let handle = entry("tex", &ctx);
        handle.set_resource(resource(&ctx));

        let order = Rc::new(RefCell::new(Vec::new()));
        for i in 0..3 {
            let order = order.clone();
            handle.on_remove(move |entry| {
                assert!(entry.resource().is_some(), "resource still bound");
                order.borrow_mut().push(i);
            });
        }
        let guard = Liveness::new();
        let pruned = order.clone();
        handle.on_remove_while(guard.token(), move |_| pruned.borrow_mut().push(99));
        drop(guard);

        drop(handle);
        assert_eq!(*order.borrow(), [0, 1, 2]);
        assert_eq!(ctx.pending_retirements(), 1);
    }

    #[test]
    fn test_reset_retires_without_callbacks() {
        let ctx = context();
        let handle = entry("tex", &ctx);
        handle.mark_loaded(pixel_info(), "bitmap", resource(&ctx));

        let changes = Rc::new(Cell::new(0));
        let counter = changes.clone();
        handle.on_resource_changed(move |_| counter.set(counter.get() + 1));

        handle.reset();
        assert!(handle.resource().is_none());
        assert!(!handle.is_loaded());
        assert_eq!(handle.update_counter(), 2);
        assert_eq!(changes.get(), 0);
        assert_eq!(handle.on_resource_changed.len(), 1);
    }

    #[test]
    fn test_reset_ignores_error_texture() {
        let ctx = context();
        let handle = entry(ERROR_TEXTURE_NAME, &ctx);
        let texture = resource(&ctx);
        handle.mark_builtin(pixel_info(), texture.clone());
        let flags = handle.flags();

        handle.reset();
        assert_eq!(handle.flags(), flags);
        assert!(Arc::ptr_eq(&handle.resource().unwrap(), &texture));
    }

    #[test]
    fn test_failure_binds_error_resource_and_notifies() {
        let ctx = context();
        let error = resource(&ctx);
        let handle = entry("tex", &ctx);

        let notified = Rc::new(Cell::new(false));
        let flag = notified.clone();
        handle.on_loaded(move |entry| flag.set(entry.is_error()));

        handle.mark_failed(error.clone());
        assert!(notified.get());
        assert!(handle.is_error());
        assert!(!handle.is_loaded());
        assert!(Arc::ptr_eq(&handle.resource().unwrap(), &error));
    }

    #[test]
    fn test_leaving_the_error_state_keeps_the_error_resource() {
        let ctx = context();
        let error = resource(&ctx);
        let error_id = error.texture;

        let handle = entry("tex", &ctx);
        handle.mark_failed(error.clone());
        handle.mark_loaded(pixel_info(), "bitmap", resource(&ctx));
        assert_eq!(ctx.pending_retirements(), 0);

        let other = entry("other", &ctx);
        other.mark_failed(error.clone());
        other.reset();
        drop(other);
        ctx.advance_frame();
        assert!(ctx.is_alive(error_id));

        drop(handle);
        assert_eq!(ctx.pending_retirements(), 1, "only the decoded resource");
    }

    #[test]
    fn test_weak_handle_upgrade() {
        let ctx = context();
        let handle = entry("tex", &ctx);
        let weak = handle.downgrade();
        assert!(TextureHandle::ptr_eq(&weak.upgrade().unwrap(), &handle));
        drop(handle);
        assert!(weak.upgrade().is_none());
    }
}
