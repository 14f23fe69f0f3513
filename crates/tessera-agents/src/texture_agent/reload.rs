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

//! Deferred rebuilds of objects that depend on reloaded textures.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// An object (typically a material) whose GPU state embeds texture
/// resources and must be rebuilt when one of them changes.
pub trait ShaderDependent {
    /// A name used in logs.
    fn label(&self) -> &str;
}

/// Rebuilds one dependent object. Installed on the agent with
/// [`TextureAgent::set_reload_handler`](super::TextureAgent::set_reload_handler).
pub type ReloadHandler = Box<dyn FnMut(&Rc<dyn ShaderDependent>)>;

/// Objects waiting for a rebuild.
///
/// The queue only holds weak references and at most one per live object, so
/// it stays bounded while no handler drains it. Cloning the queue shares its
/// contents, which is how resource change callbacks reach it.
#[derive(Clone, Default)]
pub struct ReloadQueue {
    pending: Rc<RefCell<Vec<Weak<dyn ShaderDependent>>>>,
}

impl std::fmt::Debug for ReloadQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReloadQueue")
            .field("pending", &self.len())
            .finish()
    }
}

impl ReloadQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `object` for a rebuild at the next drain.
    pub fn mark_for_reload<T: ShaderDependent + 'static>(&self, object: &Rc<T>) {
        let object: Rc<dyn ShaderDependent> = object.clone();
        self.mark_weak(Rc::downgrade(&object));
    }

    /// Schedules an already downgraded object. Marking an object twice
    /// before a drain keeps one mark.
    pub fn mark_weak(&self, object: Weak<dyn ShaderDependent>) {
        if object.strong_count() == 0 {
            return;
        }
        let mut pending = self.pending.borrow_mut();
        pending.retain(|weak| weak.strong_count() > 0);
        if !pending.iter().any(|weak| same_object(weak, &object)) {
            pending.push(object);
        }
    }

    /// Number of distinct objects marked, some may have died since.
    pub fn len(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Checks if nothing is marked.
    pub fn is_empty(&self) -> bool {
        self.pending.borrow().is_empty()
    }

    /// Runs `handler` once per live object marked since the last drain, in
    /// marking order, then empties the queue. Returns the number of rebuilds.
    ///
    /// Without a handler nothing happens and the marks are kept.
    pub fn drain(&self, handler: Option<&mut ReloadHandler>) -> usize {
        let Some(handler) = handler else {
            return 0;
        };
        // Taken first so the handler may mark objects for the next drain.
        let pending = std::mem::take(&mut *self.pending.borrow_mut());

        let mut rebuilt = 0;
        for object in pending.iter().filter_map(Weak::upgrade) {
            log::debug!("Rebuilding '{}' after a texture change", object.label());
            handler(&object);
            rebuilt += 1;
        }
        rebuilt
    }
}

fn same_object(a: &Weak<dyn ShaderDependent>, b: &Weak<dyn ShaderDependent>) -> bool {
    std::ptr::addr_eq(a.as_ptr(), b.as_ptr())
}
