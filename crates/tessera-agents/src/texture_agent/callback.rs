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

//! Callback queues whose entries expire with their owner.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

/// Tells whether the owner of a callback is still alive.
///
/// A callback registered with a token is pruned instead of invoked once the
/// token reports its owner gone.
pub struct LivenessToken(Box<dyn Fn() -> bool>);

impl LivenessToken {
    /// A token that stays alive as long as `owner` has a strong reference.
    pub fn tied_to<T: ?Sized + 'static>(owner: &Rc<T>) -> Self {
        let weak = Rc::downgrade(owner);
        Self(Box::new(move || weak.strong_count() > 0))
    }

    /// A token backed by an arbitrary check.
    pub fn from_fn(is_alive: impl Fn() -> bool + 'static) -> Self {
        Self(Box::new(is_alive))
    }

    /// Checks if the owner is still alive.
    pub fn is_alive(&self) -> bool {
        (self.0)()
    }
}

impl fmt::Debug for LivenessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LivenessToken")
            .field(&self.is_alive())
            .finish()
    }
}

/// An owner-side guard. Every token it hands out expires when it is dropped.
///
/// Useful for objects that are not themselves behind an `Rc`:
///
/// ```
/// use tessera_agents::texture_agent::Liveness;
///
/// let guard = Liveness::new();
/// let token = guard.token();
/// assert!(token.is_alive());
/// drop(guard);
/// assert!(!token.is_alive());
/// ```
#[derive(Debug, Default)]
pub struct Liveness(Rc<()>);

impl Liveness {
    /// Creates a live guard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hands out a token tied to this guard.
    pub fn token(&self) -> LivenessToken {
        LivenessToken::tied_to(&self.0)
    }
}

pub(crate) struct Listener<F: ?Sized> {
    pub(crate) callback: Box<F>,
    token: Option<LivenessToken>,
}

impl<F: ?Sized> Listener<F> {
    pub(crate) fn is_alive(&self) -> bool {
        self.token.as_ref().map_or(true, LivenessToken::is_alive)
    }
}

/// A FIFO of listeners that can be taken out for dispatch.
///
/// Dispatch takes the whole queue, so callbacks may register new listeners
/// while they run; those land in the emptied queue and are merged back after
/// the survivors with [`restore`](Self::restore).
pub(crate) struct CallbackQueue<F: ?Sized> {
    listeners: RefCell<VecDeque<Listener<F>>>,
}

impl<F: ?Sized> Default for CallbackQueue<F> {
    fn default() -> Self {
        Self {
            listeners: RefCell::new(VecDeque::new()),
        }
    }
}

impl<F: ?Sized> CallbackQueue<F> {
    pub(crate) fn push(&self, callback: Box<F>, token: Option<LivenessToken>) {
        self.listeners
            .borrow_mut()
            .push_back(Listener { callback, token });
    }

    pub(crate) fn take(&self) -> VecDeque<Listener<F>> {
        std::mem::take(&mut *self.listeners.borrow_mut())
    }

    pub(crate) fn take_mut(&mut self) -> VecDeque<Listener<F>> {
        std::mem::take(self.listeners.get_mut())
    }

    /// Puts dispatched survivors back in front of anything registered during
    /// the dispatch.
    pub(crate) fn restore(&self, mut survivors: VecDeque<Listener<F>>) {
        let mut listeners = self.listeners.borrow_mut();
        survivors.append(&mut *listeners);
        *listeners = survivors;
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners.borrow().len()
    }
}
