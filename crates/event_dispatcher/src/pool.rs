//! Pooled, reusable messages
//!
//! A [`ScopedMessage`] borrows an instance from the hub's free list for its
//! message type. Once warmed up, acquiring, publishing and releasing an
//! instance performs no heap allocation: the same `Box` travels between the
//! free list and successive scopes. Callers must not keep references into a
//! scoped message past its release, since the instance is reset and lent out
//! again.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::rc::Rc;

use tracing::{error, trace};

use crate::error::EventError;
use crate::hub::HubShared;
use crate::message::Message;
use crate::node::NodeId;
use crate::propagation;

/// A message that can be recycled through a [`MessagePool`].
pub trait Pooled: Message + Default {
    /// Returns the instance to its pristine state before it goes back to the
    /// pool. Owned resources should be released here.
    fn reset(&mut self) {}
}

trait FreeList {
    fn len(&self) -> usize;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn as_any(&self) -> &dyn Any;
}

impl<M: Pooled> FreeList for Vec<Box<M>> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Per-type free lists of idle message instances.
pub struct MessagePool {
    free: RefCell<HashMap<TypeId, Box<dyn FreeList>>>,
    max_per_type: Option<usize>,
}

impl MessagePool {
    /// Create a pool keeping at most `max_per_type` idle instances per type
    pub fn new(max_per_type: Option<usize>) -> Self {
        Self {
            free: RefCell::new(HashMap::new()),
            max_per_type,
        }
    }

    /// Pops an idle instance or builds a default one.
    pub fn acquire<M: Pooled>(&self) -> Box<M> {
        let reused = self
            .free
            .borrow_mut()
            .get_mut(&TypeId::of::<M>())
            .and_then(|list| list.as_any_mut().downcast_mut::<Vec<Box<M>>>())
            .and_then(Vec::pop);

        reused.unwrap_or_else(|| {
            trace!("🆕 Allocating pooled {}", std::any::type_name::<M>());
            Box::default()
        })
    }

    /// Resets `instance` and stores it for reuse.
    pub fn release<M: Pooled>(&self, mut instance: Box<M>) {
        instance.reset();

        let mut free = self.free.borrow_mut();
        let list = free
            .entry(TypeId::of::<M>())
            .or_insert_with(|| Box::new(Vec::<Box<M>>::new()));
        let Some(list) = list.as_any_mut().downcast_mut::<Vec<Box<M>>>() else {
            return;
        };

        if self.max_per_type.is_some_and(|max| list.len() >= max) {
            trace!(
                "🗑️ Pool for {} is full, dropping instance",
                std::any::type_name::<M>()
            );
            return;
        }
        list.push(instance);
    }

    /// Idle instances of `M`
    pub fn available<M: Pooled>(&self) -> usize {
        self.free
            .borrow()
            .get(&TypeId::of::<M>())
            .and_then(|list| list.as_any().downcast_ref::<Vec<Box<M>>>())
            .map_or(0, Vec::len)
    }

    /// Idle instances across all types
    pub fn total_available(&self) -> usize {
        self.free.borrow().values().map(|list| list.len()).sum()
    }
}

impl Default for MessagePool {
    fn default() -> Self {
        Self::new(None)
    }
}

impl fmt::Debug for MessagePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessagePool")
            .field("types", &self.free.borrow().len())
            .field("idle", &self.total_available())
            .field("max_per_type", &self.max_per_type)
            .finish()
    }
}

/// A pooled message bound to the dispatcher that receives it on release.
///
/// Mutate it through `Deref`/`DerefMut`, then call [`finish`](Self::finish)
/// to publish and get the listener result back. Dropping the scope publishes
/// too, logging a listener failure instead of returning it.
pub struct ScopedMessage<M: Pooled> {
    hub: Rc<HubShared>,
    value: Option<Box<M>>,
    target: Option<NodeId>,
}

impl<M: Pooled> ScopedMessage<M> {
    pub(crate) fn new(hub: Rc<HubShared>, target: NodeId) -> Self {
        let value = hub.pool.acquire::<M>();
        Self {
            hub,
            value: Some(value),
            target: Some(target),
        }
    }

    /// The dispatcher this message will be published through, if still bound
    pub fn target(&self) -> Option<NodeId> {
        self.target
    }

    /// Cancels publication; the instance only goes back to the pool.
    pub fn unbind(&mut self) {
        self.target = None;
    }

    /// Publishes through the bound dispatcher and returns the instance to the
    /// pool, even when a listener fails.
    pub fn finish(mut self) -> Result<(), EventError> {
        self.release()
    }

    fn release(&mut self) -> Result<(), EventError> {
        let Some(value) = self.value.take() else {
            return Ok(());
        };

        let result = match self.target {
            Some(target) => propagation::publish(&self.hub, target, &*value),
            None => Ok(()),
        };
        self.hub.pool.release(value);
        self.target = None;
        result
    }
}

impl<M: Pooled> Deref for ScopedMessage<M> {
    type Target = M;

    fn deref(&self) -> &M {
        self.value
            .as_deref()
            .expect("scoped message accessed after release")
    }
}

impl<M: Pooled> DerefMut for ScopedMessage<M> {
    fn deref_mut(&mut self) -> &mut M {
        self.value
            .as_deref_mut()
            .expect("scoped message accessed after release")
    }
}

impl<M: Pooled> Drop for ScopedMessage<M> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            error!(
                "❌ Scoped {} failed during publish: {}",
                std::any::type_name::<M>(),
                e
            );
        }
    }
}

impl<M: Pooled + fmt::Debug> fmt::Debug for ScopedMessage<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedMessage")
            .field("value", &self.value)
            .field("target", &self.target)
            .finish()
    }
}
