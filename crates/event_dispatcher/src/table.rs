//! Per-category listener tables

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;
use tracing::{trace, warn};

use crate::error::EventError;
use crate::message::Envelope;
use crate::registry::TypeRegistry;

/// Shared listener callback for category `C`
pub type ListenerFn<C> = Rc<dyn Fn(&C) -> Result<(), EventError>>;

/// Handle returned by [`Dispatcher::subscribe`](crate::Dispatcher::subscribe),
/// used to unsubscribe later. Unique within a hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw numeric value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

/// Type-erased face of a [`ListenerTable`], as stored by nodes and caches.
pub(crate) trait DispatchTable {
    fn category(&self) -> TypeId;

    fn category_name(&self) -> &'static str;

    /// Delivers the message to every listener registered when the call
    /// starts. Returns how many listeners ran.
    fn dispatch(&self, registry: &TypeRegistry, envelope: &Envelope<'_>)
        -> Result<usize, EventError>;

    fn listener_count(&self) -> usize;

    fn as_any(&self) -> &dyn Any;
}

/// Ordered multicast of listeners for one category.
pub(crate) struct ListenerTable<C: ?Sized + 'static> {
    listeners: RefCell<SmallVec<[(ListenerId, ListenerFn<C>); 4]>>,
}

impl<C: ?Sized + 'static> ListenerTable<C> {
    pub(crate) fn new() -> Self {
        Self {
            listeners: RefCell::new(SmallVec::new()),
        }
    }

    pub(crate) fn subscribe(&self, id: ListenerId, listener: ListenerFn<C>) {
        self.listeners.borrow_mut().push((id, listener));
    }

    /// Removes the first listener registered under `id` and hands it back,
    /// so the caller can drop it once no borrow is held.
    pub(crate) fn unsubscribe(&self, id: ListenerId) -> Option<ListenerFn<C>> {
        let mut listeners = self.listeners.borrow_mut();
        let index = listeners.iter().position(|(existing, _)| *existing == id)?;
        Some(listeners.remove(index).1)
    }
}

impl<C: ?Sized + 'static> DispatchTable for ListenerTable<C> {
    fn category(&self) -> TypeId {
        TypeId::of::<C>()
    }

    fn category_name(&self) -> &'static str {
        std::any::type_name::<C>()
    }

    fn dispatch(
        &self,
        registry: &TypeRegistry,
        envelope: &Envelope<'_>,
    ) -> Result<usize, EventError> {
        if !envelope.message.condition_met() {
            trace!(
                "⏸️ Delivery condition not met for {} on {}",
                envelope.type_name,
                self.category_name()
            );
            return Ok(0);
        }

        // Listeners added or removed from here on apply to the next pass.
        let snapshot: SmallVec<[ListenerFn<C>; 8]> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();
        if snapshot.is_empty() {
            return Ok(0);
        }

        let Some(view) = registry.view::<C>(envelope.type_id, envelope.payload) else {
            warn!(
                "⚠️ {} could not be viewed as {}",
                envelope.type_name,
                self.category_name()
            );
            return Ok(0);
        };

        for listener in &snapshot {
            listener(view)?;
        }
        Ok(snapshot.len())
    }

    fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
