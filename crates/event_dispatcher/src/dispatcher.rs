//! Dispatcher handles
//!
//! A [`Dispatcher`] is a cheap, clonable handle to one node of a
//! [`DispatchHub`]. Listeners subscribe to a category `C` and receive every
//! published message whose type satisfies `C`: the type itself, a trait it
//! declares, or a base message it extends.

use std::fmt;
use std::rc::{Rc, Weak};

use compact_str::CompactString;
use tracing::debug;

use crate::error::EventError;
use crate::hub::{DispatchHub, HubShared};
use crate::message::Message;
use crate::node::{Node, NodeId};
use crate::pool::{Pooled, ScopedMessage};
use crate::propagation;
use crate::stats::DispatcherStats;
use crate::table::{ListenerFn, ListenerId};

/// Handle to a dispatcher living in a [`DispatchHub`].
///
/// Handles compare equal when they refer to the same dispatcher of the same
/// hub. Operations on a handle whose dispatcher was removed fail with
/// [`EventError::NodeNotFound`], except `unsubscribe` and `remove_forward`,
/// which simply report that nothing was removed.
#[derive(Clone)]
pub struct Dispatcher {
    shared: Rc<HubShared>,
    id: NodeId,
}

impl Dispatcher {
    pub(crate) fn new(shared: Rc<HubShared>, id: NodeId) -> Self {
        Self { shared, id }
    }

    pub(crate) fn belongs_to(&self, shared: &Rc<HubShared>) -> bool {
        Rc::ptr_eq(&self.shared, shared)
    }

    fn node(&self) -> Result<Rc<Node>, EventError> {
        self.shared
            .node(self.id)
            .ok_or(EventError::NodeNotFound(self.id))
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Name given at creation
    pub fn name(&self) -> Result<CompactString, EventError> {
        Ok(self.node()?.name().clone())
    }

    /// Whether this is the hub's global dispatcher
    pub fn is_global(&self) -> bool {
        self.id == self.shared.global
    }

    /// Whether the dispatcher is still part of its hub
    pub fn is_alive(&self) -> bool {
        self.shared.is_alive(self.id)
    }

    /// The hub this dispatcher belongs to
    pub fn hub(&self) -> DispatchHub {
        DispatchHub::from_shared(Rc::clone(&self.shared))
    }

    /// Registers `listener` for every message satisfying category `C`.
    ///
    /// Listeners of one category run in registration order. A listener added
    /// while a publish pass is running only sees later passes.
    ///
    /// ```rust
    /// use event_dispatcher::{message, DispatchHub};
    ///
    /// trait Shape {
    ///     fn area(&self) -> f32;
    /// }
    ///
    /// struct Square(f32);
    /// impl Shape for Square {
    ///     fn area(&self) -> f32 {
    ///         self.0 * self.0
    ///     }
    /// }
    /// message!(Square: dyn Shape);
    ///
    /// let hub = DispatchHub::new();
    /// let shapes = hub.create("shapes");
    /// shapes.subscribe::<dyn Shape, _>(|shape| {
    ///     assert_eq!(shape.area(), 4.0);
    ///     Ok(())
    /// })?;
    /// shapes.publish(&Square(2.0))?;
    /// # Ok::<(), event_dispatcher::EventError>(())
    /// ```
    pub fn subscribe<C, F>(&self, listener: F) -> Result<ListenerId, EventError>
    where
        C: ?Sized + 'static,
        F: Fn(&C) -> Result<(), EventError> + 'static,
    {
        self.subscribe_shared::<C>(Rc::new(listener))
    }

    /// Registers an already shared listener
    pub fn subscribe_shared<C: ?Sized + 'static>(
        &self,
        listener: ListenerFn<C>,
    ) -> Result<ListenerId, EventError> {
        let node = self.node()?;
        let id = self.shared.next_listener_id();
        node.subscribe::<C>(id, listener, &self.shared.registry)?;

        debug!(
            "📝 Registered {} for {} on '{}'",
            id,
            std::any::type_name::<C>(),
            node.name()
        );
        Ok(id)
    }

    /// Removes a listener of category `C`; returns whether it was registered.
    pub fn unsubscribe<C: ?Sized + 'static>(&self, id: ListenerId) -> bool {
        let Ok(node) = self.node() else {
            return false;
        };
        let removed = node.unsubscribe::<C>(id);
        if removed {
            debug!(
                "🔌 Unregistered {} for {} on '{}'",
                id,
                std::any::type_name::<C>(),
                node.name()
            );
        }
        removed
    }

    /// Drops every listener table along with the dispatch cache.
    ///
    /// The cache goes too, so cleared listeners never keep firing for
    /// message types that were already cached. Listener destructors run
    /// after the node is unlocked and may use the dispatcher again.
    pub fn clear_listeners(&self) -> Result<(), EventError> {
        let node = self.node()?;
        node.clear_listeners();
        debug!("🧹 Cleared listeners on '{}'", node.name());
        Ok(())
    }

    /// Forwards everything published here to `target` as well.
    ///
    /// Adding an existing edge is a no-op. Fails with
    /// [`EventError::InvalidForwardTarget`] when `target` was removed or
    /// belongs to another hub.
    pub fn add_forward(&self, target: &Dispatcher) -> Result<(), EventError> {
        if !target.belongs_to(&self.shared) || !target.is_alive() {
            return Err(EventError::InvalidForwardTarget { target: target.id });
        }
        let node = self.node()?;
        if node.add_forward(target.id) {
            debug!("🔗 '{}' now forwards to {}", node.name(), target.id);
        }
        Ok(())
    }

    /// Removes a forward edge; returns whether it existed.
    pub fn remove_forward(&self, target: &Dispatcher) -> bool {
        if !target.belongs_to(&self.shared) {
            return false;
        }
        self.node()
            .map(|node| node.remove_forward(target.id))
            .unwrap_or(false)
    }

    /// Current forward targets, dead ones included until the next publish
    pub fn forwards(&self) -> Vec<NodeId> {
        self.node()
            .map(|node| node.forwards().into_vec())
            .unwrap_or_default()
    }

    /// Delivers `message` here, to every dispatcher reachable through
    /// forward edges, and to the global dispatcher, each at most once.
    ///
    /// The first listener error aborts the pass and is returned.
    pub fn publish<M: Message>(&self, message: &M) -> Result<(), EventError> {
        propagation::publish(&self.shared, self.id, message)
    }

    /// [`publish`](Self::publish) for an optional message; `None` is a no-op.
    pub fn publish_optional<M: Message>(&self, message: Option<&M>) -> Result<(), EventError> {
        match message {
            Some(message) => self.publish(message),
            None => Ok(()),
        }
    }

    /// Lends a pooled `M` that is published here when the scope ends.
    ///
    /// ```rust
    /// use event_dispatcher::{message, DispatchHub, Pooled};
    ///
    /// #[derive(Default)]
    /// struct Damage {
    ///     amount: u32,
    /// }
    /// message!(Damage);
    /// impl Pooled for Damage {
    ///     fn reset(&mut self) {
    ///         self.amount = 0;
    ///     }
    /// }
    ///
    /// let hub = DispatchHub::new();
    /// let combat = hub.create("combat");
    /// combat.subscribe::<Damage, _>(|damage| {
    ///     assert_eq!(damage.amount, 12);
    ///     Ok(())
    /// })?;
    ///
    /// let mut damage = combat.publish_scoped::<Damage>();
    /// damage.amount = 12;
    /// damage.finish()?;
    /// assert_eq!(hub.pool().available::<Damage>(), 1);
    /// # Ok::<(), event_dispatcher::EventError>(())
    /// ```
    pub fn publish_scoped<M: Pooled>(&self) -> ScopedMessage<M> {
        ScopedMessage::new(Rc::clone(&self.shared), self.id)
    }

    /// Publishes a pooled `M` in its default state right away.
    pub fn send<M: Pooled>(&self) -> Result<(), EventError> {
        self.publish_scoped::<M>().finish()
    }

    /// Counters and structure sizes for this dispatcher
    pub fn stats(&self) -> Result<DispatcherStats, EventError> {
        Ok(self.node()?.stats())
    }

    /// A handle that does not keep the hub alive
    pub fn downgrade(&self) -> WeakDispatcher {
        WeakDispatcher {
            shared: Rc::downgrade(&self.shared),
            id: self.id,
        }
    }
}

impl PartialEq for Dispatcher {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && Rc::ptr_eq(&self.shared, &other.shared)
    }
}

impl Eq for Dispatcher {}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.shared.node(self.id).map(|node| node.name().clone());
        f.debug_struct("Dispatcher")
            .field("id", &self.id)
            .field("name", &name)
            .finish()
    }
}

/// Non-owning dispatcher handle, suitable for capture inside listeners.
#[derive(Clone)]
pub struct WeakDispatcher {
    shared: Weak<HubShared>,
    id: NodeId,
}

impl WeakDispatcher {
    /// Upgrades if both the hub and the dispatcher are still alive
    pub fn upgrade(&self) -> Option<Dispatcher> {
        let shared = self.shared.upgrade()?;
        shared
            .is_alive(self.id)
            .then(|| Dispatcher::new(shared, self.id))
    }

    pub fn id(&self) -> NodeId {
        self.id
    }
}

impl fmt::Debug for WeakDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakDispatcher").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    #[test]
    fn test_listener_ids_are_unique_across_dispatchers() {
        let hub = DispatchHub::new();
        let a = hub.create("a");
        let b = hub.create("b");
        let first = a.subscribe::<u8, _>(|_| Ok(())).unwrap();
        let second = b.subscribe::<u8, _>(|_| Ok(())).unwrap();
        assert_ne!(first, second);
        assert!(!a.unsubscribe::<u8>(second));
        assert!(b.unsubscribe::<u8>(second));
    }

    #[test]
    fn test_add_forward_rejects_foreign_and_removed_targets() {
        let hub = DispatchHub::new();
        let other = DispatchHub::new();
        let a = hub.create("a");
        let b = hub.create("b");
        let stranger = other.create("stranger");

        assert!(matches!(
            a.add_forward(&stranger),
            Err(EventError::InvalidForwardTarget { target }) if target == stranger.id()
        ));

        hub.remove(&b).unwrap();
        assert!(matches!(
            a.add_forward(&b),
            Err(EventError::InvalidForwardTarget { .. })
        ));
        assert!(a.forwards().is_empty());
    }

    #[test]
    fn test_add_forward_is_idempotent() {
        let hub = DispatchHub::new();
        let a = hub.create("a");
        let b = hub.create("b");
        a.add_forward(&b).unwrap();
        a.add_forward(&b).unwrap();
        assert_eq!(a.forwards(), vec![b.id()]);
        assert!(a.remove_forward(&b));
        assert!(!a.remove_forward(&b));
    }

    #[test]
    fn test_publish_optional_none_is_noop() {
        let hub = DispatchHub::new();
        let a = hub.create("a");
        let hits = Rc::new(Cell::new(0));
        let seen = Rc::clone(&hits);
        hub.global()
            .subscribe::<u8, _>(move |_| {
                seen.set(seen.get() + 1);
                Ok(())
            })
            .unwrap();

        a.publish_optional::<u8>(None).unwrap();
        assert_eq!(hits.get(), 0);
        a.publish_optional(Some(&3_u8)).unwrap();
        assert_eq!(hits.get(), 1);
        assert_eq!(a.stats().unwrap().messages_published, 1);
    }

    #[test]
    fn test_listener_may_resubscribe_during_publish() {
        let hub = DispatchHub::new();
        let a = hub.create("a");
        let calls = Rc::new(RefCell::new(Vec::new()));

        let weak = a.downgrade();
        let log = Rc::clone(&calls);
        a.subscribe::<u8, _>(move |value| {
            log.borrow_mut().push(*value);
            if let Some(dispatcher) = weak.upgrade() {
                let log = Rc::clone(&log);
                dispatcher.subscribe::<u8, _>(move |value| {
                    log.borrow_mut().push(value + 100);
                    Ok(())
                })?;
            }
            Ok(())
        })
        .unwrap();

        a.publish(&1_u8).unwrap();
        assert_eq!(*calls.borrow(), vec![1]);
        a.publish(&2_u8).unwrap();
        assert_eq!(*calls.borrow(), vec![1, 2, 102]);
    }

    #[test]
    fn test_weak_handle_does_not_outlive_dispatcher() {
        let hub = DispatchHub::new();
        let a = hub.create("a");
        let weak = a.downgrade();
        assert_eq!(weak.upgrade(), Some(a.clone()));

        hub.remove(&a).unwrap();
        assert!(weak.upgrade().is_none());

        let global = hub.global().downgrade();
        drop(a);
        drop(hub);
        assert!(global.upgrade().is_none());
    }

    #[test]
    fn test_operations_on_removed_dispatcher() {
        let hub = DispatchHub::new();
        let a = hub.create("a");
        hub.remove(&a).unwrap();

        assert!(matches!(a.subscribe::<u8, _>(|_| Ok(())), Err(EventError::NodeNotFound(_))));
        assert!(matches!(a.clear_listeners(), Err(EventError::NodeNotFound(_))));
        assert!(matches!(a.stats(), Err(EventError::NodeNotFound(_))));
        assert!(matches!(a.name(), Err(EventError::NodeNotFound(_))));
        assert!(!a.unsubscribe::<u8>(ListenerId::new(1)));
    }
}
