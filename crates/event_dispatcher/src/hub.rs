//! The dispatcher arena
//!
//! A [`DispatchHub`] owns every dispatcher created through it together with
//! the state they share: the type registry, the message pool and the global
//! dispatcher every publish ends up on.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use compact_str::CompactString;
use tracing::{debug, info, warn};

use crate::config::HubConfig;
use crate::dispatcher::Dispatcher;
use crate::error::EventError;
use crate::message::Message;
use crate::node::{Node, NodeId};
use crate::pool::MessagePool;
use crate::registry::TypeRegistry;
use crate::stats::HubStats;
use crate::table::ListenerId;

struct Slot {
    generation: u32,
    node: Option<Rc<Node>>,
}

/// State shared by a hub and every handle into it
pub(crate) struct HubShared {
    pub(crate) config: HubConfig,
    pub(crate) registry: TypeRegistry,
    pub(crate) pool: MessagePool,
    pub(crate) global: NodeId,
    slots: RefCell<Vec<Slot>>,
    vacant: RefCell<Vec<u32>>,
    next_listener: Cell<u64>,
}

impl HubShared {
    pub(crate) fn node(&self, id: NodeId) -> Option<Rc<Node>> {
        self.slots
            .borrow()
            .get(id.index() as usize)
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.node.clone())
    }

    pub(crate) fn is_alive(&self, id: NodeId) -> bool {
        self.slots
            .borrow()
            .get(id.index() as usize)
            .is_some_and(|slot| slot.generation == id.generation() && slot.node.is_some())
    }

    pub(crate) fn next_listener_id(&self) -> ListenerId {
        let raw = self.next_listener.get();
        self.next_listener.set(raw + 1);
        ListenerId::new(raw)
    }

    fn live_nodes(&self) -> Vec<Rc<Node>> {
        self.slots
            .borrow()
            .iter()
            .filter_map(|slot| slot.node.clone())
            .collect()
    }
}

/// Owner of a set of dispatchers connected by forward edges.
///
/// Cloning a hub yields another handle to the same dispatchers. Dispatcher
/// handles keep the hub alive, so listeners that refer back to a dispatcher
/// should capture a [`WeakDispatcher`](crate::WeakDispatcher) to avoid a
/// reference cycle.
///
/// ```rust
/// use event_dispatcher::DispatchHub;
///
/// let hub = DispatchHub::new();
/// let audio = hub.create("audio");
/// hub.global().subscribe::<u32, _>(|code| {
///     println!("global saw {code}");
///     Ok(())
/// })?;
///
/// audio.publish(&7_u32)?;
/// # Ok::<(), event_dispatcher::EventError>(())
/// ```
#[derive(Clone)]
pub struct DispatchHub {
    shared: Rc<HubShared>,
}

impl DispatchHub {
    /// Create a hub with the default configuration
    pub fn new() -> Self {
        Self::with_config(HubConfig::default())
    }

    /// Create a hub, its global dispatcher and an empty message pool
    pub fn with_config(config: HubConfig) -> Self {
        let global = NodeId::new(0, 0);
        let node = Node::new(global, config.global_name.clone());

        info!(
            "🚀 Dispatch hub created (global dispatcher '{}', pool cap {:?})",
            config.global_name, config.max_pooled_per_type
        );

        let shared = HubShared {
            pool: MessagePool::new(config.max_pooled_per_type),
            registry: TypeRegistry::new(),
            global,
            slots: RefCell::new(vec![Slot {
                generation: 0,
                node: Some(Rc::new(node)),
            }]),
            vacant: RefCell::new(Vec::new()),
            next_listener: Cell::new(1),
            config,
        };
        Self {
            shared: Rc::new(shared),
        }
    }

    pub(crate) fn from_shared(shared: Rc<HubShared>) -> Self {
        Self { shared }
    }

    /// The global dispatcher
    pub fn global(&self) -> Dispatcher {
        Dispatcher::new(Rc::clone(&self.shared), self.shared.global)
    }

    /// Create a dispatcher, reusing the slot of a removed one when possible.
    pub fn create(&self, name: &str) -> Dispatcher {
        let reused = self.shared.vacant.borrow_mut().pop();
        let mut slots = self.shared.slots.borrow_mut();

        let id = match reused {
            Some(index) => {
                let slot = &mut slots[index as usize];
                let id = NodeId::new(index, slot.generation);
                slot.node = Some(Rc::new(Node::new(id, CompactString::new(name))));
                id
            }
            None => {
                let id = NodeId::new(slots.len() as u32, 0);
                slots.push(Slot {
                    generation: 0,
                    node: Some(Rc::new(Node::new(id, CompactString::new(name)))),
                });
                id
            }
        };
        drop(slots);

        debug!("📝 Created dispatcher '{}' as {}", name, id);
        Dispatcher::new(Rc::clone(&self.shared), id)
    }

    /// Look up a live dispatcher by id
    pub fn get(&self, id: NodeId) -> Option<Dispatcher> {
        self.shared
            .is_alive(id)
            .then(|| Dispatcher::new(Rc::clone(&self.shared), id))
    }

    /// Removes a dispatcher from the hub.
    ///
    /// Its listeners are dropped once no publish pass still runs on it, and
    /// forward edges pointing at it are pruned lazily. Handles to it fail
    /// with [`EventError::NodeNotFound`] from then on. The slot is reused by
    /// a later `create` unless its generation counter is exhausted.
    pub fn remove(&self, dispatcher: &Dispatcher) -> Result<(), EventError> {
        let id = dispatcher.id();
        if !dispatcher.belongs_to(&self.shared) {
            return Err(EventError::NodeNotFound(id));
        }
        if id == self.shared.global {
            return Err(EventError::CannotRemoveGlobal);
        }

        let (removed, reusable) = {
            let mut slots = self.shared.slots.borrow_mut();
            let slot = slots
                .get_mut(id.index() as usize)
                .filter(|slot| slot.generation == id.generation())
                .ok_or(EventError::NodeNotFound(id))?;
            let node = slot.node.take().ok_or(EventError::NodeNotFound(id))?;
            // A slot whose generation is exhausted is retired for good, so
            // a wrapped generation can never revive a stale id.
            match slot.generation.checked_add(1) {
                Some(next) => {
                    slot.generation = next;
                    (node, true)
                }
                None => (node, false),
            }
        };
        if reusable {
            self.shared.vacant.borrow_mut().push(id.index());
        } else {
            warn!("⚠️ Retired exhausted dispatcher slot {}", id.index());
        }

        info!("🗑️ Removed dispatcher '{}' ({})", removed.name(), id);
        // Dropped outside the slot borrow; listener destructors may touch the hub.
        drop(removed);
        Ok(())
    }

    /// Every live dispatcher, the global one first
    pub fn dispatchers(&self) -> Vec<Dispatcher> {
        self.shared
            .slots
            .borrow()
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.node.is_some())
            .map(|(index, slot)| {
                Dispatcher::new(
                    Rc::clone(&self.shared),
                    NodeId::new(index as u32, slot.generation),
                )
            })
            .collect()
    }

    /// The type registry shared by this hub's dispatchers
    pub fn registry(&self) -> &TypeRegistry {
        &self.shared.registry
    }

    /// Whether a message of type `M` would reach listeners of category `C`
    pub fn satisfies<C: ?Sized + 'static, M: Message>(&self) -> bool {
        self.shared.registry.satisfies_type::<C, M>()
    }

    /// The pool backing [`Dispatcher::publish_scoped`]
    pub fn pool(&self) -> &MessagePool {
        &self.shared.pool
    }

    pub fn config(&self) -> &HubConfig {
        &self.shared.config
    }

    /// Totals across the hub
    pub fn stats(&self) -> HubStats {
        let nodes = self.shared.live_nodes();
        HubStats {
            dispatchers: nodes.len(),
            registered_types: self.shared.registry.len(),
            memoized_answers: self.shared.registry.memoized(),
            pooled_instances: self.shared.pool.total_available(),
            listeners: nodes.iter().map(|node| node.listener_count()).sum(),
            messages_published: nodes.iter().map(|node| node.published()).sum(),
        }
    }
}

impl Default for DispatchHub {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DispatchHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchHub")
            .field("global", &self.shared.config.global_name)
            .field("dispatchers", &self.shared.live_nodes().len())
            .field("registry", &self.shared.registry)
            .field("pool", &self.shared.pool)
            .finish()
    }
}
