//! Dispatcher nodes stored in the hub arena

use std::any::TypeId;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::cache::DispatchCache;
use crate::error::EventError;
use crate::registry::TypeRegistry;
use crate::stats::DispatcherStats;
use crate::table::{DispatchTable, ListenerFn, ListenerId, ListenerTable};

/// Generational index of a dispatcher inside its hub.
///
/// A removed dispatcher's slot may be reused; the generation keeps stale ids
/// from resolving to the newcomer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index in the hub arena
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Slot generation
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}v{}", self.index, self.generation)
    }
}

/// Scratch list of tables handed to a publish pass
pub(crate) type TableSnapshot = SmallVec<[Rc<dyn DispatchTable>; 8]>;

/// Scratch list of forward targets handed to a publish pass
pub(crate) type ForwardSnapshot = SmallVec<[NodeId; 4]>;

struct NodeState {
    /// Tables in registration order
    tables: Vec<Rc<dyn DispatchTable>>,
    /// Category to position in `tables`
    index: HashMap<TypeId, usize>,
    cache: DispatchCache,
    /// Forward targets, without duplicates
    forwards: SmallVec<[NodeId; 4]>,
}

#[derive(Default)]
struct Counters {
    published: Cell<u64>,
    received: Cell<u64>,
    invocations: Cell<u64>,
}

/// A single dispatcher: listener tables, dispatch cache and forward edges.
///
/// Every method releases its `RefCell` borrow before returning so that
/// listeners running in between may freely mutate the node again.
pub(crate) struct Node {
    id: NodeId,
    name: CompactString,
    state: RefCell<NodeState>,
    counters: Counters,
}

impl Node {
    pub(crate) fn new(id: NodeId, name: CompactString) -> Self {
        Self {
            id,
            name,
            state: RefCell::new(NodeState {
                tables: Vec::new(),
                index: HashMap::new(),
                cache: DispatchCache::new(),
                forwards: SmallVec::new(),
            }),
            counters: Counters::default(),
        }
    }

    pub(crate) fn name(&self) -> &CompactString {
        &self.name
    }

    /// Appends `listener` to the table for `C`, creating the table (and
    /// patching cached entries) when the category is new to this node.
    pub(crate) fn subscribe<C: ?Sized + 'static>(
        &self,
        id: ListenerId,
        listener: ListenerFn<C>,
        registry: &TypeRegistry,
    ) -> Result<(), EventError> {
        let mut state = self.state.borrow_mut();
        let category = TypeId::of::<C>();

        let existing = state.index.get(&category).copied();
        let table = match existing {
            Some(position) => Rc::clone(&state.tables[position]),
            None => {
                let table: Rc<dyn DispatchTable> = Rc::new(ListenerTable::<C>::new());
                let position = state.tables.len();
                state.tables.push(Rc::clone(&table));
                state.index.insert(category, position);
                state.cache.on_new_table(&table, registry);
                debug!(
                    "📝 Dispatcher '{}' created table for {}",
                    self.name,
                    table.category_name()
                );
                table
            }
        };

        let typed = table
            .as_any()
            .downcast_ref::<ListenerTable<C>>()
            .ok_or(EventError::CategoryMismatch {
                category: std::any::type_name::<C>(),
            })?;
        typed.subscribe(id, listener);
        Ok(())
    }

    /// Removes a listener. The removed closure is dropped after every borrow
    /// is released, since its captures may call back into the hub.
    pub(crate) fn unsubscribe<C: ?Sized + 'static>(&self, id: ListenerId) -> bool {
        let table = {
            let state = self.state.borrow();
            let Some(&position) = state.index.get(&TypeId::of::<C>()) else {
                return false;
            };
            Rc::clone(&state.tables[position])
        };
        let removed = table
            .as_any()
            .downcast_ref::<ListenerTable<C>>()
            .and_then(|table| table.unsubscribe(id));
        let found = removed.is_some();
        drop(removed);
        found
    }

    /// Drops every listener table together with the dispatch cache that
    /// references them.
    pub(crate) fn clear_listeners(&self) {
        let cleared = {
            let mut state = self.state.borrow_mut();
            (
                std::mem::take(&mut state.tables),
                std::mem::take(&mut state.index),
                std::mem::take(&mut state.cache),
            )
        };
        // Listener destructors may publish through this node again.
        drop(cleared);
    }

    /// Copies the tables matching `concrete` so they can be dispatched with
    /// no borrow held.
    pub(crate) fn snapshot_tables(&self, concrete: TypeId, registry: &TypeRegistry) -> TableSnapshot {
        let mut state = self.state.borrow_mut();
        let NodeState { tables, cache, .. } = &mut *state;
        cache
            .tables_for(concrete, tables, registry)
            .iter()
            .cloned()
            .collect()
    }

    pub(crate) fn add_forward(&self, target: NodeId) -> bool {
        let mut state = self.state.borrow_mut();
        if state.forwards.contains(&target) {
            return false;
        }
        state.forwards.push(target);
        true
    }

    pub(crate) fn remove_forward(&self, target: NodeId) -> bool {
        let mut state = self.state.borrow_mut();
        match state.forwards.iter().position(|existing| *existing == target) {
            Some(position) => {
                state.forwards.remove(position);
                true
            }
            None => false,
        }
    }

    /// Drops forward edges whose target is gone and returns the rest.
    pub(crate) fn live_forwards(&self, is_alive: impl Fn(NodeId) -> bool) -> ForwardSnapshot {
        let mut state = self.state.borrow_mut();
        let before = state.forwards.len();
        state.forwards.retain(|target| is_alive(*target));
        let pruned = before - state.forwards.len();
        if pruned > 0 {
            warn!(
                "⚠️ Dispatcher '{}' dropped {} forward edges to removed dispatchers",
                self.name, pruned
            );
        }
        state.forwards.iter().copied().collect()
    }

    pub(crate) fn forwards(&self) -> ForwardSnapshot {
        self.state.borrow().forwards.iter().copied().collect()
    }

    pub(crate) fn listener_count(&self) -> usize {
        self.state
            .borrow()
            .tables
            .iter()
            .map(|table| table.listener_count())
            .sum()
    }

    pub(crate) fn record_published(&self) {
        self.counters.published.set(self.counters.published.get() + 1);
    }

    pub(crate) fn record_received(&self) {
        self.counters.received.set(self.counters.received.get() + 1);
    }

    pub(crate) fn record_invocations(&self, count: usize) {
        self.counters
            .invocations
            .set(self.counters.invocations.get() + count as u64);
    }

    pub(crate) fn published(&self) -> u64 {
        self.counters.published.get()
    }

    pub(crate) fn stats(&self) -> DispatcherStats {
        let state = self.state.borrow();
        DispatcherStats {
            id: self.id,
            name: self.name.clone(),
            messages_published: self.counters.published.get(),
            messages_received: self.counters.received.get(),
            listener_invocations: self.counters.invocations.get(),
            tables: state.tables.len(),
            listeners: state.tables.iter().map(|table| table.listener_count()).sum(),
            cached_types: state.cache.len(),
            forwards: state.forwards.len(),
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("tables", &self.state.borrow().tables.len())
            .finish()
    }
}
