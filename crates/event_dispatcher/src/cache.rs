//! Per-dispatcher memo of which listener tables apply to a concrete type
//!
//! Entries are built lazily on the first publish of a concrete type and then
//! only grow: a table created later for a satisfied category is appended,
//! while unsubscribing never removes a table from an entry. An emptied table
//! stays in place and dispatches to nobody, which keeps publish free of
//! rebuilds. Only [`DispatchCache::clear`] drops entries.

use std::any::TypeId;
use std::collections::HashMap;
use std::rc::Rc;

use smallvec::SmallVec;
use tracing::trace;

use crate::registry::TypeRegistry;
use crate::table::DispatchTable;

pub(crate) type TableList = SmallVec<[Rc<dyn DispatchTable>; 4]>;

#[derive(Default)]
pub(crate) struct DispatchCache {
    entries: HashMap<TypeId, TableList>,
}

impl DispatchCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns the tables matching `concrete`, scanning `tables` in
    /// registration order the first time the type is seen.
    pub(crate) fn tables_for(
        &mut self,
        concrete: TypeId,
        tables: &[Rc<dyn DispatchTable>],
        registry: &TypeRegistry,
    ) -> &TableList {
        self.entries.entry(concrete).or_insert_with(|| {
            let matched: TableList = tables
                .iter()
                .filter(|table| registry.satisfies(table.category(), concrete))
                .cloned()
                .collect();
            trace!(
                "🗂️ Cached {} tables for {}",
                matched.len(),
                registry.type_name(concrete).unwrap_or("<unregistered>")
            );
            matched
        })
    }

    /// Adds a freshly created table to every cached entry whose concrete
    /// type satisfies its category.
    pub(crate) fn on_new_table(&mut self, table: &Rc<dyn DispatchTable>, registry: &TypeRegistry) {
        let category = table.category();
        for (concrete, entry) in self.entries.iter_mut() {
            if !registry.satisfies(category, *concrete) {
                continue;
            }
            if entry.iter().any(|existing| Rc::ptr_eq(existing, table)) {
                continue;
            }
            entry.push(Rc::clone(table));
        }
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub(crate) fn entry(&self, concrete: TypeId) -> Option<&TableList> {
        self.entries.get(&concrete)
    }
}
