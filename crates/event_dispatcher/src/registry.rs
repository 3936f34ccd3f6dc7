//! Type compatibility oracle
//!
//! Answers "may a message of concrete type `M` be delivered to a listener
//! declared for category `C`?" from the declarations collected through
//! [`Message::describe`]. Answers are memoized per `(category, concrete)`
//! pair and never change once computed, since declarations are fixed at
//! compile time.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;

use smallvec::SmallVec;
use tracing::debug;

use crate::message::{Categories, CategoryView, Message, ParentLink, Upcast};

struct TypeEntry {
    name: &'static str,
    views: Vec<CategoryView>,
    parents: Vec<ParentLink>,
}

/// Registry of declared message categories with a memoized subtype table.
#[derive(Default)]
pub struct TypeRegistry {
    types: RefCell<HashMap<TypeId, TypeEntry>>,
    memo: RefCell<HashMap<(TypeId, TypeId), bool>>,
}

impl TypeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Collects the declarations of `M` and of every base message it extends.
    ///
    /// Idempotent; only the first call per type runs [`Message::describe`].
    pub fn register<M: Message>(&self) {
        let type_id = TypeId::of::<M>();
        if self.types.borrow().contains_key(&type_id) {
            return;
        }

        let mut categories = Categories::<M>::new();
        M::describe(&mut categories);

        let name = std::any::type_name::<M>();
        debug!(
            "📝 Registered message type {} ({} categories, {} parents)",
            name,
            categories.views.len(),
            categories.parents.len()
        );

        let parents: SmallVec<[fn(&TypeRegistry); 4]> =
            categories.parents.iter().map(|parent| parent.register).collect();

        self.types.borrow_mut().insert(
            type_id,
            TypeEntry {
                name,
                views: categories.views,
                parents: categories.parents,
            },
        );
        // Answers computed while the type was unknown only covered equality.
        self.memo
            .borrow_mut()
            .retain(|(_, concrete), _| *concrete != type_id);

        for register in parents {
            register(self);
        }
    }

    /// Returns whether a message of type `concrete` satisfies `category`.
    ///
    /// Equality always holds. Otherwise the concrete type's declared
    /// categories are searched, then its base messages, transitively.
    pub fn satisfies(&self, category: TypeId, concrete: TypeId) -> bool {
        if category == concrete {
            return true;
        }

        let key = (category, concrete);
        let cached = self.memo.borrow().get(&key).copied();
        if let Some(known) = cached {
            return known;
        }

        // Provisional answer so cyclic `extends` declarations terminate.
        self.memo.borrow_mut().insert(key, false);
        let result = self.compute(category, concrete);
        self.memo.borrow_mut().insert(key, result);
        result
    }

    /// Typed form of [`satisfies`](Self::satisfies), registering `M` first.
    pub fn satisfies_type<C: ?Sized + 'static, M: Message>(&self) -> bool {
        self.register::<M>();
        self.satisfies(TypeId::of::<C>(), TypeId::of::<M>())
    }

    fn compute(&self, category: TypeId, concrete: TypeId) -> bool {
        let parents: SmallVec<[TypeId; 4]> = {
            let types = self.types.borrow();
            let Some(entry) = types.get(&concrete) else {
                return false;
            };
            if entry.views.iter().any(|view| view.category == category) {
                return true;
            }
            entry.parents.iter().map(|parent| parent.type_id).collect()
        };

        parents
            .into_iter()
            .any(|parent| self.satisfies(category, parent))
    }

    /// Views an erased message of type `concrete` as category `C`.
    ///
    /// Returns `None` when the type does not satisfy `C`.
    pub(crate) fn view<'a, C: ?Sized + 'static>(
        &self,
        concrete: TypeId,
        payload: &'a dyn Any,
    ) -> Option<&'a C> {
        let category = TypeId::of::<C>();
        let types = self.types.borrow();
        let entry = types.get(&concrete)?;

        if let Some(view) = entry.views.iter().find(|view| view.category == category) {
            return view
                .view
                .downcast_ref::<Box<dyn Upcast<C>>>()?
                .upcast(payload);
        }

        for parent in &entry.parents {
            if !self.satisfies(category, parent.type_id) {
                continue;
            }
            let projected = parent.projection.project(payload)?;
            return self.view::<C>(parent.type_id, projected);
        }

        None
    }

    /// Name of a registered concrete type
    pub fn type_name(&self, concrete: TypeId) -> Option<&'static str> {
        self.types.borrow().get(&concrete).map(|entry| entry.name)
    }

    /// Names of the categories `concrete` declares directly, excluding parents
    pub fn declared_categories(&self, concrete: TypeId) -> Vec<&'static str> {
        self.types
            .borrow()
            .get(&concrete)
            .map(|entry| {
                entry
                    .views
                    .iter()
                    .map(|view| view.name)
                    .chain(entry.parents.iter().map(|parent| parent.name))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of registered concrete types
    pub fn len(&self) -> usize {
        self.types.borrow().len()
    }

    /// Whether no type has been registered yet
    pub fn is_empty(&self) -> bool {
        self.types.borrow().is_empty()
    }

    /// Number of memoized compatibility answers
    pub fn memoized(&self) -> usize {
        self.memo.borrow().len()
    }
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.len())
            .field("memoized", &self.memoized())
            .finish()
    }
}
