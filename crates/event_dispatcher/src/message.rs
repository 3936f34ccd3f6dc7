//! Message trait and category declarations
//!
//! Rust has no runtime subtype reflection, so every concrete message type
//! declares up front which categories it satisfies. A category is any
//! `'static` type a listener can subscribe under:
//!
//! - the message type itself (always implied),
//! - a trait object the message can coerce into (`dyn Shape`),
//! - a "base" message embedded in the concrete one, whose own categories are
//!   inherited transitively.
//!
//! The declarations are collected once per hub by the
//! [`TypeRegistry`](crate::registry::TypeRegistry).

use std::any::{Any, TypeId};
use std::marker::PhantomData;

use crate::registry::TypeRegistry;

/// Trait implemented by every publishable message.
///
/// Most types use the [`message!`](crate::message!) macro. Types embedding a
/// base message implement `describe` by hand:
///
/// ```rust
/// use event_dispatcher::{message, Categories, Message};
///
/// pub trait Shape {
///     fn area(&self) -> f32;
/// }
///
/// #[derive(Default)]
/// pub struct Body {
///     pub mass: f32,
/// }
/// message!(Body);
///
/// #[derive(Default)]
/// pub struct Circle {
///     pub body: Body,
///     pub radius: f32,
/// }
///
/// impl Shape for Circle {
///     fn area(&self) -> f32 {
///         std::f32::consts::PI * self.radius * self.radius
///     }
/// }
///
/// impl Message for Circle {
///     fn describe(categories: &mut Categories<Self>) {
///         categories
///             .extends::<Body>(|circle| &circle.body)
///             .implements::<dyn Shape>(|circle| circle);
///     }
/// }
/// ```
pub trait Message: Any {
    /// Declares the categories this type satisfies besides itself.
    fn describe(_categories: &mut Categories<Self>)
    where
        Self: Sized,
    {
    }

    /// Conditional delivery predicate, consulted once per listener table
    /// on every dispatch. Returning `false` suppresses delivery silently.
    fn condition_met(&self) -> bool {
        true
    }
}

/// Views an erased message as category `C`.
pub(crate) trait Upcast<C: ?Sized>: 'static {
    fn upcast<'a>(&self, message: &'a dyn Any) -> Option<&'a C>;
}

struct Coercion<M, C: ?Sized> {
    coerce: fn(&M) -> &C,
}

impl<M: Any, C: ?Sized + 'static> Upcast<C> for Coercion<M, C> {
    fn upcast<'a>(&self, message: &'a dyn Any) -> Option<&'a C> {
        message.downcast_ref::<M>().map(self.coerce)
    }
}

/// Projects an erased message onto an embedded parent message.
pub(crate) trait Project: 'static {
    fn project<'a>(&self, message: &'a dyn Any) -> Option<&'a dyn Any>;
}

struct Projection<M, P> {
    project: fn(&M) -> &P,
}

impl<M: Any, P: Any> Project for Projection<M, P> {
    fn project<'a>(&self, message: &'a dyn Any) -> Option<&'a dyn Any> {
        let message = message.downcast_ref::<M>()?;
        let parent: &'a P = (self.project)(message);
        Some(parent as &'a dyn Any)
    }
}

/// A declared trait or identity category: holds a `Box<dyn Upcast<C>>`.
pub(crate) struct CategoryView {
    pub(crate) category: TypeId,
    pub(crate) name: &'static str,
    pub(crate) view: Box<dyn Any>,
}

/// A declared base message.
pub(crate) struct ParentLink {
    pub(crate) type_id: TypeId,
    pub(crate) name: &'static str,
    pub(crate) projection: Box<dyn Project>,
    pub(crate) register: fn(&TypeRegistry),
}

/// Builder handed to [`Message::describe`].
pub struct Categories<M: Message> {
    pub(crate) views: Vec<CategoryView>,
    pub(crate) parents: Vec<ParentLink>,
    _marker: PhantomData<fn(&M)>,
}

impl<M: Message> Categories<M> {
    pub(crate) fn new() -> Self {
        let mut categories = Self {
            views: Vec::new(),
            parents: Vec::new(),
            _marker: PhantomData,
        };
        categories.implements::<M>(|message| message);
        categories
    }

    /// Declares that `M` can be viewed as `C`, usually a trait object.
    ///
    /// The coercion is normally the identity closure `|m| m`, letting the
    /// compiler perform the unsizing coercion.
    pub fn implements<C: ?Sized + 'static>(&mut self, coerce: fn(&M) -> &C) -> &mut Self {
        let category = TypeId::of::<C>();
        if self.views.iter().any(|view| view.category == category) {
            return self;
        }

        let view: Box<dyn Upcast<C>> = Box::new(Coercion::<M, C> { coerce });
        self.views.push(CategoryView {
            category,
            name: std::any::type_name::<C>(),
            view: Box::new(view),
        });
        self
    }

    /// Declares that `M` embeds the base message `P`, inheriting every
    /// category `P` satisfies.
    pub fn extends<P: Message>(&mut self, project: fn(&M) -> &P) -> &mut Self {
        let type_id = TypeId::of::<P>();
        if self.parents.iter().any(|parent| parent.type_id == type_id) {
            return self;
        }

        self.parents.push(ParentLink {
            type_id,
            name: std::any::type_name::<P>(),
            projection: Box::new(Projection::<M, P> { project }),
            register: TypeRegistry::register::<P>,
        });
        self
    }
}

/// Erased view of a message in flight.
pub(crate) struct Envelope<'a> {
    pub(crate) payload: &'a dyn Any,
    pub(crate) message: &'a dyn Message,
    pub(crate) type_id: TypeId,
    pub(crate) type_name: &'static str,
}

impl<'a> Envelope<'a> {
    pub(crate) fn new<M: Message>(message: &'a M) -> Self {
        Self {
            payload: message,
            message,
            type_id: TypeId::of::<M>(),
            type_name: std::any::type_name::<M>(),
        }
    }
}

crate::message!(
    bool, char, u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64,
    String, &'static str,
);
