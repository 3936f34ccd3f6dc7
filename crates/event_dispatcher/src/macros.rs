//! Macros for declaring messages

/// Implements [`Message`](crate::Message) for one or more types.
///
/// Plain form, for types that are only their own category:
///
/// ```rust
/// use event_dispatcher::message;
///
/// struct Tick;
/// struct Shutdown;
/// message!(Tick, Shutdown);
/// ```
///
/// Category form, listing the trait objects the type can be viewed as:
///
/// ```rust
/// use event_dispatcher::message;
///
/// trait Shape {}
/// trait Named {}
///
/// struct Circle;
/// impl Shape for Circle {}
/// impl Named for Circle {}
///
/// message!(Circle: dyn Shape, dyn Named);
/// ```
///
/// Types embedding a base message implement
/// [`Message::describe`](crate::Message::describe) by hand.
#[macro_export]
macro_rules! message {
    ($ty:ty : $($category:ty),+ $(,)?) => {
        impl $crate::Message for $ty {
            fn describe(categories: &mut $crate::Categories<Self>) {
                $(
                    categories.implements::<$category>(|message| message);
                )+
            }
        }
    };

    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::Message for $ty {}
        )+
    };
}

/// Registers several listeners on one dispatcher, stopping at the first error.
///
/// ```rust
/// use event_dispatcher::{subscribe_all, DispatchHub, EventError};
///
/// let hub = DispatchHub::new();
/// let dispatcher = hub.create("ui");
///
/// let ids = subscribe_all!(dispatcher;
///     i32 => |value: &i32| { println!("int {value}"); Ok(()) },
///     bool => |flag: &bool| { println!("bool {flag}"); Ok(()) },
/// )?;
/// assert_eq!(ids.len(), 2);
/// # Ok::<(), EventError>(())
/// ```
#[macro_export]
macro_rules! subscribe_all {
    ($dispatcher:expr; $($category:ty => $listener:expr),* $(,)?) => {{
        (|| {
            let mut ids = ::std::vec::Vec::new();
            $(
                ids.push($dispatcher.subscribe::<$category, _>($listener)?);
            )*
            Ok::<_, $crate::EventError>(ids)
        })()
    }};
}
