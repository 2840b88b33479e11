//! Priority-ordered publish/subscribe bus for Duskfall.
//!
//! Role behaviors never call each other. They subscribe handlers to named
//! events and the engine dispatches those events while it runs a phase.
//! Every handler receives the same mutable [`Event`] and the same mutable
//! *host* (the game world), so behaviors cooperate without knowing about
//! each other.
//!
//! # Ordering
//!
//! Handlers run in ascending priority. Equal priorities run in subscription
//! order. A handler may [`stop`](Event::stop) the event (later handlers are
//! skipped) or [`prevent_default`](Event::prevent_default) (the caller skips
//! its fallback behavior).
//!
//! # Reentrancy
//!
//! Dispatch is synchronous and reentrant: a handler may dispatch further
//! events through the host it was given. The bus snapshots the subscriber
//! list before running it, so subscribing or unsubscribing from inside a
//! handler only affects later dispatches. Nesting is bounded by
//! [`EventBus::max_depth`].
//!
//! # Failure isolation
//!
//! A handler that returns `Err` or panics is logged and reported to
//! [`BusHost::handler_failed`]; the remaining handlers still run.
//!
//! ```
//! use duskfall_bus::{dispatch, BusHost, Event, EventBus, EventPayload};
//!
//! #[derive(Debug)]
//! struct Count(u32);
//!
//! impl EventPayload for Count {
//!     type Kind = &'static str;
//!     fn kind(&self) -> &'static str { "count" }
//! }
//!
//! struct World { bus: EventBus<World> }
//!
//! impl BusHost for World {
//!     type Payload = Count;
//!     type Error = String;
//!     fn bus(&self) -> &EventBus<Self> { &self.bus }
//!     fn bus_mut(&mut self) -> &mut EventBus<Self> { &mut self.bus }
//! }
//!
//! let mut world = World { bus: EventBus::new() };
//! world.bus.subscribe("count", 10, |_, ev: &mut Event<Count>| {
//!     ev.payload_mut().0 *= 2;
//!     Ok(())
//! });
//! world.bus.subscribe("count", 1, |_, ev: &mut Event<Count>| {
//!     ev.payload_mut().0 += 1;
//!     Ok(())
//! });
//!
//! let out = dispatch(&mut world, Count(3)).unwrap();
//! assert_eq!(out.into_payload().0, 8);
//! ```

mod bus;
mod error;
mod event;

pub use bus::{
    BusHost, DEFAULT_MAX_DEPTH, DEFAULT_PRIORITY, EventBus, Handler, HandlerFailure,
    KindOf, SubscriptionId, dispatch,
};
pub use error::BusError;
pub use event::{Event, EventPayload};
