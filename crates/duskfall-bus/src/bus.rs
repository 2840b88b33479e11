//! Subscription storage and the dispatcher.

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{error, trace};

use crate::{BusError, Event, EventPayload};

/// Priority used when a subscriber has no ordering requirement.
pub const DEFAULT_PRIORITY: i32 = 5;

/// Default bound on nested dispatches.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// The subscription key type for host `H`.
pub type KindOf<H> = <<H as BusHost>::Payload as EventPayload>::Kind;

/// A subscribed handler.
///
/// Handlers get the whole host mutably, so they can read and mutate the
/// world and dispatch further events through it.
pub type Handler<H> = Arc<
    dyn Fn(&mut H, &mut Event<<H as BusHost>::Payload>) -> Result<(), <H as BusHost>::Error>
        + Send
        + Sync,
>;

// ---------------------------------------------------------------------------
// BusHost
// ---------------------------------------------------------------------------

/// The world a bus lives in.
///
/// The host owns its bus. [`dispatch`] borrows the bus only long enough to
/// snapshot the subscriber list, then hands the host to each handler.
pub trait BusHost: Sized + 'static {
    /// The payload union dispatched on this bus.
    type Payload: EventPayload;

    /// What handlers return on failure.
    type Error: fmt::Display;

    fn bus(&self) -> &EventBus<Self>;

    fn bus_mut(&mut self) -> &mut EventBus<Self>;

    /// Called after a handler failed. The failure has already been logged.
    ///
    /// Hosts use this to escalate failures that signal broken invariants.
    /// Default: ignore.
    fn handler_failed(&mut self, _kind: KindOf<Self>, _failure: &HandlerFailure<Self::Error>) {}
}

/// Why a handler did not complete.
#[derive(Debug)]
pub enum HandlerFailure<E> {
    /// The handler returned `Err`.
    Error(E),
    /// The handler panicked; the panic message if it had one.
    Panic(String),
}

impl<E: fmt::Display> fmt::Display for HandlerFailure<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(e) => write!(f, "{e}"),
            Self::Panic(msg) => write!(f, "panicked: {msg}"),
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Identifies one subscription, for [`EventBus::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}", self.0)
    }
}

struct Subscription<H: BusHost> {
    id: SubscriptionId,
    priority: i32,
    handler: Handler<H>,
}

/// Subscriber lists keyed by event kind.
///
/// Each list is kept sorted by `(priority, id)`. Ids increase
/// monotonically, so the sort is "ascending priority, then subscription
/// order" and dispatch never has to sort.
pub struct EventBus<H: BusHost> {
    subscriptions: HashMap<KindOf<H>, Vec<Subscription<H>>>,
    next_id: u64,
    depth: usize,
    max_depth: usize,
}

impl<H: BusHost> EventBus<H> {
    /// Creates an empty bus with [`DEFAULT_MAX_DEPTH`].
    pub fn new() -> Self {
        Self::with_max_depth(DEFAULT_MAX_DEPTH)
    }

    /// Creates an empty bus that refuses to nest deeper than `max_depth`.
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            subscriptions: HashMap::new(),
            next_id: 1,
            depth: 0,
            max_depth: max_depth.max(1),
        }
    }

    /// Registers `handler` for `kind`. Lower `priority` runs earlier.
    pub fn subscribe<F>(&mut self, kind: KindOf<H>, priority: i32, handler: F) -> SubscriptionId
    where
        F: Fn(&mut H, &mut Event<H::Payload>) -> Result<(), H::Error> + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;

        let list = self.subscriptions.entry(kind).or_default();
        // Insert after every existing entry with priority <= ours so ties
        // keep subscription order.
        let at = list.partition_point(|s| s.priority <= priority);
        list.insert(
            at,
            Subscription {
                id,
                priority,
                handler: Arc::new(handler),
            },
        );

        trace!(?kind, %id, priority, "subscribed");
        id
    }

    /// Removes a subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        for list in self.subscriptions.values_mut() {
            if let Some(pos) = list.iter().position(|s| s.id == id) {
                list.remove(pos);
                trace!(%id, "unsubscribed");
                return true;
            }
        }
        false
    }

    /// Number of handlers subscribed to `kind`.
    pub fn subscriber_count(&self, kind: KindOf<H>) -> usize {
        self.subscriptions.get(&kind).map_or(0, Vec::len)
    }

    /// Total number of subscriptions across all kinds.
    pub fn len(&self) -> usize {
        self.subscriptions.values().map(Vec::len).sum()
    }

    /// Returns `true` if nothing is subscribed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current nesting depth of [`dispatch`]. Zero when idle.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The nesting bound.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Clones the handler list for `kind` so the host can be lent out
    /// while it runs.
    fn snapshot(&self, kind: KindOf<H>) -> Vec<(SubscriptionId, Handler<H>)> {
        self.subscriptions
            .get(&kind)
            .map(|list| {
                list.iter()
                    .map(|s| (s.id, Arc::clone(&s.handler)))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl<H: BusHost> Default for EventBus<H> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Runs every handler subscribed to the payload's kind and returns the
/// final event.
///
/// # Errors
/// Returns [`BusError::RecursionLimit`] if this call would nest deeper than
/// the bus allows. No handler runs in that case.
pub fn dispatch<H: BusHost>(host: &mut H, payload: H::Payload) -> Result<Event<H::Payload>, BusError> {
    let kind = payload.kind();

    let bus = host.bus_mut();
    if bus.depth >= bus.max_depth {
        error!(?kind, depth = bus.depth, "event recursion limit reached");
        return Err(BusError::RecursionLimit {
            kind: format!("{kind:?}"),
            depth: bus.depth,
        });
    }
    bus.depth += 1;
    let handlers = bus.snapshot(kind);

    let mut event = Event::new(payload);
    for (id, handler) in handlers {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(host, &mut event)));
        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(HandlerFailure::Error(e)),
            Err(panic) => Some(HandlerFailure::Panic(panic_message(panic.as_ref()))),
        };
        if let Some(failure) = failure {
            error!(?kind, subscription = %id, error = %failure, "event handler failed");
            host.handler_failed(kind, &failure);
        }
        if event.is_stopped() {
            trace!(?kind, subscription = %id, "event stopped");
            break;
        }
    }

    host.bus_mut().depth -= 1;
    Ok(event)
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
