//! The event envelope shared by all handlers of one dispatch.

use std::fmt;
use std::hash::Hash;

/// A payload that can travel on the bus.
///
/// The payload is usually a closed enum with one variant per event name.
/// [`kind`](Self::kind) maps a value to the key handlers subscribe to, so
/// the dispatcher stays generic while handlers match on typed fields.
pub trait EventPayload: Send + 'static {
    /// The subscription key, typically a fieldless mirror of the payload enum.
    type Kind: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static;

    /// Returns the key this payload is dispatched under.
    fn kind(&self) -> Self::Kind;
}

/// One in-flight event: the payload plus the two control flags.
///
/// Created by [`dispatch`](crate::dispatch), handed mutably to each handler
/// in turn, then returned to the caller as the final data.
#[derive(Debug)]
pub struct Event<P> {
    payload: P,
    stopped: bool,
    default_prevented: bool,
}

impl<P> Event<P> {
    /// Wraps a payload with both flags cleared.
    pub fn new(payload: P) -> Self {
        Self {
            payload,
            stopped: false,
            default_prevented: false,
        }
    }

    /// Read access to the payload.
    pub fn payload(&self) -> &P {
        &self.payload
    }

    /// Write access to the payload. Later handlers see the changes.
    pub fn payload_mut(&mut self) -> &mut P {
        &mut self.payload
    }

    /// Consumes the event, returning the final payload.
    pub fn into_payload(self) -> P {
        self.payload
    }

    /// Skips every handler after the current one.
    pub fn stop(&mut self) {
        self.stopped = true;
    }

    /// Tells the dispatching caller to skip its fallback behavior.
    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    /// Whether a handler called [`stop`](Self::stop).
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Whether a handler called [`prevent_default`](Self::prevent_default).
    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_event_has_flags_cleared() {
        let ev = Event::new(5u8);
        assert!(!ev.is_stopped());
        assert!(!ev.default_prevented());
        assert_eq!(*ev.payload(), 5);
    }

    #[test]
    fn test_flags_are_independent() {
        let mut ev = Event::new(());
        ev.prevent_default();
        assert!(ev.default_prevented());
        assert!(!ev.is_stopped());
        ev.stop();
        assert!(ev.is_stopped());
    }
}
