//! Error types for the bus.

/// Errors returned by [`dispatch`](crate::dispatch).
///
/// Handler failures are *not* errors of the dispatch itself; they are
/// isolated and reported through [`BusHost::handler_failed`](crate::BusHost::handler_failed).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
    /// Nested dispatch went deeper than the bus allows. Usually a pair of
    /// handlers that keep re-triggering each other.
    #[error("dispatch of {kind} exceeded recursion depth {depth}")]
    RecursionLimit { kind: String, depth: usize },
}
