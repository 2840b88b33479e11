//! Integration tests for the event bus using a small recording host.

use duskfall_bus::{
    BusError, BusHost, Event, EventBus, EventPayload, HandlerFailure, KindOf, dispatch,
};

// =========================================================================
// Test host: records which handlers ran.
// =========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Kind {
    Log,
    Death,
    Echo,
}

#[derive(Debug)]
enum Payload {
    Log(Vec<&'static str>),
    Death { player: u32 },
    Echo { depth: u32 },
}

impl EventPayload for Payload {
    type Kind = Kind;

    fn kind(&self) -> Kind {
        match self {
            Payload::Log(_) => Kind::Log,
            Payload::Death { .. } => Kind::Death,
            Payload::Echo { .. } => Kind::Echo,
        }
    }
}

#[derive(Default)]
struct Village {
    bus: EventBus<Village>,
    dead: Vec<u32>,
    failures: Vec<String>,
}

impl BusHost for Village {
    type Payload = Payload;
    type Error = String;

    fn bus(&self) -> &EventBus<Self> {
        &self.bus
    }

    fn bus_mut(&mut self) -> &mut EventBus<Self> {
        &mut self.bus
    }

    fn handler_failed(&mut self, _kind: KindOf<Self>, failure: &HandlerFailure<String>) {
        self.failures.push(failure.to_string());
    }
}

fn push(name: &'static str) -> impl Fn(&mut Village, &mut Event<Payload>) -> Result<(), String> {
    move |_, ev| {
        if let Payload::Log(names) = ev.payload_mut() {
            names.push(name);
        }
        Ok(())
    }
}

fn run_log(village: &mut Village) -> Event<Payload> {
    dispatch(village, Payload::Log(Vec::new())).unwrap()
}

fn names(ev: Event<Payload>) -> Vec<&'static str> {
    match ev.into_payload() {
        Payload::Log(names) => names,
        other => panic!("unexpected payload {other:?}"),
    }
}

// =========================================================================
// Ordering
// =========================================================================

#[test]
fn test_handlers_run_in_ascending_priority() {
    let mut v = Village::default();
    v.bus.subscribe(Kind::Log, 10, push("late"));
    v.bus.subscribe(Kind::Log, -3, push("first"));
    v.bus.subscribe(Kind::Log, 5, push("middle"));

    assert_eq!(names(run_log(&mut v)), vec!["first", "middle", "late"]);
}

#[test]
fn test_equal_priorities_keep_subscription_order() {
    let mut v = Village::default();
    v.bus.subscribe(Kind::Log, 5, push("a"));
    v.bus.subscribe(Kind::Log, 5, push("b"));
    v.bus.subscribe(Kind::Log, 1, push("zero"));
    v.bus.subscribe(Kind::Log, 5, push("c"));

    assert_eq!(names(run_log(&mut v)), vec!["zero", "a", "b", "c"]);
}

#[test]
fn test_dispatch_without_subscribers_returns_payload_untouched() {
    let mut v = Village::default();
    let ev = run_log(&mut v);
    assert!(!ev.is_stopped());
    assert!(!ev.default_prevented());
    assert!(names(ev).is_empty());
}

#[test]
fn test_only_matching_kind_runs() {
    let mut v = Village::default();
    v.bus.subscribe(Kind::Death, 1, |v: &mut Village, ev| {
        if let Payload::Death { player } = ev.payload() {
            v.dead.push(*player);
        }
        Ok(())
    });
    v.bus.subscribe(Kind::Log, 1, push("log"));

    dispatch(&mut v, Payload::Death { player: 4 }).unwrap();
    assert_eq!(v.dead, vec![4]);
}

// =========================================================================
// Control flags
// =========================================================================

#[test]
fn test_stop_skips_later_handlers() {
    let mut v = Village::default();
    v.bus.subscribe(Kind::Log, 1, push("runs"));
    v.bus.subscribe(Kind::Log, 2, |_, ev: &mut Event<Payload>| {
        ev.stop();
        Ok(())
    });
    v.bus.subscribe(Kind::Log, 3, push("skipped"));

    let ev = run_log(&mut v);
    assert!(ev.is_stopped());
    assert_eq!(names(ev), vec!["runs"]);
}

#[test]
fn test_prevent_default_is_reported_and_does_not_stop() {
    let mut v = Village::default();
    v.bus.subscribe(Kind::Log, 1, |_, ev: &mut Event<Payload>| {
        ev.prevent_default();
        Ok(())
    });
    v.bus.subscribe(Kind::Log, 2, push("still runs"));

    let ev = run_log(&mut v);
    assert!(ev.default_prevented());
    assert_eq!(names(ev), vec!["still runs"]);
}

// =========================================================================
// Failure isolation
// =========================================================================

#[test]
fn test_failing_handler_does_not_abort_siblings() {
    let mut v = Village::default();
    v.bus.subscribe(Kind::Log, 1, push("before"));
    v.bus.subscribe(Kind::Log, 2, |_, _| Err("broken role".to_string()));
    v.bus.subscribe(Kind::Log, 3, push("after"));

    let ev = run_log(&mut v);
    assert_eq!(names(ev), vec!["before", "after"]);
    assert_eq!(v.failures, vec!["broken role".to_string()]);
}

#[test]
fn test_panicking_handler_is_isolated() {
    let mut v = Village::default();
    v.bus.subscribe(Kind::Log, 1, |_, _| panic!("handler blew up"));
    v.bus.subscribe(Kind::Log, 2, push("survivor"));

    let ev = run_log(&mut v);
    assert_eq!(names(ev), vec!["survivor"]);
    assert_eq!(v.failures.len(), 1);
    assert!(v.failures[0].contains("handler blew up"));
    assert_eq!(v.bus.depth(), 0);
}

// =========================================================================
// Reentrancy
// =========================================================================

#[test]
fn test_handlers_may_dispatch_nested_events() {
    let mut v = Village::default();
    // A death cascades into a second death, like a grieving lover.
    v.bus.subscribe(Kind::Death, 1, |v: &mut Village, ev| {
        let Payload::Death { player } = *ev.payload() else {
            return Ok(());
        };
        v.dead.push(player);
        if player == 1 {
            dispatch(v, Payload::Death { player: 2 }).map_err(|e| e.to_string())?;
        }
        Ok(())
    });

    dispatch(&mut v, Payload::Death { player: 1 }).unwrap();
    assert_eq!(v.dead, vec![1, 2]);
}

#[test]
fn test_runaway_recursion_is_bounded() {
    let mut v = Village {
        bus: EventBus::with_max_depth(4),
        ..Village::default()
    };
    v.bus.subscribe(Kind::Echo, 1, |v: &mut Village, ev| {
        let Payload::Echo { depth } = *ev.payload() else {
            return Ok(());
        };
        dispatch(v, Payload::Echo { depth: depth + 1 }).map_err(|e| e.to_string())?;
        Ok(())
    });

    // The outermost dispatch succeeds; the fifth nested one is refused and
    // the refusal surfaces as a single handler failure one level up.
    dispatch(&mut v, Payload::Echo { depth: 0 }).unwrap();
    assert_eq!(v.failures.len(), 1);
    assert!(v.failures[0].contains("recursion depth 4"));
    assert_eq!(v.bus.depth(), 0);
}

#[test]
fn test_recursion_limit_error_names_the_kind() {
    struct Deep {
        bus: EventBus<Deep>,
    }
    impl BusHost for Deep {
        type Payload = Payload;
        type Error = BusError;
        fn bus(&self) -> &EventBus<Self> {
            &self.bus
        }
        fn bus_mut(&mut self) -> &mut EventBus<Self> {
            &mut self.bus
        }
    }

    let mut d = Deep {
        bus: EventBus::with_max_depth(1),
    };
    let seen = std::sync::Arc::new(std::sync::Mutex::new(None));
    let sink = std::sync::Arc::clone(&seen);
    d.bus.subscribe(Kind::Echo, 1, move |d: &mut Deep, _| {
        let err = dispatch(d, Payload::Echo { depth: 1 }).unwrap_err();
        *sink.lock().unwrap() = Some(err);
        Ok(())
    });

    dispatch(&mut d, Payload::Echo { depth: 0 }).unwrap();
    let err = seen.lock().unwrap().clone().unwrap();
    assert_eq!(
        err,
        BusError::RecursionLimit {
            kind: "Echo".into(),
            depth: 1
        }
    );
}

#[test]
fn test_subscribing_during_dispatch_affects_only_later_dispatches() {
    let mut v = Village::default();
    v.bus.subscribe(Kind::Log, 1, |v: &mut Village, ev| {
        if let Payload::Log(names) = ev.payload_mut() {
            names.push("outer");
        }
        v.bus_mut().subscribe(Kind::Log, 0, push("added"));
        Ok(())
    });

    assert_eq!(names(run_log(&mut v)), vec!["outer"]);
    assert_eq!(names(run_log(&mut v)), vec!["added", "outer"]);
}

#[test]
fn test_unsubscribed_handler_no_longer_runs() {
    let mut v = Village::default();
    let id = v.bus.subscribe(Kind::Log, 1, push("gone"));
    v.bus.subscribe(Kind::Log, 2, push("kept"));
    assert!(v.bus.unsubscribe(id));

    assert_eq!(names(run_log(&mut v)), vec!["kept"]);
}
