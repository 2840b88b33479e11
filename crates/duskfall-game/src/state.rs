//! Per-game storage for role module state.

use std::any::{Any, TypeId};
use std::collections::HashMap;

/// A type-keyed arena. Each role module keeps one private state struct in
/// it, created on first use and dropped with the game.
#[derive(Default)]
pub struct RoleStates {
    slots: HashMap<TypeId, Box<dyn Any + Send>>,
}

impl RoleStates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<T: Any + Send>(&self) -> Option<&T> {
        self.slots
            .get(&TypeId::of::<T>())
            .and_then(|slot| slot.downcast_ref())
    }

    /// The state of type `T`, created with `Default` if missing.
    pub fn get_mut<T: Any + Send + Default>(&mut self) -> &mut T {
        self.slots
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(T::default()))
            .downcast_mut()
            .expect("slot is keyed by its own TypeId")
    }

    pub fn remove<T: Any + Send>(&mut self) -> Option<T> {
        self.slots
            .remove(&TypeId::of::<T>())
            .and_then(|slot| slot.downcast().ok())
            .map(|boxed| *boxed)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl std::fmt::Debug for RoleStates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoleStates")
            .field("slots", &self.slots.len())
            .finish()
    }
}
