//! In-memory dog store and per-session selection state.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use serde::Serialize;
use uuid::Uuid;

/// One dog on the roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dog {
    pub id: String,
    pub name: String,
    pub breed: String,
}

/// Thread-safe CRUD over the roster. Reads share the lock; writes take it
/// exclusively. Guards are never held across an `.await`.
#[derive(Debug, Default)]
pub struct Dogs {
    store: RwLock<HashMap<String, Dog>>,
}

impl Dogs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a new dog under a fresh v4 UUID.
    pub fn add(&self, name: impl Into<String>, breed: impl Into<String>) -> Dog {
        let dog = Dog {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            breed: breed.into(),
        };
        self.store
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(dog.id.clone(), dog.clone());
        dog
    }

    pub fn get(&self, id: &str) -> Option<Dog> {
        self.store
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Every dog, in no particular order.
    pub fn get_all(&self) -> Vec<Dog> {
        self.store
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Renames / re-breeds a dog. Returns `false` when `id` is unknown.
    pub fn update(&self, id: &str, name: impl Into<String>, breed: impl Into<String>) -> bool {
        let mut store = self.store.write().unwrap_or_else(PoisonError::into_inner);
        match store.get_mut(id) {
            Some(dog) => {
                dog.name = name.into();
                dog.breed = breed.into();
                true
            }
            None => false,
        }
    }

    /// Removes a dog; unknown ids are ignored.
    pub fn delete(&self, id: &str) {
        self.store
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }

    pub fn len(&self) -> usize {
        self.store.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Sessions remembered at once before the oldest selection is dropped.
pub const MAX_SELECTIONS: usize = 10_000;

/// Which dog each browser session has selected for editing.
///
/// Session ids come from a client cookie, so the map is capped. Selecting
/// for a new session while full forgets the least recently selected one.
#[derive(Debug)]
pub struct Selections {
    inner: RwLock<SelectionMap>,
    limit: usize,
}

#[derive(Debug, Default)]
struct SelectionMap {
    by_session: HashMap<String, (u64, String)>,
    tick: u64,
}

impl Default for Selections {
    fn default() -> Self {
        Self::with_limit(MAX_SELECTIONS)
    }
}

impl Selections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            inner: RwLock::new(SelectionMap::default()),
            limit: limit.max(1),
        }
    }

    pub fn select(&self, session: &str, dog_id: impl Into<String>) {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if !map.by_session.contains_key(session) && map.by_session.len() >= self.limit {
            let oldest = map
                .by_session
                .iter()
                .min_by_key(|(_, (tick, _))| *tick)
                .map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                map.by_session.remove(&oldest);
            }
        }
        map.tick += 1;
        let tick = map.tick;
        map.by_session.insert(session.to_owned(), (tick, dog_id.into()));
    }

    pub fn selected(&self, session: &str) -> Option<String> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_session
            .get(session)
            .map(|(_, dog_id)| dog_id.clone())
    }

    pub fn clear(&self, session: &str) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .by_session
            .remove(session);
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_session
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
