use crate::operation::{Key, Payload, Value};
use crate::HashMap;

/// The application store mutated by logged operations.
///
/// Each method is invoked at most once per operation, right after the
/// operation was successfully inserted in the `Log`.
pub trait Store: Send + 'static {
    fn apply_add(&mut self, key: &Key, value: &Value);

    fn apply_remove(&mut self, key: &Key);

    /// Applies `payload`, dispatching on its kind.
    fn apply(&mut self, payload: &Payload) {
        match payload {
            Payload::Add { key, value } => self.apply_add(key, value),
            Payload::Remove { key } => self.apply_remove(key),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct KVStore {
    store: HashMap<Key, Value>,
}

impl KVStore {
    /// Creates a new `KVStore` instance.
    pub fn new() -> Self {
        Default::default()
    }

    #[allow(clippy::ptr_arg)]
    pub fn get(&self, key: &Key) -> Option<&Value> {
        self.store.get(key)
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

impl Store for KVStore {
    fn apply_add(&mut self, key: &Key, value: &Value) {
        // only clone key if not already in the KVS
        if let Some(previous) = self.store.get_mut(key) {
            *previous = value.clone();
        } else {
            self.store.insert(key.clone(), value.clone());
        }
    }

    fn apply_remove(&mut self, key: &Key) {
        self.store.remove(key);
    }
}
