//! Storage the container writes resolved values into.
//!
//! A section owns its [`Param`]s. The container only keeps a [`WeakSlot`]
//! per parameter, so dropping a section silently retires its
//! registrations.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, Weak};

/// Typed write access to a parameter's storage.
pub trait Slot<T>: Send + Sync {
    /// Current value, `None` once the storage is gone.
    fn get(&self) -> Option<T>;

    /// Store `value`. Returns false once the storage is gone.
    fn set(&self, value: T) -> bool;

    fn is_alive(&self) -> bool;

    /// Identity of the underlying storage, for detecting double
    /// registration of the same slot.
    fn id(&self) -> Option<usize> {
        None
    }
}

/// A parameter value owned by a config section.
pub struct Param<T> {
    value: Arc<RwLock<T>>,
}

impl<T: Clone + Send + Sync + 'static> Param<T> {
    pub fn new(initial: T) -> Self {
        Self {
            value: Arc::new(RwLock::new(initial)),
        }
    }

    pub fn get(&self) -> T {
        self.value
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set(&self, value: T) {
        *self.value.write().unwrap_or_else(PoisonError::into_inner) = value;
    }

    /// A non-owning handle for the container.
    pub fn slot(&self) -> WeakSlot<T> {
        WeakSlot {
            inner: Arc::downgrade(&self.value),
        }
    }
}

impl<T: Clone + Default + Send + Sync + 'static> Default for Param<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + Send + Sync + fmt::Debug + 'static> fmt::Debug for Param<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Param").field(&self.get()).finish()
    }
}

/// Weak handle to a [`Param`].
pub struct WeakSlot<T> {
    inner: Weak<RwLock<T>>,
}

impl<T> Clone for WeakSlot<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + Send + Sync> Slot<T> for WeakSlot<T> {
    fn get(&self) -> Option<T> {
        let value = self.inner.upgrade()?;
        let guard = value.read().unwrap_or_else(PoisonError::into_inner);
        Some(guard.clone())
    }

    fn set(&self, value: T) -> bool {
        let Some(storage) = self.inner.upgrade() else {
            return false;
        };
        *storage.write().unwrap_or_else(PoisonError::into_inner) = value;
        true
    }

    fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }

    fn id(&self) -> Option<usize> {
        Some(self.inner.as_ptr() as *const () as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_writes_through() {
        let param = Param::new(5);
        let slot = param.slot();
        assert!(slot.set(7));
        assert_eq!(param.get(), 7);
        assert_eq!(slot.get(), Some(7));
    }

    #[test]
    fn test_slot_dies_with_param() {
        let param = Param::new(String::from("x"));
        let slot = param.slot();
        assert!(slot.is_alive());
        drop(param);
        assert!(!slot.is_alive());
        assert!(!slot.set("y".into()));
        assert_eq!(slot.get(), None);
    }

    #[test]
    fn test_slot_identity() {
        let a = Param::new(1);
        let b = Param::new(1);
        assert_eq!(a.slot().id(), a.slot().id());
        assert_ne!(a.slot().id(), b.slot().id());
    }
}
