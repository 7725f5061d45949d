//! Named collections of identically shaped sections

use std::any::TypeId;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, Weak};

use crate::section::ConfigSection;

type Instances<S> = Vec<(String, Arc<S>)>;

/// Sections of type `S` keyed by instance name, e.g. the filters under
/// `alertchecker.filters.*`.
///
/// Instances are created by the container for every name found in the
/// loaded configs, or by the application through [`SubconfigMap::insert`].
/// Removing an instance and saving removes its parameters from the file.
pub struct SubconfigMap<S> {
    instances: Arc<RwLock<Instances<S>>>,
}

impl<S> Default for SubconfigMap<S> {
    fn default() -> Self {
        Self {
            instances: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl<S> fmt::Debug for SubconfigMap<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubconfigMap")
            .field("instances", &self.names_unchecked())
            .finish()
    }
}

impl<S> SubconfigMap<S> {
    fn names_unchecked(&self) -> Vec<String> {
        self.instances
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }
}

impl<S: ConfigSection + Default + 'static> SubconfigMap<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Instance names in creation order.
    pub fn names(&self) -> Vec<String> {
        self.names_unchecked()
    }

    pub fn get(&self, name: &str) -> Option<Arc<S>> {
        self.instances
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, section)| section.clone())
    }

    /// The instance called `name`, created with defaults if missing. It is
    /// registered with the container on the next refresh.
    pub fn insert(&self, name: &str) -> Arc<S> {
        let mut instances = self.instances.write().unwrap_or_else(PoisonError::into_inner);
        if let Some((_, section)) = instances.iter().find(|(n, _)| n == name) {
            return section.clone();
        }
        let section = Arc::new(S::default());
        instances.push((name.to_string(), section.clone()));
        section
    }

    pub fn remove(&self, name: &str) -> Option<Arc<S>> {
        let mut instances = self.instances.write().unwrap_or_else(PoisonError::into_inner);
        let pos = instances.iter().position(|(n, _)| n == name)?;
        Some(instances.remove(pos).1)
    }

    pub fn len(&self) -> usize {
        self.instances.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn handle(&self) -> Arc<dyn SubconfigHandle> {
        Arc::new(MapHandle::<S> {
            instances: Arc::downgrade(&self.instances),
        })
    }
}

/// Type-erased, non-owning view of a [`SubconfigMap`] held by the
/// container.
pub(crate) trait SubconfigHandle: Send + Sync {
    fn is_alive(&self) -> bool;

    fn instance_names(&self) -> Vec<String>;

    /// The instance called `name`, created if missing.
    fn ensure_instance(&self, name: &str) -> Option<Arc<dyn ConfigSection>>;

    /// A fresh default instance, used for template synthesis.
    fn prototype(&self) -> Box<dyn ConfigSection>;

    fn section_type(&self) -> TypeId;
}

struct MapHandle<S> {
    instances: Weak<RwLock<Instances<S>>>,
}

impl<S: ConfigSection + Default + 'static> SubconfigHandle for MapHandle<S> {
    fn is_alive(&self) -> bool {
        self.instances.strong_count() > 0
    }

    fn instance_names(&self) -> Vec<String> {
        let Some(instances) = self.instances.upgrade() else {
            return Vec::new();
        };
        let guard = instances.read().unwrap_or_else(PoisonError::into_inner);
        guard.iter().map(|(name, _)| name.clone()).collect()
    }

    fn ensure_instance(&self, name: &str) -> Option<Arc<dyn ConfigSection>> {
        let instances = self.instances.upgrade()?;
        let mut guard = instances.write().unwrap_or_else(PoisonError::into_inner);
        if let Some((_, section)) = guard.iter().find(|(n, _)| n == name) {
            return Some(section.clone() as Arc<dyn ConfigSection>);
        }
        let section = Arc::new(S::default());
        guard.push((name.to_string(), section.clone()));
        Some(section as Arc<dyn ConfigSection>)
    }

    fn prototype(&self) -> Box<dyn ConfigSection> {
        Box::new(S::default())
    }

    fn section_type(&self) -> TypeId {
        TypeId::of::<S>()
    }
}
