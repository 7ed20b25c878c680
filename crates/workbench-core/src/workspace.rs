//! Shared model workspace
//!
//! Every session and the local application see the same [`Workspace`], shared
//! by `Arc`. Each model sits behind its own mutex; algorithm runs lock all the
//! models they touch through [`Workspace::resolve`] + [`ModelSet::lock`].
//!
//! Locks are always taken in ascending [`ModelId`] order, so two jobs that
//! share models cannot deadlock.

use crate::error::WorkspaceError;
use crate::model::{Model, ModelId};
use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;

/// One stored model and its lock
#[derive(Debug)]
pub struct ModelEntry {
    id: ModelId,
    model: Mutex<Box<dyn Model>>,
}

impl ModelEntry {
    fn new(model: Box<dyn Model>) -> Self {
        Self {
            id: model.id().clone(),
            model: Mutex::new(model),
        }
    }

    /// Workspace key
    #[inline]
    #[must_use]
    pub fn id(&self) -> &ModelId {
        &self.id
    }

    /// Block until the model is exclusively held
    pub fn lock(&self) -> MutexGuard<'_, Box<dyn Model>> {
        self.model.lock()
    }

    /// Hold the model if nobody else does
    pub fn try_lock(&self) -> Option<MutexGuard<'_, Box<dyn Model>>> {
        self.model.try_lock()
    }

    /// Whether some job currently holds the model
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.model.is_locked()
    }
}

/// Shared collection of models
#[derive(Debug, Default)]
pub struct Workspace {
    models: DashMap<ModelId, Arc<ModelEntry>>,
}

impl Workspace {
    /// Create empty workspace
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a model, replacing any model with the same id
    ///
    /// A job already holding the replaced entry keeps working on it, and its
    /// changes are lost with that entry.
    pub fn insert(&self, model: Box<dyn Model>) -> Option<Arc<ModelEntry>> {
        let entry = Arc::new(ModelEntry::new(model));
        tracing::debug!(model = %entry.id, "model added to workspace");
        let replaced = self.models.insert(entry.id.clone(), entry);
        if let Some(old) = replaced.as_ref().filter(|old| old.is_locked()) {
            tracing::warn!(
                model = %old.id,
                "replaced a model while a job holds it; the job's changes will be discarded"
            );
        }
        replaced
    }

    /// Look up a model entry
    #[must_use]
    pub fn get(&self, id: &ModelId) -> Option<Arc<ModelEntry>> {
        self.models.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Remove a model
    pub fn remove(&self, id: &ModelId) -> Option<Arc<ModelEntry>> {
        self.models.remove(id).map(|(_, entry)| entry)
    }

    /// Whether a model with `id` is stored
    #[must_use]
    pub fn contains(&self, id: &ModelId) -> bool {
        self.models.contains_key(id)
    }

    /// Stored ids, sorted
    #[must_use]
    pub fn ids(&self) -> Vec<ModelId> {
        let mut ids: Vec<ModelId> = self.models.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Number of stored models
    #[must_use]
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Whether the workspace is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Run `f` with the model locked
    pub fn with_model<R>(&self, id: &ModelId, f: impl FnOnce(&dyn Model) -> R) -> Option<R> {
        let entry = self.get(id)?;
        let guard = entry.lock();
        Some(f(&**guard))
    }

    /// Collect the entries for `ids` in lock order
    ///
    /// Duplicates are collapsed.
    ///
    /// # Errors
    /// Returns `WorkspaceError::ModelNotFound` for the first missing id
    pub fn resolve(&self, ids: &[ModelId]) -> Result<ModelSet, WorkspaceError> {
        let mut sorted: Vec<&ModelId> = ids.iter().collect();
        sorted.sort();
        sorted.dedup();

        let entries = sorted
            .into_iter()
            .map(|id| {
                self.get(id)
                    .ok_or_else(|| WorkspaceError::ModelNotFound(id.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ModelSet { entries })
    }
}

/// Resolved entries, ready to be locked together
#[derive(Debug)]
pub struct ModelSet {
    entries: Vec<Arc<ModelEntry>>,
}

impl ModelSet {
    /// Lock every entry, in ascending id order
    #[must_use]
    pub fn lock(&self) -> LockedModels<'_> {
        let guards = self
            .entries
            .iter()
            .map(|entry| (&entry.id, entry.lock()))
            .collect();
        LockedModels { guards }
    }

    /// Ids in lock order
    #[must_use]
    pub fn ids(&self) -> Vec<&ModelId> {
        self.entries.iter().map(|e| &e.id).collect()
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Exclusive access to a set of models; dropping it unlocks all of them
#[derive(Debug)]
pub struct LockedModels<'a> {
    guards: Vec<(&'a ModelId, MutexGuard<'a, Box<dyn Model>>)>,
}

impl LockedModels<'_> {
    /// Locked model by id
    #[must_use]
    pub fn get(&self, id: &ModelId) -> Option<&dyn Model> {
        self.guards
            .iter()
            .find(|(key, _)| *key == id)
            .map(|(_, guard)| &***guard)
    }

    /// Mutable locked model by id
    pub fn get_mut(&mut self, id: &ModelId) -> Option<&mut dyn Model> {
        self.guards
            .iter_mut()
            .find(|(key, _)| *key == id)
            .map(|(_, guard)| &mut ***guard)
    }

    /// Locked ids, ascending
    #[must_use]
    pub fn ids(&self) -> Vec<&ModelId> {
        self.guards.iter().map(|(id, _)| *id).collect()
    }

    /// Number of locked models
    #[must_use]
    pub fn len(&self) -> usize {
        self.guards.len()
    }

    /// Whether nothing is locked
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }
}
