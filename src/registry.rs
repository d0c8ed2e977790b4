//! Registry of build coordinators
//!
//! Maps fingerprints to the single coordinator serving them. Requests with
//! equal fingerprints share one coordinator, and so share its in-flight
//! build and cached result, even when their other options differ. The first
//! request's options win.
//!
//! Coordinators whose options name the same cache file share one in-memory
//! view of it through the collaborators' cache table.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::cache::CacheTable;
use crate::coordinator::{BuildCoordinator, BuildOutcome, Collaborators};
use crate::options::BuildOptions;

/// Process-wide set of coordinators, keyed by fingerprint
#[derive(Debug)]
pub struct Registry {
    collaborators: Collaborators,
    coordinators: Mutex<HashMap<String, Arc<BuildCoordinator>>>,
}

impl Registry {
    pub fn new(collaborators: Collaborators) -> Self {
        Self {
            collaborators,
            coordinators: Mutex::new(HashMap::new()),
        }
    }

    /// Coordinator for `fingerprint`, created by `create` on first use.
    ///
    /// `create` runs at most once per fingerprint, under the registry lock.
    pub fn resolve<F>(&self, fingerprint: &str, create: F) -> Arc<BuildCoordinator>
    where
        F: FnOnce() -> Arc<BuildCoordinator>,
    {
        let mut coordinators = self.lock();
        if let Some(existing) = coordinators.get(fingerprint) {
            return Arc::clone(existing);
        }

        let created = create();
        tracing::debug!(fingerprint, "registered build coordinator");
        coordinators.insert(fingerprint.to_string(), Arc::clone(&created));
        created
    }

    /// Coordinator serving `options`, creating it with the registry's
    /// collaborators if needed
    pub fn coordinator(&self, options: &BuildOptions) -> Arc<BuildCoordinator> {
        let fingerprint = options.fingerprint();
        self.resolve(&fingerprint, || {
            BuildCoordinator::new(options.clone(), self.collaborators.clone())
        })
    }

    /// Request a build result for `options`
    ///
    /// Returns the coordinator that will invoke `callback`.
    pub fn build<F>(&self, options: &BuildOptions, callback: F) -> Arc<BuildCoordinator>
    where
        F: FnOnce(BuildOutcome) + Send + 'static,
    {
        let coordinator = self.coordinator(options);
        coordinator.request(callback);
        coordinator
    }

    pub fn get(&self, fingerprint: &str) -> Option<Arc<BuildCoordinator>> {
        self.lock().get(fingerprint).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Registered fingerprints, sorted
    pub fn fingerprints(&self) -> Vec<String> {
        let mut fingerprints: Vec<String> = self.lock().keys().cloned().collect();
        fingerprints.sort();
        fingerprints
    }

    /// Cache files opened by this registry's coordinators
    pub fn caches(&self) -> &CacheTable {
        &self.collaborators.caches
    }

    /// Forget every coordinator and open cache file. Builds in flight still
    /// complete and deliver; later requests reload the cache from disk.
    pub fn clear(&self) {
        self.lock().clear();
        self.collaborators.caches.clear();
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<BuildCoordinator>>> {
        self.coordinators
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
