//
// project/model_cache.rs
//
// Artifacts of services backed by a project's declarative model
//

use indexmap::IndexMap;
use url::Url;

use super::manifest::ServiceConfig;
use crate::document_store::DocumentStore;
use crate::service::ServiceArtifacts;

/// Supplies artifacts for services without a local metadata copy.
///
/// Hosts implement this to compile the project's declarative model into
/// metadata and annotation documents. The result must only reference
/// documents present in `store`.
pub trait ModelProvider {
    fn service_artifacts(
        &self,
        project_root: &Url,
        service: &ServiceConfig,
        store: &DocumentStore,
    ) -> Option<ServiceArtifacts>;
}

/// Provider for hosts without a declarative model; every lookup misses
#[derive(Debug, Clone, Copy, Default)]
pub struct NoModelProvider;

impl ModelProvider for NoModelProvider {
    fn service_artifacts(
        &self,
        _project_root: &Url,
        _service: &ServiceConfig,
        _store: &DocumentStore,
    ) -> Option<ServiceArtifacts> {
        None
    }
}

/// Key of a cached model lookup: project root and service URI
type ModelKey = (Url, String);

/// Cache of provider results keyed by project root.
///
/// Misses are cached too, so a project without a declarative model is asked
/// once per service until [`reset_cache`](ModelCache::reset_cache).
#[derive(Debug, Default)]
pub struct ModelCache {
    entries: IndexMap<ModelKey, Option<ServiceArtifacts>>,
}

impl ModelCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached artifacts for `service`, asking `provider` on first use.
    pub fn get_or_load(
        &mut self,
        provider: &dyn ModelProvider,
        project_root: &Url,
        service: &ServiceConfig,
        store: &DocumentStore,
    ) -> Option<ServiceArtifacts> {
        let key = (
            project_root.clone(),
            service.uri.clone().unwrap_or_else(|| service.name.clone()),
        );
        if let Some(cached) = self.entries.get(&key) {
            log::trace!("Model cache hit for {} in {}", key.1, project_root);
            return cached.clone();
        }
        let artifacts = provider.service_artifacts(project_root, service, store);
        if artifacts.is_none() {
            log::debug!(
                "No model for service {} in project {}",
                service.name,
                project_root
            );
        }
        self.entries.insert(key, artifacts.clone());
        artifacts
    }

    /// Forget every entry of a project. Returns the number of entries dropped.
    pub fn reset_cache(&mut self, project_root: &Url) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(root, _), _| root != project_root);
        let dropped = before - self.entries.len();
        log::debug!("Reset model cache for {} ({} entries)", project_root, dropped);
        dropped
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct CountingProvider {
        calls: Cell<usize>,
    }

    impl ModelProvider for CountingProvider {
        fn service_artifacts(
            &self,
            _project_root: &Url,
            _service: &ServiceConfig,
            _store: &DocumentStore,
        ) -> Option<ServiceArtifacts> {
            self.calls.set(self.calls.get() + 1);
            Some(ServiceArtifacts::default())
        }
    }

    fn service(uri: &str) -> ServiceConfig {
        ServiceConfig {
            name: "mainService".to_string(),
            uri: Some(uri.to_string()),
            odata_version: Some("4.0".to_string()),
            local_uri: None,
            annotations: Vec::new(),
        }
    }

    #[test]
    fn test_cache_hits_until_reset() {
        let provider = CountingProvider { calls: Cell::new(0) };
        let store = DocumentStore::new();
        let mut cache = ModelCache::new();
        let root_a = Url::parse("file:///a/").unwrap();
        let root_b = Url::parse("file:///b/").unwrap();

        assert!(cache.get_or_load(&provider, &root_a, &service("/odata/v4/travel/"), &store).is_some());
        assert!(cache.get_or_load(&provider, &root_a, &service("/odata/v4/travel/"), &store).is_some());
        assert_eq!(provider.calls.get(), 1);

        cache.get_or_load(&provider, &root_b, &service("/odata/v4/travel/"), &store);
        assert_eq!(provider.calls.get(), 2);
        assert_eq!(cache.len(), 2);

        assert_eq!(cache.reset_cache(&root_a), 1);
        cache.get_or_load(&provider, &root_a, &service("/odata/v4/travel/"), &store);
        assert_eq!(provider.calls.get(), 3);
    }

    #[test]
    fn test_misses_are_cached() {
        let store = DocumentStore::new();
        let mut cache = ModelCache::new();
        let root = Url::parse("file:///a/").unwrap();
        assert!(cache
            .get_or_load(&NoModelProvider, &root, &service("/x/"), &store)
            .is_none());
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }
}
