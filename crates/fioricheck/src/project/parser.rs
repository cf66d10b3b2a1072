//
// project/parser.rs
//
// Application parser with incremental, identity-preserving reparse
//

use std::sync::Arc;

use indexmap::IndexMap;
use url::Url;

use super::manifest::{parse_manifest, ServiceConfig};
use super::model_cache::{ModelCache, ModelProvider, NoModelProvider};
use super::{
    artifacts_from_store, DiscoveredApp, ParsedApplication, ParsedProject, ParsedService,
    ServiceSource,
};
use crate::config::AnalysisConfig;
use crate::document_store::{DocumentKind, DocumentStore, DocumentTree};
use crate::error::AnalysisError;
use crate::perf::TimingGuard;
use crate::service::{build_service_index, AliasCache};

/// Builds [`ParsedProject`]s from documents in a [`DocumentStore`].
///
/// Holds the caches that survive between parses: alias tables per document
/// revision and declarative-model lookups per project root.
pub struct ApplicationParser {
    config: AnalysisConfig,
    provider: Box<dyn ModelProvider>,
    model_cache: ModelCache,
    alias_cache: AliasCache,
}

impl std::fmt::Debug for ApplicationParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApplicationParser")
            .field("config", &self.config)
            .field("model_cache", &self.model_cache)
            .finish_non_exhaustive()
    }
}

impl Default for ApplicationParser {
    fn default() -> Self {
        Self::new(AnalysisConfig::default())
    }
}

impl ApplicationParser {
    pub fn new(config: AnalysisConfig) -> Self {
        Self::with_provider(config, Box::new(NoModelProvider))
    }

    pub fn with_provider(config: AnalysisConfig, provider: Box<dyn ModelProvider>) -> Self {
        let alias_cache = AliasCache::with_capacity(config.alias_cache_capacity);
        Self {
            config,
            provider,
            model_cache: ModelCache::new(),
            alias_cache,
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Replace the configuration. Cached alias tables are dropped when the
    /// new configuration changes how indexes are built.
    pub fn set_config(&mut self, config: AnalysisConfig) {
        if self.config.index_settings_changed(&config)
            || self.config.alias_cache_capacity != config.alias_cache_capacity
        {
            self.alias_cache = AliasCache::with_capacity(config.alias_cache_capacity);
        }
        self.config = config;
    }

    /// Forget declarative-model results for a project root.
    pub fn reset_cache(&mut self, project_root: &Url) -> usize {
        self.model_cache.reset_cache(project_root)
    }

    // ========================================================================
    // Full parse
    // ========================================================================

    /// Parse every discovered application.
    ///
    /// An application whose manifest is missing or malformed is left out and
    /// logged; the others are unaffected.
    pub fn parse(&mut self, apps: &[DiscoveredApp], store: &DocumentStore) -> ParsedProject {
        let _guard = TimingGuard::new("parse_project");
        let mut parsed = IndexMap::new();
        let mut skipped = IndexMap::new();
        for app in apps {
            match self.parse_app(app, store) {
                Ok(application) => {
                    parsed.insert(app.app_root.clone(), Arc::new(application));
                }
                Err(err) => {
                    log::warn!("Skipping application {}: {}", app.app_root, err);
                    skipped.insert(app.app_root.clone(), app.clone());
                }
            }
        }
        log::debug!("Parsed {} of {} applications", parsed.len(), apps.len());
        ParsedProject::from_apps(parsed, skipped)
    }

    fn parse_app(
        &mut self,
        app: &DiscoveredApp,
        store: &DocumentStore,
    ) -> Result<ParsedApplication, AnalysisError> {
        let application = self.parse_manifest_only(app, store)?;
        let services = self.build_services(&application, store, |_| None);
        Ok(ParsedApplication {
            services,
            ..application
        })
    }

    /// Derive an application from its manifest, without services
    fn parse_manifest_only(
        &self,
        app: &DiscoveredApp,
        store: &DocumentStore,
    ) -> Result<ParsedApplication, AnalysisError> {
        let document = store
            .get(&app.manifest_uri)
            .ok_or_else(|| AnalysisError::MissingDocument(app.manifest_uri.clone()))?;
        let root = match &document.tree {
            DocumentTree::Json(root) => root,
            DocumentTree::Malformed(message) => {
                return Err(AnalysisError::InvalidManifest {
                    uri: app.manifest_uri.clone(),
                    message: message.clone(),
                })
            }
            _ => {
                return Err(AnalysisError::UnexpectedDocumentKind {
                    uri: app.manifest_uri.clone(),
                    expected: DocumentKind::Manifest.as_str(),
                })
            }
        };
        let manifest = parse_manifest(&app.manifest_uri, root)?;
        let webapp_path = app
            .manifest_uri
            .join("./")
            .unwrap_or_else(|_| app.app_root.clone());

        Ok(ParsedApplication {
            app_root: app.app_root.clone(),
            manifest_uri: app.manifest_uri.clone(),
            webapp_path,
            project_root: app.project_root.clone(),
            flex_enabled: manifest.flex_enabled.unwrap_or(false),
            min_ui5_version: manifest.min_ui5_version.clone(),
            main_service_name: manifest.main_service_name.clone(),
            custom_views: manifest.custom_views.clone(),
            manifest,
            manifest_document: Arc::clone(&document),
            services: IndexMap::new(),
        })
    }

    /// Build the services of an application. `reuse` may hand back a
    /// previously built service for a config, which is kept as is.
    fn build_services(
        &mut self,
        application: &ParsedApplication,
        store: &DocumentStore,
        reuse: impl Fn(&ServiceConfig) -> Option<Arc<ParsedService>>,
    ) -> IndexMap<String, Arc<ParsedService>> {
        let mut services = IndexMap::new();
        for config in &application.manifest.services {
            if let Some(previous) = reuse(config) {
                services.insert(config.name.clone(), previous);
                continue;
            }
            if let Some(service) = self.build_service(config, application, store) {
                services.insert(config.name.clone(), Arc::new(service));
            }
        }
        services
    }

    /// Resolve artifacts and index one service. Services whose metadata is
    /// malformed or cannot be found are dropped.
    fn build_service(
        &mut self,
        config: &ServiceConfig,
        application: &ParsedApplication,
        store: &DocumentStore,
    ) -> Option<ParsedService> {
        let _guard = TimingGuard::new("build_service");
        let (source, artifacts) = if config.is_local() {
            let artifacts = artifacts_from_store(
                config.metadata_document(&application.manifest_uri),
                config.annotation_documents(&application.manifest_uri),
                store,
            );
            (ServiceSource::Local, artifacts)
        } else {
            let compiled = self.model_cache.get_or_load(
                self.provider.as_ref(),
                &application.project_root,
                config,
                store,
            )?;
            // Cached lookups may hold older snapshots of the compiled documents
            let artifacts = artifacts_from_store(compiled.metadata_uri, compiled.annotation_uris, store);
            (ServiceSource::Cap, artifacts)
        };

        if artifacts.metadata.is_none() {
            log::warn!(
                "Skipping service {} of {}: metadata not available",
                config.name,
                application.app_root
            );
            return None;
        }
        if artifacts.has_malformed_metadata() {
            log::warn!(
                "Skipping service {} of {}: malformed metadata",
                config.name,
                application.app_root
            );
            return None;
        }

        let index = build_service_index(&artifacts, &self.config, &self.alias_cache);
        Some(ParsedService {
            config: config.clone(),
            source,
            artifacts,
            index,
        })
    }

    // ========================================================================
    // Incremental reparse
    // ========================================================================

    /// Update `previous` after the host replaced (or removed) `changed` in
    /// the store.
    ///
    /// Only applications affected by the change are rebuilt; every other
    /// application keeps its `Arc`, and within a rebuilt application every
    /// untouched service keeps its `Arc`.
    pub fn reparse(
        &mut self,
        changed: &Url,
        previous: &ParsedProject,
        store: &DocumentStore,
    ) -> ParsedProject {
        let _guard = TimingGuard::with_threshold("reparse_project", 50);
        let kind = store.kind_of(changed);
        log::debug!("Reparse triggered by {} ({})", changed, kind.as_str());

        let mut apps = IndexMap::new();
        let mut skipped = previous.skipped.clone();
        match kind {
            DocumentKind::Manifest => {
                for (root, app) in &previous.apps {
                    if &app.manifest_uri != changed {
                        apps.insert(root.clone(), Arc::clone(app));
                        continue;
                    }
                    match self.reparse_manifest(app, store) {
                        Ok(application) => {
                            apps.insert(root.clone(), Arc::new(application));
                        }
                        Err(err) => {
                            log::warn!("Dropping application {}: {}", root, err);
                            skipped.insert(root.clone(), app.discovered());
                        }
                    }
                }
                let revived: Vec<DiscoveredApp> = previous
                    .skipped
                    .values()
                    .filter(|app| &app.manifest_uri == changed)
                    .cloned()
                    .collect();
                for app in revived {
                    match self.parse_app(&app, store) {
                        Ok(application) => {
                            log::debug!("Recovered application {}", app.app_root);
                            skipped.shift_remove(&app.app_root);
                            apps.insert(app.app_root.clone(), Arc::new(application));
                        }
                        Err(err) => log::debug!("Application {} still skipped: {}", app.app_root, err),
                    }
                }
            }
            DocumentKind::DeclarativeModel => {
                let roots: Vec<Url> = previous
                    .apps
                    .values()
                    .map(|app| app.project_root.clone())
                    .filter(|root| changed.as_str().starts_with(root.as_str()))
                    .collect();
                let mut reset = Vec::new();
                for root in roots {
                    if !reset.contains(&root) {
                        self.reset_cache(&root);
                        reset.push(root);
                    }
                }
                for (root, app) in &previous.apps {
                    let rebuilt = if reset.contains(&app.project_root) {
                        self.rebuild_services(app, store, |config, _| !config.is_local())
                    } else {
                        None
                    };
                    apps.insert(root.clone(), rebuilt.map(Arc::new).unwrap_or_else(|| Arc::clone(app)));
                }
            }
            DocumentKind::Metadata | DocumentKind::Annotation | DocumentKind::Other => {
                for (root, app) in &previous.apps {
                    let manifest_uri = &app.manifest_uri;
                    let rebuilt = self.rebuild_services(app, store, |config, service| match service {
                        Some(service) => service.artifacts.references(changed),
                        // A dropped local service may recover through this document
                        None => {
                            config.metadata_document(manifest_uri).as_ref() == Some(changed)
                                || config.annotation_documents(manifest_uri).contains(changed)
                        }
                    });
                    apps.insert(root.clone(), rebuilt.map(Arc::new).unwrap_or_else(|| Arc::clone(app)));
                }
            }
        }
        ParsedProject::from_apps(apps, skipped)
    }

    /// Re-derive an application from its changed manifest, reusing every
    /// service whose declaration is unchanged.
    fn reparse_manifest(
        &mut self,
        previous: &ParsedApplication,
        store: &DocumentStore,
    ) -> Result<ParsedApplication, AnalysisError> {
        let application = self.parse_manifest_only(&previous.discovered(), store)?;
        if application.manifest.services == previous.manifest.services {
            log::trace!("Service declarations unchanged for {}", previous.app_root);
        }
        let services = self.build_services(&application, store, |config| {
            previous
                .services
                .get(&config.name)
                .filter(|service| &service.config == config)
                .cloned()
        });
        Ok(ParsedApplication {
            services,
            ..application
        })
    }

    /// Rebuild the services selected by `affected`, which sees every declared
    /// service config together with its current service (absent when it was
    /// dropped). Returns `None` when nothing is affected, so the caller keeps
    /// the previous application.
    fn rebuild_services(
        &mut self,
        app: &ParsedApplication,
        store: &DocumentStore,
        affected: impl Fn(&ServiceConfig, Option<&ParsedService>) -> bool,
    ) -> Option<ParsedApplication> {
        let current = |config: &ServiceConfig| app.services.get(&config.name).map(Arc::as_ref);
        if !app
            .manifest
            .services
            .iter()
            .any(|config| affected(config, current(config)))
        {
            return None;
        }
        let services = self.build_services(app, store, |config| {
            app.services
                .get(&config.name)
                .filter(|service| !affected(config, Some(Arc::as_ref(service))))
                .cloned()
        });
        log::debug!("Rebuilt services of {}", app.app_root);
        Some(ParsedApplication {
            services,
            ..app.clone()
        })
    }
}
