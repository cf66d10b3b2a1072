//
// project/mod.rs
//
// Parsed project model: applications, their manifests and services
//

pub mod manifest;
pub mod model_cache;
pub mod parser;

use std::sync::Arc;

use indexmap::IndexMap;
use url::Url;

use crate::document_store::{Document, DocumentStore};
use crate::service::{ServiceArtifacts, ServiceIndex};

pub use manifest::{
    parse_manifest, AnnotationFileRef, AnnotationOrigin, ParsedManifest, RoutingTarget,
    ServiceConfig,
};
pub use model_cache::{ModelCache, ModelProvider, NoModelProvider};
pub use parser::ApplicationParser;

/// An application root found by the host's project discovery
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DiscoveredApp {
    pub manifest_uri: Url,
    /// Root of the project the app belongs to (shared by apps of one project)
    pub project_root: Url,
    pub app_root: Url,
}

impl DiscoveredApp {
    pub fn new(manifest_uri: Url, project_root: Url, app_root: Url) -> Self {
        Self {
            manifest_uri,
            project_root,
            app_root,
        }
    }
}

/// How a service's artifacts were obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceSource {
    /// Metadata and annotation copies inside the app
    Local,
    /// Compiled from the project's declarative model
    Cap,
}

#[derive(Debug, Clone)]
pub struct ParsedService {
    pub config: ServiceConfig,
    pub source: ServiceSource,
    pub artifacts: ServiceArtifacts,
    pub index: ServiceIndex,
}

#[derive(Debug, Clone)]
pub struct ParsedApplication {
    pub app_root: Url,
    pub manifest_uri: Url,
    /// Directory holding the manifest
    pub webapp_path: Url,
    pub project_root: Url,
    pub flex_enabled: bool,
    pub min_ui5_version: Option<String>,
    pub main_service_name: Option<String>,
    pub custom_views: IndexMap<String, String>,
    pub manifest: ParsedManifest,
    /// Manifest snapshot the application was derived from
    pub manifest_document: Arc<Document>,
    pub services: IndexMap<String, Arc<ParsedService>>,
}

impl ParsedApplication {
    pub fn discovered(&self) -> DiscoveredApp {
        DiscoveredApp::new(
            self.manifest_uri.clone(),
            self.project_root.clone(),
            self.app_root.clone(),
        )
    }

    /// The service bound to the default model
    pub fn main_service(&self) -> Option<&Arc<ParsedService>> {
        self.services.get(self.main_service_name.as_deref()?)
    }

    /// Every document this application was built from
    pub fn documents(&self) -> impl Iterator<Item = &Arc<Document>> {
        std::iter::once(&self.manifest_document).chain(self.services.values().flat_map(|s| {
            s.artifacts
                .metadata
                .iter()
                .chain(s.artifacts.annotation_files.iter())
        }))
    }
}

/// Result of a full parse or a reparse
#[derive(Debug, Clone, Default)]
pub struct ParsedProject {
    /// Applications keyed by app root
    pub apps: IndexMap<Url, Arc<ParsedApplication>>,
    /// Documents read by the applications, keyed by URI
    pub documents: IndexMap<Url, Arc<Document>>,
    /// Applications left out because their manifest could not be derived,
    /// keyed by app root. A later manifest change may bring them back.
    pub skipped: IndexMap<Url, DiscoveredApp>,
}

impl ParsedProject {
    pub(crate) fn from_apps(
        apps: IndexMap<Url, Arc<ParsedApplication>>,
        skipped: IndexMap<Url, DiscoveredApp>,
    ) -> Self {
        let mut documents = IndexMap::new();
        for document in apps.values().flat_map(|app| app.documents()) {
            documents
                .entry(document.uri.clone())
                .or_insert_with(|| Arc::clone(document));
        }
        Self {
            apps,
            documents,
            skipped,
        }
    }

    /// Application whose manifest is `uri`
    pub fn app_for_manifest(&self, uri: &Url) -> Option<&Arc<ParsedApplication>> {
        self.apps.values().find(|app| &app.manifest_uri == uri)
    }
}

/// Load metadata and annotation documents of a service from the store.
/// Declared documents missing from the store are kept as URIs only.
pub(crate) fn artifacts_from_store(
    metadata_uri: Option<Url>,
    annotation_uris: Vec<Url>,
    store: &DocumentStore,
) -> ServiceArtifacts {
    let metadata = metadata_uri.as_ref().and_then(|uri| {
        let document = store.get(uri);
        if document.is_none() {
            log::debug!("Metadata document not in store: {}", uri);
        }
        document
    });
    let annotation_files = annotation_uris
        .iter()
        .filter_map(|uri| {
            let document = store.get(uri);
            if document.is_none() {
                log::debug!("Annotation document not in store: {}", uri);
            }
            document
        })
        .collect();
    ServiceArtifacts {
        metadata_uri,
        metadata,
        annotation_uris,
        annotation_files,
    }
}
