//
// document_store.rs
//
// Document store holding raw text and parsed trees per document URI
//

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use ropey::Rope;
use url::Url;

use crate::syntax::{parse_json, parse_xml, JsonNode, XmlElement};

// ============================================================================
// Document Kinds
// ============================================================================

/// Role a document plays in a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    /// Application descriptor (`manifest.json`)
    Manifest,
    /// Entity model of a data service (EDMX)
    Metadata,
    /// Annotation file attached to a data service
    Annotation,
    /// Declarative data-model source (`.cds`)
    DeclarativeModel,
    Other,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Manifest => "manifest",
            DocumentKind::Metadata => "metadata",
            DocumentKind::Annotation => "annotation",
            DocumentKind::DeclarativeModel => "declarative-model",
            DocumentKind::Other => "other",
        }
    }
}

/// Classifies documents by kind. Supplied by the host; [`DefaultClassifier`]
/// covers the usual project layout.
pub trait DocumentClassifier {
    fn classify(&self, uri: &Url, text: &str) -> DocumentKind;
}

/// File-name and content based classification.
///
/// `manifest.json` is a manifest, `.cds` is a declarative model, markup files
/// declaring entity types or an entity container are metadata, every other
/// markup file is an annotation file.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultClassifier;

impl DocumentClassifier for DefaultClassifier {
    fn classify(&self, uri: &Url, text: &str) -> DocumentKind {
        let path = uri.path();
        let file_name = path.rsplit('/').next().unwrap_or(path);
        let extension = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();

        if file_name == "manifest.json" {
            return DocumentKind::Manifest;
        }
        match extension.as_str() {
            "cds" => DocumentKind::DeclarativeModel,
            "xml" | "edmx" => {
                if text.contains("<EntityContainer") || text.contains("<EntityType ") {
                    DocumentKind::Metadata
                } else {
                    DocumentKind::Annotation
                }
            }
            _ => DocumentKind::Other,
        }
    }
}

// ============================================================================
// Document
// ============================================================================

/// Parsed representation of a document, chosen by its kind.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentTree {
    Json(JsonNode),
    Xml(XmlElement),
    /// Kind without a tree (declarative model sources, unknown files)
    Unparsed,
    /// Text that failed to parse; the message is kept for logging
    Malformed(String),
}

/// A document snapshot. Immutable once created; edits replace it wholesale.
#[derive(Debug)]
pub struct Document {
    pub uri: Url,
    pub text: String,
    pub kind: DocumentKind,
    pub tree: DocumentTree,
    /// Incremented every time the store replaces this URI
    pub revision: u64,
    lines: Rope,
}

impl Document {
    /// Create a document and parse its tree according to `kind`.
    pub fn new(uri: Url, text: String, kind: DocumentKind, revision: u64) -> Self {
        let tree = Self::parse_tree(&uri, &text, kind);
        let lines = Rope::from_str(&text);
        Self {
            uri,
            text,
            kind,
            tree,
            revision,
            lines,
        }
    }

    fn parse_tree(uri: &Url, text: &str, kind: DocumentKind) -> DocumentTree {
        let result = match kind {
            DocumentKind::Manifest => parse_json(text).map(DocumentTree::Json),
            DocumentKind::Metadata | DocumentKind::Annotation => {
                parse_xml(text).map(DocumentTree::Xml)
            }
            DocumentKind::Other if uri.path().ends_with(".json") => {
                parse_json(text).map(DocumentTree::Json)
            }
            DocumentKind::DeclarativeModel | DocumentKind::Other => Ok(DocumentTree::Unparsed),
        };
        result.unwrap_or_else(|err| {
            log::debug!("Failed to parse {} as {}: {}", uri, kind.as_str(), err);
            DocumentTree::Malformed(err.to_string())
        })
    }

    pub fn json(&self) -> Option<&JsonNode> {
        match &self.tree {
            DocumentTree::Json(node) => Some(node),
            _ => None,
        }
    }

    pub fn xml(&self) -> Option<&XmlElement> {
        match &self.tree {
            DocumentTree::Xml(element) => Some(element),
            _ => None,
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self.tree, DocumentTree::Malformed(_))
    }

    /// Zero-based (line, column) of a byte offset; columns count chars.
    /// Offsets past the end clamp to the end of the document.
    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        let offset = offset.min(self.lines.len_bytes());
        let char_idx = self.lines.byte_to_char(offset);
        let line = self.lines.char_to_line(char_idx);
        let column = char_idx - self.lines.line_to_char(line);
        (line, column)
    }
}

// ============================================================================
// Metrics
// ============================================================================

/// Metrics for tracking DocumentStore usage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentStoreMetrics {
    /// Number of lookups that found a document
    pub cache_hits: u64,
    /// Number of lookups for unknown URIs
    pub cache_misses: u64,
    /// Total number of documents inserted or replaced
    pub documents_opened: u64,
    /// Total number of documents removed
    pub documents_closed: u64,
}

#[derive(Debug, Default)]
struct AtomicMetrics {
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    documents_opened: AtomicU64,
    documents_closed: AtomicU64,
}

// ============================================================================
// Document Store
// ============================================================================

/// Store of all project documents, written only by the host.
///
/// The analysis core reads from it; reparse is invoked after the host has
/// replaced the changed document.
pub struct DocumentStore {
    documents: IndexMap<Url, Arc<Document>>,
    classifier: Box<dyn DocumentClassifier>,
    metrics: AtomicMetrics,
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore")
            .field("documents", &self.documents.len())
            .finish_non_exhaustive()
    }
}

impl DocumentStore {
    /// Create a store using [`DefaultClassifier`]
    pub fn new() -> Self {
        Self::with_classifier(Box::new(DefaultClassifier))
    }

    pub fn with_classifier(classifier: Box<dyn DocumentClassifier>) -> Self {
        Self {
            documents: IndexMap::new(),
            classifier,
            metrics: AtomicMetrics::default(),
        }
    }

    /// Insert or replace a document, classifying it with the store's classifier.
    pub fn insert(&mut self, uri: Url, text: impl Into<String>) -> Arc<Document> {
        let text = text.into();
        let kind = self.classifier.classify(&uri, &text);
        self.insert_with_kind(uri, text, kind)
    }

    /// Insert or replace a document with an explicit kind.
    ///
    /// The revision of a replaced document is one higher than its predecessor.
    pub fn insert_with_kind(
        &mut self,
        uri: Url,
        text: impl Into<String>,
        kind: DocumentKind,
    ) -> Arc<Document> {
        let revision = self
            .documents
            .get(&uri)
            .map(|doc| doc.revision + 1)
            .unwrap_or(0);
        let document = Arc::new(Document::new(uri.clone(), text.into(), kind, revision));
        log::trace!(
            "Storing {} ({}, revision {})",
            uri,
            kind.as_str(),
            revision
        );
        self.documents.insert(uri, Arc::clone(&document));
        self.metrics.documents_opened.fetch_add(1, Ordering::Relaxed);
        document
    }

    /// Remove a document. Returns whether it was present.
    pub fn remove(&mut self, uri: &Url) -> bool {
        let removed = self.documents.shift_remove(uri).is_some();
        if removed {
            self.metrics.documents_closed.fetch_add(1, Ordering::Relaxed);
        }
        removed
    }

    pub fn get(&self, uri: &Url) -> Option<Arc<Document>> {
        let document = self.documents.get(uri).cloned();
        let counter = if document.is_some() {
            &self.metrics.cache_hits
        } else {
            &self.metrics.cache_misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        document
    }

    pub fn contains(&self, uri: &Url) -> bool {
        self.documents.contains_key(uri)
    }

    /// Kind of a stored document, or the classifier's guess from the URI alone
    /// for documents that are not (or no longer) in the store.
    pub fn kind_of(&self, uri: &Url) -> DocumentKind {
        match self.documents.get(uri) {
            Some(document) => document.kind,
            None => self.classifier.classify(uri, ""),
        }
    }

    pub fn classify(&self, uri: &Url, text: &str) -> DocumentKind {
        self.classifier.classify(uri, text)
    }

    /// Documents whose URI lies under `root`, in insertion order.
    pub fn documents_under<'a>(&'a self, root: &'a Url) -> impl Iterator<Item = &'a Arc<Document>> + 'a {
        self.documents
            .iter()
            .filter(move |(uri, _)| uri.as_str().starts_with(root.as_str()))
            .map(|(_, doc)| doc)
    }

    pub fn uris(&self) -> Vec<Url> {
        self.documents.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Snapshot of the store metrics
    pub fn metrics(&self) -> DocumentStoreMetrics {
        DocumentStoreMetrics {
            cache_hits: self.metrics.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.metrics.cache_misses.load(Ordering::Relaxed),
            documents_opened: self.metrics.documents_opened.load(Ordering::Relaxed),
            documents_closed: self.metrics.documents_closed.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(path: &str) -> Url {
        Url::parse(&format!("file:///project{}", path)).unwrap()
    }

    #[test]
    fn test_default_classifier() {
        let classifier = DefaultClassifier;
        assert_eq!(
            classifier.classify(&uri("/webapp/manifest.json"), "{}"),
            DocumentKind::Manifest
        );
        assert_eq!(
            classifier.classify(&uri("/srv/service.cds"), ""),
            DocumentKind::DeclarativeModel
        );
        assert_eq!(
            classifier.classify(
                &uri("/webapp/localService/metadata.xml"),
                "<Schema><EntityType Name=\"A\"/></Schema>"
            ),
            DocumentKind::Metadata
        );
        assert_eq!(
            classifier.classify(&uri("/webapp/annotations/annotation.xml"), "<Annotations/>"),
            DocumentKind::Annotation
        );
        assert_eq!(
            classifier.classify(&uri("/package.json"), "{}"),
            DocumentKind::Other
        );
    }

    #[test]
    fn test_insert_and_get() {
        let mut store = DocumentStore::new();
        let manifest = uri("/webapp/manifest.json");
        store.insert(manifest.clone(), r#"{"sap.app": {}}"#);

        let doc = store.get(&manifest).expect("stored");
        assert_eq!(doc.kind, DocumentKind::Manifest);
        assert!(doc.json().is_some());
        assert_eq!(doc.revision, 0);
        assert!(store.get(&uri("/missing.json")).is_none());

        let metrics = store.metrics();
        assert_eq!(metrics.cache_hits, 1);
        assert_eq!(metrics.cache_misses, 1);
        assert_eq!(metrics.documents_opened, 1);
    }

    #[test]
    fn test_replace_increments_revision_and_keeps_old_snapshot() {
        let mut store = DocumentStore::new();
        let manifest = uri("/webapp/manifest.json");
        let first = store.insert(manifest.clone(), r#"{"a": 1}"#);
        let second = store.insert(manifest.clone(), r#"{"a": 2}"#);

        assert_eq!(first.revision, 0);
        assert_eq!(second.revision, 1);
        assert_eq!(first.text, r#"{"a": 1}"#);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_malformed_documents_are_kept() {
        let mut store = DocumentStore::new();
        let manifest = uri("/webapp/manifest.json");
        let doc = store.insert(manifest, r#"{"a": "#);
        assert!(doc.is_malformed());
        assert!(doc.json().is_none());
    }

    #[test]
    fn test_remove() {
        let mut store = DocumentStore::new();
        let manifest = uri("/webapp/manifest.json");
        store.insert(manifest.clone(), "{}");
        assert!(store.remove(&manifest));
        assert!(!store.remove(&manifest));
        assert!(store.is_empty());
        assert_eq!(store.metrics().documents_closed, 1);
        assert_eq!(store.kind_of(&manifest), DocumentKind::Manifest);
    }

    #[test]
    fn test_documents_under_root() {
        let mut store = DocumentStore::new();
        store.insert(uri("/a/webapp/manifest.json"), "{}");
        store.insert(uri("/a/db/schema.cds"), "entity A {}");
        store.insert(uri("/b/webapp/manifest.json"), "{}");
        let root = uri("/a/");
        assert_eq!(store.documents_under(&root).count(), 2);
    }

    #[test]
    fn test_line_col() {
        let doc = Document::new(
            uri("/x.json"),
            "{\n  \"é\": 1\n}".to_string(),
            DocumentKind::Other,
            0,
        );
        assert_eq!(doc.line_col(0), (0, 0));
        assert_eq!(doc.line_col(4), (1, 2));
        // after the two-byte 'é' and closing quote
        assert_eq!(doc.line_col(8), (1, 5));
        assert_eq!(doc.line_col(1000), (2, 1));
    }
}
