//
// service/mod.rs
//
// Service indexer: entity model plus layered annotations for one data service
//

pub mod alias;
pub mod annotations;
pub mod metadata;

use std::sync::Arc;

use indexmap::IndexMap;
use url::Url;

use crate::config::AnalysisConfig;
use crate::document_store::Document;
use crate::syntax::XmlElement;

pub use alias::{build_alias_table, AliasCache, AliasTable, Include, Reference};
pub use annotations::{
    AnnotationIndex, AnnotationOccurrence, IndexedAnnotation, UI_FACETS, UI_LINE_ITEM,
    UNQUALIFIED,
};
pub use metadata::{parse_metadata, MetadataElement, MetadataKind, MetadataModel, ODataVersion};

/// Resolved input documents of one service.
///
/// `annotation_files` is in priority order: the first file is the lowest
/// layer, the last one wins.
#[derive(Debug, Clone, Default)]
pub struct ServiceArtifacts {
    pub metadata_uri: Option<Url>,
    pub metadata: Option<Arc<Document>>,
    pub annotation_uris: Vec<Url>,
    pub annotation_files: Vec<Arc<Document>>,
}

impl ServiceArtifacts {
    /// Whether this service reads `uri`, either as metadata or as an
    /// annotation file (including declared files missing from the store).
    pub fn references(&self, uri: &Url) -> bool {
        self.metadata_uri.as_ref() == Some(uri) || self.annotation_uris.iter().any(|u| u == uri)
    }

    /// Whether the metadata document failed to parse
    pub fn has_malformed_metadata(&self) -> bool {
        self.metadata.as_ref().is_some_and(|doc| doc.is_malformed())
    }

    /// Revision fingerprint of every input document
    pub fn revisions(&self) -> Vec<(Url, u64)> {
        self.metadata
            .iter()
            .chain(self.annotation_files.iter())
            .map(|doc| (doc.uri.clone(), doc.revision))
            .collect()
    }
}

/// Index of one service
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceIndex {
    pub version: Option<ODataVersion>,
    /// Schema namespaces of the metadata document
    pub namespaces: Vec<String>,
    pub entity_container: Option<MetadataElement>,
    /// Entity sets and singletons by simple name
    pub entity_sets: IndexMap<String, MetadataElement>,
    /// Entity and complex types by fully qualified name
    pub entity_types: IndexMap<String, MetadataElement>,
    pub annotations: AnnotationIndex,
}

impl ServiceIndex {
    pub fn annotation(
        &self,
        target: &str,
        term: &str,
        qualifier: Option<&str>,
    ) -> Option<&IndexedAnnotation> {
        self.annotations.get(target, term, qualifier)
    }

    pub fn entity_set(&self, name: &str) -> Option<&MetadataElement> {
        self.entity_sets.get(name)
    }

    /// Entity type of an entity set or singleton
    pub fn entity_type_of_set(&self, set: &MetadataElement) -> Option<&MetadataElement> {
        self.entity_types.get(set.structured_type.as_deref()?)
    }

    /// Target entity type of navigation property `name` on `entity_type`
    pub fn navigate(&self, entity_type: &MetadataElement, name: &str) -> Option<&MetadataElement> {
        let navigation = entity_type.navigation_property(name)?;
        self.entity_types.get(navigation.structured_type.as_deref()?)
    }

    /// Entity set reached from `set` through navigation `name`, if bound
    pub fn navigate_set(&self, set: &MetadataElement, name: &str) -> Option<&MetadataElement> {
        self.entity_sets.get(set.navigation_bindings.get(name)?)
    }
}

/// Build the index of one service from its artifacts.
///
/// Never fails: a missing or malformed metadata document gives an index
/// without entities, and annotation files that are not markup are skipped.
/// Occurrences whose target or term cannot be qualified are left out.
pub fn build_service_index(
    artifacts: &ServiceArtifacts,
    config: &AnalysisConfig,
    alias_cache: &AliasCache,
) -> ServiceIndex {
    let mut index = ServiceIndex::default();

    let metadata = artifacts
        .metadata
        .as_ref()
        .and_then(|doc| doc.xml().map(|root| (doc, root)));
    if let Some((_, root)) = metadata {
        let model = parse_metadata(root);
        index.version = model.version;
        index.namespaces = model.namespaces;
        index.entity_container = model.entity_container;
        index.entity_sets = model.entity_sets;
        index.entity_types = model.entity_types;
    } else if let Some(uri) = &artifacts.metadata_uri {
        log::debug!("No usable metadata for {}", uri);
    }

    let service_namespaces: Vec<&str> = index.namespaces.iter().map(String::as_str).collect();

    if config.include_metadata_annotations {
        if let Some((doc, root)) = metadata {
            let aliases = Arc::new(alias_cache.get_or_build(doc).extended(service_namespaces.iter().copied()));
            let raw: Vec<(String, &XmlElement, Option<&str>)> = annotations::collect_inline(root)
                .into_iter()
                .map(|(target, element)| (target, element, None))
                .chain(
                    annotations::collect_targeted(root)
                        .into_iter()
                        .map(|raw| (raw.target.to_string(), raw.element, raw.block_qualifier)),
                )
                .collect();
            let occurrences = to_occurrences(&doc.uri, &raw, &aliases);
            add_occurrences(&mut index.annotations, occurrences);
        }
    }

    // A file declared twice shares its occurrences
    let mut seen: IndexMap<Url, Arc<Vec<PendingOccurrence>>> = IndexMap::new();
    for doc in &artifacts.annotation_files {
        let Some(root) = doc.xml() else {
            log::debug!("Skipping annotation file without markup tree: {}", doc.uri);
            continue;
        };
        let occurrences = match seen.get(&doc.uri) {
            Some(occurrences) => Arc::clone(occurrences),
            None => {
                let aliases =
                    Arc::new(alias_cache.get_or_build(doc).extended(service_namespaces.iter().copied()));
                let raw: Vec<(String, &XmlElement, Option<&str>)> = annotations::collect_targeted(root)
                    .into_iter()
                    .map(|raw| (raw.target.to_string(), raw.element, raw.block_qualifier))
                    .collect();
                let occurrences = Arc::new(to_occurrences(&doc.uri, &raw, &aliases));
                seen.insert(doc.uri.clone(), Arc::clone(&occurrences));
                occurrences
            }
        };
        add_occurrences(&mut index.annotations, occurrences.iter().cloned());
    }

    log::trace!(
        "Indexed service: {} entity sets, {} annotations from {} files",
        index.entity_sets.len(),
        index.annotations.len(),
        artifacts.annotation_files.len()
    );
    index
}

/// A qualified occurrence ready to be added to the index
#[derive(Debug, Clone)]
struct PendingOccurrence {
    target: String,
    term: String,
    qualifier: Option<String>,
    occurrence: AnnotationOccurrence,
}

fn to_occurrences(
    uri: &Url,
    raw: &[(String, &XmlElement, Option<&str>)],
    aliases: &Arc<AliasTable>,
) -> Vec<PendingOccurrence> {
    raw.iter()
        .filter_map(|(target, element, block_qualifier)| {
            let Some(qualified_target) = aliases.qualify_path(target) else {
                log::debug!("Skipping annotation with unresolvable target '{}' in {}", target, uri);
                return None;
            };
            let term = element.attr("Term")?;
            let Some(qualified_term) = aliases.qualify(term) else {
                log::debug!("Skipping annotation with unresolvable term '{}' in {}", term, uri);
                return None;
            };
            let qualifier = element
                .attr("Qualifier")
                .or(*block_qualifier)
                .map(str::to_string);
            Some(PendingOccurrence {
                target: qualified_target,
                term: qualified_term,
                qualifier,
                occurrence: AnnotationOccurrence {
                    uri: uri.clone(),
                    element: Arc::new(XmlElement::clone(element)),
                    aliases: Arc::clone(aliases),
                },
            })
        })
        .collect()
}

fn add_occurrences(index: &mut AnnotationIndex, occurrences: impl IntoIterator<Item = PendingOccurrence>) {
    for pending in occurrences {
        index.add(
            pending.target,
            pending.term,
            pending.qualifier,
            pending.occurrence,
        );
    }
}
