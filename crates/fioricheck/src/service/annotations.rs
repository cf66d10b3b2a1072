//
// service/annotations.rs
//
// Layered annotation index keyed by target, term and qualifier
//

use std::sync::Arc;

use indexmap::IndexMap;
use url::Url;

use super::alias::{schema_elements, AliasTable};
use crate::syntax::{TextRange, XmlElement};

/// Qualifier key used for annotations without a qualifier
pub const UNQUALIFIED: &str = "none";

pub const UI_NAMESPACE: &str = "com.sap.vocabularies.UI.v1";
pub const UI_LINE_ITEM: &str = "com.sap.vocabularies.UI.v1.LineItem";
pub const UI_FACETS: &str = "com.sap.vocabularies.UI.v1.Facets";
pub const UI_REFERENCE_FACET: &str = "com.sap.vocabularies.UI.v1.ReferenceFacet";
pub const UI_COLLECTION_FACET: &str = "com.sap.vocabularies.UI.v1.CollectionFacet";

// ============================================================================
// Occurrences and layers
// ============================================================================

/// One `Annotation` element as written in one document.
///
/// The element is shared: every layer stack that contains this occurrence
/// points at the same subtree.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationOccurrence {
    pub uri: Url,
    pub element: Arc<XmlElement>,
    /// Alias table in scope where the element was written
    pub aliases: Arc<AliasTable>,
}

impl AnnotationOccurrence {
    pub fn range(&self) -> TextRange {
        self.element.range
    }

    /// Same document and same element
    pub fn is_same(&self, other: &AnnotationOccurrence) -> bool {
        self.uri == other.uri && Arc::ptr_eq(&self.element, &other.element)
    }
}

/// The highest-priority definition of a (target, term, qualifier) triple
/// together with every definition seen, lowest priority first.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedAnnotation {
    /// Document of `top`
    pub source_document_uri: Url,
    /// Fully qualified target path
    pub target: String,
    /// Fully qualified term
    pub term: String,
    pub qualifier: Option<String>,
    pub top: AnnotationOccurrence,
    pub layers: Vec<AnnotationOccurrence>,
}

impl IndexedAnnotation {
    pub fn new(
        target: String,
        term: String,
        qualifier: Option<String>,
        occurrence: AnnotationOccurrence,
    ) -> Self {
        Self {
            source_document_uri: occurrence.uri.clone(),
            target,
            term,
            qualifier,
            layers: vec![occurrence.clone()],
            top: occurrence,
        }
    }

    /// A new value with `occurrence` on top of the existing layers.
    /// `self` is left untouched so earlier snapshots stay valid.
    pub fn with_layer(&self, occurrence: AnnotationOccurrence) -> Self {
        let mut layers = Vec::with_capacity(self.layers.len() + 1);
        layers.extend(self.layers.iter().cloned());
        layers.push(occurrence.clone());
        Self {
            source_document_uri: occurrence.uri.clone(),
            target: self.target.clone(),
            term: self.term.clone(),
            qualifier: self.qualifier.clone(),
            top: occurrence,
            layers,
        }
    }

    /// Index key `target/@term`
    pub fn key(&self) -> String {
        AnnotationIndex::key(&self.target, &self.term)
    }

    pub fn qualifier_key(&self) -> &str {
        self.qualifier.as_deref().unwrap_or(UNQUALIFIED)
    }

    /// The annotation element of the winning layer
    pub fn element(&self) -> &XmlElement {
        &self.top.element
    }
}

// ============================================================================
// Index
// ============================================================================

/// `target/@term` to qualifier (or [`UNQUALIFIED`]) to annotation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationIndex {
    entries: IndexMap<String, IndexMap<String, IndexedAnnotation>>,
}

impl AnnotationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(target: &str, term: &str) -> String {
        format!("{}/@{}", target, term)
    }

    /// Record an occurrence. An existing entry for the same key and qualifier
    /// is replaced by its layered successor.
    pub fn add(
        &mut self,
        target: String,
        term: String,
        qualifier: Option<String>,
        occurrence: AnnotationOccurrence,
    ) {
        let qualifiers = self
            .entries
            .entry(Self::key(&target, &term))
            .or_default();
        let qualifier_key = qualifier.as_deref().unwrap_or(UNQUALIFIED).to_string();
        let indexed = match qualifiers.get(&qualifier_key) {
            Some(existing) => existing.with_layer(occurrence),
            None => IndexedAnnotation::new(target, term, qualifier, occurrence),
        };
        qualifiers.insert(qualifier_key, indexed);
    }

    pub fn get(&self, target: &str, term: &str, qualifier: Option<&str>) -> Option<&IndexedAnnotation> {
        self.entries
            .get(&Self::key(target, term))?
            .get(qualifier.unwrap_or(UNQUALIFIED))
    }

    /// All qualifiers defined for `target/@term`
    pub fn qualifiers(&self, target: &str, term: &str) -> Option<&IndexMap<String, IndexedAnnotation>> {
        self.entries.get(&Self::key(target, term))
    }

    pub fn iter(&self) -> impl Iterator<Item = &IndexedAnnotation> {
        self.entries.values().flat_map(|q| q.values())
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    /// Number of (target, term, qualifier) entries
    pub fn len(&self) -> usize {
        self.entries.values().map(IndexMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// Collecting annotation elements from documents
// ============================================================================

/// An `Annotation` element with its unqualified target and the qualifier of
/// the surrounding `Annotations` block, if any.
#[derive(Debug, Clone, Copy)]
pub struct RawAnnotation<'a> {
    pub target: &'a str,
    pub element: &'a XmlElement,
    pub block_qualifier: Option<&'a str>,
}

/// Target-based annotations of a document (`Annotations Target=".."` blocks)
pub fn collect_targeted(root: &XmlElement) -> Vec<RawAnnotation<'_>> {
    let mut out = Vec::new();
    for schema in schema_elements(root) {
        for block in schema.children_named("Annotations") {
            let Some(target) = block.attr("Target") else {
                continue;
            };
            let block_qualifier = block.attr("Qualifier");
            out.extend(block.children_named("Annotation").map(|element| RawAnnotation {
                target,
                element,
                block_qualifier,
            }));
        }
    }
    out
}

/// Annotations written directly on metadata elements, with computed targets
pub fn collect_inline(root: &XmlElement) -> Vec<(String, &XmlElement)> {
    let mut out = Vec::new();
    for schema in schema_elements(root) {
        let Some(namespace) = schema.attr("Namespace") else {
            continue;
        };
        for element in &schema.children {
            let Some(name) = element.attr("Name") else {
                continue;
            };
            let path = format!("{}.{}", namespace, name);
            out.extend(
                element
                    .children_named("Annotation")
                    .map(|annotation| (path.clone(), annotation)),
            );
            for member in &element.children {
                let Some(member_name) = member.attr("Name") else {
                    continue;
                };
                let member_path = format!("{}/{}", path, member_name);
                out.extend(
                    member
                        .children_named("Annotation")
                        .map(|annotation| (member_path.clone(), annotation)),
                );
            }
        }
    }
    out
}

// ============================================================================
// Value readers
// ============================================================================

/// `Record` children of the annotation's `Collection` value
pub fn collection_records(element: &XmlElement) -> Vec<&XmlElement> {
    element
        .child("Collection")
        .map(|collection| collection.children_named("Record").collect())
        .unwrap_or_default()
}

/// Fully qualified `Type` of a record. Absolute paths are never types.
pub fn record_type(record: &XmlElement, aliases: &AliasTable) -> Option<String> {
    let type_name = record.attr("Type")?;
    if type_name.starts_with('/') {
        return None;
    }
    aliases.qualify(type_name)
}

/// `PropertyValue` of a record by property name
pub fn property_value<'a>(record: &'a XmlElement, property: &str) -> Option<&'a XmlElement> {
    record
        .children_named("PropertyValue")
        .find(|pv| pv.attr("Property") == Some(property))
}

/// Annotation path held by a property value, attribute or element notation
pub fn annotation_path(value: &XmlElement) -> Option<&str> {
    value
        .attr("AnnotationPath")
        .or_else(|| value.child("AnnotationPath").and_then(|p| p.text.as_deref()))
}

/// String held by a property value, attribute or element notation
pub fn string_value(value: &XmlElement) -> Option<&str> {
    value
        .attr("String")
        .or_else(|| value.child("String").and_then(|s| s.text.as_deref()))
}
