//
// linker/facets.rs
//
// Reference facets of a `UI.Facets` annotation
//

use crate::service::annotations::{
    annotation_path, collection_records, property_value, record_type, string_value,
    UI_COLLECTION_FACET, UI_REFERENCE_FACET,
};
use crate::service::{AliasTable, IndexedAnnotation};
use crate::syntax::XmlElement;

/// Target of one `ReferenceFacet`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacetTarget {
    /// Navigation prefix relative to the annotated entity; empty for the entity itself
    pub navigation: String,
    /// Fully qualified term
    pub term: String,
    pub qualifier: Option<String>,
    /// Facet `ID`, when declared
    pub id: Option<String>,
    /// The `Target` annotation path as written
    pub annotation_path: String,
}

/// Reference facets of a facets annotation in document order, including
/// those nested in collection facets. Targets that are absolute paths or
/// whose term cannot be qualified are skipped.
pub fn collect_reference_facets(facets: &IndexedAnnotation) -> Vec<FacetTarget> {
    let mut out = Vec::new();
    collect_from(facets.element(), &facets.top.aliases, &mut out);
    out
}

/// `holder` is the element carrying the `Collection` of facet records
fn collect_from(holder: &XmlElement, aliases: &AliasTable, out: &mut Vec<FacetTarget>) {
    for record in collection_records(holder) {
        match record_type(record, aliases).as_deref() {
            Some(UI_REFERENCE_FACET) => {
                if let Some(target) = reference_target(record, aliases) {
                    out.push(target);
                }
            }
            Some(UI_COLLECTION_FACET) => {
                if let Some(nested) = property_value(record, "Facets") {
                    collect_from(nested, aliases, out);
                }
            }
            _ => {}
        }
    }
}

fn reference_target(record: &XmlElement, aliases: &AliasTable) -> Option<FacetTarget> {
    let path = annotation_path(property_value(record, "Target")?)?;
    if path.starts_with('/') {
        log::trace!("Skipping facet with absolute target '{}'", path);
        return None;
    }
    let (navigation, annotation) = path.split_once('@')?;
    let (term, qualifier) = match annotation.split_once('#') {
        Some((term, qualifier)) => (term, Some(qualifier.to_string())),
        None => (annotation, None),
    };
    let term = aliases.qualify(term)?;
    let id = property_value(record, "ID")
        .and_then(string_value)
        .map(str::to_string);
    Some(FacetTarget {
        navigation: navigation.trim_end_matches('/').to_string(),
        term,
        qualifier,
        id,
        annotation_path: path.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use url::Url;

    use crate::service::alias::alias_table_for;
    use crate::service::annotations::{AnnotationOccurrence, UI_FACETS, UI_LINE_ITEM};
    use crate::syntax::parse_xml;

    const FILE: &str = r#"<edmx:Edmx Version="4.0" xmlns:edmx="http://docs.oasis-open.org/odata/ns/edmx">
  <edmx:Reference Uri="UI.xml">
    <edmx:Include Namespace="com.sap.vocabularies.UI.v1" Alias="UI"/>
  </edmx:Reference>
  <edmx:DataServices>
    <Schema Namespace="local" xmlns="http://docs.oasis-open.org/odata/ns/edm">
      <Annotations Target="ns.Travel">
        <Annotation Term="UI.Facets">
          <Collection>
            <Record Type="UI.ReferenceFacet">
              <PropertyValue Property="ID" String="Bookings"/>
              <PropertyValue Property="Target" AnnotationPath="_Booking/@UI.LineItem#compact"/>
            </Record>
            <Record Type="UI.CollectionFacet">
              <PropertyValue Property="Facets">
                <Collection>
                  <Record Type="UI.ReferenceFacet">
                    <PropertyValue Property="Target" AnnotationPath="@UI.FieldGroup#General"/>
                  </Record>
                </Collection>
              </PropertyValue>
            </Record>
            <Record Type="UI.ReferenceFacet">
              <PropertyValue Property="Target" AnnotationPath="/ns.Container/Travel/@UI.LineItem"/>
            </Record>
            <Record Type="UI.ReferenceFacet">
              <PropertyValue Property="Target" AnnotationPath="@Unknown.Term"/>
            </Record>
          </Collection>
        </Annotation>
      </Annotations>
    </Schema>
  </edmx:DataServices>
</edmx:Edmx>"#;

    fn facets() -> IndexedAnnotation {
        let root = parse_xml(FILE).unwrap();
        let aliases = Arc::new(alias_table_for(&root));
        let element = root
            .descendants()
            .into_iter()
            .find(|e| e.is("Annotation"))
            .cloned()
            .unwrap();
        IndexedAnnotation::new(
            "ns.Travel".to_string(),
            UI_FACETS.to_string(),
            None,
            AnnotationOccurrence {
                uri: Url::parse("file:///a.xml").unwrap(),
                element: Arc::new(element),
                aliases,
            },
        )
    }

    #[test]
    fn test_reference_facets_in_order() {
        let targets = collect_reference_facets(&facets());
        assert_eq!(targets.len(), 2);

        assert_eq!(targets[0].navigation, "_Booking");
        assert_eq!(targets[0].term, UI_LINE_ITEM);
        assert_eq!(targets[0].qualifier.as_deref(), Some("compact"));
        assert_eq!(targets[0].id.as_deref(), Some("Bookings"));

        assert_eq!(targets[1].navigation, "");
        assert_eq!(targets[1].term, "com.sap.vocabularies.UI.v1.FieldGroup");
        assert_eq!(targets[1].annotation_path, "@UI.FieldGroup#General");
    }
}
