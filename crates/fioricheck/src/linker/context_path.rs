//
// linker/context_path.rs
//
// Context path resolution and configuration key decomposition
//

use crate::service::annotations::UI_NAMESPACE;
use crate::service::{MetadataElement, ServiceIndex};

/// Entity reached by a context path
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedContext<'a> {
    /// Entity set, when every navigation segment is bound
    pub entity_set: Option<&'a MetadataElement>,
    pub entity_type: &'a MetadataElement,
}

impl<'a> ResolvedContext<'a> {
    /// Follow one navigation property
    fn step(&self, index: &'a ServiceIndex, segment: &str) -> Option<ResolvedContext<'a>> {
        let entity_type = index.navigate(self.entity_type, segment)?;
        let entity_set = self.entity_set.and_then(|set| index.navigate_set(set, segment));
        Some(ResolvedContext {
            entity_set,
            entity_type,
        })
    }
}

/// Resolve an entity set name without navigation
pub fn resolve_entity_set<'a>(index: &'a ServiceIndex, name: &str) -> Option<ResolvedContext<'a>> {
    let name = name.trim_start_matches('/');
    if name.is_empty() || name.contains('/') {
        return None;
    }
    let entity_set = index.entity_set(name)?;
    let entity_type = index.entity_type_of_set(entity_set)?;
    Some(ResolvedContext {
        entity_set: Some(entity_set),
        entity_type,
    })
}

/// Resolve an absolute context path such as `/Travel/_Booking`.
///
/// # Arguments
/// * `index` - Service index to resolve against
/// * `path` - Absolute path: an entity set followed by navigation properties
/// * `max_depth` - Maximum number of navigation segments followed
///
/// # Returns
/// The reached entity, or `None` when the path is relative, a segment is
/// unknown, or the path is deeper than `max_depth`.
pub fn resolve_context_path<'a>(
    index: &'a ServiceIndex,
    path: &str,
    max_depth: usize,
) -> Option<ResolvedContext<'a>> {
    let rest = path.strip_prefix('/')?;
    let mut segments = rest.split('/').filter(|s| !s.is_empty());
    let start = resolve_entity_set(index, segments.next()?)?;
    let navigation: Vec<&str> = segments.collect();
    if navigation.len() > max_depth {
        log::debug!("Context path '{}' exceeds navigation depth {}", path, max_depth);
        return None;
    }
    navigation
        .iter()
        .try_fold(start, |context, segment| context.step(index, segment))
}

/// Resolve a relative navigation path (`_Booking/_Supplement`) from `from`.
/// An empty path resolves to `from` itself.
pub fn resolve_navigation<'a>(
    index: &'a ServiceIndex,
    from: ResolvedContext<'a>,
    navigation: &str,
    max_depth: usize,
) -> Option<ResolvedContext<'a>> {
    let segments: Vec<&str> = navigation.split('/').filter(|s| !s.is_empty()).collect();
    if segments.len() > max_depth {
        log::debug!("Navigation '{}' exceeds depth {}", navigation, max_depth);
        return None;
    }
    segments
        .iter()
        .try_fold(from, |context, segment| context.step(index, segment))
}

// ============================================================================
// Configuration keys
// ============================================================================

/// Context part of a configuration key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyContext {
    /// Absolute context path (`/Travel/_Booking`)
    Absolute(String),
    /// Navigation relative to the page entity; empty for the page entity itself
    Relative(String),
}

/// A configuration key split into context, term and qualifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlKey {
    pub context: KeyContext,
    /// Term, with the `UI` alias expanded
    pub term: String,
    pub qualifier: Option<String>,
}

/// Expand the `UI.` shorthand used in configuration keys
pub fn expand_term(term: &str) -> String {
    match term.strip_prefix("UI.") {
        Some(name) => format!("{}.{}", UI_NAMESPACE, name),
        None => term.to_string(),
    }
}

/// Decompose a V4 `controlConfiguration` key
/// (`[contextPath/]@term[#qualifier]`). Keys without a term are `None`.
pub fn decompose_control_key(key: &str) -> Option<ControlKey> {
    let (context, annotation) = key.split_once('@')?;
    let (term, qualifier) = match annotation.split_once('#') {
        Some((term, qualifier)) => (term, Some(qualifier.to_string())),
        None => (annotation, None),
    };
    if term.is_empty() {
        return None;
    }
    let context = context.trim_end_matches('/');
    let context = if context.starts_with('/') {
        KeyContext::Absolute(context.to_string())
    } else {
        KeyContext::Relative(context.to_string())
    };
    Some(ControlKey {
        context,
        term: expand_term(term),
        qualifier: qualifier.filter(|q| !q.is_empty()),
    })
}

/// Decompose a V2 section key (`nav::term[::qualifier]` or `term[::qualifier]`).
/// The term is the first dotted part; keys without one are `None`.
pub fn decompose_v2_key(key: &str) -> Option<ControlKey> {
    let parts: Vec<&str> = key.split("::").collect();
    let term_at = parts.iter().position(|part| part.contains('.'))?;
    let navigation = parts[..term_at].join("/");
    let qualifier = parts.get(term_at + 1).map(|q| q.to_string());
    Some(ControlKey {
        context: KeyContext::Relative(navigation),
        term: expand_term(parts[term_at]),
        qualifier,
    })
}

/// V2 section key of a facet target
pub fn v2_section_key(navigation: &str, term: &str, qualifier: Option<&str>) -> String {
    let mut key = String::new();
    if !navigation.is_empty() {
        key.push_str(&navigation.replace('/', "::"));
        key.push_str("::");
    }
    key.push_str(term);
    if let Some(qualifier) = qualifier {
        key.push_str("::");
        key.push_str(qualifier);
    }
    key
}

/// Relative annotation path `[nav/]@term[#qualifier]`
pub fn annotation_path(navigation: &str, term: &str, qualifier: Option<&str>) -> String {
    let mut path = String::new();
    if !navigation.is_empty() {
        path.push_str(navigation);
        path.push('/');
    }
    path.push('@');
    path.push_str(term);
    if let Some(qualifier) = qualifier {
        path.push('#');
        path.push_str(qualifier);
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::service::annotations::UI_LINE_ITEM;
    use crate::service::{build_service_index, AliasCache, ServiceArtifacts};
    use crate::test_utils::fixtures::{metadata_document, TRAVEL_METADATA};

    fn index() -> ServiceIndex {
        let metadata = metadata_document(TRAVEL_METADATA);
        let artifacts = ServiceArtifacts {
            metadata_uri: Some(metadata.uri.clone()),
            metadata: Some(metadata),
            ..ServiceArtifacts::default()
        };
        build_service_index(&artifacts, &AnalysisConfig::default(), &AliasCache::new())
    }

    #[test]
    fn test_resolve_context_path_with_navigation() {
        let index = index();
        let travel = resolve_context_path(&index, "/Travel", 16).expect("travel");
        assert_eq!(travel.entity_type.path, "sap.fe.travel.Travel");
        assert_eq!(travel.entity_set.map(|s| s.name.as_str()), Some("Travel"));

        let booking = resolve_context_path(&index, "/Travel/_Booking", 16).expect("booking");
        assert_eq!(booking.entity_type.path, "sap.fe.travel.Booking");
        assert_eq!(booking.entity_set.map(|s| s.name.as_str()), Some("Booking"));

        assert!(resolve_context_path(&index, "/Travel/_Missing", 16).is_none());
        assert!(resolve_context_path(&index, "/Travel/_Booking", 0).is_none());
        assert!(resolve_context_path(&index, "Travel", 16).is_none());
    }

    #[test]
    fn test_entity_set_has_no_navigation() {
        let index = index();
        assert!(resolve_entity_set(&index, "Travel").is_some());
        assert!(resolve_entity_set(&index, "Travel/_Booking").is_none());
        assert!(resolve_entity_set(&index, "Unknown").is_none());
    }

    #[test]
    fn test_relative_navigation() {
        let index = index();
        let travel = resolve_entity_set(&index, "Travel").unwrap();
        let same = resolve_navigation(&index, travel, "", 16).unwrap();
        assert_eq!(same, travel);
        let booking = resolve_navigation(&index, travel, "_Booking", 16).unwrap();
        assert_eq!(booking.entity_type.name, "Booking");
    }

    #[test]
    fn test_decompose_control_key() {
        let key = decompose_control_key("_Booking/@com.sap.vocabularies.UI.v1.LineItem#q").unwrap();
        assert_eq!(key.context, KeyContext::Relative("_Booking".to_string()));
        assert_eq!(key.term, UI_LINE_ITEM);
        assert_eq!(key.qualifier.as_deref(), Some("q"));

        let key = decompose_control_key("/Travel/@UI.LineItem").unwrap();
        assert_eq!(key.context, KeyContext::Absolute("/Travel".to_string()));
        assert_eq!(key.term, UI_LINE_ITEM);
        assert!(key.qualifier.is_none());

        assert!(decompose_control_key("SomeField").is_none());
        assert!(decompose_control_key("@").is_none());
    }

    #[test]
    fn test_decompose_v2_key() {
        let key = decompose_v2_key("to_Item::com.sap.vocabularies.UI.v1.LineItem::q").unwrap();
        assert_eq!(key.context, KeyContext::Relative("to_Item".to_string()));
        assert_eq!(key.term, UI_LINE_ITEM);
        assert_eq!(key.qualifier.as_deref(), Some("q"));
        assert!(decompose_v2_key("GeneralInformation").is_none());
        assert_eq!(
            v2_section_key("to_Item", UI_LINE_ITEM, Some("q")),
            "to_Item::com.sap.vocabularies.UI.v1.LineItem::q"
        );
        assert_eq!(annotation_path("", UI_LINE_ITEM, None), format!("@{}", UI_LINE_ITEM));
    }
}
