//
// linker/v4.rs
//
// Page linking for applications built on routing targets with sap.fe templates
//

use indexmap::IndexMap;
use serde_json::Value;

use super::context_path::{
    annotation_path, decompose_control_key, resolve_context_path, resolve_entity_set,
    resolve_navigation, KeyContext, ResolvedContext,
};
use super::facets::collect_reference_facets;
use super::model::{ComponentKind, LinkedNode, LinkedPage, LinkedSection, LinkedTable, OrphanNode};
use super::orphan_kind;
use super::settings::v4_table_settings;
use crate::config::AnalysisConfig;
use crate::project::manifest::{RoutingTarget, SAP_UI5};
use crate::project::ParsedApplication;
use crate::service::{IndexedAnnotation, ServiceIndex, UI_FACETS, UI_LINE_ITEM};
use crate::syntax::JsonNode;

pub const LIST_REPORT: &str = "sap.fe.templates.ListReport";
pub const OBJECT_PAGE: &str = "sap.fe.templates.ObjectPage";

/// A `controlConfiguration` entry and what it resolves to
struct ControlEntry<'a> {
    key: String,
    path: Vec<String>,
    value: Value,
    term: String,
    annotation: Option<&'a IndexedAnnotation>,
}

impl ControlEntry<'_> {
    fn configures(&self, annotation: &IndexedAnnotation) -> bool {
        self.annotation.is_some_and(|own| {
            own.target == annotation.target
                && own.term == annotation.term
                && own.qualifier == annotation.qualifier
        })
    }
}

/// Link every template page of the application.
///
/// Pages whose context cannot be resolved against the main service are
/// dropped.
pub fn link_pages(
    app: &ParsedApplication,
    manifest: &JsonNode,
    config: &AnalysisConfig,
) -> Vec<LinkedPage> {
    let Some(service) = app.main_service() else {
        log::trace!("No main service for {}; no V4 pages", app.app_root);
        return Vec::new();
    };
    let index = &service.index;

    app.manifest
        .routing_targets
        .values()
        .filter_map(|target| {
            let component_kind = match target.component_name.as_deref()? {
                LIST_REPORT => ComponentKind::ListReport,
                OBJECT_PAGE => ComponentKind::ObjectPage,
                _ => return None,
            };
            let (context, context_path) = match (&target.context_path, &target.entity_set) {
                (Some(path), _) => (
                    resolve_context_path(index, path, config.max_navigation_depth),
                    path.clone(),
                ),
                (None, Some(entity_set)) => (
                    resolve_entity_set(index, entity_set),
                    format!("/{}", entity_set.trim_start_matches('/')),
                ),
                (None, None) => (None, String::new()),
            };
            let Some(context) = context else {
                log::debug!("Dropping page {}: context '{}' not resolved", target.name, context_path);
                return None;
            };
            Some(link_page(
                manifest,
                index,
                target,
                component_kind,
                context,
                context_path,
                config,
            ))
        })
        .collect()
}

/// Manifest path of a routing target's settings
pub fn page_path(target_name: &str) -> Vec<String> {
    [SAP_UI5, "routing", "targets", target_name, "options", "settings"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn link_page(
    manifest: &JsonNode,
    index: &ServiceIndex,
    target: &RoutingTarget,
    component_kind: ComponentKind,
    context: ResolvedContext<'_>,
    context_path: String,
    config: &AnalysisConfig,
) -> LinkedPage {
    let path = page_path(&target.name);
    let controls = control_entries(manifest, index, &path, context, config.max_navigation_depth);

    let mut page = LinkedPage {
        target_name: target.name.clone(),
        component_kind,
        entity: context.entity_type.clone(),
        entity_set: context.entity_set.cloned(),
        context_path,
        path,
        lookup: IndexMap::new(),
    };

    match component_kind {
        ComponentKind::ListReport => {
            let own: Vec<&IndexedAnnotation> = controls
                .iter()
                .filter_map(|entry| entry.annotation)
                .filter(|a| a.term == UI_LINE_ITEM && a.target == context.entity_type.path)
                .collect();
            let line_items = if own.is_empty() {
                index
                    .annotation(&context.entity_type.path, UI_LINE_ITEM, None)
                    .into_iter()
                    .collect()
            } else {
                own
            };
            let mut seen = Vec::new();
            for annotation in line_items {
                if seen.contains(&annotation.qualifier_key()) {
                    continue;
                }
                seen.push(annotation.qualifier_key());
                let relative = annotation_path("", UI_LINE_ITEM, annotation.qualifier.as_deref());
                let table = make_table(manifest, &page.path, &controls, annotation, context, relative);
                page.push(LinkedNode::Table(table));
            }
        }
        ComponentKind::ObjectPage => {
            let facets = index.annotation(&context.entity_type.path, UI_FACETS, None);
            for facet in facets.map(collect_reference_facets).unwrap_or_default() {
                let Some(reached) =
                    resolve_navigation(index, context, &facet.navigation, config.max_navigation_depth)
                else {
                    log::trace!("Facet target '{}' not reachable", facet.annotation_path);
                    continue;
                };
                let Some(annotation) = index.annotation(
                    &reached.entity_type.path,
                    &facet.term,
                    facet.qualifier.as_deref(),
                ) else {
                    log::trace!("Facet target '{}' not indexed", facet.annotation_path);
                    continue;
                };
                let section_key = facet.id.clone().unwrap_or_else(|| facet.annotation_path.clone());
                let mut section_path = page.path.clone();
                section_path.extend(["content", "body", "sections"].map(String::from));
                section_path.push(section_key);
                page.push(LinkedNode::Section(LinkedSection {
                    id: facet.id.clone(),
                    annotation: Some(annotation.clone()),
                    annotation_path: facet.annotation_path.clone(),
                    configuration: IndexMap::new(),
                    path: section_path,
                }));
                if facet.term == UI_LINE_ITEM {
                    let relative =
                        annotation_path(&facet.navigation, UI_LINE_ITEM, facet.qualifier.as_deref());
                    let table = make_table(manifest, &page.path, &controls, annotation, reached, relative);
                    page.push(LinkedNode::Table(table));
                }
            }
        }
    }

    for entry in controls.into_iter().filter(|entry| entry.annotation.is_none()) {
        log::debug!("Orphan control configuration '{}' on page {}", entry.key, page.target_name);
        page.push(LinkedNode::Orphan(OrphanNode {
            kind: orphan_kind(&entry.term),
            key: entry.key,
            path: entry.path,
            value: entry.value,
        }));
    }
    page
}

/// Table node with settings from its control configuration entry, or from
/// the entry its annotation path would have
fn make_table(
    manifest: &JsonNode,
    page_path: &[String],
    controls: &[ControlEntry<'_>],
    annotation: &IndexedAnnotation,
    context: ResolvedContext<'_>,
    relative: String,
) -> LinkedTable {
    let path = controls
        .iter()
        .find(|entry| entry.configures(annotation))
        .map(|entry| entry.path.clone())
        .unwrap_or_else(|| {
            let mut path = page_path.to_vec();
            path.push("controlConfiguration".to_string());
            path.push(relative.clone());
            path
        });
    LinkedTable {
        annotation: Some(annotation.clone()),
        annotation_path: relative,
        entity: context.entity_type.clone(),
        configuration: v4_table_settings(manifest, &path),
        path,
    }
}

/// Decompose and resolve every annotation-based `controlConfiguration` key
fn control_entries<'a>(
    manifest: &JsonNode,
    index: &'a ServiceIndex,
    page_path: &[String],
    context: ResolvedContext<'a>,
    max_depth: usize,
) -> Vec<ControlEntry<'a>> {
    let Some(entries) = manifest
        .at_path(page_path)
        .and_then(|settings| settings.get("controlConfiguration"))
        .and_then(JsonNode::as_object)
    else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|property| {
            let Some(key) = decompose_control_key(&property.key) else {
                log::trace!("Control configuration key '{}' has no annotation term", property.key);
                return None;
            };
            let reached = match &key.context {
                KeyContext::Absolute(path) => resolve_context_path(index, path, max_depth),
                KeyContext::Relative(navigation) => {
                    resolve_navigation(index, context, navigation, max_depth)
                }
            };
            let annotation = reached.and_then(|reached| {
                index.annotation(&reached.entity_type.path, &key.term, key.qualifier.as_deref())
            });
            let mut path = page_path.to_vec();
            path.push("controlConfiguration".to_string());
            path.push(property.key.clone());
            Some(ControlEntry {
                key: property.key.clone(),
                path,
                value: property
                    .value
                    .as_ref()
                    .map(JsonNode::to_value)
                    .unwrap_or(Value::Null),
                term: key.term,
                annotation,
            })
        })
        .collect()
}
