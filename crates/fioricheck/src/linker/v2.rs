//
// linker/v2.rs
//
// Page linking for applications configured through sap.ui.generic.app
//

use indexmap::IndexMap;
use serde_json::Value;

use super::context_path::{
    annotation_path, decompose_v2_key, resolve_entity_set, resolve_navigation, v2_section_key,
    KeyContext, ResolvedContext,
};
use super::facets::collect_reference_facets;
use super::model::{
    ComponentKind, LinkedNode, LinkedPage, LinkedSection, LinkedTable, NodeKind, OrphanNode,
};
use super::orphan_kind;
use super::settings::{v2_section_settings, v2_table_settings, V2TableScope};
use crate::config::AnalysisConfig;
use crate::project::manifest::SAP_UI_GENERIC_APP;
use crate::project::ParsedApplication;
use crate::service::{IndexedAnnotation, ServiceIndex, UI_FACETS, UI_LINE_ITEM};
use crate::syntax::{JsonKind, JsonNode};

pub const LIST_REPORT: &str = "sap.suite.ui.generic.template.ListReport";
pub const OBJECT_PAGE: &str = "sap.suite.ui.generic.template.ObjectPage";

/// A page entry of `sap.ui.generic.app.pages`
struct PageEntry<'a> {
    name: String,
    path: Vec<String>,
    node: &'a JsonNode,
}

/// Link every template page of the application.
pub fn link_pages(
    app: &ParsedApplication,
    manifest: &JsonNode,
    config: &AnalysisConfig,
) -> Vec<LinkedPage> {
    let Some(pages) = manifest.at_path(&[SAP_UI_GENERIC_APP, "pages"]) else {
        return Vec::new();
    };
    let Some(service) = app.main_service() else {
        log::trace!("No main service for {}; no V2 pages", app.app_root);
        return Vec::new();
    };
    let index = &service.index;

    let mut entries = Vec::new();
    collect_pages(
        pages,
        vec![SAP_UI_GENERIC_APP.to_string(), "pages".to_string()],
        &mut entries,
    );

    entries
        .into_iter()
        .filter_map(|entry| {
            let component_kind = match entry.node.str_at(&["component", "name"])? {
                LIST_REPORT => ComponentKind::ListReport,
                OBJECT_PAGE => ComponentKind::ObjectPage,
                _ => return None,
            };
            let entity_set = entry.node.str_at(&["entitySet"]).unwrap_or_default();
            let Some(context) = resolve_entity_set(index, entity_set) else {
                log::debug!("Dropping page {}: entity set '{}' not resolved", entry.name, entity_set);
                return None;
            };
            Some(link_page(
                manifest,
                index,
                entry,
                component_kind,
                context,
                format!("/{}", entity_set),
                config,
            ))
        })
        .collect()
}

/// Pages of a map or legacy array, including nested `pages`, parents first
fn collect_pages<'a>(container: &'a JsonNode, base: Vec<String>, out: &mut Vec<PageEntry<'a>>) {
    let children: Vec<(String, String, &'a JsonNode)> = match &container.kind {
        JsonKind::Object(properties) => properties
            .iter()
            .filter_map(|p| Some((p.key.clone(), p.key.clone(), p.value.as_ref()?)))
            .collect(),
        JsonKind::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, node)| (i.to_string(), legacy_page_name(node, i), node))
            .collect(),
        _ => return,
    };
    for (segment, name, node) in children {
        if !node.is_object() {
            continue;
        }
        let mut path = base.clone();
        path.push(segment);
        let nested = node.get("pages");
        out.push(PageEntry {
            name,
            path: path.clone(),
            node,
        });
        if let Some(nested) = nested {
            path.push("pages".to_string());
            collect_pages(nested, path, out);
        }
    }
}

/// `Template|EntitySet` name of a page in the legacy array form
fn legacy_page_name(node: &JsonNode, position: usize) -> String {
    let template = node
        .str_at(&["component", "name"])
        .and_then(|name| name.rsplit('.').next());
    match (template, node.str_at(&["entitySet"])) {
        (Some(template), Some(entity_set)) => format!("{}|{}", template, entity_set),
        _ => position.to_string(),
    }
}

fn link_page(
    manifest: &JsonNode,
    index: &ServiceIndex,
    entry: PageEntry<'_>,
    component_kind: ComponentKind,
    context: ResolvedContext<'_>,
    context_path: String,
    config: &AnalysisConfig,
) -> LinkedPage {
    let mut settings_path = entry.path;
    settings_path.extend(["component", "settings"].map(String::from));

    let mut page = LinkedPage {
        target_name: entry.name,
        component_kind,
        entity: context.entity_type.clone(),
        entity_set: context.entity_set.cloned(),
        context_path,
        path: settings_path.clone(),
        lookup: IndexMap::new(),
    };

    match component_kind {
        ComponentKind::ListReport => {
            if let Some(annotation) = index.annotation(&context.entity_type.path, UI_LINE_ITEM, None) {
                let scope = V2TableScope {
                    section: None,
                    page: settings_path.clone(),
                };
                page.push(LinkedNode::Table(make_table(
                    manifest,
                    annotation,
                    context,
                    annotation_path("", UI_LINE_ITEM, None),
                    settings_path.clone(),
                    &scope,
                )));
            }
        }
        ComponentKind::ObjectPage => {
            link_sections(manifest, index, &mut page, context, &settings_path, config);
        }
    }
    page
}

/// Sections and tables from the page entity's facets, then orphans from
/// `component.settings.sections` entries that matched nothing
fn link_sections(
    manifest: &JsonNode,
    index: &ServiceIndex,
    page: &mut LinkedPage,
    context: ResolvedContext<'_>,
    settings_path: &[String],
    config: &AnalysisConfig,
) {
    let mut sections_path = settings_path.to_vec();
    sections_path.push("sections".to_string());
    let configured = manifest.at_path(&sections_path).and_then(JsonNode::as_object);
    let is_configured = |key: &str| configured.is_some_and(|entries| entries.iter().any(|p| p.key == key));
    let mut matched_keys: Vec<String> = Vec::new();

    let facets = index.annotation(&context.entity_type.path, UI_FACETS, None);
    for facet in facets.map(collect_reference_facets).unwrap_or_default() {
        let Some(reached) =
            resolve_navigation(index, context, &facet.navigation, config.max_navigation_depth)
        else {
            continue;
        };
        let Some(annotation) = index.annotation(
            &reached.entity_type.path,
            &facet.term,
            facet.qualifier.as_deref(),
        ) else {
            continue;
        };

        let generated = v2_section_key(&facet.navigation, &facet.term, facet.qualifier.as_deref());
        let key = match &facet.id {
            Some(id) if is_configured(id) => id.clone(),
            _ => generated,
        };
        matched_keys.push(key.clone());
        let mut section_path = sections_path.clone();
        section_path.push(key);

        let scope = V2TableScope {
            section: Some(section_path.clone()),
            page: settings_path.to_vec(),
        };
        let configuration = if facet.term == UI_LINE_ITEM {
            v2_section_settings(manifest, &scope)
        } else {
            IndexMap::new()
        };
        page.push(LinkedNode::Section(LinkedSection {
            id: facet.id.clone(),
            annotation: Some(annotation.clone()),
            annotation_path: facet.annotation_path.clone(),
            configuration,
            path: section_path.clone(),
        }));
        if facet.term == UI_LINE_ITEM {
            page.push(LinkedNode::Table(make_table(
                manifest,
                annotation,
                reached,
                annotation_path(&facet.navigation, UI_LINE_ITEM, facet.qualifier.as_deref()),
                section_path,
                &scope,
            )));
        }
    }

    let Some(configured) = configured else {
        return;
    };
    for property in configured {
        if matched_keys.contains(&property.key) {
            continue;
        }
        let decomposed = decompose_v2_key(&property.key);
        let resolved = decomposed.as_ref().and_then(|key| {
            let KeyContext::Relative(navigation) = &key.context else {
                return None;
            };
            let reached = resolve_navigation(index, context, navigation, config.max_navigation_depth)?;
            index.annotation(&reached.entity_type.path, &key.term, key.qualifier.as_deref())
        });
        if resolved.is_some() {
            continue;
        }
        let kind = decomposed
            .as_ref()
            .map(|key| orphan_kind(&key.term))
            .unwrap_or(NodeKind::OrphanSection);
        log::debug!("Orphan section configuration '{}' on page {}", property.key, page.target_name);
        let mut path = sections_path.clone();
        path.push(property.key.clone());
        page.push(LinkedNode::Orphan(OrphanNode {
            kind,
            key: property.key.clone(),
            path,
            value: property
                .value
                .as_ref()
                .map(JsonNode::to_value)
                .unwrap_or(Value::Null),
        }));
    }
}

fn make_table(
    manifest: &JsonNode,
    annotation: &IndexedAnnotation,
    context: ResolvedContext<'_>,
    relative: String,
    path: Vec<String>,
    scope: &V2TableScope,
) -> LinkedTable {
    LinkedTable {
        annotation: Some(annotation.clone()),
        annotation_path: relative,
        entity: context.entity_type.clone(),
        configuration: v2_table_settings(manifest, scope),
        path,
    }
}
