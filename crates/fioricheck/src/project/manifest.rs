//
// project/manifest.rs
//
// Normalized view of an application manifest
//

use std::cmp::Ordering;

use indexmap::IndexMap;
use url::Url;

use crate::error::AnalysisError;
use crate::syntax::JsonNode;

pub const SAP_APP: &str = "sap.app";
pub const SAP_UI5: &str = "sap.ui5";
pub const SAP_UI_GENERIC_APP: &str = "sap.ui.generic.app";

/// Data source name preferred as main service when no default model is declared
pub const MAIN_SERVICE: &str = "mainService";

/// Where an annotation file referenced by a local service comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnnotationOrigin {
    /// Local copy of an annotation document served by the back end
    RemoteCache,
    /// Annotation document that only exists in the project
    Local,
}

/// An `ODataAnnotation` data source referenced from a service
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AnnotationFileRef {
    pub name: String,
    pub uri: Option<String>,
    pub local_uri: Option<String>,
    pub origin: AnnotationOrigin,
}

impl AnnotationFileRef {
    /// Project-relative location of the document, if it exists locally
    pub fn document_path(&self) -> Option<&str> {
        match self.origin {
            AnnotationOrigin::RemoteCache => self.local_uri.as_deref(),
            AnnotationOrigin::Local => self.local_uri.as_deref().or(self.uri.as_deref()),
        }
    }
}

/// A declared `OData` data source
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceConfig {
    pub name: String,
    pub uri: Option<String>,
    pub odata_version: Option<String>,
    /// Local copy of the metadata document, relative to the manifest
    pub local_uri: Option<String>,
    /// Annotation files in declared (priority) order
    pub annotations: Vec<AnnotationFileRef>,
}

impl ServiceConfig {
    /// Local services ship a copy of their metadata; the others are
    /// resolved through the model provider.
    pub fn is_local(&self) -> bool {
        self.local_uri.is_some()
    }

    /// URI of the local metadata copy
    pub fn metadata_document(&self, manifest_uri: &Url) -> Option<Url> {
        resolve_relative(manifest_uri, self.local_uri.as_deref()?)
    }

    /// URIs of the annotation documents, in priority order. References
    /// without a local document are skipped.
    pub fn annotation_documents(&self, manifest_uri: &Url) -> Vec<Url> {
        self.annotations
            .iter()
            .filter_map(|annotation| resolve_relative(manifest_uri, annotation.document_path()?))
            .collect()
    }
}

/// A `sap.ui5.routing.targets` entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingTarget {
    pub name: String,
    /// Component name (`name`) of component targets
    pub component_name: Option<String>,
    pub target_type: Option<String>,
    pub view_name: Option<String>,
    pub context_path: Option<String>,
    pub entity_set: Option<String>,
}

impl RoutingTarget {
    pub fn is_view(&self) -> bool {
        self.view_name.is_some() || self.target_type.as_deref() == Some("View")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedManifest {
    pub app_id: Option<String>,
    pub flex_enabled: Option<bool>,
    pub min_ui5_version: Option<String>,
    pub main_service_name: Option<String>,
    pub services: Vec<ServiceConfig>,
    pub routing_targets: IndexMap<String, RoutingTarget>,
    /// Routing targets that display views: target name to view name
    pub custom_views: IndexMap<String, String>,
    /// Whether the manifest declares `sap.ui.generic.app`
    pub generic_app: bool,
}

// ============================================================================
// Parsing
// ============================================================================

/// Normalize a manifest tree.
///
/// # Arguments
/// * `uri` - URI of the manifest, used for error reporting
/// * `root` - Parsed manifest document
///
/// # Returns
/// The normalized manifest, or `InvalidManifest` when the root is not an
/// object or lacks an `sap.app` section.
pub fn parse_manifest(uri: &Url, root: &JsonNode) -> Result<ParsedManifest, AnalysisError> {
    if !root.is_object() {
        return Err(AnalysisError::InvalidManifest {
            uri: uri.clone(),
            message: "root is not an object".to_string(),
        });
    }
    let app = root
        .get(SAP_APP)
        .filter(|app| app.is_object())
        .ok_or_else(|| AnalysisError::InvalidManifest {
            uri: uri.clone(),
            message: format!("missing {} section", SAP_APP),
        })?;

    let services = parse_services(app);
    let routing_targets = parse_routing_targets(root);
    let custom_views = routing_targets
        .values()
        .filter(|target| target.is_view())
        .map(|target| {
            (
                target.name.clone(),
                target.view_name.clone().unwrap_or_else(|| {
                    target.component_name.clone().unwrap_or_default()
                }),
            )
        })
        .collect();

    Ok(ParsedManifest {
        app_id: app.str_at(&["id"]).map(str::to_string),
        flex_enabled: root.at_path(&[SAP_UI5, "flexEnabled"]).and_then(JsonNode::as_bool),
        min_ui5_version: min_ui5_version(root),
        main_service_name: main_service_name(root, &services),
        services,
        routing_targets,
        custom_views,
        generic_app: root.get(SAP_UI_GENERIC_APP).is_some(),
    })
}

fn parse_services(app: &JsonNode) -> Vec<ServiceConfig> {
    let Some(data_sources) = app.get("dataSources").and_then(JsonNode::as_object) else {
        return Vec::new();
    };
    let source = |name: &str| data_sources.iter().rev().find(|p| p.key == name)?.value.as_ref();

    data_sources
        .iter()
        .filter_map(|property| {
            let value = property.value.as_ref()?;
            let source_type = value.str_at(&["type"]).unwrap_or("OData");
            if source_type != "OData" {
                return None;
            }
            let annotations = value
                .at_path(&["settings", "annotations"])
                .and_then(JsonNode::as_array)
                .unwrap_or_default()
                .iter()
                .filter_map(JsonNode::as_str)
                .filter_map(|name| {
                    let Some(annotation) = source(name) else {
                        log::debug!("Service {} references unknown annotation source {}", property.key, name);
                        return None;
                    };
                    if annotation.str_at(&["type"]) != Some("ODataAnnotation") {
                        log::debug!("Data source {} is not an annotation source", name);
                        return None;
                    }
                    let uri = annotation.str_at(&["uri"]).map(str::to_string);
                    let origin = if uri.as_deref().is_some_and(is_server_uri) {
                        AnnotationOrigin::RemoteCache
                    } else {
                        AnnotationOrigin::Local
                    };
                    Some(AnnotationFileRef {
                        name: name.to_string(),
                        uri,
                        local_uri: annotation
                            .str_at(&["settings", "localUri"])
                            .map(str::to_string),
                        origin,
                    })
                })
                .collect();

            Some(ServiceConfig {
                name: property.key.clone(),
                uri: value.str_at(&["uri"]).map(str::to_string),
                odata_version: value
                    .str_at(&["settings", "odataVersion"])
                    .map(str::to_string),
                local_uri: value
                    .str_at(&["settings", "localUri"])
                    .map(str::to_string),
                annotations,
            })
        })
        .collect()
}

fn parse_routing_targets(root: &JsonNode) -> IndexMap<String, RoutingTarget> {
    let Some(targets) = root
        .at_path(&[SAP_UI5, "routing", "targets"])
        .and_then(JsonNode::as_object)
    else {
        return IndexMap::new();
    };
    targets
        .iter()
        .filter_map(|property| {
            let target = property.value.as_ref().filter(|v| v.is_object())?;
            let setting = |key: &str| {
                target
                    .str_at(&["options", "settings", key])
                    .map(str::to_string)
            };
            Some((
                property.key.clone(),
                RoutingTarget {
                    name: property.key.clone(),
                    component_name: target.str_at(&["name"]).map(str::to_string),
                    target_type: target.str_at(&["type"]).map(str::to_string),
                    view_name: target.str_at(&["viewName"]).map(str::to_string),
                    context_path: setting("contextPath"),
                    entity_set: setting("entitySet"),
                },
            ))
        })
        .collect()
}

/// `sap.ui5.dependencies.minUI5Version`; for a list, the lowest entry
fn min_ui5_version(root: &JsonNode) -> Option<String> {
    let value = root.at_path(&[SAP_UI5, "dependencies", "minUI5Version"])?;
    if let Some(version) = value.as_str() {
        return Some(version.to_string());
    }
    value
        .as_array()?
        .iter()
        .filter_map(JsonNode::as_str)
        .min_by(|a, b| compare_versions(a, b))
        .map(str::to_string)
}

/// Data source of the default model, else `mainService`, else the first service
fn main_service_name(root: &JsonNode, services: &[ServiceConfig]) -> Option<String> {
    let declared = |name: &str| services.iter().any(|s| s.name == name);
    root.str_at(&[SAP_UI5, "models", "", "dataSource"])
        .filter(|name| declared(*name))
        .map(str::to_string)
        .or_else(|| declared(MAIN_SERVICE).then(|| MAIN_SERVICE.to_string()))
        .or_else(|| services.first().map(|s| s.name.clone()))
}

/// Numeric comparison of dotted versions; non-numeric parts compare as zero.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let parts = |v: &str| -> Vec<u64> {
        v.split('.')
            .map(|part| {
                part.chars()
                    .take_while(char::is_ascii_digit)
                    .collect::<String>()
                    .parse()
                    .unwrap_or(0)
            })
            .collect()
    };
    let (a, b) = (parts(a), parts(b));
    let len = a.len().max(b.len());
    (0..len)
        .map(|i| {
            a.get(i)
                .copied()
                .unwrap_or(0)
                .cmp(&b.get(i).copied().unwrap_or(0))
        })
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// Server URLs are absolute paths or carry a scheme
fn is_server_uri(uri: &str) -> bool {
    uri.starts_with('/') || Url::parse(uri).is_ok()
}

/// Resolve a manifest-relative path. Server URLs have no local document.
fn resolve_relative(manifest_uri: &Url, path: &str) -> Option<Url> {
    if path.is_empty() || is_server_uri(path) {
        return None;
    }
    manifest_uri.join(path).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_json;

    const MANIFEST: &str = r#"{
    "sap.app": {
        "id": "travel.app",
        "dataSources": {
            "mainService": {
                "uri": "/sap/opu/odata4/travel/",
                "type": "OData",
                "settings": {
                    "annotations": ["remote", "local"],
                    "localUri": "localService/metadata.xml",
                    "odataVersion": "4.0"
                }
            },
            "remote": {
                "uri": "/sap/opu/odata/IWFND/CATALOGSERVICE;v=2/Annotations(TechnicalName='X',Version='0001')/$value/",
                "type": "ODataAnnotation",
                "settings": { "localUri": "localService/remote.xml" }
            },
            "local": {
                "uri": "annotations/annotation.xml",
                "type": "ODataAnnotation",
                "settings": { "localUri": "annotations/annotation.xml" }
            },
            "cap": { "uri": "/processor/" }
        }
    },
    "sap.ui5": {
        "flexEnabled": true,
        "dependencies": { "minUI5Version": ["1.120.0", "1.96.2", "1.108.0"] },
        "models": { "": { "dataSource": "mainService" } },
        "routing": {
            "targets": {
                "TravelList": {
                    "type": "Component",
                    "name": "sap.fe.templates.ListReport",
                    "options": { "settings": { "contextPath": "/Travel" } }
                },
                "Custom": { "type": "View", "viewName": "travel.app.view.Custom" }
            }
        }
    }
}"#;

    fn manifest_uri() -> Url {
        Url::parse("file:///project/app/webapp/manifest.json").unwrap()
    }

    fn parsed() -> ParsedManifest {
        parse_manifest(&manifest_uri(), &parse_json(MANIFEST).unwrap()).expect("manifest")
    }

    #[test]
    fn test_basic_fields() {
        let manifest = parsed();
        assert_eq!(manifest.app_id.as_deref(), Some("travel.app"));
        assert_eq!(manifest.flex_enabled, Some(true));
        assert_eq!(manifest.min_ui5_version.as_deref(), Some("1.96.2"));
        assert_eq!(manifest.main_service_name.as_deref(), Some("mainService"));
        assert!(!manifest.generic_app);
    }

    #[test]
    fn test_services_and_annotation_origins() {
        let manifest = parsed();
        let names: Vec<&str> = manifest.services.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["mainService", "cap"]);

        let main = &manifest.services[0];
        assert!(main.is_local());
        assert_eq!(main.odata_version.as_deref(), Some("4.0"));
        assert_eq!(main.annotations[0].origin, AnnotationOrigin::RemoteCache);
        assert_eq!(main.annotations[1].origin, AnnotationOrigin::Local);
        assert_eq!(
            main.metadata_document(&manifest_uri()).map(|u| u.to_string()),
            Some("file:///project/app/webapp/localService/metadata.xml".to_string())
        );
        let documents: Vec<String> = main
            .annotation_documents(&manifest_uri())
            .iter()
            .map(Url::to_string)
            .collect();
        assert_eq!(
            documents,
            vec![
                "file:///project/app/webapp/localService/remote.xml",
                "file:///project/app/webapp/annotations/annotation.xml"
            ]
        );

        assert!(!manifest.services[1].is_local());
    }

    #[test]
    fn test_routing_targets_and_custom_views() {
        let manifest = parsed();
        let list = &manifest.routing_targets["TravelList"];
        assert_eq!(list.component_name.as_deref(), Some("sap.fe.templates.ListReport"));
        assert_eq!(list.context_path.as_deref(), Some("/Travel"));
        assert!(!list.is_view());
        assert_eq!(
            manifest.custom_views.get("Custom").map(String::as_str),
            Some("travel.app.view.Custom")
        );
        assert_eq!(manifest.custom_views.len(), 1);
    }

    #[test]
    fn test_missing_sap_app_is_invalid() {
        let root = parse_json(r#"{"sap.ui5": {}}"#).unwrap();
        let err = parse_manifest(&manifest_uri(), &root).expect_err("invalid");
        assert!(matches!(err, AnalysisError::InvalidManifest { .. }));
        let root = parse_json("[]").unwrap();
        assert!(parse_manifest(&manifest_uri(), &root).is_err());
    }

    #[test]
    fn test_main_service_fallbacks() {
        let root = parse_json(
            r#"{"sap.app": {"dataSources": {"other": {"uri": "/a/"}, "mainService": {"uri": "/b/"}}}}"#,
        )
        .unwrap();
        let manifest = parse_manifest(&manifest_uri(), &root).unwrap();
        assert_eq!(manifest.main_service_name.as_deref(), Some("mainService"));

        let root = parse_json(r#"{"sap.app": {"dataSources": {"other": {"uri": "/a/"}}}}"#).unwrap();
        let manifest = parse_manifest(&manifest_uri(), &root).unwrap();
        assert_eq!(manifest.main_service_name.as_deref(), Some("other"));

        let root = parse_json(r#"{"sap.app": {}}"#).unwrap();
        let manifest = parse_manifest(&manifest_uri(), &root).unwrap();
        assert!(manifest.main_service_name.is_none());
        assert!(manifest.min_ui5_version.is_none());
    }

    #[test]
    fn test_compare_versions() {
        assert_eq!(compare_versions("1.96.2", "1.108.0"), Ordering::Less);
        assert_eq!(compare_versions("1.120", "1.120.0"), Ordering::Equal);
        assert_eq!(compare_versions("1.84.0-SNAPSHOT", "1.84.0"), Ordering::Equal);
        assert_eq!(compare_versions("2.0", "1.999"), Ordering::Greater);
    }
}
