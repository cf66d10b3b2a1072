//
// linker/settings.rs
//
// Setting domains, defaults and level precedence for linked configuration
//

use indexmap::IndexMap;
use serde_json::Value;

use super::model::{ConfigLevel, ResolvedSetting};
use crate::project::manifest::{SAP_UI5, SAP_UI_GENERIC_APP};
use crate::syntax::JsonNode;

/// Values a setting may take
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingDomain {
    Enum(&'static [&'static str]),
    Bool,
    /// `true`/`false` or a structured object
    BoolOrObject,
    Object,
}

impl SettingDomain {
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            SettingDomain::Enum(values) => value.as_str().is_some_and(|s| values.contains(&s)),
            SettingDomain::Bool => value.is_boolean(),
            SettingDomain::BoolOrObject => value.is_boolean() || value.is_object(),
            SettingDomain::Object => value.is_object(),
        }
    }

    /// Enumerable values; empty for open domains
    pub fn values(&self) -> Vec<Value> {
        match self {
            SettingDomain::Enum(values) => values.iter().map(|v| Value::from(*v)).collect(),
            SettingDomain::Bool => vec![Value::Bool(true), Value::Bool(false)],
            SettingDomain::BoolOrObject | SettingDomain::Object => Vec::new(),
        }
    }
}

/// A place a setting can be written, highest precedence first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub level: ConfigLevel,
    pub path: Vec<String>,
}

impl Candidate {
    pub fn new(level: ConfigLevel, path: Vec<String>) -> Self {
        Self { level, path }
    }
}

pub const V4_TABLE_TYPES: &[&str] = &["ResponsiveTable", "GridTable", "AnalyticalTable", "TreeTable"];
pub const V4_CREATION_MODES: &[&str] = &[
    "NewPage",
    "Inline",
    "InlineCreationRows",
    "External",
    "CreationDialog",
];
pub const V4_SELECTION_MODES: &[&str] = &["Auto", "Multi", "Single", "None", "ForceMulti"];

pub const V2_TABLE_TYPES: &[&str] = &["ResponsiveTable", "GridTable", "AnalyticalTable", "TreeTable"];
pub const V2_CREATE_MODES: &[&str] = &["inline", "creationRows", "creationRowsHiddenInEditMode"];

// ============================================================================
// Resolution
// ============================================================================

/// Resolve one setting against the manifest.
///
/// # Arguments
/// * `manifest` - Manifest tree
/// * `domain` - Values the setting accepts
/// * `candidates` - Locations in precedence order; the first one is where a
///   missing value would be written
/// * `default` - Value used when no level holds a valid value
///
/// # Returns
/// The setting with `value_in_file` taken from the first explicit level (even
/// when invalid) and `resolved` from the first valid level, else `default`.
pub fn resolve_setting(
    manifest: &JsonNode,
    domain: SettingDomain,
    candidates: &[Candidate],
    default: Value,
) -> ResolvedSetting {
    let mut explicit: Option<(&Candidate, Value)> = None;
    let mut resolved: Option<Value> = None;

    for candidate in candidates {
        let Some(node) = manifest.at_path(&candidate.path) else {
            continue;
        };
        let value = node.to_value();
        if resolved.is_none() && domain.accepts(&value) {
            resolved = Some(value.clone());
        }
        if explicit.is_none() {
            explicit = Some((candidate, value));
        }
        if resolved.is_some() {
            break;
        }
    }

    let configuration_path = explicit
        .as_ref()
        .map(|(candidate, _)| candidate.path.clone())
        .or_else(|| candidates.first().map(|c| c.path.clone()))
        .unwrap_or_default();
    let level = explicit.as_ref().map(|(candidate, _)| candidate.level);

    ResolvedSetting {
        configuration_path,
        value_in_file: explicit.map(|(_, value)| value),
        level,
        values: domain.values(),
        resolved: resolved.unwrap_or(default),
    }
}

fn path_of(base: &[String], tail: &[&str]) -> Vec<String> {
    base.iter()
        .cloned()
        .chain(tail.iter().map(|s| s.to_string()))
        .collect()
}

// ============================================================================
// V4 tables
// ============================================================================

/// Table settings of a V4 table, read from its control configuration entry.
///
/// `control_path` is the manifest path of `controlConfiguration[key]`.
pub fn v4_table_settings(
    manifest: &JsonNode,
    control_path: &[String],
) -> IndexMap<String, ResolvedSetting> {
    let table = |tail: &[&str]| vec![Candidate::new(ConfigLevel::Table, path_of(control_path, tail))];
    let mut settings = IndexMap::new();

    let table_type = resolve_setting(
        manifest,
        SettingDomain::Enum(V4_TABLE_TYPES),
        &table(&["tableSettings", "type"]),
        Value::from("ResponsiveTable"),
    );
    let creation_default = if table_type.resolved == "TreeTable" {
        "NewPage"
    } else {
        "Inline"
    };
    let creation_mode = resolve_setting(
        manifest,
        SettingDomain::Enum(V4_CREATION_MODES),
        &table(&["tableSettings", "creationMode", "name"]),
        Value::from(creation_default),
    );
    settings.insert("type".to_string(), table_type);
    settings.insert("creationMode".to_string(), creation_mode);
    settings.insert(
        "personalization".to_string(),
        resolve_setting(
            manifest,
            SettingDomain::BoolOrObject,
            &table(&["tableSettings", "personalization"]),
            Value::Bool(true),
        ),
    );
    settings.insert(
        "selectionMode".to_string(),
        resolve_setting(
            manifest,
            SettingDomain::Enum(V4_SELECTION_MODES),
            &table(&["tableSettings", "selectionMode"]),
            Value::from("Auto"),
        ),
    );
    settings.insert(
        "enableExport".to_string(),
        resolve_setting(
            manifest,
            SettingDomain::Bool,
            &table(&["tableSettings", "enableExport"]),
            Value::Bool(true),
        ),
    );
    settings.insert(
        "condensedTableLayout".to_string(),
        resolve_setting(
            manifest,
            SettingDomain::Bool,
            &table(&["tableSettings", "condensedTableLayout"]),
            Value::Bool(false),
        ),
    );
    settings
}

// ============================================================================
// V2 tables
// ============================================================================

/// Configuration levels above a V2 table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct V2TableScope {
    /// `component.settings.sections[key]` of an object page table
    pub section: Option<Vec<String>>,
    /// `component.settings` of the page
    pub page: Vec<String>,
}

impl V2TableScope {
    /// Candidates for `name`; `type` is spelled `tableType` outside `tableSettings`
    fn candidates(&self, name: &str) -> Vec<Candidate> {
        let outer = if name == "type" { "tableType" } else { name };
        let app = vec![SAP_UI_GENERIC_APP.to_string(), "settings".to_string()];
        let mut candidates = Vec::with_capacity(5);
        match &self.section {
            Some(section) => {
                candidates.push(Candidate::new(
                    ConfigLevel::Table,
                    path_of(section, &["tableSettings", name]),
                ));
                candidates.push(Candidate::new(ConfigLevel::Section, path_of(section, &[outer])));
                candidates.push(Candidate::new(
                    ConfigLevel::Page,
                    path_of(&self.page, &["tableSettings", name]),
                ));
            }
            None => candidates.push(Candidate::new(
                ConfigLevel::Table,
                path_of(&self.page, &["tableSettings", name]),
            )),
        }
        candidates.push(Candidate::new(ConfigLevel::Page, path_of(&self.page, &[outer])));
        candidates.push(Candidate::new(ConfigLevel::Application, path_of(&app, &[outer])));
        candidates
    }

    /// Candidates for a setting written on the section entry itself, then
    /// the page and application levels it inherits from
    fn section_candidates(&self, name: &str) -> Vec<Candidate> {
        let outer = if name == "type" { "tableType" } else { name };
        let app = vec![SAP_UI_GENERIC_APP.to_string(), "settings".to_string()];
        let mut candidates = Vec::with_capacity(3);
        if let Some(section) = &self.section {
            candidates.push(Candidate::new(ConfigLevel::Section, path_of(section, &[outer])));
        }
        candidates.push(Candidate::new(ConfigLevel::Page, path_of(&self.page, &[outer])));
        candidates.push(Candidate::new(ConfigLevel::Application, path_of(&app, &[outer])));
        candidates
    }
}

// ============================================================================
// V2 sections
// ============================================================================

/// Settings written on a V2 object page section that hosts a table:
/// `tableType` and `createMode`, resolved section, page, application
pub fn v2_section_settings(manifest: &JsonNode, scope: &V2TableScope) -> IndexMap<String, ResolvedSetting> {
    let mut settings = IndexMap::new();
    if scope.section.is_none() {
        return settings;
    }
    let table_type = resolve_setting(
        manifest,
        SettingDomain::Enum(V2_TABLE_TYPES),
        &scope.section_candidates("type"),
        Value::from("ResponsiveTable"),
    );
    let create_default = if table_type.resolved == "GridTable" {
        "creationRowsHiddenInEditMode"
    } else {
        "inline"
    };
    let create_mode = resolve_setting(
        manifest,
        SettingDomain::Enum(V2_CREATE_MODES),
        &scope.section_candidates("createMode"),
        Value::from(create_default),
    );
    settings.insert("tableType".to_string(), table_type);
    settings.insert("createMode".to_string(), create_mode);
    settings
}

// ============================================================================
// Application
// ============================================================================

/// Application-level settings
pub fn app_settings(manifest: &JsonNode, is_v4: bool) -> IndexMap<String, ResolvedSetting> {
    let app = |path: &[&str]| {
        vec![Candidate::new(
            ConfigLevel::Application,
            path.iter().map(|s| s.to_string()).collect(),
        )]
    };
    let fcl_path: &[&str] = if is_v4 {
        &[SAP_UI5, "routing", "config", "flexibleColumnLayout"]
    } else {
        &[SAP_UI_GENERIC_APP, "settings", "flexibleColumnLayout"]
    };

    let mut settings = IndexMap::new();
    settings.insert(
        "flexEnabled".to_string(),
        resolve_setting(
            manifest,
            SettingDomain::Bool,
            &app(&[SAP_UI5, "flexEnabled"]),
            Value::Bool(false),
        ),
    );
    settings.insert(
        "flexibleColumnLayout".to_string(),
        resolve_setting(manifest, SettingDomain::Object, &app(fcl_path), Value::Bool(false)),
    );
    settings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_json;

    fn strings(path: &[&str]) -> Vec<String> {
        path.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_first_explicit_level_wins() {
        let root = parse_json(r#"{"t": {"x": "GridTable"}, "p": {"x": "TreeTable"}}"#).unwrap();
        let candidates = vec![
            Candidate::new(ConfigLevel::Table, strings(&["t", "x"])),
            Candidate::new(ConfigLevel::Page, strings(&["p", "x"])),
        ];
        let setting = resolve_setting(
            &root,
            SettingDomain::Enum(V4_TABLE_TYPES),
            &candidates,
            Value::from("ResponsiveTable"),
        );
        assert_eq!(setting.resolved, "GridTable");
        assert_eq!(setting.level, Some(ConfigLevel::Table));
        assert_eq!(setting.configuration_path, strings(&["t", "x"]));
    }

    #[test]
    fn test_invalid_value_is_kept_but_skipped() {
        let root = parse_json(r#"{"t": {"x": "Bogus"}, "p": {"x": "TreeTable"}}"#).unwrap();
        let candidates = vec![
            Candidate::new(ConfigLevel::Table, strings(&["t", "x"])),
            Candidate::new(ConfigLevel::Page, strings(&["p", "x"])),
        ];
        let setting = resolve_setting(
            &root,
            SettingDomain::Enum(V4_TABLE_TYPES),
            &candidates,
            Value::from("ResponsiveTable"),
        );
        assert_eq!(setting.value_in_file, Some(Value::from("Bogus")));
        assert_eq!(setting.resolved, "TreeTable");
        assert!(setting.is_invalid_in_file());
    }

    #[test]
    fn test_missing_everywhere_uses_default_and_insert_path() {
        let root = parse_json("{}").unwrap();
        let candidates = vec![
            Candidate::new(ConfigLevel::Table, strings(&["t", "x"])),
            Candidate::new(ConfigLevel::Page, strings(&["p", "x"])),
        ];
        let setting = resolve_setting(&root, SettingDomain::Bool, &candidates, Value::Bool(false));
        assert_eq!(setting.resolved, Value::Bool(false));
        assert!(setting.value_in_file.is_none());
        assert!(setting.level.is_none());
        assert_eq!(setting.configuration_path, strings(&["t", "x"]));
    }

    #[test]
    fn test_v4_creation_mode_default_depends_on_type() {
        let root = parse_json(
            r#"{"cc": {"tree": {"tableSettings": {"type": "TreeTable"}}, "grid": {"tableSettings": {"type": "GridTable"}}}}"#,
        )
        .unwrap();
        let tree = v4_table_settings(&root, &strings(&["cc", "tree"]));
        let grid = v4_table_settings(&root, &strings(&["cc", "grid"]));
        assert_eq!(tree["creationMode"].resolved, "NewPage");
        assert_eq!(grid["creationMode"].resolved, "Inline");
        assert_eq!(grid["personalization"].resolved, Value::Bool(true));
        assert_eq!(
            grid["creationMode"].configuration_path,
            strings(&["cc", "grid", "tableSettings", "creationMode", "name"])
        );
    }

    #[test]
    fn test_v2_levels() {
        let root = parse_json(
            r#"{
  "sap.ui.generic.app": {"settings": {"tableType": "AnalyticalTable"}},
  "page": {"tableType": "GridTable", "sections": {"s": {"tableSettings": {"multiSelect": true}}}}
}"#,
        )
        .unwrap();
        let scope = V2TableScope {
            section: Some(strings(&["page", "sections", "s"])),
            page: strings(&["page"]),
        };
        let settings = v2_table_settings(&root, &scope);
        assert_eq!(settings["type"].resolved, "GridTable");
        assert_eq!(settings["type"].level, Some(ConfigLevel::Page));
        assert_eq!(settings["createMode"].resolved, "creationRowsHiddenInEditMode");
        assert_eq!(settings["multiSelect"].resolved, Value::Bool(true));
        assert_eq!(settings["multiSelect"].level, Some(ConfigLevel::Table));

        let list_report = V2TableScope {
            section: None,
            page: strings(&["missing"]),
        };
        let settings = v2_table_settings(&root, &list_report);
        assert_eq!(settings["type"].resolved, "AnalyticalTable");
        assert_eq!(settings["type"].level, Some(ConfigLevel::Application));
        assert_eq!(settings["createMode"].resolved, "inline");
    }

    #[test]
    fn test_app_settings() {
        let root = parse_json(
            r#"{"sap.ui5": {"flexEnabled": true, "routing": {"config": {"flexibleColumnLayout": {"defaultTwoColumnLayoutType": "TwoColumnsMidExpanded"}}}}}"#,
        )
        .unwrap();
        let v4 = app_settings(&root, true);
        assert_eq!(v4["flexEnabled"].resolved, Value::Bool(true));
        assert!(v4["flexibleColumnLayout"].resolved.is_object());

        let v2 = app_settings(&root, false);
        assert_eq!(v2["flexibleColumnLayout"].resolved, Value::Bool(false));
        assert_eq!(
            v2["flexibleColumnLayout"].configuration_path,
            strings(&["sap.ui.generic.app", "settings", "flexibleColumnLayout"])
        );
    }
}
