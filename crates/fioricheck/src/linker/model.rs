//
// linker/model.rs
//
// Linked page/table/section model
//

use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::service::{IndexedAnnotation, MetadataElement};

/// Template of a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ComponentKind {
    ListReport,
    ObjectPage,
}

/// Key of [`LinkedPage::lookup`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeKind {
    Table,
    Section,
    OrphanTable,
    OrphanSection,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Table => "table",
            NodeKind::Section => "section",
            NodeKind::OrphanTable => "orphan-table",
            NodeKind::OrphanSection => "orphan-section",
        }
    }

    pub fn is_orphan(&self) -> bool {
        matches!(self, NodeKind::OrphanTable | NodeKind::OrphanSection)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration level a setting value was read from, in precedence order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ConfigLevel {
    Table,
    Section,
    Page,
    Application,
}

/// Effective value of a setting after precedence and defaults.
///
/// `configuration_path` is where the explicit value was found, or, when no
/// level sets it, where a table-level (or app-level) value would be written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedSetting {
    pub configuration_path: Vec<String>,
    /// First explicit value in precedence order, valid or not
    pub value_in_file: Option<Value>,
    /// Level `value_in_file` was read from
    pub level: Option<ConfigLevel>,
    /// Valid domain; empty for open domains
    pub values: Vec<Value>,
    pub resolved: Value,
}

impl ResolvedSetting {
    /// Whether an explicit value exists but lies outside the domain
    pub fn is_invalid_in_file(&self) -> bool {
        self.value_in_file
            .as_ref()
            .is_some_and(|value| !self.values.is_empty() && !self.values.contains(value))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkedTable {
    #[serde(skip)]
    pub annotation: Option<IndexedAnnotation>,
    /// Relative annotation path of the table (`nav/@term#qualifier`)
    pub annotation_path: String,
    /// Entity type the table's line item is defined on
    pub entity: MetadataElement,
    pub configuration: IndexMap<String, ResolvedSetting>,
    /// Manifest path of the table's configuration entry
    pub path: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkedSection {
    /// Facet `ID`, when declared
    pub id: Option<String>,
    #[serde(skip)]
    pub annotation: Option<IndexedAnnotation>,
    pub annotation_path: String,
    pub configuration: IndexMap<String, ResolvedSetting>,
    pub path: Vec<String>,
}

/// A configuration entry whose annotation is not in the index
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrphanNode {
    pub kind: NodeKind,
    /// Configuration key as written
    pub key: String,
    pub path: Vec<String>,
    /// The raw configuration entry
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum LinkedNode {
    Table(LinkedTable),
    Section(LinkedSection),
    Orphan(OrphanNode),
}

impl LinkedNode {
    pub fn kind(&self) -> NodeKind {
        match self {
            LinkedNode::Table(_) => NodeKind::Table,
            LinkedNode::Section(_) => NodeKind::Section,
            LinkedNode::Orphan(orphan) => orphan.kind,
        }
    }

    pub fn path(&self) -> &[String] {
        match self {
            LinkedNode::Table(table) => &table.path,
            LinkedNode::Section(section) => &section.path,
            LinkedNode::Orphan(orphan) => &orphan.path,
        }
    }

    pub fn annotation(&self) -> Option<&IndexedAnnotation> {
        match self {
            LinkedNode::Table(table) => table.annotation.as_ref(),
            LinkedNode::Section(section) => section.annotation.as_ref(),
            LinkedNode::Orphan(_) => None,
        }
    }

    pub fn configuration(&self) -> Option<&IndexMap<String, ResolvedSetting>> {
        match self {
            LinkedNode::Table(table) => Some(&table.configuration),
            LinkedNode::Section(section) => Some(&section.configuration),
            LinkedNode::Orphan(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkedPage {
    /// Routing target (V4) or page key (V2)
    pub target_name: String,
    pub component_kind: ComponentKind,
    /// Entity type of the page context
    pub entity: MetadataElement,
    pub entity_set: Option<MetadataElement>,
    /// Absolute context path of the page
    pub context_path: String,
    /// Manifest path of the page settings
    pub path: Vec<String>,
    pub lookup: IndexMap<NodeKind, Vec<LinkedNode>>,
}

impl LinkedPage {
    pub fn nodes(&self, kind: NodeKind) -> &[LinkedNode] {
        self.lookup.get(&kind).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn tables(&self) -> impl Iterator<Item = &LinkedTable> {
        self.nodes(NodeKind::Table).iter().filter_map(|node| match node {
            LinkedNode::Table(table) => Some(table),
            _ => None,
        })
    }

    pub fn sections(&self) -> impl Iterator<Item = &LinkedSection> {
        self.nodes(NodeKind::Section).iter().filter_map(|node| match node {
            LinkedNode::Section(section) => Some(section),
            _ => None,
        })
    }

    /// Orphan nodes of both kinds
    pub fn orphans(&self) -> impl Iterator<Item = &OrphanNode> {
        self.nodes(NodeKind::OrphanTable)
            .iter()
            .chain(self.nodes(NodeKind::OrphanSection))
            .filter_map(|node| match node {
                LinkedNode::Orphan(orphan) => Some(orphan),
                _ => None,
            })
    }

    pub(crate) fn push(&mut self, node: LinkedNode) {
        self.lookup.entry(node.kind()).or_default().push(node);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LinkedAppData {
    pub pages: Vec<LinkedPage>,
    /// Application-level settings
    pub configuration: IndexMap<String, ResolvedSetting>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum LinkedApplication {
    V2(LinkedAppData),
    V4(LinkedAppData),
}

impl LinkedApplication {
    pub fn data(&self) -> &LinkedAppData {
        match self {
            LinkedApplication::V2(data) | LinkedApplication::V4(data) => data,
        }
    }

    pub fn pages(&self) -> &[LinkedPage] {
        &self.data().pages
    }

    pub fn is_v4(&self) -> bool {
        matches!(self, LinkedApplication::V4(_))
    }
}

/// Linked applications keyed by app root
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LinkedModel {
    pub apps: IndexMap<Url, LinkedApplication>,
    /// Applications configured in both templating styles; linked without pages
    pub inconsistent_apps: Vec<Url>,
}
