//
// service/metadata.rs
//
// Entity model extraction from EDMX metadata documents (OData V2 and V4)
//

use indexmap::IndexMap;
use serde::Serialize;

use super::alias::{alias_table_for, schema_elements, AliasTable};
use crate::syntax::{TextRange, XmlElement};

/// Protocol version of a metadata document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ODataVersion {
    V2,
    V4,
}

impl ODataVersion {
    /// Version from the `Version` attribute of the `Edmx` root
    /// (`1.0` is the V2 envelope, `4.0`/`4.01` are V4).
    pub fn from_edmx_version(version: &str) -> Option<Self> {
        match version {
            "1.0" | "2.0" | "3.0" => Some(ODataVersion::V2),
            v if v.starts_with('4') => Some(ODataVersion::V4),
            _ => None,
        }
    }

    /// Version from a manifest `odataVersion` setting
    pub fn from_manifest(version: &str) -> Option<Self> {
        match version {
            "2.0" | "2" => Some(ODataVersion::V2),
            "4.0" | "4.01" | "4" => Some(ODataVersion::V4),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MetadataKind {
    EntityContainer,
    EntitySet,
    Singleton,
    EntityType,
    ComplexType,
    Property,
    NavigationProperty,
}

/// A named element of the entity model.
///
/// `path` is the fully qualified annotation target of the element, e.g.
/// `ns.Travel`, `ns.Travel/_Booking` or `ns.Container/Travel`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetadataElement {
    pub name: String,
    pub path: String,
    pub kind: MetadataKind,
    /// Entity type of a set, target type of a navigation property, type of a property
    pub structured_type: Option<String>,
    /// Whether a navigation property (or property) holds a collection
    pub is_collection: bool,
    /// Navigation path to target entity set name (entity sets only)
    pub navigation_bindings: IndexMap<String, String>,
    /// V2 navigation properties: qualified association name and target role
    pub association: Option<(String, String)>,
    pub children: Vec<MetadataElement>,
    #[serde(skip)]
    pub range: TextRange,
}

impl MetadataElement {
    pub(crate) fn leaf(name: &str, path: String, kind: MetadataKind, range: TextRange) -> Self {
        Self {
            name: name.to_string(),
            path,
            kind,
            structured_type: None,
            is_collection: false,
            navigation_bindings: IndexMap::new(),
            association: None,
            children: Vec::new(),
            range,
        }
    }

    pub fn child(&self, name: &str) -> Option<&MetadataElement> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn navigation_property(&self, name: &str) -> Option<&MetadataElement> {
        self.children
            .iter()
            .find(|c| c.kind == MetadataKind::NavigationProperty && c.name == name)
    }

    pub fn navigation_properties(&self) -> impl Iterator<Item = &MetadataElement> {
        self.children
            .iter()
            .filter(|c| c.kind == MetadataKind::NavigationProperty)
    }
}

/// Entity model of one metadata document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataModel {
    pub version: Option<ODataVersion>,
    /// Schema namespaces declared by the document
    pub namespaces: Vec<String>,
    /// Alias table of the metadata document itself
    pub aliases: AliasTable,
    pub entity_container: Option<MetadataElement>,
    /// Entity sets and singletons by simple name
    pub entity_sets: IndexMap<String, MetadataElement>,
    /// Entity and complex types by fully qualified name
    pub entity_types: IndexMap<String, MetadataElement>,
}

// ============================================================================
// Parsing
// ============================================================================

/// V2 association end, keyed by role
#[derive(Debug, Clone)]
struct AssociationEnd {
    entity_type: String,
    many: bool,
}

/// Extract the entity model from a parsed metadata document.
///
/// Unresolvable type references leave `structured_type` as `None`; nothing
/// here fails.
pub fn parse_metadata(root: &XmlElement) -> MetadataModel {
    let aliases = alias_table_for(root);
    let version = root
        .attr("Version")
        .and_then(ODataVersion::from_edmx_version);

    let mut model = MetadataModel {
        version,
        aliases,
        ..MetadataModel::default()
    };

    // Associations are needed before types in V2 documents
    let mut associations: IndexMap<String, IndexMap<String, AssociationEnd>> = IndexMap::new();
    let mut association_sets: Vec<(String, IndexMap<String, String>)> = Vec::new();

    for schema in schema_elements(root) {
        let Some(namespace) = schema.attr("Namespace") else {
            continue;
        };
        model.namespaces.push(namespace.to_string());

        for association in schema.children_named("Association") {
            let Some(name) = association.attr("Name") else {
                continue;
            };
            let ends = association
                .children_named("End")
                .filter_map(|end| {
                    let role = end.attr("Role")?;
                    let entity_type = model.aliases.qualify(end.attr("Type")?)?;
                    Some((
                        role.to_string(),
                        AssociationEnd {
                            entity_type,
                            many: end.attr("Multiplicity") == Some("*"),
                        },
                    ))
                })
                .collect();
            associations.insert(format!("{}.{}", namespace, name), ends);
        }
    }

    for schema in schema_elements(root) {
        let Some(namespace) = schema.attr("Namespace") else {
            continue;
        };
        for element in &schema.children {
            match element.name.as_str() {
                "EntityType" | "ComplexType" => {
                    if let Some(entity_type) =
                        parse_structured_type(element, namespace, &model.aliases, &associations)
                    {
                        model
                            .entity_types
                            .insert(entity_type.path.clone(), entity_type);
                    }
                }
                "EntityContainer" => {
                    let Some(container_name) = element.attr("Name") else {
                        continue;
                    };
                    let container_path = format!("{}.{}", namespace, container_name);
                    let mut container = MetadataElement::leaf(
                        container_name,
                        container_path.clone(),
                        MetadataKind::EntityContainer,
                        element.range,
                    );
                    for member in &element.children {
                        match member.name.as_str() {
                            "EntitySet" | "Singleton" => {
                                if let Some(set) =
                                    parse_entity_set(member, &container_path, &model.aliases)
                                {
                                    container.children.push(set);
                                }
                            }
                            "AssociationSet" => {
                                if let Some(association) = member
                                    .attr("Association")
                                    .and_then(|a| model.aliases.qualify(a))
                                {
                                    let ends = member
                                        .children_named("End")
                                        .filter_map(|end| {
                                            Some((
                                                end.attr("Role")?.to_string(),
                                                end.attr("EntitySet")?.to_string(),
                                            ))
                                        })
                                        .collect();
                                    association_sets.push((association, ends));
                                }
                            }
                            _ => {}
                        }
                    }
                    if model.entity_container.is_some() {
                        log::debug!("Ignoring additional entity container {}", container_path);
                        continue;
                    }
                    model.entity_container = Some(container);
                }
                _ => {}
            }
        }
    }

    if let Some(container) = model.entity_container.as_mut() {
        for set in container.children.iter_mut() {
            bind_v2_navigation(set, &model.entity_types, &association_sets);
        }
        for set in &container.children {
            model.entity_sets.insert(set.name.clone(), set.clone());
        }
    }

    log::trace!(
        "Parsed metadata: {} entity types, {} entity sets",
        model.entity_types.len(),
        model.entity_sets.len()
    );
    model
}

fn parse_structured_type(
    element: &XmlElement,
    namespace: &str,
    aliases: &AliasTable,
    associations: &IndexMap<String, IndexMap<String, AssociationEnd>>,
) -> Option<MetadataElement> {
    let name = element.attr("Name")?;
    let path = format!("{}.{}", namespace, name);
    let kind = if element.is("EntityType") {
        MetadataKind::EntityType
    } else {
        MetadataKind::ComplexType
    };
    let mut structured = MetadataElement::leaf(name, path.clone(), kind, element.range);

    for member in &element.children {
        let Some(member_name) = member.attr("Name") else {
            continue;
        };
        let member_path = format!("{}/{}", path, member_name);
        match member.name.as_str() {
            "Property" => {
                let mut property = MetadataElement::leaf(
                    member_name,
                    member_path,
                    MetadataKind::Property,
                    member.range,
                );
                if let Some(type_name) = member.attr("Type") {
                    property.is_collection = type_name.starts_with("Collection(");
                    property.structured_type = aliases.qualify_type(type_name);
                }
                structured.children.push(property);
            }
            "NavigationProperty" => {
                let mut navigation = MetadataElement::leaf(
                    member_name,
                    member_path,
                    MetadataKind::NavigationProperty,
                    member.range,
                );
                if let Some(type_name) = member.attr("Type") {
                    // V4: Type="ns.Target" or Type="Collection(ns.Target)"
                    match type_name
                        .strip_prefix("Collection(")
                        .and_then(|t| t.strip_suffix(')'))
                    {
                        Some(inner) => {
                            navigation.is_collection = true;
                            navigation.structured_type = aliases.qualify(inner);
                        }
                        None => navigation.structured_type = aliases.qualify(type_name),
                    }
                } else if let (Some(relationship), Some(to_role)) =
                    (member.attr("Relationship"), member.attr("ToRole"))
                {
                    // V2: target type comes from the association end
                    let relationship = aliases
                        .qualify(relationship)
                        .unwrap_or_else(|| relationship.to_string());
                    if let Some(end) = associations
                        .get(&relationship)
                        .and_then(|ends| ends.get(to_role))
                    {
                        navigation.structured_type = Some(end.entity_type.clone());
                        navigation.is_collection = end.many;
                    }
                    navigation.association = Some((relationship, to_role.to_string()));
                }
                structured.children.push(navigation);
            }
            _ => {}
        }
    }
    Some(structured)
}

fn parse_entity_set(
    member: &XmlElement,
    container_path: &str,
    aliases: &AliasTable,
) -> Option<MetadataElement> {
    let name = member.attr("Name")?;
    let kind = if member.is("Singleton") {
        MetadataKind::Singleton
    } else {
        MetadataKind::EntitySet
    };
    let mut set = MetadataElement::leaf(
        name,
        format!("{}/{}", container_path, name),
        kind,
        member.range,
    );
    set.structured_type = member
        .attr("EntityType")
        .or_else(|| member.attr("Type"))
        .and_then(|t| aliases.qualify(t));
    set.is_collection = kind == MetadataKind::EntitySet;
    for binding in member.children_named("NavigationPropertyBinding") {
        if let (Some(path), Some(target)) = (binding.attr("Path"), binding.attr("Target")) {
            let target_set = target.rsplit('/').next().unwrap_or(target);
            set.navigation_bindings
                .insert(path.to_string(), target_set.to_string());
        }
    }
    Some(set)
}

/// Derive navigation bindings of a V2 entity set from association sets
fn bind_v2_navigation(
    set: &mut MetadataElement,
    entity_types: &IndexMap<String, MetadataElement>,
    association_sets: &[(String, IndexMap<String, String>)],
) {
    let Some(entity_type) = set
        .structured_type
        .as_ref()
        .and_then(|t| entity_types.get(t))
    else {
        return;
    };
    for navigation in entity_type.navigation_properties() {
        let Some((relationship, to_role)) = &navigation.association else {
            continue;
        };
        let target = association_sets
            .iter()
            .filter(|(association, _)| association == relationship)
            .find_map(|(_, ends)| ends.get(to_role));
        if let Some(target) = target {
            set.navigation_bindings
                .insert(navigation.name.clone(), target.clone());
        }
    }
}
