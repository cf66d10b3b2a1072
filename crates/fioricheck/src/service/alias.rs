//
// service/alias.rs
//
// Alias tables for qualifying annotation targets and terms
//

use std::num::NonZeroUsize;
use std::sync::{Arc, RwLock};

use indexmap::IndexMap;
use lru::LruCache;
use url::Url;

use crate::document_store::Document;
use crate::syntax::XmlElement;

/// Namespace every markup document may use without declaring it
pub const EDM_NAMESPACE: &str = "Edm";

/// An `Include` inside a `Reference`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Include {
    pub namespace: String,
    pub alias: Option<String>,
}

/// A `Reference` element of a markup document
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    pub uri: String,
    pub includes: Vec<Include>,
}

/// Schema declared by a document (`Schema Namespace=".." Alias=".."`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaDeclaration {
    pub namespace: String,
    pub alias: Option<String>,
}

/// Maps aliases and namespaces in scope of one document to full namespaces.
///
/// Tables are values: they are built by [`build_alias_table`] and never
/// changed afterwards. [`extended`](AliasTable::extended) returns a new table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasTable {
    entries: IndexMap<String, String>,
}

impl AliasTable {
    /// Namespace for an alias or namespace prefix
    pub fn resolve_namespace(&self, prefix: &str) -> Option<&str> {
        self.entries.get(prefix).map(String::as_str)
    }

    /// Fully qualify a dotted name (`UI.LineItem` becomes
    /// `com.sap.vocabularies.UI.v1.LineItem`). The namespace part is
    /// everything before the last dot.
    ///
    /// Returns `None` when the prefix is not in scope or the name has no prefix.
    pub fn qualify(&self, name: &str) -> Option<String> {
        let (prefix, local) = name.rsplit_once('.')?;
        if local.is_empty() {
            return None;
        }
        let namespace = self.resolve_namespace(prefix)?;
        Some(format!("{}.{}", namespace, local))
    }

    /// Fully qualify an annotation target path.
    ///
    /// Only the first segment carries a namespace. Overload signatures such as
    /// `SAP.action(SAP.Travel)` have their parameter types qualified as well.
    /// Absolute paths (leading `/`) are not targets and yield `None`.
    pub fn qualify_path(&self, path: &str) -> Option<String> {
        if path.is_empty() || path.starts_with('/') {
            return None;
        }
        let (head, rest) = match path.split_once('/') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };

        let head = match head.split_once('(') {
            Some((name, params)) => {
                let params = params.strip_suffix(')')?;
                let qualified_params = params
                    .split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(|p| self.qualify_type(p))
                    .collect::<Option<Vec<_>>>()?;
                format!("{}({})", self.qualify(name)?, qualified_params.join(","))
            }
            None => self.qualify(head)?,
        };

        Some(match rest {
            Some(rest) => format!("{}/{}", head, rest),
            None => head,
        })
    }

    /// Qualify a type reference, unwrapping `Collection(..)`
    pub fn qualify_type(&self, type_name: &str) -> Option<String> {
        match type_name
            .strip_prefix("Collection(")
            .and_then(|inner| inner.strip_suffix(')'))
        {
            Some(inner) => Some(format!("Collection({})", self.qualify(inner)?)),
            None => self.qualify(type_name),
        }
    }

    /// A copy of this table that additionally accepts the given namespaces
    /// under their own names. Existing entries win.
    pub fn extended<'a>(&self, namespaces: impl IntoIterator<Item = &'a str>) -> AliasTable {
        let mut entries = self.entries.clone();
        for namespace in namespaces {
            entries
                .entry(namespace.to_string())
                .or_insert_with(|| namespace.to_string());
        }
        AliasTable { entries }
    }

    /// Distinct namespaces reachable through this table
    pub fn namespaces(&self) -> Vec<&str> {
        let mut namespaces: Vec<&str> = self.entries.values().map(String::as_str).collect();
        namespaces.sort_unstable();
        namespaces.dedup();
        namespaces
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Build the alias table of a document from its own schemas and references.
///
/// Pure function of its inputs. Later declarations do not override earlier
/// ones, so a document's own schema alias wins over a conflicting include.
pub fn build_alias_table(schemas: &[SchemaDeclaration], references: &[Reference]) -> AliasTable {
    let mut entries: IndexMap<String, String> = IndexMap::new();
    let mut add = |key: &str, namespace: &str| {
        entries
            .entry(key.to_string())
            .or_insert_with(|| namespace.to_string());
    };

    add(EDM_NAMESPACE, EDM_NAMESPACE);
    for schema in schemas {
        add(&schema.namespace, &schema.namespace);
        if let Some(alias) = &schema.alias {
            add(alias, &schema.namespace);
        }
    }
    for include in references.iter().flat_map(|r| r.includes.iter()) {
        add(&include.namespace, &include.namespace);
        if let Some(alias) = &include.alias {
            add(alias, &include.namespace);
        }
    }
    AliasTable { entries }
}

/// Read the `Reference` elements of a markup document
pub fn read_references(root: &XmlElement) -> Vec<Reference> {
    root.children_named("Reference")
        .map(|reference| Reference {
            uri: reference.attr("Uri").unwrap_or_default().to_string(),
            includes: reference
                .children_named("Include")
                .filter_map(|include| {
                    Some(Include {
                        namespace: include.attr("Namespace")?.to_string(),
                        alias: include.attr("Alias").map(str::to_string),
                    })
                })
                .collect(),
        })
        .collect()
}

/// Read the `Schema` declarations of a markup document
pub fn read_schemas(root: &XmlElement) -> Vec<SchemaDeclaration> {
    schema_elements(root)
        .filter_map(|schema| {
            Some(SchemaDeclaration {
                namespace: schema.attr("Namespace")?.to_string(),
                alias: schema.attr("Alias").map(str::to_string),
            })
        })
        .collect()
}

/// `Schema` elements below `DataServices` (or the root itself for bare schemas)
pub fn schema_elements(root: &XmlElement) -> Box<dyn Iterator<Item = &XmlElement> + '_> {
    if root.is("Schema") {
        return Box::new(std::iter::once(root));
    }
    Box::new(
        root.children_named("DataServices")
            .flat_map(|data_services| data_services.children_named("Schema")),
    )
}

/// Alias table of a parsed markup document
pub fn alias_table_for(root: &XmlElement) -> AliasTable {
    build_alias_table(&read_schemas(root), &read_references(root))
}

// ============================================================================
// Alias Cache
// ============================================================================

/// Default capacity for the alias cache
const DEFAULT_ALIAS_CACHE_CAPACITY: usize = 256;

/// Alias tables keyed by document URI and revision.
///
/// A new revision of a document misses the cache, so entries never need to
/// be invalidated for correctness; `invalidate` only frees memory.
pub struct AliasCache {
    inner: RwLock<LruCache<(Url, u64), Arc<AliasTable>>>,
}

impl std::fmt::Debug for AliasCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AliasCache").finish_non_exhaustive()
    }
}

impl Default for AliasCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_ALIAS_CACHE_CAPACITY)
    }
}

impl AliasCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(cap: usize) -> Self {
        let cap = NonZeroUsize::new(cap).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: RwLock::new(LruCache::new(cap)),
        }
    }

    pub fn get(&self, uri: &Url, revision: u64) -> Option<Arc<AliasTable>> {
        self.inner
            .read()
            .ok()?
            .peek(&(uri.clone(), revision))
            .cloned()
    }

    pub fn insert(&self, uri: Url, revision: u64, table: Arc<AliasTable>) {
        if let Ok(mut guard) = self.inner.write() {
            guard.push((uri, revision), table);
        }
    }

    /// Alias table of a markup document, computed on first use per revision.
    /// Documents without a markup tree get a table holding only `Edm`.
    pub fn get_or_build(&self, document: &Document) -> Arc<AliasTable> {
        if let Some(table) = self.get(&document.uri, document.revision) {
            log::trace!("Alias cache hit for {}", document.uri);
            return table;
        }
        let table = Arc::new(match document.xml() {
            Some(root) => alias_table_for(root),
            None => build_alias_table(&[], &[]),
        });
        self.insert(document.uri.clone(), document.revision, Arc::clone(&table));
        table
    }

    /// Drop every revision cached for `uri`
    pub fn invalidate(&self, uri: &Url) -> usize {
        let Ok(mut guard) = self.inner.write() else {
            return 0;
        };
        let stale: Vec<(Url, u64)> = guard
            .iter()
            .filter(|((cached, _), _)| cached == uri)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &stale {
            guard.pop(key);
        }
        stale.len()
    }

    pub fn invalidate_all(&self) {
        if let Ok(mut guard) = self.inner.write() {
            guard.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
