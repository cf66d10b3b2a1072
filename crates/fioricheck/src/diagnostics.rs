//
// diagnostics.rs
//
// Diagnostic data type produced by rules over the parsed and linked model
//

use serde::Serialize;
use url::Url;

use crate::document_store::Document;
use crate::linker::NodeKind;
use crate::service::IndexedAnnotation;
use crate::syntax::TextRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Severity {
    Error,
    Warning,
    Information,
    Hint,
}

/// Where a diagnostic points
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DiagnosticLocation {
    Manifest {
        uri: Url,
        /// Member path of the offending entry
        path: Vec<String>,
        range: TextRange,
    },
    Annotation {
        uri: Url,
        target: String,
        term: String,
        qualifier: Option<String>,
        range: TextRange,
    },
}

impl DiagnosticLocation {
    pub fn uri(&self) -> &Url {
        match self {
            DiagnosticLocation::Manifest { uri, .. } | DiagnosticLocation::Annotation { uri, .. } => uri,
        }
    }

    pub fn range(&self) -> TextRange {
        match self {
            DiagnosticLocation::Manifest { range, .. }
            | DiagnosticLocation::Annotation { range, .. } => *range,
        }
    }

    /// Location of a manifest member. When the member is missing the range is
    /// the deepest existing ancestor, so hosts can still point at something.
    pub fn manifest_path(document: &Document, path: &[String]) -> Option<Self> {
        let root = document.json()?;
        let range = (0..=path.len())
            .rev()
            .find_map(|len| match len {
                0 => Some(root.range),
                _ => root.property_at_path(&path[..len]).map(|p| p.range),
            })?;
        Some(DiagnosticLocation::Manifest {
            uri: document.uri.clone(),
            path: path.to_vec(),
            range,
        })
    }

    /// Location of the winning definition of an indexed annotation
    pub fn annotation(annotation: &IndexedAnnotation) -> Self {
        DiagnosticLocation::Annotation {
            uri: annotation.source_document_uri.clone(),
            target: annotation.target.clone(),
            term: annotation.term.clone(),
            qualifier: annotation.qualifier.clone(),
            range: annotation.top.range(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Identifier of the rule that raised the diagnostic
    pub rule: String,
    pub message: String,
    pub severity: Severity,
    pub location: DiagnosticLocation,
}

impl Diagnostic {
    pub fn new(
        rule: impl Into<String>,
        message: impl Into<String>,
        severity: Severity,
        location: DiagnosticLocation,
    ) -> Self {
        Self {
            rule: rule.into(),
            message: message.into(),
            severity,
            location,
        }
    }

    /// Zero-based line and column of the start of the location in `document`
    pub fn position(&self, document: &Document) -> (usize, usize) {
        document.line_col(self.location.range().start)
    }
}

/// Default message for an orphan configuration entry
pub fn orphan_message(kind: NodeKind, key: &str) -> String {
    match kind {
        NodeKind::OrphanTable => format!("Configuration '{}' does not match any table", key),
        _ => format!("Configuration '{}' does not match any section", key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document_store::DocumentKind;

    fn manifest(text: &str) -> Document {
        Document::new(
            Url::parse("file:///app/webapp/manifest.json").unwrap(),
            text.to_string(),
            DocumentKind::Manifest,
            1,
        )
    }

    #[test]
    fn test_manifest_location_falls_back_to_ancestor() {
        let document = manifest("{\n  \"sap.ui5\": {\n    \"flexEnabled\": false\n  }\n}");
        let path: Vec<String> = vec!["sap.ui5".into(), "flexEnabled".into()];
        let location = DiagnosticLocation::manifest_path(&document, &path).unwrap();
        let range = location.range();
        assert_eq!(&document.text[range.start..range.end], "\"flexEnabled\": false");

        let missing: Vec<String> = vec!["sap.ui5".into(), "routing".into()];
        let location = DiagnosticLocation::manifest_path(&document, &missing).unwrap();
        assert!(document.text[location.range().start..].starts_with("\"sap.ui5\""));

        let diagnostic = Diagnostic::new("flex", "flex is off", Severity::Warning, location);
        assert_eq!(diagnostic.position(&document), (1, 2));
        assert_eq!(diagnostic.location.uri(), &document.uri);
    }

    #[test]
    fn test_orphan_message() {
        assert!(orphan_message(NodeKind::OrphanTable, "k").contains("table"));
        assert!(orphan_message(NodeKind::OrphanSection, "k").contains("section"));
    }
}
