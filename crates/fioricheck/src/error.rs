//
// error.rs
//
// Error type for internal fallible steps of the analysis pipeline
//

use thiserror::Error;
use url::Url;

/// Failures raised while parsing or indexing a single unit of work.
///
/// These never escape the public entry points: the parser, indexer and linker
/// log them and drop the affected application or service instead.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("malformed JSON at byte {offset}: {message}")]
    MalformedJson { offset: usize, message: String },

    #[error("malformed XML: {message}")]
    MalformedXml { message: String },

    #[error("document not found in store: {0}")]
    MissingDocument(Url),

    #[error("document {uri} is not a {expected} document")]
    UnexpectedDocumentKind { uri: Url, expected: &'static str },

    #[error("invalid manifest {uri}: {message}")]
    InvalidManifest { uri: Url, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let uri = Url::parse("file:///app/webapp/manifest.json").unwrap();
        let err = AnalysisError::InvalidManifest {
            uri: uri.clone(),
            message: "missing sap.app".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid manifest file:///app/webapp/manifest.json: missing sap.app"
        );
        assert_eq!(
            AnalysisError::MissingDocument(uri).to_string(),
            "document not found in store: file:///app/webapp/manifest.json"
        );
    }
}
