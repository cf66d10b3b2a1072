//
// lib.rs
//
// Static analysis core for UI5 applications: manifests, OData metadata and
// annotation files parsed into a linked page model, plus exact text edits
//

pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod document_store;
pub mod edit;
pub mod error;
pub mod linker;
pub mod parser_pool;
pub mod perf;
pub mod project;
pub mod service;
pub mod syntax;
// test_utils is available in test builds and when the `test-support` feature is enabled.
// This allows the CLI tests and integration tests to share the same fixtures.
#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
