//! Deterministic on-disk fixture projects for the CLI and integration tests.
//!
//! Generates a directory tree with a configurable number of applications in
//! both template styles, each with a manifest, a local metadata copy and a
//! local annotation file. Broken applications get a manifest that does not
//! parse. A decoy application under `node_modules/` is always written so that
//! discovery filters can be checked.
//!
//! All output is deterministic so timings are comparable between runs.

use std::path::Path;

use tempfile::TempDir;

use super::fixtures;

/// Configuration for generating a fixture project.
#[derive(Debug, Clone)]
pub struct FixtureConfig {
    pub v4_apps: usize,
    pub v2_apps: usize,
    /// Applications whose manifest is malformed
    pub broken_apps: usize,
}

impl FixtureConfig {
    /// Small project: 2 V4 apps, 1 V2 app, 1 broken app.
    pub fn small() -> Self {
        Self {
            v4_apps: 2,
            v2_apps: 1,
            broken_apps: 1,
        }
    }

    /// Medium project: 20 V4 apps, 10 V2 apps, 2 broken apps.
    pub fn medium() -> Self {
        Self {
            v4_apps: 20,
            v2_apps: 10,
            broken_apps: 2,
        }
    }

    /// Large project: 100 V4 apps, 50 V2 apps, 5 broken apps.
    pub fn large() -> Self {
        Self {
            v4_apps: 100,
            v2_apps: 50,
            broken_apps: 5,
        }
    }

    /// Number of applications with a parseable manifest
    pub fn valid_apps(&self) -> usize {
        self.v4_apps + self.v2_apps
    }

    /// Number of applications discovery should find
    pub fn total_apps(&self) -> usize {
        self.valid_apps() + self.broken_apps
    }
}

const BROKEN_MANIFEST: &str = "{\n    \"sap.app\": {\n        \"id\": \"broken\",\n";

/// Create a temporary fixture project from the given configuration.
///
/// The directory is cleaned up when the `TempDir` is dropped.
pub fn create_fixture_project(config: &FixtureConfig) -> TempDir {
    let temp_dir = TempDir::new().expect("Failed to create temp directory for fixture project");
    write_fixture_project(temp_dir.path(), config);
    temp_dir
}

/// Write fixture applications into an existing directory.
pub fn write_fixture_project(dir: &Path, config: &FixtureConfig) {
    for i in 0..config.v4_apps {
        write_app(
            &dir.join(format!("app_v4_{}", i)),
            &fixtures::v4_manifest(&format!("TravelList{}", i), "/Travel"),
            fixtures::TRAVEL_METADATA,
            &fixtures::travel_annotations(&format!("Travel {}", i)),
        );
    }
    for i in 0..config.v2_apps {
        write_app(
            &dir.join(format!("app_v2_{}", i)),
            &fixtures::v2_manifest(i % 2 == 1),
            fixtures::TRAVEL_METADATA_V2,
            fixtures::TRAVEL_ANNOTATIONS_V2,
        );
    }
    for i in 0..config.broken_apps {
        write_app(
            &dir.join(format!("app_broken_{}", i)),
            BROKEN_MANIFEST,
            fixtures::TRAVEL_METADATA,
            &fixtures::travel_annotations("Broken"),
        );
    }
    write_app(
        &dir.join("node_modules").join("ignored"),
        &fixtures::v4_manifest("Ignored", "/Travel"),
        fixtures::TRAVEL_METADATA,
        &fixtures::travel_annotations("Ignored"),
    );
}

fn write_app(app_dir: &Path, manifest: &str, metadata: &str, annotations: &str) {
    let webapp = app_dir.join("webapp");
    write_file(&webapp.join("manifest.json"), manifest);
    write_file(&webapp.join("localService").join("metadata.xml"), metadata);
    write_file(&webapp.join("annotations").join("annotation.xml"), annotations);
}

fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .unwrap_or_else(|e| panic!("Failed to create {}: {}", parent.display(), e));
    }
    std::fs::write(path, content)
        .unwrap_or_else(|e| panic!("Failed to write fixture file {}: {}", path.display(), e));
}
