//! Integration tests for the parse and reparse pipeline.
//!
//! These tests drive the store, the application parser and the linker
//! together, on in-memory stores and on generated on-disk projects.
//!
//! Run with: `cargo test -p fioricheck --test project_pipeline`

use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

use fioricheck::cli::analysis_stats::load_project;
use fioricheck::config::AnalysisConfig;
use fioricheck::document_store::DocumentStore;
use fioricheck::linker::Linker;
use fioricheck::project::{
    ApplicationParser, DiscoveredApp, ModelProvider, ParsedApplication, ParsedProject, ServiceConfig,
    ServiceSource,
};
use fioricheck::service::annotations::{collection_records, property_value, string_value};
use fioricheck::service::{ServiceArtifacts, UI_LINE_ITEM};
use fioricheck::test_utils::fixture_project::{create_fixture_project, FixtureConfig};
use fioricheck::test_utils::fixtures;
use url::Url;

// ============================================================================
// Test Helpers
// ============================================================================

fn app_url(app: &str, path: &str) -> Url {
    fixtures::url(&format!("file:///ws/{}/{}", app, path))
}

fn manifest_uri(app: &str) -> Url {
    app_url(app, "webapp/manifest.json")
}

fn metadata_uri(app: &str) -> Url {
    app_url(app, "webapp/localService/metadata.xml")
}

fn annotation_uri(app: &str) -> Url {
    app_url(app, "webapp/annotations/annotation.xml")
}

fn discovered(app: &str) -> DiscoveredApp {
    DiscoveredApp::new(manifest_uri(app), app_url(app, ""), app_url(app, ""))
}

/// Store a V4 travel application under `/ws/{app}/`
fn store_app(store: &mut DocumentStore, app: &str, label: &str) {
    store.insert(manifest_uri(app), fixtures::v4_manifest("TravelList", "/Travel"));
    store.insert(metadata_uri(app), fixtures::TRAVEL_METADATA);
    store.insert(annotation_uri(app), fixtures::travel_annotations(label));
}

fn app<'a>(project: &'a ParsedProject, name: &str) -> &'a Arc<ParsedApplication> {
    project.apps.get(&app_url(name, "")).expect("application parsed")
}

/// Label of the first travel line item column
fn line_item_label(app: &ParsedApplication) -> Option<String> {
    let service = app.main_service()?;
    let annotation = service
        .index
        .annotation("sap.fe.travel.Travel", UI_LINE_ITEM, None)?;
    let records = collection_records(annotation.element());
    let label = property_value(records.first()?, "Label")?;
    string_value(label).map(str::to_string)
}

// ============================================================================
// Full parse
// ============================================================================

#[test]
fn test_one_bad_app_does_not_affect_others() {
    let mut store = DocumentStore::new();
    store_app(&mut store, "good", "Good");
    store_app(&mut store, "broken", "Broken");
    store.insert(manifest_uri("broken"), "{ \"sap.app\": ");
    store_app(&mut store, "badmeta", "BadMeta");
    store.insert(metadata_uri("badmeta"), "<edmx:Edmx><EntityContainer");

    let mut parser = ApplicationParser::default();
    let project = parser.parse(
        &[discovered("good"), discovered("broken"), discovered("badmeta")],
        &store,
    );

    assert_eq!(project.apps.len(), 2);
    assert!(project.apps.get(&app_url("broken", "")).is_none());
    assert!(app(&project, "good").main_service().is_some());
    assert_eq!(line_item_label(app(&project, "good")).as_deref(), Some("Good"));

    // The app survives without the service whose metadata is malformed
    let badmeta = app(&project, "badmeta");
    assert!(badmeta.services.is_empty());
    let linked = Linker::default().link(badmeta);
    assert!(linked.pages().is_empty());
}

#[test]
fn test_project_documents_are_shared_snapshots() {
    let mut store = DocumentStore::new();
    store_app(&mut store, "a", "A");
    let project = ApplicationParser::default().parse(&[discovered("a")], &store);
    let stored = store.get(&metadata_uri("a")).unwrap();
    assert!(Arc::ptr_eq(&project.documents[&metadata_uri("a")], &stored));
}

// ============================================================================
// Reparse
// ============================================================================

#[test]
fn test_annotation_change_rebuilds_only_its_app() {
    let mut store = DocumentStore::new();
    store_app(&mut store, "a", "A");
    store_app(&mut store, "b", "B");
    let mut parser = ApplicationParser::default();
    let previous = parser.parse(&[discovered("a"), discovered("b")], &store);

    store.insert(annotation_uri("a"), fixtures::travel_annotations("Changed"));
    let next = parser.reparse(&annotation_uri("a"), &previous, &store);

    assert!(Arc::ptr_eq(app(&next, "b"), app(&previous, "b")));
    assert!(!Arc::ptr_eq(app(&next, "a"), app(&previous, "a")));
    assert!(Arc::ptr_eq(
        &app(&next, "a").manifest_document,
        &app(&previous, "a").manifest_document
    ));
    assert_eq!(line_item_label(app(&next, "a")).as_deref(), Some("Changed"));
    assert_eq!(line_item_label(app(&previous, "a")).as_deref(), Some("A"));
}

#[test]
fn test_manifest_change_reuses_unchanged_services() {
    let mut store = DocumentStore::new();
    store_app(&mut store, "a", "A");
    let mut parser = ApplicationParser::default();
    let previous = parser.parse(&[discovered("a")], &store);

    store.insert(manifest_uri("a"), fixtures::v4_manifest("RenamedList", "/Travel"));
    let next = parser.reparse(&manifest_uri("a"), &previous, &store);

    let (before, after) = (app(&previous, "a"), app(&next, "a"));
    assert!(!Arc::ptr_eq(after, before));
    assert!(Arc::ptr_eq(
        after.main_service().unwrap(),
        before.main_service().unwrap()
    ));
    assert!(after.manifest.routing_targets.contains_key("RenamedList"));
    assert!(after.manifest_document.revision > before.manifest_document.revision);
}

#[test]
fn test_unrelated_change_keeps_every_app() {
    let mut store = DocumentStore::new();
    store_app(&mut store, "a", "A");
    let mut parser = ApplicationParser::default();
    let previous = parser.parse(&[discovered("a")], &store);

    let unrelated = app_url("a", "webapp/i18n/i18n.json");
    store.insert(unrelated.clone(), "{}");
    let next = parser.reparse(&unrelated, &previous, &store);
    assert!(Arc::ptr_eq(app(&next, "a"), app(&previous, "a")));
}

#[test]
fn test_fixed_metadata_recovers_service() {
    let mut store = DocumentStore::new();
    store_app(&mut store, "a", "A");
    store.insert(metadata_uri("a"), "<edmx:Edmx><EntityContainer");
    let mut parser = ApplicationParser::default();
    let previous = parser.parse(&[discovered("a")], &store);
    assert!(app(&previous, "a").services.is_empty());

    store.insert(metadata_uri("a"), fixtures::TRAVEL_METADATA);
    let next = parser.reparse(&metadata_uri("a"), &previous, &store);
    assert!(app(&next, "a").main_service().is_some());
    assert_eq!(Linker::default().link(app(&next, "a")).pages().len(), 2);
}

#[test]
fn test_broken_manifest_edit_drops_app() {
    let mut store = DocumentStore::new();
    store_app(&mut store, "a", "A");
    store_app(&mut store, "b", "B");
    let mut parser = ApplicationParser::default();
    let previous = parser.parse(&[discovered("a"), discovered("b")], &store);

    store.insert(manifest_uri("a"), "{");
    let next = parser.reparse(&manifest_uri("a"), &previous, &store);
    assert_eq!(next.apps.len(), 1);
    assert!(Arc::ptr_eq(app(&next, "b"), app(&previous, "b")));
    assert!(next.skipped.contains_key(&app_url("a", "")));
}

#[test]
fn test_fixed_manifest_recovers_skipped_app() {
    let mut store = DocumentStore::new();
    store_app(&mut store, "a", "A");
    store_app(&mut store, "b", "B");
    store.insert(manifest_uri("b"), "{");
    let discovered_apps = [discovered("a"), discovered("b")];
    let mut parser = ApplicationParser::default();
    let previous = parser.parse(&discovered_apps, &store);
    assert_eq!(previous.apps.len(), 1);
    assert_eq!(previous.skipped.len(), 1);

    store.insert(manifest_uri("b"), fixtures::v4_manifest("TravelList", "/Travel"));
    let next = parser.reparse(&manifest_uri("b"), &previous, &store);
    let full = ApplicationParser::default().parse(&discovered_apps, &store);

    assert_eq!(next.apps.len(), full.apps.len());
    assert!(next.skipped.is_empty());
    assert!(Arc::ptr_eq(app(&next, "a"), app(&previous, "a")));
    assert_eq!(line_item_label(app(&next, "b")).as_deref(), Some("B"));

    // Changes to other documents leave the skipped app alone
    let mut store = DocumentStore::new();
    store_app(&mut store, "a", "A");
    store_app(&mut store, "b", "B");
    store.insert(manifest_uri("b"), "{");
    let previous = parser.parse(&discovered_apps, &store);
    store.insert(annotation_uri("a"), fixtures::travel_annotations("Changed"));
    let next = parser.reparse(&annotation_uri("a"), &previous, &store);
    assert_eq!(next.skipped.len(), 1);
    assert_eq!(next.apps.len(), 1);
}

// ============================================================================
// Declarative models
// ============================================================================

/// Compiles every service of a project to the documents under `srv/gen/`
struct CompiledModel {
    calls: Rc<Cell<usize>>,
}

impl ModelProvider for CompiledModel {
    fn service_artifacts(
        &self,
        project_root: &Url,
        _service: &ServiceConfig,
        _store: &DocumentStore,
    ) -> Option<ServiceArtifacts> {
        self.calls.set(self.calls.get() + 1);
        Some(ServiceArtifacts {
            metadata_uri: Some(project_root.join("srv/gen/metadata.xml").ok()?),
            annotation_uris: vec![project_root.join("srv/gen/annotations.xml").ok()?],
            ..ServiceArtifacts::default()
        })
    }
}

/// Store a model-backed application under `/ws/{project}/app/`
fn store_cap_project(store: &mut DocumentStore, project: &str) -> DiscoveredApp {
    let root = fixtures::url(&format!("file:///ws/{}/", project));
    let app_root = root.join("app/").unwrap();
    let manifest = app_root.join("webapp/manifest.json").unwrap();
    store.insert(manifest.clone(), fixtures::cap_manifest());
    store.insert(root.join("srv/gen/metadata.xml").unwrap(), fixtures::TRAVEL_METADATA);
    store.insert(
        root.join("srv/gen/annotations.xml").unwrap(),
        fixtures::travel_annotations("Compiled"),
    );
    DiscoveredApp::new(manifest, root, app_root)
}

#[test]
fn test_model_change_rebuilds_only_its_project() {
    let mut store = DocumentStore::new();
    let first = store_cap_project(&mut store, "cap1");
    let second = store_cap_project(&mut store, "cap2");
    let calls = Rc::new(Cell::new(0));
    let mut parser = ApplicationParser::with_provider(
        AnalysisConfig::default(),
        Box::new(CompiledModel {
            calls: Rc::clone(&calls),
        }),
    );

    let previous = parser.parse(&[first.clone(), second.clone()], &store);
    assert_eq!(calls.get(), 2);
    let service = previous.apps[&first.app_root].main_service().expect("model service");
    assert_eq!(service.source, ServiceSource::Cap);
    assert_eq!(line_item_label(&previous.apps[&first.app_root]).as_deref(), Some("Compiled"));

    let schema = first.project_root.join("db/schema.cds").unwrap();
    store.insert(schema.clone(), "entity Travel {}");
    let next = parser.reparse(&schema, &previous, &store);

    assert_eq!(calls.get(), 3);
    assert!(!Arc::ptr_eq(&next.apps[&first.app_root], &previous.apps[&first.app_root]));
    assert!(Arc::ptr_eq(&next.apps[&second.app_root], &previous.apps[&second.app_root]));
    assert!(next.apps[&first.app_root].main_service().is_some());
}

// ============================================================================
// On-disk projects
// ============================================================================

#[test]
fn test_fixture_project_end_to_end() {
    let config = FixtureConfig::small();
    let dir = create_fixture_project(&config);
    let (apps, store) = load_project(dir.path()).expect("project loads");
    assert_eq!(apps.len(), config.total_apps());

    let project = ApplicationParser::default().parse(&apps, &store);
    assert_eq!(project.apps.len(), config.valid_apps());

    let model = Linker::default().link_project(&project);
    assert_eq!(model.apps.len(), config.valid_apps());
    assert!(model.inconsistent_apps.is_empty());
    let v4 = model.apps.values().filter(|app| app.is_v4()).count();
    assert_eq!(v4, config.v4_apps);
    for linked in model.apps.values() {
        assert_eq!(linked.pages().len(), 2);
    }
}
