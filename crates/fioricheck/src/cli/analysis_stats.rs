// cli/analysis_stats.rs: `fioricheck analysis-stats` subcommand
//
// Loads every application under a directory and reports timing metrics for
// each analysis phase.
//
// Phases measured:
//   1. scan: discovering manifests and loading application documents
//   2. parse: deriving applications and their service indexes
//   3. index: rebuilding every service index from its artifacts
//   4. link: linking pages, tables and sections

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context};
use url::Url;
use walkdir::{DirEntry, WalkDir};

use crate::config::AnalysisConfig;
use crate::document_store::DocumentStore;
use crate::linker::{LinkedModel, Linker};
use crate::perf::{PerfMetrics, TimingGuard};
use crate::project::{ApplicationParser, DiscoveredApp, ParsedProject};
use crate::service::{build_service_index, AliasCache};

/// Parsed arguments for the `analysis-stats` subcommand.
#[derive(Debug)]
pub struct AnalysisStatsArgs {
    pub path: PathBuf,
    pub csv: bool,
    pub only: Option<String>,
}

/// Result of running a single analysis phase.
pub struct PhaseResult {
    pub name: String,
    pub duration: Duration,
    pub peak_rss_bytes: Option<u64>,
    pub detail: String,
}

/// All valid phase names.
const VALID_PHASES: &[&str] = &["scan", "parse", "index", "link"];

/// File extensions loaded into the store
const LOADED_EXTENSIONS: &[&str] = &["json", "xml", "edmx", "cds"];

/// Parse `analysis-stats` arguments from the remaining CLI args.
///
/// Expected usage: `fioricheck analysis-stats <path> [--csv] [--only <phase>]`
pub fn parse_args(args: &mut impl Iterator<Item = String>) -> Result<AnalysisStatsArgs, String> {
    let mut path: Option<PathBuf> = None;
    let mut csv = false;
    let mut only: Option<String> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--csv" => csv = true,
            "--only" => {
                let phase = args
                    .next()
                    .ok_or_else(|| "--only requires a phase name".to_string())?;
                if !VALID_PHASES.contains(&phase.as_str()) {
                    return Err(format!(
                        "Unknown phase '{}'. Valid phases: {}",
                        phase,
                        VALID_PHASES.join(", ")
                    ));
                }
                only = Some(phase);
            }
            other if other.starts_with('-') => {
                return Err(format!("Unknown flag: '{}'", other));
            }
            _ => {
                if path.is_some() {
                    return Err("Multiple paths provided; expected exactly one".to_string());
                }
                path = Some(PathBuf::from(arg));
            }
        }
    }

    let path = path.ok_or_else(|| "Missing required <path> argument".to_string())?;
    if !path.is_dir() {
        return Err(format!("Path is not a directory: {}", path.display()));
    }

    Ok(AnalysisStatsArgs { path, csv, only })
}

/// Run the analysis-stats command and return phase results.
///
/// Phases excluded by `--only` still run when a later phase needs their
/// output; they are just not reported.
pub fn run_analysis_stats(args: &AnalysisStatsArgs) -> anyhow::Result<Vec<PhaseResult>> {
    let mut results = Vec::new();
    let mut metrics = PerfMetrics::new();
    let config = AnalysisConfig::default();

    let should_run = |phase: &str| -> bool { args.only.as_ref().map_or(true, |only| only == phase) };
    let needed = |phase: &str| -> bool {
        let position = |name: &str| VALID_PHASES.iter().position(|p| *p == name);
        match args.only.as_deref() {
            None => true,
            Some(only) => position(phase) <= position(only),
        }
    };

    // Phase 1: Scan, discover manifests and load documents
    let start = Instant::now();
    let (apps, store) = {
        let _guard = TimingGuard::new("analysis-stats:scan");
        load_project(&args.path)?
    };
    let duration = start.elapsed();
    metrics.scan_duration = Some(duration);
    metrics.documents_loaded = store.len();
    if should_run("scan") {
        results.push(PhaseResult {
            name: "scan".to_string(),
            duration,
            peak_rss_bytes: crate::perf::peak_rss_bytes(),
            detail: format!("{} applications, {} documents", apps.len(), store.len()),
        });
    }

    if !needed("parse") {
        return Ok(results);
    }

    // Phase 2: Parse, applications, services and their indexes
    let mut parser = ApplicationParser::new(config.clone());
    let start = Instant::now();
    let project = {
        let _guard = TimingGuard::new("analysis-stats:parse");
        parser.parse(&apps, &store)
    };
    let duration = start.elapsed();
    metrics.parse_duration = Some(duration);
    metrics.apps_parsed = project.apps.len();
    if should_run("parse") {
        let services: usize = project.apps.values().map(|app| app.services.len()).sum();
        results.push(PhaseResult {
            name: "parse".to_string(),
            duration,
            peak_rss_bytes: crate::perf::peak_rss_bytes(),
            detail: format!(
                "{} of {} applications parsed, {} services",
                project.apps.len(),
                apps.len(),
                services
            ),
        });
    }

    // Phase 3: Index, service indexes on their own, with a cold alias cache
    if should_run("index") {
        let start = Instant::now();
        let (services, annotations) = {
            let _guard = TimingGuard::new("analysis-stats:index");
            reindex(&project, &config)
        };
        let duration = start.elapsed();
        metrics.index_duration = Some(duration);
        results.push(PhaseResult {
            name: "index".to_string(),
            duration,
            peak_rss_bytes: crate::perf::peak_rss_bytes(),
            detail: format!("{} services, {} annotation entries", services, annotations),
        });
    }

    // Phase 4: Link, pages, tables, sections and orphans
    if should_run("link") {
        let linker = Linker::new(config);
        let start = Instant::now();
        let model = {
            let _guard = TimingGuard::new("analysis-stats:link");
            linker.link_project(&project)
        };
        let duration = start.elapsed();
        metrics.link_duration = Some(duration);
        results.push(PhaseResult {
            name: "link".to_string(),
            duration,
            peak_rss_bytes: crate::perf::peak_rss_bytes(),
            detail: link_detail(&model),
        });
    }

    metrics.log_summary();
    Ok(results)
}

fn reindex(project: &ParsedProject, config: &AnalysisConfig) -> (usize, usize) {
    let alias_cache = AliasCache::with_capacity(config.alias_cache_capacity);
    let mut services = 0usize;
    let mut annotations = 0usize;
    for service in project.apps.values().flat_map(|app| app.services.values()) {
        let index = build_service_index(&service.artifacts, config, &alias_cache);
        annotations += index.annotations.len();
        services += 1;
    }
    (services, annotations)
}

fn link_detail(model: &LinkedModel) -> String {
    let pages: Vec<_> = model.apps.values().flat_map(|app| app.pages()).collect();
    let tables: usize = pages.iter().map(|page| page.tables().count()).sum();
    let sections: usize = pages.iter().map(|page| page.sections().count()).sum();
    let orphans: usize = pages.iter().map(|page| page.orphans().count()).sum();
    format!(
        "{} pages, {} tables, {} sections, {} orphans, {} inconsistent applications",
        pages.len(),
        tables,
        sections,
        orphans,
        model.inconsistent_apps.len()
    )
}

/// Print phase results in human-readable format.
pub fn print_results(results: &[PhaseResult]) {
    println!("=== fioricheck Analysis Stats ===\n");
    for result in results {
        let rss_str = match result.peak_rss_bytes {
            Some(bytes) => format_bytes(bytes),
            None => "N/A".to_string(),
        };
        println!(
            "  {:<12} {:>10.2?}   RSS: {:<10}  ({})",
            result.name, result.duration, rss_str, result.detail
        );
    }

    if results.len() > 1 {
        let total: Duration = results.iter().map(|r| r.duration).sum();
        println!("\n  {:<12} {:>10.2?}", "TOTAL", total);
    }
    println!();
}

/// Print phase results in CSV format.
pub fn print_results_csv(results: &[PhaseResult]) {
    println!("phase,duration_ms,peak_rss_bytes,detail");
    for result in results {
        let rss = result
            .peak_rss_bytes
            .map_or(String::new(), |b| b.to_string());
        println!(
            "{},{:.3},{},\"{}\"",
            result.name,
            result.duration.as_secs_f64() * 1000.0,
            rss,
            result.detail.replace('"', "\"\"")
        );
    }
}

// ============================================================================
// Discovery
// ============================================================================

/// Discover applications under `root` and load their documents into a store.
///
/// An application is a directory holding `manifest.json`; when that directory
/// is named `webapp` the application root is its parent. The project root of
/// an application is the nearest ancestor (up to `root`) with a
/// `package.json`, else the application root.
pub fn load_project(root: &Path) -> anyhow::Result<(Vec<DiscoveredApp>, DocumentStore)> {
    let root = root
        .canonicalize()
        .with_context(|| format!("Cannot resolve {}", root.display()))?;

    let mut apps = Vec::new();
    let mut store = DocumentStore::new();
    for manifest in discover_manifests(&root) {
        let Some(webapp) = manifest.parent() else {
            continue;
        };
        let app_root = if webapp.file_name().is_some_and(|name| name == "webapp") {
            webapp.parent().unwrap_or(webapp)
        } else {
            webapp
        };
        let project_root = app_root
            .ancestors()
            .take_while(|dir| dir.starts_with(&root))
            .find(|dir| dir.join("package.json").is_file())
            .unwrap_or(app_root);

        for path in discover_documents(webapp) {
            match std::fs::read_to_string(&path) {
                Ok(text) => {
                    store.insert(file_url(&path)?, text);
                }
                Err(err) => log::warn!("Cannot read {}: {}", path.display(), err),
            }
        }
        apps.push(DiscoveredApp::new(
            file_url(&manifest)?,
            directory_url(project_root)?,
            directory_url(app_root)?,
        ));
    }
    log::debug!(
        "Discovered {} applications with {} documents under {}",
        apps.len(),
        store.len(),
        root.display()
    );
    Ok((apps, store))
}

/// Every `manifest.json` under `root`, sorted for deterministic ordering
fn discover_manifests(root: &Path) -> Vec<PathBuf> {
    let mut manifests: Vec<PathBuf> = walk(root)
        .filter(|entry| entry.file_type().is_file() && entry.file_name() == "manifest.json")
        .map(DirEntry::into_path)
        .collect();
    manifests.sort();
    manifests
}

/// Loadable documents of one application directory
fn discover_documents(dir: &Path) -> Vec<PathBuf> {
    let mut documents: Vec<PathBuf> = walk(dir)
        .filter(|entry| entry.file_type().is_file())
        .map(DirEntry::into_path)
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| LOADED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        })
        .collect();
    documents.sort();
    documents
}

fn walk(root: &Path) -> impl Iterator<Item = DirEntry> {
    WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !should_skip_entry(entry))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                log::debug!("Skipping unreadable entry: {}", err);
                None
            }
        })
}

fn should_skip_entry(entry: &DirEntry) -> bool {
    entry.file_type().is_dir() && entry.file_name().to_str().map_or(false, should_skip_directory)
}

/// Directories to skip during project scanning
fn should_skip_directory(name: &str) -> bool {
    name.starts_with('.') || matches!(name, "node_modules" | "dist" | "target")
}

fn file_url(path: &Path) -> anyhow::Result<Url> {
    Url::from_file_path(path).map_err(|_| anyhow!("Not an absolute path: {}", path.display()))
}

fn directory_url(path: &Path) -> anyhow::Result<Url> {
    Url::from_directory_path(path).map_err(|_| anyhow!("Not an absolute path: {}", path.display()))
}

/// Format a byte count as a human-readable string (e.g., "12.3 MB").
fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    const GB: u64 = 1024 * MB;
    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
