//
// linker/mod.rs
//
// Linker: page, table and section model of parsed applications
//

pub mod context_path;
pub mod facets;
pub mod model;
pub mod settings;
pub mod v2;
pub mod v4;

use crate::config::AnalysisConfig;
use crate::perf::TimingGuard;
use crate::project::{ParsedApplication, ParsedProject};
use crate::service::UI_LINE_ITEM;

pub use model::{
    ComponentKind, ConfigLevel, LinkedAppData, LinkedApplication, LinkedModel, LinkedNode,
    LinkedPage, LinkedSection, LinkedTable, NodeKind, OrphanNode, ResolvedSetting,
};

/// Orphan kind of a configuration entry for `term`
pub(crate) fn orphan_kind(term: &str) -> NodeKind {
    if term == UI_LINE_ITEM {
        NodeKind::OrphanTable
    } else {
        NodeKind::OrphanSection
    }
}

/// Outcome of running both linking strategies on one application
#[derive(Debug)]
struct Linked {
    application: LinkedApplication,
    inconsistent: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Linker {
    config: AnalysisConfig,
}

impl Linker {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Link one application.
    ///
    /// Both templating styles are tried. When both find pages the application
    /// is linked without pages; use [`link_project`](Self::link_project) to
    /// learn which applications were affected.
    pub fn link(&self, app: &ParsedApplication) -> LinkedApplication {
        self.link_checked(app).application
    }

    /// Link every application of a project
    pub fn link_project(&self, project: &ParsedProject) -> LinkedModel {
        let _guard = TimingGuard::new("link_project");
        let mut model = LinkedModel::default();
        for (root, app) in &project.apps {
            let linked = self.link_checked(app);
            if linked.inconsistent {
                model.inconsistent_apps.push(root.clone());
            }
            model.apps.insert(root.clone(), linked.application);
        }
        log::debug!(
            "Linked {} applications ({} inconsistent)",
            model.apps.len(),
            model.inconsistent_apps.len()
        );
        model
    }

    fn link_checked(&self, app: &ParsedApplication) -> Linked {
        let Some(manifest) = app.manifest_document.json() else {
            log::warn!("Manifest of {} has no tree; linking without pages", app.app_root);
            return Linked {
                application: LinkedApplication::V4(LinkedAppData::default()),
                inconsistent: false,
            };
        };

        let v2_pages = v2::link_pages(app, manifest, &self.config);
        let v4_pages = v4::link_pages(app, manifest, &self.config);
        let data = |pages: Vec<LinkedPage>, is_v4: bool| LinkedAppData {
            pages,
            configuration: settings::app_settings(manifest, is_v4),
        };

        match (v2_pages.is_empty(), v4_pages.is_empty()) {
            (false, false) => {
                log::warn!(
                    "Application {} configures pages in both template styles",
                    app.app_root
                );
                let is_v4 = !app.manifest.generic_app;
                let empty = data(Vec::new(), is_v4);
                Linked {
                    application: if is_v4 {
                        LinkedApplication::V4(empty)
                    } else {
                        LinkedApplication::V2(empty)
                    },
                    inconsistent: true,
                }
            }
            (false, true) => Linked {
                application: LinkedApplication::V2(data(v2_pages, false)),
                inconsistent: false,
            },
            (true, false) => Linked {
                application: LinkedApplication::V4(data(v4_pages, true)),
                inconsistent: false,
            },
            (true, true) => Linked {
                application: if app.manifest.generic_app {
                    LinkedApplication::V2(data(Vec::new(), false))
                } else {
                    LinkedApplication::V4(data(Vec::new(), true))
                },
                inconsistent: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fixtures;

    #[test]
    fn test_v4_app_links_v4() {
        let app = fixtures::parsed_v4_app(&fixtures::v4_manifest("TravelList", "/Travel"));
        let linked = Linker::default().link(&app);
        assert!(linked.is_v4());
        assert_eq!(linked.pages().len(), 2);
        assert_eq!(
            linked.data().configuration["flexEnabled"].resolved,
            serde_json::Value::Bool(true)
        );
    }

    #[test]
    fn test_v2_app_links_v2() {
        let app = fixtures::parsed_v2_app(&fixtures::v2_manifest(false));
        let linked = Linker::default().link(&app);
        assert!(!linked.is_v4());
        assert_eq!(linked.pages().len(), 2);
    }

    #[test]
    fn test_orphan_kind() {
        assert_eq!(orphan_kind(UI_LINE_ITEM), NodeKind::OrphanTable);
        assert_eq!(orphan_kind("com.sap.vocabularies.UI.v1.Chart"), NodeKind::OrphanSection);
    }
}
