//
// config.rs
//
// Configuration for the analysis pipeline
//

/// Analysis configuration shared by the parser, indexer, linker and edit engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisConfig {
    /// Maximum number of per-document alias tables kept in the LRU cache
    pub alias_cache_capacity: usize,
    /// Indent width used by the edit engine when a document has no indented lines
    pub default_indent: usize,
    /// Whether annotations written inline in the metadata document take part
    /// in layering (as the lowest-priority source)
    pub include_metadata_annotations: bool,
    /// Maximum number of navigation segments followed when resolving context paths
    pub max_navigation_depth: usize,
}

impl Default for AnalysisConfig {
    /// Creates an AnalysisConfig with the defaults used by hosts that do not
    /// override anything.
    ///
    /// # Examples
    ///
    /// ```
    /// use fioricheck::config::AnalysisConfig;
    ///
    /// let cfg = AnalysisConfig::default();
    /// assert_eq!(cfg.default_indent, 4);
    /// assert!(cfg.include_metadata_annotations);
    /// ```
    fn default() -> Self {
        Self {
            alias_cache_capacity: 256,
            default_indent: 4,
            include_metadata_annotations: true,
            max_navigation_depth: 16,
        }
    }
}

impl AnalysisConfig {
    /// Check if a config change invalidates previously built service indexes
    pub fn index_settings_changed(&self, other: &Self) -> bool {
        self.include_metadata_annotations != other.include_metadata_annotations
    }

    /// Check if a config change invalidates previously linked applications
    pub fn link_settings_changed(&self, other: &Self) -> bool {
        self.index_settings_changed(other) || self.max_navigation_depth != other.max_navigation_depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = AnalysisConfig::default();
        assert_eq!(config.alias_cache_capacity, 256);
        assert_eq!(config.default_indent, 4);
        assert!(config.include_metadata_annotations);
        assert_eq!(config.max_navigation_depth, 16);
    }

    #[test]
    fn test_index_settings_changed() {
        let config1 = AnalysisConfig::default();
        let mut config2 = AnalysisConfig::default();
        assert!(!config1.index_settings_changed(&config2));

        config2.include_metadata_annotations = false;
        assert!(config1.index_settings_changed(&config2));
        assert!(config1.link_settings_changed(&config2));
    }

    #[test]
    fn test_non_index_settings_not_changed() {
        let config1 = AnalysisConfig::default();
        let mut config2 = AnalysisConfig::default();

        config2.default_indent = 2;
        config2.alias_cache_capacity = 8;
        assert!(!config1.index_settings_changed(&config2));
        assert!(!config1.link_settings_changed(&config2));

        config2.max_navigation_depth = 3;
        assert!(!config1.index_settings_changed(&config2));
        assert!(config1.link_settings_changed(&config2));
    }
}
