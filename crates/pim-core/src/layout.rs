//! On-disk layout of the working directory shared with the enrichment step.
//!
//! ```text
//! <root>/enrichment/<Source>/*.json          enriched product descriptors
//! <root>/assets/<Source>/...                 downloaded image assets
//! <root>/export/Shopify/collection.properties    default collection per source
//! <root>/export/Shopify/<Source>/            snapshots + identity mappings
//! ```

use std::path::{Path, PathBuf};

const EXPORT_TARGET: &str = "Shopify";

#[derive(Debug, Clone)]
pub struct WorkspaceLayout {
    root: PathBuf,
}

impl WorkspaceLayout {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn enrichment_dir(&self, source: &str) -> PathBuf {
        self.root.join("enrichment").join(source)
    }

    #[must_use]
    pub fn assets_dir(&self, source: &str) -> PathBuf {
        self.root.join("assets").join(source)
    }

    #[must_use]
    pub fn export_root(&self) -> PathBuf {
        self.root.join("export").join(EXPORT_TARGET)
    }

    /// Directory holding snapshots and mapping files for one source.
    #[must_use]
    pub fn export_dir(&self, source: &str) -> PathBuf {
        self.export_root().join(source)
    }

    #[must_use]
    pub fn product_mapping_file(&self, source: &str) -> PathBuf {
        self.export_dir(source).join("product-mapping.properties")
    }

    #[must_use]
    pub fn collection_mapping_file(&self, source: &str) -> PathBuf {
        self.export_dir(source).join("collection.properties")
    }

    /// Shared file keyed by source name whose value is that source's default
    /// collection id.
    #[must_use]
    pub fn default_collection_file(&self) -> PathBuf {
        self.export_root().join("collection.properties")
    }
}
