//! Catalog synchronization engine.
//!
//! Reconciles locally enriched products against the remote Shopify catalog:
//! builds the desired remote representation, diffs it against the last pushed
//! snapshot, and issues the create/update/image/collection calls needed to
//! converge. Local-to-remote ids are kept in a durable [`IdentityStore`].

pub mod builder;
pub mod collections;
pub mod diff;
pub mod error;
pub mod mapping;
pub mod orchestrator;
mod properties;
pub mod remote;
pub mod snapshot;
pub mod source;
pub mod summary;

pub use builder::{build_desired, BuilderOptions};
pub use diff::{diff, DiffOutcome};
pub use error::{AssetError, FailureKind, SourceError, SyncError};
pub use mapping::{lookup_id, FileIdentityStore, FlushJob, IdentityStore, MemoryIdentityStore};
pub use orchestrator::{CatalogSync, ProductJob, SyncAction, SyncOptions};
pub use remote::RemoteCatalog;
pub use snapshot::{FileSnapshotStore, MemorySnapshotStore, Snapshot, SnapshotStore};
pub use source::{
    AssetFetcher, CatalogSource, EnrichmentDirSource, FsAssetFetcher, HttpAssetFetcher,
    MemorySource,
};
pub use summary::{FailedImage, FailedProduct, ProductOutcome, RunSummary};
