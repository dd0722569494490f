use std::path::PathBuf;

use pim_core::ProductError;
use pim_shopify::ShopifyError;
use thiserror::Error;

/// Coarse failure category recorded against a product in the run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    TransportFailure,
    RemoteRejection,
    MalformedResponse,
    AssetUnavailable,
    MappingCorruption,
    InvalidDescriptor,
    MissingRemoteId,
    LocalIo,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            FailureKind::TransportFailure => "transport_failure",
            FailureKind::RemoteRejection => "remote_rejection",
            FailureKind::MalformedResponse => "malformed_response",
            FailureKind::AssetUnavailable => "asset_unavailable",
            FailureKind::MappingCorruption => "mapping_corruption",
            FailureKind::InvalidDescriptor => "invalid_descriptor",
            FailureKind::MissingRemoteId => "missing_remote_id",
            FailureKind::LocalIo => "local_io",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Remote(#[from] ShopifyError),

    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error("persisted state at {path} is unreadable: {reason}")]
    MappingCorruption { path: PathBuf, reason: String },

    #[error("invalid product descriptor {context}: {reason}")]
    InvalidDescriptor { context: String, reason: String },

    #[error("no remote id known for product {code}; snapshot exists but mapping is missing")]
    MissingRemoteId { code: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error for {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("background write did not complete: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl SyncError {
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            SyncError::Remote(ShopifyError::Transport(_) | ShopifyError::InvalidBaseUrl { .. }) => {
                FailureKind::TransportFailure
            }
            SyncError::Remote(ShopifyError::Rejected { .. }) => FailureKind::RemoteRejection,
            SyncError::Remote(
                ShopifyError::Deserialize { .. } | ShopifyError::MalformedResponse { .. },
            ) => FailureKind::MalformedResponse,
            SyncError::Asset(_) => FailureKind::AssetUnavailable,
            SyncError::MappingCorruption { .. } => FailureKind::MappingCorruption,
            SyncError::InvalidDescriptor { .. } => FailureKind::InvalidDescriptor,
            SyncError::MissingRemoteId { .. } => FailureKind::MissingRemoteId,
            SyncError::Io { .. } | SyncError::Json { .. } | SyncError::Join(_) => {
                FailureKind::LocalIo
            }
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SyncError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failure to obtain the bytes behind an image reference.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("asset {reference} not found at {path}")]
    NotFound { reference: String, path: PathBuf },

    #[error("asset {reference} could not be read: {source}")]
    Io {
        reference: String,
        #[source]
        source: std::io::Error,
    },

    #[error("asset {reference} download failed: {source}")]
    Http {
        reference: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("asset {reference} download returned HTTP {status}")]
    UnexpectedStatus { reference: String, status: u16 },

    #[error("invalid asset reference {reference}: {reason}")]
    InvalidReference { reference: String, reason: String },
}

/// Failure to produce one product descriptor from the catalog source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{path} is not a valid product: {source}")]
    Invalid {
        path: PathBuf,
        #[source]
        source: ProductError,
    },
}

impl SourceError {
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            SourceError::Io { .. } => FailureKind::LocalIo,
            SourceError::Parse { .. } | SourceError::Invalid { .. } => {
                FailureKind::InvalidDescriptor
            }
        }
    }

    /// Label under which the failure is reported when no product code could
    /// be read: the file stem of the offending descriptor.
    #[must_use]
    pub fn label(&self) -> String {
        let path = match self {
            SourceError::Io { path, .. }
            | SourceError::Parse { path, .. }
            | SourceError::Invalid { path, .. } => path,
        };
        path.file_stem().map_or_else(
            || path.display().to_string(),
            |stem| stem.to_string_lossy().into_owned(),
        )
    }
}
