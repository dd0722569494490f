use std::fmt;

use crate::error::FailureKind;
use crate::orchestrator::SyncAction;

/// What happened to one product during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductOutcome {
    Created {
        remote_id: u64,
        images_uploaded: usize,
        image_failures: Vec<FailedImage>,
        collection_warnings: usize,
    },
    Updated {
        remote_id: u64,
        /// The mapping was missing and the id came from the snapshot.
        recovered_id: bool,
    },
    /// Desired state matched the snapshot; no remote call was made.
    Unchanged { remote_id: Option<u64> },
    /// Dry run: the action that would have been taken.
    Planned { action: SyncAction },
    Failed { kind: FailureKind, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedProduct {
    pub code: String,
    pub kind: FailureKind,
    pub reason: String,
}

/// An image skipped during a create. The product itself still synced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedImage {
    pub code: String,
    pub reference: String,
    pub kind: FailureKind,
    pub reason: String,
}

/// Aggregate result of one run. Code lists follow source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub unchanged: Vec<String>,
    pub planned: Vec<(String, SyncAction)>,
    pub failed: Vec<FailedProduct>,
    pub images_uploaded: usize,
    pub image_failures: Vec<FailedImage>,
    pub collection_warnings: usize,
    /// Set when the final mapping flush failed. Remote state is already
    /// correct; the next run recovers ids from snapshots.
    pub persist_error: Option<String>,
}

impl RunSummary {
    pub fn record(&mut self, code: &str, outcome: ProductOutcome) {
        let code = code.to_owned();
        match outcome {
            ProductOutcome::Created {
                images_uploaded,
                image_failures,
                collection_warnings,
                ..
            } => {
                self.created.push(code);
                self.images_uploaded += images_uploaded;
                self.image_failures.extend(image_failures);
                self.collection_warnings += collection_warnings;
            }
            ProductOutcome::Updated { .. } => self.updated.push(code),
            ProductOutcome::Unchanged { .. } => self.unchanged.push(code),
            ProductOutcome::Planned { action } => self.planned.push((code, action)),
            ProductOutcome::Failed { kind, reason } => {
                self.failed.push(FailedProduct { code, kind, reason });
            }
        }
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.created.len()
            + self.updated.len()
            + self.unchanged.len()
            + self.planned.len()
            + self.failed.len()
    }

    /// True when no product failed and the mapping was flushed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.persist_error.is_none()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} products: {} created, {} updated, {} unchanged, {} failed",
            self.total(),
            self.created.len(),
            self.updated.len(),
            self.unchanged.len(),
            self.failed.len()
        )?;
        if !self.planned.is_empty() {
            write!(f, ", {} planned", self.planned.len())?;
        }
        write!(
            f,
            "; images {} uploaded, {} failed",
            self.images_uploaded,
            self.image_failures.len()
        )?;
        if self.collection_warnings > 0 {
            write!(f, "; {} collection warnings", self.collection_warnings)?;
        }
        if let Some(err) = &self.persist_error {
            write!(f, "; mapping not saved: {err}")?;
        }
        Ok(())
    }
}
