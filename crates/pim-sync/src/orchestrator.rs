//! The sync control loop.
//!
//! Per product: build desired state, diff against the last snapshot, then
//! create (followed by collection association and image upload) or update,
//! and finally persist the new snapshot. A failure is recorded against the
//! product and the batch continues.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use futures::stream::{self, StreamExt};
use pim_core::Product;
use pim_shopify::ProductEnvelope;
use serde_json::Value;

use crate::builder::{build_desired, BuilderOptions};
use crate::collections::{
    merge_collection_index, rebuild_collection_index, resolve_category_collection,
};
use crate::diff::{diff, DiffOutcome};
use crate::error::{FailureKind, SyncError};
use crate::mapping::IdentityStore;
use crate::remote::RemoteCatalog;
use crate::snapshot::SnapshotStore;
use crate::source::{AssetFetcher, CatalogSource};
use crate::summary::{FailedImage, ProductOutcome, RunSummary};

#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Source name, e.g. `MultiCraft`. Prefixes category collection keys.
    pub source_name: String,
    pub builder: BuilderOptions,
    /// Collection every newly created product is added to.
    pub default_collection_id: Option<u64>,
    /// Resolve each product's category path to a collection on create.
    pub associate_category_collections: bool,
    /// Products processed concurrently; values below 1 mean 1.
    pub max_concurrent: usize,
    /// Plan only: no remote call and no local write.
    pub dry_run: bool,
}

impl SyncOptions {
    #[must_use]
    pub fn new(source_name: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            builder: BuilderOptions::default(),
            default_collection_id: None,
            associate_category_collections: false,
            max_concurrent: 1,
            dry_run: false,
        }
    }
}

/// One product plus the hints its source supplied.
#[derive(Debug, Clone)]
pub struct ProductJob {
    pub product: Product,
    pub images: Vec<String>,
    pub category_paths: Vec<Vec<String>>,
}

/// Action the orchestrator would take for a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    Create,
    Update { remote_id: u64 },
    Skip,
}

struct Plan {
    action: SyncAction,
    known_id: Option<u64>,
    /// The id came from the snapshot file name, not the mapping store.
    recovered_id: bool,
    envelope: ProductEnvelope,
    body: Value,
}

/// Drives a catalog source into the remote catalog.
///
/// The identity store sits behind a mutex so concurrent products serialize
/// their mapping writes; the lock is never held across an `.await` or a
/// file write. Flushes are ordered by `flush_lock` and run on the blocking
/// pool.
pub struct CatalogSync<R, I, S, A> {
    remote: R,
    identity: Mutex<I>,
    flush_lock: tokio::sync::Mutex<()>,
    snapshots: S,
    assets: A,
    options: SyncOptions,
}

impl<R, I, S, A> CatalogSync<R, I, S, A>
where
    R: RemoteCatalog,
    I: IdentityStore,
    S: SnapshotStore,
    A: AssetFetcher,
{
    pub fn new(remote: R, identity: I, snapshots: S, assets: A, options: SyncOptions) -> Self {
        Self {
            remote,
            identity: Mutex::new(identity),
            flush_lock: tokio::sync::Mutex::new(()),
            snapshots,
            assets,
            options,
        }
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn snapshots(&self) -> &S {
        &self.snapshots
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    pub fn into_parts(self) -> (R, I, S, A) {
        let identity = self
            .identity
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        (self.remote, identity, self.snapshots, self.assets)
    }

    /// Runs `f` with exclusive access to the identity store.
    pub fn with_identity<T>(&self, f: impl FnOnce(&mut I) -> T) -> T {
        let mut guard = self.identity.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Writes unflushed identity entries without blocking the executor.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Io`] when a mapping file cannot be written.
    pub async fn flush_identity(&self) -> Result<(), SyncError> {
        let _ordered = self.flush_lock.lock().await;
        let Some(job) = self.with_identity(|ids| ids.flush_job()) else {
            return Ok(());
        };
        let job = tokio::task::spawn_blocking(move || job.write().map(|()| job)).await??;
        self.with_identity(|ids| ids.mark_flushed(&job));
        Ok(())
    }

    /// Decides what a sync of `product` would do, without any remote call.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidDescriptor`] for a product that fails
    /// validation and [`SyncError::MissingRemoteId`] when a snapshot exists
    /// but no id can be found for it.
    pub fn plan(&self, product: &Product) -> Result<SyncAction, SyncError> {
        self.prepare(product).map(|plan| plan.action)
    }

    /// Syncs every product `source` yields and returns the tally.
    ///
    /// Never fails as a whole: per-product failures land in
    /// [`RunSummary::failed`] and a failed final mapping flush in
    /// [`RunSummary::persist_error`].
    pub async fn run<C>(&self, source: &mut C) -> RunSummary
    where
        C: CatalogSource + ?Sized,
    {
        let mut summary = RunSummary::default();
        let dry_run = self.options.dry_run;

        if self.options.associate_category_collections && !dry_run {
            match rebuild_collection_index(&self.remote).await {
                Ok(index) => {
                    let added = self.with_identity(|ids| merge_collection_index(ids, &index));
                    tracing::info!(added, "collection mapping refreshed");
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "collection index rebuild failed, using existing mapping"
                    );
                }
            }
        }

        let mut jobs = Vec::new();
        let mut seen = HashSet::new();
        while let Some(item) = source.next_product() {
            match item {
                Ok(product) => {
                    if !seen.insert(product.code.clone()) {
                        tracing::warn!(code = %product.code, "duplicate product code in source");
                        summary.record(
                            &product.code,
                            ProductOutcome::Failed {
                                kind: FailureKind::InvalidDescriptor,
                                reason: "duplicate product code in source".to_string(),
                            },
                        );
                        continue;
                    }
                    let images = source.asset_paths(&product.code);
                    let category_paths = source.collection_paths(&product.code);
                    jobs.push(ProductJob {
                        product,
                        images,
                        category_paths,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        descriptor = %e.label(),
                        error = %e,
                        "skipping unreadable descriptor"
                    );
                    summary.record(
                        &e.label(),
                        ProductOutcome::Failed {
                            kind: e.kind(),
                            reason: e.to_string(),
                        },
                    );
                }
            }
        }

        let max_concurrent = self.options.max_concurrent.max(1);
        tracing::info!(
            source = %self.options.source_name,
            products = jobs.len(),
            max_concurrent,
            dry_run,
            "sync run started"
        );

        let mut results: Vec<(usize, String, ProductOutcome)> =
            stream::iter(jobs.iter().enumerate())
                .map(|(idx, job)| async move {
                    (idx, job.product.code.clone(), self.sync_job(job).await)
                })
                .buffer_unordered(max_concurrent)
                .collect()
                .await;
        results.sort_by_key(|(idx, _, _)| *idx);

        for (_, code, outcome) in results {
            summary.record(&code, outcome);
        }

        if !dry_run {
            if let Err(e) = self.flush_identity().await {
                tracing::error!(error = %e, "failed to persist identity mapping");
                summary.persist_error = Some(e.to_string());
            }
        }

        tracing::info!(
            source = %self.options.source_name,
            created = summary.created.len(),
            updated = summary.updated.len(),
            unchanged = summary.unchanged.len(),
            failed = summary.failed.len(),
            "sync run finished"
        );
        summary
    }

    /// Syncs one product, folding any error into a `Failed` outcome.
    pub async fn sync_job(&self, job: &ProductJob) -> ProductOutcome {
        let code = job.product.code.as_str();
        match self.sync_product(job).await {
            Ok(outcome) => {
                log_outcome(code, &outcome);
                outcome
            }
            Err(e) => {
                let kind = e.kind();
                tracing::warn!(code, kind = %kind, error = %e, "product sync failed");
                ProductOutcome::Failed {
                    kind,
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn sync_product(&self, job: &ProductJob) -> Result<ProductOutcome, SyncError> {
        let code = job.product.code.as_str();
        let plan = self.prepare(&job.product)?;

        if self.options.dry_run {
            return Ok(ProductOutcome::Planned {
                action: plan.action,
            });
        }

        match plan.action {
            SyncAction::Skip => {
                if plan.recovered_id {
                    if let Some(id) = plan.known_id {
                        self.with_identity(|ids| ids.record_product(code, id));
                    }
                }
                Ok(ProductOutcome::Unchanged {
                    remote_id: plan.known_id,
                })
            }
            SyncAction::Create => self.create(job, &plan).await,
            SyncAction::Update { remote_id } => self.update(code, remote_id, &plan).await,
        }
    }

    fn prepare(&self, product: &Product) -> Result<Plan, SyncError> {
        let code = product.code.as_str();
        product
            .validate()
            .map_err(|e| SyncError::InvalidDescriptor {
                context: code.to_owned(),
                reason: e.to_string(),
            })?;

        let envelope = build_desired(product, &self.options.builder);
        let body = serde_json::to_value(&envelope).map_err(|source| SyncError::Json {
            context: format!("desired state for {code}"),
            source,
        })?;

        let snapshot = match self.snapshots.load(code) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(code, error = %e, "snapshot unreadable, treating as absent");
                None
            }
        };
        let snapshot_id = snapshot.as_ref().map(|s| s.remote_id);
        let mapped = self.with_identity(|ids| ids.product_id(code));
        if let (Some(mapped), Some(from_file)) = (mapped, snapshot_id) {
            if mapped != from_file {
                tracing::warn!(
                    code,
                    mapped,
                    snapshot_id = from_file,
                    "mapping and snapshot disagree, using the mapping"
                );
            }
        }
        let known_id = mapped.or(snapshot_id);

        let outcome = diff(&body, snapshot.as_ref().and_then(|s| s.body.as_ref()));
        let action = match (outcome, known_id) {
            (DiffOutcome::Unchanged, _) => SyncAction::Skip,
            (_, Some(remote_id)) => SyncAction::Update { remote_id },
            (DiffOutcome::Absent, None) => SyncAction::Create,
            (DiffOutcome::Changed, None) => {
                return Err(SyncError::MissingRemoteId {
                    code: code.to_owned(),
                })
            }
        };

        Ok(Plan {
            action,
            known_id,
            recovered_id: mapped.is_none() && known_id.is_some(),
            envelope,
            body,
        })
    }

    async fn create(&self, job: &ProductJob, plan: &Plan) -> Result<ProductOutcome, SyncError> {
        let code = job.product.code.as_str();
        let created = self.remote.create_product(&plan.envelope).await?;
        let remote_id = created.id;

        // Flush right away: a crash later in the run must not lose this id.
        self.with_identity(|ids| ids.record_product(code, remote_id));
        if let Err(e) = self.flush_identity().await {
            tracing::warn!(code, error = %e, "mapping flush after create failed");
        }

        let collection_warnings = self
            .associate_collections(code, remote_id, &job.category_paths)
            .await;
        let (images_uploaded, image_failures) =
            self.upload_images(code, remote_id, &job.images).await;

        self.snapshots.save(code, remote_id, &plan.body)?;

        Ok(ProductOutcome::Created {
            remote_id,
            images_uploaded,
            image_failures,
            collection_warnings,
        })
    }

    async fn update(
        &self,
        code: &str,
        remote_id: u64,
        plan: &Plan,
    ) -> Result<ProductOutcome, SyncError> {
        let updated = self.remote.update_product(remote_id, &plan.envelope).await?;
        if updated.id != remote_id {
            tracing::warn!(
                code,
                remote_id,
                returned = updated.id,
                "update returned a different id, keeping the known id"
            );
        }

        if plan.recovered_id {
            self.with_identity(|ids| ids.record_product(code, remote_id));
            tracing::info!(code, remote_id, "remote id recovered from snapshot");
        }

        self.snapshots.save(code, remote_id, &plan.body)?;

        Ok(ProductOutcome::Updated {
            remote_id,
            recovered_id: plan.recovered_id,
        })
    }

    /// Adds a new product to its collections. Returns the number of failed
    /// associations.
    async fn associate_collections(
        &self,
        code: &str,
        remote_id: u64,
        category_paths: &[Vec<String>],
    ) -> usize {
        let mut targets: Vec<u64> = self.options.default_collection_id.into_iter().collect();

        if self.options.associate_category_collections {
            let source = self.options.source_name.as_str();
            self.with_identity(|ids| {
                for path in category_paths {
                    match resolve_category_collection(&*ids, source, path) {
                        Some(id) if !targets.contains(&id) => targets.push(id),
                        Some(_) => {}
                        None => {
                            tracing::debug!(code, path = ?path, "no collection for category");
                        }
                    }
                }
            });
        }

        let mut warnings = 0;
        for collection_id in targets {
            if let Err(e) = self
                .remote
                .associate_collection(remote_id, collection_id)
                .await
            {
                tracing::warn!(
                    code,
                    remote_id,
                    collection_id,
                    error = %e,
                    "collection association failed"
                );
                warnings += 1;
            }
        }
        warnings
    }

    /// Uploads images in order, skipping any that cannot be fetched or
    /// uploaded. Returns the upload count and the skipped images.
    async fn upload_images(
        &self,
        code: &str,
        remote_id: u64,
        images: &[String],
    ) -> (usize, Vec<FailedImage>) {
        let mut uploaded = 0;
        let mut failures = Vec::new();
        for reference in images {
            match self.upload_image(remote_id, reference).await {
                Ok(()) => uploaded += 1,
                Err(e) => {
                    let kind = e.kind();
                    tracing::warn!(
                        code,
                        reference = %reference,
                        kind = %kind,
                        error = %e,
                        "image skipped"
                    );
                    failures.push(FailedImage {
                        code: code.to_owned(),
                        reference: reference.clone(),
                        kind,
                        reason: e.to_string(),
                    });
                }
            }
        }
        (uploaded, failures)
    }

    async fn upload_image(&self, remote_id: u64, reference: &str) -> Result<(), SyncError> {
        let bytes = self.assets.fetch(reference).await?;
        let image = self.remote.upload_product_image(remote_id, &bytes).await?;
        tracing::debug!(remote_id, image_id = ?image.id, "image uploaded");
        Ok(())
    }
}

fn log_outcome(code: &str, outcome: &ProductOutcome) {
    match outcome {
        ProductOutcome::Created {
            remote_id,
            images_uploaded,
            image_failures,
            ..
        } => tracing::info!(
            code,
            remote_id,
            images_uploaded,
            images_failed = image_failures.len(),
            "product created"
        ),
        ProductOutcome::Updated {
            remote_id,
            recovered_id,
        } => tracing::info!(code, remote_id, recovered_id, "product updated"),
        ProductOutcome::Unchanged { remote_id } => {
            tracing::debug!(code, remote_id = ?remote_id, "product unchanged");
        }
        ProductOutcome::Planned { action } => {
            tracing::info!(code, action = ?action, "dry run");
        }
        ProductOutcome::Failed { .. } => {}
    }
}
