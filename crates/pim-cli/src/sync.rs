//! `sync` command: wires the file-backed stores and the Shopify client into
//! the engine for one source.

use std::sync::Arc;

use pim_core::{AppConfig, WorkspaceLayout};
use pim_shopify::{RequestGate, ShopifyClient};
use pim_sync::{
    lookup_id, BuilderOptions, CatalogSync, EnrichmentDirSource, FileIdentityStore,
    FileSnapshotStore, FsAssetFetcher, HttpAssetFetcher, RunSummary, SyncOptions,
};

#[derive(Debug, Clone, Default)]
pub(crate) struct SyncFlags {
    pub dry_run: bool,
    pub concurrency: Option<usize>,
    pub associate_categories: bool,
}

pub(crate) fn build_shopify_client(config: &AppConfig) -> anyhow::Result<ShopifyClient> {
    let gate = Arc::new(RequestGate::new(
        config.rate_limit_burst,
        config.rate_limit_per_sec,
    ));
    ShopifyClient::new(
        &config.shopify_base_url,
        &config.shopify_access_token,
        config.request_timeout_secs,
        config.connect_timeout_secs,
        &config.user_agent,
        gate,
    )
    .map_err(|e| anyhow::anyhow!("failed to build Shopify client: {e}"))
}

/// Command-line flags take precedence over configuration.
pub(crate) fn sync_options(
    config: &AppConfig,
    layout: &WorkspaceLayout,
    source: &str,
    flags: &SyncFlags,
) -> SyncOptions {
    let default_collection_id = lookup_id(&layout.default_collection_file(), source);
    if default_collection_id.is_none() {
        tracing::debug!(source, "no default collection configured");
    }

    SyncOptions {
        source_name: source.to_owned(),
        builder: BuilderOptions {
            vendor: config.vendor.clone(),
            tags: config.product_tags.clone(),
        },
        default_collection_id,
        associate_category_collections: flags.associate_categories
            || config.associate_category_collections,
        max_concurrent: flags.concurrency.unwrap_or(config.max_concurrent_products),
        dry_run: flags.dry_run,
    }
}

/// Syncs one source and returns the run summary.
///
/// # Errors
///
/// Returns an error if the Shopify client cannot be built or the enrichment
/// directory cannot be listed. Per-product failures are in the summary.
pub(crate) async fn run_sync(
    config: &AppConfig,
    source_name: &str,
    flags: &SyncFlags,
) -> anyhow::Result<RunSummary> {
    let layout = WorkspaceLayout::new(&config.workspace_dir);
    let options = sync_options(config, &layout, source_name, flags);

    let client = build_shopify_client(config)?;
    let http = HttpAssetFetcher::new(config.request_timeout_secs, &config.user_agent)
        .map_err(|e| anyhow::anyhow!("failed to build asset client: {e}"))?;
    let assets = FsAssetFetcher::new(layout.assets_dir(source_name)).with_http_fallback(http);
    let identity = FileIdentityStore::load(
        layout.product_mapping_file(source_name),
        layout.collection_mapping_file(source_name),
    );
    let snapshots = FileSnapshotStore::new(layout.export_dir(source_name));

    let enrichment_dir = layout.enrichment_dir(source_name);
    let mut source = EnrichmentDirSource::open(source_name, &enrichment_dir).map_err(|e| {
        anyhow::anyhow!(
            "cannot read enrichment directory {}: {e}",
            enrichment_dir.display()
        )
    })?;

    let engine = CatalogSync::new(client, identity, snapshots, assets, options);
    Ok(engine.run(&mut source).await)
}

pub(crate) fn print_summary(summary: &RunSummary) {
    for line in summary_lines(summary) {
        println!("{line}");
    }
}

/// Headline followed by one line per product, in source order per outcome.
pub(crate) fn summary_lines(summary: &RunSummary) -> Vec<String> {
    let mut lines = vec![summary.to_string()];
    lines.extend(summary.created.iter().map(|code| format!("  created {code}")));
    lines.extend(summary.updated.iter().map(|code| format!("  updated {code}")));
    lines.extend(summary.unchanged.iter().map(|code| format!("  unchanged {code}")));
    lines.extend(
        summary
            .planned
            .iter()
            .map(|(code, action)| format!("  planned {code}: {action:?}")),
    );
    lines.extend(
        summary
            .failed
            .iter()
            .map(|f| format!("  failed {} [{}]: {}", f.code, f.kind, f.reason)),
    );
    lines.extend(summary.image_failures.iter().map(|img| {
        format!(
            "  image skipped {} {} [{}]: {}",
            img.code, img.reference, img.kind, img.reason
        )
    }));
    lines
}
