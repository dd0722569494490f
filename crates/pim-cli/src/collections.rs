//! `collections` commands.

use pim_core::{AppConfig, WorkspaceLayout};
use pim_sync::collections::{merge_collection_index, rebuild_collection_index};
use pim_sync::{FileIdentityStore, IdentityStore};

use crate::sync::build_shopify_client;

fn identity_store(layout: &WorkspaceLayout, source: &str) -> FileIdentityStore {
    FileIdentityStore::load(
        layout.product_mapping_file(source),
        layout.collection_mapping_file(source),
    )
}

/// Rebuilds the category -> collection index from the store's metafields and
/// merges new entries into the source's collection mapping.
///
/// # Errors
///
/// Returns an error if the collection list cannot be fetched or the mapping
/// cannot be written.
pub(crate) async fn run_map(config: &AppConfig, source: &str) -> anyhow::Result<()> {
    let client = build_shopify_client(config)?;
    let layout = WorkspaceLayout::new(&config.workspace_dir);

    let index = rebuild_collection_index(&client).await?;
    let mut store = identity_store(&layout, source);
    let added = merge_collection_index(&mut store, &index);
    store.persist()?;

    println!(
        "{} category paths mapped, {added} new; {} total in {}",
        index.len(),
        store.collection_count(),
        layout.collection_mapping_file(source).display()
    );
    Ok(())
}

/// Creates a custom collection that advertises `paths`, optionally recording
/// them in a source's collection mapping.
///
/// # Errors
///
/// Returns an error if the collection cannot be created or the mapping
/// cannot be written.
pub(crate) async fn run_create(
    config: &AppConfig,
    title: &str,
    paths: &[String],
    source: Option<&str>,
) -> anyhow::Result<()> {
    let client = build_shopify_client(config)?;
    let collection = client
        .create_collection(title, paths)
        .await
        .map_err(|e| anyhow::anyhow!("failed to create collection '{title}': {e}"))?;
    tracing::info!(collection_id = collection.id, title, "collection created");

    if let Some(source) = source {
        let layout = WorkspaceLayout::new(&config.workspace_dir);
        let mut store = identity_store(&layout, source);
        for path in paths {
            store.record_collection(path, collection.id);
        }
        store.persist()?;
    }

    println!("created collection {} ({title})", collection.id);
    Ok(())
}
