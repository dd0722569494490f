//! Category -> collection resolution.
//!
//! Remote collections advertise which local category paths they cover through
//! a `vendor.downstream_collection_paths` list metafield. The index built from
//! those metafields is merged into the identity store, and each product's
//! category path is then resolved against it, most specific path first.

use std::collections::BTreeMap;

use pim_shopify::DOWNSTREAM_PATHS_KEY;

use crate::error::SyncError;
use crate::mapping::IdentityStore;
use crate::remote::RemoteCatalog;

/// Collection key for a category path: `<source>-<seg1>-<seg2>...`.
#[must_use]
pub fn category_key(source: &str, path: &[String]) -> String {
    let mut key = source.to_owned();
    for segment in path {
        key.push('-');
        key.push_str(segment.trim());
    }
    key
}

/// Lists every collection and reads its downstream-path metafield.
///
/// A collection whose metafields cannot be fetched or decoded is skipped with
/// a warning. When two collections claim the same path, the first listed wins.
///
/// # Errors
///
/// Returns [`SyncError::Remote`] when the collection list itself fails.
pub async fn rebuild_collection_index<R>(remote: &R) -> Result<BTreeMap<String, u64>, SyncError>
where
    R: RemoteCatalog + ?Sized,
{
    let collections = remote.list_collections().await?;
    let mut index = BTreeMap::new();

    for collection in &collections {
        let metafields = match remote.list_collection_metafields(collection.id).await {
            Ok(fields) => fields,
            Err(e) => {
                tracing::warn!(
                    collection_id = collection.id,
                    error = %e,
                    "skipping collection, metafields unavailable"
                );
                continue;
            }
        };

        for field in metafields.iter().filter(|f| f.key == DOWNSTREAM_PATHS_KEY) {
            let paths = match field.string_list() {
                Ok(paths) => paths,
                Err(e) => {
                    tracing::warn!(
                        collection_id = collection.id,
                        error = %e,
                        "downstream path metafield is not a string list"
                    );
                    continue;
                }
            };
            for path in paths {
                match index.get(&path) {
                    Some(existing) if *existing != collection.id => {
                        tracing::warn!(
                            path = %path,
                            kept = *existing,
                            ignored = collection.id,
                            "category path claimed by two collections"
                        );
                    }
                    Some(_) => {}
                    None => {
                        index.insert(path, collection.id);
                    }
                }
            }
        }
    }

    tracing::info!(
        collections = collections.len(),
        paths = index.len(),
        "collection index rebuilt"
    );
    Ok(index)
}

/// Records every index entry not yet mapped. Returns how many were new.
pub fn merge_collection_index<I>(store: &mut I, index: &BTreeMap<String, u64>) -> usize
where
    I: IdentityStore + ?Sized,
{
    index
        .iter()
        .filter(|(path, id)| store.record_collection(path, **id))
        .count()
}

/// Finds the collection for a category path, trying the full path first and
/// then each shorter prefix.
pub fn resolve_category_collection<I>(store: &I, source: &str, path: &[String]) -> Option<u64>
where
    I: IdentityStore + ?Sized,
{
    (1..=path.len())
        .rev()
        .find_map(|len| store.collection_id(&category_key(source, &path[..len])))
}
