//! End-to-end orchestrator scenarios against an in-memory remote catalog.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use pim_core::{Category, Product};
use pim_shopify::{
    Collect, Collection, Metafield, ProductEnvelope, RemoteImage, RemoteProduct, ShopifyError,
    DOWNSTREAM_PATHS_KEY,
};
use pim_sync::{
    AssetError, AssetFetcher, CatalogSync, FailureKind, FileIdentityStore, FileSnapshotStore,
    IdentityStore, MemoryIdentityStore, MemorySnapshotStore, MemorySource, Snapshot,
    SnapshotStore, SyncAction, SyncError, SyncOptions,
};
use rust_decimal::Decimal;
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Create { handle: String, body: Value },
    Update { id: u64, body: Value },
    Image { product_id: u64, bytes: Vec<u8> },
    Associate { product_id: u64, collection_id: u64 },
    ListCollections,
    ListMetafields(u64),
}

/// Records every call; assigns ids from 7001 upward.
struct FakeRemote {
    calls: Mutex<Vec<Call>>,
    next_id: AtomicU64,
    reject_create: HashSet<String>,
    reject_update: HashSet<u64>,
    omit_id_on_create: HashSet<String>,
    fail_associations: bool,
    collections: Vec<Collection>,
    metafields: HashMap<u64, Vec<Metafield>>,
}

impl FakeRemote {
    fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(7001),
            reject_create: HashSet::new(),
            reject_update: HashSet::new(),
            omit_id_on_create: HashSet::new(),
            fail_associations: false,
            collections: Vec::new(),
            metafields: HashMap::new(),
        }
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn push(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

fn rejected(status: u16) -> ShopifyError {
    ShopifyError::Rejected {
        method: "POST".to_string(),
        url: "https://shop.example/admin/api/2024-01/products.json".to_string(),
        status,
        body: r#"{"errors":"invalid"}"#.to_string(),
    }
}

#[async_trait]
impl pim_sync::RemoteCatalog for FakeRemote {
    async fn create_product(
        &self,
        product: &ProductEnvelope,
    ) -> Result<RemoteProduct, ShopifyError> {
        let handle = product.product.handle.clone();
        self.push(Call::Create {
            handle: handle.clone(),
            body: serde_json::to_value(product).unwrap(),
        });
        if self.reject_create.contains(&handle) {
            return Err(rejected(422));
        }
        if self.omit_id_on_create.contains(&handle) {
            return Err(ShopifyError::MalformedResponse {
                context: format!("create product {handle}"),
                reason: "response product has no id".to_string(),
            });
        }
        Ok(RemoteProduct {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            handle: Some(handle),
        })
    }

    async fn update_product(
        &self,
        product_id: u64,
        product: &ProductEnvelope,
    ) -> Result<RemoteProduct, ShopifyError> {
        self.push(Call::Update {
            id: product_id,
            body: serde_json::to_value(product).unwrap(),
        });
        if self.reject_update.contains(&product_id) {
            return Err(rejected(422));
        }
        Ok(RemoteProduct {
            id: product_id,
            handle: Some(product.product.handle.clone()),
        })
    }

    async fn upload_product_image(
        &self,
        product_id: u64,
        image: &[u8],
    ) -> Result<RemoteImage, ShopifyError> {
        self.push(Call::Image {
            product_id,
            bytes: image.to_vec(),
        });
        Ok(RemoteImage {
            id: Some(1),
            position: None,
        })
    }

    async fn associate_collection(
        &self,
        product_id: u64,
        collection_id: u64,
    ) -> Result<Collect, ShopifyError> {
        self.push(Call::Associate {
            product_id,
            collection_id,
        });
        if self.fail_associations {
            return Err(rejected(422));
        }
        Ok(Collect {
            id: Some(1),
            product_id,
            collection_id,
        })
    }

    async fn list_collections(&self) -> Result<Vec<Collection>, ShopifyError> {
        self.push(Call::ListCollections);
        Ok(self.collections.clone())
    }

    async fn list_collection_metafields(
        &self,
        collection_id: u64,
    ) -> Result<Vec<Metafield>, ShopifyError> {
        self.push(Call::ListMetafields(collection_id));
        Ok(self
            .metafields
            .get(&collection_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Serves bytes for known references; anything else is missing.
#[derive(Default)]
struct MapAssets(HashMap<String, Vec<u8>>);

impl MapAssets {
    fn with(mut self, reference: &str, bytes: &[u8]) -> Self {
        self.0.insert(reference.to_string(), bytes.to_vec());
        self
    }
}

#[async_trait]
impl AssetFetcher for MapAssets {
    async fn fetch(&self, reference: &str) -> Result<Vec<u8>, AssetError> {
        self.0
            .get(reference)
            .cloned()
            .ok_or_else(|| AssetError::NotFound {
                reference: reference.to_string(),
                path: reference.into(),
            })
    }
}

/// Memory-backed snapshots whose writes fail for the listed codes.
struct FailingSnapshots {
    inner: MemorySnapshotStore,
    fail_save: HashSet<String>,
}

impl SnapshotStore for FailingSnapshots {
    fn load(&self, code: &str) -> Result<Option<Snapshot>, SyncError> {
        self.inner.load(code)
    }

    fn save(&self, code: &str, remote_id: u64, body: &Value) -> Result<(), SyncError> {
        if self.fail_save.contains(code) {
            return Err(SyncError::Io {
                path: format!("export/{code}-{remote_id}.json").into(),
                source: std::io::Error::other("disk full"),
            });
        }
        self.inner.save(code, remote_id, body)
    }
}

fn product(code: &str, price: &str) -> Product {
    Product {
        category: None,
        code: code.to_string(),
        title: format!("Product {code}"),
        description: None,
        price: Decimal::from_str(price).unwrap(),
        discount: None,
        inventory_quantity: Some(5),
        image_urls: Vec::new(),
    }
}

type MemSync = CatalogSync<FakeRemote, MemoryIdentityStore, MemorySnapshotStore, MapAssets>;

fn engine(remote: FakeRemote, assets: MapAssets, options: SyncOptions) -> MemSync {
    CatalogSync::new(
        remote,
        MemoryIdentityStore::new(),
        MemorySnapshotStore::new(),
        assets,
        options,
    )
}

fn source(products: Vec<Product>) -> MemorySource {
    MemorySource::new("MultiCraft", products)
}

#[tokio::test]
async fn new_product_is_created_once_and_mapped() {
    let sync = engine(FakeRemote::new(), MapAssets::default(), SyncOptions::new("MultiCraft"));

    let summary = sync.run(&mut source(vec![product("SKU-1", "9.99")])).await;

    assert_eq!(summary.created, vec!["SKU-1"]);
    assert!(summary.updated.is_empty());
    assert!(format!("{summary:?}").contains("SKU-1"));
    assert!(summary.is_success());
    let calls = sync.remote().calls();
    assert_eq!(calls.len(), 1);
    let Call::Create { handle, body } = &calls[0] else {
        panic!("expected a create, got {calls:?}");
    };
    assert_eq!(handle, "SKU-1");
    assert_eq!(body["product"]["variants"][0]["price"], json!("9.99"));

    assert_eq!(sync.with_identity(|ids| ids.product_id("SKU-1")), Some(7001));
    let snapshot = sync.snapshots().get("SKU-1").unwrap();
    assert_eq!(snapshot.remote_id, 7001);
    assert_eq!(snapshot.body.as_ref(), Some(body));
}

#[tokio::test]
async fn price_change_issues_one_update_with_same_id() {
    let sync = engine(FakeRemote::new(), MapAssets::default(), SyncOptions::new("MultiCraft"));
    sync.run(&mut source(vec![product("SKU-1", "9.99")])).await;
    sync.remote().clear();

    let summary = sync.run(&mut source(vec![product("SKU-1", "12.99")])).await;

    assert_eq!(summary.updated.len(), 1);
    let calls = sync.remote().calls();
    assert_eq!(calls.len(), 1);
    let Call::Update { id, body } = &calls[0] else {
        panic!("expected an update, got {calls:?}");
    };
    assert_eq!(*id, 7001);
    assert_eq!(body["product"]["variants"][0]["price"], json!("12.99"));
    assert_eq!(sync.with_identity(|ids| ids.product_id("SKU-1")), Some(7001));
    assert_eq!(sync.snapshots().get("SKU-1").unwrap().body.as_ref(), Some(body));
}

#[tokio::test]
async fn second_run_without_changes_makes_no_calls() {
    let sync = engine(FakeRemote::new(), MapAssets::default(), SyncOptions::new("MultiCraft"));
    let products = vec![product("SKU-1", "9.99"), product("SKU-2", "4.50")];
    sync.run(&mut source(products.clone())).await;
    sync.remote().clear();

    let summary = sync.run(&mut source(products)).await;

    assert_eq!(summary.unchanged, vec!["SKU-1", "SKU-2"]);
    assert!(sync.remote().calls().is_empty());
}

#[tokio::test]
async fn create_without_id_fails_and_writes_no_mapping() {
    let mut remote = FakeRemote::new();
    remote.omit_id_on_create.insert("SKU-1".to_string());
    let sync = engine(remote, MapAssets::default(), SyncOptions::new("MultiCraft"));

    let summary = sync.run(&mut source(vec![product("SKU-1", "9.99")])).await;

    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].code, "SKU-1");
    assert_eq!(summary.failed[0].kind, FailureKind::MalformedResponse);
    assert_eq!(sync.with_identity(|ids| ids.product_id("SKU-1")), None);
    assert!(sync.snapshots().is_empty());
}

#[tokio::test]
async fn missing_image_is_skipped_and_the_rest_upload() {
    let assets = MapAssets::default()
        .with("img/1.jpg", b"one")
        .with("img/3.jpg", b"three");
    let sync = engine(FakeRemote::new(), assets, SyncOptions::new("MultiCraft"));
    let mut p = product("SKU-1", "9.99");
    p.image_urls = vec![
        "img/1.jpg".to_string(),
        "img/2.jpg".to_string(),
        "img/3.jpg".to_string(),
    ];

    let summary = sync.run(&mut source(vec![p])).await;

    assert_eq!(summary.created.len(), 1);
    assert_eq!(summary.images_uploaded, 2);
    assert_eq!(summary.image_failures.len(), 1);
    assert_eq!(summary.image_failures[0].code, "SKU-1");
    assert_eq!(summary.image_failures[0].reference, "img/2.jpg");
    assert_eq!(
        summary.image_failures[0].kind,
        FailureKind::AssetUnavailable
    );
    let uploads: Vec<Vec<u8>> = sync
        .remote()
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::Image { product_id, bytes } => {
                assert_eq!(product_id, 7001);
                Some(bytes)
            }
            _ => None,
        })
        .collect();
    assert_eq!(uploads, vec![b"one".to_vec(), b"three".to_vec()]);
}

#[tokio::test]
async fn one_failing_product_does_not_stop_the_batch() {
    let mut remote = FakeRemote::new();
    remote.reject_create.insert("BAD".to_string());
    let sync = engine(remote, MapAssets::default(), SyncOptions::new("MultiCraft"));

    let summary = sync
        .run(&mut source(vec![
            product("A", "1.00"),
            product("BAD", "2.00"),
            product("C", "3.00"),
        ]))
        .await;

    assert_eq!(summary.created, vec!["A", "C"]);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].code, "BAD");
    assert_eq!(summary.failed[0].kind, FailureKind::RemoteRejection);
    assert!(!summary.is_success());
    assert!(sync.with_identity(|ids| ids.product_id("C")).is_some());
}

#[tokio::test]
async fn lost_mapping_is_recovered_from_snapshot_name() {
    let sync = engine(FakeRemote::new(), MapAssets::default(), SyncOptions::new("MultiCraft"));
    sync.snapshots()
        .insert("SKU-1", 555, Some(json!({"product": {"title": "old"}})));

    let summary = sync.run(&mut source(vec![product("SKU-1", "9.99")])).await;

    assert_eq!(summary.updated.len(), 1);
    assert_eq!(
        sync.remote().calls().first().map(|c| matches!(c, Call::Update { id: 555, .. })),
        Some(true)
    );
    assert_eq!(sync.with_identity(|ids| ids.product_id("SKU-1")), Some(555));
}

#[tokio::test]
async fn mapped_product_without_snapshot_is_updated_not_duplicated() {
    let sync = engine(FakeRemote::new(), MapAssets::default(), SyncOptions::new("MultiCraft"));
    sync.with_identity(|ids| ids.record_product("SKU-1", 42));

    let summary = sync.run(&mut source(vec![product("SKU-1", "9.99")])).await;

    assert_eq!(summary.updated.len(), 1);
    assert!(matches!(
        sync.remote().calls().as_slice(),
        [Call::Update { id: 42, .. }]
    ));
}

#[tokio::test]
async fn unchanged_product_backfills_missing_mapping_without_calls() {
    let sync = engine(FakeRemote::new(), MapAssets::default(), SyncOptions::new("MultiCraft"));
    let p = product("SKU-1", "9.99");
    let body = serde_json::to_value(pim_sync::build_desired(
        &p,
        &pim_sync::BuilderOptions::default(),
    ))
    .unwrap();
    sync.snapshots().insert("SKU-1", 900, Some(body));

    let summary = sync.run(&mut source(vec![p])).await;

    assert_eq!(summary.unchanged.len(), 1);
    assert!(sync.remote().calls().is_empty());
    assert_eq!(sync.with_identity(|ids| ids.product_id("SKU-1")), Some(900));
}

#[tokio::test]
async fn default_and_category_collections_are_associated_on_create() {
    let mut remote = FakeRemote::new();
    remote.collections = vec![Collection {
        id: 31,
        title: "Acrylic".to_string(),
        handle: None,
    }];
    remote.metafields.insert(
        31,
        vec![Metafield {
            id: Some(1),
            namespace: Some("vendor".to_string()),
            key: DOWNSTREAM_PATHS_KEY.to_string(),
            value: json!("[\"MultiCraft-Paint-Acrylic\"]"),
            kind: Some("list.single_line_text_field".to_string()),
        }],
    );
    let mut options = SyncOptions::new("MultiCraft");
    options.default_collection_id = Some(10);
    options.associate_category_collections = true;
    let sync = engine(remote, MapAssets::default(), options);

    let mut p = product("SKU-1", "9.99");
    p.category = Some(Category::with_parent("Acrylic", Category::new("Paint")));
    let summary = sync.run(&mut source(vec![p])).await;

    assert_eq!(summary.created.len(), 1);
    assert_eq!(summary.collection_warnings, 0);
    let associations: Vec<u64> = sync
        .remote()
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::Associate { collection_id, .. } => Some(collection_id),
            _ => None,
        })
        .collect();
    assert_eq!(associations, vec![10, 31]);
    assert_eq!(
        sync.with_identity(|ids| ids.collection_id("MultiCraft-Paint-Acrylic")),
        Some(31)
    );
}

#[tokio::test]
async fn association_failures_are_warnings_only() {
    let mut remote = FakeRemote::new();
    remote.fail_associations = true;
    let mut options = SyncOptions::new("MultiCraft");
    options.default_collection_id = Some(10);
    let sync = engine(remote, MapAssets::default(), options);

    let summary = sync.run(&mut source(vec![product("SKU-1", "9.99")])).await;

    assert_eq!(summary.created.len(), 1);
    assert_eq!(summary.collection_warnings, 1);
    assert!(summary.is_success());
    assert!(sync.snapshots().get("SKU-1").is_some());
}

#[tokio::test]
async fn concurrent_run_creates_every_product_once() {
    let mut options = SyncOptions::new("MultiCraft");
    options.max_concurrent = 4;
    let sync = engine(FakeRemote::new(), MapAssets::default(), options);
    let products: Vec<Product> = (0..12)
        .map(|i| product(&format!("SKU-{i:02}"), "1.00"))
        .collect();

    let summary = sync.run(&mut source(products)).await;

    assert_eq!(summary.created.len(), 12);
    let ids: HashSet<u64> = (0..12)
        .filter_map(|i| sync.with_identity(|s| s.product_id(&format!("SKU-{i:02}"))))
        .collect();
    assert_eq!(ids.len(), 12);
    let creates = sync
        .remote()
        .calls()
        .iter()
        .filter(|c| matches!(c, Call::Create { .. }))
        .count();
    assert_eq!(creates, 12);
}

#[tokio::test]
async fn dry_run_plans_without_calls_or_writes() {
    let mut options = SyncOptions::new("MultiCraft");
    options.dry_run = true;
    let sync = engine(FakeRemote::new(), MapAssets::default(), options);
    sync.with_identity(|ids| ids.record_product("SKU-2", 42));

    assert_eq!(
        sync.plan(&product("SKU-1", "9.99")).unwrap(),
        SyncAction::Create
    );
    assert_eq!(
        sync.plan(&product("SKU-2", "9.99")).unwrap(),
        SyncAction::Update { remote_id: 42 }
    );

    let summary = sync
        .run(&mut source(vec![product("SKU-1", "9.99"), product("SKU-2", "9.99")]))
        .await;

    assert_eq!(summary.planned.len(), 2);
    assert!(sync.remote().calls().is_empty());
    assert!(sync.snapshots().is_empty());
    let (_, identity, _, _) = sync.into_parts();
    assert_eq!(identity.persist_count(), 0);
}

#[tokio::test]
async fn duplicate_codes_and_invalid_products_are_reported() {
    let sync = engine(FakeRemote::new(), MapAssets::default(), SyncOptions::new("MultiCraft"));
    let summary = sync
        .run(&mut source(vec![
            product("SKU-1", "9.99"),
            product("SKU-1", "8.99"),
            product("NEG", "-1.00"),
        ]))
        .await;

    assert_eq!(summary.created.len(), 1);
    let kinds: Vec<(&str, FailureKind)> = summary
        .failed
        .iter()
        .map(|f| (f.code.as_str(), f.kind))
        .collect();
    assert!(kinds.contains(&("SKU-1", FailureKind::InvalidDescriptor)));
    assert!(kinds.contains(&("NEG", FailureKind::InvalidDescriptor)));
}

#[tokio::test]
async fn file_backed_run_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let mapping = dir.path().join("product-mapping.properties");
    let collections = dir.path().join("collection.properties");

    let first = CatalogSync::new(
        FakeRemote::new(),
        FileIdentityStore::load(&mapping, &collections),
        FileSnapshotStore::new(dir.path()),
        MapAssets::default(),
        SyncOptions::new("MultiCraft"),
    );
    let summary = first.run(&mut source(vec![product("SKU-1", "9.99")])).await;
    assert_eq!(summary.created.len(), 1);
    assert!(std::fs::read_to_string(&mapping)
        .unwrap()
        .contains("SKU-1=7001"));
    assert!(dir.path().join("SKU-1-7001.json").exists());

    let second = CatalogSync::new(
        FakeRemote::new(),
        FileIdentityStore::load(&mapping, &collections),
        FileSnapshotStore::new(dir.path()),
        MapAssets::default(),
        SyncOptions::new("MultiCraft"),
    );
    let summary = second.run(&mut source(vec![product("SKU-1", "9.99")])).await;
    assert_eq!(summary.unchanged.len(), 1);
    assert!(second.remote().calls().is_empty());
    assert_eq!(
        second
            .snapshots()
            .load("SKU-1")
            .unwrap()
            .map(|s| s.remote_id),
        Some(7001)
    );
}

#[tokio::test]
async fn rejected_update_fails_that_product_and_keeps_its_snapshot() {
    let mut remote = FakeRemote::new();
    remote.reject_update.insert(7001);
    let sync = engine(remote, MapAssets::default(), SyncOptions::new("MultiCraft"));
    sync.run(&mut source(vec![product("SKU-1", "9.99"), product("SKU-2", "4.50")]))
        .await;
    let before = sync.snapshots().get("SKU-1").unwrap();

    let summary = sync
        .run(&mut source(vec![product("SKU-1", "12.99"), product("SKU-2", "5.00")]))
        .await;

    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].code, "SKU-1");
    assert_eq!(summary.failed[0].kind, FailureKind::RemoteRejection);
    assert_eq!(summary.updated, vec!["SKU-2"]);
    assert_eq!(sync.snapshots().get("SKU-1").unwrap(), before);
    let body = sync.snapshots().get("SKU-2").unwrap().body.unwrap();
    assert_eq!(body["product"]["variants"][0]["price"], json!("5.00"));
    assert_eq!(sync.with_identity(|ids| ids.product_id("SKU-1")), Some(7001));
}

#[tokio::test]
async fn snapshot_write_failure_after_create_keeps_the_mapping() {
    let snapshots = FailingSnapshots {
        inner: MemorySnapshotStore::new(),
        fail_save: HashSet::from(["SKU-1".to_string()]),
    };
    let sync = CatalogSync::new(
        FakeRemote::new(),
        MemoryIdentityStore::new(),
        snapshots,
        MapAssets::default(),
        SyncOptions::new("MultiCraft"),
    );

    let summary = sync
        .run(&mut source(vec![product("SKU-1", "9.99"), product("SKU-2", "4.50")]))
        .await;

    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].code, "SKU-1");
    assert_eq!(summary.failed[0].kind, FailureKind::LocalIo);
    assert_eq!(summary.created, vec!["SKU-2"]);
    assert_eq!(sync.with_identity(|ids| ids.product_id("SKU-1")), Some(7001));

    // With a working store the next run updates the same product.
    let (remote, identity, _, assets) = sync.into_parts();
    remote.clear();
    let retry = CatalogSync::new(
        remote,
        identity,
        MemorySnapshotStore::new(),
        assets,
        SyncOptions::new("MultiCraft"),
    );
    let summary = retry.run(&mut source(vec![product("SKU-1", "9.99")])).await;

    assert_eq!(summary.updated, vec!["SKU-1"]);
    assert!(matches!(
        retry.remote().calls().as_slice(),
        [Call::Update { id: 7001, .. }]
    ));
    assert_eq!(retry.snapshots().get("SKU-1").unwrap().remote_id, 7001);
}

#[tokio::test]
async fn code_with_path_separator_is_rejected_on_every_run() {
    let dir = tempfile::tempdir().unwrap();
    let mapping = dir.path().join("product-mapping.properties");
    let collections = dir.path().join("collection.properties");

    for _ in 0..2 {
        let sync = CatalogSync::new(
            FakeRemote::new(),
            FileIdentityStore::load(&mapping, &collections),
            FileSnapshotStore::new(dir.path()),
            MapAssets::default(),
            SyncOptions::new("MultiCraft"),
        );
        let summary = sync
            .run(&mut source(vec![product("BR/100", "9.99"), product("BR-101", "1.00")]))
            .await;

        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].code, "BR/100");
        assert_eq!(summary.failed[0].kind, FailureKind::InvalidDescriptor);
        assert!(sync
            .remote()
            .calls()
            .iter()
            .all(|c| !matches!(c, Call::Create { handle, .. } if handle == "BR/100")));
    }

    assert!(!dir.path().join("BR").exists());
    let subdirs = std::fs::read_dir(dir.path())
        .unwrap()
        .filter(|e| e.as_ref().unwrap().file_type().unwrap().is_dir())
        .count();
    assert_eq!(subdirs, 0);
}
