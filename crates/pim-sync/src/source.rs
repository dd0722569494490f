//! Catalog source and asset fetcher seams.
//!
//! The engine only reads from these. [`EnrichmentDirSource`] and
//! [`FsAssetFetcher`] read the on-disk layout the enrichment step writes;
//! [`MemorySource`] backs tests.

use std::collections::{HashMap, VecDeque};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use pim_core::Product;
use reqwest::Url;

use crate::error::{AssetError, SourceError};

/// A read-only sequence of enriched product descriptors.
pub trait CatalogSource {
    /// Source name, used for path layout and collection keys (e.g. `MultiCraft`).
    fn name(&self) -> &str;

    /// Next descriptor, or `None` at end of sequence.
    fn next_product(&mut self) -> Option<Result<Product, SourceError>>;

    /// Ordered image references for a product already returned by
    /// [`Self::next_product`].
    fn asset_paths(&self, code: &str) -> Vec<String>;

    /// Category path hints (root-first segments) for a product.
    fn collection_paths(&self, _code: &str) -> Vec<Vec<String>> {
        Vec::new()
    }
}

/// Per-product hints remembered after a descriptor has been yielded.
#[derive(Debug, Clone, Default)]
struct Hints {
    images: Vec<String>,
    category_paths: Vec<Vec<String>>,
}

impl Hints {
    fn from_product(product: &Product) -> Self {
        let category = product.category_path();
        Self {
            images: product.image_urls.clone(),
            category_paths: if category.is_empty() {
                Vec::new()
            } else {
                vec![category]
            },
        }
    }
}

/// Reads `<dir>/*.json` enriched descriptors in file-name order.
#[derive(Debug)]
pub struct EnrichmentDirSource {
    name: String,
    pending: VecDeque<PathBuf>,
    hints: HashMap<String, Hints>,
}

impl EnrichmentDirSource {
    /// Lists the descriptor files under `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Io`] when `dir` cannot be listed.
    pub fn open(name: impl Into<String>, dir: &Path) -> Result<Self, SourceError> {
        let io_err = |source| SourceError::Io {
            path: dir.to_path_buf(),
            source,
        };
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        files.sort();

        let name = name.into();
        tracing::info!(source = %name, files = files.len(), "enrichment directory opened");
        Ok(Self {
            name,
            pending: files.into(),
            hints: HashMap::new(),
        })
    }

    fn read(path: &Path) -> Result<Product, SourceError> {
        let text = std::fs::read_to_string(path).map_err(|source| SourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let product: Product =
            serde_json::from_str(&text).map_err(|source| SourceError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        product.validate().map_err(|source| SourceError::Invalid {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(product)
    }
}

impl CatalogSource for EnrichmentDirSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_product(&mut self) -> Option<Result<Product, SourceError>> {
        let path = self.pending.pop_front()?;
        let result = Self::read(&path);
        if let Ok(product) = &result {
            self.hints
                .insert(product.code.clone(), Hints::from_product(product));
        }
        Some(result)
    }

    fn asset_paths(&self, code: &str) -> Vec<String> {
        self.hints
            .get(code)
            .map(|h| h.images.clone())
            .unwrap_or_default()
    }

    fn collection_paths(&self, code: &str) -> Vec<Vec<String>> {
        self.hints
            .get(code)
            .map(|h| h.category_paths.clone())
            .unwrap_or_default()
    }
}

/// In-memory source.
#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    products: VecDeque<Product>,
    hints: HashMap<String, Hints>,
}

impl MemorySource {
    #[must_use]
    pub fn new(name: impl Into<String>, products: Vec<Product>) -> Self {
        let hints = products
            .iter()
            .map(|p| (p.code.clone(), Hints::from_product(p)))
            .collect();
        Self {
            name: name.into(),
            products: products.into(),
            hints,
        }
    }
}

impl CatalogSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_product(&mut self) -> Option<Result<Product, SourceError>> {
        self.products.pop_front().map(Ok)
    }

    fn asset_paths(&self, code: &str) -> Vec<String> {
        self.hints
            .get(code)
            .map(|h| h.images.clone())
            .unwrap_or_default()
    }

    fn collection_paths(&self, code: &str) -> Vec<Vec<String>> {
        self.hints
            .get(code)
            .map(|h| h.category_paths.clone())
            .unwrap_or_default()
    }
}

/// Resolves an image reference to raw bytes.
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    /// # Errors
    ///
    /// Returns an [`AssetError`] when the bytes cannot be obtained.
    async fn fetch(&self, reference: &str) -> Result<Vec<u8>, AssetError>;
}

/// Reads assets previously downloaded under a per-source root.
///
/// `https://multicraft.ca/img/p/1.jpg` resolves to `<root>/img/p/1.jpg`; a
/// relative reference resolves directly under `<root>`. When an HTTP
/// fallback is configured, a URL missing locally is downloaded instead.
#[derive(Debug, Clone)]
pub struct FsAssetFetcher {
    root: PathBuf,
    http_fallback: Option<HttpAssetFetcher>,
}

impl FsAssetFetcher {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            http_fallback: None,
        }
    }

    #[must_use]
    pub fn with_http_fallback(mut self, http: HttpAssetFetcher) -> Self {
        self.http_fallback = Some(http);
        self
    }

    pub(crate) fn resolve(&self, reference: &str) -> Result<PathBuf, AssetError> {
        let relative = match Url::parse(reference) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {
                url.path().trim_start_matches('/').to_string()
            }
            Ok(url) if url.scheme() == "file" => url.path().trim_start_matches('/').to_string(),
            _ => reference.trim_start_matches('/').to_string(),
        };

        let relative = Path::new(&relative);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if relative.as_os_str().is_empty() || !safe {
            return Err(AssetError::InvalidReference {
                reference: reference.to_owned(),
                reason: "must name a file inside the asset directory".to_string(),
            });
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl AssetFetcher for FsAssetFetcher {
    async fn fetch(&self, reference: &str) -> Result<Vec<u8>, AssetError> {
        let path = self.resolve(reference)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => match &self.http_fallback {
                Some(http) if is_http_url(reference) => http.fetch(reference).await,
                _ => Err(AssetError::NotFound {
                    reference: reference.to_owned(),
                    path,
                }),
            },
            Err(source) => Err(AssetError::Io {
                reference: reference.to_owned(),
                source,
            }),
        }
    }
}

/// Downloads absolute `http(s)` asset URLs.
#[derive(Debug, Clone)]
pub struct HttpAssetFetcher {
    client: reqwest::Client,
}

impl HttpAssetFetcher {
    /// # Errors
    ///
    /// Returns the underlying `reqwest::Error` if the client cannot be built.
    pub fn new(timeout_secs: u64, user_agent: &str) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl AssetFetcher for HttpAssetFetcher {
    async fn fetch(&self, reference: &str) -> Result<Vec<u8>, AssetError> {
        if !is_http_url(reference) {
            return Err(AssetError::InvalidReference {
                reference: reference.to_owned(),
                reason: "expected an absolute http(s) URL".to_string(),
            });
        }
        let http_err = |source| AssetError::Http {
            reference: reference.to_owned(),
            source,
        };
        let response = self.client.get(reference).send().await.map_err(http_err)?;
        let status = response.status();
        if !status.is_success() {
            return Err(AssetError::UnexpectedStatus {
                reference: reference.to_owned(),
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes().await.map_err(http_err)?;
        Ok(bytes.to_vec())
    }
}

fn is_http_url(reference: &str) -> bool {
    Url::parse(reference).is_ok_and(|u| matches!(u.scheme(), "http" | "https"))
}
