use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;

use crate::error::ShopifyError;
use crate::rate_limit::RequestGate;
use crate::types::{
    Collect, CollectRequest, CollectResponse, Collection, CollectionCreateRequest,
    CollectionResponse, CollectionsResponse, ImageAttachment, ImageRequest, ImageResponse,
    Metafield, MetafieldsResponse, NewCollect, NewCollection, NewMetafield, ProductEnvelope,
    ProductResponse, RemoteImage, RemoteProduct,
};

/// Page size for collection listing. Larger catalogs are not paginated.
pub const COLLECTION_PAGE_LIMIT: u32 = 250;

/// Cap on how much of a rejected response body is kept in the error.
const MAX_ERROR_BODY_CHARS: usize = 2048;

const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";

/// Client for the Shopify Admin REST API.
///
/// Each method issues exactly one request and waits for its response. Non-2xx
/// responses come back as [`ShopifyError::Rejected`] with the status and body;
/// nothing is retried.
pub struct ShopifyClient {
    client: Client,
    base_url: Url,
    access_token: String,
    gate: Arc<RequestGate>,
}

impl ShopifyClient {
    /// Creates a client rooted at `base_url`, e.g.
    /// `https://shop.myshopify.com/admin/api/2024-01`.
    ///
    /// # Errors
    ///
    /// Returns [`ShopifyError::InvalidBaseUrl`] if `base_url` does not parse,
    /// or [`ShopifyError::Transport`] if the `reqwest::Client` cannot be built.
    pub fn new(
        base_url: &str,
        access_token: &str,
        timeout_secs: u64,
        connect_timeout_secs: u64,
        user_agent: &str,
        gate: Arc<RequestGate>,
    ) -> Result<Self, ShopifyError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .user_agent(user_agent)
            .build()?;

        Ok(Self {
            client,
            base_url: normalize_base_url(base_url)?,
            access_token: access_token.to_owned(),
            gate,
        })
    }

    /// Creates a product. The response must carry the assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`ShopifyError::MalformedResponse`] when the response has no
    /// `product.id`, plus the transport/status errors every call can return.
    pub async fn create_product(
        &self,
        product: &ProductEnvelope,
    ) -> Result<RemoteProduct, ShopifyError> {
        let url = self.endpoint("products.json")?;
        let context = format!("create product {}", product.product.handle);
        let response: ProductResponse = self
            .send(self.client.post(url).json(product), &context)
            .await?;

        let product_ref = response.product.ok_or_else(|| ShopifyError::MalformedResponse {
            context: context.clone(),
            reason: "response has no product object".to_string(),
        })?;
        let id = product_ref.id.ok_or_else(|| ShopifyError::MalformedResponse {
            context,
            reason: "response product has no id".to_string(),
        })?;

        Ok(RemoteProduct {
            id,
            handle: product_ref.handle,
        })
    }

    /// Replaces a product with the full `product` representation.
    ///
    /// # Errors
    ///
    /// Returns [`ShopifyError::MalformedResponse`] when the response has no
    /// `product` object.
    pub async fn update_product(
        &self,
        product_id: u64,
        product: &ProductEnvelope,
    ) -> Result<RemoteProduct, ShopifyError> {
        let url = self.endpoint(&format!("products/{product_id}.json"))?;
        let context = format!("update product {product_id}");
        let response: ProductResponse = self
            .send(self.client.put(url).json(product), &context)
            .await?;

        let product_ref = response
            .product
            .ok_or_else(|| ShopifyError::MalformedResponse {
                context,
                reason: "response has no product object".to_string(),
            })?;

        Ok(RemoteProduct {
            id: product_ref.id.unwrap_or(product_id),
            handle: product_ref.handle,
        })
    }

    /// Uploads one image for a product as a base64 attachment.
    ///
    /// # Errors
    ///
    /// Returns [`ShopifyError::MalformedResponse`] when the response has no
    /// `image` object.
    pub async fn upload_product_image(
        &self,
        product_id: u64,
        image: &[u8],
    ) -> Result<RemoteImage, ShopifyError> {
        let url = self.endpoint(&format!("products/{product_id}/images.json"))?;
        let context = format!("upload image for product {product_id}");
        let body = ImageRequest {
            image: ImageAttachment {
                attachment: base64::engine::general_purpose::STANDARD.encode(image),
            },
        };
        let response: ImageResponse = self
            .send(self.client.post(url).json(&body), &context)
            .await?;

        response.image.ok_or_else(|| ShopifyError::MalformedResponse {
            context,
            reason: "response has no image object".to_string(),
        })
    }

    /// Lists custom collections, optionally filtered by exact title.
    ///
    /// Only the first page of [`COLLECTION_PAGE_LIMIT`] entries is returned.
    ///
    /// # Errors
    ///
    /// Returns transport, status, or deserialization errors.
    pub async fn list_collections(
        &self,
        title: Option<&str>,
    ) -> Result<Vec<Collection>, ShopifyError> {
        let mut url = self.endpoint("custom_collections.json")?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", &COLLECTION_PAGE_LIMIT.to_string());
            if let Some(title) = title {
                query.append_pair("title", title);
            }
        }
        let response: CollectionsResponse = self
            .send(self.client.get(url), "list collections")
            .await?;
        Ok(response.custom_collections)
    }

    /// Lists the metafields attached to one collection.
    ///
    /// # Errors
    ///
    /// Returns transport, status, or deserialization errors.
    pub async fn list_collection_metafields(
        &self,
        collection_id: u64,
    ) -> Result<Vec<Metafield>, ShopifyError> {
        let url = self.endpoint(&format!("collections/{collection_id}/metafields.json"))?;
        let context = format!("list metafields for collection {collection_id}");
        let response: MetafieldsResponse = self.send(self.client.get(url), &context).await?;
        Ok(response.metafields)
    }

    /// Creates a custom collection. When `downstream_paths` is non-empty the
    /// collection carries a `vendor.downstream_collection_paths` metafield
    /// listing them.
    ///
    /// # Errors
    ///
    /// Returns [`ShopifyError::MalformedResponse`] when the response has no
    /// `custom_collection` object.
    pub async fn create_collection(
        &self,
        title: &str,
        downstream_paths: &[String],
    ) -> Result<Collection, ShopifyError> {
        let url = self.endpoint("custom_collections.json")?;
        let context = format!("create collection {title}");

        let metafields = if downstream_paths.is_empty() {
            Vec::new()
        } else {
            vec![NewMetafield::downstream_paths(downstream_paths).map_err(|e| {
                ShopifyError::Deserialize {
                    context: context.clone(),
                    source: e,
                }
            })?]
        };
        let body = CollectionCreateRequest {
            custom_collection: NewCollection { title, metafields },
        };

        let response: CollectionResponse = self
            .send(self.client.post(url).json(&body), &context)
            .await?;
        response
            .custom_collection
            .ok_or_else(|| ShopifyError::MalformedResponse {
                context,
                reason: "response has no custom_collection object".to_string(),
            })
    }

    /// Adds a product to a collection.
    ///
    /// # Errors
    ///
    /// Returns [`ShopifyError::MalformedResponse`] when the response has no
    /// `collect` object.
    pub async fn associate_collection(
        &self,
        product_id: u64,
        collection_id: u64,
    ) -> Result<Collect, ShopifyError> {
        let url = self.endpoint("collects.json")?;
        let context = format!("add product {product_id} to collection {collection_id}");
        let body = CollectRequest {
            collect: NewCollect {
                product_id,
                collection_id,
            },
        };
        let response: CollectResponse = self
            .send(self.client.post(url).json(&body), &context)
            .await?;
        response.collect.ok_or_else(|| ShopifyError::MalformedResponse {
            context,
            reason: "response has no collect object".to_string(),
        })
    }

    /// Resolves `path` relative to the configured API root.
    fn endpoint(&self, path: &str) -> Result<Url, ShopifyError> {
        self.base_url
            .join(path)
            .map_err(|e| ShopifyError::InvalidBaseUrl {
                base_url: self.base_url.to_string(),
                reason: e.to_string(),
            })
    }

    /// Sends one request through the admission gate and decodes a 2xx JSON body.
    async fn send<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        context: &str,
    ) -> Result<T, ShopifyError> {
        let request = builder
            .header(ACCESS_TOKEN_HEADER, &self.access_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .build()?;
        let method = request.method().to_string();
        let url = request.url().to_string();

        self.gate.acquire().await;
        tracing::debug!(%method, %url, "shopify request");

        let response = self.client.execute(request).await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ShopifyError::Rejected {
                method,
                url,
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let body = response.text().await?;
        serde_json::from_str::<T>(&body).map_err(|e| ShopifyError::Deserialize {
            context: context.to_owned(),
            source: e,
        })
    }
}

/// Parses the API root and guarantees a trailing slash so that
/// [`Url::join`] appends to the path instead of replacing its last segment.
pub(crate) fn normalize_base_url(base_url: &str) -> Result<Url, ShopifyError> {
    let normalized = format!("{}/", base_url.trim().trim_end_matches('/'));
    let url = Url::parse(&normalized).map_err(|e| ShopifyError::InvalidBaseUrl {
        base_url: base_url.to_owned(),
        reason: e.to_string(),
    })?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(ShopifyError::InvalidBaseUrl {
            base_url: base_url.to_owned(),
            reason: "expected an http(s) URL".to_string(),
        });
    }
    Ok(url)
}

fn truncate_body(body: &str) -> String {
    if body.chars().count() <= MAX_ERROR_BODY_CHARS {
        body.to_owned()
    } else {
        let mut truncated: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
        truncated.push_str("...");
        truncated
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
