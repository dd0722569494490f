//! Request and response payloads for the Shopify Admin REST API.
//!
//! Request types serialize optional fields by omission, never as `null`. The
//! Admin API does not echo nulls back, and a payload that carries them would
//! never compare equal to a previously stored copy.
//!
//! Response types are lenient: every field the engine does not strictly need
//! is `#[serde(default)]` so additive API changes do not break parsing.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Metafield key carrying the local category paths that feed a collection.
pub const DOWNSTREAM_PATHS_KEY: &str = "downstream_collection_paths";
pub const DOWNSTREAM_PATHS_NAMESPACE: &str = "vendor";
pub const DOWNSTREAM_PATHS_TYPE: &str = "list.single_line_text_field";

// ---------------------------------------------------------------------------
// Products
// ---------------------------------------------------------------------------

/// Body of `POST /products.json` and `PUT /products/{id}.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductEnvelope {
    pub product: ProductPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductPayload {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_html: Option<String>,
    /// URL slug; always the local product code.
    pub handle: String,
    pub vendor: String,
    /// Comma-separated tag string, as the Admin API accepts on write.
    pub tags: String,
    pub variants: Vec<VariantPayload>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantPayload {
    /// Serialized as a decimal string, e.g. `"9.99"`.
    pub price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compare_at_price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inventory_quantity: Option<i64>,
    pub title: String,
    pub option1: String,
    pub inventory_policy: String,
    pub inventory_management: String,
    pub fulfillment_service: String,
    pub taxable: bool,
    pub requires_shipping: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProductResponse {
    #[serde(default)]
    pub product: Option<ProductRef>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProductRef {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub handle: Option<String>,
}

/// A product as acknowledged by the remote side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteProduct {
    pub id: u64,
    pub handle: Option<String>,
}

// ---------------------------------------------------------------------------
// Images
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub(crate) struct ImageRequest {
    pub image: ImageAttachment,
}

#[derive(Debug, Serialize)]
pub(crate) struct ImageAttachment {
    /// Base64-encoded image bytes.
    pub attachment: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ImageResponse {
    #[serde(default)]
    pub image: Option<RemoteImage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteImage {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub position: Option<u32>,
}

// ---------------------------------------------------------------------------
// Collections and metafields
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct CollectionsResponse {
    #[serde(default)]
    pub custom_collections: Vec<Collection>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CollectionResponse {
    #[serde(default)]
    pub custom_collection: Option<Collection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Collection {
    pub id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub handle: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CollectionCreateRequest<'a> {
    pub custom_collection: NewCollection<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct NewCollection<'a> {
    pub title: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub metafields: Vec<NewMetafield>,
}

#[derive(Debug, Serialize)]
pub(crate) struct NewMetafield {
    pub namespace: &'static str,
    pub key: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// JSON-encoded list, e.g. `"[\"MultiCraft-Paint\"]"`.
    pub value: String,
}

impl NewMetafield {
    pub(crate) fn downstream_paths(paths: &[String]) -> Result<Self, serde_json::Error> {
        Ok(Self {
            namespace: DOWNSTREAM_PATHS_NAMESPACE,
            key: DOWNSTREAM_PATHS_KEY,
            kind: DOWNSTREAM_PATHS_TYPE,
            value: serde_json::to_string(paths)?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct MetafieldsResponse {
    #[serde(default)]
    pub metafields: Vec<Metafield>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Metafield {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub namespace: Option<String>,
    pub key: String,
    #[serde(default)]
    pub value: serde_json::Value,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

impl Metafield {
    /// Decodes a list-typed metafield value.
    ///
    /// The Admin API returns list metafields as a JSON-encoded string
    /// (`"[\"a\",\"b\"]"`); a bare JSON array is accepted as well.
    ///
    /// # Errors
    ///
    /// Returns a `serde_json::Error` when the value is not a list of strings.
    pub fn string_list(&self) -> Result<Vec<String>, serde_json::Error> {
        match &self.value {
            serde_json::Value::String(encoded) => serde_json::from_str(encoded),
            other => serde_json::from_value(other.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// Collects (product <-> collection association)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub(crate) struct CollectRequest {
    pub collect: NewCollect,
}

#[derive(Debug, Serialize)]
pub(crate) struct NewCollect {
    pub product_id: u64,
    pub collection_id: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CollectResponse {
    #[serde(default)]
    pub collect: Option<Collect>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Collect {
    #[serde(default)]
    pub id: Option<u64>,
    pub product_id: u64,
    pub collection_id: u64,
}
