//! The remote catalog as seen by the engine.
//!
//! [`ShopifyClient`] is the production implementation; tests substitute a
//! recording fake.

use async_trait::async_trait;
use pim_shopify::{
    Collect, Collection, Metafield, ProductEnvelope, RemoteImage, RemoteProduct, ShopifyClient,
    ShopifyError,
};

#[async_trait]
pub trait RemoteCatalog: Send + Sync {
    async fn create_product(&self, product: &ProductEnvelope)
        -> Result<RemoteProduct, ShopifyError>;

    async fn update_product(
        &self,
        product_id: u64,
        product: &ProductEnvelope,
    ) -> Result<RemoteProduct, ShopifyError>;

    async fn upload_product_image(
        &self,
        product_id: u64,
        image: &[u8],
    ) -> Result<RemoteImage, ShopifyError>;

    async fn associate_collection(
        &self,
        product_id: u64,
        collection_id: u64,
    ) -> Result<Collect, ShopifyError>;

    async fn list_collections(&self) -> Result<Vec<Collection>, ShopifyError>;

    async fn list_collection_metafields(
        &self,
        collection_id: u64,
    ) -> Result<Vec<Metafield>, ShopifyError>;
}

#[async_trait]
impl RemoteCatalog for ShopifyClient {
    async fn create_product(
        &self,
        product: &ProductEnvelope,
    ) -> Result<RemoteProduct, ShopifyError> {
        ShopifyClient::create_product(self, product).await
    }

    async fn update_product(
        &self,
        product_id: u64,
        product: &ProductEnvelope,
    ) -> Result<RemoteProduct, ShopifyError> {
        ShopifyClient::update_product(self, product_id, product).await
    }

    async fn upload_product_image(
        &self,
        product_id: u64,
        image: &[u8],
    ) -> Result<RemoteImage, ShopifyError> {
        ShopifyClient::upload_product_image(self, product_id, image).await
    }

    async fn associate_collection(
        &self,
        product_id: u64,
        collection_id: u64,
    ) -> Result<Collect, ShopifyError> {
        ShopifyClient::associate_collection(self, product_id, collection_id).await
    }

    async fn list_collections(&self) -> Result<Vec<Collection>, ShopifyError> {
        ShopifyClient::list_collections(self, None).await
    }

    async fn list_collection_metafields(
        &self,
        collection_id: u64,
    ) -> Result<Vec<Metafield>, ShopifyError> {
        ShopifyClient::list_collection_metafields(self, collection_id).await
    }
}
