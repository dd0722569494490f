pub mod client;
pub mod error;
pub mod rate_limit;
pub mod types;

pub use client::ShopifyClient;
pub use error::ShopifyError;
pub use rate_limit::RequestGate;
pub use types::{
    Collect, Collection, Metafield, ProductEnvelope, ProductPayload, RemoteImage, RemoteProduct,
    VariantPayload, DOWNSTREAM_PATHS_KEY,
};
