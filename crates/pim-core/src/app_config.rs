use std::path::PathBuf;

#[derive(Clone)]
pub struct AppConfig {
    /// Admin API root, e.g. `https://shop.myshopify.com/admin/api/2024-01`.
    pub shopify_base_url: String,
    pub shopify_access_token: String,
    pub workspace_dir: PathBuf,
    pub log_level: String,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub user_agent: String,
    pub max_concurrent_products: usize,
    pub rate_limit_burst: u32,
    pub rate_limit_per_sec: f64,
    pub vendor: String,
    pub product_tags: String,
    pub associate_category_collections: bool,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("shopify_base_url", &self.shopify_base_url)
            .field("shopify_access_token", &"[redacted]")
            .field("workspace_dir", &self.workspace_dir)
            .field("log_level", &self.log_level)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("max_concurrent_products", &self.max_concurrent_products)
            .field("rate_limit_burst", &self.rate_limit_burst)
            .field("rate_limit_per_sec", &self.rate_limit_per_sec)
            .field("vendor", &self.vendor)
            .field("product_tags", &self.product_tags)
            .field(
                "associate_category_collections",
                &self.associate_category_collections,
            )
            .finish()
    }
}
