//! Desired-state builder: local product descriptor -> remote representation.
//!
//! Pure and total. The same descriptor always produces the same payload, and
//! therefore byte-identical JSON, which is what makes snapshot diffing work.

use pim_core::Product;
use pim_shopify::{ProductEnvelope, ProductPayload, VariantPayload};
use rust_decimal::Decimal;

const DEFAULT_VARIANT_TITLE: &str = "Default Title";

/// Store-wide values stamped onto every product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuilderOptions {
    pub vendor: String,
    /// Comma-separated tag string.
    pub tags: String,
}

impl Default for BuilderOptions {
    fn default() -> Self {
        Self {
            vendor: "Dollareh".to_string(),
            tags: "auto-imported".to_string(),
        }
    }
}

/// Builds the canonical remote representation of `product`.
///
/// Absent optionals stay absent (never `null`) and a blank description is
/// treated as absent.
#[must_use]
pub fn build_desired(product: &Product, options: &BuilderOptions) -> ProductEnvelope {
    let variant = VariantPayload {
        price: money(product.price),
        compare_at_price: product.discount.map(money),
        inventory_quantity: product.inventory_quantity,
        title: DEFAULT_VARIANT_TITLE.to_string(),
        option1: DEFAULT_VARIANT_TITLE.to_string(),
        inventory_policy: "deny".to_string(),
        inventory_management: "shopify".to_string(),
        fulfillment_service: "manual".to_string(),
        taxable: true,
        requires_shipping: true,
    };

    ProductEnvelope {
        product: ProductPayload {
            title: product.title.trim().to_string(),
            body_html: product
                .description
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
            handle: product.code.trim().to_string(),
            vendor: options.vendor.clone(),
            tags: options.tags.clone(),
            variants: vec![variant],
        },
    }
}

/// Fixes money to two decimal places so `12`, `12.0` and `12.00` all render
/// as `"12.00"`.
fn money(amount: Decimal) -> Decimal {
    let mut rounded = amount.round_dp(2);
    rounded.rescale(2);
    rounded
}
