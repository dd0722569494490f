use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ProductError;

/// A node in a vendor's category tree, as written by the enrichment step.
///
/// Only the upward `parent` chain is kept; child listings in the enriched
/// JSON are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Box<Category>>,
}

impl Category {
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            parent: None,
        }
    }

    #[must_use]
    pub fn with_parent(code: impl Into<String>, parent: Category) -> Self {
        Self {
            code: code.into(),
            parent: Some(Box::new(parent)),
        }
    }

    /// Returns the category codes from the root down to this node.
    ///
    /// A category `Sub` whose parent is `Brand` yields `["Brand", "Sub"]`.
    #[must_use]
    pub fn path(&self) -> Vec<String> {
        let mut codes = Vec::new();
        let mut node = Some(self);
        while let Some(category) = node {
            codes.push(category.code.clone());
            node = category.parent.as_deref();
        }
        codes.reverse();
        codes
    }
}

/// An enriched product descriptor, one per product, keyed by `code`.
///
/// `code` is the stable natural key joining local and remote state; it must
/// be non-empty and unique within a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(default)]
    pub category: Option<Category>,
    pub code: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
    /// Compare-at price shown as the struck-through "was" price.
    #[serde(default)]
    pub discount: Option<Decimal>,
    /// Older enrichment files spell this `inventryQuantity`.
    #[serde(default, alias = "inventryQuantity")]
    pub inventory_quantity: Option<i64>,
    #[serde(default)]
    pub image_urls: Vec<String>,
}

impl Product {
    /// Checks the invariants the sync engine relies on.
    ///
    /// # Errors
    ///
    /// Returns [`ProductError::EmptyCode`] for a blank code and
    /// [`ProductError::NegativeAmount`] for a negative price or discount.
    pub fn validate(&self) -> Result<(), ProductError> {
        if self.code.trim().is_empty() {
            return Err(ProductError::EmptyCode);
        }
        if !is_file_safe(&self.code) {
            return Err(ProductError::UnsafeCode {
                code: self.code.clone(),
            });
        }
        if self.price.is_sign_negative() {
            return Err(ProductError::NegativeAmount {
                code: self.code.clone(),
                field: "price",
            });
        }
        if self.discount.is_some_and(|d| d.is_sign_negative()) {
            return Err(ProductError::NegativeAmount {
                code: self.code.clone(),
                field: "discount",
            });
        }
        Ok(())
    }

    /// Category path root-first, or empty when the product is uncategorized.
    #[must_use]
    pub fn category_path(&self) -> Vec<String> {
        self.category.as_ref().map(Category::path).unwrap_or_default()
    }
}

fn is_file_safe(code: &str) -> bool {
    code != "." && code != ".." && !code.contains(['/', '\\', '\0'])
}
