use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Identifier of a catalog product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub i64);

impl Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ProductId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// A catalog product as returned to callers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    /// Unit price in cents (e.g., 1999 = 19.99)
    pub price_cents: i64,
    pub category: Option<String>,
    pub is_active: bool,
}

impl Product {
    /// Creates an active product without a category
    pub fn new(id: impl Into<ProductId>, name: impl Into<String>, price_cents: i64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price_cents,
            category: None,
            is_active: true,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// A product surfaced by the "frequently bought together" lookup, with the
/// scores of the rule that ranked it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BoughtTogether {
    #[serde(flatten)]
    pub product: Product,
    pub confidence: f64,
    pub support: f64,
    pub lift: f64,
}
