use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use super::ProductId;

/// An ordered set of product identifiers
pub type Itemset = BTreeSet<ProductId>;

/// The distinct products bought together in one qualifying order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    items: Itemset,
}

impl Transaction {
    /// Builds a transaction, dropping duplicate product ids
    pub fn new(items: impl IntoIterator<Item = ProductId>) -> Self {
        Self {
            items: items.into_iter().collect(),
        }
    }

    pub fn items(&self) -> &Itemset {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// True when every product of `itemset` was bought in this transaction
    pub fn contains_all(&self, itemset: &Itemset) -> bool {
        itemset.len() <= self.items.len() && itemset.is_subset(&self.items)
    }
}

/// Association rule: antecedent => consequent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociationRule {
    pub antecedent: Itemset,
    pub consequent: Itemset,
    /// support(antecedent ∪ consequent)
    pub support: f64,
    /// support(antecedent ∪ consequent) / support(antecedent)
    pub confidence: f64,
    /// confidence / support(consequent)
    pub lift: f64,
}

/// Rules produced by one mining run
#[derive(Debug, Clone, Serialize)]
pub struct RuleSet {
    pub run_id: Uuid,
    pub transaction_count: usize,
    pub frequent_itemset_count: usize,
    pub mined_at: DateTime<Utc>,
    pub rules: Vec<AssociationRule>,
}
