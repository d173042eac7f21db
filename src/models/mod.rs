mod order;
mod product;
mod rule;

pub use order::{Order, OrderItem, OrderStatus, PARTICIPATING_STATUSES};
pub use product::{BoughtTogether, Product, ProductId};
pub use rule::{AssociationRule, Itemset, RuleSet, Transaction};

use serde::{Deserialize, Serialize};

/// A rule with product ids resolved to names, for the analysis report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSummary {
    pub antecedent: Vec<String>,
    pub consequent: Vec<String>,
    pub support: f64,
    pub confidence: f64,
    pub lift: f64,
}

/// Operational view of one mining run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub transaction_count: usize,
    pub frequent_itemset_count: usize,
    pub rule_count: usize,
    pub top_rules: Vec<RuleSummary>,
}

impl AnalysisReport {
    /// Report for a run that produced no rules
    pub fn empty(transaction_count: usize) -> Self {
        Self {
            transaction_count,
            frequent_itemset_count: 0,
            rule_count: 0,
            top_rules: Vec::new(),
        }
    }
}
