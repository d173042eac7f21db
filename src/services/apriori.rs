//! Level-wise Apriori search for frequent itemsets.
//!
//! Candidates of size k are built only by extending a frequent (k-1)-itemset
//! with a frequent single item, and are dropped before counting unless every
//! one of their (k-1)-subsets is frequent. Support is counted by set
//! containment against each transaction.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{
    error::MiningError,
    models::{Itemset, ProductId, Transaction},
};

pub const DEFAULT_MIN_SUPPORT: f64 = 0.01;
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.10;

/// Thresholds for one mining run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AprioriConfig {
    /// Minimum fraction of transactions an itemset must appear in, in (0, 1]
    pub min_support: f64,
    /// Minimum confidence for a rule to be kept, in [0, 1]
    pub min_confidence: f64,
    /// Stop growing itemsets past this size
    pub max_len: Option<usize>,
}

impl Default for AprioriConfig {
    fn default() -> Self {
        Self {
            min_support: DEFAULT_MIN_SUPPORT,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            max_len: None,
        }
    }
}

impl AprioriConfig {
    pub fn with_min_support(mut self, min_support: f64) -> Self {
        self.min_support = min_support;
        self
    }

    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = Some(max_len);
        self
    }

    pub fn validate(&self) -> Result<(), MiningError> {
        if !(self.min_support.is_finite() && self.min_support > 0.0 && self.min_support <= 1.0) {
            return Err(MiningError::InvalidThreshold {
                name: "min_support",
                value: self.min_support,
            });
        }
        check_confidence(self.min_confidence)?;
        if self.max_len == Some(0) {
            return Err(MiningError::InvalidThreshold {
                name: "max_len",
                value: 0.0,
            });
        }
        Ok(())
    }
}

pub(crate) fn check_confidence(min_confidence: f64) -> Result<(), MiningError> {
    if min_confidence.is_finite() && (0.0..=1.0).contains(&min_confidence) {
        Ok(())
    } else {
        Err(MiningError::InvalidThreshold {
            name: "min_confidence",
            value: min_confidence,
        })
    }
}

/// Every frequent itemset of a run with its support
#[derive(Debug, Clone, PartialEq)]
pub struct FrequentItemsets {
    supports: BTreeMap<Itemset, f64>,
    transaction_count: usize,
}

impl FrequentItemsets {
    pub fn support(&self, itemset: &Itemset) -> Option<f64> {
        self.supports.get(itemset).copied()
    }

    /// Itemsets in ascending itemset order
    pub fn iter(&self) -> impl Iterator<Item = (&Itemset, f64)> {
        self.supports.iter().map(|(itemset, support)| (itemset, *support))
    }

    pub fn len(&self) -> usize {
        self.supports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.supports.is_empty()
    }

    pub fn transaction_count(&self) -> usize {
        self.transaction_count
    }

    /// Size of the largest frequent itemset
    pub fn max_len(&self) -> usize {
        self.supports.keys().map(|s| s.len()).max().unwrap_or(0)
    }
}

/// Frequent itemset miner
#[derive(Debug, Clone)]
pub struct Apriori {
    config: AprioriConfig,
}

impl Apriori {
    pub fn new(config: AprioriConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AprioriConfig {
        &self.config
    }

    /// Finds every itemset whose support reaches `min_support`.
    ///
    /// Fewer than two transactions, or no frequent single product, is
    /// reported as an error rather than an empty result so callers can tell
    /// "not enough data" apart from a finished search.
    pub fn mine(&self, transactions: &[Transaction]) -> Result<FrequentItemsets, MiningError> {
        self.config.validate()?;

        if transactions.len() < 2 {
            return Err(MiningError::InsufficientTransactions {
                found: transactions.len(),
            });
        }

        let total = transactions.len() as f64;
        let mut level = self.frequent_singletons(transactions, total);
        if level.is_empty() {
            return Err(MiningError::NoFrequentItemsets {
                min_support: self.config.min_support,
            });
        }

        let frequent_items: Vec<ProductId> =
            level.keys().filter_map(|s| s.first().copied()).collect();

        let mut supports = BTreeMap::new();
        let mut k = 1;

        loop {
            supports.extend(level.iter().map(|(itemset, support)| (itemset.clone(), *support)));

            if self.config.max_len.is_some_and(|max| k >= max) {
                break;
            }

            let candidates = generate_candidates(&level, &frequent_items);
            if candidates.is_empty() {
                break;
            }

            level = self.count_supports(candidates, transactions, total);
            if level.is_empty() {
                break;
            }

            k += 1;
            tracing::debug!(level = k, frequent = level.len(), "Apriori level complete");
        }

        Ok(FrequentItemsets {
            supports,
            transaction_count: transactions.len(),
        })
    }

    fn frequent_singletons(&self, transactions: &[Transaction], total: f64) -> BTreeMap<Itemset, f64> {
        let mut counts: BTreeMap<ProductId, usize> = BTreeMap::new();
        for transaction in transactions {
            for &item in transaction.items() {
                *counts.entry(item).or_insert(0) += 1;
            }
        }

        counts
            .into_iter()
            .map(|(item, count)| (item, count as f64 / total))
            .filter(|(_, support)| *support >= self.config.min_support)
            .map(|(item, support)| (Itemset::from([item]), support))
            .collect()
    }

    fn count_supports(
        &self,
        candidates: Vec<Itemset>,
        transactions: &[Transaction],
        total: f64,
    ) -> BTreeMap<Itemset, f64> {
        candidates
            .into_iter()
            .map(|candidate| {
                let count = transactions
                    .iter()
                    .filter(|t| t.contains_all(&candidate))
                    .count();
                (candidate, count as f64 / total)
            })
            .filter(|(_, support)| *support >= self.config.min_support)
            .collect()
    }
}

/// Extends each frequent (k-1)-itemset with every frequent item greater than
/// its largest member, keeping only candidates whose (k-1)-subsets are all
/// frequent. Extending past the largest member yields each candidate once.
fn generate_candidates(
    previous: &BTreeMap<Itemset, f64>,
    frequent_items: &[ProductId],
) -> Vec<Itemset> {
    let mut candidates = Vec::new();

    for itemset in previous.keys() {
        let Some(&largest) = itemset.last() else {
            continue;
        };

        for &item in frequent_items.iter().filter(|&&item| item > largest) {
            let mut candidate = itemset.clone();
            candidate.insert(item);

            if all_subsets_frequent(&candidate, previous) {
                candidates.push(candidate);
            }
        }
    }

    candidates
}

fn all_subsets_frequent(candidate: &Itemset, previous: &BTreeMap<Itemset, f64>) -> bool {
    candidate.iter().all(|item| {
        let mut subset = candidate.clone();
        subset.remove(item);
        previous.contains_key(&subset)
    })
}
