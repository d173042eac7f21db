use crate::{
    error::MiningError,
    models::{AssociationRule, Itemset, ProductId},
    services::apriori::{check_confidence, FrequentItemsets},
};

/// Itemsets larger than this are not split into rules (2^n bipartitions)
pub const MAX_RULE_ITEMSET_LEN: usize = 20;

/// Derives every rule antecedent => consequent from the frequent itemsets
/// whose confidence reaches `min_confidence`.
///
/// Each frequent itemset of two or more products is split every possible way
/// into two non-empty sides. Rules come out in itemset order, then split
/// order; ranking for display is left to the caller.
pub fn generate_rules(
    frequent: &FrequentItemsets,
    min_confidence: f64,
) -> Result<Vec<AssociationRule>, MiningError> {
    check_confidence(min_confidence)?;

    let mut rules = Vec::new();

    for (itemset, support) in frequent.iter() {
        if itemset.len() < 2 {
            continue;
        }
        if itemset.len() > MAX_RULE_ITEMSET_LEN {
            return Err(MiningError::ItemsetTooLarge(itemset.len()));
        }

        let items: Vec<ProductId> = itemset.iter().copied().collect();
        let full_mask: u32 = (1 << items.len()) - 1;

        for mask in 1..full_mask {
            let (antecedent, consequent) = split(&items, mask);

            let antecedent_support = support_of(frequent, &antecedent)?;
            let confidence = support / antecedent_support;
            if confidence < min_confidence {
                continue;
            }

            let consequent_support = support_of(frequent, &consequent)?;
            let lift = confidence / consequent_support;

            rules.push(AssociationRule {
                antecedent,
                consequent,
                support,
                confidence,
                lift,
            });
        }
    }

    tracing::debug!(
        itemsets = frequent.len(),
        rules = rules.len(),
        min_confidence,
        "Generated association rules"
    );

    Ok(rules)
}

/// Items whose bit is set in `mask` go to the antecedent, the rest to the consequent
fn split(items: &[ProductId], mask: u32) -> (Itemset, Itemset) {
    let mut antecedent = Itemset::new();
    let mut consequent = Itemset::new();

    for (i, &item) in items.iter().enumerate() {
        if mask & (1 << i) != 0 {
            antecedent.insert(item);
        } else {
            consequent.insert(item);
        }
    }

    (antecedent, consequent)
}

fn support_of(frequent: &FrequentItemsets, itemset: &Itemset) -> Result<f64, MiningError> {
    frequent
        .support(itemset)
        .ok_or_else(|| MiningError::MissingSupport(itemset.iter().copied().collect()))
}
