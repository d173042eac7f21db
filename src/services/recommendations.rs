use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    cached,
    db::{OrderStore, ProductStore},
    error::{AppError, AppResult, MiningError},
    models::{
        AnalysisReport, AssociationRule, BoughtTogether, Itemset, Product, ProductId, RuleSet,
        RuleSummary, Transaction,
    },
    services::{
        apriori::{Apriori, AprioriConfig, FrequentItemsets},
        association_rules::generate_rules,
        result_cache::{CacheKey, ResultCache},
        transactions::extract_transactions,
    },
};

pub const DEFAULT_RECOMMENDATION_LIMIT: usize = 4;
pub const DEFAULT_BOUGHT_TOGETHER_LIMIT: usize = 3;

/// A co-purchased product and the scores of the rule that ranked it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredProduct {
    pub product_id: ProductId,
    pub confidence: f64,
    pub support: f64,
    pub lift: f64,
}

/// Serves per-product recommendations mined from order history.
///
/// Every cache miss re-runs the whole pipeline (extract, mine, derive rules)
/// inline. Concurrent misses for the same product may each recompute; the
/// last write to the cache wins.
#[derive(Clone)]
pub struct RecommendationService {
    orders: Arc<dyn OrderStore>,
    products: Arc<dyn ProductStore>,
    cache: ResultCache,
    apriori: AprioriConfig,
}

impl RecommendationService {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        products: Arc<dyn ProductStore>,
        cache: ResultCache,
        apriori: AprioriConfig,
    ) -> Self {
        Self {
            orders,
            products,
            cache,
            apriori,
        }
    }

    pub fn apriori_config(&self) -> &AprioriConfig {
        &self.apriori
    }

    /// Mines association rules from the current order history.
    ///
    /// Returns `None` when there is not enough data, when no rule reaches
    /// `min_confidence`, or when mining fails; failures are logged.
    pub async fn run_analysis(&self, config: &AprioriConfig) -> Option<RuleSet> {
        let run_id = Uuid::new_v4();
        let transactions = extract_transactions(self.orders.as_ref()).await;

        let (frequent, rules) = match mine(&transactions, config) {
            Ok(mined) => mined,
            Err(e) if e.is_insufficient_data() => {
                tracing::info!(%run_id, reason = %e, "Insufficient data for Apriori rules");
                return None;
            }
            Err(e) => {
                tracing::error!(%run_id, error = %e, "Error in Apriori analysis");
                return None;
            }
        };

        if rules.is_empty() {
            tracing::info!(
                %run_id,
                min_confidence = config.min_confidence,
                "No association rules found with current confidence threshold"
            );
            return None;
        }

        tracing::info!(
            %run_id,
            transactions = transactions.len(),
            itemsets = frequent.len(),
            rules = rules.len(),
            "Generated association rules"
        );

        Some(RuleSet {
            run_id,
            transaction_count: transactions.len(),
            frequent_itemset_count: frequent.len(),
            mined_at: Utc::now(),
            rules,
        })
    }

    /// Up to `limit` active products bought alongside `product_id`.
    ///
    /// Never fails; an empty list means no signal. The result (empty or
    /// not) is cached per product for the configured TTL.
    pub async fn get_product_recommendations(&self, product_id: ProductId, limit: usize) -> Vec<Product> {
        cached!(
            self.cache,
            CacheKey::Recommendations(product_id),
            self.compute_recommendations(product_id, limit)
        )
    }

    /// Up to `limit` active products most confidently bought with
    /// `product_id`, ranked by confidence then lift, with rule scores attached.
    pub async fn get_frequently_bought_together(
        &self,
        product_id: ProductId,
        limit: usize,
    ) -> Vec<BoughtTogether> {
        cached!(
            self.cache,
            CacheKey::BoughtTogether(product_id),
            self.compute_bought_together(product_id, limit)
        )
    }

    /// See [`ResultCache::clear`]
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Runs the pipeline and summarizes its output for operators.
    ///
    /// Unlike the recommendation calls this reports failures, except for
    /// plain lack of data which yields an empty report.
    pub async fn analysis_report(&self, config: &AprioriConfig, top: usize) -> AppResult<AnalysisReport> {
        config.validate()?;

        let transactions = extract_transactions(self.orders.as_ref()).await;
        let (frequent, mut rules) = match mine(&transactions, config) {
            Ok(mined) => mined,
            Err(e) if e.is_insufficient_data() => {
                return Ok(AnalysisReport::empty(transactions.len()));
            }
            Err(e) => return Err(AppError::Mining(e)),
        };

        rules.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then(b.lift.total_cmp(&a.lift))
        });

        let shown = &rules[..top.min(rules.len())];
        let mut ids: Vec<ProductId> = shown
            .iter()
            .flat_map(|r| r.antecedent.iter().chain(r.consequent.iter()).copied())
            .collect();
        ids.sort();
        ids.dedup();

        let names: HashMap<ProductId, String> = self
            .products
            .products_by_ids(&ids, false)
            .await?
            .into_iter()
            .map(|p| (p.id, p.name))
            .collect();

        let name_all = |itemset: &Itemset| -> Vec<String> {
            itemset
                .iter()
                .map(|id| names.get(id).cloned().unwrap_or_else(|| format!("#{}", id)))
                .collect()
        };

        Ok(AnalysisReport {
            transaction_count: transactions.len(),
            frequent_itemset_count: frequent.len(),
            rule_count: rules.len(),
            top_rules: shown
                .iter()
                .map(|rule| RuleSummary {
                    antecedent: name_all(&rule.antecedent),
                    consequent: name_all(&rule.consequent),
                    support: rule.support,
                    confidence: rule.confidence,
                    lift: rule.lift,
                })
                .collect(),
        })
    }

    async fn compute_recommendations(&self, product_id: ProductId, limit: usize) -> Vec<Product> {
        let Some(rule_set) = self.run_analysis(&self.apriori).await else {
            tracing::info!(%product_id, "No Apriori rules available");
            return Vec::new();
        };

        let ids: Vec<ProductId> = recommended_ids(&rule_set.rules, product_id)
            .into_iter()
            .take(limit)
            .collect();

        if ids.is_empty() {
            tracing::info!(%product_id, "No specific recommendations found");
            return Vec::new();
        }

        let products = self.resolve_active(&ids).await;
        tracing::info!(
            %product_id,
            found = products.len(),
            "Found Apriori recommendations"
        );
        products
    }

    async fn compute_bought_together(&self, product_id: ProductId, limit: usize) -> Vec<BoughtTogether> {
        let Some(rule_set) = self.run_analysis(&self.apriori).await else {
            return Vec::new();
        };

        let ranked = bought_together_ranking(&rule_set.rules, product_id, limit);
        if ranked.is_empty() {
            return Vec::new();
        }

        let ids: Vec<ProductId> = ranked.iter().map(|s| s.product_id).collect();
        let mut products: HashMap<ProductId, Product> = self
            .resolve_active(&ids)
            .await
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        ranked
            .into_iter()
            .filter_map(|scored| {
                products.remove(&scored.product_id).map(|product| BoughtTogether {
                    product,
                    confidence: scored.confidence,
                    support: scored.support,
                    lift: scored.lift,
                })
            })
            .collect()
    }

    /// Active products for `ids`, in the order of `ids`. Store errors yield
    /// an empty list.
    async fn resolve_active(&self, ids: &[ProductId]) -> Vec<Product> {
        let products = match self.products.products_by_ids(ids, true).await {
            Ok(products) => products,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load recommended products");
                return Vec::new();
            }
        };

        let mut by_id: HashMap<ProductId, Product> =
            products.into_iter().map(|p| (p.id, p)).collect();
        ids.iter().filter_map(|id| by_id.remove(id)).collect()
    }
}

fn mine(
    transactions: &[Transaction],
    config: &AprioriConfig,
) -> Result<(FrequentItemsets, Vec<AssociationRule>), MiningError> {
    let frequent = Apriori::new(*config).mine(transactions)?;
    let rules = generate_rules(&frequent, config.min_confidence)?;
    Ok((frequent, rules))
}

/// Products co-purchased with `product_id`, in first-seen rule order.
///
/// Looks at rules with `product_id` in the antecedent first. Rules are
/// directional, so when that finds nothing the rules with `product_id` in
/// the consequent are used instead. `product_id` itself is never returned.
pub fn recommended_ids(rules: &[AssociationRule], product_id: ProductId) -> Vec<ProductId> {
    let ids = collect_related(rules, product_id, |r| (&r.antecedent, &r.consequent));
    if !ids.is_empty() {
        return ids;
    }
    collect_related(rules, product_id, |r| (&r.consequent, &r.antecedent))
}

fn collect_related<F>(rules: &[AssociationRule], product_id: ProductId, sides: F) -> Vec<ProductId>
where
    F: Fn(&AssociationRule) -> (&Itemset, &Itemset),
{
    let mut ids = Vec::new();

    for rule in rules {
        let (matched, related) = sides(rule);
        if !matched.contains(&product_id) {
            continue;
        }
        for &id in related {
            if id != product_id && !ids.contains(&id) {
                ids.push(id);
            }
        }
    }

    ids
}

/// Consequents of rules whose antecedent contains `product_id`, ranked by
/// confidence then lift (both descending), one entry per product (its best),
/// truncated to `limit`.
pub fn bought_together_ranking(
    rules: &[AssociationRule],
    product_id: ProductId,
    limit: usize,
) -> Vec<ScoredProduct> {
    let mut scored: Vec<ScoredProduct> = rules
        .iter()
        .filter(|rule| rule.antecedent.contains(&product_id))
        .flat_map(|rule| {
            rule.consequent
                .iter()
                .filter(move |&&id| id != product_id)
                .map(move |&id| ScoredProduct {
                    product_id: id,
                    confidence: rule.confidence,
                    support: rule.support,
                    lift: rule.lift,
                })
        })
        .collect();

    // Stable sort keeps rule order among exact ties
    scored.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then(b.lift.total_cmp(&a.lift))
    });

    let mut seen = Vec::new();
    scored.retain(|s| {
        if seen.contains(&s.product_id) {
            false
        } else {
            seen.push(s.product_id);
            true
        }
    });
    scored.truncate(limit);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{InMemoryProductStore, MemoryCache, MockCacheStore, MockOrderStore, MockProductStore};
    use crate::models::{Order, OrderItem, OrderStatus};
    use crate::services::result_cache::CacheConfig;

    const A: ProductId = ProductId(1);
    const B: ProductId = ProductId(2);
    const C: ProductId = ProductId(3);

    fn baskets(raw: &[&[i64]]) -> Vec<Order> {
        raw.iter()
            .enumerate()
            .map(|(i, items)| {
                Order::new(
                    i as i64 + 1,
                    OrderStatus::Delivered,
                    items.iter().map(|&p| OrderItem::of(p)).collect(),
                )
            })
            .collect()
    }

    fn scenario_orders() -> Vec<Order> {
        baskets(&[&[1, 2], &[1, 2], &[1, 3], &[1, 2, 3]])
    }

    fn catalog() -> Vec<Product> {
        vec![
            Product::new(1, "Espresso Machine", 34900),
            Product::new(2, "Coffee Beans", 1499),
            Product::new(3, "Milk Frother", 2999),
            Product::new(9, "Descaler", 899),
        ]
    }

    /// Order store that expects exactly `mining_runs` reads
    fn order_store(orders: Vec<Order>, mining_runs: usize) -> MockOrderStore {
        let mut store = MockOrderStore::new();
        store
            .expect_orders_with_status_in()
            .times(mining_runs)
            .returning(move |_| Ok(orders.clone()));
        store
    }

    fn service_with(orders: MockOrderStore, products: Vec<Product>, apriori: AprioriConfig) -> RecommendationService {
        RecommendationService::new(
            Arc::new(orders),
            Arc::new(InMemoryProductStore::new(products)),
            ResultCache::new(Arc::new(MemoryCache::new()), CacheConfig::default()),
            apriori,
        )
    }

    fn rule(antecedent: &[i64], consequent: &[i64], confidence: f64, lift: f64) -> AssociationRule {
        AssociationRule {
            antecedent: antecedent.iter().copied().map(ProductId).collect(),
            consequent: consequent.iter().copied().map(ProductId).collect(),
            support: 0.1,
            confidence,
            lift,
        }
    }

    fn ids_of(products: &[Product]) -> Vec<ProductId> {
        products.iter().map(|p| p.id).collect()
    }

    #[tokio::test]
    async fn test_run_analysis_scenario() {
        let service = service_with(order_store(scenario_orders(), 1), catalog(), AprioriConfig::default());

        let rule_set = service.run_analysis(&AprioriConfig::default()).await.unwrap();
        assert_eq!(rule_set.transaction_count, 4);
        assert_eq!(rule_set.frequent_itemset_count, 7);

        let a_b = rule_set
            .rules
            .iter()
            .find(|r| r.antecedent == Itemset::from([A]) && r.consequent == Itemset::from([B]))
            .unwrap();
        assert_eq!(a_b.confidence, 0.75);
    }

    #[tokio::test]
    async fn test_run_analysis_insufficient_data() {
        for orders in [Vec::new(), baskets(&[&[1, 2]])] {
            let service = service_with(order_store(orders, 1), catalog(), AprioriConfig::default());
            assert!(service.run_analysis(&AprioriConfig::default()).await.is_none());
        }
    }

    #[tokio::test]
    async fn test_run_analysis_invalid_threshold_is_absent() {
        let service = service_with(order_store(scenario_orders(), 1), catalog(), AprioriConfig::default());
        let config = AprioriConfig::default().with_min_support(2.0);
        assert!(service.run_analysis(&config).await.is_none());
    }

    #[tokio::test]
    async fn test_recommendations_scenario() {
        let service = service_with(order_store(scenario_orders(), 1), catalog(), AprioriConfig::default());

        let products = service.get_product_recommendations(A, 2).await;
        assert_eq!(ids_of(&products), vec![B, C]);
    }

    #[tokio::test]
    async fn test_bought_together_scenario_ranks_by_confidence() {
        let service = service_with(order_store(scenario_orders(), 1), catalog(), AprioriConfig::default());

        let together = service.get_frequently_bought_together(A, 2).await;
        assert_eq!(together.len(), 2);
        assert_eq!(together[0].product.id, B);
        assert_eq!(together[0].confidence, 0.75);
        assert_eq!(together[1].product.id, C);
        assert_eq!(together[1].confidence, 0.5);
        assert_eq!(together[1].lift, 1.0);
    }

    #[tokio::test]
    async fn test_cache_idempotence_mines_once() {
        let service = service_with(order_store(scenario_orders(), 1), catalog(), AprioriConfig::default());

        let first = service.get_product_recommendations(A, 4).await;
        let second = service.get_product_recommendations(A, 4).await;

        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_empty_result_is_cached() {
        let service = service_with(order_store(baskets(&[&[1, 2]]), 1), catalog(), AprioriConfig::default());

        assert!(service.get_product_recommendations(A, 4).await.is_empty());
        assert!(service.get_product_recommendations(A, 4).await.is_empty());
    }

    #[tokio::test]
    async fn test_modes_are_cached_separately() {
        let service = service_with(order_store(scenario_orders(), 2), catalog(), AprioriConfig::default());

        service.get_product_recommendations(A, 4).await;
        service.get_frequently_bought_together(A, 3).await;
        service.get_frequently_bought_together(A, 3).await;
    }

    #[tokio::test]
    async fn test_fallback_to_consequent_rules() {
        // 1 => 9 and 1 => 2 fall below 0.9 confidence; 9 => 1 and 2 => 1 hold
        let orders = baskets(&[&[1, 9], &[1, 9], &[1, 9], &[1, 2], &[1, 2]]);
        let service = service_with(
            order_store(orders, 1),
            catalog(),
            AprioriConfig::default().with_min_confidence(0.9),
        );

        let products = service.get_product_recommendations(A, 4).await;
        assert_eq!(ids_of(&products), vec![B, ProductId(9)]);
    }

    #[tokio::test]
    async fn test_bought_together_has_no_fallback() {
        let orders = baskets(&[&[1, 9], &[1, 9], &[1, 9], &[1, 2], &[1, 2]]);
        let service = service_with(
            order_store(orders, 1),
            catalog(),
            AprioriConfig::default().with_min_confidence(0.9),
        );

        assert!(service.get_frequently_bought_together(A, 3).await.is_empty());
    }

    #[tokio::test]
    async fn test_recommendations_exclude_the_product_itself() {
        let service = service_with(order_store(scenario_orders(), 1), catalog(), AprioriConfig::default());

        let products = service.get_product_recommendations(B, 4).await;
        assert!(!products.is_empty());
        assert!(!ids_of(&products).contains(&B));
    }

    #[tokio::test]
    async fn test_inactive_products_are_filtered_after_limit() {
        let mut products = catalog();
        products[1] = products[1].clone().inactive();
        let service = service_with(order_store(scenario_orders(), 1), products, AprioriConfig::default());

        // B is ranked first but inactive; the limit is applied before filtering
        let result = service.get_product_recommendations(A, 1).await;
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_product_store_failure_yields_empty() {
        let mut products = MockProductStore::new();
        products
            .expect_products_by_ids()
            .returning(|_, _| Err(AppError::Internal("catalog offline".to_string())));

        let service = RecommendationService::new(
            Arc::new(order_store(scenario_orders(), 1)),
            Arc::new(products),
            ResultCache::new(Arc::new(MemoryCache::new()), CacheConfig::default()),
            AprioriConfig::default(),
        );

        assert!(service.get_product_recommendations(A, 4).await.is_empty());
    }

    #[tokio::test]
    async fn test_cache_outage_still_serves() {
        let mut cache = MockCacheStore::new();
        cache
            .expect_get()
            .returning(|_| Err(AppError::Internal("redis down".to_string())));
        cache
            .expect_set()
            .returning(|_, _, _| Err(AppError::Internal("redis down".to_string())));

        let service = RecommendationService::new(
            Arc::new(order_store(scenario_orders(), 2)),
            Arc::new(InMemoryProductStore::new(catalog())),
            ResultCache::new(Arc::new(cache), CacheConfig::default()),
            AprioriConfig::default(),
        );

        assert_eq!(ids_of(&service.get_product_recommendations(A, 2).await), vec![B, C]);
        assert_eq!(ids_of(&service.get_product_recommendations(A, 2).await), vec![B, C]);
    }

    #[tokio::test]
    async fn test_analysis_report() {
        let service = service_with(order_store(scenario_orders(), 1), catalog(), AprioriConfig::default());

        let report = service.analysis_report(&AprioriConfig::default(), 3).await.unwrap();
        assert_eq!(report.transaction_count, 4);
        assert_eq!(report.rule_count, 12);
        assert_eq!(report.top_rules.len(), 3);
        assert_eq!(report.top_rules[0].confidence, 1.0);
        assert!(report.top_rules[0].consequent.contains(&"Espresso Machine".to_string()));
    }

    #[tokio::test]
    async fn test_analysis_report_without_data_is_empty() {
        let service = service_with(order_store(Vec::new(), 1), catalog(), AprioriConfig::default());

        let report = service.analysis_report(&AprioriConfig::default(), 10).await.unwrap();
        assert_eq!(report.transaction_count, 0);
        assert_eq!(report.rule_count, 0);
        assert!(report.top_rules.is_empty());
    }

    #[tokio::test]
    async fn test_analysis_report_rejects_invalid_config() {
        let service = service_with(order_store(Vec::new(), 0), catalog(), AprioriConfig::default());

        let result = service
            .analysis_report(&AprioriConfig::default().with_min_confidence(3.0), 10)
            .await;
        assert!(matches!(result, Err(AppError::Mining(MiningError::InvalidThreshold { .. }))));
    }

    #[test]
    fn test_recommended_ids_dedupes_in_first_seen_order() {
        let rules = vec![
            rule(&[1], &[3], 0.2, 1.0),
            rule(&[1, 4], &[3, 2], 0.9, 1.0),
            rule(&[5], &[1], 0.9, 1.0),
            rule(&[1], &[2], 0.5, 1.0),
        ];
        assert_eq!(
            recommended_ids(&rules, A),
            vec![C, B]
        );
    }

    #[test]
    fn test_recommended_ids_fallback_and_exclusion() {
        let rules = vec![
            rule(&[2], &[1], 0.9, 1.0),
            rule(&[3, 1], &[1, 4], 0.9, 1.0),
            rule(&[5], &[6], 0.9, 1.0),
        ];
        // Product 4 only ever appears as a consequent
        assert_eq!(recommended_ids(&rules, ProductId(4)), vec![A, C]);
        assert!(!recommended_ids(&rules, A).contains(&A));
        assert!(recommended_ids(&rules, ProductId(7)).is_empty());
    }

    #[test]
    fn test_bought_together_ranking_orders_and_dedupes() {
        let rules = vec![
            rule(&[1], &[2], 0.5, 0.8),
            rule(&[1], &[3], 0.5, 1.4),
            rule(&[1, 3], &[2], 0.9, 1.1),
            rule(&[2], &[4], 1.0, 2.0),
        ];

        let ranked = bought_together_ranking(&rules, A, 3);
        let ids: Vec<ProductId> = ranked.iter().map(|s| s.product_id).collect();
        assert_eq!(ids, vec![B, C]);
        assert_eq!(ranked[0].confidence, 0.9);

        assert_eq!(bought_together_ranking(&rules, A, 1).len(), 1);
    }
}
