pub mod apriori;
pub mod association_rules;
pub mod recommendations;
pub mod result_cache;
pub mod transactions;

pub use apriori::{Apriori, AprioriConfig, FrequentItemsets};
pub use association_rules::generate_rules;
pub use recommendations::RecommendationService;
pub use result_cache::{CacheConfig, CacheKey, ResultCache};
pub use transactions::extract_transactions;
