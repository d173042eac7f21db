use crate::{
    db::OrderStore,
    models::{Order, Transaction, PARTICIPATING_STATUSES},
};

/// Builds the transactions a mining run works on from the full order history.
///
/// Store failures degrade to an empty list: recommendations are an optional
/// feature and must not fail the page that asks for them.
pub async fn extract_transactions(store: &dyn OrderStore) -> Vec<Transaction> {
    let orders = match store.orders_with_status_in(&PARTICIPATING_STATUSES).await {
        Ok(orders) => orders,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load orders for transaction extraction");
            return Vec::new();
        }
    };

    if orders.is_empty() {
        tracing::info!("No orders found for Apriori analysis");
        return Vec::new();
    }

    let transactions: Vec<Transaction> = orders.iter().filter_map(transaction_from_order).collect();

    tracing::info!(
        orders = orders.len(),
        transactions = transactions.len(),
        "Extracted transactions for Apriori analysis"
    );

    transactions
}

/// The distinct products of a participating order, if it has at least two.
/// Line items whose product was deleted are skipped.
pub fn transaction_from_order(order: &Order) -> Option<Transaction> {
    if !PARTICIPATING_STATUSES.contains(&order.status) {
        return None;
    }

    let transaction = Transaction::new(order.items.iter().filter_map(|item| item.product_id));

    // Single-product orders carry no co-occurrence signal
    (transaction.len() >= 2).then_some(transaction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MockOrderStore;
    use crate::error::AppError;
    use crate::models::{OrderItem, OrderStatus, ProductId};

    fn order(id: i64, status: OrderStatus, products: &[i64]) -> Order {
        Order::new(id, status, products.iter().map(|&p| OrderItem::of(p)).collect())
    }

    #[test]
    fn test_transaction_from_order_dedupes_products() {
        let tx = transaction_from_order(&order(1, OrderStatus::Delivered, &[3, 1, 3])).unwrap();
        let items: Vec<ProductId> = tx.items().iter().copied().collect();
        assert_eq!(items, vec![ProductId(1), ProductId(3)]);
    }

    #[test]
    fn test_transaction_from_order_discards_single_product() {
        assert!(transaction_from_order(&order(1, OrderStatus::Shipped, &[5])).is_none());
        // Same product twice is still one distinct product
        assert!(transaction_from_order(&order(2, OrderStatus::Shipped, &[5, 5])).is_none());
    }

    #[test]
    fn test_transaction_from_order_skips_deleted_products() {
        let mut o = order(1, OrderStatus::Confirmed, &[1]);
        o.items.push(OrderItem::deleted());
        assert!(transaction_from_order(&o).is_none());

        o.items.push(OrderItem::of(2));
        assert_eq!(transaction_from_order(&o).unwrap().len(), 2);
    }

    #[test]
    fn test_transaction_from_order_ignores_non_participating_status() {
        assert!(transaction_from_order(&order(1, OrderStatus::Pending, &[1, 2])).is_none());
        assert!(transaction_from_order(&order(2, OrderStatus::Cancelled, &[1, 2])).is_none());
    }

    #[tokio::test]
    async fn test_extract_requests_participating_statuses() {
        let mut store = MockOrderStore::new();
        store
            .expect_orders_with_status_in()
            .withf(|statuses| {
                statuses.len() == 4
                    && statuses.contains(&OrderStatus::Delivered)
                    && statuses.contains(&OrderStatus::Confirmed)
                    && statuses.contains(&OrderStatus::Processing)
                    && statuses.contains(&OrderStatus::Shipped)
            })
            .times(1)
            .returning(|_| {
                Ok(vec![
                    order(1, OrderStatus::Delivered, &[1, 2]),
                    order(2, OrderStatus::Processing, &[3]),
                    order(3, OrderStatus::Shipped, &[2, 3, 4]),
                ])
            });

        let transactions = extract_transactions(&store).await;
        assert_eq!(transactions.len(), 2);
        assert_eq!(transactions[1].len(), 3);
    }

    #[tokio::test]
    async fn test_extract_degrades_to_empty_on_store_error() {
        let mut store = MockOrderStore::new();
        store
            .expect_orders_with_status_in()
            .times(1)
            .returning(|_| Err(AppError::Internal("connection refused".to_string())));

        assert!(extract_transactions(&store).await.is_empty());
    }
}
