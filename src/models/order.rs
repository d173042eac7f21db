use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

use super::ProductId;

/// Lifecycle state of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

/// Orders in these states count as completed purchases for mining
pub const PARTICIPATING_STATUSES: [OrderStatus; 4] = [
    OrderStatus::Delivered,
    OrderStatus::Confirmed,
    OrderStatus::Processing,
    OrderStatus::Shipped,
];

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "confirmed" => Ok(OrderStatus::Confirmed),
            "processing" => Ok(OrderStatus::Processing),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(format!("unknown order status: {}", other)),
        }
    }
}

/// One line of an order. `product_id` is `None` once the product was deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: Option<ProductId>,
    pub quantity: u32,
}

impl OrderItem {
    pub fn of(product_id: impl Into<ProductId>) -> Self {
        Self {
            product_id: Some(product_id.into()),
            quantity: 1,
        }
    }

    pub fn deleted() -> Self {
        Self {
            product_id: None,
            quantity: 1,
        }
    }
}

/// A persisted order with its line items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
}

impl Order {
    pub fn new(id: i64, status: OrderStatus, items: Vec<OrderItem>) -> Self {
        Self { id, status, items }
    }
}
