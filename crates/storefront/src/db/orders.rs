//! Order persistence.
//!
//! An order and its items are written in one transaction. Items are never
//! updated afterwards; only the order's payment fields change.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use lifebiotech_core::{OrderId, UserId};

use super::RepositoryError;
use crate::models::{NewOrderItem, Order, OrderItem};
use crate::services::checkout::OrderStore;

const ORDER_COLUMNS: &str = "id, user_id, total_amount, shipping_address, status, payment_status, \
                             payment_id, gateway_order_id, created_at, updated_at";

/// An order together with its items.
#[derive(Debug, Clone, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Repository for `storefront."order"` and `storefront.order_item`.
#[derive(Clone, Copy)]
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All orders for a user, newest first, with their items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<OrderWithItems>, RepositoryError> {
        let sql = format!(
            r#"
            SELECT {ORDER_COLUMNS}
            FROM storefront."order"
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#
        );
        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(user_id)
            .fetch_all(self.pool)
            .await?;

        if orders.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = orders.iter().map(|o| o.id.as_uuid()).collect();
        let items = sqlx::query_as::<_, OrderItem>(
            r"
            SELECT id, order_id, product_id, quantity, price
            FROM storefront.order_item
            WHERE order_id = ANY($1)
            ORDER BY id
            ",
        )
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        let mut by_order: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for item in items {
            by_order.entry(item.order_id).or_default().push(item);
        }

        Ok(orders
            .into_iter()
            .map(|order| {
                let items = by_order.remove(&order.id).unwrap_or_default();
                OrderWithItems { order, items }
            })
            .collect())
    }
}

impl OrderStore for OrderRepository<'_> {
    async fn create_with_items(
        &self,
        user_id: UserId,
        total_amount: Decimal,
        shipping_address: &str,
        items: &[NewOrderItem],
    ) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r#"
            INSERT INTO storefront."order" (user_id, total_amount, shipping_address)
            VALUES ($1, $2, $3)
            RETURNING {ORDER_COLUMNS}
            "#
        );
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(user_id)
            .bind(total_amount)
            .bind(shipping_address)
            .fetch_one(&mut *tx)
            .await?;

        for item in items {
            sqlx::query(
                r"
                INSERT INTO storefront.order_item (order_id, product_id, quantity, price)
                VALUES ($1, $2, $3, $4)
                ",
            )
            .bind(order.id)
            .bind(item.product_id)
            .bind(item.quantity)
            .bind(item.price)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(order)
    }

    async fn attach_gateway_order(
        &self,
        order_id: OrderId,
        gateway_order_id: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE storefront."order"
            SET gateway_order_id = $2, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(order_id)
        .bind(gateway_order_id)
        .execute(self.pool)
        .await
        .map_err(|e| RepositoryError::from_insert(e, "gateway order id"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn find_for_user(
        &self,
        order_id: OrderId,
        user_id: UserId,
    ) -> Result<Option<Order>, RepositoryError> {
        let sql = format!(
            r#"
            SELECT {ORDER_COLUMNS}
            FROM storefront."order"
            WHERE id = $1 AND user_id = $2
            "#
        );
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(order_id)
            .bind(user_id)
            .fetch_optional(self.pool)
            .await?;
        Ok(order)
    }

    async fn mark_paid(&self, order_id: OrderId, payment_id: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE storefront."order"
            SET payment_status = 'paid', payment_id = $2, updated_at = now()
            WHERE id = $1 AND payment_status = 'pending'
            "#,
        )
        .bind(order_id)
        .bind(payment_id)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn mark_paid_by_gateway_order(
        &self,
        gateway_order_id: &str,
        payment_id: &str,
    ) -> Result<Option<OrderId>, RepositoryError> {
        let row: Option<(OrderId,)> = sqlx::query_as(
            r#"
            UPDATE storefront."order"
            SET payment_status = 'paid', payment_id = $2, updated_at = now()
            WHERE gateway_order_id = $1 AND payment_status = 'pending'
            RETURNING id
            "#,
        )
        .bind(gateway_order_id)
        .bind(payment_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(|(id,)| id))
    }
}
