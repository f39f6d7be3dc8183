//! PostgreSQL implementation of the order repositories and unit of work.
//!
//! One [`PgTransaction`] owns a `sqlx::Transaction` and implements every
//! repository port against it, so all writes of a handler land atomically.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, ErrorCode, OrderId, OrderItemId, Timestamp};
use crate::domain::issuance::{CredSubmissionReport, Tlv2Submission};
use crate::domain::order::{
    keys, MetadataValue, NewOrder, Order, OrderItem, OrderMetadata, OrderStatus,
};
use crate::ports::{
    OrderItemRepository, OrderRepository, PayHistoryRepository, RepositorySet, Tlv2Repository,
    TransactionScope, UnitOfWork,
};

const ORDER_COLUMNS: &str = "id, created_at, updated_at, currency, total_price, merchant_id, location, \
     status, allowed_payment_methods, metadata, valid_for_secs, last_paid_at, expires_at, trial_days";

/// Opens transactions on a connection pool.
pub struct PgUnitOfWork {
    pool: PgPool,
}

impl PgUnitOfWork {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn begin(&self) -> Result<Box<dyn TransactionScope>, DomainError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::database("begin transaction", e))?;
        Ok(Box::new(PgTransaction { tx }))
    }
}

/// Applies pending migrations from `migrations/`.
pub async fn run_migrations(pool: &PgPool) -> Result<(), DomainError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| DomainError::database("run migrations", e))
}

/// An open transaction exposing the order repositories.
pub struct PgTransaction {
    tx: Transaction<'static, Postgres>,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    currency: String,
    total_price: Decimal,
    merchant_id: String,
    location: Option<String>,
    status: String,
    allowed_payment_methods: Vec<String>,
    metadata: Option<Value>,
    valid_for_secs: Option<i64>,
    last_paid_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    trial_days: Option<i64>,
}

impl TryFrom<OrderRow> for Order {
    type Error = DomainError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let status = row.status.parse::<OrderStatus>().map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid order status: {}", e))
        })?;

        Ok(Order {
            id: OrderId::from_uuid(row.id),
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
            currency: row.currency,
            total_price: row.total_price,
            merchant_id: row.merchant_id,
            location: row.location,
            status,
            allowed_payment_methods: row.allowed_payment_methods,
            metadata: row
                .metadata
                .as_ref()
                .map(OrderMetadata::from_json)
                .unwrap_or_default(),
            valid_for_secs: row.valid_for_secs,
            last_paid_at: row.last_paid_at.map(Timestamp::from_datetime),
            expires_at: row.expires_at.map(Timestamp::from_datetime),
            trial_days: row.trial_days,
            items: Vec::new(),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: Uuid,
    order_id: Uuid,
    sku: String,
    sku_variant: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    currency: String,
    quantity: i32,
    price: Decimal,
    subtotal: Decimal,
    location: Option<String>,
    description: Option<String>,
    credential_type: String,
    valid_for_secs: Option<i64>,
    valid_for_iso: Option<String>,
    each_credential_valid_duration: Option<String>,
    issuance_interval: Option<String>,
    metadata: Option<Value>,
}

impl TryFrom<OrderItemRow> for OrderItem {
    type Error = DomainError;

    fn try_from(row: OrderItemRow) -> Result<Self, Self::Error> {
        let credential_type = row.credential_type.parse().map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid credential type: {}", e))
        })?;

        Ok(OrderItem {
            id: OrderItemId::from_uuid(row.id),
            order_id: OrderId::from_uuid(row.order_id),
            sku: row.sku,
            sku_variant: row.sku_variant,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
            currency: row.currency,
            quantity: row.quantity,
            price: row.price,
            subtotal: row.subtotal,
            location: row.location,
            description: row.description,
            credential_type,
            valid_for_secs: row.valid_for_secs,
            valid_for_iso: row.valid_for_iso,
            each_credential_valid_duration: row.each_credential_valid_duration,
            issuance_interval: row.issuance_interval,
            metadata: item_metadata(row.metadata),
            issuer_config: None,
        })
    }
}

fn item_metadata(value: Option<Value>) -> BTreeMap<String, String> {
    match value {
        Some(Value::Object(map)) => map
            .into_iter()
            .filter_map(|(k, v)| match v {
                Value::String(s) => Some((k, s)),
                Value::Number(n) => Some((k, n.to_string())),
                _ => None,
            })
            .collect(),
        _ => BTreeMap::new(),
    }
}

fn no_rows(operation: &str, id: OrderId) -> DomainError {
    DomainError::new(ErrorCode::NoRowsChanged, format!("{}: no order {}", operation, id))
}

impl PgTransaction {
    async fn fetch_order(&mut self, filter: &str, arg: String) -> Result<Option<Order>, DomainError> {
        let sql = format!("SELECT {} FROM orders WHERE {}", ORDER_COLUMNS, filter);
        let row: Option<OrderRow> = sqlx::query_as(&sql)
            .bind(arg)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| DomainError::database("fetch order", e))?;
        row.map(Order::try_from).transpose()
    }

    async fn exec_update(
        &mut self,
        operation: &str,
        id: OrderId,
        query: sqlx::query::Query<'_, Postgres, sqlx::postgres::PgArguments>,
    ) -> Result<(), DomainError> {
        let result = query
            .execute(&mut *self.tx)
            .await
            .map_err(|e| DomainError::database(operation, e))?;

        if result.rows_affected() == 0 {
            return Err(no_rows(operation, id));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for PgTransaction {
    async fn get(&mut self, id: OrderId) -> Result<Option<Order>, DomainError> {
        self.fetch_order("id = $1::uuid", id.to_string()).await
    }

    async fn get_for_update(&mut self, id: OrderId) -> Result<Option<Order>, DomainError> {
        self.fetch_order("id = $1::uuid FOR UPDATE", id.to_string()).await
    }

    async fn get_by_external_id(&mut self, external_id: &str) -> Result<Option<Order>, DomainError> {
        self.fetch_order("metadata->>'externalID' = $1 FOR UPDATE", external_id.to_string())
            .await
    }

    async fn get_by_radom_subscription_id(&mut self, sub_id: &str) -> Result<Option<Order>, DomainError> {
        self.fetch_order("metadata->>'radomSubscriptionId' = $1 FOR UPDATE", sub_id.to_string())
            .await
    }

    async fn get_expired_checkout_session_id(&mut self, id: OrderId) -> Result<Option<String>, DomainError> {
        let session: Option<Option<String>> = sqlx::query_scalar(
            r#"
            SELECT metadata->>'stripeCheckoutSessionId'
            FROM orders
            WHERE id = $1 AND metadata IS NOT NULL AND status = 'pending'
              AND updated_at < now() - interval '1 hour'
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| DomainError::database("fetch expired checkout session", e))?;

        Ok(session.flatten().filter(|s| !s.is_empty()))
    }

    async fn create(&mut self, order: &NewOrder, items: &[OrderItem]) -> Result<Order, DomainError> {
        let metadata = order.metadata.to_json_map();
        let metadata = if metadata.is_empty() { None } else { Some(Value::Object(metadata)) };

        let row: OrderRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO orders (
                id, currency, total_price, merchant_id, location, status,
                allowed_payment_methods, metadata, valid_for_secs
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            ORDER_COLUMNS
        ))
        .bind(order.id.as_uuid())
        .bind(&order.currency)
        .bind(order.total_price)
        .bind(&order.merchant_id)
        .bind(&order.location)
        .bind(order.status.as_str())
        .bind(&order.allowed_payment_methods)
        .bind(metadata)
        .bind(order.valid_for_secs)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.constraint() == Some("orders_external_id_key") {
                    return DomainError::new(ErrorCode::Conflict, "order already exists for external id");
                }
            }
            DomainError::database("insert order", e)
        })?;

        let mut stored = Order::try_from(row)?;

        for item in items {
            let item_metadata = if item.metadata.is_empty() {
                None
            } else {
                Some(serde_json::to_value(&item.metadata).map_err(|e| DomainError::database("encode item metadata", e))?)
            };

            let row: OrderItemRow = sqlx::query_as(
                r#"
                INSERT INTO order_items (
                    id, order_id, sku, sku_variant, currency, quantity, price, subtotal,
                    location, description, credential_type, valid_for_secs, valid_for_iso,
                    each_credential_valid_duration, issuance_interval, metadata
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
                RETURNING id, order_id, sku, sku_variant, created_at, updated_at, currency, quantity,
                    price, subtotal, location, description, credential_type, valid_for_secs,
                    valid_for_iso, each_credential_valid_duration, issuance_interval, metadata
                "#,
            )
            .bind(item.id.as_uuid())
            .bind(order.id.as_uuid())
            .bind(&item.sku)
            .bind(&item.sku_variant)
            .bind(&item.currency)
            .bind(item.quantity)
            .bind(item.price)
            .bind(item.subtotal)
            .bind(&item.location)
            .bind(&item.description)
            .bind(item.credential_type.as_str())
            .bind(item.valid_for_secs)
            .bind(&item.valid_for_iso)
            .bind(&item.each_credential_valid_duration)
            .bind(&item.issuance_interval)
            .bind(item_metadata)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| DomainError::database("insert order item", e))?;

            stored.items.push(OrderItem::try_from(row)?);
        }

        Ok(stored)
    }

    async fn set_status(&mut self, id: OrderId, status: OrderStatus) -> Result<(), DomainError> {
        let q = sqlx::query("UPDATE orders SET status = $2, updated_at = CURRENT_TIMESTAMP WHERE id = $1")
            .bind(*id.as_uuid())
            .bind(status.as_str());
        self.exec_update("set order status", id, q).await
    }

    async fn set_expires_at(&mut self, id: OrderId, expires_at: Timestamp) -> Result<(), DomainError> {
        let q = sqlx::query("UPDATE orders SET expires_at = $2, updated_at = CURRENT_TIMESTAMP WHERE id = $1")
            .bind(*id.as_uuid())
            .bind(expires_at.into_datetime());
        self.exec_update("set order expiry", id, q).await
    }

    async fn set_last_paid_at(&mut self, id: OrderId, paid_at: Timestamp) -> Result<(), DomainError> {
        let q = sqlx::query("UPDATE orders SET last_paid_at = $2 WHERE id = $1")
            .bind(*id.as_uuid())
            .bind(paid_at.into_datetime());
        self.exec_update("set order last paid", id, q).await
    }

    async fn set_trial_days(&mut self, id: OrderId, days: i64) -> Result<(), DomainError> {
        let q = sqlx::query("UPDATE orders SET trial_days = $2, updated_at = CURRENT_TIMESTAMP WHERE id = $1")
            .bind(*id.as_uuid())
            .bind(days);
        self.exec_update("set order trial days", id, q).await
    }

    async fn append_metadata(&mut self, id: OrderId, key: &str, value: MetadataValue) -> Result<(), DomainError> {
        let q = match value {
            MetadataValue::Text(text) => sqlx::query(
                r#"
                UPDATE orders
                SET metadata = COALESCE(metadata, '{}'::jsonb) || jsonb_build_object($2::text, $3::text),
                    updated_at = CURRENT_TIMESTAMP
                WHERE id = $1
                "#,
            )
            .bind(*id.as_uuid())
            .bind(key.to_string())
            .bind(text),
            MetadataValue::Int(n) => sqlx::query(
                r#"
                UPDATE orders
                SET metadata = COALESCE(metadata, '{}'::jsonb) || jsonb_build_object($2::text, $3::bigint),
                    updated_at = CURRENT_TIMESTAMP
                WHERE id = $1
                "#,
            )
            .bind(*id.as_uuid())
            .bind(key.to_string())
            .bind(n),
        };
        self.exec_update("append order metadata", id, q).await
    }

    async fn increment_num_pay_failed(&mut self, id: OrderId) -> Result<(), DomainError> {
        let q = sqlx::query(
            r#"
            UPDATE orders
            SET metadata = COALESCE(metadata, '{}'::jsonb) || jsonb_build_object(
                    $2::text,
                    CASE WHEN metadata->>$2 ~ '^-?[0-9]+$' THEN (metadata->>$2)::bigint ELSE 0 END + 1
                ),
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $1
            "#,
        )
        .bind(*id.as_uuid())
        .bind(keys::NUM_PAYMENT_FAILED);
        self.exec_update("increment payment failures", id, q).await
    }
}

#[async_trait]
impl OrderItemRepository for PgTransaction {
    async fn find_by_order_id(&mut self, order_id: OrderId) -> Result<Vec<OrderItem>, DomainError> {
        let rows: Vec<OrderItemRow> = sqlx::query_as(
            r#"
            SELECT id, order_id, sku, sku_variant, created_at, updated_at, currency, quantity,
                price, subtotal, location, description, credential_type, valid_for_secs,
                valid_for_iso, each_credential_valid_duration, issuance_interval, metadata
            FROM order_items
            WHERE order_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| DomainError::database("fetch order items", e))?;

        rows.into_iter().map(OrderItem::try_from).collect()
    }
}

#[async_trait]
impl PayHistoryRepository for PgTransaction {
    async fn insert(&mut self, order_id: OrderId, paid_at: Timestamp) -> Result<(), DomainError> {
        sqlx::query("INSERT INTO order_payment_history (order_id, last_paid) VALUES ($1, $2)")
            .bind(order_id.as_uuid())
            .bind(paid_at.into_datetime())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| DomainError::database("insert payment history", e))?;
        Ok(())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SubmissionReportRow {
    submitted: bool,
    req_id_mismatch: bool,
}

#[async_trait]
impl Tlv2Repository for PgTransaction {
    async fn get_cred_submission_report(
        &mut self,
        order_id: OrderId,
        item_id: OrderItemId,
        request_id: &str,
        first_blinded_cred: &str,
    ) -> Result<CredSubmissionReport, DomainError> {
        let row: SubmissionReportRow = sqlx::query_as(
            r#"
            SELECT
                EXISTS(
                    SELECT 1 FROM time_limited_v2_order_creds
                    WHERE order_id = $1 AND item_id = $2 AND first_blinded_cred = $4
                ) AS submitted,
                EXISTS(
                    SELECT 1 FROM time_limited_v2_order_creds
                    WHERE order_id = $1 AND item_id = $2 AND first_blinded_cred = $4 AND request_id <> $3
                ) AS req_id_mismatch
            "#,
        )
        .bind(order_id.as_uuid())
        .bind(item_id.as_uuid())
        .bind(request_id)
        .bind(first_blinded_cred)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| DomainError::database("fetch credential submission report", e))?;

        Ok(CredSubmissionReport {
            submitted: row.submitted,
            req_id_mismatch: row.req_id_mismatch,
        })
    }

    async fn uniq_batches(
        &mut self,
        order_id: OrderId,
        item_id: OrderItemId,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<i64, DomainError> {
        sqlx::query_scalar(
            r#"
            SELECT COUNT(DISTINCT request_id)
            FROM time_limited_v2_order_creds
            WHERE order_id = $1 AND item_id = $2 AND valid_from <= $4 AND valid_to > $3
            "#,
        )
        .bind(order_id.as_uuid())
        .bind(item_id.as_uuid())
        .bind(from.into_datetime())
        .bind(to.into_datetime())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| DomainError::database("count credential batches", e))
    }

    async fn insert_submission(&mut self, submission: &Tlv2Submission) -> Result<(), DomainError> {
        let blinded = serde_json::to_value(&submission.blinded_creds)
            .map_err(|e| DomainError::database("encode blinded credentials", e))?;

        sqlx::query(
            r#"
            INSERT INTO time_limited_v2_order_creds (
                item_id, order_id, request_id, valid_from, valid_to, first_blinded_cred, blinded_creds
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(submission.item_id.as_uuid())
        .bind(submission.order_id.as_uuid())
        .bind(&submission.request_id)
        .bind(submission.valid_from.into_datetime())
        .bind(submission.valid_to.into_datetime())
        .bind(&submission.first_blinded_cred)
        .bind(blinded)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.constraint() == Some("time_limited_v2_order_creds_item_first_cred_key") {
                    return DomainError::new(ErrorCode::Conflict, "credentials already submitted");
                }
            }
            DomainError::database("insert credential submission", e)
        })?;

        Ok(())
    }
}

impl RepositorySet for PgTransaction {
    fn orders(&mut self) -> &mut dyn OrderRepository {
        self
    }

    fn items(&mut self) -> &mut dyn OrderItemRepository {
        self
    }

    fn pay_history(&mut self) -> &mut dyn PayHistoryRepository {
        self
    }

    fn tlv2(&mut self) -> &mut dyn Tlv2Repository {
        self
    }
}

#[async_trait]
impl TransactionScope for PgTransaction {
    fn repositories(&mut self) -> &mut dyn RepositorySet {
        self
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        self.tx
            .commit()
            .await
            .map_err(|e| DomainError::database("commit transaction", e))
    }

    async fn rollback(self: Box<Self>) -> Result<(), DomainError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| DomainError::database("rollback transaction", e))
    }
}
