//! Postgres-backed movement ledger.
//!
//! ## Serialization
//!
//! `append` runs in one transaction that first locks the product row with
//! `SELECT ... FOR UPDATE`. Every append for the same product queues on that
//! lock, so the stock summed afterwards cannot change before the insert
//! commits. Appends for different products do not contend.
//!
//! `created_at` comes from `clock_timestamp()` inside the insert, after the
//! lock is held, so per product it follows commit order. The client clock is
//! never consulted.
//!
//! The transaction sets both `lock_timeout` (the wait for the product lock)
//! and `statement_timeout` (any single statement, including the stock sum).
//!
//! ## Error Mapping
//!
//! | SQLSTATE | LedgerError | Scenario |
//! |----------|-------------|----------|
//! | `23505` | replay / `IdempotencyConflict` | concurrent insert with the same idempotency key |
//! | `23503` | `UnknownWarehouse` / `UnknownProduct` | referenced row missing at insert, told apart by constraint name |
//! | `23514` | `Invariant` | check constraint (`quantity > 0`, kind) |
//! | `22003` | `Invariant` | aggregate overflows BIGINT |
//! | `55P03` / `57014` | `Timeout` | lock wait or statement timeout |
//! | other / pool / io | `Storage` | retry-safe, nothing committed |

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{Span, instrument};

use stockledger_core::{ProductId, UserId, WarehouseId};
use stockledger_inventory::{
    AvailabilityCheck, MovementId, MovementKind, NewMovement, Quantity, StockMovement, StockQuery,
    StockTotals,
};

use super::query::{MovementFilter, MovementPage, Pagination};
use super::store::{Appended, LedgerError, LedgerStore, replay_or_conflict};

const MOVEMENT_COLUMNS: &str = "id, product_id, warehouse_id, kind, quantity, reference, notes, \
     user_id, idempotency_key, created_at";

const WAREHOUSE_FK: &str = "stock_movements_warehouse_id_fkey";

#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: Arc<PgPool>,
    lock_timeout: Duration,
    statement_timeout: Duration,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool, lock_timeout: Duration, statement_timeout: Duration) -> Self {
        Self {
            pool: Arc::new(pool),
            lock_timeout,
            statement_timeout,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    #[instrument(
        skip(self, movement),
        fields(
            product_id = %movement.product_id,
            warehouse_id = %movement.warehouse_id,
            kind = %movement.kind,
            quantity = movement.quantity.get(),
            movement_id = tracing::field::Empty,
        ),
        err
    )]
    async fn append_movement(
        &self,
        movement: NewMovement,
        check: AvailabilityCheck,
    ) -> Result<Appended, LedgerError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query(
            "SELECT set_config('lock_timeout', $1, true), set_config('statement_timeout', $2, true)",
        )
        .bind(timeout_setting(self.lock_timeout))
        .bind(timeout_setting(self.statement_timeout))
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("set_timeouts", e))?;

        // Per-product serialization point.
        let locked = sqlx::query("SELECT id FROM products WHERE id = $1 FOR UPDATE")
            .bind(movement.product_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_product", e))?;
        if locked.is_none() {
            rollback(tx).await?;
            return Err(LedgerError::UnknownProduct(movement.product_id));
        }

        if let Some(key) = movement.idempotency_key.as_deref() {
            if let Some(existing) = fetch_by_key(&mut *tx, key).await? {
                rollback(tx).await?;
                return replay_or_conflict(&movement, existing);
            }
        }

        if let Some(query) = check.query_for(&movement) {
            let current = sum_totals(&mut *tx, &query).await?;
            if let Err(e) = AvailabilityCheck::ensure(current.on_hand(), movement.quantity) {
                rollback(tx).await?;
                return Err(e.into());
            }
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO stock_movements (
                product_id,
                warehouse_id,
                kind,
                quantity,
                reference,
                notes,
                user_id,
                idempotency_key,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, clock_timestamp())
            RETURNING id, created_at
            "#,
        )
        .bind(movement.product_id.as_uuid())
        .bind(movement.warehouse_id.as_uuid())
        .bind(movement.kind.as_str())
        .bind(movement.quantity.get())
        .bind(movement.reference.as_deref())
        .bind(movement.notes.as_deref())
        .bind(movement.user_id.as_uuid())
        .bind(movement.idempotency_key.as_deref())
        .fetch_one(&mut *tx)
        .await;

        let row = match inserted {
            Ok(row) => row,
            Err(e) if is_unique_violation(&e) => {
                // Lost a race on the idempotency key against another product's
                // transaction; the aborted tx rolls back on drop.
                drop(tx);
                let key = movement.idempotency_key.clone().unwrap_or_default();
                return match fetch_by_key(&*self.pool, &key).await? {
                    Some(existing) => replay_or_conflict(&movement, existing),
                    None => Err(LedgerError::IdempotencyConflict(key)),
                };
            }
            Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23503") => {
                return Err(missing_reference(db_err.constraint(), &movement));
            }
            Err(e) => return Err(map_sqlx_error("insert_movement", e)),
        };

        let id: i64 = row
            .try_get("id")
            .map_err(|e| map_sqlx_error("read_movement_id", e))?;
        let created_at: DateTime<Utc> = row
            .try_get("created_at")
            .map_err(|e| map_sqlx_error("read_created_at", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Span::current().record("movement_id", id);
        Ok(Appended::Created(movement.into_recorded(MovementId::new(id), created_at)))
    }
}

#[async_trait::async_trait]
impl LedgerStore for PostgresLedgerStore {
    async fn append(
        &self,
        movement: NewMovement,
        check: AvailabilityCheck,
    ) -> Result<Appended, LedgerError> {
        self.append_movement(movement, check).await
    }

    #[instrument(skip(self), fields(product_id = %query.product_id), err)]
    async fn totals(&self, query: StockQuery) -> Result<StockTotals, LedgerError> {
        sum_totals(&*self.pool, &query).await
    }

    async fn totals_by_product(&self) -> Result<HashMap<ProductId, StockTotals>, LedgerError> {
        let rows = sqlx::query(
            r#"
            SELECT
                product_id AS group_id,
                COALESCE(SUM(quantity) FILTER (WHERE kind = 'IN'), 0)::BIGINT AS inbound,
                COALESCE(SUM(quantity) FILTER (WHERE kind = 'OUT'), 0)::BIGINT AS outbound
            FROM stock_movements
            GROUP BY product_id
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("totals_by_product", e))?;

        rows.iter()
            .map(|row| -> Result<_, LedgerError> {
                let (id, totals) = grouped_totals(row)?;
                Ok((ProductId::from_uuid(id), totals))
            })
            .collect()
    }

    async fn totals_by_warehouse(
        &self,
    ) -> Result<HashMap<WarehouseId, StockTotals>, LedgerError> {
        let rows = sqlx::query(
            r#"
            SELECT
                warehouse_id AS group_id,
                COALESCE(SUM(quantity) FILTER (WHERE kind = 'IN'), 0)::BIGINT AS inbound,
                COALESCE(SUM(quantity) FILTER (WHERE kind = 'OUT'), 0)::BIGINT AS outbound
            FROM stock_movements
            GROUP BY warehouse_id
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("totals_by_warehouse", e))?;

        rows.iter()
            .map(|row| -> Result<_, LedgerError> {
                let (id, totals) = grouped_totals(row)?;
                Ok((WarehouseId::from_uuid(id), totals))
            })
            .collect()
    }

    async fn daily_totals(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<BTreeMap<NaiveDate, StockTotals>, LedgerError> {
        let rows = sqlx::query(
            r#"
            SELECT
                (created_at AT TIME ZONE 'UTC')::DATE AS day,
                COALESCE(SUM(quantity) FILTER (WHERE kind = 'IN'), 0)::BIGINT AS inbound,
                COALESCE(SUM(quantity) FILTER (WHERE kind = 'OUT'), 0)::BIGINT AS outbound
            FROM stock_movements
            WHERE created_at >= $1 AND created_at < $2
            GROUP BY day
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("daily_totals", e))?;

        rows.iter()
            .map(|row| -> Result<_, LedgerError> {
                let day: NaiveDate = row
                    .try_get("day")
                    .map_err(|e| map_sqlx_error("read_day", e))?;
                Ok((day, totals_from_row(row)?))
            })
            .collect()
    }

    #[instrument(skip(self, filter), fields(limit = pagination.limit, offset = pagination.offset), err)]
    async fn list_movements(
        &self,
        filter: MovementFilter,
        pagination: Pagination,
    ) -> Result<MovementPage, LedgerError> {
        let product = filter.product_id.map(|id| *id.as_uuid());
        let warehouse = filter.warehouse_id.map(|id| *id.as_uuid());
        let kind = filter.kind.map(MovementKind::as_str);
        let user = filter.user_id.map(|id| *id.as_uuid());
        let from = filter.created_from();
        let before = filter.created_before();

        const WHERE: &str = r#"
            WHERE ($1::uuid IS NULL OR product_id = $1)
                AND ($2::uuid IS NULL OR warehouse_id = $2)
                AND ($3::text IS NULL OR kind = $3)
                AND ($4::uuid IS NULL OR user_id = $4)
                AND ($5::timestamptz IS NULL OR created_at >= $5)
                AND ($6::timestamptz IS NULL OR created_at < $6)
        "#;

        let count_sql = format!("SELECT COUNT(*) AS total FROM stock_movements {WHERE}");
        let total: i64 = sqlx::query(&count_sql)
            .bind(product)
            .bind(warehouse)
            .bind(kind)
            .bind(user)
            .bind(from)
            .bind(before)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_movements", e))?
            .try_get("total")
            .map_err(|e| map_sqlx_error("read_total", e))?;

        let page_sql = format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements {WHERE} \
             ORDER BY created_at DESC, id DESC LIMIT $7 OFFSET $8"
        );
        let rows = sqlx::query(&page_sql)
            .bind(product)
            .bind(warehouse)
            .bind(kind)
            .bind(user)
            .bind(from)
            .bind(before)
            .bind(i64::from(pagination.limit))
            .bind(i64::from(pagination.offset))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_movements", e))?;

        let movements = rows
            .iter()
            .map(movement_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(MovementPage::new(movements, total.max(0) as u64, pagination))
    }

    async fn find_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<StockMovement>, LedgerError> {
        fetch_by_key(&*self.pool, key).await
    }
}

async fn rollback(tx: Transaction<'_, Postgres>) -> Result<(), LedgerError> {
    tx.rollback()
        .await
        .map_err(|e| map_sqlx_error("rollback", e))
}

async fn fetch_by_key<'e, E>(executor: E, key: &str) -> Result<Option<StockMovement>, LedgerError>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let sql = format!("SELECT {MOVEMENT_COLUMNS} FROM stock_movements WHERE idempotency_key = $1");
    let row = sqlx::query(&sql)
        .bind(key)
        .fetch_optional(executor)
        .await
        .map_err(|e| map_sqlx_error("fetch_by_idempotency_key", e))?;
    row.as_ref().map(movement_from_row).transpose()
}

async fn sum_totals<'e, E>(executor: E, query: &StockQuery) -> Result<StockTotals, LedgerError>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let row = sqlx::query(
        r#"
        SELECT
            COALESCE(SUM(quantity) FILTER (WHERE kind = 'IN'), 0)::BIGINT AS inbound,
            COALESCE(SUM(quantity) FILTER (WHERE kind = 'OUT'), 0)::BIGINT AS outbound
        FROM stock_movements
        WHERE product_id = $1
            AND ($2::uuid IS NULL OR warehouse_id = $2)
            AND ($3::timestamptz IS NULL OR created_at <= $3)
        "#,
    )
    .bind(query.product_id.as_uuid())
    .bind(query.warehouse_id.map(|id| *id.as_uuid()))
    .bind(query.as_of)
    .fetch_one(executor)
    .await
    .map_err(|e| map_sqlx_error("sum_totals", e))?;

    totals_from_row(&row)
}

fn totals_from_row(row: &PgRow) -> Result<StockTotals, LedgerError> {
    Ok(StockTotals {
        inbound: row
            .try_get("inbound")
            .map_err(|e| map_sqlx_error("read_inbound", e))?,
        outbound: row
            .try_get("outbound")
            .map_err(|e| map_sqlx_error("read_outbound", e))?,
    })
}

fn grouped_totals(row: &PgRow) -> Result<(uuid::Uuid, StockTotals), LedgerError> {
    let id: uuid::Uuid = row
        .try_get("group_id")
        .map_err(|e| map_sqlx_error("read_group_id", e))?;
    Ok((id, totals_from_row(row)?))
}

fn movement_from_row(row: &PgRow) -> Result<StockMovement, LedgerError> {
    let read = |e| map_sqlx_error("read_movement", e);

    let id: i64 = row.try_get("id").map_err(read)?;
    let kind: String = row.try_get("kind").map_err(read)?;
    let quantity: i64 = row.try_get("quantity").map_err(read)?;

    let kind = kind
        .parse::<MovementKind>()
        .map_err(|e| LedgerError::Invariant(format!("movement {id}: {e}")))?;
    let quantity =
        Quantity::new(quantity).map_err(|e| LedgerError::Invariant(format!("movement {id}: {e}")))?;

    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(read)?;

    Ok(NewMovement {
        product_id: ProductId::from_uuid(row.try_get("product_id").map_err(read)?),
        warehouse_id: WarehouseId::from_uuid(row.try_get("warehouse_id").map_err(read)?),
        kind,
        quantity,
        reference: row.try_get("reference").map_err(read)?,
        notes: row.try_get("notes").map_err(read)?,
        user_id: UserId::from_uuid(row.try_get("user_id").map_err(read)?),
        idempotency_key: row.try_get("idempotency_key").map_err(read)?,
    }
    .into_recorded(MovementId::new(id), created_at))
}

/// Timeout value for `set_config`; zero would disable the timeout, so it is
/// floored at one millisecond.
fn timeout_setting(timeout: Duration) -> String {
    format!("{}ms", timeout.as_millis().max(1))
}

/// A foreign-key violation on insert: the product row is locked for the whole
/// transaction, so unless the constraint names the product it is the
/// warehouse that went missing.
fn missing_reference(constraint: Option<&str>, movement: &NewMovement) -> LedgerError {
    match constraint {
        Some(WAREHOUSE_FK) => LedgerError::UnknownWarehouse(movement.warehouse_id),
        Some(name) if name.contains("product") => LedgerError::UnknownProduct(movement.product_id),
        _ => LedgerError::UnknownWarehouse(movement.warehouse_id),
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> LedgerError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23503") | Some("23514") | Some("22003") => LedgerError::Invariant(msg),
                Some("55P03") | Some("57014") => LedgerError::Timeout(msg),
                _ => LedgerError::Storage(msg),
            }
        }
        sqlx::Error::PoolTimedOut => {
            LedgerError::Timeout(format!("connection pool timed out in {operation}"))
        }
        sqlx::Error::PoolClosed => {
            LedgerError::Storage(format!("connection pool closed in {operation}"))
        }
        other => LedgerError::Storage(format!("sqlx error in {operation}: {other}")),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        return db_err.code().as_deref() == Some("23505");
    }
    false
}
