//! Postgres persistence for quotes and install orders.
//!
//! [`PgStore`] is the production [`TransitionStore`]: each transition runs in
//! one Postgres transaction and takes a row lock on the quote
//! (`select ... for update`) before checking its state, so concurrent
//! approvals or conversions of the same quote serialize on that row.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{Executor, Postgres, Row, Transaction};

use gfs_schemas::{
    GeneratorInfo, InstallOrder, InstallOrderStatus, InstallType, NewInstallOrder, NewQuote,
    Quote, QuoteStatus,
};
use gfs_workflow::{StoreError, TransitionStore, TransitionTx, WorkflowRecords};

pub use sqlx::PgPool;

/// Default name of the env var holding the Postgres URL; tests read it directly.
pub const ENV_DB_URL: &str = "GFS_DATABASE_URL";

macro_rules! quote_columns {
    () => {
        "id, customer_id, description, quote_amount, quote_status, converted_to_install, \
         install_order_id, approval_date, approved_by, created_at, updated_at"
    };
}

macro_rules! install_order_columns {
    () => {
        "id, quote_id, order_number, customer_id, status, install_type, generator_info, \
         material_cost, labor_cost, total_cost, created_by, created_at, updated_at"
    };
}

/// Connect to Postgres at `url`.
pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await
        .context("failed to connect to Postgres")?;
    Ok(pool)
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_quotes_table: bool,
    pub has_install_orders_table: bool,
}

/// Connectivity + schema presence.
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    Ok(DbStatus {
        ok: one == 1,
        has_quotes_table: table_exists(pool, "quotes").await?,
        has_install_orders_table: table_exists(pool, "install_orders").await?,
    })
}

async fn table_exists(pool: &PgPool, table: &str) -> Result<bool> {
    let (exists,): (bool,) = sqlx::query_as::<_, (bool,)>(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema = 'public' and table_name = $1
        )
        "#,
    )
    .bind(table)
    .fetch_one(pool)
    .await
    .with_context(|| format!("status table-exists query failed for {table}"))?;
    Ok(exists)
}

/// Insert a quote row. Quote authoring lives outside this service; this is
/// for seeding and tests.
pub async fn insert_quote(pool: &PgPool, q: &NewQuote) -> Result<Quote> {
    let row = sqlx::query(concat!(
        "insert into quotes (customer_id, description, quote_amount, quote_status) \
         values ($1, $2, $3, $4) returning ",
        quote_columns!()
    ))
    .bind(q.customer_id)
    .bind(&q.description)
    .bind(&q.quote_amount)
    .bind(q.quote_status.as_str())
    .fetch_one(pool)
    .await
    .context("insert_quote failed")?;

    quote_from_row(&row).context("insert_quote decode failed")
}

/// Detect a Postgres unique constraint violation by name.
pub fn is_unique_constraint_violation(err: &sqlx::Error, constraint: &str) -> bool {
    unique_violation_constraint(err).as_deref() == Some(constraint)
}

fn unique_violation_constraint(err: &sqlx::Error) -> Option<String> {
    match err {
        // Postgres unique_violation is 23505.
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
            db_err.constraint().map(str::to_string)
        }
        _ => None,
    }
}

fn store_err(err: sqlx::Error) -> StoreError {
    match unique_violation_constraint(&err) {
        Some(constraint) => StoreError::UniqueViolation { constraint },
        None => StoreError::Backend(err.to_string()),
    }
}

fn decode_err<E>(err: E) -> sqlx::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    sqlx::Error::Decode(Box::new(err))
}

fn quote_from_row(row: &PgRow) -> sqlx::Result<Quote> {
    Ok(Quote {
        id: row.try_get("id")?,
        customer_id: row.try_get("customer_id")?,
        description: row.try_get("description")?,
        quote_amount: row.try_get("quote_amount")?,
        quote_status: QuoteStatus::parse(&row.try_get::<String, _>("quote_status")?)
            .map_err(decode_err)?,
        converted_to_install: row.try_get("converted_to_install")?,
        install_order_id: row.try_get("install_order_id")?,
        approval_date: row.try_get("approval_date")?,
        approved_by: row.try_get("approved_by")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn install_order_from_row(row: &PgRow) -> sqlx::Result<InstallOrder> {
    let generator_info: Option<Json<GeneratorInfo>> = row.try_get("generator_info")?;
    Ok(InstallOrder {
        id: row.try_get("id")?,
        quote_id: row.try_get("quote_id")?,
        order_number: row.try_get("order_number")?,
        customer_id: row.try_get("customer_id")?,
        status: InstallOrderStatus::parse(&row.try_get::<String, _>("status")?)
            .map_err(decode_err)?,
        install_type: InstallType::parse(&row.try_get::<String, _>("install_type")?)
            .map_err(decode_err)?,
        generator_info: generator_info.map(|Json(g)| g),
        material_cost: row.try_get("material_cost")?,
        labor_cost: row.try_get("labor_cost")?,
        total_cost: row.try_get("total_cost")?,
        created_by: row.try_get("created_by")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

async fn select_quote<'e, E>(ex: E, quote_id: i64) -> sqlx::Result<Option<Quote>>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(concat!("select ", quote_columns!(), " from quotes where id = $1"))
        .bind(quote_id)
        .fetch_optional(ex)
        .await?
        .as_ref()
        .map(quote_from_row)
        .transpose()
}

async fn select_install_order<'e, E>(ex: E, id: i64) -> sqlx::Result<Option<InstallOrder>>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(concat!(
        "select ",
        install_order_columns!(),
        " from install_orders where id = $1"
    ))
    .bind(id)
    .fetch_optional(ex)
    .await?
    .as_ref()
    .map(install_order_from_row)
    .transpose()
}

/// Postgres-backed store. Cheap to clone (shares the pool).
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// One open Postgres transaction. Dropping it without `commit` rolls back.
pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl TransitionStore for PgStore {
    type Tx = PgTx;

    async fn begin(&self) -> Result<PgTx, StoreError> {
        let tx = self.pool.begin().await.map_err(store_err)?;
        Ok(PgTx { tx })
    }
}

#[async_trait]
impl TransitionTx for PgTx {
    async fn lock_quote(&mut self, quote_id: i64) -> Result<Option<Quote>, StoreError> {
        let row = sqlx::query(concat!(
            "select ",
            quote_columns!(),
            " from quotes where id = $1 for update"
        ))
        .bind(quote_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(store_err)?;

        row.as_ref()
            .map(quote_from_row)
            .transpose()
            .map_err(store_err)
    }

    async fn record_approval(
        &mut self,
        quote_id: i64,
        approved_by: &str,
        approved_at: DateTime<Utc>,
    ) -> Result<Quote, StoreError> {
        let row = sqlx::query(concat!(
            r#"
            update quotes
            set quote_status = 'approved',
                approval_date = $2,
                approved_by = $3,
                converted_to_install = false,
                updated_at = $2
            where id = $1
            returning "#,
            quote_columns!()
        ))
        .bind(quote_id)
        .bind(approved_at)
        .bind(approved_by)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(store_err)?
        .ok_or_else(|| StoreError::MissingRow(format!("quote {quote_id}")))?;

        quote_from_row(&row).map_err(store_err)
    }

    async fn insert_install_order(
        &mut self,
        order: &NewInstallOrder,
    ) -> Result<InstallOrder, StoreError> {
        let row = sqlx::query(concat!(
            r#"
            insert into install_orders (
              quote_id, order_number, customer_id, status, install_type, generator_info,
              material_cost, labor_cost, total_cost, created_by
            ) values (
              $1, $2, $3, 'pending', $4, $5, $6, $7, $8, $9
            )
            returning "#,
            install_order_columns!()
        ))
        .bind(order.quote_id)
        .bind(&order.order_number)
        .bind(order.customer_id)
        .bind(order.install_type.as_str())
        .bind(order.generator_info.as_ref().map(Json))
        .bind(order.material_cost)
        .bind(order.labor_cost)
        .bind(order.total_cost)
        .bind(&order.created_by)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(store_err)?;

        install_order_from_row(&row).map_err(store_err)
    }

    async fn mark_converted(
        &mut self,
        quote_id: i64,
        install_order_id: i64,
    ) -> Result<Quote, StoreError> {
        let row = sqlx::query(concat!(
            r#"
            update quotes
            set converted_to_install = true,
                install_order_id = $2,
                updated_at = now()
            where id = $1
            returning "#,
            quote_columns!()
        ))
        .bind(quote_id)
        .bind(install_order_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(store_err)?
        .ok_or_else(|| StoreError::MissingRow(format!("quote {quote_id}")))?;

        quote_from_row(&row).map_err(store_err)
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(store_err)
    }
}

#[async_trait]
impl WorkflowRecords for PgStore {
    async fn fetch_quote(&self, quote_id: i64) -> Result<Option<Quote>, StoreError> {
        select_quote(&self.pool, quote_id).await.map_err(store_err)
    }

    async fn list_quotes(&self) -> Result<Vec<Quote>, StoreError> {
        let rows = sqlx::query(concat!(
            "select ",
            quote_columns!(),
            " from quotes order by created_at desc, id desc"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        rows.iter()
            .map(quote_from_row)
            .collect::<sqlx::Result<Vec<_>>>()
            .map_err(store_err)
    }

    async fn fetch_install_order(&self, id: i64) -> Result<Option<InstallOrder>, StoreError> {
        select_install_order(&self.pool, id)
            .await
            .map_err(store_err)
    }

    async fn list_install_orders(
        &self,
        status: Option<InstallOrderStatus>,
    ) -> Result<Vec<InstallOrder>, StoreError> {
        let rows = sqlx::query(concat!(
            "select ",
            install_order_columns!(),
            " from install_orders where ($1::text is null or status = $1) \
             order by created_at desc, id desc"
        ))
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        rows.iter()
            .map(install_order_from_row)
            .collect::<sqlx::Result<Vec<_>>>()
            .map_err(store_err)
    }

    async fn count_install_orders_for_quote(&self, quote_id: i64) -> Result<i64, StoreError> {
        let (n,): (i64,) = sqlx::query_as::<_, (i64,)>(
            "select count(*)::bigint from install_orders where quote_id = $1",
        )
        .bind(quote_id)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_database_errors_are_backend_failures() {
        let err = store_err(sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Backend(_)));
        assert!(!is_unique_constraint_violation(
            &sqlx::Error::RowNotFound,
            gfs_workflow::UQ_INSTALL_ORDERS_QUOTE_ID
        ));
    }

    #[test]
    fn column_lists_match_row_decoders() {
        for col in ["quote_status", "converted_to_install", "install_order_id", "approved_by"] {
            assert!(quote_columns!().contains(col), "{col}");
        }
        for col in ["order_number", "generator_info", "total_cost", "created_by"] {
            assert!(install_order_columns!().contains(col), "{col}");
        }
    }
}
