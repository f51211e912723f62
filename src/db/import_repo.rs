// src/db/import_repo.rs

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::store::ImportStore,
    models::import::{ImportCounters, ImportRun, ImportRunItem, NewImportRunItem},
};

const RUN_COLUMNS: &str = "id, total_rows, valid_rows, invalid_rows, skipped_rows, \
     new_customers, existing_customers, new_locations, existing_locations, \
     contracts_created, duplicate_contracts, renewed, not_renewed, \
     dry_run, initiated_by, created_at, completed_at";

#[derive(Clone)]
pub struct ImportRepository {
    pool: PgPool,
}

impl ImportRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ImportStore for ImportRepository {
    async fn create_run(&self, initiated_by: Option<Uuid>) -> Result<ImportRun, AppError> {
        let run = sqlx::query_as::<_, ImportRun>(&format!(
            "INSERT INTO import_runs (dry_run, initiated_by) VALUES (FALSE, $1) RETURNING {RUN_COLUMNS}"
        ))
        .bind(initiated_by)
        .fetch_one(&self.pool)
        .await?;

        Ok(run)
    }

    async fn add_run_item(&self, item: &NewImportRunItem) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO import_run_items (import_run_id, customer_id, location_id, contract_id)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(item.import_run_id)
        .bind(item.customer_id)
        .bind(item.location_id)
        .bind(item.contract_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn finish_run(&self, run_id: i64, counters: &ImportCounters) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE import_runs
            SET total_rows = $2, valid_rows = $3, invalid_rows = $4, skipped_rows = $5,
                new_customers = $6, existing_customers = $7,
                new_locations = $8, existing_locations = $9,
                contracts_created = $10, duplicate_contracts = $11,
                renewed = $12, not_renewed = $13,
                completed_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(run_id)
        .bind(counters.total_rows)
        .bind(counters.valid_rows)
        .bind(counters.invalid_rows)
        .bind(counters.skipped_rows)
        .bind(counters.new_customers)
        .bind(counters.existing_customers)
        .bind(counters.new_locations)
        .bind(counters.existing_locations)
        .bind(counters.contracts_created)
        .bind(counters.duplicate_contracts)
        .bind(counters.renewed)
        .bind(counters.not_renewed)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_run(&self, id: i64) -> Result<Option<ImportRun>, AppError> {
        let run = sqlx::query_as::<_, ImportRun>(&format!(
            "SELECT {RUN_COLUMNS} FROM import_runs WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(run)
    }

    async fn list_runs(&self) -> Result<Vec<ImportRun>, AppError> {
        let runs = sqlx::query_as::<_, ImportRun>(&format!(
            "SELECT {RUN_COLUMNS} FROM import_runs ORDER BY created_at DESC LIMIT 100"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(runs)
    }

    async fn list_run_items(&self, run_id: i64) -> Result<Vec<ImportRunItem>, AppError> {
        let items = sqlx::query_as::<_, ImportRunItem>(
            r#"
            SELECT id, import_run_id, customer_id, location_id, contract_id
            FROM import_run_items
            WHERE import_run_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    async fn delete_run(&self, id: i64) -> Result<bool, AppError> {
        // Os itens caem em cascata
        let result = sqlx::query("DELETE FROM import_runs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
