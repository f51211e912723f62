// src/db/customer_repo.rs

use async_trait::async_trait;
use sqlx::PgPool;

use crate::{
    common::error::AppError,
    db::store::CustomerStore,
    models::customer::{Customer, Location, MergeOutcome, NewCustomer, NewLocation, TechnicianArea},
};

const CUSTOMER_COLUMNS: &str =
    "id, name, license_number, gra_number, phone, area, created_at, updated_at";

const LOCATION_COLUMNS: &str = "id, customer_id, name, address, latitude, longitude, \
     coordinates_valid, coordinate_note, govt_renewal_date, created_at";

#[derive(Clone)]
pub struct CustomerRepository {
    pool: PgPool,
}

impl CustomerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CustomerStore for CustomerRepository {
    // =========================================================================
    //  CLIENTES
    // =========================================================================

    async fn list_customers(&self) -> Result<Vec<Customer>, AppError> {
        let customers = sqlx::query_as::<_, Customer>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers ORDER BY id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(customers)
    }

    async fn find_customer(&self, id: i64) -> Result<Option<Customer>, AppError> {
        let customer = sqlx::query_as::<_, Customer>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(customer)
    }

    async fn create_customer(&self, new: &NewCustomer) -> Result<Customer, AppError> {
        sqlx::query_as::<_, Customer>(&format!(
            r#"
            INSERT INTO customers (name, license_number, gra_number, phone, area)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {CUSTOMER_COLUMNS}
            "#
        ))
        .bind(&new.name)
        .bind(&new.license_number)
        .bind(&new.gra_number)
        .bind(&new.phone)
        .bind(&new.area)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::from_insert(e, || {
                format!(
                    "A customer with license '{}' or GRA '{}' already exists.",
                    new.license_number.as_deref().unwrap_or("-"),
                    new.gra_number.as_deref().unwrap_or("-")
                )
            })
        })
    }

    async fn delete_customer_if_orphan(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            DELETE FROM customers c
            WHERE c.id = $1
              AND NOT EXISTS (SELECT 1 FROM locations l WHERE l.customer_id = c.id)
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn merge_customers(&self, primary_id: i64, duplicate_ids: &[i64]) -> Result<MergeOutcome, AppError> {
        let mut tx = self.pool.begin().await?;

        // Trava o principal para ninguém apagá-lo no meio do merge
        let primary = sqlx::query_scalar::<_, i64>("SELECT id FROM customers WHERE id = $1 FOR UPDATE")
            .bind(primary_id)
            .fetch_optional(&mut *tx)
            .await?;
        if primary.is_none() {
            return Err(AppError::CustomerNotFound(primary_id));
        }

        let duplicates: Vec<i64> = duplicate_ids.iter().copied().filter(|id| *id != primary_id).collect();

        let moved = sqlx::query("UPDATE locations SET customer_id = $1 WHERE customer_id = ANY($2)")
            .bind(primary_id)
            .bind(&duplicates)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let removed = sqlx::query("DELETE FROM customers WHERE id = ANY($1)")
            .bind(&duplicates)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query("UPDATE customers SET updated_at = NOW() WHERE id = $1")
            .bind(primary_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(MergeOutcome {
            primary_id,
            locations_moved: moved,
            customers_removed: removed,
        })
    }

    // =========================================================================
    //  LOCAIS
    // =========================================================================

    async fn list_locations(&self, customer_id: i64) -> Result<Vec<Location>, AppError> {
        let locations = sqlx::query_as::<_, Location>(&format!(
            "SELECT {LOCATION_COLUMNS} FROM locations WHERE customer_id = $1 ORDER BY id ASC"
        ))
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(locations)
    }

    async fn find_location(&self, id: i64) -> Result<Option<Location>, AppError> {
        let location = sqlx::query_as::<_, Location>(&format!(
            "SELECT {LOCATION_COLUMNS} FROM locations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(location)
    }

    async fn create_location(&self, new: &NewLocation) -> Result<Location, AppError> {
        let location = sqlx::query_as::<_, Location>(&format!(
            r#"
            INSERT INTO locations (
                customer_id, name, address, latitude, longitude,
                coordinates_valid, coordinate_note, govt_renewal_date
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {LOCATION_COLUMNS}
            "#
        ))
        .bind(new.customer_id)
        .bind(&new.name)
        .bind(&new.address)
        .bind(new.latitude)
        .bind(new.longitude)
        .bind(new.coordinates_valid)
        .bind(&new.coordinate_note)
        .bind(new.govt_renewal_date)
        .fetch_one(&self.pool)
        .await?;

        Ok(location)
    }

    async fn delete_location_if_unused(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            DELETE FROM locations l
            WHERE l.id = $1
              AND NOT EXISTS (SELECT 1 FROM contracts c WHERE c.location_id = l.id)
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_technician_areas(&self) -> Result<Vec<TechnicianArea>, AppError> {
        let areas = sqlx::query_as::<_, TechnicianArea>(
            "SELECT technician_id, area FROM technician_areas ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(areas)
    }
}
