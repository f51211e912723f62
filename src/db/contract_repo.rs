// src/db/contract_repo.rs

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use crate::{
    common::error::AppError,
    db::store::ContractStore,
    models::{
        contract::{Contract, ContractEvent, ContractStatus, NewContract, StatusChange},
        visit::{NewPayment, NewVisit, Payment, Visit, VisitEffect, VisitPayment},
    },
    services::fines::Totals,
};

const CONTRACT_COLUMNS: &str = "id, location_id, start_date, end_date, status, next_due_date, \
     last_effective_visit_date, technician_id, govt_fee, amc_value, fine_amount, total_amount, \
     paid_amount, balance, renewal_of, terminated_at, created_at, updated_at";

const VISIT_COLUMNS: &str = "id, contract_id, technician_id, latitude, longitude, distance_m, \
     visit_type, remarks, payment_collected, payment_amount, verified, visited_at";

#[derive(Clone)]
pub struct ContractRepository {
    pool: PgPool,
}

impl ContractRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Distingue "não existe" de "mudou de status" depois de um UPDATE condicional sem efeito.
async fn missing_or_stale(conn: &mut PgConnection, contract_id: i64) -> AppError {
    let exists = sqlx::query_scalar::<_, i64>("SELECT id FROM contracts WHERE id = $1")
        .bind(contract_id)
        .fetch_optional(&mut *conn)
        .await;

    match exists {
        Ok(Some(_)) => AppError::StaleState(contract_id),
        Ok(None) => AppError::ContractNotFound(contract_id),
        Err(e) => e.into(),
    }
}

/// UPDATE condicional ao status lido + evento de auditoria. Chamado sempre dentro de uma transação.
async fn apply_change(conn: &mut PgConnection, change: &StatusChange) -> Result<(), AppError> {
    let result = sqlx::query(
        r#"
        UPDATE contracts
        SET status = $2,
            terminated_at = COALESCE($3, terminated_at),
            updated_at = NOW()
        WHERE id = $1 AND status = $4
        "#,
    )
    .bind(change.contract_id)
    .bind(change.to)
    .bind(change.terminated_at())
    .bind(change.from)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(missing_or_stale(conn, change.contract_id).await);
    }

    sqlx::query(
        r#"
        INSERT INTO contract_events (contract_id, event_type, metadata, created_at)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(change.contract_id)
    .bind(change.to.as_str())
    .bind(change.metadata())
    .bind(change.at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn insert_contract(conn: &mut PgConnection, new: &NewContract) -> Result<Contract, AppError> {
    let contract = sqlx::query_as::<_, Contract>(&format!(
        r#"
        INSERT INTO contracts (
            location_id, start_date, end_date, status, next_due_date,
            last_effective_visit_date, technician_id,
            govt_fee, amc_value, fine_amount, total_amount, paid_amount, balance,
            renewal_of
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        RETURNING {CONTRACT_COLUMNS}
        "#
    ))
    .bind(new.location_id)
    .bind(new.start_date)
    .bind(new.end_date)
    .bind(new.status)
    .bind(new.next_due_date)
    .bind(new.last_effective_visit_date)
    .bind(new.technician_id)
    .bind(new.govt_fee)
    .bind(new.amc_value)
    .bind(new.fine_amount)
    .bind(new.total_amount)
    .bind(new.paid_amount)
    .bind(new.balance)
    .bind(new.renewal_of)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| {
        AppError::from_insert(e, || {
            format!("Contract {} was already renewed.", new.renewal_of.unwrap_or_default())
        })
    })?;

    Ok(contract)
}

/// Soma o pagamento se `paid_amount` ainda for o valor lido, e grava o lançamento.
async fn apply_payment(
    conn: &mut PgConnection,
    payment: &NewPayment,
    expected_paid: Decimal,
    totals: &Totals,
) -> Result<Payment, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE contracts
        SET paid_amount = paid_amount + $2,
            total_amount = $3,
            balance = $4,
            updated_at = NOW()
        WHERE id = $1 AND paid_amount = $5
        "#,
    )
    .bind(payment.contract_id)
    .bind(payment.amount)
    .bind(totals.total)
    .bind(totals.balance)
    .bind(expected_paid)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(missing_or_stale(conn, payment.contract_id).await);
    }

    let saved = sqlx::query_as::<_, Payment>(
        r#"
        INSERT INTO payments (contract_id, amount, method, paid_at)
        VALUES ($1, $2, $3, $4)
        RETURNING id, contract_id, amount, method, paid_at
        "#,
    )
    .bind(payment.contract_id)
    .bind(payment.amount)
    .bind(&payment.method)
    .bind(payment.paid_at)
    .fetch_one(&mut *conn)
    .await?;

    Ok(saved)
}

#[async_trait]
impl ContractStore for ContractRepository {
    async fn find_contract(&self, id: i64) -> Result<Option<Contract>, AppError> {
        let contract = sqlx::query_as::<_, Contract>(&format!(
            "SELECT {CONTRACT_COLUMNS} FROM contracts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(contract)
    }

    async fn list_contracts(&self, statuses: &[ContractStatus]) -> Result<Vec<Contract>, AppError> {
        // Filtro pelo texto do enum; vazio = todos
        let names: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();

        let contracts = sqlx::query_as::<_, Contract>(&format!(
            r#"
            SELECT {CONTRACT_COLUMNS} FROM contracts
            WHERE cardinality($1::text[]) = 0 OR status::text = ANY($1)
            ORDER BY id ASC
            "#
        ))
        .bind(&names)
        .fetch_all(&self.pool)
        .await?;

        Ok(contracts)
    }

    async fn find_contract_by_location_and_start(
        &self,
        location_id: i64,
        start_date: NaiveDate,
    ) -> Result<Option<Contract>, AppError> {
        let contract = sqlx::query_as::<_, Contract>(&format!(
            "SELECT {CONTRACT_COLUMNS} FROM contracts WHERE location_id = $1 AND start_date = $2 LIMIT 1"
        ))
        .bind(location_id)
        .bind(start_date)
        .fetch_optional(&self.pool)
        .await?;

        Ok(contract)
    }

    async fn create_contract(&self, new: &NewContract) -> Result<Contract, AppError> {
        let mut conn = self.pool.acquire().await?;
        insert_contract(&mut conn, new).await
    }

    async fn apply_transition(&self, change: &StatusChange) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        apply_change(&mut tx, change).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn renew_contract(&self, replacement: &NewContract, change: &StatusChange) -> Result<i64, AppError> {
        let mut tx = self.pool.begin().await?;

        // Primeiro o antecessor: a atualização condicional trava a linha
        apply_change(&mut tx, change).await?;
        let created = insert_contract(&mut tx, replacement).await?;

        tx.commit().await?;
        Ok(created.id)
    }

    async fn delete_contract(&self, id: i64) -> Result<bool, AppError> {
        // Visitas, pagamentos e eventos caem em cascata
        let result = sqlx::query("DELETE FROM contracts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_events(&self, contract_id: i64) -> Result<Vec<ContractEvent>, AppError> {
        let events = sqlx::query_as::<_, ContractEvent>(
            r#"
            SELECT id, contract_id, event_type, metadata, created_at
            FROM contract_events
            WHERE contract_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(contract_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }

    async fn record_visit(
        &self,
        visit: &NewVisit,
        expected_status: ContractStatus,
        effect: Option<&VisitEffect>,
        payment: Option<&VisitPayment>,
    ) -> Result<Visit, AppError> {
        let mut tx = self.pool.begin().await?;

        // Trava o contrato; se mudou de status desde a leitura, nada é gravado
        let current = sqlx::query_scalar::<_, ContractStatus>(
            "SELECT status FROM contracts WHERE id = $1 FOR UPDATE",
        )
        .bind(visit.contract_id)
        .fetch_optional(&mut *tx)
        .await?;
        match current {
            None => return Err(AppError::ContractNotFound(visit.contract_id)),
            Some(status) if status != expected_status => {
                return Err(AppError::StaleState(visit.contract_id));
            }
            Some(_) => {}
        }

        if let Some(effect) = effect {
            if let Some(change) = &effect.reactivation {
                apply_change(&mut tx, change).await?;
            }

            sqlx::query(
                r#"
                UPDATE contracts
                SET last_effective_visit_date = $2, next_due_date = $3, updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(visit.contract_id)
            .bind(effect.last_effective_visit_date)
            .bind(effect.next_due_date)
            .execute(&mut *tx)
            .await?;
        }

        if let Some(collected) = payment {
            apply_payment(&mut tx, &collected.payment, collected.expected_paid, &collected.totals).await?;
        }

        let saved = sqlx::query_as::<_, Visit>(&format!(
            r#"
            INSERT INTO visits (
                contract_id, technician_id, latitude, longitude, distance_m, visit_type,
                remarks, payment_collected, payment_amount, verified, visited_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {VISIT_COLUMNS}
            "#
        ))
        .bind(visit.contract_id)
        .bind(visit.technician_id)
        .bind(visit.latitude)
        .bind(visit.longitude)
        .bind(visit.distance_m)
        .bind(visit.visit_type)
        .bind(&visit.remarks)
        .bind(visit.payment_collected)
        .bind(visit.payment_amount)
        .bind(visit.verified)
        .bind(visit.visited_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(saved)
    }

    async fn record_payment(
        &self,
        payment: &NewPayment,
        expected_paid: Decimal,
        totals: &Totals,
    ) -> Result<Payment, AppError> {
        let mut tx = self.pool.begin().await?;
        let saved = apply_payment(&mut tx, payment, expected_paid, totals).await?;
        tx.commit().await?;
        Ok(saved)
    }
}
