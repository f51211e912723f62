// src/services/customer_service.rs

use std::sync::Arc;

use crate::{
    common::error::AppError,
    db::CustomerStore,
    models::customer::{Customer, DuplicateGroup, Location, MergeOutcome},
    services::identity::duplicate_groups,
};

#[derive(Clone)]
pub struct CustomerService {
    customers: Arc<dyn CustomerStore>,
}

impl CustomerService {
    pub fn new(customers: Arc<dyn CustomerStore>) -> Self {
        Self { customers }
    }

    pub async fn list_customers(&self) -> Result<Vec<Customer>, AppError> {
        self.customers.list_customers().await
    }

    pub async fn list_locations(&self, customer_id: i64) -> Result<Vec<Location>, AppError> {
        if self.customers.find_customer(customer_id).await?.is_none() {
            return Err(AppError::CustomerNotFound(customer_id));
        }
        self.customers.list_locations(customer_id).await
    }

    pub async fn find_duplicates(&self) -> Result<Vec<DuplicateGroup>, AppError> {
        let customers = self.customers.list_customers().await?;
        Ok(duplicate_groups(&customers))
    }

    /// Junta os duplicados no principal. Ids desconhecidos entre os duplicados são ignorados.
    pub async fn merge(&self, primary_id: i64, duplicate_ids: &[i64]) -> Result<MergeOutcome, AppError> {
        let duplicates: Vec<i64> = duplicate_ids
            .iter()
            .copied()
            .filter(|id| *id != primary_id)
            .collect();
        if duplicates.is_empty() {
            return Err(AppError::BadRequest(
                "Select at least one duplicate other than the primary customer.".to_string(),
            ));
        }

        let outcome = self.customers.merge_customers(primary_id, &duplicates).await?;

        tracing::info!(
            primary_id,
            moved = outcome.locations_moved,
            removed = outcome.customers_removed,
            "Clientes mesclados"
        );
        Ok(outcome)
    }
}
