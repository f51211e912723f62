// src/db.rs

pub mod store;
pub use store::{ContractStore, CustomerStore, ImportStore};

pub mod customer_repo;
pub use customer_repo::CustomerRepository;
pub mod contract_repo;
pub use contract_repo::ContractRepository;
pub mod import_repo;
pub use import_repo::ImportRepository;

#[cfg(test)]
pub mod memory_store;
