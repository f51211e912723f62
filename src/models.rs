// src/models.rs

pub mod contract;
pub mod customer;
pub mod dashboard;
pub mod import;
pub mod visit;
