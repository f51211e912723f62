// src/handlers.rs

pub mod contracts;
pub mod customers;
pub mod dashboard;
pub mod imports;
pub mod visits;
