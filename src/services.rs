// src/services.rs

// Regras puras
pub mod coordinates;
pub mod fines;
pub mod identity;

// Serviços com acesso ao banco
pub mod customer_service;
pub mod dashboard_service;
pub mod import_service;
pub mod lifecycle_service;
pub mod visit_service;
