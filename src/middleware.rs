// src/middleware.rs

pub mod actor;
