// src/models/customer.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

// --- CLIENTE ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    #[schema(example = 7)]
    pub id: i64,

    #[schema(example = "Al Noor Trading")]
    pub name: String,

    // Chaves de deduplicação (únicas quando presentes)
    #[schema(example = "L-55821")]
    pub license_number: Option<String>,
    #[schema(example = "GRA-1022")]
    pub gra_number: Option<String>,

    #[schema(example = "0501234567")]
    pub phone: Option<String>,
    #[schema(example = "Industrial Area")]
    pub area: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewCustomer {
    pub name: String,
    pub license_number: Option<String>,
    pub gra_number: Option<String>,
    pub phone: Option<String>,
    pub area: Option<String>,
}

// --- LOCAL (Site físico) ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: i64,
    pub customer_id: i64,

    #[schema(example = "Main Branch")]
    pub name: String,
    pub address: Option<String>,

    // Graus decimais; nulos quando a coordenada da planilha não serviu
    #[schema(example = 25.276987)]
    pub latitude: Option<f64>,
    #[schema(example = 55.296249)]
    pub longitude: Option<f64>,
    pub coordinates_valid: bool,
    pub coordinate_note: Option<String>,

    #[schema(value_type = Option<String>, format = Date, example = "2025-03-01")]
    pub govt_renewal_date: Option<NaiveDate>,

    pub created_at: DateTime<Utc>,
}

impl Location {
    /// Par (lat, lng) apenas quando o local pode receber contrato.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.coordinates_valid, self.latitude, self.longitude) {
            (true, Some(lat), Some(lng)) => Some((lat, lng)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewLocation {
    pub customer_id: i64,
    pub name: String,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub coordinates_valid: bool,
    pub coordinate_note: Option<String>,
    pub govt_renewal_date: Option<NaiveDate>,
}

// --- TÉCNICOS ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TechnicianArea {
    pub technician_id: i64,
    #[schema(example = "Industrial Area")]
    pub area: String,
}

// --- MERGE ---

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateGroup {
    pub customer_ids: Vec<i64>,
    pub names: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MergeOutcome {
    pub primary_id: i64,
    pub locations_moved: u64,
    pub customers_removed: u64,
}
