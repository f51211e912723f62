// src/models/import.rs

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Linha crua da planilha: cabeçalho -> valor. Os nomes de coluna variam entre operadores.
pub type RawRow = HashMap<String, String>;

/// Cabeçalho oficial oferecido para download, nesta ordem.
pub const CSV_TEMPLATE_HEADERS: [&str; 14] = [
    "Name",
    "Location",
    "GRA No.",
    "License No.",
    "Contact No.",
    "Latitude",
    "Longitude",
    "Renewal Date",
    "AMC Date",
    "Last Checked Date",
    "Next Due Date",
    "Renewed",
    "Status",
    "Distance",
];

// Aliases já normalizados (maiúsculas, sem espaço/pontuação)
const NAME: &[&str] = &["NAME", "CUSTOMER", "CUSTOMERNAME", "SHOPNAME"];
const LOCATION: &[&str] = &["LOCATION", "LOCATIONNAME", "SITE", "BRANCH"];
const ADDRESS: &[&str] = &["ADDRESS", "FULLADDRESS"];
const GRA: &[&str] = &["GRANO", "GRA", "GRANUMBER"];
const LICENSE: &[&str] = &["LICENSENO", "LICENSE", "LICENSENUMBER", "LICENCENO", "LICENCE"];
const PHONE: &[&str] = &["CONTACTNO", "CONTACT", "CONTACTNUMBER", "PHONE", "MOBILE"];
const LATITUDE: &[&str] = &["LATITUDE", "LAT", "LATT"];
const LONGITUDE: &[&str] = &["LONGITUDE", "LONG", "LNG", "LON"];
const RENEWAL_DATE: &[&str] = &["RENEWALDATE", "GOVTRENEWALDATE"];
const AMC_DATE: &[&str] = &["AMCDATE", "AMCSTARTDATE", "STARTDATE"];
const LAST_CHECKED: &[&str] = &["LASTCHECKEDDATE", "LASTCHECKED", "LASTVISIT"];
const NEXT_DUE: &[&str] = &["NEXTDUEDATE", "NEXTDUE"];
const RENEWED: &[&str] = &["RENEWED"];
const AREA: &[&str] = &["AREA", "ZONE", "REGION"];
const GOVT_FEE: &[&str] = &["GOVTFEE", "GOVERNMENTFEE"];
const AMC_VALUE: &[&str] = &["AMCVALUE", "AMCAMOUNT", "AMOUNT"];

fn normalize_header(header: &str) -> String {
    header
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Linha já com as colunas conhecidas resolvidas. Valores vazios viram `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportRow {
    pub name: Option<String>,
    pub location: Option<String>,
    pub address: Option<String>,
    pub gra_number: Option<String>,
    pub license_number: Option<String>,
    pub phone: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub renewal_date: Option<String>,
    pub amc_date: Option<String>,
    pub last_checked: Option<String>,
    pub next_due: Option<String>,
    pub renewed: Option<String>,
    pub area: Option<String>,
    pub govt_fee: Option<String>,
    pub amc_value: Option<String>,
}

impl ImportRow {
    pub fn from_raw(raw: &RawRow) -> Self {
        let normalized: HashMap<String, &str> = raw
            .iter()
            .map(|(k, v)| (normalize_header(k), v.trim()))
            .collect();

        let pick = |aliases: &[&str]| -> Option<String> {
            aliases
                .iter()
                .filter_map(|alias| normalized.get(*alias))
                .find(|v| !v.is_empty())
                .map(|v| v.to_string())
        };

        Self {
            name: pick(NAME),
            location: pick(LOCATION),
            address: pick(ADDRESS),
            gra_number: pick(GRA),
            license_number: pick(LICENSE),
            phone: pick(PHONE),
            latitude: pick(LATITUDE),
            longitude: pick(LONGITUDE),
            renewal_date: pick(RENEWAL_DATE),
            amc_date: pick(AMC_DATE),
            last_checked: pick(LAST_CHECKED),
            next_due: pick(NEXT_DUE),
            renewed: pick(RENEWED),
            area: pick(AREA),
            govt_fee: pick(GOVT_FEE),
            amc_value: pick(AMC_VALUE),
        }
    }

    /// `Some(true)`/`Some(false)` para a coluna "Renewed"; `None` se ausente ou ilegível.
    pub fn renewed_flag(&self) -> Option<bool> {
        let value = self.renewed.as_deref()?.to_ascii_lowercase();
        match value.as_str() {
            "yes" | "y" | "true" | "1" | "renewed" => Some(true),
            "no" | "n" | "false" | "0" | "not renewed" => Some(false),
            _ => None,
        }
    }
}

/// Formatos aceitos, dia antes do mês.
const DATE_FORMATS: [&str; 6] = [
    "%Y-%m-%d",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%d-%b-%Y",
    "%d %b %Y",
];

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
}

pub fn parse_amount(value: &str) -> Option<Decimal> {
    let cleaned: String = value.chars().filter(|c| *c != ',' && !c.is_whitespace()).collect();
    cleaned.parse::<Decimal>().ok().filter(|d| !d.is_sign_negative())
}

// --- Opções e resultados do lote ---

#[derive(Debug, Clone, Copy, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportOptions {
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub skip_invalid: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportCounters {
    pub total_rows: i32,
    pub valid_rows: i32,
    pub invalid_rows: i32,
    pub skipped_rows: i32,
    pub new_customers: i32,
    pub existing_customers: i32,
    pub new_locations: i32,
    pub existing_locations: i32,
    pub contracts_created: i32,
    pub duplicate_contracts: i32,
    pub renewed: i32,
    pub not_renewed: i32,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RowResult {
    /// Índice da linha na entrada (base 0).
    pub index: usize,
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub row_results: Vec<RowResult>,
    pub counters: ImportCounters,
    pub import_run_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RowConflicts {
    pub index: usize,
    pub warnings: Vec<String>,
}

// --- Proveniência ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportRun {
    pub id: i64,
    pub total_rows: i32,
    pub valid_rows: i32,
    pub invalid_rows: i32,
    pub skipped_rows: i32,
    pub new_customers: i32,
    pub existing_customers: i32,
    pub new_locations: i32,
    pub existing_locations: i32,
    pub contracts_created: i32,
    pub duplicate_contracts: i32,
    pub renewed: i32,
    pub not_renewed: i32,
    pub dry_run: bool,
    pub initiated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ImportRun {
    pub fn apply_counters(&mut self, counters: &ImportCounters) {
        self.total_rows = counters.total_rows;
        self.valid_rows = counters.valid_rows;
        self.invalid_rows = counters.invalid_rows;
        self.skipped_rows = counters.skipped_rows;
        self.new_customers = counters.new_customers;
        self.existing_customers = counters.existing_customers;
        self.new_locations = counters.new_locations;
        self.existing_locations = counters.existing_locations;
        self.contracts_created = counters.contracts_created;
        self.duplicate_contracts = counters.duplicate_contracts;
        self.renewed = counters.renewed;
        self.not_renewed = counters.not_renewed;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportRunItem {
    pub id: i64,
    pub import_run_id: i64,
    pub customer_id: Option<i64>,
    pub location_id: Option<i64>,
    pub contract_id: Option<i64>,
}

/// Ids criados por uma linha; só é gravado se algo foi criado.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewImportRunItem {
    pub import_run_id: i64,
    pub customer_id: Option<i64>,
    pub location_id: Option<i64>,
    pub contract_id: Option<i64>,
}

impl NewImportRunItem {
    pub fn is_empty(&self) -> bool {
        self.customer_id.is_none() && self.location_id.is_none() && self.contract_id.is_none()
    }

    /// Soma nos contadores o que esta linha de fato gravou e devolve os rótulos.
    pub fn record_in(&self, counters: &mut ImportCounters) -> Vec<&'static str> {
        let mut kept = Vec::new();
        if self.customer_id.is_some() {
            counters.new_customers += 1;
            kept.push("customer");
        }
        if self.location_id.is_some() {
            counters.new_locations += 1;
            kept.push("location");
        }
        if self.contract_id.is_some() {
            counters.contracts_created += 1;
            kept.push("contract");
        }
        kept
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UndoSummary {
    pub contracts_deleted: u32,
    pub locations_deleted: u32,
    pub customers_deleted: u32,
    pub locations_kept: u32,
    pub customers_kept: u32,
}
