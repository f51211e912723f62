// src/services/import_service.rs
//
// Conciliação da planilha de clientes: linha a linha, em ordem, resolvendo ou criando
// cliente -> local -> contrato. O índice do lote é passado explicitamente pelo loop.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    config::ServiceRegion,
    db::{ContractStore, CustomerStore, ImportStore},
    models::{
        contract::{ContractStatus, NewContract},
        customer::{Customer, NewCustomer, NewLocation, TechnicianArea},
        import::{
            parse_amount, parse_date, ImportCounters, ImportOptions, ImportReport, ImportRow,
            ImportRun, NewImportRunItem, RawRow, RowConflicts, RowResult, UndoSummary,
            CSV_TEMPLATE_HEADERS,
        },
    },
    services::{
        coordinates::{near_identical, normalize, CoordinateStatus},
        fines::{compute_totals, contract_end_date, next_visit_due},
        identity::{
            find_conflicts, match_customer, normalize_key, normalize_phone, title_case,
            CustomerIdentity, IdentityKeys,
        },
    },
};

// =========================================================================
//  ÍNDICE DO LOTE
// =========================================================================

/// Registro já gravado ou apenas simulado (dry run) por uma linha anterior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum EntityKey {
    Stored(i64),
    Pending(usize),
}

struct KnownCustomer {
    key: EntityKey,
    identity: IdentityKeys,
}

impl CustomerIdentity for KnownCustomer {
    fn name(&self) -> &str {
        self.identity.name()
    }
    fn license_number(&self) -> Option<&str> {
        self.identity.license_number()
    }
    fn gra_number(&self) -> Option<&str> {
        self.identity.gra_number()
    }
}

struct KnownLocation {
    key: EntityKey,
    customer: EntityKey,
    name: String,
    coordinates: Option<(f64, f64)>,
}

struct BatchIndex {
    customers: Vec<KnownCustomer>,
    locations: Vec<KnownLocation>,
    loaded_customers: HashSet<i64>,
    contracts: HashSet<(EntityKey, NaiveDate)>,
    technicians: HashMap<String, i64>,
    pending: usize,
}

impl BatchIndex {
    fn new(existing: &[Customer], areas: &[TechnicianArea]) -> Self {
        let customers = existing
            .iter()
            .map(|c| KnownCustomer {
                key: EntityKey::Stored(c.id),
                identity: IdentityKeys {
                    name: Some(c.name.clone()),
                    license_number: c.license_number.clone(),
                    gra_number: c.gra_number.clone(),
                },
            })
            .collect();

        let mut technicians = HashMap::new();
        for area in areas {
            technicians
                .entry(area.area.trim().to_lowercase())
                .or_insert(area.technician_id);
        }

        Self {
            customers,
            locations: Vec::new(),
            loaded_customers: HashSet::new(),
            contracts: HashSet::new(),
            technicians,
            pending: 0,
        }
    }

    fn next_pending(&mut self) -> EntityKey {
        self.pending += 1;
        EntityKey::Pending(self.pending)
    }

    fn technician_for(&self, area: Option<&str>) -> Option<i64> {
        area.and_then(|a| self.technicians.get(&a.trim().to_lowercase()).copied())
    }
}

/// O que a linha produziu, antes de virar `RowResult`.
enum RowOutcome {
    Imported(String),
    Skipped(String),
    Invalid(String),
}

struct RowContext {
    warnings: Vec<String>,
    created: NewImportRunItem,
}

fn identity_keys(row: &ImportRow) -> IdentityKeys {
    IdentityKeys {
        name: row.name.as_deref().map(title_case).filter(|n| !n.is_empty()),
        license_number: normalize_key(row.license_number.as_deref()),
        gra_number: normalize_key(row.gra_number.as_deref()),
    }
}

fn location_label(row: &ImportRow, keys: &IdentityKeys) -> String {
    row.location
        .as_deref()
        .or(row.address.as_deref())
        .map(title_case)
        .or_else(|| keys.name.clone())
        .unwrap_or_else(|| "Main".to_string())
}

/// Data opcional; valor presente mas ilegível vira aviso.
fn optional_date(value: Option<&str>, column: &str, warnings: &mut Vec<String>) -> Option<NaiveDate> {
    let value = value?;
    let parsed = parse_date(value);
    if parsed.is_none() {
        warnings.push(format!("{column} '{value}' is not a valid date"));
    }
    parsed
}

fn optional_amount(value: Option<&str>, column: &str, warnings: &mut Vec<String>) -> Decimal {
    let Some(value) = value else { return Decimal::ZERO };
    parse_amount(value).unwrap_or_else(|| {
        warnings.push(format!("{column} '{value}' is not a valid amount; using 0"));
        Decimal::ZERO
    })
}

// =========================================================================
//  CSV
// =========================================================================

/// Lê um CSV com cabeçalho em linhas cruas. Linhas totalmente vazias são ignoradas.
pub fn parse_csv(body: &str) -> Result<Vec<RawRow>, AppError> {
    let body = body.trim_start_matches('\u{feff}');
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let headers = reader.headers()?.clone();
    if headers.iter().all(str::is_empty) {
        return Err(AppError::BadRequest("CSV has no header row.".to_string()));
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        let row: RawRow = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.to_string(), v.to_string()))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

/// Planilha modelo (só o cabeçalho) para download.
pub fn template_csv() -> Result<String, AppError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_TEMPLATE_HEADERS)?;
    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("falha ao gerar o modelo CSV: {e}"))?;
    Ok(String::from_utf8(bytes).map_err(anyhow::Error::from)?)
}

// =========================================================================
//  SERVIÇO
// =========================================================================

#[derive(Clone)]
pub struct ImportService {
    customers: Arc<dyn CustomerStore>,
    contracts: Arc<dyn ContractStore>,
    imports: Arc<dyn ImportStore>,
    region: ServiceRegion,
}

impl ImportService {
    pub fn new(
        customers: Arc<dyn CustomerStore>,
        contracts: Arc<dyn ContractStore>,
        imports: Arc<dyn ImportStore>,
        region: ServiceRegion,
    ) -> Self {
        Self { customers, contracts, imports, region }
    }

    pub async fn import_batch(
        &self,
        rows: &[RawRow],
        options: ImportOptions,
        actor: Option<Uuid>,
    ) -> Result<ImportReport, AppError> {
        let existing = self.customers.list_customers().await?;
        let areas = self.customers.list_technician_areas().await?;
        let mut index = BatchIndex::new(&existing, &areas);

        let parsed: Vec<ImportRow> = rows.iter().map(ImportRow::from_raw).collect();
        let batch_keys: Vec<(usize, IdentityKeys)> =
            parsed.iter().map(identity_keys).enumerate().collect();

        let run_id = if options.dry_run {
            None
        } else {
            Some(self.imports.create_run(actor).await?.id)
        };

        tracing::info!(rows = rows.len(), dry_run = options.dry_run, ?run_id, "Importação iniciada");

        let mut counters = ImportCounters {
            total_rows: rows.len() as i32,
            ..Default::default()
        };
        let mut row_results = Vec::with_capacity(rows.len());

        for (i, row) in parsed.iter().enumerate() {
            let mut ctx = RowContext {
                warnings: find_conflicts(i, &batch_keys[i].1, &batch_keys, &existing),
                created: NewImportRunItem {
                    import_run_id: run_id.unwrap_or_default(),
                    ..Default::default()
                },
            };
            let snapshot = counters.clone();

            let outcome = self
                .process_row(row, options, &mut index, &mut counters, &mut ctx)
                .await;

            // Mesmo numa linha que falhou no meio, o que foi criado fica rastreado para o undo
            if run_id.is_some() && !ctx.created.is_empty() {
                self.imports.add_run_item(&ctx.created).await?;
            }

            let (success, message) = match outcome {
                Ok(RowOutcome::Imported(message)) => {
                    counters.valid_rows += 1;
                    (true, message)
                }
                Ok(RowOutcome::Skipped(message)) => {
                    counters.skipped_rows += 1;
                    (false, message)
                }
                Ok(RowOutcome::Invalid(message)) => {
                    counters.invalid_rows += 1;
                    (false, message)
                }
                Err(e) if e.is_systemic() => {
                    tracing::error!(row = i, error = %e, "Importação abortada");
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(row = i, error = %e, "Linha rejeitada");
                    counters = snapshot;
                    counters.invalid_rows += 1;
                    // O que já foi gravado continua contado, igual aos itens da execução
                    let kept = ctx.created.record_in(&mut counters);
                    let message = if kept.is_empty() {
                        format!("Row failed: {e}.")
                    } else {
                        format!("Row failed after creating {}: {e}.", kept.join(", "))
                    };
                    (false, message)
                }
            };

            row_results.push(RowResult {
                index: i,
                success,
                message,
                warnings: ctx.warnings,
            });
        }

        if let Some(run_id) = run_id {
            self.imports.finish_run(run_id, &counters).await?;
        }

        tracing::info!(
            ?run_id,
            valid = counters.valid_rows,
            invalid = counters.invalid_rows,
            skipped = counters.skipped_rows,
            contracts = counters.contracts_created,
            "Importação concluída"
        );

        Ok(ImportReport {
            row_results,
            counters,
            import_run_id: run_id,
        })
    }

    async fn process_row(
        &self,
        row: &ImportRow,
        options: ImportOptions,
        index: &mut BatchIndex,
        counters: &mut ImportCounters,
        ctx: &mut RowContext,
    ) -> Result<RowOutcome, AppError> {
        let keys = identity_keys(row);
        if keys.name.is_none() && keys.license_number.is_none() {
            return Ok(RowOutcome::Invalid(
                "Row has neither a name nor a license number.".to_string(),
            ));
        }

        // 1. Coordenadas
        let coordinates = normalize(
            row.latitude.as_deref().unwrap_or(""),
            row.longitude.as_deref().unwrap_or(""),
            &self.region,
        );
        match coordinates.status {
            CoordinateStatus::Invalid if options.skip_invalid => {
                return Ok(RowOutcome::Skipped(format!(
                    "Skipped: invalid coordinates ({}).",
                    coordinates.message
                )));
            }
            CoordinateStatus::Invalid => ctx.warnings.push(format!(
                "Invalid coordinates ({}); no contract will be created",
                coordinates.message
            )),
            CoordinateStatus::Swapped => {
                ctx.warnings.push("Latitude and longitude were swapped".to_string())
            }
            CoordinateStatus::Ok => {}
        }

        // 2. Cliente
        let matched = match_customer(&keys, &index.customers).map(|c| c.key);
        let (customer, customer_note) = match matched {
            Some(key) => {
                counters.existing_customers += 1;
                (key, "existing customer")
            }
            None => {
                let Some(name) = keys.name.clone() else {
                    return Ok(RowOutcome::Invalid(format!(
                        "No customer has license {} and the row has no name.",
                        keys.license_number.as_deref().unwrap_or("-")
                    )));
                };
                let key = if options.dry_run {
                    index.next_pending()
                } else {
                    let created = self
                        .customers
                        .create_customer(&NewCustomer {
                            name,
                            license_number: keys.license_number.clone(),
                            gra_number: keys.gra_number.clone(),
                            phone: row.phone.as_deref().and_then(normalize_phone),
                            area: row.area.clone(),
                        })
                        .await?;
                    ctx.created.customer_id = Some(created.id);
                    EntityKey::Stored(created.id)
                };
                index.customers.push(KnownCustomer { key, identity: keys.clone() });
                counters.new_customers += 1;
                (key, "new customer")
            }
        };

        // 3. Local
        self.load_locations(index, customer).await?;
        let label = location_label(row, &keys);
        let usable = coordinates
            .is_usable()
            .then_some((coordinates.lat, coordinates.lng));

        let found = index
            .locations
            .iter()
            .find(|l| {
                l.customer == customer
                    && (l.name.eq_ignore_ascii_case(&label)
                        || matches!((l.coordinates, usable), (Some(a), Some(b)) if near_identical(a, b)))
            })
            .map(|l| (l.key, l.coordinates));

        let (location, site, location_note) = match found {
            Some((key, site)) => {
                counters.existing_locations += 1;
                (key, site, "existing location")
            }
            None => {
                let govt_renewal_date =
                    optional_date(row.renewal_date.as_deref(), "Renewal Date", &mut ctx.warnings);
                let key = match (options.dry_run, customer) {
                    (false, EntityKey::Stored(customer_id)) => {
                        let created = self
                            .customers
                            .create_location(&NewLocation {
                                customer_id,
                                name: label.clone(),
                                address: row.address.clone(),
                                latitude: usable.map(|(lat, _)| lat),
                                longitude: usable.map(|(_, lng)| lng),
                                coordinates_valid: usable.is_some(),
                                coordinate_note: (coordinates.status != CoordinateStatus::Ok)
                                    .then(|| coordinates.message.clone()),
                                govt_renewal_date,
                            })
                            .await?;
                        ctx.created.location_id = Some(created.id);
                        EntityKey::Stored(created.id)
                    }
                    _ => index.next_pending(),
                };
                index.locations.push(KnownLocation {
                    key,
                    customer,
                    name: label,
                    coordinates: usable,
                });
                counters.new_locations += 1;
                (key, usable, "new location")
            }
        };

        // 4. Contrato
        match row.renewed_flag() {
            Some(true) => counters.renewed += 1,
            Some(false) => counters.not_renewed += 1,
            None => {}
        }

        let start = optional_date(row.amc_date.as_deref(), "AMC Date", &mut ctx.warnings);
        let contract_note = match (start, site) {
            (None, _) => "no AMC date, contract not created",
            (Some(_), None) => "location has no valid coordinates, contract not created",
            (Some(start), Some(_)) => {
                if self.contract_exists(index, location, start).await? {
                    counters.duplicate_contracts += 1;
                    "contract already exists"
                } else {
                    self.create_contract(row, options, index, location, start, ctx).await?;
                    counters.contracts_created += 1;
                    "contract created"
                }
            }
        };

        Ok(RowOutcome::Imported(format!(
            "Imported: {customer_note}, {location_note}, {contract_note}."
        )))
    }

    /// Traz os locais de um cliente gravado para o índice, uma vez por lote.
    async fn load_locations(&self, index: &mut BatchIndex, customer: EntityKey) -> Result<(), AppError> {
        let EntityKey::Stored(customer_id) = customer else { return Ok(()) };
        if !index.loaded_customers.insert(customer_id) {
            return Ok(());
        }

        let locations = self.customers.list_locations(customer_id).await?;
        index.locations.extend(locations.into_iter().map(|l| KnownLocation {
            key: EntityKey::Stored(l.id),
            customer,
            coordinates: l.coordinates(),
            name: l.name,
        }));
        Ok(())
    }

    async fn contract_exists(
        &self,
        index: &BatchIndex,
        location: EntityKey,
        start: NaiveDate,
    ) -> Result<bool, AppError> {
        if index.contracts.contains(&(location, start)) {
            return Ok(true);
        }
        match location {
            EntityKey::Stored(location_id) => Ok(self
                .contracts
                .find_contract_by_location_and_start(location_id, start)
                .await?
                .is_some()),
            EntityKey::Pending(_) => Ok(false),
        }
    }

    async fn create_contract(
        &self,
        row: &ImportRow,
        options: ImportOptions,
        index: &mut BatchIndex,
        location: EntityKey,
        start: NaiveDate,
        ctx: &mut RowContext,
    ) -> Result<(), AppError> {
        let next_due = optional_date(row.next_due.as_deref(), "Next Due Date", &mut ctx.warnings)
            .unwrap_or_else(|| next_visit_due(start));
        let last_visit = optional_date(row.last_checked.as_deref(), "Last Checked Date", &mut ctx.warnings)
            .unwrap_or(start);
        let govt_fee = optional_amount(row.govt_fee.as_deref(), "Govt Fee", &mut ctx.warnings);
        let amc_value = optional_amount(row.amc_value.as_deref(), "AMC Value", &mut ctx.warnings);
        let totals = compute_totals(govt_fee, amc_value, Decimal::ZERO, Decimal::ZERO);

        let technician_id = index.technician_for(row.area.as_deref());
        if row.area.is_some() && technician_id.is_none() {
            ctx.warnings.push(format!(
                "No technician covers area '{}'",
                row.area.as_deref().unwrap_or_default()
            ));
        }

        if let (false, EntityKey::Stored(location_id)) = (options.dry_run, location) {
            let created = self
                .contracts
                .create_contract(&NewContract {
                    location_id,
                    start_date: start,
                    end_date: contract_end_date(start),
                    status: ContractStatus::Active,
                    next_due_date: Some(next_due),
                    last_effective_visit_date: Some(last_visit),
                    technician_id,
                    govt_fee,
                    amc_value,
                    fine_amount: Decimal::ZERO,
                    total_amount: totals.total,
                    paid_amount: Decimal::ZERO,
                    balance: totals.balance,
                    renewal_of: None,
                })
                .await?;
            ctx.created.contract_id = Some(created.id);
        }

        index.contracts.insert((location, start));
        Ok(())
    }

    /// Só os avisos de identidade, sem gravar nada. Linhas sem aviso ficam de fora.
    pub async fn preview_conflicts(&self, rows: &[RawRow]) -> Result<Vec<RowConflicts>, AppError> {
        let existing = self.customers.list_customers().await?;
        let batch_keys: Vec<(usize, IdentityKeys)> = rows
            .iter()
            .map(|raw| identity_keys(&ImportRow::from_raw(raw)))
            .enumerate()
            .collect();

        Ok(batch_keys
            .iter()
            .map(|(i, keys)| RowConflicts {
                index: *i,
                warnings: find_conflicts(*i, keys, &batch_keys, &existing),
            })
            .filter(|c| !c.warnings.is_empty())
            .collect())
    }

    pub async fn list_runs(&self) -> Result<Vec<ImportRun>, AppError> {
        self.imports.list_runs().await
    }

    /// Desfaz uma importação: contratos, depois locais sem uso, depois clientes sem locais,
    /// e por fim o próprio registro da execução.
    pub async fn undo(&self, run_id: i64) -> Result<UndoSummary, AppError> {
        if self.imports.find_run(run_id).await?.is_none() {
            return Err(AppError::ImportRunNotFound(run_id));
        }
        let items = self.imports.list_run_items(run_id).await?;
        let mut summary = UndoSummary::default();

        for contract_id in items.iter().filter_map(|i| i.contract_id) {
            if self.contracts.delete_contract(contract_id).await? {
                summary.contracts_deleted += 1;
            }
        }

        for location_id in items.iter().filter_map(|i| i.location_id) {
            if self.customers.delete_location_if_unused(location_id).await? {
                summary.locations_deleted += 1;
            } else if self.customers.find_location(location_id).await?.is_some() {
                summary.locations_kept += 1;
            }
        }

        for customer_id in items.iter().filter_map(|i| i.customer_id) {
            if self.customers.delete_customer_if_orphan(customer_id).await? {
                summary.customers_deleted += 1;
            } else if self.customers.find_customer(customer_id).await?.is_some() {
                summary.customers_kept += 1;
            }
        }

        self.imports.delete_run(run_id).await?;

        tracing::info!(run_id, ?summary, "Importação desfeita");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_store::MemoryStore;

    fn raw(pairs: &[(&str, &str)]) -> RawRow {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn setup() -> (Arc<MemoryStore>, ImportService) {
        let store = Arc::new(MemoryStore::new());
        let service = ImportService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            ServiceRegion::default(),
        );
        (store, service)
    }

    fn shop_row() -> RawRow {
        raw(&[
            ("Name", "al noor trading"),
            ("Location", "main branch"),
            ("License No.", "L1"),
            ("GRA No.", "G1"),
            ("Contact No.", "501234567"),
            ("LATT", "25.2"),
            ("LONG", "55.3"),
            ("Renewal Date", "01/03/2025"),
            ("AMC Date", "15/01/2024"),
            ("Renewed", "yes"),
        ])
    }

    const FULL: ImportOptions = ImportOptions { dry_run: false, skip_invalid: false };

    #[tokio::test]
    async fn single_row_creates_customer_location_and_contract() {
        let (store, service) = setup();

        let report = service.import_batch(&[shop_row()], FULL, None).await.unwrap();

        let c = &report.counters;
        assert_eq!((c.total_rows, c.valid_rows, c.invalid_rows), (1, 1, 0));
        assert_eq!((c.new_customers, c.new_locations, c.contracts_created), (1, 1, 1));
        assert_eq!(c.renewed, 1);
        assert!(report.row_results[0].success);

        let customers = store.customers();
        assert_eq!(customers[0].name, "Al Noor Trading");
        assert_eq!(customers[0].phone.as_deref(), Some("0501234567"));

        let location = &store.locations()[0];
        assert_eq!(location.name, "Main Branch");
        assert!(location.coordinates_valid);
        assert_eq!(location.govt_renewal_date, NaiveDate::from_ymd_opt(2025, 3, 1));

        let contract = &store.contracts()[0];
        let start = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(contract.status, ContractStatus::Active);
        assert_eq!(contract.start_date, start);
        assert_eq!(contract.end_date, NaiveDate::from_ymd_opt(2025, 1, 15).unwrap());
        assert_eq!(contract.next_due_date, Some(next_visit_due(start)));
        assert_eq!(contract.last_effective_visit_date, Some(start));

        let run = &store.runs()[0];
        assert_eq!(Some(run.id), report.import_run_id);
        assert_eq!(run.new_customers, 1);
        assert!(run.completed_at.is_some());
    }

    #[tokio::test]
    async fn reimporting_the_same_batch_creates_nothing() {
        let (store, service) = setup();
        let rows = vec![shop_row()];

        service.import_batch(&rows, FULL, None).await.unwrap();
        let second = service.import_batch(&rows, FULL, None).await.unwrap();

        let c = &second.counters;
        assert_eq!((c.new_customers, c.new_locations, c.contracts_created), (0, 0, 0));
        assert_eq!((c.existing_customers, c.existing_locations), (1, 1));
        assert_eq!(c.duplicate_contracts, 1);
        assert_eq!(store.customers().len(), 1);
        assert_eq!(store.locations().len(), 1);
        assert_eq!(store.contracts().len(), 1);
    }

    #[tokio::test]
    async fn later_rows_see_entities_created_earlier_in_the_batch() {
        let (store, service) = setup();
        let mut second = shop_row();
        second.insert("Location".into(), "warehouse".into());
        second.insert("LATT".into(), "25.5".into());

        let report = service.import_batch(&[shop_row(), second], FULL, None).await.unwrap();

        let c = &report.counters;
        assert_eq!((c.new_customers, c.existing_customers), (1, 1));
        assert_eq!(c.new_locations, 2);
        assert_eq!(c.contracts_created, 2);
        assert_eq!(store.customers().len(), 1);
    }

    #[tokio::test]
    async fn locations_match_by_coordinates_when_names_differ() {
        let (store, service) = setup();
        let mut second = shop_row();
        second.insert("Location".into(), "Main Branch (new sign)".into());
        second.insert("LATT".into(), "25.20005".into());
        second.insert("AMC Date".into(), "15/01/2025".into());

        let report = service.import_batch(&[shop_row(), second], FULL, None).await.unwrap();

        assert_eq!(report.counters.existing_locations, 1);
        assert_eq!(store.locations().len(), 1);
        assert_eq!(store.contracts().len(), 2);
    }

    #[tokio::test]
    async fn rows_without_identity_are_invalid_but_do_not_stop_the_batch() {
        let (_, service) = setup();
        let anonymous = raw(&[("Location", "somewhere"), ("LAT", "25.2"), ("LNG", "55.3")]);

        let report = service
            .import_batch(&[anonymous, shop_row()], FULL, None)
            .await
            .unwrap();

        assert_eq!(report.counters.invalid_rows, 1);
        assert_eq!(report.counters.valid_rows, 1);
        assert!(!report.row_results[0].success);
        assert!(report.row_results[0].message.contains("neither a name nor a license"));
        assert!(report.row_results[1].success);
    }

    #[tokio::test]
    async fn invalid_coordinates_are_skipped_on_request() {
        let (store, service) = setup();
        let mut row = shop_row();
        row.insert("LATT".into(), "0".into());
        row.insert("LONG".into(), "0".into());

        let options = ImportOptions { dry_run: false, skip_invalid: true };
        let report = service.import_batch(&[row], options, None).await.unwrap();

        assert_eq!(report.counters.skipped_rows, 1);
        assert_eq!(report.counters.valid_rows, 0);
        assert!(store.customers().is_empty());
    }

    #[tokio::test]
    async fn invalid_coordinates_are_admitted_without_a_contract() {
        let (store, service) = setup();
        let mut row = shop_row();
        row.insert("LATT".into(), "31.0".into());

        let report = service.import_batch(&[row], FULL, None).await.unwrap();

        assert_eq!(report.counters.valid_rows, 1);
        assert_eq!(report.counters.contracts_created, 0);
        let location = &store.locations()[0];
        assert!(!location.coordinates_valid);
        assert_eq!(location.latitude, None);
        assert!(location.coordinate_note.as_deref().unwrap_or("").contains("latitude"));
        assert!(store.contracts().is_empty());
    }

    #[tokio::test]
    async fn swapped_coordinates_are_repaired_with_a_warning() {
        let (store, service) = setup();
        let mut row = shop_row();
        row.insert("LATT".into(), "55.3".into());
        row.insert("LONG".into(), "25.2".into());

        let report = service.import_batch(&[row], FULL, None).await.unwrap();

        assert_eq!(report.counters.contracts_created, 1);
        assert!(report.row_results[0].warnings.iter().any(|w| w.contains("swapped")));
        let location = &store.locations()[0];
        assert_eq!(location.latitude, Some(25.2));
        assert_eq!(location.longitude, Some(55.3));
    }

    #[tokio::test]
    async fn dry_run_counts_without_writing() {
        let (store, service) = setup();
        let mut second = shop_row();
        second.insert("Location".into(), "warehouse".into());
        second.insert("LATT".into(), "25.5".into());
        let rows = vec![shop_row(), second, shop_row()];

        let options = ImportOptions { dry_run: true, skip_invalid: false };
        let report = service.import_batch(&rows, options, None).await.unwrap();

        let c = &report.counters;
        assert_eq!((c.new_customers, c.existing_customers), (1, 2));
        assert_eq!((c.new_locations, c.existing_locations), (2, 1));
        assert_eq!((c.contracts_created, c.duplicate_contracts), (2, 1));
        assert_eq!(report.import_run_id, None);
        assert!(store.customers().is_empty());
        assert!(store.contracts().is_empty());
        assert!(store.runs().is_empty());
    }

    #[tokio::test]
    async fn contract_uses_explicit_columns_and_area_technician() {
        let (store, service) = setup();
        store.add_technician_area(77, "Industrial Area");
        let mut row = shop_row();
        row.insert("Area".into(), "industrial area".into());
        row.insert("Next Due Date".into(), "01/03/2024".into());
        row.insert("Last Checked Date".into(), "10/01/2024".into());
        row.insert("Govt Fee".into(), "300".into());
        row.insert("AMC Value".into(), "1,200".into());

        service.import_batch(&[row], FULL, None).await.unwrap();

        let contract = &store.contracts()[0];
        assert_eq!(contract.technician_id, Some(77));
        assert_eq!(contract.next_due_date, NaiveDate::from_ymd_opt(2024, 3, 1));
        assert_eq!(contract.last_effective_visit_date, NaiveDate::from_ymd_opt(2024, 1, 10));
        assert_eq!(contract.total_amount, Decimal::from(1500));
        assert_eq!(contract.balance, Decimal::from(1500));
    }

    #[tokio::test]
    async fn conflicting_license_warns_and_resolves_to_existing_customer() {
        let (store, service) = setup();
        store
            .create_customer(&NewCustomer {
                name: "ABC".into(),
                license_number: Some("L1".into()),
                gra_number: None,
                phone: None,
                area: None,
            })
            .await
            .unwrap();
        let row = raw(&[
            ("Name", "XYZ"),
            ("License No.", "L1"),
            ("LAT", "25.2"),
            ("LNG", "55.3"),
            ("AMC Date", "2024-01-01"),
        ]);

        let report = service.import_batch(&[row.clone()], FULL, None).await.unwrap();

        assert!(report.row_results[0].success);
        assert!(report.row_results[0].warnings.iter().any(|w| w.contains("ABC")));
        assert_eq!(report.counters.existing_customers, 1);
        assert_eq!(report.counters.new_customers, 0);
        assert_eq!(store.customers().len(), 1);

        let preview = service.preview_conflicts(&[row]).await.unwrap();
        assert_eq!(preview.len(), 1);
        assert!(preview[0].warnings[0].contains("ABC"));
    }

    #[tokio::test]
    async fn undo_removes_everything_the_run_created() {
        let (store, service) = setup();
        let report = service.import_batch(&[shop_row()], FULL, None).await.unwrap();
        let run_id = report.import_run_id.unwrap();

        let summary = service.undo(run_id).await.unwrap();

        assert_eq!(
            summary,
            UndoSummary {
                contracts_deleted: 1,
                locations_deleted: 1,
                customers_deleted: 1,
                locations_kept: 0,
                customers_kept: 0,
            }
        );
        assert!(store.customers().is_empty());
        assert!(store.locations().is_empty());
        assert!(store.contracts().is_empty());
        assert!(store.runs().is_empty());

        let err = service.undo(run_id).await.unwrap_err();
        assert!(matches!(err, AppError::ImportRunNotFound(id) if id == run_id));
    }

    #[tokio::test]
    async fn failed_row_still_counts_what_it_created() {
        let (store, service) = setup();
        store.fail_next_contract_insert();

        let report = service.import_batch(&[shop_row()], FULL, None).await.unwrap();

        let c = &report.counters;
        assert_eq!((c.valid_rows, c.invalid_rows), (0, 1));
        assert_eq!(c.new_customers as usize, store.customers().len());
        assert_eq!(c.new_locations as usize, store.locations().len());
        assert_eq!((c.new_customers, c.new_locations, c.contracts_created), (1, 1, 0));
        assert!(store.contracts().is_empty());

        let row = &report.row_results[0];
        assert!(!row.success);
        assert!(row.message.contains("customer, location"), "{}", row.message);

        let run = &store.runs()[0];
        assert_eq!((run.new_customers, run.new_locations), (1, 1));

        let summary = service.undo(run.id).await.unwrap();
        assert_eq!((summary.locations_deleted, summary.customers_deleted), (1, 1));
        assert!(store.customers().is_empty());
    }

    #[tokio::test]
    async fn undo_keeps_customers_still_used_by_other_runs() {
        let (store, service) = setup();
        let first = service.import_batch(&[shop_row()], FULL, None).await.unwrap();
        let mut other_site = shop_row();
        other_site.insert("Location".into(), "warehouse".into());
        other_site.insert("LATT".into(), "25.5".into());
        service.import_batch(&[other_site], FULL, None).await.unwrap();

        let summary = service.undo(first.import_run_id.unwrap()).await.unwrap();

        assert_eq!(summary.contracts_deleted, 1);
        assert_eq!(summary.locations_deleted, 1);
        assert_eq!(summary.customers_kept, 1);
        assert_eq!(store.customers().len(), 1);
        assert_eq!(store.locations().len(), 1);
        assert_eq!(store.contracts().len(), 1);
    }

    #[test]
    fn csv_upload_accepts_aliases_and_skips_blank_lines() {
        let body = "\u{feff}Name,LATT,LONG,AMC Date\nAl Noor,25.2,55.3,01/01/2024\n,,,\nBeta,25.3,55.4,\n";

        let rows = parse_csv(body).unwrap();

        assert_eq!(rows.len(), 2);
        let first = ImportRow::from_raw(&rows[0]);
        assert_eq!(first.name.as_deref(), Some("Al Noor"));
        assert_eq!(first.latitude.as_deref(), Some("25.2"));
        assert_eq!(ImportRow::from_raw(&rows[1]).amc_date, None);
    }

    #[test]
    fn template_has_the_fixed_header_row() {
        let csv = template_csv().unwrap();
        assert_eq!(
            csv.trim_end(),
            "Name,Location,GRA No.,License No.,Contact No.,Latitude,Longitude,Renewal Date,\
             AMC Date,Last Checked Date,Next Due Date,Renewed,Status,Distance"
        );
    }
}
