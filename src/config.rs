// src/config.rs

use std::{env, str::FromStr, sync::Arc, time::Duration};

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use rust_decimal::Decimal;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    db::{ContractRepository, CustomerRepository, ImportRepository},
    services::{
        customer_service::CustomerService, dashboard_service::DashboardService,
        import_service::ImportService, lifecycle_service::LifecycleService,
        visit_service::VisitService,
    },
};

/// Caixa geográfica da região atendida + limiar da heurística de eixos trocados.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServiceRegion {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lng_min: f64,
    pub lng_max: f64,
    pub swap_threshold: f64,
}

impl Default for ServiceRegion {
    fn default() -> Self {
        Self {
            lat_min: 22.0,
            lat_max: 28.0,
            lng_min: 50.0,
            lng_max: 60.0,
            swap_threshold: 40.0,
        }
    }
}

/// Valor mensal da multa de renovação, por faixa.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FineRates {
    pub standard: Decimal,
    pub reduced: Decimal,
}

impl Default for FineRates {
    fn default() -> Self {
        Self {
            standard: Decimal::from(200),
            reduced: Decimal::from(160),
        }
    }
}

/// Configuração de negócio lida do ambiente (com padrões).
#[derive(Debug, Clone)]
pub struct AmcSettings {
    pub bind_addr: String,
    pub region: ServiceRegion,
    pub fine_rates: FineRates,
    pub checkin_radius_m: f64,
    pub sweep_interval: Duration,
    /// Fuso do negócio: define o "hoje" da varredura, do ciclo e das visitas.
    pub utc_offset: FixedOffset,
}

// UTC+4, o mesmo fuso da região padrão
fn gulf_offset() -> FixedOffset {
    FixedOffset::east_opt(4 * 60 * 60).unwrap_or(Utc.fix())
}

impl Default for AmcSettings {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            region: ServiceRegion::default(),
            fine_rates: FineRates::default(),
            checkin_radius_m: 200.0,
            sweep_interval: Duration::from_secs(6 * 60 * 60),
            utc_offset: gulf_offset(),
        }
    }
}

// Lê uma variável opcional; valor presente mas ilegível é erro de inicialização
fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{key} inválida ({raw}): {e}")),
        Err(_) => Ok(default),
    }
}

impl AmcSettings {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let region = ServiceRegion {
            lat_min: env_or("REGION_LAT_MIN", defaults.region.lat_min)?,
            lat_max: env_or("REGION_LAT_MAX", defaults.region.lat_max)?,
            lng_min: env_or("REGION_LNG_MIN", defaults.region.lng_min)?,
            lng_max: env_or("REGION_LNG_MAX", defaults.region.lng_max)?,
            swap_threshold: env_or("REGION_SWAP_THRESHOLD", defaults.region.swap_threshold)?,
        };
        if region.lat_min >= region.lat_max || region.lng_min >= region.lng_max {
            anyhow::bail!("Região de atendimento inválida: {region:?}");
        }

        let fine_rates = FineRates {
            standard: env_or("FINE_RATE_STANDARD", defaults.fine_rates.standard)?,
            reduced: env_or("FINE_RATE_REDUCED", defaults.fine_rates.reduced)?,
        };

        let sweep_secs: u64 = env_or("SWEEP_INTERVAL_SECS", defaults.sweep_interval.as_secs())?;

        let offset_minutes: i32 =
            env_or("UTC_OFFSET_MINUTES", defaults.utc_offset.local_minus_utc() / 60)?;
        let utc_offset = offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| anyhow::anyhow!("UTC_OFFSET_MINUTES fora do intervalo: {offset_minutes}"))?;

        Ok(Self {
            bind_addr: env_or("BIND_ADDR", defaults.bind_addr)?,
            region,
            fine_rates,
            checkin_radius_m: env_or("CHECKIN_RADIUS_METERS", defaults.checkin_radius_m)?,
            sweep_interval: Duration::from_secs(sweep_secs.max(60)),
            utc_offset,
        })
    }

    /// Data local do negócio para um instante.
    pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.utc_offset).date_naive()
    }

    pub fn today(&self) -> NaiveDate {
        self.local_date(Utc::now())
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub settings: AmcSettings,

    pub lifecycle_service: LifecycleService,
    pub import_service: ImportService,
    pub customer_service: CustomerService,
    pub visit_service: VisitService,
    pub dashboard_service: DashboardService,
}

impl AppState {
    pub async fn new() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL deve ser definida"))?;
        let settings = AmcSettings::from_env()?;

        let db_pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&database_url)
            .await?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        // --- Monta o gráfico de dependências ---
        let customers = Arc::new(CustomerRepository::new(db_pool.clone()));
        let contracts = Arc::new(ContractRepository::new(db_pool.clone()));
        let imports = Arc::new(ImportRepository::new(db_pool.clone()));

        let lifecycle_service =
            LifecycleService::new(contracts.clone(), customers.clone(), settings.fine_rates);
        let import_service = ImportService::new(
            customers.clone(),
            contracts.clone(),
            imports,
            settings.region,
        );
        let customer_service = CustomerService::new(customers.clone());
        let visit_service = VisitService::new(
            contracts.clone(),
            customers,
            settings.checkin_radius_m,
            settings.utc_offset,
        );
        let dashboard_service = DashboardService::new(contracts);

        Ok(Self {
            db_pool,
            settings,
            lifecycle_service,
            import_service,
            customer_service,
            visit_service,
            dashboard_service,
        })
    }
}
