//src/main.rs

use axum::{
    routing::{get, post},
    Router,
};
use tokio::{net::TcpListener, time::MissedTickBehavior};
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod common;
mod config;
mod db;
mod docs;
mod handlers;
mod middleware;
mod models;
mod services;

use crate::{
    config::{AmcSettings, AppState},
    docs::ApiDoc,
    services::lifecycle_service::LifecycleService,
};

// Roda a varredura na inicialização e depois a cada intervalo configurado
fn spawn_sweep_scheduler(lifecycle: LifecycleService, settings: AmcSettings) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(settings.sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(e) = lifecycle.daily_sweep(settings.today()).await {
                tracing::error!("🔥 Varredura agendada falhou: {:?}", e);
            }
        }
    });
}

fn app(app_state: AppState) -> Router {
    let contract_routes = Router::new()
        .route("/"
               ,post(handlers::contracts::create_contract)
               .get(handlers::contracts::list_contracts)
        )
        .route("/sweep", post(handlers::contracts::run_sweep))
        .route("/{id}"
               ,get(handlers::contracts::get_contract)
               .delete(handlers::contracts::delete_contract)
        )
        .route("/{id}/status", post(handlers::contracts::set_status))
        .route("/{id}/renew", post(handlers::contracts::renew_contract))
        .route("/{id}/events", get(handlers::contracts::list_events))
        .route("/{id}/visits", post(handlers::visits::record_visit))
        .route("/{id}/payments", post(handlers::visits::record_payment));

    let import_routes = Router::new()
        .route("/", post(handlers::imports::import_rows))
        .route("/csv", post(handlers::imports::import_csv))
        .route("/template", get(handlers::imports::download_template))
        .route("/conflicts", post(handlers::imports::preview_conflicts))
        .route("/runs", get(handlers::imports::list_runs))
        .route("/undo", post(handlers::imports::undo_import));

    let customer_routes = Router::new()
        .route("/", get(handlers::customers::list_customers))
        .route("/duplicates", get(handlers::customers::list_duplicates))
        .route("/merge", post(handlers::customers::merge_customers))
        .route("/{id}/locations", get(handlers::customers::list_locations));

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/api/health", get(|| async { "OK" }))
        .route("/api/dashboard/summary", get(handlers::dashboard::get_summary))
        .nest("/api/contracts", contract_routes)
        .nest("/api/import", import_routes)
        .nest("/api/customers", customer_routes)
        .with_state(app_state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn")),
        )
        .with_target(false)
        .compact()
        .init();

    // Se a configuração falhar, a aplicação não deve iniciar
    let app_state = AppState::new().await?;

    sqlx::migrate!().run(&app_state.db_pool).await?;
    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    spawn_sweep_scheduler(
        app_state.lifecycle_service.clone(),
        app_state.settings.clone(),
    );

    let listener = TcpListener::bind(&app_state.settings.bind_addr).await?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);

    axum::serve(listener, app(app_state)).await?;
    Ok(())
}
