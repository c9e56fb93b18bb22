use rusty_library_loans::{
    adapters::{
        memory::{InMemoryCatalogService, InMemoryLoanStore, InMemoryMemberService},
        postgres::{
            PostgresCatalogService, PostgresLoanReports, PostgresLoanRepository,
            PostgresMemberService,
        },
    },
    api::{handlers::AppState, router::create_router},
    application::loan::{ServiceDependencies, spawn_overdue_sweep},
    config::{AppConfig, StorageBackend},
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load .env before reading configuration
    dotenvy::dotenv().ok();

    let config = AppConfig::load().expect("Failed to load configuration");

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.filter.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let service_deps = match config.storage.backend {
        StorageBackend::Postgres => {
            tracing::info!(
                max_connections = config.database.max_connections,
                "Connecting to PostgreSQL"
            );

            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(config.database.max_connections)
                .connect(&config.database.url)
                .await
                .expect("Failed to connect to database");

            if config.database.run_migrations {
                sqlx::migrate!("./migrations")
                    .run(&pool)
                    .await
                    .expect("Failed to run database migrations");
            }

            ServiceDependencies {
                loan_repository: Arc::new(PostgresLoanRepository::new(pool.clone())),
                loan_reports: Arc::new(PostgresLoanReports::new(pool.clone())),
                member_service: Arc::new(PostgresMemberService::new(pool.clone())),
                catalog_service: Arc::new(PostgresCatalogService::new(pool)),
                policy: config.loan_policy.clone(),
            }
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on shutdown");

            let store = Arc::new(InMemoryLoanStore::new());
            ServiceDependencies {
                loan_repository: store.clone(),
                loan_reports: store,
                member_service: Arc::new(InMemoryMemberService::new()),
                catalog_service: Arc::new(InMemoryCatalogService::new()),
                policy: config.loan_policy.clone(),
            }
        }
    };

    // Background overdue detection
    if let Some(interval) = config.overdue_sweep.interval() {
        tracing::info!(interval_secs = interval.as_secs(), "Starting overdue sweep");
        spawn_overdue_sweep(service_deps.clone(), interval);
    }

    // Create application state
    let app_state = Arc::new(AppState { service_deps });

    // Create router
    let app = create_router(app_state);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", addr);

    // Start server
    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
