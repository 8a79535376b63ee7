use std::net::SocketAddr;
use std::sync::Arc;

use roost_api::{app, state::AuthConfig, worker, AppState};
use roost_catalog::{
    LedgerConfig, MemoryInventoryLedger, PriceConfig, PriceEngine, RoomTypeEntry, StaticCatalog,
    StaticDiscountValidator,
};
use roost_core::catalog::CatalogProvider;
use roost_core::discount::DiscountValidator;
use roost_core::repository::{HoldStore, InventoryLedger};
use roost_reservation::{EngineConfig, MockPaymentGateway, PaymentOrchestrator, ReservationEngine};
use roost_store::{DbClient, MemoryHoldStore, PgHoldStore, PgInventoryLedger};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roost_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = roost_store::app_config::Config::load()?;
    tracing::info!("Starting Roost API on port {}", config.server.port);

    let mut catalog = StaticCatalog::new();
    for seed in &config.catalog.room_types {
        catalog = catalog.with_room_type(
            seed.id,
            RoomTypeEntry::new(seed.total_units, seed.base_rate),
        );
    }
    let catalog: Arc<dyn CatalogProvider> = Arc::new(catalog);

    let (store, ledger): (Arc<dyn HoldStore>, Arc<dyn InventoryLedger>) =
        match &config.database.url {
            Some(url) => {
                let db = DbClient::new(url).await?;
                db.migrate().await?;
                tracing::info!("Using Postgres-backed store");
                (
                    Arc::new(PgHoldStore::new(db.pool.clone())),
                    Arc::new(PgInventoryLedger::new(db.pool.clone(), catalog.clone())),
                )
            }
            None => {
                tracing::info!("No database configured, using in-memory store");
                (
                    Arc::new(MemoryHoldStore::new()),
                    Arc::new(MemoryInventoryLedger::new(
                        catalog.clone(),
                        LedgerConfig::default(),
                    )),
                )
            }
        };

    let rules = config.business_rules.clone();
    let validator: Arc<dyn DiscountValidator> = Arc::new(StaticDiscountValidator::new(Vec::new()));
    let engine = Arc::new(ReservationEngine::new(
        store,
        ledger,
        catalog,
        validator,
        PriceEngine::new(PriceConfig {
            tax_rate_bps: rules.tax_rate_bps,
        }),
        EngineConfig {
            hold_ttl_seconds: rules.hold_ttl_seconds,
            max_discount_codes: rules.max_discount_codes,
            currency: rules.currency.clone(),
        },
    ));

    // TODO: swap for the real gateway adapter once provider credentials are
    // provisioned.
    let payments = Arc::new(PaymentOrchestrator::new(
        Arc::new(MockPaymentGateway::succeeding()),
        engine.clone(),
    ));

    worker::start_expiry_worker(engine.clone(), &rules);

    let app_state = AppState {
        engine,
        payments,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
        },
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(app_state)).await?;
    Ok(())
}
