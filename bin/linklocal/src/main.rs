//! # linklocal Binary
//!
//! The entry point that assembles the application based on compile-time features
//! and runtime settings.

mod seed;

use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use ll_api::configure_routes;
use ll_api::handlers::AppState;
use ll_api::middleware::{cors_policy, standard_middleware};
use ll_config::{LogFormat, LogSettings, Settings, StoreBackend, StoreSettings};
use ll_core::traits::{DocumentStore, IdentityProvider};
use ll_core::Marketplace;
use tracing::info;
use tracing_subscriber::EnvFilter;

// Feature-gated imports: each plugin is compiled in only when asked for
#[cfg(feature = "store-memory")]
use ll_store_memory::MemoryDocumentStore;

#[cfg(feature = "store-sqlite")]
use ll_store_sqlite::SqliteDocumentStore;

#[cfg(feature = "auth-simple")]
use ll_auth_simple::SimpleIdentityProvider;

#[cfg(not(feature = "auth-simple"))]
compile_error!("linklocal needs an identity plugin; enable the `auth-simple` feature");

/// `RUST_LOG` wins over the configured filter when it is set.
fn init_tracing(log: &LogSettings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.filter));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match log.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Plain => builder.init(),
    }
}

async fn build_store(store: &StoreSettings) -> anyhow::Result<Arc<dyn DocumentStore>> {
    match store.backend {
        #[cfg(feature = "store-memory")]
        StoreBackend::Memory => Ok(Arc::new(MemoryDocumentStore::new())),
        #[cfg(feature = "store-sqlite")]
        StoreBackend::Sqlite => Ok(Arc::new(
            SqliteDocumentStore::connect(&store.sqlite_url).await?,
        )),
        #[allow(unreachable_patterns)]
        other => anyhow::bail!("store backend {other:?} is not compiled into this build"),
    }
}

fn build_identity(settings: &Settings) -> Arc<dyn IdentityProvider> {
    Arc::new(SimpleIdentityProvider::new(&settings.token_salt))
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // 1. Settings and logging
    let settings = Settings::load()?;
    init_tracing(&settings.log);

    // 2. Plugins
    let gateway = build_store(&settings.store).await?;
    let identity = build_identity(&settings);
    let market = Marketplace::new(gateway);
    info!(backend = ?settings.store.backend, "document store ready");

    // 3. Optional demo data
    if settings.seed.enabled {
        seed::run(&market, identity.as_ref(), &settings.seed).await?;
    }

    // 4. Shared state (dynamic dispatch keeps the plugins swappable)
    let state = web::Data::new(AppState { market, identity });

    let (host, port) = settings.bind_address();
    info!("linklocal starting on http://{host}:{port}");

    HttpServer::new(move || {
        App::new()
            .wrap(cors_policy())
            .wrap(standard_middleware())
            .app_data(state.clone())
            .configure(configure_routes)
    })
    .bind((host.as_str(), port))?
    .run()
    .await?;
    Ok(())
}
