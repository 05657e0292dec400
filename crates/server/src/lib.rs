//! Soundalike HTTP server
//!
//! Actix-web REST API over the recommendation catalog

pub mod jellyfin;
pub mod routes;
pub mod state;
pub mod types;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use soundalike_common::{AppConfig, Result};
use std::sync::Arc;
use tracing::info;
use tracing_actix_web::TracingLogger;

pub use jellyfin::{JellyfinClient, PlaybackDispatcher, PlaybackSink};
pub use state::AppState;

/// Load the catalog and serve HTTP until shutdown
pub async fn start_server(config: AppConfig) -> Result<()> {
    let bind_addr = config.server_bind_address();
    let state = Arc::new(AppState::initialize(config).await?);

    info!(
        "Serving {} tracks on http://{}",
        state.catalog.current().len(),
        bind_addr
    );

    let data = web::Data::new(state);
    HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .wrap(Cors::permissive())
            .app_data(data.clone())
            .configure(routes::configure)
    })
    .bind(&bind_addr)?
    .run()
    .await?;

    info!("Server stopped");
    Ok(())
}
