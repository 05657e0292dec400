use actix_web::{get, post, web, HttpResponse};
use tracing::{error, info};

use crate::routes::error_response;
use crate::state::AppState;
use crate::types::{StatsResponse, StatusResponse};

#[get("/")]
pub async fn root() -> actix_web::Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(StatusResponse {
        status: "Server running. Use /recommend?song=<song_name>&top_n=<N>".to_string(),
    }))
}

/// Catalog statistics
#[get("/stats")]
pub async fn stats(state: web::Data<std::sync::Arc<AppState>>) -> actix_web::Result<HttpResponse> {
    let catalog = state.catalog.current();

    Ok(HttpResponse::Ok().json(StatsResponse {
        tracks: catalog.len(),
        dimension: catalog.store().dimension(),
        digest: catalog.digest().to_string(),
        built_at: catalog.store().built_at(),
        playback_enabled: state.playback.is_some(),
    }))
}

/// Reload store and index from disk, replacing the served catalog
#[post("/reload")]
pub async fn reload(state: web::Data<std::sync::Arc<AppState>>) -> actix_web::Result<HttpResponse> {
    info!("Catalog reload requested");

    let handle = state.catalog.clone();
    let store_path = state.config.store_path.clone();
    let index_path = state.config.index_path.clone();

    let result = tokio::task::spawn_blocking(move || handle.reload(&store_path, &index_path))
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    match result {
        Ok(catalog) => Ok(HttpResponse::Ok().json(serde_json::json!({
            "tracks": catalog.len(),
            "digest": catalog.digest(),
        }))),
        Err(e) => {
            error!("Catalog reload failed, keeping current catalog: {}", e);
            Ok(error_response(&e))
        }
    }
}
