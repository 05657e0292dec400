use actix_web::{get, web, HttpResponse};
use tracing::{error, info, warn};

use crate::routes::error_response;
use crate::state::AppState;
use crate::types::{RecommendQuery, RecommendResponse};

#[get("/recommend")]
pub async fn recommend(
    query: web::Query<RecommendQuery>,
    state: web::Data<std::sync::Arc<AppState>>,
) -> actix_web::Result<HttpResponse> {
    let top_n = query.top_n.unwrap_or(state.config.default_top_n);

    // One snapshot for the whole request
    let catalog = state.catalog.current();

    let results = match catalog.recommend(&query.song, top_n) {
        Ok(results) => results,
        Err(e) => {
            if e.is_not_found() {
                warn!("No recommendations for {}: {}", query.song, e);
            } else {
                error!("Recommendation for {} failed: {}", query.song, e);
            }
            return Ok(error_response(&e));
        }
    };

    let (recommendations, distances): (Vec<String>, Vec<f32>) = results
        .into_iter()
        .map(|r| (r.track, r.distance))
        .unzip();

    info!(
        "Recommended {} tracks for {}",
        recommendations.len(),
        query.song
    );

    if let Some(playback) = &state.playback {
        playback.spawn(recommendations.clone());
    }

    Ok(HttpResponse::Ok().json(RecommendResponse {
        query: query.song.clone(),
        recommendations,
        distances,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jellyfin::tests::RecordingSink;
    use crate::jellyfin::PlaybackDispatcher;
    use crate::types::ErrorResponse;
    use actix_web::{http::StatusCode, test, App};
    use soundalike_common::AppConfig;
    use soundalike_vector::{Catalog, EmbeddingStore};
    use std::collections::HashMap;
    use std::sync::Arc;

    fn catalog(entries: &[(&str, Vec<f32>)]) -> Catalog {
        let mut store = EmbeddingStore::new(entries[0].1.len()).unwrap();
        for (id, v) in entries {
            store.insert(*id, v).unwrap();
        }
        Catalog::new(store).unwrap()
    }

    fn abc() -> Catalog {
        catalog(&[
            ("A.mp3", vec![0.0, 0.0]),
            ("B.mp3", vec![1.0, 0.0]),
            ("C.mp3", vec![5.0, 5.0]),
        ])
    }

    fn state(catalog: Catalog) -> web::Data<Arc<AppState>> {
        web::Data::new(Arc::new(AppState::new(AppConfig::default(), catalog, None)))
    }

    #[actix_web::test]
    async fn test_recommend_ok() {
        let app = test::init_service(App::new().app_data(state(abc())).service(recommend)).await;

        let req = test::TestRequest::get()
            .uri("/recommend?song=A.mp3&top_n=1")
            .to_request();
        let body: RecommendResponse = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body.query, "A.mp3");
        assert_eq!(body.recommendations, vec!["B.mp3"]);
        assert_eq!(body.distances, vec![1.0]);
    }

    #[actix_web::test]
    async fn test_recommend_default_top_n() {
        let app = test::init_service(App::new().app_data(state(abc())).service(recommend)).await;

        let req = test::TestRequest::get().uri("/recommend?song=C.mp3").to_request();
        let body: RecommendResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.recommendations, vec!["B.mp3", "A.mp3"]);
    }

    #[actix_web::test]
    async fn test_unknown_song_is_404() {
        let app = test::init_service(App::new().app_data(state(abc())).service(recommend)).await;

        let req = test::TestRequest::get()
            .uri("/recommend?song=nope.mp3&top_n=5")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let body: ErrorResponse = test::read_body_json(resp).await;
        assert_eq!(body.detail, "Song not found");
    }

    #[actix_web::test]
    async fn test_single_track_catalog_is_404() {
        let single = catalog(&[("solo.mp3", vec![1.0])]);
        let app = test::init_service(App::new().app_data(state(single)).service(recommend)).await;

        let req = test::TestRequest::get()
            .uri("/recommend?song=solo.mp3")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_zero_top_n_is_400() {
        let app = test::init_service(App::new().app_data(state(abc())).service(recommend)).await;

        let req = test::TestRequest::get()
            .uri("/recommend?song=A.mp3&top_n=0")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_playback_failure_does_not_affect_response() {
        let sink = Arc::new(RecordingSink {
            failing: vec!["id-b".to_string()],
            ..Default::default()
        });
        let mapping: HashMap<String, String> =
            [("B.mp3".to_string(), "id-b".to_string())].into_iter().collect();
        let playback = Arc::new(PlaybackDispatcher::new(sink.clone(), mapping));
        let data = web::Data::new(Arc::new(AppState::new(
            AppConfig::default(),
            abc(),
            Some(playback),
        )));
        let app = test::init_service(App::new().app_data(data).service(recommend)).await;

        let req = test::TestRequest::get()
            .uri("/recommend?song=A.mp3&top_n=2")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        // Let the background dispatch run
        for _ in 0..50 {
            if !sink.calls.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(
            sink.calls.lock().unwrap().first().cloned(),
            Some(("play".to_string(), "id-b".to_string()))
        );
    }
}
