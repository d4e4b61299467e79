use crate::infrastructure::http::controllers::sla;
use crate::infrastructure::http::middleware::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

const MAX_BODY_BYTES: usize = 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route(
            "/api/sla/policies",
            get(sla::list_policies).post(sla::create_policy),
        )
        .route(
            "/api/sla/policies/:id",
            get(sla::get_policy)
                .put(sla::update_policy)
                .delete(sla::delete_policy),
        )
        .route("/api/sla/apply", post(sla::apply_sla))
        .route(
            "/api/sla/conversations/:conversation_id",
            get(sla::get_conversation_sla),
        )
        .route("/api/sla/applied/:id/events", get(sla::list_sla_events));

    Router::new()
        .route("/health", get(health_handler))
        .merge(api)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_handler() -> &'static str {
    "OK"
}
