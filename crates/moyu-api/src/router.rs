use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::middleware::require_auth;
use crate::response::Envelope;
use crate::services::run_blocking;
use crate::state::AppState;
use crate::storage::{AVATAR_DIR, CAMPAIGN_IMAGE_DIR};
use crate::{auth, campaigns, transactions};

/// Uploads larger than this are refused before reaching a handler.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/users", post(auth::register_user))
        .route("/sessions", post(auth::login))
        .route("/email_checkers", post(auth::check_email))
        .route("/campaigns", get(campaigns::list_campaigns))
        .route("/campaigns/{id}", get(campaigns::get_campaign))
        .route("/transactions/notify", post(transactions::payment_notification));

    let protected_routes = Router::new()
        .route("/avatars", post(auth::upload_avatar))
        .route("/users/fetch", get(auth::fetch_user))
        .route("/campaigns", post(campaigns::create_campaign))
        .route("/campaigns/{id}", put(campaigns::update_campaign))
        .route("/campaign-images", post(campaigns::upload_image))
        .route("/campaigns/{id}/transactions", get(transactions::campaign_transactions))
        .route(
            "/transactions",
            get(transactions::user_transactions).post(transactions::create_transaction),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .nest("/api/v1", public_routes.merge(protected_routes))
        .nest_service(&format!("/{}", AVATAR_DIR), ServeDir::new(state.uploads.avatar_dir()))
        .nest_service(
            &format!("/{}", CAMPAIGN_IMAGE_DIR),
            ServeDir::new(state.uploads.campaign_image_dir()),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index() -> impl IntoResponse {
    Json(json!({
        "name": "moyu",
        "version": env!("CARGO_PKG_VERSION"),
        "api": "/api/v1",
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match run_blocking(&state, |db| Ok(db.ping()?)).await {
        Ok(()) => Envelope::success("ok", json!({ "database": "ok" })).into_response(),
        Err(e) => {
            error!("Health check failed: {}", e);
            Envelope::error(
                "database unavailable",
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "database": "unavailable" }),
            )
            .into_response()
        }
    }
}
