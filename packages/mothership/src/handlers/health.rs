use axum::response::IntoResponse;

/// Liveness probe for load balancers and scripts.
pub async fn health_handler() -> impl IntoResponse {
    "OK"
}
