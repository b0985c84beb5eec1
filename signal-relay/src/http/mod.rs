//! HTTP endpoints for signal-relay.
//!
//! Signaling routes, presence, the WebSocket channel, health checks and
//! metrics. Every route shares one [`SignalRelay`] through an `Extension`.

pub mod health;
mod metrics;
mod signaling;
mod ws;

use crate::error::RequestError;
use crate::server::SignalRelay;
use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use signal_types::api::ErrorBody;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use health::HealthStatus;

/// Header carrying the shared secret.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Build the HTTP router with all endpoints.
pub fn build_router(relay: Arc<SignalRelay>) -> Router {
    let mut router = Router::new()
        .route("/register", post(signaling::register_handler))
        .route("/lookup/:user_id", get(signaling::lookup_handler))
        .route("/offer", post(signaling::offer_handler))
        .route("/answer", post(signaling::answer_handler))
        .route("/ice", post(signaling::ice_handler))
        .route("/presence/:user_id", get(signaling::presence_handler))
        .route("/ws", get(ws::ws_handler))
        .route("/health", get(health::health_handler));

    if relay.config().server.metrics_enabled {
        router = router.route("/metrics", get(metrics::metrics_handler));
    }

    router.layer(Extension(relay)).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    )
}

/// Serve the router on `listener` until `shutdown` resolves.
pub async fn serve(
    relay: Arc<SignalRelay>,
    listener: TcpListener,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> crate::error::Result<()> {
    axum::serve(listener, build_router(relay))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Check the `X-API-Key` header against the configured secret.
fn authorize(relay: &SignalRelay, headers: &HeaderMap) -> Result<(), RequestError> {
    let presented = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());
    relay.authorize(presented)
}

/// Build a JSON error response.
fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
        .into_response()
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        match self {
            RequestError::Validation(e) if e.is_missing_field() => {
                error_response(StatusCode::BAD_REQUEST, "Missing required fields")
            }
            RequestError::Validation(e) => error_response(StatusCode::BAD_REQUEST, e.to_string()),
            RequestError::MalformedBody(_) => {
                error_response(StatusCode::BAD_REQUEST, self.to_string())
            }
            RequestError::NotFound { .. } => {
                error_response(StatusCode::NOT_FOUND, "User not found")
            }
            RequestError::Unauthorized => error_response(StatusCode::UNAUTHORIZED, "Unauthorized"),
            RequestError::Misconfigured => error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Server configuration error: API_KEY not set",
            ),
            RequestError::RateLimited(_) => {
                error_response(StatusCode::TOO_MANY_REQUESTS, self.to_string())
            }
            RequestError::AtCapacity { .. } => {
                error_response(StatusCode::SERVICE_UNAVAILABLE, self.to_string())
            }
            RequestError::Directory(e) => {
                tracing::error!("Directory failure: {}", e);
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}
