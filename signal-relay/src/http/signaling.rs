//! Directory and signaling routes.

use super::authorize;
use crate::error::{RequestError, RequestResult};
use crate::relay::RouteOutcome;
use crate::server::SignalRelay;
use axum::{
    extract::{rejection::JsonRejection, Path},
    http::HeaderMap,
    Extension, Json,
};
use signal_types::api::{
    Ack, Presence, RegisterRequest, RegisterResponse, SignalRequest, UserProfile,
};
use signal_types::{Identity, SignalKind};
use std::sync::Arc;

type JsonBody<T> = Result<Json<T>, JsonRejection>;

fn decode<T>(relay: &SignalRelay, body: JsonBody<T>) -> RequestResult<T> {
    body.map(|Json(value)| value)
        .map_err(|rejection| relay.malformed_body(rejection.body_text()))
}

fn path_identity(user_id: String) -> RequestResult<Identity> {
    Identity::from_field(Some(user_id), "userId").map_err(RequestError::from)
}

/// `POST /register`
pub async fn register_handler(
    Extension(relay): Extension<Arc<SignalRelay>>,
    headers: HeaderMap,
    body: JsonBody<RegisterRequest>,
) -> RequestResult<Json<RegisterResponse>> {
    authorize(&relay, &headers)?;
    let user_id = relay.register_user(decode(&relay, body)?).await?;
    Ok(Json(RegisterResponse {
        success: true,
        user_id,
    }))
}

/// `GET /lookup/:user_id`
pub async fn lookup_handler(
    Extension(relay): Extension<Arc<SignalRelay>>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> RequestResult<Json<UserProfile>> {
    authorize(&relay, &headers)?;
    let identity = path_identity(user_id)?;
    Ok(Json(relay.lookup_user(&identity).await?))
}

/// `POST /offer`
pub async fn offer_handler(
    Extension(relay): Extension<Arc<SignalRelay>>,
    headers: HeaderMap,
    body: JsonBody<SignalRequest>,
) -> RequestResult<Json<Ack>> {
    signal(&relay, &headers, SignalKind::Offer, body)
}

/// `POST /answer`
pub async fn answer_handler(
    Extension(relay): Extension<Arc<SignalRelay>>,
    headers: HeaderMap,
    body: JsonBody<SignalRequest>,
) -> RequestResult<Json<Ack>> {
    signal(&relay, &headers, SignalKind::Answer, body)
}

/// `POST /ice`
pub async fn ice_handler(
    Extension(relay): Extension<Arc<SignalRelay>>,
    headers: HeaderMap,
    body: JsonBody<SignalRequest>,
) -> RequestResult<Json<Ack>> {
    signal(&relay, &headers, SignalKind::Ice, body)
}

fn signal(
    relay: &SignalRelay,
    headers: &HeaderMap,
    kind: SignalKind,
    body: JsonBody<SignalRequest>,
) -> RequestResult<Json<Ack>> {
    authorize(relay, headers)?;
    let request = decode(relay, body)?;
    match relay.send_signal(kind, request)? {
        RouteOutcome::Delivered => tracing::debug!("{} delivered live", kind),
        RouteOutcome::Queued { depth, .. } => tracing::debug!("{} queued (depth {})", kind, depth),
        RouteOutcome::Dropped(why) => tracing::debug!("{} dropped: {}", kind, why),
    }
    Ok(Json(Ack::OK))
}

/// `GET /presence/:user_id` (no shared secret required)
pub async fn presence_handler(
    Extension(relay): Extension<Arc<SignalRelay>>,
    Path(user_id): Path<String>,
) -> RequestResult<Json<Presence>> {
    let identity = path_identity(user_id)?;
    Ok(Json(relay.presence(&identity).await?))
}
