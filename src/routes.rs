use axum::{
    body::Bytes,
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use chanmint_api::CreatedUser;
use chanmint_registry::ChannelRecord;
use chanmint_token::{ChannelRole, IdentityRole, IssuedToken};

use crate::error::ServiceError;
use crate::service::{ChannelService, MintedChannel};

pub type AppState = Arc<ChannelService>;

/// Every route the service exposes, wrapped in request tracing
pub fn router(service: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/channels", post(mint_channel).get(list_channels))
        .route("/channels/exists", get(channel_exists))
        .route("/tokens/join", post(issue_join_token))
        .route("/tokens/identity", post(issue_identity_token))
        .route("/fetch_app_token", post(fetch_app_token))
        .route("/users", post(create_user))
        .route("/public_key", get(public_key))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

#[derive(Debug, Default, Deserialize)]
struct MintChannelBody {
    uid: Option<u32>,
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ExistsParams {
    channel_name: Option<String>,
}

#[derive(Debug, Serialize)]
struct ExistsResponse {
    channel_name: String,
    exists: bool,
}

#[derive(Debug, Serialize)]
struct ChannelList {
    channels: Vec<ChannelRecord>,
}

#[derive(Debug, Default, Deserialize)]
struct JoinTokenBody {
    channel_name: Option<String>,
    uid: Option<u32>,
    role: Option<ChannelRole>,
    expires_at: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct IdentityTokenBody {
    user_id: Option<String>,
    role: Option<IdentityRole>,
    expires_at: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct AppTokenBody {
    expires_in: Option<i64>,
}

#[derive(Debug, Serialize)]
struct AppTokenResponse {
    token: String,
    expires_in: i64,
}

#[derive(Debug, Default, Deserialize)]
struct CreateUserBody {
    username: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Serialize)]
struct PublicKeyResponse {
    public_key: String,
}

async fn health() -> &'static str {
    "ok"
}

async fn mint_channel(
    State(service): State<AppState>,
    body: Bytes,
) -> Result<Json<MintedChannel>, ServiceError> {
    let body: MintChannelBody = parse_body(&body)?;
    Ok(Json(service.mint_channel(body.uid, body.expires_in)?))
}

async fn list_channels(State(service): State<AppState>) -> Json<ChannelList> {
    Json(ChannelList {
        channels: service.live_channels(),
    })
}

async fn channel_exists(
    State(service): State<AppState>,
    Query(params): Query<ExistsParams>,
) -> Result<Json<ExistsResponse>, ServiceError> {
    let exists = service.channel_exists(params.channel_name.as_deref())?;
    Ok(Json(ExistsResponse {
        channel_name: params.channel_name.unwrap_or_default(),
        exists,
    }))
}

async fn issue_join_token(
    State(service): State<AppState>,
    body: Bytes,
) -> Result<Json<IssuedToken>, ServiceError> {
    let body: JoinTokenBody = parse_body(&body)?;
    let issued = service.issue_join_token(
        body.channel_name.as_deref().unwrap_or_default(),
        body.uid,
        body.role,
        body.expires_at,
    )?;
    Ok(Json(issued))
}

async fn issue_identity_token(
    State(service): State<AppState>,
    body: Bytes,
) -> Result<Json<IssuedToken>, ServiceError> {
    let body: IdentityTokenBody = parse_body(&body)?;
    let issued = service.issue_identity_token(
        body.user_id.as_deref().unwrap_or_default(),
        body.role,
        body.expires_at,
    )?;
    Ok(Json(issued))
}

async fn fetch_app_token(
    State(service): State<AppState>,
    body: Bytes,
) -> Result<Json<AppTokenResponse>, ServiceError> {
    let body: AppTokenBody = parse_body(&body)?;
    let expires_in = body.expires_in.unwrap_or(service.app_token_ttl());
    let issued = service.issue_app_token(Some(expires_in))?;
    Ok(Json(AppTokenResponse {
        token: issued.token,
        expires_in,
    }))
}

async fn create_user(
    State(service): State<AppState>,
    body: Bytes,
) -> Result<Json<CreatedUser>, ServiceError> {
    let body: CreateUserBody = parse_body(&body)?;
    let user = service
        .create_user(body.username.as_deref(), body.password.as_deref())
        .await?;
    Ok(Json(user))
}

async fn public_key(
    State(service): State<AppState>,
) -> Result<Json<PublicKeyResponse>, ServiceError> {
    Ok(Json(PublicKeyResponse {
        public_key: service.public_key()?,
    }))
}

// Missing or mistyped fields must surface as 400, so bodies are parsed here
// rather than through the Json extractor (which answers 415/422).
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ServiceError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ServiceError::validation(format!("invalid request body: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_body_parses_to_defaults() {
        let body: MintChannelBody = parse_body(&Bytes::new()).unwrap();
        assert!(body.uid.is_none());
        assert!(body.expires_in.is_none());

        let body: AppTokenBody = parse_body(&Bytes::from_static(b"  \n")).unwrap();
        assert!(body.expires_in.is_none());
    }

    #[test]
    fn test_mistyped_body_is_a_validation_error() {
        let err = parse_body::<MintChannelBody>(&Bytes::from_static(br#"{"uid": "seven"}"#))
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let err = parse_body::<JoinTokenBody>(&Bytes::from_static(b"{not json")).unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[test]
    fn test_role_names_are_lowercase() {
        let body: JoinTokenBody = parse_body(&Bytes::from_static(
            br#"{"channel_name": "c", "role": "subscriber"}"#,
        ))
        .unwrap();
        assert_eq!(body.role, Some(ChannelRole::Subscriber));
    }
}
