use super::error::ApiRejection;
use crate::application_port::{SessionService, SigninInput, SignupInput, TokenPair};
use crate::domain_model::{UserId, UserProfile};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warp::http::StatusCode;
use warp::reject;

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub identity: String,
    pub name: String,
    pub secret: String,
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub user: UserProfile,
}

pub async fn signup(
    body: SignupRequest,
    session_service: Arc<dyn SessionService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let user = session_service
        .signup(SignupInput {
            identity: body.identity,
            display_name: body.name,
            secret: body.secret,
        })
        .await
        .map_err(ApiRejection::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::with_status(
        warp::reply::json(&SignupResponse { user }),
        StatusCode::CREATED,
    ))
}

#[derive(Debug, Deserialize)]
pub struct SigninRequest {
    pub identity: String,
    pub secret: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SigninResponse {
    pub user: UserProfile,
    pub access_token: String,
    pub refresh_token: String,
    /// Epoch milliseconds, so the client can record the server-issued expiry
    /// instead of assuming its own TTL.
    pub access_token_expires_at: i64,
}

pub async fn signin(
    body: SigninRequest,
    session_service: Arc<dyn SessionService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let outcome = session_service
        .signin(SigninInput {
            identity: body.identity,
            secret: body.secret,
        })
        .await
        .map_err(ApiRejection::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&SigninResponse {
        user: outcome.user,
        access_token: outcome.tokens.access_token,
        refresh_token: outcome.tokens.refresh_token,
        access_token_expires_at: outcome.tokens.access_expires_at.timestamp_millis(),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub access_token_expires_at: i64,
}

impl From<TokenPair> for RefreshResponse {
    fn from(pair: TokenPair) -> Self {
        RefreshResponse {
            access_token_expires_at: pair.access_expires_at.timestamp_millis(),
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
        }
    }
}

pub async fn refresh(
    body: RefreshRequest,
    session_service: Arc<dyn SessionService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let pair = session_service
        .refresh(&body.refresh_token)
        .await
        .map_err(ApiRejection::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&RefreshResponse::from(pair)))
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub success: bool,
    pub message: String,
}

pub async fn logout(
    user_id: UserId,
    session_service: Arc<dyn SessionService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    session_service
        .logout(user_id)
        .await
        .map_err(ApiRejection::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&LogoutResponse {
        success: true,
        message: "Logged out successfully".to_string(),
    }))
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: UserProfile,
}

pub async fn current_user(
    user_id: UserId,
    session_service: Arc<dyn SessionService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let user = session_service
        .current_user(user_id)
        .await
        .map_err(ApiRejection::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&MeResponse { user }))
}
