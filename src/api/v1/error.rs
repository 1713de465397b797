use serde::Serialize;
use std::convert::Infallible;
use thiserror::Error;
use tracing::warn;
use warp::http::StatusCode;
use warp::{Rejection, reject};

use crate::application_port::{
    LogoutError, ProfileError, RefreshError, SigninError, SignupError, VerifyError,
};

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
}

#[derive(Debug, Clone, Error)]
pub enum ApiRejection {
    #[error("invalid credentials")]
    Unauthorized,
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("user not found")]
    NotFound,
    #[error("internal error")]
    Internal,
}

impl ApiRejection {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiRejection::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiRejection::Conflict(_) => StatusCode::CONFLICT,
            ApiRejection::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiRejection::NotFound => StatusCode::NOT_FOUND,
            ApiRejection::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn internal<E: std::fmt::Display>(error: E) -> ApiRejection {
        warn!("internal error: {error}");
        ApiRejection::Internal
    }
}

impl reject::Reject for ApiRejection {}

impl From<SignupError> for ApiRejection {
    fn from(error: SignupError) -> Self {
        match error {
            SignupError::Conflict => ApiRejection::Conflict(error.to_string()),
            SignupError::Rejected(_) => ApiRejection::BadRequest(error.to_string()),
        }
    }
}

impl From<SigninError> for ApiRejection {
    fn from(_: SigninError) -> Self {
        ApiRejection::Unauthorized
    }
}

impl From<RefreshError> for ApiRejection {
    fn from(_: RefreshError) -> Self {
        ApiRejection::Unauthorized
    }
}

impl From<VerifyError> for ApiRejection {
    fn from(_: VerifyError) -> Self {
        ApiRejection::Unauthorized
    }
}

impl From<LogoutError> for ApiRejection {
    fn from(error: LogoutError) -> Self {
        match error {
            LogoutError::Storage(_) => ApiRejection::BadRequest("logout failed".to_string()),
        }
    }
}

impl From<ProfileError> for ApiRejection {
    fn from(error: ProfileError) -> Self {
        match error {
            ProfileError::NotFound => ApiRejection::NotFound,
            ProfileError::Store(e) => ApiRejection::internal(e),
        }
    }
}

pub async fn recover_error(err: Rejection) -> Result<impl warp::Reply, Infallible> {
    if let Some(err) = err.find::<ApiRejection>() {
        let json = warp::reply::json(&ErrorBody {
            message: err.to_string(),
        });
        Ok(warp::reply::with_status(json, err.status()))
    } else if err.find::<reject::MissingHeader>().is_some() {
        // An absent Authorization header on a guarded endpoint never made it
        // to verification; same answer as a bad token.
        let json = warp::reply::json(&ErrorBody {
            message: ApiRejection::Unauthorized.to_string(),
        });
        Ok(warp::reply::with_status(json, StatusCode::UNAUTHORIZED))
    } else if err.find::<reject::MethodNotAllowed>().is_some() {
        let json = warp::reply::json(&ErrorBody {
            message: "method not allowed".to_string(),
        });
        Ok(warp::reply::with_status(json, StatusCode::METHOD_NOT_ALLOWED))
    } else if err.is_not_found() {
        let json = warp::reply::json(&ErrorBody {
            message: "not found".to_string(),
        });
        Ok(warp::reply::with_status(json, StatusCode::NOT_FOUND))
    } else {
        let json = warp::reply::json(&ErrorBody {
            message: format!("unhandled error: {err:?}"),
        });
        Ok(warp::reply::with_status(
            json,
            StatusCode::INTERNAL_SERVER_ERROR,
        ))
    }
}
