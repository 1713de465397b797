use super::error::ApiRejection;
use super::handler;
use crate::application_port::SessionService;
use crate::domain_model::UserId;
use crate::server::Server;
use std::convert::Infallible;
use std::sync::Arc;
use warp::{Filter, http, reject};

pub fn routes(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let signup = warp::post()
        .and(warp::path("auth"))
        .and(warp::path("signup"))
        .and(warp::path::end())
        .and(warp::body::json())
        .and(with(server.session_service.clone()))
        .and_then(handler::signup);

    let signin = warp::post()
        .and(warp::path("auth"))
        .and(warp::path("signin"))
        .and(warp::path::end())
        .and(warp::body::json())
        .and(with(server.session_service.clone()))
        .and_then(handler::signin);

    let refresh = warp::post()
        .and(warp::path("auth"))
        .and(warp::path("refresh"))
        .and(warp::path::end())
        .and(warp::body::json())
        .and(with(server.session_service.clone()))
        .and_then(handler::refresh);

    let logout = warp::post()
        .and(warp::path("auth"))
        .and(warp::path("logout"))
        .and(warp::path::end())
        .and(with_verification(server.session_service.clone()))
        .and(with(server.session_service.clone()))
        .and_then(handler::logout);

    let me = warp::get()
        .and(warp::path("users"))
        .and(warp::path("me"))
        .and(warp::path::end())
        .and(with_verification(server.session_service.clone()))
        .and(with(server.session_service.clone()))
        .and_then(handler::current_user);

    signup.or(signin).or(refresh).or(logout).or(me)
}

fn with<ServiceType>(
    service: Arc<ServiceType>,
) -> impl Filter<Extract = (Arc<ServiceType>,), Error = Infallible> + Clone
where
    ServiceType: Send + Sync + ?Sized,
{
    warp::any().map(move || service.clone())
}

fn with_verification(
    session_service: Arc<dyn SessionService>,
) -> impl Filter<Extract = (UserId,), Error = warp::Rejection> + Clone {
    warp::header::<String>(http::header::AUTHORIZATION.as_ref()).and_then(move |token: String| {
        let session_service = session_service.clone();
        async move {
            if let Some(token) = token.strip_prefix("Bearer ") {
                let user_id = session_service
                    .verify_access(token)
                    .await
                    .map_err(ApiRejection::from)
                    .map_err(reject::custom)?;
                Ok(user_id)
            } else {
                Err(reject::custom(ApiRejection::Unauthorized))
            }
        }
    })
}
