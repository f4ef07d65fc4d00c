//! # Request Routing and Dispatch
//!
//! Maps `(method, path)` to a [`Route`], reads the request input the route
//! needs, wires an [`AppContext`] from the worker bindings and hands the
//! request to its handler.
//!
//! ## Supported Routes
//!
//! - `GET /health` - Health check endpoint
//! - `GET /` - Login page and hosted sign-in callback
//! - `GET /auth/{provider}`, `POST /auth/{sign-in,sign-up,confirm,sign-out}`
//! - `GET /auth/sign-up` - Sign-up form
//! - `GET /dashboard`, `POST /dashboard/{upload,delete}`,
//!   `GET /dashboard/{view,summary}` - Guarded dashboard
//! - `GET /objects` - Signed object links
//!
//! Everything else is answered with 404.

use std::sync::Arc;

use chrono::Utc;
use worker::*;

use crate::config::Config;
use crate::constants::{DASHBOARD_ROUTE, LOGIN_ROUTE, OBJECTS_ROUTE, SESSIONS_KV_NAME};
use crate::errors::{AppError, AppResult};
use crate::handlers::{handle_health_check, handle_not_found, AppContext, CookieChange};
use crate::identity::CognitoClient;
use crate::log_data;
use crate::logging::Logger;
use crate::middleware::{Params, SessionMiddleware, ValidationMiddleware};
use crate::session::{KvSessionStore, SessionProvider};
use crate::signing::UrlSigner;
use crate::storage::R2Store;

#[derive(Clone, Debug, PartialEq, Eq)]
enum Route {
    Health,
    Login,
    SocialSignIn(String),
    SignIn,
    SignUpForm,
    SignUp,
    Confirm,
    SignOut,
    Dashboard,
    Upload,
    Delete,
    View,
    Summary,
    Objects,
}

fn resolve(method: &Method, path: &str) -> Option<Route> {
    let route = match (method, path) {
        (Method::Get, "/health") => Route::Health,
        (Method::Get, LOGIN_ROUTE) => Route::Login,
        (Method::Get, "/auth/sign-up") => Route::SignUpForm,
        (Method::Post, "/auth/sign-up") => Route::SignUp,
        (Method::Post, "/auth/sign-in") => Route::SignIn,
        (Method::Post, "/auth/confirm") => Route::Confirm,
        (Method::Post, "/auth/sign-out") => Route::SignOut,
        (Method::Get, path) if path.starts_with("/auth/") => {
            let provider = &path["/auth/".len()..];
            if provider.is_empty() || provider.contains('/') {
                return None;
            }
            Route::SocialSignIn(provider.to_string())
        }
        (Method::Get, DASHBOARD_ROUTE) => Route::Dashboard,
        (Method::Post, "/dashboard/upload") => Route::Upload,
        (Method::Post, "/dashboard/delete") => Route::Delete,
        (Method::Get, "/dashboard/view") => Route::View,
        (Method::Get, "/dashboard/summary") => Route::Summary,
        (Method::Get, OBJECTS_ROUTE) => Route::Objects,
        _ => return None,
    };
    Some(route)
}

async fn read_form(req: &mut Request, names: &[&str]) -> AppResult<Params> {
    let form = req
        .form_data()
        .await
        .map_err(|e| AppError::BadRequest(format!("unreadable form: {}", e)))?;
    Ok(ValidationMiddleware::form_fields(&form, names))
}

/// Handles incoming HTTP requests and routes them to appropriate handlers.
///
/// Handler errors that escape as [`AppError`] are logged and answered with
/// the JSON error body; expected failures are rendered by the handlers
/// themselves.
pub async fn handle_request(
    mut req: Request,
    env: Env,
    config: Arc<Config>,
    logger: Logger,
) -> Result<Response> {
    let url = req.url()?;
    let method = req.method();

    let Some(route) = resolve(&method, url.path()) else {
        return handle_not_found();
    };
    if route == Route::Health {
        return handle_health_check();
    }

    let now = Utc::now();
    let session_id = SessionMiddleware::session_id(&req);
    let session = SessionProvider::load(
        KvSessionStore::new(env.kv(SESSIONS_KV_NAME)?),
        session_id.as_deref(),
        config.session_ttl_secs,
        now,
    )
    .await?;
    let objects = R2Store::new(env.bucket(&config.bucket_name)?);
    let identity = CognitoClient::new(config.clone());
    let signer = UrlSigner::new(config.url_signing_key.clone());

    let context = AppContext {
        config: &config,
        session: &session,
        objects: &objects,
        identity: &identity,
        signer: &signer,
        logger: &logger,
        origin: url.clone(),
        now,
    };
    let query = Params::from_url(&url);

    let result = match route {
        Route::Health => return handle_health_check(),
        Route::Login => context.login(&query).await,
        Route::SocialSignIn(provider) => context.social_sign_in(&provider).await,
        Route::SignIn => match read_form(&mut req, &["username", "password"]).await {
            Ok(form) => context.password_sign_in(&form).await,
            Err(error) => Err(error),
        },
        Route::SignUpForm => Ok(context.sign_up_form()),
        Route::SignUp => match read_form(
            &mut req,
            &["username", "name", "email", "password", "confirm_password"],
        )
        .await
        {
            Ok(form) => context.sign_up(&form).await,
            Err(error) => Err(error),
        },
        Route::Confirm => match read_form(&mut req, &["username", "code"]).await {
            Ok(form) => context.confirm_sign_up(&form).await,
            Err(error) => Err(error),
        },
        Route::SignOut => context.sign_out().await,
        Route::Dashboard => context.show_dashboard(&query).await,
        Route::Upload => {
            let candidate = match req.form_data().await {
                Ok(form) => {
                    ValidationMiddleware::upload_candidate(&form, "file", config.max_upload_size)
                        .await
                }
                Err(error) => Err(AppError::from(error)),
            };
            context.upload_file(candidate).await
        }
        Route::Delete => match read_form(&mut req, &["key", "confirmed"]).await {
            Ok(form) => context.delete_file(&form).await,
            Err(error) => Err(error),
        },
        Route::View => context.view_file(&query).await,
        Route::Summary => context.show_summary(&query).await,
        Route::Objects => context.serve_object().await,
    };

    let mut outcome = match result {
        Ok(outcome) => outcome,
        Err(app_error) => {
            logger.error(
                "Request failed",
                log_data!(
                    "path" => url.path(),
                    "status" => app_error.status_code().as_u16(),
                    "error" => app_error.to_string()
                ),
            );
            return app_error.to_response();
        }
    };

    // A cookie naming a session that no longer exists is dropped.
    if session_id.is_some() && session.session_id().is_none() && outcome.cookie.is_none() {
        outcome.cookie = Some(CookieChange::Clear);
    }
    logger.info(
        "Request handled",
        log_data!("path" => url.path(), "status" => outcome.status_code()),
    );
    outcome.into_response(&config)
}
