//! # Handlers Module
//!
//! Route handlers for the vault. Each handler is a method on [`AppContext`]
//! that takes already-parsed input and returns an [`Outcome`]; turning the
//! outcome into a `worker::Response` happens in one place, so the handlers
//! run unchanged against in-memory stores in tests.

use chrono::{DateTime, Utc};
use worker::{Headers, Response, Result, Url};

use crate::config::Config;
use crate::guard::Navigation;
use crate::identity::IdentityProvider;
use crate::logging::Logger;
use crate::middleware::SessionMiddleware;
use crate::models::ObjectBody;
use crate::session::{SessionProvider, SessionStore};
use crate::signing::UrlSigner;
use crate::storage::ObjectStore;
use crate::views;

pub mod auth;
pub mod dashboard;
pub mod objects;

/// Everything a handler may touch while serving one request.
pub struct AppContext<'a, S: SessionStore, O: ObjectStore, I: IdentityProvider> {
    pub config: &'a Config,
    pub session: &'a SessionProvider<S>,
    pub objects: &'a O,
    pub identity: &'a I,
    pub signer: &'a UrlSigner,
    pub logger: &'a Logger,
    /// URL of the current request; object links are issued relative to it.
    pub origin: Url,
    pub now: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CookieChange {
    Set(String),
    Clear,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    Html { status: u16, body: String },
    Redirect(Navigation),
    /// Redirect whose body is the "Redirecting..." overlay, shown until the
    /// browser follows `Location`.
    Redirecting { navigation: Navigation, body: String },
    Object(ObjectBody),
    Text { status: u16, body: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outcome {
    pub reply: Reply,
    pub cookie: Option<CookieChange>,
}

impl Outcome {
    pub fn html(body: String) -> Self {
        Self::html_with_status(200, body)
    }

    pub fn html_with_status(status: u16, body: String) -> Self {
        Self {
            reply: Reply::Html { status, body },
            cookie: None,
        }
    }

    pub fn redirect(navigation: Navigation) -> Self {
        Self {
            reply: Reply::Redirect(navigation),
            cookie: None,
        }
    }

    pub fn redirecting(navigation: Navigation) -> Self {
        let body = views::redirecting_page(&navigation.to);
        Self {
            reply: Reply::Redirecting { navigation, body },
            cookie: None,
        }
    }

    /// Plain redirect that pushes a new history entry.
    pub fn see(to: impl Into<String>) -> Self {
        Self::redirect(Navigation {
            to: to.into(),
            replace: false,
        })
    }

    pub fn text(status: u16, body: &str) -> Self {
        Self {
            reply: Reply::Text {
                status,
                body: body.to_string(),
            },
            cookie: None,
        }
    }

    pub fn with_cookie(mut self, change: CookieChange) -> Self {
        self.cookie = Some(change);
        self
    }

    pub fn status_code(&self) -> u16 {
        match &self.reply {
            Reply::Html { status, .. } | Reply::Text { status, .. } => *status,
            Reply::Redirect(navigation) | Reply::Redirecting { navigation, .. } => {
                navigation.status_code()
            }
            Reply::Object(_) => 200,
        }
    }

    pub fn into_response(self, config: &Config) -> Result<Response> {
        let mut response = match self.reply {
            Reply::Html { status, body } => Response::from_html(body)?.with_status(status),
            Reply::Redirect(navigation) => {
                let headers = Headers::new();
                headers.set("Location", &navigation.to)?;
                Response::empty()?
                    .with_status(navigation.status_code())
                    .with_headers(headers)
            }
            Reply::Redirecting { navigation, body } => {
                let mut response =
                    Response::from_html(body)?.with_status(navigation.status_code());
                response.headers_mut().set("Location", &navigation.to)?;
                response
            }
            Reply::Object(object) => {
                let headers = Headers::new();
                headers.set(
                    "Content-Type",
                    object
                        .content_type
                        .as_deref()
                        .unwrap_or("application/octet-stream"),
                )?;
                headers.set("Cache-Control", "private, no-store")?;
                Response::from_bytes(object.bytes)?.with_headers(headers)
            }
            Reply::Text { status, body } => Response::error(body, status)?,
        };

        let secure = config.redirect_sign_in.starts_with("https://");
        if let Some(change) = self.cookie {
            let cookie = match change {
                CookieChange::Set(session_id) => {
                    SessionMiddleware::set_cookie(&session_id, config.session_ttl_secs, secure)
                }
                CookieChange::Clear => SessionMiddleware::clear_cookie(secure),
            };
            response.headers_mut().append("Set-Cookie", &cookie)?;
        }
        Ok(response)
    }
}

/// Provides a health check endpoint for monitoring and load balancers.
pub fn handle_health_check() -> Result<Response> {
    Response::from_json(&serde_json::json!({
        "status": "healthy",
        "service": "memenow-vault-cf-workers",
        "timestamp": Utc::now().to_rfc3339()
    }))
}

/// Handles requests to unmatched routes with a 404 Not Found response.
pub fn handle_not_found() -> Result<Response> {
    Response::error("Not Found", 404)
}
