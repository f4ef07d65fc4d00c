//! # MemeNow Vault - Cloudflare Workers
//!
//! A per-user file vault built with Rust and Cloudflare Workers. Visitors
//! sign in through the user pool's hosted UI (Google) or with a password,
//! then upload, list, open and delete files in their own R2 namespace and
//! read the summaries an external summarizer writes next to each file.
//!
//! ## Architecture
//!
//! - **Router**: Resolves routes, reads request input and wires the context
//! - **Handlers**: Route logic over the session, storage and identity seams
//! - **Session**: Session provider backed by KV with a sign-in event hub
//! - **Identity**: Hosted-UI and password sign-in against the user pool
//! - **Dashboard**: Per-user storage operations
//! - **Signing**: HMAC-signed, time-limited object links
//! - **Views**: Server-rendered HTML pages
//!
//! ## Routes
//!
//! ```text
//! GET  /                    - Login page / hosted sign-in callback
//! GET  /auth/google         - Start hosted sign-in with Google
//! POST /auth/sign-in        - Password sign-in
//! GET  /dashboard           - File list and upload form
//! POST /dashboard/upload    - Upload a file
//! POST /dashboard/delete    - Delete a file and its summary
//! GET  /dashboard/view      - Redirect to a 5 minute object link
//! GET  /dashboard/summary   - Show the generated summary
//! GET  /objects             - Serve a signed object link
//! ```

use std::sync::{Arc, OnceLock};
use worker::*;

mod config;
mod constants;
mod dashboard;
mod errors;
mod guard;
mod handlers;
mod identity;
mod logging;
mod login;
mod middleware;
mod models;
mod router;
mod session;
mod signing;
mod storage;
mod utils;
mod views;

use config::Config;
use errors::AppResult;
use logging::Logger;
use utils::generate_request_id;

static CONFIG_CACHE: OnceLock<Arc<Config>> = OnceLock::new();

/// Main entry point for the Cloudflare Worker.
///
/// Sets up panic reporting, loads the configuration once per isolate and
/// delegates to the router. A configuration that fails validation answers
/// every request with 500 instead of running half-configured.
#[event(fetch)]
pub async fn main(req: Request, env: Env, _ctx: Context) -> Result<Response> {
    console_error_panic_hook::set_once();

    let logger = Logger::new(generate_request_id());
    logger.info(
        "Request received",
        crate::log_data!("method" => req.method().to_string(), "path" => req.path()),
    );

    let config = match load_config(&env, &logger).await {
        Ok(config) => config,
        Err(error) => {
            logger.error(
                "Configuration unusable",
                crate::log_data!("error" => error.to_string()),
            );
            return error.to_response();
        }
    };

    router::handle_request(req, env, config, logger).await
}

async fn load_config(env: &Env, logger: &Logger) -> AppResult<Arc<Config>> {
    if let Some(config) = CONFIG_CACHE.get() {
        return Ok(config.clone());
    }

    let config = Arc::new(Config::load(env, logger).await?);
    let _ = CONFIG_CACHE.set(config.clone());
    Ok(config)
}
