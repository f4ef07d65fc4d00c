//! # Application Constants
//!
//! Application-wide constants for the file vault. Binding names must match
//! the bindings declared in wrangler.toml.
//!
//! ## Storage Conventions
//!
//! Primary objects live at `<username>/<file name>`. The external summarizer
//! writes its output next to the primary object at
//! `<username>/<file name>_summary.txt`.

/// KV binding holding the `config` document
pub const STORAGE_CONFIG_KV_NAME: &str = "STORAGE_CONFIG";

/// KV binding holding sessions and pending OAuth states
pub const SESSIONS_KV_NAME: &str = "SESSIONS";

/// Default R2 bucket binding name
pub const STORAGE_BUCKET_NAME: &str = "STORAGE_BUCKET";

/// Worker secret used to sign object URLs
pub const URL_SIGNING_KEY_SECRET: &str = "URL_SIGNING_KEY";

/// Optional worker secret for confidential app clients
pub const CLIENT_SECRET_SECRET: &str = "COGNITO_CLIENT_SECRET";

/// Suffix the summarizer appends to a primary key
pub const SUMMARY_SUFFIX: &str = "_summary.txt";

/// Validity of a "view" link (5 minutes)
pub const VIEW_URL_TTL_SECS: i64 = 300;

/// Validity of the link used to fetch a summary
pub const SUMMARY_URL_TTL_SECS: i64 = 60;

/// Page size requested from R2 while following a listing cursor
pub const LIST_PAGE_LIMIT: u32 = 1000;

/// Default session lifetime (8 hours)
pub const DEFAULT_SESSION_TTL_SECS: u64 = 28_800;

/// Shortest session lifetime; KV refuses expirations under 60 seconds
pub const MIN_SESSION_TTL_SECS: u64 = 60;

/// Lifetime of a pending OAuth `state` value
pub const OAUTH_STATE_TTL_SECS: u64 = 600;

/// Default maximum upload size (100MB)
pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 104_857_600;

/// Minimum length of the URL signing key in bytes
pub const MIN_SIGNING_KEY_LEN: usize = 32;

/// Session cookie name
pub const SESSION_COOKIE: &str = "vault_sid";

/// Entry route; also the OAuth redirect landing target
pub const LOGIN_ROUTE: &str = "/";

/// Guarded route
pub const DASHBOARD_ROUTE: &str = "/dashboard";

/// Route serving signed object URLs
pub const OBJECTS_ROUTE: &str = "/objects";

/// Default region of the user pool
pub const DEFAULT_REGION: &str = "ap-south-1";
