//! # Middleware Components
//!
//! Request/response helpers shared by the route handlers.
//!
//! - **Session Middleware**: reads the session cookie and builds `Set-Cookie`
//!   values for starting and ending a session
//! - **Validation Middleware**: pulls text fields and the uploaded file out of
//!   submitted forms and enforces the upload size limit

use worker::{FormData, FormEntry, Request};

use crate::constants::SESSION_COOKIE;
use crate::errors::{AppError, AppResult};
use crate::models::UploadCandidate;
use crate::utils::cookie_value;

/// Submitted `(name, value)` pairs from a query string or a form.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Params(Vec<(String, String)>);

impl Params {
    pub fn from_url(url: &worker::Url) -> Self {
        Self(url.query_pairs().into_owned().collect())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Like [`Params::get`] but treats blank values as absent.
    pub fn non_empty(&self, name: &str) -> Option<&str> {
        self.get(name).filter(|value| !value.trim().is_empty())
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&str, String)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value.clone()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

pub struct SessionMiddleware;

impl SessionMiddleware {
    /// Session id carried by the request's cookie, if any.
    pub fn session_id(req: &Request) -> Option<String> {
        let header = req.headers().get("Cookie").ok().flatten()?;
        cookie_value(&header, SESSION_COOKIE)
    }

    pub fn set_cookie(session_id: &str, max_age_secs: u64, secure: bool) -> String {
        format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}{}",
            SESSION_COOKIE,
            session_id,
            max_age_secs,
            if secure { "; Secure" } else { "" }
        )
    }

    pub fn clear_cookie(secure: bool) -> String {
        Self::set_cookie("", 0, secure)
    }
}

pub struct ValidationMiddleware;

impl ValidationMiddleware {
    /// Reads the named text fields of a submitted form. Missing fields and
    /// file entries are skipped.
    pub fn form_fields(form: &FormData, names: &[&str]) -> Params {
        names
            .iter()
            .filter_map(|name| match form.get(name) {
                Some(FormEntry::Field(value)) => Some((name.to_string(), value)),
                _ => None,
            })
            .collect()
    }

    /// Extracts the file chosen in the upload form. An empty file input
    /// counts as no selection.
    pub async fn upload_candidate(
        form: &FormData,
        field: &str,
        max_size: u64,
    ) -> AppResult<Option<UploadCandidate>> {
        let Some(FormEntry::File(file)) = form.get(field) else {
            return Ok(None);
        };
        if file.name().is_empty() && file.size() == 0 {
            return Ok(None);
        }

        Self::validate_file_size(file.size() as u64, max_size)?;
        let bytes = file.bytes().await?;
        Ok(Some(UploadCandidate::new(file.name(), file.type_(), bytes)))
    }

    pub fn validate_file_size(size: u64, max_size: u64) -> AppResult<()> {
        if size > max_size {
            return Err(AppError::FileTooLarge {
                size,
                max: max_size,
            });
        }
        Ok(())
    }
}
