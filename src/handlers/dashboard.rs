//! # Dashboard Handlers
//!
//! Guarded routes. Every handler passes the session through the guard
//! first; mutations answer with a redirect back to the dashboard carrying a
//! `notice` code, so a reload never repeats them.

use super::{AppContext, CookieChange, Outcome};
use crate::constants::{DASHBOARD_ROUTE, LOGIN_ROUTE};
use crate::dashboard::{Confirmation, Dashboard};
use crate::errors::{AppError, AppResult};
use crate::guard::{guard, GuardDecision, Navigation};
use crate::identity::IdentityProvider;
use crate::log_data;
use crate::middleware::Params;
use crate::models::{UploadCandidate, UserRecord};
use crate::session::SessionStore;
use crate::storage::ObjectStore;
use crate::views::{self, Notice, SummaryView};

fn back_to_dashboard(notice: Notice) -> Outcome {
    Outcome::redirect(Navigation::replace(&format!(
        "{}?notice={}",
        DASHBOARD_ROUTE,
        notice.code()
    )))
}

fn upload_notice(error: &AppError) -> Notice {
    match error {
        AppError::FileTooLarge { .. } => Notice::FileTooLarge,
        _ => Notice::UploadFailed,
    }
}

impl<S, O, I> AppContext<'_, S, O, I>
where
    S: SessionStore,
    O: ObjectStore,
    I: IdentityProvider,
{
    /// Guards the request and scopes a [`Dashboard`] to the signed-in user.
    /// `Err` carries the outcome to send instead.
    async fn open_dashboard(&self) -> AppResult<Result<(UserRecord, Dashboard<'_, O>), Outcome>> {
        let user = match guard(&self.session.status()) {
            GuardDecision::Render(user) => user,
            GuardDecision::Redirect(navigation) => return Ok(Err(Outcome::redirect(navigation))),
        };

        match Dashboard::new(
            self.objects,
            self.signer,
            self.logger,
            &user,
            self.origin.clone(),
            self.config.max_upload_size,
        ) {
            Ok(dashboard) => Ok(Ok((user, dashboard))),
            Err(AppError::UnknownIdentity(reason)) => {
                self.session.sign_out().await?;
                self.logger.error(
                    "Session user cannot be mapped to a storage prefix",
                    log_data!("reason" => reason),
                );
                Ok(Err(Outcome::redirect(Navigation::replace(LOGIN_ROUTE))
                    .with_cookie(CookieChange::Clear)))
            }
            Err(other) => Err(other),
        }
    }

    /// `GET /dashboard`
    pub async fn show_dashboard(&self, query: &Params) -> AppResult<Outcome> {
        let (user, dashboard) = match self.open_dashboard().await? {
            Ok(opened) => opened,
            Err(outcome) => return Ok(outcome),
        };

        let files = match dashboard.list().await {
            Ok(files) => Some(files),
            Err(error) => {
                self.logger.error(
                    "Listing files failed",
                    log_data!("prefix" => dashboard.prefix(), "error" => error.to_string()),
                );
                None
            }
        };
        let notice = query.get("notice").and_then(Notice::from_code);

        Ok(Outcome::html(views::dashboard_page(
            &user,
            files.as_deref(),
            notice,
        )))
    }

    /// `POST /dashboard/upload`. `candidate` is the result of reading the
    /// file out of the submitted form.
    pub async fn upload_file(
        &self,
        candidate: AppResult<Option<UploadCandidate>>,
    ) -> AppResult<Outcome> {
        let (_, dashboard) = match self.open_dashboard().await? {
            Ok(opened) => opened,
            Err(outcome) => return Ok(outcome),
        };

        let notice = match candidate {
            Ok(None) => Notice::NoFileSelected,
            Ok(Some(candidate)) => match dashboard.upload(Some(candidate)).await {
                Ok(_) => Notice::UploadSucceeded,
                Err(error) => {
                    self.logger.warn(
                        "Upload failed",
                        log_data!("prefix" => dashboard.prefix(), "error" => error.to_string()),
                    );
                    upload_notice(&error)
                }
            },
            Err(error) => {
                self.logger.warn(
                    "Upload form could not be read",
                    log_data!("error" => error.to_string()),
                );
                upload_notice(&error)
            }
        };
        Ok(back_to_dashboard(notice))
    }

    /// `POST /dashboard/delete`. Without `confirmed=yes` nothing is deleted
    /// and a confirmation page is returned instead.
    pub async fn delete_file(&self, form: &Params) -> AppResult<Outcome> {
        let (_, dashboard) = match self.open_dashboard().await? {
            Ok(opened) => opened,
            Err(outcome) => return Ok(outcome),
        };

        let key = form.get("key").unwrap_or_default();
        let confirmation = match form.get("confirmed") {
            Some("yes") => Confirmation::Confirmed,
            _ => Confirmation::Declined,
        };

        match dashboard.delete(key, confirmation).await {
            Ok(()) => Ok(back_to_dashboard(Notice::Deleted)),
            Err(AppError::Cancelled(_)) => {
                let name = key.strip_prefix(dashboard.prefix()).unwrap_or(key);
                Ok(Outcome::html(views::delete_confirmation_page(name, key)))
            }
            Err(error) => {
                self.logger.warn(
                    "Delete failed",
                    log_data!("key" => key, "error" => error.to_string()),
                );
                Ok(back_to_dashboard(Notice::DeleteFailed))
            }
        }
    }

    /// `GET /dashboard/view`
    pub async fn view_file(&self, query: &Params) -> AppResult<Outcome> {
        let (_, dashboard) = match self.open_dashboard().await? {
            Ok(opened) => opened,
            Err(outcome) => return Ok(outcome),
        };

        let key = query.get("key").unwrap_or_default();
        match dashboard.view(key, self.now) {
            Ok(url) => Ok(Outcome::see(url.to_string())),
            Err(error) => {
                self.logger.warn(
                    "Could not issue a view link",
                    log_data!("key" => key, "error" => error.to_string()),
                );
                Ok(back_to_dashboard(Notice::ViewFailed))
            }
        }
    }

    /// `GET /dashboard/summary`
    pub async fn show_summary(&self, query: &Params) -> AppResult<Outcome> {
        let (_, dashboard) = match self.open_dashboard().await? {
            Ok(opened) => opened,
            Err(outcome) => return Ok(outcome),
        };

        let key = query.get("key").unwrap_or_default();
        let name = key.strip_prefix(dashboard.prefix()).unwrap_or(key);
        match dashboard.summary(key, self.now).await {
            Ok(outcome) => Ok(Outcome::html(views::summary_page(
                name,
                &SummaryView::Outcome(outcome),
            ))),
            Err(error) => {
                self.logger.warn(
                    "Summary fetch failed",
                    log_data!("key" => key, "error" => error.to_string()),
                );
                Ok(Outcome::html_with_status(
                    error.status_code().as_u16(),
                    views::summary_page(name, &SummaryView::Missing),
                ))
            }
        }
    }
}
