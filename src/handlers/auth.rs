//! # Authentication Handlers
//!
//! The entry route and the sign-in, sign-up and sign-out forms.
//!
//! ```text
//! GET  /                 login page, or the hosted-UI callback (?code=&state=)
//! GET  /auth/{provider}  start a hosted-UI sign-in with a social provider
//! POST /auth/sign-in     password sign-in
//! GET  /auth/sign-up     sign-up form
//! POST /auth/sign-up     create an account
//! POST /auth/confirm     confirm an account with the emailed code
//! POST /auth/sign-out    end the session
//! ```

use uuid::Uuid;

use super::{AppContext, CookieChange, Outcome};
use crate::constants::{DASHBOARD_ROUTE, OAUTH_STATE_TTL_SECS};
use crate::errors::{AppError, AppResult};
use crate::guard::Navigation;
use crate::identity::{
    authorize_url, sign_out_url, user_from_tokens, IdentityProvider, SignUpForm,
};
use crate::log_data;
use crate::login::{LoginRender, LoginView};
use crate::middleware::Params;
use crate::models::TokenSet;
use crate::session::{SessionStore, SignInMethod};
use crate::storage::ObjectStore;
use crate::views::{self, LoginPage};

const CONFIRMED_NOTICE: &str = "confirmed";

/// Text shown to the visitor for a failed identity call. Provider messages
/// for rejected input are shown as is; anything else is generic.
fn visitor_message(error: &AppError, fallback: &str) -> String {
    match error {
        AppError::Unauthorized(message) | AppError::BadRequest(message) => message.clone(),
        _ => fallback.to_string(),
    }
}

/// Answer for a login render of a signed-in visitor: the "Redirecting..."
/// overlay sent with the navigation to the dashboard. A view that has
/// already navigated points the overlay at the dashboard as well.
fn leave_login(render: LoginRender) -> Option<Outcome> {
    if !render.redirecting {
        return None;
    }
    let navigation = render
        .navigation
        .unwrap_or_else(|| Navigation::replace(DASHBOARD_ROUTE));
    Some(Outcome::redirecting(navigation))
}

impl<S, O, I> AppContext<'_, S, O, I>
where
    S: SessionStore,
    O: ObjectStore,
    I: IdentityProvider,
{
    /// `GET /`
    pub async fn login(&self, query: &Params) -> AppResult<Outcome> {
        let mut view = LoginView::mount(self.session.hub());
        if let Some(outcome) = leave_login(view.render(&self.session.status())) {
            return Ok(outcome);
        }

        if let Some(error) = query.non_empty("error") {
            let description = query.non_empty("error_description").unwrap_or(error);
            self.logger.warn(
                "Hosted sign-in returned an error",
                log_data!("error" => error, "description" => description),
            );
            return Ok(self.login_page(Some(description), None, 400));
        }

        if let Some(code) = query.non_empty("code") {
            let state = query.get("state").unwrap_or_default();
            return self.complete_redirect_sign_in(&mut view, code, state).await;
        }

        let info = match query.get("notice") {
            Some(CONFIRMED_NOTICE) => Some("Your account is confirmed. Please sign in."),
            _ => None,
        };
        Ok(self.login_page(None, info, 200))
    }

    /// `GET /auth/{provider}`
    pub async fn social_sign_in(&self, provider_slug: &str) -> AppResult<Outcome> {
        let provider = self
            .config
            .social_providers
            .iter()
            .find(|provider| provider.eq_ignore_ascii_case(provider_slug))
            .ok_or_else(|| AppError::NotFound(format!("sign-in provider {}", provider_slug)))?;

        let state = Uuid::new_v4().simple().to_string();
        self.session
            .store()
            .put_oauth_state(&state, OAUTH_STATE_TTL_SECS)
            .await?;

        let url = authorize_url(self.config, &state, Some(provider))?;
        self.logger.info(
            "Redirecting to hosted sign-in",
            log_data!("provider" => provider),
        );
        Ok(Outcome::see(url.to_string()))
    }

    /// `POST /auth/sign-in`
    pub async fn password_sign_in(&self, form: &Params) -> AppResult<Outcome> {
        let mut view = LoginView::mount(self.session.hub());
        if let Some(outcome) = leave_login(view.render(&self.session.status())) {
            return Ok(outcome);
        }

        let username = form.non_empty("username").map(str::trim);
        let password = form.get("password").filter(|password| !password.is_empty());
        let (Some(username), Some(password)) = (username, password) else {
            return Ok(self.login_page(Some("Enter your username and password."), None, 400));
        };

        match self.identity.sign_in(username, password).await {
            Ok(tokens) => {
                self.start_session(&mut view, tokens, SignInMethod::Password)
                    .await
            }
            Err(error) => {
                self.logger.warn(
                    "Password sign-in failed",
                    log_data!("username" => username, "error" => error.to_string()),
                );
                Ok(self.login_page(
                    Some(&visitor_message(&error, "Sign in failed. Please try again.")),
                    None,
                    error.status_code().as_u16(),
                ))
            }
        }
    }

    /// `GET /auth/sign-up`
    pub fn sign_up_form(&self) -> Outcome {
        Outcome::html(views::sign_up_page(&SignUpForm::default(), None))
    }

    /// `POST /auth/sign-up`
    pub async fn sign_up(&self, params: &Params) -> AppResult<Outcome> {
        let form = SignUpForm::from_pairs(params.pairs());
        if let Err(error) = form.validate() {
            return Ok(Outcome::html_with_status(
                400,
                views::sign_up_page(&form, Some(&visitor_message(&error, "Check the form."))),
            ));
        }

        match self.identity.sign_up(&form).await {
            Ok(outcome) if outcome.confirmed => {
                Ok(Outcome::see(format!("/?notice={}", CONFIRMED_NOTICE)))
            }
            Ok(outcome) => {
                self.logger.info(
                    "Account created, awaiting confirmation",
                    log_data!("username" => form.username),
                );
                Ok(Outcome::html(views::confirm_sign_up_page(
                    &form.username,
                    outcome.code_destination.as_deref(),
                    None,
                )))
            }
            Err(error) => {
                self.logger.warn(
                    "Sign-up failed",
                    log_data!("username" => form.username, "error" => error.to_string()),
                );
                Ok(Outcome::html_with_status(
                    error.status_code().as_u16(),
                    views::sign_up_page(
                        &form,
                        Some(&visitor_message(&error, "Sign up failed. Please try again.")),
                    ),
                ))
            }
        }
    }

    /// `POST /auth/confirm`
    pub async fn confirm_sign_up(&self, form: &Params) -> AppResult<Outcome> {
        let username = form.non_empty("username").map(str::trim).unwrap_or_default();
        let code = form.non_empty("code").unwrap_or_default();
        if username.is_empty() || code.is_empty() {
            return Ok(Outcome::html_with_status(
                400,
                views::confirm_sign_up_page(username, None, Some("Enter the confirmation code.")),
            ));
        }

        match self.identity.confirm_sign_up(username, code).await {
            Ok(()) => {
                self.logger
                    .info("Account confirmed", log_data!("username" => username));
                Ok(Outcome::see(format!("/?notice={}", CONFIRMED_NOTICE)))
            }
            Err(error) => Ok(Outcome::html_with_status(
                error.status_code().as_u16(),
                views::confirm_sign_up_page(
                    username,
                    None,
                    Some(&visitor_message(&error, "Confirmation failed. Please try again.")),
                ),
            )),
        }
    }

    /// `POST /auth/sign-out`
    pub async fn sign_out(&self) -> AppResult<Outcome> {
        let username = self
            .session
            .status()
            .user()
            .map(|user| user.username.clone());
        self.session.sign_out().await?;
        self.logger
            .info("Signed out", log_data!("username" => username));

        let logout = sign_out_url(self.config)?;
        Ok(Outcome::redirect(Navigation::replace(logout.as_str())).with_cookie(CookieChange::Clear))
    }

    async fn complete_redirect_sign_in(
        &self,
        view: &mut LoginView,
        code: &str,
        state: &str,
    ) -> AppResult<Outcome> {
        if state.is_empty() || !self.session.store().take_oauth_state(state).await? {
            self.logger
                .warn("Sign-in callback with unknown state", None);
            return Ok(self.login_page(
                Some("Your sign-in link has expired. Please try again."),
                None,
                400,
            ));
        }

        match self.identity.exchange_code(code).await {
            Ok(tokens) => self.start_session(view, tokens, SignInMethod::Redirect).await,
            Err(error) => {
                self.logger.warn(
                    "Authorization code exchange failed",
                    log_data!("error" => error.to_string()),
                );
                Ok(self.login_page(
                    Some("Sign in failed. Please try again."),
                    None,
                    error.status_code().as_u16(),
                ))
            }
        }
    }

    async fn start_session(
        &self,
        view: &mut LoginView,
        tokens: TokenSet,
        method: SignInMethod,
    ) -> AppResult<Outcome> {
        let user = match user_from_tokens(&tokens) {
            Ok(user) => user,
            Err(AppError::UnknownIdentity(reason)) => {
                self.session.sign_out().await?;
                self.logger
                    .error("Signed-in user has no identity", log_data!("reason" => reason));
                return Ok(self
                    .login_page(
                        Some("We could not identify your account. Please sign in again."),
                        None,
                        401,
                    )
                    .with_cookie(CookieChange::Clear));
            }
            Err(other) => return Err(other),
        };

        let record = self
            .session
            .complete_sign_in(user, tokens, method, self.now)
            .await?;
        self.logger.info(
            "Signed in",
            log_data!("username" => record.user.username, "method" => format!("{:?}", method)),
        );

        let outcome = leave_login(view.render(&self.session.status())).ok_or_else(|| {
            AppError::Backend("session is not authenticated after sign-in".to_string())
        })?;
        Ok(outcome.with_cookie(CookieChange::Set(record.session_id)))
    }

    fn login_page(&self, error: Option<&str>, info: Option<&str>, status: u16) -> Outcome {
        let social_links = self
            .config
            .social_providers
            .iter()
            .map(|provider| (provider.clone(), format!("/auth/{}", provider.to_lowercase())))
            .collect();
        Outcome::html_with_status(
            status,
            views::login_page(&LoginPage {
                error,
                info,
                social_links,
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;

    use super::super::harness::{html_body, redirect_target, Harness};
    use super::super::Reply;
    use super::*;
    use crate::session::SessionStatus;

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs.iter().copied().collect()
    }

    #[test]
    fn signed_out_visitor_gets_the_login_form() {
        let harness = Harness::signed_out();
        let outcome = block_on(harness.context().login(&Params::default())).unwrap();

        assert_eq!(outcome.status_code(), 200);
        let body = html_body(&outcome);
        assert!(body.contains("Welcome Back"));
        assert!(body.contains("href=\"/auth/google\""));
        assert!(!body.contains("Redirecting..."));
    }

    #[test]
    fn signed_in_visitor_is_replaced_onto_the_dashboard() {
        let harness = Harness::signed_in_as("alice");
        let outcome = block_on(harness.context().login(&Params::default())).unwrap();

        assert_eq!(redirect_target(&outcome), Some("/dashboard"));
        assert_eq!(outcome.status_code(), 303);
        assert_eq!(outcome.cookie, None);
        assert!(html_body(&outcome).contains("Redirecting..."));
        assert!(!html_body(&outcome).contains("Welcome Back"));
    }

    #[test]
    fn social_sign_in_records_state_and_leaves_for_the_hosted_ui() {
        let harness = Harness::signed_out();
        let outcome = block_on(harness.context().social_sign_in("google")).unwrap();

        let target = redirect_target(&outcome).unwrap();
        assert!(target.starts_with("https://vault.auth.ap-south-1.amazoncognito.com/oauth2/authorize?"));
        assert!(target.contains("identity_provider=Google"));
        let states = harness.session.store().states.borrow();
        assert_eq!(states.len(), 1);
        assert!(target.contains(&format!("state={}", states.iter().next().unwrap())));

        assert!(matches!(
            block_on(harness.context().social_sign_in("myspace")),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn callback_with_known_state_starts_a_session() {
        let harness = Harness::signed_out();
        harness.session.store().states.borrow_mut().insert("s1".to_string());

        let outcome = block_on(
            harness
                .context()
                .login(&params(&[("code", "good"), ("state", "s1")])),
        )
        .unwrap();

        assert_eq!(redirect_target(&outcome), Some("/dashboard"));
        assert_eq!(outcome.status_code(), 303);
        assert!(matches!(outcome.reply, Reply::Redirecting { .. }));
        assert!(html_body(&outcome).contains("Redirecting..."));
        let session_id = harness.session.session_id().unwrap();
        assert_eq!(outcome.cookie, Some(CookieChange::Set(session_id)));
        assert_eq!(
            harness.session.status().user().map(|user| user.username.as_str()),
            Some("alice")
        );
        assert!(harness.session.store().states.borrow().is_empty());
        assert_eq!(*harness.identity.exchanged_codes.borrow(), vec!["good".to_string()]);
    }

    #[test]
    fn callback_with_unknown_state_is_rejected_before_exchange() {
        let harness = Harness::signed_out();
        let outcome = block_on(
            harness
                .context()
                .login(&params(&[("code", "good"), ("state", "forged")])),
        )
        .unwrap();

        assert_eq!(outcome.status_code(), 400);
        assert!(html_body(&outcome).contains("expired"));
        assert!(harness.identity.exchanged_codes.borrow().is_empty());
        assert_eq!(harness.session.status(), SessionStatus::NoSession);
    }

    #[test]
    fn failed_code_exchange_shows_the_form_again() {
        let harness = Harness::signed_out();
        harness.session.store().states.borrow_mut().insert("s1".to_string());
        let outcome = block_on(
            harness
                .context()
                .login(&params(&[("code", "bad-code"), ("state", "s1")])),
        )
        .unwrap();

        assert_eq!(outcome.status_code(), 401);
        assert!(html_body(&outcome).contains("Sign in failed"));
        assert_eq!(outcome.cookie, None);
    }

    #[test]
    fn tokens_without_a_username_end_the_session() {
        let mut harness = Harness::signed_out();
        harness.identity.username = String::new();
        harness.session.store().states.borrow_mut().insert("s1".to_string());

        let outcome = block_on(
            harness
                .context()
                .login(&params(&[("code", "good"), ("state", "s1")])),
        )
        .unwrap();

        assert_eq!(outcome.status_code(), 401);
        assert_eq!(outcome.cookie, Some(CookieChange::Clear));
        assert_eq!(harness.session.status(), SessionStatus::NoSession);
        assert!(harness.session.store().sessions.borrow().is_empty());
    }

    #[test]
    fn hosted_ui_errors_are_shown() {
        let harness = Harness::signed_out();
        let outcome = block_on(harness.context().login(&params(&[
            ("error", "access_denied"),
            ("error_description", "User cancelled login"),
        ])))
        .unwrap();

        assert_eq!(outcome.status_code(), 400);
        assert!(html_body(&outcome).contains("User cancelled login"));
    }

    #[test]
    fn password_sign_in_success_and_failure() {
        let harness = Harness::signed_out();
        let rejected = block_on(harness.context().password_sign_in(&params(&[
            ("username", "alice"),
            ("password", "wrong"),
        ])))
        .unwrap();
        assert_eq!(rejected.status_code(), 401);
        assert!(html_body(&rejected).contains("Incorrect username or password."));

        let missing = block_on(
            harness
                .context()
                .password_sign_in(&params(&[("username", "alice")])),
        )
        .unwrap();
        assert_eq!(missing.status_code(), 400);

        let accepted = block_on(harness.context().password_sign_in(&params(&[
            ("username", " alice "),
            ("password", "correct horse"),
        ])))
        .unwrap();
        assert_eq!(redirect_target(&accepted), Some("/dashboard"));
        assert_eq!(accepted.status_code(), 303);
        assert!(html_body(&accepted).contains("Redirecting..."));
        assert!(matches!(accepted.cookie, Some(CookieChange::Set(_))));
    }

    #[test]
    fn sign_up_then_confirm() {
        let harness = Harness::signed_out();
        let form = params(&[
            ("username", "alice"),
            ("name", "Alice"),
            ("email", "alice@example.com"),
            ("password", "hunter22!"),
            ("confirm_password", "hunter22!"),
        ]);

        let created = block_on(harness.context().sign_up(&form)).unwrap();
        let body = html_body(&created);
        assert!(body.contains("Confirm Sign Up"));
        assert!(body.contains("a***@e***.com"));

        let wrong_code = block_on(
            harness
                .context()
                .confirm_sign_up(&params(&[("username", "alice"), ("code", "000000")])),
        )
        .unwrap();
        assert_eq!(wrong_code.status_code(), 400);
        assert!(html_body(&wrong_code).contains("Invalid verification code"));

        let confirmed = block_on(
            harness
                .context()
                .confirm_sign_up(&params(&[("username", "alice"), ("code", "123456")])),
        )
        .unwrap();
        assert_eq!(redirect_target(&confirmed), Some("/?notice=confirmed"));

        let login = block_on(harness.context().login(&params(&[("notice", "confirmed")]))).unwrap();
        assert!(html_body(&login).contains("Your account is confirmed"));
    }

    #[test]
    fn sign_up_with_mismatched_passwords_keeps_the_form() {
        let harness = Harness::signed_out();
        let outcome = block_on(harness.context().sign_up(&params(&[
            ("username", "alice"),
            ("name", "Alice"),
            ("email", "alice@example.com"),
            ("password", "hunter22!"),
            ("confirm_password", "hunter23!"),
        ])))
        .unwrap();

        assert_eq!(outcome.status_code(), 400);
        let body = html_body(&outcome);
        assert!(body.contains("Your passwords must match"));
        assert!(body.contains("value=\"alice@example.com\""));
    }

    #[test]
    fn sign_out_clears_the_session_and_visits_the_hosted_logout() {
        let harness = Harness::signed_in_as("alice");
        let outcome = block_on(harness.context().sign_out()).unwrap();

        let target = redirect_target(&outcome).unwrap();
        assert!(target.starts_with("https://vault.auth.ap-south-1.amazoncognito.com/logout?"));
        assert_eq!(outcome.cookie, Some(CookieChange::Clear));
        assert_eq!(harness.session.status(), SessionStatus::NoSession);
        assert!(harness.session.store().sessions.borrow().is_empty());
        assert!(matches!(outcome.reply, Reply::Redirect(_)));
    }
}
