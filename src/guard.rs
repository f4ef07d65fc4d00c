use crate::constants::LOGIN_ROUTE;
use crate::models::UserRecord;
use crate::session::SessionStatus;

/// A client-side route change expressed as an HTTP redirect.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Navigation {
    pub to: String,
    /// Replace the current history entry instead of pushing one.
    pub replace: bool,
}

impl Navigation {
    pub fn replace(to: &str) -> Self {
        Self {
            to: to.to_string(),
            replace: true,
        }
    }

    /// 303 keeps the redirecting route out of history and turns a POST
    /// into a GET; 302 is only used for plain pushes.
    pub fn status_code(&self) -> u16 {
        if self.replace {
            303
        } else {
            302
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardDecision {
    Render(UserRecord),
    Redirect(Navigation),
}

/// Admits a request to a protected view only for an authenticated session.
pub fn guard(status: &SessionStatus) -> GuardDecision {
    match status {
        SessionStatus::Authenticated { user } => GuardDecision::Render(user.clone()),
        SessionStatus::NoSession => GuardDecision::Redirect(Navigation::replace(LOGIN_ROUTE)),
    }
}
