//! # Login View
//!
//! The entry route. It reacts to two signals that a sign-in has completed:
//! the session status read when the view renders, and sign-in events pushed
//! on the session hub while the view is mounted. The redirect round-trip of
//! the hosted UI completes *after* the status read of the same request, so
//! both are needed.
//!
//! Whichever signal arrives first produces a single replace-navigation to
//! the dashboard; later signals for the same mount are ignored.

use crate::constants::DASHBOARD_ROUTE;
use crate::guard::Navigation;
use crate::session::{SessionHub, SessionStatus, Subscription};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoginRender {
    /// Show the "Redirecting..." overlay instead of the sign-in form.
    pub redirecting: bool,
    pub navigation: Option<Navigation>,
}

/// A mounted login view. Dropping it releases the hub subscription.
pub struct LoginView {
    subscription: Subscription,
    signed_in: bool,
    navigated: bool,
}

impl LoginView {
    pub fn mount(hub: &SessionHub) -> Self {
        Self {
            subscription: hub.subscribe(),
            signed_in: false,
            navigated: false,
        }
    }

    pub fn render(&mut self, status: &SessionStatus) -> LoginRender {
        if self
            .subscription
            .drain()
            .into_iter()
            .any(|event| event.is_sign_in())
        {
            self.signed_in = true;
        }

        let redirecting = status.is_authenticated() || self.signed_in;
        let navigation = if redirecting && !self.navigated {
            self.navigated = true;
            Some(Navigation::replace(DASHBOARD_ROUTE))
        } else {
            None
        };

        LoginRender {
            redirecting,
            navigation,
        }
    }
}
