//! # Session State
//!
//! The session provider every view consults. A request's session is loaded
//! from the session store by cookie id and exposed as a single
//! [`SessionStatus`]; sign-in and sign-out transitions are published on a
//! [`SessionHub`] so views mounted during the request can react to them.
//!
//! ## Event Channel
//!
//! [`SessionHub::subscribe`] hands out a [`Subscription`] guard. The guard
//! owns the receiving end of the channel and unsubscribes when dropped, so a
//! view holding one is unsubscribed on every exit path, early returns and
//! unwinding included. Every published event reaches every live subscriber
//! exactly once; the hub does not deduplicate.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures::{FutureExt, StreamExt};
use worker::kv::KvStore;

use crate::errors::AppResult;
use crate::models::{SessionRecord, TokenSet, UserRecord};
use crate::utils::generate_unique_identifier;

/// Authentication state of the current browser session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    NoSession,
    Authenticated { user: UserRecord },
}

impl SessionStatus {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionStatus::Authenticated { .. })
    }

    pub fn user(&self) -> Option<&UserRecord> {
        match self {
            SessionStatus::Authenticated { user } => Some(user),
            SessionStatus::NoSession => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthEvent {
    /// The hosted UI redirected back and the code exchange completed.
    SignInWithRedirect,
    /// A password sign-in completed.
    SignedIn,
    SignedOut,
}

impl AuthEvent {
    pub fn is_sign_in(self) -> bool {
        matches!(self, AuthEvent::SignInWithRedirect | AuthEvent::SignedIn)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignInMethod {
    Redirect,
    Password,
}

impl SignInMethod {
    fn event(self) -> AuthEvent {
        match self {
            SignInMethod::Redirect => AuthEvent::SignInWithRedirect,
            SignInMethod::Password => AuthEvent::SignedIn,
        }
    }
}

#[derive(Default)]
struct HubInner {
    next_id: u64,
    subscribers: Vec<(u64, UnboundedSender<AuthEvent>)>,
}

#[derive(Clone, Default)]
pub struct SessionHub {
    inner: Rc<RefCell<HubInner>>,
}

impl SessionHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Subscription {
        let (sender, receiver) = unbounded();
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.subscribers.push((id, sender));
        Subscription {
            id,
            receiver,
            hub: Rc::downgrade(&self.inner),
        }
    }

    pub fn publish(&self, event: AuthEvent) {
        let inner = self.inner.borrow();
        for (_, sender) in &inner.subscribers {
            // A closed receiver belongs to a subscription being dropped.
            let _ = sender.unbounded_send(event);
        }
    }

    #[cfg(test)]
    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().subscribers.len()
    }
}

/// Live registration on a [`SessionHub`]; unsubscribes on drop.
pub struct Subscription {
    id: u64,
    receiver: UnboundedReceiver<AuthEvent>,
    hub: Weak<RefCell<HubInner>>,
}

impl Subscription {
    /// Takes every event delivered since the last call.
    pub fn drain(&mut self) -> Vec<AuthEvent> {
        let mut events = Vec::new();
        while let Some(Some(event)) = self.receiver.next().now_or_never() {
            events.push(event);
        }
        events
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.hub.upgrade() {
            if let Ok(mut inner) = inner.try_borrow_mut() {
                inner.subscribers.retain(|(id, _)| *id != self.id);
            }
        }
    }
}

/// Persistence for sessions and pending OAuth states.
#[async_trait(?Send)]
pub trait SessionStore {
    async fn load(&self, session_id: &str) -> AppResult<Option<SessionRecord>>;

    async fn save(&self, record: &SessionRecord, ttl_secs: u64) -> AppResult<()>;

    async fn remove(&self, session_id: &str) -> AppResult<()>;

    async fn put_oauth_state(&self, state: &str, ttl_secs: u64) -> AppResult<()>;

    /// Consumes a pending state; returns whether it existed.
    async fn take_oauth_state(&self, state: &str) -> AppResult<bool>;
}

pub struct KvSessionStore {
    kv: KvStore,
}

impl KvSessionStore {
    pub fn new(kv: KvStore) -> Self {
        Self { kv }
    }
}

fn session_key(session_id: &str) -> String {
    format!("session:{}", session_id)
}

fn oauth_state_key(state: &str) -> String {
    format!("oauth_state:{}", state)
}

#[async_trait(?Send)]
impl SessionStore for KvSessionStore {
    async fn load(&self, session_id: &str) -> AppResult<Option<SessionRecord>> {
        Ok(self
            .kv
            .get(&session_key(session_id))
            .json::<SessionRecord>()
            .await?)
    }

    async fn save(&self, record: &SessionRecord, ttl_secs: u64) -> AppResult<()> {
        let value = serde_json::to_string(record)
            .map_err(|e| crate::errors::AppError::Backend(format!("encode session: {}", e)))?;
        self.kv
            .put(&session_key(&record.session_id), value)?
            .expiration_ttl(ttl_secs)
            .execute()
            .await?;
        Ok(())
    }

    async fn remove(&self, session_id: &str) -> AppResult<()> {
        self.kv.delete(&session_key(session_id)).await?;
        Ok(())
    }

    async fn put_oauth_state(&self, state: &str, ttl_secs: u64) -> AppResult<()> {
        self.kv
            .put(&oauth_state_key(state), "pending")?
            .expiration_ttl(ttl_secs)
            .execute()
            .await?;
        Ok(())
    }

    async fn take_oauth_state(&self, state: &str) -> AppResult<bool> {
        let key = oauth_state_key(state);
        if self.kv.get(&key).text().await?.is_none() {
            return Ok(false);
        }
        self.kv.delete(&key).await?;
        Ok(true)
    }
}

/// Session state for one request.
pub struct SessionProvider<S: SessionStore> {
    store: S,
    hub: SessionHub,
    current: RefCell<Option<SessionRecord>>,
    ttl_secs: u64,
}

impl<S: SessionStore> SessionProvider<S> {
    /// Loads the session named by the request's cookie. Unknown and expired
    /// sessions load as [`SessionStatus::NoSession`].
    pub async fn load(
        store: S,
        session_id: Option<&str>,
        ttl_secs: u64,
        now: DateTime<Utc>,
    ) -> AppResult<Self> {
        let current = match session_id {
            Some(id) => match store.load(id).await? {
                Some(record) if record.is_expired(now) => {
                    store.remove(id).await?;
                    None
                }
                other => other,
            },
            None => None,
        };

        Ok(Self {
            store,
            hub: SessionHub::new(),
            current: RefCell::new(current),
            ttl_secs,
        })
    }

    pub fn status(&self) -> SessionStatus {
        match self.current.borrow().as_ref() {
            Some(record) => SessionStatus::Authenticated {
                user: record.user.clone(),
            },
            None => SessionStatus::NoSession,
        }
    }

    pub fn session_id(&self) -> Option<String> {
        self.current
            .borrow()
            .as_ref()
            .map(|record| record.session_id.clone())
    }

    pub fn hub(&self) -> &SessionHub {
        &self.hub
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Starts a fresh session for `user` and publishes the sign-in event.
    /// A previous session of this browser is discarded.
    pub async fn complete_sign_in(
        &self,
        user: UserRecord,
        tokens: TokenSet,
        method: SignInMethod,
        now: DateTime<Utc>,
    ) -> AppResult<SessionRecord> {
        if let Some(previous) = self.session_id() {
            self.store.remove(&previous).await?;
        }

        let record = SessionRecord {
            session_id: generate_unique_identifier(),
            user,
            tokens,
            created_at: now,
            expires_at: now + Duration::seconds(self.ttl_secs as i64),
        };
        self.store.save(&record, self.ttl_secs).await?;
        *self.current.borrow_mut() = Some(record.clone());

        self.hub.publish(method.event());
        Ok(record)
    }

    /// Ends the session. Publishes `SignedOut` only if one was active.
    pub async fn sign_out(&self) -> AppResult<()> {
        let Some(session_id) = self.session_id() else {
            return Ok(());
        };
        self.store.remove(&session_id).await?;
        *self.current.borrow_mut() = None;
        self.hub.publish(AuthEvent::SignedOut);
        Ok(())
    }
}
