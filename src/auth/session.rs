use std::sync::Arc;

use tokio::sync::watch;

use crate::api::models::{CredentialPair, User};
use crate::api::BlogApi;
use crate::auth::tokens::TokenHolder;
use crate::error::{ClientError, ClientResult};

/// Snapshot of who the current user is.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub user: Option<User>,
    pub loading: bool,
}

impl SessionState {
    /// Application start: identity unknown until the boot fetch settles.
    pub fn booting() -> Self {
        Self {
            user: None,
            loading: true,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        match (&self.user, self.loading) {
            (_, true) => SessionPhase::Loading,
            (Some(user), false) => SessionPhase::Authenticated(user.clone()),
            (None, false) => SessionPhase::Anonymous,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionPhase {
    Loading,
    Authenticated(User),
    Anonymous,
}

/// Single source of truth for the current user, reconciled with the server.
///
/// Overlapping [`SessionStore::fetch_user_data`] calls are not cancelled or
/// ordered: whichever settles last decides the state, even if it was issued
/// first.
pub struct SessionStore {
    state: watch::Sender<SessionState>,
    tokens: TokenHolder,
    api: Arc<dyn BlogApi>,
    refresh_on_expiry: bool,
}

/// Clears the loading flag when a fetch ends, however it ends.
struct LoadingScope<'a>(&'a watch::Sender<SessionState>);

impl Drop for LoadingScope<'_> {
    fn drop(&mut self) {
        self.0.send_if_modified(|state| std::mem::replace(&mut state.loading, false));
    }
}

impl SessionStore {
    pub fn new(tokens: TokenHolder, api: Arc<dyn BlogApi>, refresh_on_expiry: bool) -> Self {
        let (state, _) = watch::channel(SessionState::booting());
        Self {
            state,
            tokens,
            api,
            refresh_on_expiry,
        }
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.borrow().phase()
    }

    pub fn user(&self) -> Option<User> {
        self.state.borrow().user.clone()
    }

    fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Wait until no identity fetch is marked in flight.
    pub async fn resolved(&self) -> SessionState {
        let mut rx = self.subscribe();
        let settled = rx
            .wait_for(|state| !state.loading)
            .await
            .map(|state| (*state).clone());
        settled.unwrap_or_else(|_| self.snapshot())
    }

    /// Look up the identity behind the stored credentials.
    ///
    /// Returns `Ok(None)` when the server says there is no session (missing,
    /// expired or rejected credentials). Other failures are returned, but the
    /// store ends up anonymous either way.
    pub async fn fetch_user_data(&self) -> ClientResult<Option<User>> {
        self.state.send_modify(|state| state.loading = true);
        let _scope = LoadingScope(&self.state);

        match self.lookup_identity().await {
            Ok(user) => {
                tracing::info!(user = %user.username, "session authenticated");
                let found = user.clone();
                self.state.send_modify(|state| {
                    state.user = Some(found);
                    state.loading = false;
                });
                Ok(Some(user))
            }
            Err(err) => {
                self.state.send_modify(|state| {
                    state.user = None;
                    state.loading = false;
                });
                if err.is_auth_failure() {
                    tracing::debug!("no session: {}", err);
                    Ok(None)
                } else {
                    tracing::warn!("identity lookup failed: {}", err);
                    Err(err)
                }
            }
        }
    }

    /// Exchange credentials for a token pair, store it and re-fetch identity.
    pub async fn login(&self, login: &str, password: &str) -> ClientResult<User> {
        let pair = self.api.login(login, password).await?;
        self.tokens.set(&pair.access_token, &pair.refresh_token)?;
        tracing::info!(login, "credentials stored");

        self.fetch_user_data()
            .await?
            .ok_or(ClientError::Unauthorized)
    }

    /// Forget the credential pair and become anonymous. No network call.
    pub fn logout(&self) -> ClientResult<()> {
        let cleared = self.tokens.clear();
        self.state.send_modify(|state| {
            state.user = None;
            state.loading = false;
        });
        tracing::info!("logged out");
        cleared
    }

    async fn lookup_identity(&self) -> ClientResult<User> {
        match self.api.me().await {
            Err(ClientError::Unauthorized) if self.refresh_on_expiry => {
                let Some(pair) = self.tokens.get()?.filter(CredentialPair::can_refresh) else {
                    return Err(ClientError::Unauthorized);
                };
                self.refresh_credentials(&pair).await?;
                self.api.me().await
            }
            other => other,
        }
    }

    async fn refresh_credentials(&self, pair: &CredentialPair) -> ClientResult<()> {
        tracing::debug!("access token rejected, refreshing");
        let fresh = self
            .api
            .refresh(&pair.refresh_token)
            .await
            .map_err(|err| match err {
                ClientError::Network(_) => err,
                _ => ClientError::Unauthorized,
            })?;
        self.tokens.set(&fresh.access_token, &fresh.refresh_token)?;
        tracing::info!("access token refreshed");
        Ok(())
    }
}
