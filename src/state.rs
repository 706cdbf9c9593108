use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::api::{BlogApi, HttpBlogApi};
use crate::auth::session::SessionStore;
use crate::auth::tokens::TokenHolder;
use crate::config::Config;
use crate::error::ClientResult;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Every long-lived service the views need, built once at startup.
///
/// Construction order matters: the token holder must be readable before the
/// API client attaches credentials, and both must exist before the session
/// store runs its boot fetch.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub tokens: TokenHolder,
    pub api: Arc<dyn BlogApi>,
    pub session: Arc<SessionStore>,
}

impl AppState {
    pub fn new(config: Config, db: DbPool) -> ClientResult<Self> {
        let tokens = TokenHolder::new(db, config.origin()?);
        let api: Arc<dyn BlogApi> = Arc::new(HttpBlogApi::new(&config, tokens.clone())?);
        Ok(Self::with_api(config, tokens, api))
    }

    pub fn with_api(config: Config, tokens: TokenHolder, api: Arc<dyn BlogApi>) -> Self {
        let session = Arc::new(SessionStore::new(
            tokens.clone(),
            api.clone(),
            config.auth.refresh_on_expiry,
        ));
        Self {
            config,
            tokens,
            api,
            session,
        }
    }
}
