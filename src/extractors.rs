use crate::api::models::User;
use crate::auth::session::SessionStore;
use crate::error::{ClientError, ClientResult};

/// The signed-in user, required by views that submit on the user's behalf.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl CurrentUser {
    /// Fails with `Unauthorized` when there is no session, or when no
    /// credentials are stored even though a user is still displayed.
    pub fn from_session(session: &SessionStore, has_credentials: bool) -> ClientResult<Self> {
        match session.user() {
            Some(user) if has_credentials => Ok(CurrentUser(user)),
            _ => Err(ClientError::Unauthorized),
        }
    }
}

/// Optional user: `None` instead of an error when anonymous.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

impl MaybeUser {
    pub fn from_session(session: &SessionStore) -> Self {
        MaybeUser(session.user())
    }

    pub fn user(&self) -> Option<&User> {
        self.0.as_ref()
    }
}
