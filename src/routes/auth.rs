use crate::api::models::User;
use crate::auth::{SessionPhase, SessionState};
use crate::error::{ClientError, ClientResult};
use crate::state::AppState;

fn require_credentials(username: &str, password: &str) -> ClientResult<()> {
    if username.trim().is_empty() || password.is_empty() {
        return Err(ClientError::Validation(
            "Username and password are required.".into(),
        ));
    }
    Ok(())
}

pub async fn login(state: &AppState, username: &str, password: &str) -> ClientResult<User> {
    require_credentials(username, password)?;
    state.session.login(username.trim(), password).await
}

pub fn logout(state: &AppState) -> ClientResult<()> {
    state.session.logout()
}

/// Create an account. The new user still has to log in afterwards.
pub async fn register(state: &AppState, username: &str, password: &str) -> ClientResult<User> {
    require_credentials(username, password)?;
    let user = state.api.register(username.trim(), password).await?;
    tracing::info!(user = %user.username, "account registered");
    Ok(user)
}

pub fn whoami(session: &SessionState) -> String {
    match session.phase() {
        SessionPhase::Loading => "Checking your session…".to_string(),
        SessionPhase::Authenticated(user) if user.is_privileged() => {
            format!("Logged in as {} (staff)", user.username)
        }
        SessionPhase::Authenticated(user) => format!("Logged in as {}", user.username),
        SessionPhase::Anonymous => "Not logged in.".to_string(),
    }
}

pub fn login_prompt(session: &SessionState) -> String {
    match &session.user {
        Some(user) => format!("Already logged in as {}.", user.username),
        None => "Log in with: superblog login <username> <password>".to_string(),
    }
}
