use crate::api::models::{Post, User};
use crate::auth::session::SessionState;

/// What to do with a navigation to an authenticated-only view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    /// Identity still resolving: show nothing, redirect nowhere.
    Pending,
    /// No session: go to the login entry point instead.
    RedirectToLogin,
    Render,
}

/// Pure function of the session state; holds nothing of its own.
pub fn guard(state: &SessionState) -> GuardDecision {
    if state.loading {
        GuardDecision::Pending
    } else if state.user.is_some() {
        GuardDecision::Render
    } else {
        GuardDecision::RedirectToLogin
    }
}

// Ownership checks below only decide which actions a view offers. The
// server re-validates every mutating call.

pub fn can_edit(viewer: Option<&User>, post: &Post) -> bool {
    viewer.is_some_and(|user| user.id == post.user)
}

pub fn can_delete(viewer: Option<&User>, post: &Post) -> bool {
    viewer.is_some_and(|user| user.id == post.user || user.is_privileged())
}
