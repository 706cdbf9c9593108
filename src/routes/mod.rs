pub mod auth;
pub mod editor;
pub mod home;
pub mod post;

use std::fmt;

use chrono::{DateTime, Utc};

use crate::auth::{guard, GuardDecision};
use crate::state::AppState;

use editor::EditorPage;
use home::{CategoriesPage, PostFilter, PostsPage};
use post::PostPage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Home { search: Option<String> },
    Category { name: String },
    Categories,
    Post { slug: String },
    NewPost,
    EditPost { slug: String },
    DeletePost { slug: String },
    Login,
    Logout,
}

impl Route {
    pub fn home() -> Self {
        Route::Home { search: None }
    }

    pub fn requires_auth(&self) -> bool {
        matches!(
            self,
            Route::NewPost | Route::EditPost { .. } | Route::DeletePost { .. }
        )
    }

    pub fn path(&self) -> String {
        match self {
            Route::Home { search: None } => "/".to_string(),
            Route::Home {
                search: Some(query),
            } => format!("/?search={query}"),
            Route::Category { name } => format!("/category/{name}"),
            Route::Categories => "/categories".to_string(),
            Route::Post { slug } => format!("/post/{slug}"),
            Route::NewPost => "/create-post".to_string(),
            Route::EditPost { slug } => format!("/edit-post/{slug}"),
            Route::DeletePost { slug } => format!("/delete-post/{slug}"),
            Route::Login => "/login".to_string(),
            Route::Logout => "/logout".to_string(),
        }
    }
}

/// Result of a navigation.
#[derive(Debug, Clone, PartialEq)]
pub enum Screen {
    /// Identity still resolving; nothing is shown yet.
    Pending,
    Redirect(Route),
    Page(String),
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Screen::Pending => write!(f, "Checking your session…"),
            Screen::Redirect(Route::Login) => {
                write!(f, "You need to log in first: superblog login <username> <password>")
            }
            Screen::Redirect(route) => write!(f, "Redirecting to {}", route.path()),
            Screen::Page(body) => write!(f, "{body}"),
        }
    }
}

/// Apply the route guard. `Err` carries the screen to show instead.
pub fn authorize(state: &AppState, route: &Route) -> Result<(), Screen> {
    if !route.requires_auth() {
        return Ok(());
    }
    match guard(&state.session.snapshot()) {
        GuardDecision::Render => Ok(()),
        GuardDecision::Pending => Err(Screen::Pending),
        GuardDecision::RedirectToLogin => {
            tracing::info!(route = %route.path(), "anonymous navigation redirected to login");
            Err(Screen::Redirect(Route::Login))
        }
    }
}

pub async fn open(state: &AppState, route: Route) -> Screen {
    if let Err(screen) = authorize(state, &route) {
        return screen;
    }

    match route {
        Route::Home { search } => {
            let page = PostsPage::new(state.api.clone());
            page.show(PostFilter::from_search(search)).await;
            Screen::Page(page.render())
        }
        Route::Category { name } => {
            let page = PostsPage::new(state.api.clone());
            page.show(PostFilter::Category(name)).await;
            Screen::Page(page.render())
        }
        Route::Categories => {
            let page = CategoriesPage::new(state.api.clone());
            page.show().await;
            Screen::Page(page.render())
        }
        Route::Post { slug } => Screen::Page(PostPage::open(state, &slug).await.render()),
        Route::NewPost => Screen::Page(EditorPage::create(state).await.render()),
        Route::EditPost { slug } => Screen::Page(EditorPage::edit(state, &slug).await.render()),
        Route::DeletePost { slug } => {
            let page = PostPage::open(state, &slug).await;
            match page.delete().await {
                Ok(()) => Screen::Redirect(Route::home()),
                Err(err) => Screen::Page(format!("Error: {}\n", err.user_message())),
            }
        }
        Route::Login => Screen::Page(auth::login_prompt(&state.session.snapshot())),
        Route::Logout => {
            if let Err(err) = auth::logout(state) {
                tracing::warn!("logout could not clear stored credentials: {}", err);
            }
            Screen::Redirect(Route::home())
        }
    }
}

pub(crate) fn format_date(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}
