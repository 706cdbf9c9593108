//! Typed access to the blog REST backend.
//!
//! [`BlogApi`] is the seam between the session/resource layers and the
//! transport; [`HttpBlogApi`] is the reqwest implementation.

pub mod http;
pub mod models;

use async_trait::async_trait;

pub use http::HttpBlogApi;
pub use models::{Category, Comment, CredentialPair, Post, PostDraft, User};

use crate::error::ClientResult;

#[async_trait]
pub trait BlogApi: Send + Sync {
    /// Exchange a login name and password for a credential pair.
    async fn login(&self, login: &str, password: &str) -> ClientResult<CredentialPair>;

    /// Trade a refresh token for a fresh pair.
    async fn refresh(&self, refresh_token: &str) -> ClientResult<CredentialPair>;

    async fn register(&self, username: &str, password: &str) -> ClientResult<User>;

    /// Identity behind the stored access token.
    async fn me(&self) -> ClientResult<User>;

    async fn list_posts(&self, search: Option<&str>) -> ClientResult<Vec<Post>>;

    async fn posts_by_category(&self, category: &str) -> ClientResult<Vec<Post>>;

    async fn get_post(&self, slug: &str) -> ClientResult<Post>;

    async fn create_post(&self, draft: &PostDraft) -> ClientResult<Post>;

    async fn update_post(&self, slug: &str, draft: &PostDraft) -> ClientResult<Post>;

    async fn delete_post(&self, slug: &str) -> ClientResult<()>;

    async fn list_categories(&self) -> ClientResult<Vec<Category>>;

    async fn list_comments(&self, post_id: i64) -> ClientResult<Vec<Comment>>;

    async fn create_comment(&self, post_id: i64, content: &str) -> ClientResult<Comment>;
}
