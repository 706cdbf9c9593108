use std::fmt::Write;

use crate::api::models::{Comment, Post};
use crate::auth::{can_delete, can_edit};
use crate::error::{ClientError, ClientResult};
use crate::extractors::{CurrentUser, MaybeUser};
use crate::resource::Resource;
use crate::state::AppState;

use super::{authorize, format_date, Route};

/// Single post with its comment thread.
pub struct PostPage {
    state: AppState,
    post: Resource<String, Post>,
    comments: Resource<i64, Vec<Comment>>,
}

impl PostPage {
    pub fn new(state: &AppState) -> Self {
        let api = state.api.clone();
        let post = Resource::new(move |slug: String| {
            let api = api.clone();
            async move { api.get_post(&slug).await }
        });
        let api = state.api.clone();
        let comments = Resource::new(move |post_id: i64| {
            let api = api.clone();
            async move { api.list_comments(post_id).await }
        });
        Self {
            state: state.clone(),
            post,
            comments,
        }
    }

    pub async fn open(state: &AppState, slug: &str) -> Self {
        let page = Self::new(state);
        page.show(slug).await;
        page
    }

    /// Load the post for `slug`, then its comments once the id is known.
    pub async fn show(&self, slug: &str) {
        self.post.use_key(slug.to_string()).await;
        if let Some(post) = self.post.data() {
            self.comments.use_key(post.id).await;
        }
    }

    pub fn post(&self) -> &Resource<String, Post> {
        &self.post
    }

    pub fn comments(&self) -> &Resource<i64, Vec<Comment>> {
        &self.comments
    }

    pub async fn refresh_comments(&self) -> bool {
        self.comments.refetch().await
    }

    /// Post a comment and show it at the top of the thread without reloading.
    pub async fn submit_comment(&self, content: &str) -> ClientResult<Comment> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ClientError::Validation("Comment cannot be empty.".into()));
        }
        let has_credentials = self.state.tokens.get()?.is_some();
        let CurrentUser(author) = CurrentUser::from_session(&self.state.session, has_credentials)?;
        let post_id = self.loaded_post()?.id;

        let created = self.state.api.create_comment(post_id, content).await?;
        tracing::info!(post_id, author = %author.username, "comment posted");

        let shown = created.clone();
        self.comments.mutate(move |data| data.get_or_insert_with(Vec::new).insert(0, shown));
        self.post.mutate(|data| {
            if let Some(post) = data.as_mut() {
                post.comment_count += 1;
            }
        });
        Ok(created)
    }

    /// Delete the loaded post. Goes through the same guard as the editor
    /// routes, then requires stored credentials.
    pub async fn delete(&self) -> ClientResult<()> {
        let post = self.loaded_post()?;
        let route = Route::DeletePost {
            slug: post.slug.clone(),
        };
        if authorize(&self.state, &route).is_err() || self.state.tokens.get()?.is_none() {
            return Err(ClientError::Unauthorized);
        }
        self.state.api.delete_post(&post.slug).await?;
        tracing::info!(slug = %post.slug, "post deleted");
        Ok(())
    }

    fn loaded_post(&self) -> ClientResult<Post> {
        match self.post.data() {
            Some(post) => Ok(post),
            None => Err(self.post.failure().unwrap_or(ClientError::NotFound)),
        }
    }

    pub fn render(&self) -> String {
        let post_state = self.post.snapshot();
        let viewer = MaybeUser::from_session(&self.state.session);
        let mut out = String::new();

        let Some(post) = post_state.data else {
            match post_state.error {
                Some(error) => {
                    let _ = writeln!(out, "Error: {error}");
                }
                None => out.push_str("Loading post…\n"),
            }
            return out;
        };

        if let Some(error) = &post_state.error {
            let _ = writeln!(out, "Error: {error}");
        }
        let _ = writeln!(out, "{}", post.title);
        let mut meta = Vec::new();
        if let Some(category) = &post.category {
            meta.push(category.clone());
        }
        meta.push(format_date(&post.created_at));
        let _ = writeln!(out, "{}", meta.join(" · "));
        if let Some(image) = &post.image {
            let _ = writeln!(out, "[image] {image}");
        }
        let _ = writeln!(out, "\n{}\n", post.content);

        let mut actions = Vec::new();
        if can_edit(viewer.user(), &post) {
            actions.push(format!("edit: superblog edit {}", post.slug));
        }
        if can_delete(viewer.user(), &post) {
            actions.push(format!("delete: superblog delete {}", post.slug));
        }
        if !actions.is_empty() {
            let _ = writeln!(out, "{}\n", actions.join("  "));
        }

        self.render_comments(&mut out, &post, viewer.user().is_some());
        out
    }

    fn render_comments(&self, out: &mut String, post: &Post, signed_in: bool) {
        let state = self.comments.snapshot();
        let _ = writeln!(out, "Comments ({})", post.comment_count);
        if let Some(error) = &state.error {
            let _ = writeln!(out, "Error: {error}");
        }
        match &state.data {
            None if state.loading => out.push_str("Loading comments…\n"),
            None => {}
            Some(comments) if comments.is_empty() => out.push_str("No comments yet. Be the first!\n"),
            Some(comments) => {
                for comment in comments {
                    let _ = writeln!(
                        out,
                        "- {} ({}): {}",
                        comment.author(),
                        format_date(&comment.created_at),
                        comment.content
                    );
                }
            }
        }
        if !signed_in {
            let _ = writeln!(
                out,
                "\nLog in to leave a comment: superblog login <username> <password>"
            );
        }
    }
}
