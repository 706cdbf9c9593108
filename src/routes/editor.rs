use std::fmt::Write;

use crate::api::models::{Category, Post, PostDraft};
use crate::error::{ClientError, ClientResult};
use crate::resource::Resource;
use crate::state::AppState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorMode {
    Create,
    Edit { slug: String },
}

/// Create/edit form for a post. Only reachable behind the route guard.
pub struct EditorPage {
    state: AppState,
    mode: EditorMode,
    categories: Resource<(), Vec<Category>>,
    existing: Resource<String, Post>,
}

impl EditorPage {
    fn new(state: &AppState, mode: EditorMode) -> Self {
        let api = state.api.clone();
        let categories = Resource::new(move |_: ()| {
            let api = api.clone();
            async move { api.list_categories().await }
        });
        let api = state.api.clone();
        let existing = Resource::new(move |slug: String| {
            let api = api.clone();
            async move { api.get_post(&slug).await }
        });
        Self {
            state: state.clone(),
            mode,
            categories,
            existing,
        }
    }

    pub async fn create(state: &AppState) -> Self {
        let page = Self::new(state, EditorMode::Create);
        page.categories.use_key(()).await;
        page
    }

    pub async fn edit(state: &AppState, slug: &str) -> Self {
        let page = Self::new(
            state,
            EditorMode::Edit {
                slug: slug.to_string(),
            },
        );
        tokio::join!(
            page.categories.use_key(()),
            page.existing.use_key(slug.to_string())
        );
        page
    }

    /// The post being edited. Fails with the lookup error when it could not
    /// be loaded, so nothing is ever submitted over a post that was not seen.
    pub fn existing_post(&self) -> ClientResult<Post> {
        match self.existing.data() {
            Some(post) => Ok(post),
            None => Err(self.existing.failure().unwrap_or(ClientError::NotFound)),
        }
    }

    /// Form contents to start from: the stored post when editing.
    pub fn draft(&self) -> PostDraft {
        match self.existing.data() {
            Some(post) => PostDraft {
                title: post.title,
                content: post.content,
                category: post.category.unwrap_or_default(),
                image: None,
            },
            None => PostDraft::default(),
        }
    }

    /// Validate and send the draft. Returns the post as stored by the server.
    pub async fn submit(&self, draft: &PostDraft) -> ClientResult<Post> {
        if self.state.tokens.get()?.is_none() {
            return Err(ClientError::Unauthorized);
        }
        if let EditorMode::Edit { .. } = self.mode {
            self.existing_post()?;
        }
        draft.validate()?;
        self.check_category(&draft.category)?;

        let saved = match &self.mode {
            EditorMode::Create => self.state.api.create_post(draft).await?,
            EditorMode::Edit { slug } => self.state.api.update_post(slug, draft).await?,
        };
        tracing::info!(slug = %saved.slug, "post saved");
        Ok(saved)
    }

    fn check_category(&self, name: &str) -> ClientResult<()> {
        let Some(categories) = self.categories.data() else {
            return Ok(());
        };
        let name = name.trim();
        if categories.is_empty() || categories.iter().any(|c| c.name == name) {
            Ok(())
        } else {
            Err(ClientError::Validation(format!(
                "Unknown category \"{name}\"."
            )))
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = match &self.mode {
            EditorMode::Create => writeln!(out, "New post"),
            EditorMode::Edit { slug } => writeln!(out, "Edit post: {slug}"),
        };
        out.push('\n');

        if let EditorMode::Edit { .. } = self.mode {
            let existing = self.existing.snapshot();
            if let Some(error) = &existing.error {
                let _ = writeln!(out, "Error: {error}");
                return out;
            }
            if existing.data.is_none() {
                out.push_str("Loading post…\n");
                return out;
            }
        }

        let draft = self.draft();
        let _ = writeln!(out, "Title:    {}", draft.title);
        let _ = writeln!(out, "Category: {}", draft.category);
        let _ = writeln!(out, "Content:  {} characters", draft.content.chars().count());

        let categories = self.categories.snapshot();
        match (&categories.data, &categories.error) {
            (_, Some(error)) => {
                let _ = writeln!(out, "\nError: {error}");
            }
            (Some(list), None) if !list.is_empty() => {
                let names: Vec<&str> = list.iter().map(|c| c.name.as_str()).collect();
                let _ = writeln!(out, "\nCategories: {}", names.join(", "));
            }
            _ => {}
        }
        out
    }
}
