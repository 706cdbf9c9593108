use std::fmt::Write;
use std::sync::Arc;

use crate::api::models::{Category, Post};
use crate::api::BlogApi;
use crate::resource::Resource;

use super::format_date;

/// Which collection of posts a list page shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostFilter {
    All,
    Search(String),
    Category(String),
}

impl PostFilter {
    /// Blank queries fall back to the unfiltered list.
    pub fn from_search(search: Option<String>) -> Self {
        match search.map(|q| q.trim().to_string()) {
            Some(query) if !query.is_empty() => PostFilter::Search(query),
            _ => PostFilter::All,
        }
    }
}

pub struct PostsPage {
    posts: Resource<PostFilter, Vec<Post>>,
}

impl PostsPage {
    pub fn new(api: Arc<dyn BlogApi>) -> Self {
        let posts = Resource::new(move |filter: PostFilter| {
            let api = api.clone();
            async move {
                match filter {
                    PostFilter::All => api.list_posts(None).await,
                    PostFilter::Search(query) => api.list_posts(Some(&query)).await,
                    PostFilter::Category(name) => api.posts_by_category(&name).await,
                }
            }
        });
        Self { posts }
    }

    pub async fn show(&self, filter: PostFilter) {
        self.posts.use_key(filter).await;
    }

    pub fn posts(&self) -> &Resource<PostFilter, Vec<Post>> {
        &self.posts
    }

    pub fn render(&self) -> String {
        let state = self.posts.snapshot();
        let filter = state.key.unwrap_or(PostFilter::All);
        let mut out = String::new();

        let _ = match &filter {
            PostFilter::All => writeln!(out, "Latest posts"),
            PostFilter::Search(query) => writeln!(out, "Search results for \"{query}\""),
            PostFilter::Category(name) => writeln!(out, "Category: {name}"),
        };
        out.push('\n');

        if let Some(error) = &state.error {
            let _ = writeln!(out, "Error: {error}");
        }

        match &state.data {
            None if state.loading => out.push_str("Loading posts…\n"),
            None => {}
            Some(posts) if posts.is_empty() => {
                let _ = match &filter {
                    PostFilter::Search(query) => writeln!(out, "No posts found for \"{query}\"."),
                    _ => writeln!(out, "No posts found."),
                };
            }
            Some(posts) => {
                for post in posts {
                    render_card(&mut out, post);
                }
            }
        }
        out
    }
}

fn render_card(out: &mut String, post: &Post) {
    let _ = writeln!(out, "{}", post.title);
    let mut meta = vec![post.slug.clone()];
    if let Some(category) = &post.category {
        meta.push(category.clone());
    }
    meta.push(format_date(&post.created_at));
    meta.push(format!("{} comments", post.comment_count));
    let _ = writeln!(out, "  {}", meta.join(" · "));
    let excerpt = post.excerpt();
    if !excerpt.is_empty() {
        let _ = writeln!(out, "  {excerpt}");
    }
    out.push('\n');
}

pub struct CategoriesPage {
    categories: Resource<(), Vec<Category>>,
}

impl CategoriesPage {
    pub fn new(api: Arc<dyn BlogApi>) -> Self {
        let categories = Resource::new(move |_: ()| {
            let api = api.clone();
            async move { api.list_categories().await }
        });
        Self { categories }
    }

    pub async fn show(&self) {
        self.categories.use_key(()).await;
    }

    pub fn render(&self) -> String {
        let state = self.categories.snapshot();
        let mut out = String::from("Categories\n\n");
        if let Some(error) = &state.error {
            let _ = writeln!(out, "Error: {error}");
        }
        match &state.data {
            Some(categories) if categories.is_empty() => out.push_str("No categories yet.\n"),
            Some(categories) => {
                for category in categories {
                    let _ = writeln!(out, "- {}", category.name);
                }
            }
            None if state.loading => out.push_str("Loading categories…\n"),
            None => {}
        }
        out
    }
}
