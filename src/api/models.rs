use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{ClientError, ClientResult};

const EXCERPT_WORDS: usize = 10;

/// Access + refresh token combination.
///
/// An empty refresh token means the backend did not issue one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl CredentialPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }

    pub fn can_refresh(&self) -> bool {
        !self.refresh_token.is_empty()
    }
}

/// The login endpoint answers in one of two shapes depending on the backend.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TokenResponse {
    Pair {
        access: String,
        #[serde(default)]
        refresh: Option<String>,
    },
    Bearer {
        #[serde(rename = "accessToken")]
        access_token: String,
        #[serde(rename = "refreshToken", default)]
        refresh_token: Option<String>,
    },
}

impl TokenResponse {
    /// Normalize into a credential pair, keeping `fallback_refresh` when the
    /// response carries no refresh token of its own.
    pub fn into_pair(self, fallback_refresh: &str) -> ClientResult<CredentialPair> {
        let (access, refresh) = match self {
            TokenResponse::Pair { access, refresh } => (access, refresh),
            TokenResponse::Bearer {
                access_token,
                refresh_token,
            } => (access_token, refresh_token),
        };
        if access.trim().is_empty() {
            return Err(ClientError::Decode("empty access token".into()));
        }
        let refresh = refresh
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| fallback_refresh.to_string());
        Ok(CredentialPair::new(access, refresh))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub is_staff: bool,
    #[serde(default)]
    pub is_superuser: bool,
}

impl User {
    pub fn is_privileged(&self) -> bool {
        self.is_staff || self.is_superuser
    }

    pub fn validate(self) -> ClientResult<Self> {
        if self.username.trim().is_empty() {
            return Err(ClientError::Decode("user without a username".into()));
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    /// Owner id.
    pub user: i64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub comment_count: u32,
}

impl Post {
    pub fn validate(self) -> ClientResult<Self> {
        if !is_valid_slug(&self.slug) {
            return Err(ClientError::Decode(format!(
                "post {} has an invalid slug {:?}",
                self.id, self.slug
            )));
        }
        Ok(self)
    }

    /// First words of the content, for list cards.
    pub fn excerpt(&self) -> String {
        let words: Vec<&str> = self.content.split_whitespace().collect();
        let mut excerpt = words
            .iter()
            .take(EXCERPT_WORDS)
            .copied()
            .collect::<Vec<_>>()
            .join(" ");
        if words.len() > EXCERPT_WORDS {
            excerpt.push('…');
        }
        excerpt
    }
}

/// Slugs are non-empty and limited to ASCII letters, digits, `-` and `_`.
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Comment authors arrive either as an id or as a display name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AuthorRef {
    Id(i64),
    Name(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    #[serde(alias = "post_id", alias = "postId")]
    pub post: i64,
    #[serde(default)]
    pub user: Option<AuthorRef>,
    #[serde(default)]
    pub username: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn author(&self) -> String {
        match (&self.username, &self.user) {
            (Some(name), _) => name.clone(),
            (None, Some(AuthorRef::Name(name))) => name.clone(),
            (None, Some(AuthorRef::Id(id))) => format!("user #{id}"),
            (None, None) => "anonymous".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

/// Fields submitted when creating or editing a post.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostDraft {
    pub title: String,
    pub content: String,
    pub category: String,
    /// Local image to upload. `None` on edit keeps the current image.
    pub image: Option<PathBuf>,
}

impl PostDraft {
    /// Client-side required-field check; the server validates again.
    pub fn validate(&self) -> ClientResult<()> {
        let mut missing = Vec::new();
        if self.title.trim().is_empty() {
            missing.push("Title is required.");
        }
        if self.content.trim().is_empty() {
            missing.push("Content is required.");
        }
        if self.category.trim().is_empty() {
            missing.push("Category is required.");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ClientError::Validation(missing.join(" ")))
        }
    }
}

#[derive(Debug, Serialize)]
pub struct NewComment<'a> {
    pub content: &'a str,
    pub post: i64,
}
