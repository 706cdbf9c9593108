use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use url::Url;

use super::models::{Category, Comment, CredentialPair, NewComment, Post, PostDraft, TokenResponse, User};
use super::BlogApi;
use crate::auth::tokens::TokenHolder;
use crate::config::{AuthConfig, Config};
use crate::error::{flatten_validation_errors, ClientError, ClientResult};

const LOGIN_FAILED: &str = "Invalid username or password.";

/// Reqwest-backed [`BlogApi`].
///
/// Reads the access token from the [`TokenHolder`] on every request and never
/// writes to it; storing credentials is the session store's job.
pub struct HttpBlogApi {
    client: Client,
    base: Url,
    tokens: TokenHolder,
    auth: AuthConfig,
}

impl HttpBlogApi {
    pub fn new(config: &Config, tokens: TokenHolder) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.server.timeout_secs.max(1)))
            .build()?;
        Ok(Self {
            client,
            base: config.base_url()?,
            tokens,
            auth: config.auth.clone(),
        })
    }

    /// `base` + percent-encoded segments + trailing slash.
    fn url(&self, segments: &[&str]) -> ClientResult<Url> {
        self.join(segments, true)
    }

    /// A path from configuration, keeping its trailing slash (or lack of one).
    fn configured_url(&self, path: &str) -> ClientResult<Url> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        self.join(&segments, path.ends_with('/'))
    }

    fn join(&self, segments: &[&str], trailing_slash: bool) -> ClientResult<Url> {
        let mut url = self.base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| ClientError::Config("base_url cannot be a base".into()))?;
            path.pop_if_empty().extend(segments);
            if trailing_slash {
                path.push("");
            }
        }
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> ClientResult<RequestBuilder> {
        Ok(match self.tokens.get()? {
            Some(pair) => request.bearer_auth(pair.access_token),
            None => request,
        })
    }

    async fn send(&self, request: RequestBuilder) -> ClientResult<Response> {
        let request = request.build()?;
        tracing::debug!(method = %request.method(), url = %request.url(), "api request");
        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;
        check_status(response).await
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> ClientResult<T> {
        let response = self.send(request).await?;
        let body = response
            .bytes()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn fetch_posts(&self, request: RequestBuilder) -> ClientResult<Vec<Post>> {
        let posts: Vec<Post> = self.fetch(self.authorized(request)?).await?;
        posts.into_iter().map(Post::validate).collect()
    }
}

#[async_trait]
impl BlogApi for HttpBlogApi {
    async fn login(&self, login: &str, password: &str) -> ClientResult<CredentialPair> {
        let mut body = Map::new();
        body.insert(self.auth.login_field.clone(), json!(login));
        body.insert("password".to_string(), json!(password));

        let request = self
            .client
            .post(self.configured_url(&self.auth.login_path)?)
            .json(&body)
            .build()?;
        tracing::debug!(url = %request.url(), "login request");
        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;
        if status.is_success() {
            let tokens: TokenResponse = serde_json::from_slice(&bytes)?;
            return tokens.into_pair("");
        }
        if status.is_client_error() {
            return Err(ClientError::Validation(login_failure_message(&bytes)));
        }
        Err(ClientError::Server(status.as_u16()))
    }

    async fn refresh(&self, refresh_token: &str) -> ClientResult<CredentialPair> {
        let request = self
            .client
            .post(self.configured_url(&self.auth.refresh_path)?)
            .json(&json!({ "refresh": refresh_token }));
        let tokens: TokenResponse = self.fetch(request).await?;
        tokens.into_pair(refresh_token)
    }

    async fn register(&self, username: &str, password: &str) -> ClientResult<User> {
        let request = self
            .client
            .post(self.configured_url(&self.auth.register_path)?)
            .json(&json!({ "username": username, "password": password }));
        let user: User = self.fetch(request).await?;
        user.validate()
    }

    async fn me(&self) -> ClientResult<User> {
        let request = self.authorized(self.client.get(self.url(&["api", "me"])?))?;
        let user: User = self.fetch(request).await?;
        user.validate()
    }

    async fn list_posts(&self, search: Option<&str>) -> ClientResult<Vec<Post>> {
        let mut request = self.client.get(self.url(&["api", "posts"])?);
        if let Some(query) = search.map(str::trim).filter(|q| !q.is_empty()) {
            request = request.query(&[("search", query)]);
        }
        self.fetch_posts(request).await
    }

    async fn posts_by_category(&self, category: &str) -> ClientResult<Vec<Post>> {
        let request = self
            .client
            .get(self.url(&["api", "posts", "category", category])?);
        self.fetch_posts(request).await
    }

    async fn get_post(&self, slug: &str) -> ClientResult<Post> {
        let request = self.authorized(self.client.get(self.url(&["api", "posts", slug])?))?;
        let post: Post = self.fetch(request).await?;
        post.validate()
    }

    async fn create_post(&self, draft: &PostDraft) -> ClientResult<Post> {
        let form = post_form(draft).await?;
        let request = self.authorized(self.client.post(self.url(&["api", "posts"])?))?;
        let post: Post = self.fetch(request.multipart(form)).await?;
        post.validate()
    }

    async fn update_post(&self, slug: &str, draft: &PostDraft) -> ClientResult<Post> {
        let form = post_form(draft).await?;
        let request = self.authorized(self.client.put(self.url(&["api", "posts", slug])?))?;
        let post: Post = self.fetch(request.multipart(form)).await?;
        post.validate()
    }

    async fn delete_post(&self, slug: &str) -> ClientResult<()> {
        let request = self.authorized(self.client.delete(self.url(&["api", "posts", slug])?))?;
        self.send(request).await?;
        Ok(())
    }

    async fn list_categories(&self) -> ClientResult<Vec<Category>> {
        let request = self.client.get(self.url(&["api", "categories"])?);
        self.fetch(request).await
    }

    async fn list_comments(&self, post_id: i64) -> ClientResult<Vec<Comment>> {
        let id = post_id.to_string();
        let request = self.authorized(
            self.client
                .get(self.url(&["api", "posts", &id, "comments"])?),
        )?;
        self.fetch(request).await
    }

    async fn create_comment(&self, post_id: i64, content: &str) -> ClientResult<Comment> {
        let id = post_id.to_string();
        let request = self.authorized(
            self.client
                .post(self.url(&["api", "posts", &id, "comments"])?)
                .json(&NewComment {
                    content,
                    post: post_id,
                }),
        )?;
        self.fetch(request).await
    }
}

async fn check_status(response: Response) -> ClientResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    match status {
        StatusCode::UNAUTHORIZED => Err(ClientError::Unauthorized),
        StatusCode::FORBIDDEN => Err(ClientError::Forbidden),
        StatusCode::NOT_FOUND => Err(ClientError::NotFound),
        s if s.is_client_error() => {
            let body = response
                .bytes()
                .await
                .map_err(|e| ClientError::Network(e.to_string()))?;
            let value: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
            Err(ClientError::Validation(flatten_validation_errors(&value)))
        }
        s => {
            tracing::warn!(status = s.as_u16(), "unexpected status from server");
            Err(ClientError::Server(s.as_u16()))
        }
    }
}

fn login_failure_message(body: &[u8]) -> String {
    let value: Value = serde_json::from_slice(body).unwrap_or(Value::Null);
    ["detail", "message"]
        .iter()
        .find_map(|key| value.get(key).and_then(Value::as_str))
        .filter(|msg| !msg.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| LOGIN_FAILED.to_string())
}

/// Multipart body for create/edit. The image part is only attached when a
/// new file was chosen, so an edit without one keeps the current image.
async fn post_form(draft: &PostDraft) -> ClientResult<Form> {
    let mut form = Form::new()
        .text("title", draft.title.clone())
        .text("content", draft.content.clone())
        .text("category", draft.category.clone());

    if let Some(path) = &draft.image {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            ClientError::Validation(format!("Could not read image {}: {e}", path.display()))
        })?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        let mime = mime_guess::from_path(path).first_or_octet_stream();
        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime.essence_str())?;
        form = form.part("image", part);
    }

    Ok(form)
}
