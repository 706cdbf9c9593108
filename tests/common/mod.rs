//! In-process stand-in for the blog REST backend.
//!
//! Speaks the same JSON shapes as the real server and records every request
//! it sees so tests can assert on traffic, not just on results.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::extract::{Multipart, Path, Query, Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower_http::trace::TraceLayer;

use superblog::config::Config;
use superblog::db;
use superblog::state::AppState;

pub const CREATED_AT: &str = "2024-05-01T10:00:00Z";

#[derive(Debug, Clone, PartialEq)]
pub struct RequestLog {
    /// `METHOD /path?query`
    pub line: String,
    pub bearer: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Upload {
    pub fields: HashMap<String, String>,
    pub image: Option<(String, String, usize)>,
}

struct Account {
    id: i64,
    username: String,
    password: String,
    is_staff: bool,
}

#[derive(Default)]
pub struct Backend {
    requests: Vec<RequestLog>,
    accounts: Vec<Account>,
    access: HashMap<String, i64>,
    refresh: HashMap<String, i64>,
    posts: Vec<Value>,
    comments: Vec<Value>,
    categories: Vec<Value>,
    uploads: Vec<Upload>,
    next_id: i64,
    issued: u64,
}

impl Backend {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        1000 + self.next_id
    }

    fn user_json(account: &Account) -> Value {
        json!({
            "id": account.id,
            "username": account.username,
            "is_staff": account.is_staff,
        })
    }

    fn account(&self, id: i64) -> Option<&Account> {
        self.accounts.iter().find(|a| a.id == id)
    }

    fn caller(&self, headers: &HeaderMap) -> Option<&Account> {
        let token = bearer(headers)?;
        let id = *self.access.get(&token)?;
        self.account(id)
    }

    fn post_mut(&mut self, slug: &str) -> Option<&mut Value> {
        self.posts.iter_mut().find(|p| p["slug"] == slug)
    }
}

#[derive(Clone, Default)]
pub struct MockBlog(Arc<Mutex<Backend>>);

impl MockBlog {
    fn lock(&self) -> MutexGuard<'_, Backend> {
        self.0.lock().unwrap()
    }

    pub fn add_user(&self, id: i64, username: &str, password: &str, is_staff: bool) {
        self.lock().accounts.push(Account {
            id,
            username: username.to_string(),
            password: password.to_string(),
            is_staff,
        });
    }

    pub fn add_category(&self, id: i64, name: &str) {
        self.lock().categories.push(json!({"id": id, "name": name}));
    }

    pub fn add_post(&self, id: i64, slug: &str, title: &str, content: &str, category: &str, owner: i64) {
        self.lock().posts.push(json!({
            "id": id,
            "slug": slug,
            "title": title,
            "content": content,
            "category": category,
            "image": null,
            "user": owner,
            "created_at": CREATED_AT,
            "comment_count": 0,
        }));
    }

    pub fn add_comment(&self, id: i64, post_id: i64, username: &str, content: &str) {
        self.lock().comments.push(json!({
            "id": id,
            "post": post_id,
            "user": username,
            "content": content,
            "created_at": CREATED_AT,
        }));
    }

    /// Invalidate every issued access token; refresh tokens stay valid.
    pub fn expire_access_tokens(&self) {
        self.lock().access.clear();
    }

    pub fn requests(&self) -> Vec<RequestLog> {
        self.lock().requests.clone()
    }

    pub fn lines(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.line).collect()
    }

    pub fn count(&self, line: &str) -> usize {
        self.lines().iter().filter(|l| *l == line).count()
    }

    pub fn uploads(&self) -> Vec<Upload> {
        self.lock().uploads.clone()
    }

    pub fn post(&self, slug: &str) -> Option<Value> {
        self.lock().posts.iter().find(|p| p["slug"] == slug).cloned()
    }

    pub async fn serve(&self) -> String {
        let app = Router::new()
            .route("/api/token/", post(login))
            .route("/api/token/refresh/", post(refresh))
            .route("/api/user/register/", post(register))
            .route("/api/me/", get(me))
            .route("/api/posts/", get(list_posts).post(create_post))
            .route("/api/posts/category/{name}/", get(posts_by_category))
            .route(
                "/api/posts/{key}/",
                get(get_post).put(update_post).delete(delete_post),
            )
            .route(
                "/api/posts/{key}/comments/",
                get(list_comments).post(create_comment),
            )
            .route("/api/categories/", get(list_categories))
            .layer(middleware::from_fn_with_state(self.clone(), record))
            .layer(TraceLayer::new_for_http())
            .with_state(self.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }
}

/// A client wired to `base_url` with its own on-disk token store.
pub fn client(base_url: &str, dir: &TempDir) -> AppState {
    let mut config = Config::default();
    config.server.base_url = base_url.to_string();
    config.storage.path = Some(dir.path().join("superblog.db"));
    let pool = db::create_pool(config.db_path().unwrap()).unwrap();
    db::run_migrations(&pool).unwrap();
    AppState::new(config, pool).unwrap()
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

fn reply(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

fn not_found() -> Response {
    reply(StatusCode::NOT_FOUND, json!({"detail": "Not found."}))
}

fn unauthorized() -> Response {
    reply(
        StatusCode::UNAUTHORIZED,
        json!({"detail": "Authentication credentials were not provided."}),
    )
}

fn forbidden() -> Response {
    reply(
        StatusCode::FORBIDDEN,
        json!({"detail": "You do not have permission to perform this action."}),
    )
}

fn slugify(title: &str) -> String {
    title
        .to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

async fn record(State(blog): State<MockBlog>, request: Request, next: Next) -> Response {
    let line = match request.uri().query() {
        Some(query) => format!("{} {}?{}", request.method(), request.uri().path(), query),
        None => format!("{} {}", request.method(), request.uri().path()),
    };
    let entry = RequestLog {
        line,
        bearer: bearer(request.headers()),
    };
    blog.lock().requests.push(entry);
    next.run(request).await
}

async fn login(State(blog): State<MockBlog>, Json(body): Json<Value>) -> Response {
    let mut backend = blog.lock();
    let username = body["username"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();
    let Some(id) = backend
        .accounts
        .iter()
        .find(|a| a.username == username && a.password == password)
        .map(|a| a.id)
    else {
        return reply(
            StatusCode::UNAUTHORIZED,
            json!({"detail": "No active account found with the given credentials"}),
        );
    };
    backend.issued += 1;
    let access = format!("access-{id}-{}", backend.issued);
    let refresh = format!("refresh-{id}");
    backend.access.insert(access.clone(), id);
    backend.refresh.insert(refresh.clone(), id);
    reply(StatusCode::OK, json!({"access": access, "refresh": refresh}))
}

async fn refresh(State(blog): State<MockBlog>, Json(body): Json<Value>) -> Response {
    let mut backend = blog.lock();
    let token = body["refresh"].as_str().unwrap_or_default();
    let Some(id) = backend.refresh.get(token).copied() else {
        return reply(
            StatusCode::UNAUTHORIZED,
            json!({"detail": "Token is invalid or expired"}),
        );
    };
    backend.issued += 1;
    let access = format!("access-{id}-{}", backend.issued);
    backend.access.insert(access.clone(), id);
    reply(StatusCode::OK, json!({"access": access}))
}

async fn register(State(blog): State<MockBlog>, Json(body): Json<Value>) -> Response {
    let mut backend = blog.lock();
    let username = body["username"].as_str().unwrap_or_default().to_string();
    let password = body["password"].as_str().unwrap_or_default().to_string();

    let mut errors = serde_json::Map::new();
    if password.len() < 4 {
        errors.insert(
            "password".into(),
            json!(["Ensure this field has at least 4 characters."]),
        );
    }
    if backend.accounts.iter().any(|a| a.username == username) {
        errors.insert(
            "username".into(),
            json!(["A user with that username already exists."]),
        );
    }
    if !errors.is_empty() {
        return reply(StatusCode::BAD_REQUEST, Value::Object(errors));
    }

    let id = backend.next_id();
    backend.accounts.push(Account {
        id,
        username: username.clone(),
        password,
        is_staff: false,
    });
    reply(StatusCode::CREATED, json!({"id": id, "username": username}))
}

async fn me(State(blog): State<MockBlog>, headers: HeaderMap) -> Response {
    let backend = blog.lock();
    match backend.caller(&headers) {
        Some(account) => reply(StatusCode::OK, Backend::user_json(account)),
        None => unauthorized(),
    }
}

#[derive(Deserialize)]
struct SearchQuery {
    search: Option<String>,
}

async fn list_posts(State(blog): State<MockBlog>, Query(query): Query<SearchQuery>) -> Response {
    let backend = blog.lock();
    let needle = query.search.unwrap_or_default().to_lowercase();
    let posts: Vec<Value> = backend
        .posts
        .iter()
        .filter(|p| {
            needle.is_empty()
                || p["title"].as_str().unwrap_or_default().to_lowercase().contains(&needle)
                || p["content"].as_str().unwrap_or_default().to_lowercase().contains(&needle)
        })
        .cloned()
        .collect();
    reply(StatusCode::OK, Value::Array(posts))
}

async fn posts_by_category(State(blog): State<MockBlog>, Path(name): Path<String>) -> Response {
    let backend = blog.lock();
    let posts: Vec<Value> = backend
        .posts
        .iter()
        .filter(|p| p["category"] == name.as_str())
        .cloned()
        .collect();
    reply(StatusCode::OK, Value::Array(posts))
}

async fn get_post(State(blog): State<MockBlog>, Path(slug): Path<String>) -> Response {
    match blog.post(&slug) {
        Some(post) => reply(StatusCode::OK, post),
        None => not_found(),
    }
}

async fn read_form(mut multipart: Multipart) -> Upload {
    let mut upload = Upload::default();
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        if name == "image" {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let content_type = field.content_type().unwrap_or_default().to_string();
            let bytes = field.bytes().await.unwrap();
            upload.image = Some((file_name, content_type, bytes.len()));
        } else {
            upload.fields.insert(name, field.text().await.unwrap());
        }
    }
    upload
}

fn validate_form(upload: &Upload) -> Option<Value> {
    let mut errors = serde_json::Map::new();
    let content = upload.fields.get("content").cloned().unwrap_or_default();
    let title = upload.fields.get("title").cloned().unwrap_or_default();
    if content.chars().count() < 5 {
        errors.insert(
            "content".into(),
            json!(["Ensure this field has at least 5 characters."]),
        );
    }
    if title.chars().count() > 50 {
        errors.insert(
            "title".into(),
            json!(["Ensure this field has no more than 50 characters."]),
        );
    }
    (!errors.is_empty()).then_some(Value::Object(errors))
}

async fn create_post(
    State(blog): State<MockBlog>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Response {
    let upload = read_form(multipart).await;
    let mut backend = blog.lock();
    backend.uploads.push(upload.clone());
    let Some(owner) = backend.caller(&headers).map(|a| a.id) else {
        return unauthorized();
    };
    if let Some(errors) = validate_form(&upload) {
        return reply(StatusCode::BAD_REQUEST, errors);
    }

    let id = backend.next_id();
    let title = upload.fields.get("title").cloned().unwrap_or_default();
    let image = upload
        .image
        .as_ref()
        .map(|(name, _, _)| format!("/media/{name}"));
    let post = json!({
        "id": id,
        "slug": slugify(&title),
        "title": title,
        "content": upload.fields.get("content").cloned().unwrap_or_default(),
        "category": upload.fields.get("category").cloned().unwrap_or_default(),
        "image": image,
        "user": owner,
        "created_at": CREATED_AT,
        "comment_count": 0,
    });
    backend.posts.push(post.clone());
    reply(StatusCode::CREATED, post)
}

async fn update_post(
    State(blog): State<MockBlog>,
    Path(slug): Path<String>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Response {
    let upload = read_form(multipart).await;
    let mut backend = blog.lock();
    backend.uploads.push(upload.clone());
    let Some(caller) = backend.caller(&headers).map(|a| a.id) else {
        return unauthorized();
    };
    if let Some(errors) = validate_form(&upload) {
        return reply(StatusCode::BAD_REQUEST, errors);
    }
    let Some(post) = backend.post_mut(&slug) else {
        return not_found();
    };
    if post["user"] != caller {
        return forbidden();
    }
    for key in ["title", "content", "category"] {
        if let Some(value) = upload.fields.get(key) {
            post[key] = json!(value);
        }
    }
    if let Some((name, _, _)) = &upload.image {
        post["image"] = json!(format!("/media/{name}"));
    }
    let post = post.clone();
    reply(StatusCode::OK, post)
}

async fn delete_post(
    State(blog): State<MockBlog>,
    Path(slug): Path<String>,
    headers: HeaderMap,
) -> Response {
    let mut backend = blog.lock();
    let Some((caller, is_staff)) = backend.caller(&headers).map(|a| (a.id, a.is_staff)) else {
        return unauthorized();
    };
    let Some(index) = backend.posts.iter().position(|p| p["slug"] == slug.as_str()) else {
        return not_found();
    };
    if backend.posts[index]["user"] != caller && !is_staff {
        return forbidden();
    }
    backend.posts.remove(index);
    StatusCode::NO_CONTENT.into_response()
}

async fn list_categories(State(blog): State<MockBlog>) -> Response {
    reply(StatusCode::OK, Value::Array(blog.lock().categories.clone()))
}

async fn list_comments(State(blog): State<MockBlog>, Path(key): Path<i64>) -> Response {
    let backend = blog.lock();
    let comments: Vec<Value> = backend
        .comments
        .iter()
        .filter(|c| c["post"] == key)
        .cloned()
        .collect();
    reply(StatusCode::OK, Value::Array(comments))
}

async fn create_comment(
    State(blog): State<MockBlog>,
    Path(key): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut backend = blog.lock();
    let Some(author) = backend.caller(&headers).map(|a| a.username.clone()) else {
        return unauthorized();
    };
    let content = body["content"].as_str().unwrap_or_default().to_string();
    if content.trim().is_empty() {
        return reply(
            StatusCode::BAD_REQUEST,
            json!({"content": ["This field may not be blank."]}),
        );
    }
    let Some(post) = backend.posts.iter_mut().find(|p| p["id"] == key) else {
        return not_found();
    };
    let count = post["comment_count"].as_u64().unwrap_or_default();
    post["comment_count"] = json!(count + 1);

    let id = backend.next_id();
    let comment = json!({
        "id": id,
        "post": key,
        "user": author,
        "content": content,
        "created_at": CREATED_AT,
    });
    backend.comments.insert(0, comment.clone());
    reply(StatusCode::CREATED, comment)
}
