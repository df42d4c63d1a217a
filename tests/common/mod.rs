#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use yatube::app::auth::{AuthService, NewUser};
use yatube::app::comments::CommentService;
use yatube::app::groups::GroupService;
use yatube::app::posts::PostService;
use yatube::config::AppConfig;
use yatube::domain::group::Group;
use yatube::domain::post::Post;
use yatube::AppState;

pub const DEFAULT_PASSWORD: &str = "testpassword123";

/// A 1x1 GIF, small enough to inline.
pub const SMALL_GIF: &[u8] = b"\x47\x49\x46\x38\x39\x61\x01\x00\x01\x00\x00\x00\x00\x21\xf9\x04\x01\x0a\x00\x01\x00\x2c\x00\x00\x00\x00\x01\x00\x01\x00\x00\x02\x02\x4c\x01\x00\x3b";

const BOUNDARY: &str = "yatube-test-boundary";

// ---------------------------------------------------------------------------
// TestApp: one SQLite file and media root per test
// ---------------------------------------------------------------------------

pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub dir: TempDir,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    body_bytes: bytes::Bytes,
}

impl TestResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body_bytes).into_owned()
    }

    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body_bytes).unwrap_or(Value::Null)
    }

    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
    }

    /// The `sessionid=...` pair from `Set-Cookie`, ready to send back.
    pub fn session_cookie(&self) -> Option<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|value| value.split(';').next())
            .find(|pair| pair.starts_with("sessionid="))
            .map(str::to_string)
    }

    pub fn assert_redirect(&self, location: &str) {
        assert_eq!(self.status, StatusCode::FOUND, "body: {}", self.text());
        assert_eq!(self.location(), Some(location));
    }
}

pub struct TestUser {
    pub id: i64,
    pub username: String,
    pub cookie: String,
}

pub enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        name: &'a str,
        file_name: &'a str,
        content_type: &'a str,
        bytes: &'a [u8],
    },
}

pub async fn app() -> TestApp {
    TestApp::setup(|_| {}).await
}

impl TestApp {
    pub async fn setup(tweak: impl FnOnce(&mut AppConfig)) -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");

        // Built directly rather than via from_env: tests run in parallel.
        let mut config = AppConfig {
            database_url: format!("sqlite://{}", dir.path().join("yatube.sqlite3").display()),
            media_root: dir.path().join("media"),
            ..AppConfig::default()
        };
        tweak(&mut config);

        let state = AppState::from_config(&config)
            .await
            .expect("AppState::from_config failed");
        let router = yatube::http::router(state.clone());

        TestApp { router, state, dir }
    }

    // ------------------------------------------------------------------
    // Low-level request helper
    // ------------------------------------------------------------------
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Body,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("host", "localhost");

        for &(key, value) in headers {
            builder = builder.header(key, value);
        }

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .expect("oneshot failed");

        let status = response.status();
        let headers = response.headers().clone();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("failed to collect body")
            .to_bytes();

        TestResponse {
            status,
            headers,
            body_bytes,
        }
    }

    // ------------------------------------------------------------------
    // Convenience HTTP helpers
    // ------------------------------------------------------------------
    pub async fn get(&self, path: &str, user: Option<&TestUser>) -> TestResponse {
        let mut headers = vec![];
        if let Some(user) = user {
            headers.push(("cookie", user.cookie.as_str()));
        }
        self.request(Method::GET, path, Body::empty(), &headers).await
    }

    pub async fn post_form(
        &self,
        path: &str,
        fields: &[(&str, &str)],
        user: Option<&TestUser>,
    ) -> TestResponse {
        let body: String = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();

        let mut headers = vec![("content-type", "application/x-www-form-urlencoded")];
        if let Some(user) = user {
            headers.push(("cookie", user.cookie.as_str()));
        }
        self.request(Method::POST, path, Body::from(body), &headers)
            .await
    }

    pub async fn post_multipart(
        &self,
        path: &str,
        parts: &[Part<'_>],
        user: Option<&TestUser>,
    ) -> TestResponse {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match part {
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                            .as_bytes(),
                    );
                    body.extend_from_slice(value.as_bytes());
                }
                Part::File {
                    name,
                    file_name,
                    content_type,
                    bytes,
                } => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                             Content-Type: {}\r\n\r\n",
                            name, file_name, content_type
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(bytes);
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        let content_type = format!("multipart/form-data; boundary={}", BOUNDARY);
        let mut headers = vec![("content-type", content_type.as_str())];
        if let Some(user) = user {
            headers.push(("cookie", user.cookie.as_str()));
        }
        self.request(Method::POST, path, Body::from(body), &headers)
            .await
    }

    // ------------------------------------------------------------------
    // Test data helpers
    // ------------------------------------------------------------------

    /// Signs a user up through the service and opens a session for them.
    pub async fn create_user(&self, username: &str) -> TestUser {
        let auth = AuthService::new(self.state.db.clone(), self.state.session_ttl_days);
        let user = auth
            .signup(NewUser {
                username: username.to_string(),
                first_name: String::new(),
                last_name: String::new(),
                email: format!("{}@example.com", username),
                password: DEFAULT_PASSWORD.to_string(),
            })
            .await
            .expect("signup failed")
            .expect("username already taken");
        let token = auth
            .start_session(user.id)
            .await
            .expect("start_session failed");

        TestUser {
            id: user.id,
            username: user.username,
            cookie: format!("sessionid={}", token),
        }
    }

    pub async fn create_group(&self, title: &str, slug: &str) -> Group {
        GroupService::new(self.state.db.clone())
            .create(title, slug, "Test group description")
            .await
            .expect("create group failed")
    }

    pub async fn create_post(&self, author: &TestUser, text: &str, group: Option<&Group>) -> Post {
        PostService::new(self.state.db.clone())
            .create(author.id, text.to_string(), group.map(|g| g.id), None)
            .await
            .expect("create post failed")
    }

    pub async fn post_count(&self) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM posts")
            .fetch_one(self.state.db.pool())
            .await
            .expect("count posts failed")
    }

    pub async fn comment_count(&self, post_id: i64) -> i64 {
        CommentService::new(self.state.db.clone())
            .count_for_post(post_id)
            .await
            .expect("count comments failed")
    }

    pub async fn follow_count(&self) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM follows")
            .fetch_one(self.state.db.pool())
            .await
            .expect("count follows failed")
    }
}

/// Number of post cards on a rendered listing page.
pub fn post_cards(html: &str) -> usize {
    html.matches("class=\"post-card\"").count()
}
