use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, HeaderMap, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    Form, Json,
};
use serde::{Deserialize, Serialize};
use tera::Context;

use crate::app::auth::{AuthService, NewUser};
use crate::app::comments::CommentService;
use crate::app::feed::FeedService;
use crate::app::groups::GroupService;
use crate::app::posts::PostService;
use crate::app::social::SocialService;
use crate::app::users::UserService;
use crate::domain::post::{Post, PostFilter};
use crate::domain::user::{AuthorRef, User};
use crate::http::auth::{expired_session_cookie, safe_next, session_cookie, session_token};
use crate::http::forms::{
    CleanPost, CommentForm, CommentFormView, FormErrors, LoginForm, LoginFormView,
    PostFormView, PostSubmission, SignupForm, INVALID_CHOICE, INVALID_LOGIN, USERNAME_TAKEN,
};
use crate::http::{AppError, AuthUser};
use crate::infra::templates;
use crate::AppState;

const UPLOAD_DIR: &str = "posts";

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
    database: bool,
    cache: bool,
}

#[derive(Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

#[derive(Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

fn profile_url(username: &str) -> String {
    format!("/profile/{}/", username)
}

fn post_url(post_id: i64) -> String {
    format!("/posts/{}/", post_id)
}

/// Every page gets the signed-in user, if any, for the header.
fn page_context(auth: Option<&AuthUser>) -> Context {
    let mut context = Context::new();
    if let Some(auth) = auth {
        context.insert("user", &AuthorRef::from(&auth.user));
    }
    context
}

fn render(template: &str, context: &Context) -> Result<Html<String>, AppError> {
    templates::render(template, context).map(Html).map_err(|err| {
        tracing::error!(error = ?err, template, "failed to render template");
        AppError::internal("failed to render page")
    })
}

fn internal(what: &'static str) -> impl FnOnce(anyhow::Error) -> AppError {
    move |err| {
        tracing::error!(error = ?err, "failed to {}", what);
        AppError::internal(format!("failed to {}", what))
    }
}

/// Path ids that are not integers name nothing.
fn parse_post_id(raw: &str) -> Result<i64, AppError> {
    raw.parse::<i64>()
        .map_err(|_| AppError::not_found("post not found"))
}

async fn load_post(state: &AppState, raw_id: &str) -> Result<Post, AppError> {
    let post_id = parse_post_id(raw_id)?;
    PostService::new(state.db.clone())
        .get(post_id)
        .await
        .map_err(internal("load post"))?
        .ok_or_else(|| AppError::not_found("post not found"))
}

async fn load_author(state: &AppState, username: &str) -> Result<User, AppError> {
    UserService::new(state.db.clone())
        .get_by_username(username)
        .await
        .map_err(internal("load user"))?
        .ok_or_else(|| AppError::not_found("user not found"))
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = state.db.ping().await.is_ok();
    let cache = state.cache.ping().await.is_ok();
    let status = if database && cache { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        database,
        cache,
    })
}

pub async fn index(
    State(state): State<AppState>,
    auth: Option<AuthUser>,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>, AppError> {
    let page = PostService::new(state.db.clone())
        .page(PostFilter::All, query.page.as_deref(), state.posts_per_page)
        .await
        .map_err(internal("list posts"))?;

    let mut context = page_context(auth.as_ref());
    context.insert("page_obj", &page);
    render("posts/index.html", &context)
}

pub async fn group_posts(
    State(state): State<AppState>,
    auth: Option<AuthUser>,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>, AppError> {
    let group = GroupService::new(state.db.clone())
        .get_by_slug(&slug)
        .await
        .map_err(internal("load group"))?
        .ok_or_else(|| AppError::not_found("group not found"))?;

    let page = PostService::new(state.db.clone())
        .page(
            PostFilter::Group(group.id),
            query.page.as_deref(),
            state.posts_per_page,
        )
        .await
        .map_err(internal("list group posts"))?;

    let mut context = page_context(auth.as_ref());
    context.insert("group", &group);
    context.insert("page_obj", &page);
    render("posts/group_list.html", &context)
}

pub async fn profile(
    State(state): State<AppState>,
    auth: Option<AuthUser>,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>, AppError> {
    let author = load_author(&state, &username).await?;

    let page = PostService::new(state.db.clone())
        .page(
            PostFilter::Author(author.id),
            query.page.as_deref(),
            state.posts_per_page,
        )
        .await
        .map_err(internal("list profile posts"))?;

    let social = SocialService::new(state.db.clone());
    let followers = social
        .follower_count(author.id)
        .await
        .map_err(internal("count followers"))?;
    let following_count = social
        .following_count(author.id)
        .await
        .map_err(internal("count followed authors"))?;

    let viewer_id = auth.as_ref().map(|auth| auth.user.id);
    let is_self = viewer_id == Some(author.id);
    let following = match viewer_id {
        Some(viewer_id) if !is_self => social
            .is_following(viewer_id, author.id)
            .await
            .map_err(internal("check follow"))?,
        _ => false,
    };

    let mut context = page_context(auth.as_ref());
    context.insert("author", &AuthorRef::from(&author));
    context.insert("counter", &page.count);
    context.insert("page_obj", &page);
    context.insert("followers", &followers);
    context.insert("following_count", &following_count);
    context.insert("following", &following);
    context.insert("is_self", &is_self);
    render("posts/profile.html", &context)
}

pub async fn post_detail(
    State(state): State<AppState>,
    auth: Option<AuthUser>,
    Path(post_id): Path<String>,
) -> Result<Html<String>, AppError> {
    let post = load_post(&state, &post_id).await?;

    let counter = UserService::new(state.db.clone())
        .post_count(post.author.id)
        .await
        .map_err(internal("count author posts"))?;
    let comments = CommentService::new(state.db.clone())
        .list_for_post(post.id)
        .await
        .map_err(internal("list comments"))?;

    let can_edit = auth.as_ref().map(|auth| auth.user.id) == Some(post.author.id);

    let mut context = page_context(auth.as_ref());
    context.insert("title", &post.title());
    context.insert("author", &post.author);
    context.insert("counter", &counter);
    context.insert("comments", &comments);
    context.insert("form", &CommentFormView::default());
    context.insert("can_edit", &can_edit);
    context.insert("post", &post);
    render("posts/post_detail.html", &context)
}

async fn render_post_form(
    state: &AppState,
    auth: &AuthUser,
    form: &PostFormView,
    edit_of: Option<i64>,
) -> Result<Html<String>, AppError> {
    let groups = GroupService::new(state.db.clone())
        .list()
        .await
        .map_err(internal("list groups"))?;

    let mut context = page_context(Some(auth));
    context.insert("form", form);
    context.insert("groups", &groups);
    context.insert("is_edit", &edit_of.is_some());
    if let Some(post_id) = edit_of {
        context.insert("post_id", &post_id);
    }
    render("posts/create_post.html", &context)
}

/// Validates a create/edit submission. `Err` carries the form to show again.
async fn clean_post(
    state: &AppState,
    submission: PostSubmission,
    current_image: Option<String>,
) -> Result<Result<CleanPost, PostFormView>, AppError> {
    let (errors, submission) = match submission.clean() {
        Ok(clean) => match clean.group_id {
            None => return Ok(Ok(clean)),
            Some(group_id) => {
                let exists = GroupService::new(state.db.clone())
                    .get(group_id)
                    .await
                    .map_err(internal("load group"))?
                    .is_some();
                if exists {
                    return Ok(Ok(clean));
                }
                let mut errors = FormErrors::default();
                errors.add("group", INVALID_CHOICE);
                let submission = PostSubmission {
                    text: clean.text,
                    group: group_id.to_string(),
                    image: clean.image,
                };
                (errors, submission)
            }
        },
        Err((errors, submission)) => (errors, submission),
    };

    Ok(Err(PostFormView::rejected(&submission, errors, current_image)))
}

async fn store_image(state: &AppState, clean: &CleanPost) -> Result<Option<String>, AppError> {
    match &clean.image {
        Some(image) => state
            .storage
            .save(UPLOAD_DIR, &image.file_name, &image.bytes)
            .await
            .map(Some)
            .map_err(internal("store image")),
        None => Ok(None),
    }
}

/// Removes a freshly stored image whose post never made it to the database.
async fn discard_image(state: &AppState, stored: Option<&str>) {
    if let Some(path) = stored {
        if let Err(err) = state.storage.delete(path).await {
            tracing::warn!(error = ?err, path, "failed to delete orphaned image");
        }
    }
}

pub async fn post_create_form(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Html<String>, AppError> {
    render_post_form(&state, &auth, &PostFormView::default(), None).await
}

pub async fn post_create(
    State(state): State<AppState>,
    auth: AuthUser,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let submission = PostSubmission::from_multipart(multipart).await?;
    let clean = match clean_post(&state, submission, None).await? {
        Ok(clean) => clean,
        Err(form) => {
            return Ok(render_post_form(&state, &auth, &form, None)
                .await?
                .into_response())
        }
    };

    let image = store_image(&state, &clean).await?;
    let created = PostService::new(state.db.clone())
        .create(auth.user.id, clean.text, clean.group_id, image.clone())
        .await;
    let post = match created {
        Ok(post) => post,
        Err(err) => {
            discard_image(&state, image.as_deref()).await;
            return Err(internal("create post")(err));
        }
    };

    tracing::info!(post_id = post.id, author_id = auth.user.id, "post created");
    Ok(found(&profile_url(&auth.user.username)))
}

pub async fn post_edit_form(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(post_id): Path<String>,
) -> Result<Response, AppError> {
    let post = load_post(&state, &post_id).await?;
    if post.author.id != auth.user.id {
        return Ok(found(&post_url(post.id)));
    }

    let form = PostFormView {
        text: post.text.clone(),
        group: post.group.as_ref().map(|group| group.id),
        image: post.image.clone(),
        errors: FormErrors::default(),
    };
    Ok(render_post_form(&state, &auth, &form, Some(post.id))
        .await?
        .into_response())
}

pub async fn post_edit(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(post_id): Path<String>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let post = load_post(&state, &post_id).await?;
    if post.author.id != auth.user.id {
        return Ok(found(&post_url(post.id)));
    }

    let submission = PostSubmission::from_multipart(multipart).await?;
    let clean = match clean_post(&state, submission, post.image.clone()).await? {
        Ok(clean) => clean,
        Err(form) => {
            return Ok(render_post_form(&state, &auth, &form, Some(post.id))
                .await?
                .into_response())
        }
    };

    let image = store_image(&state, &clean).await?;
    let replaced = image.is_some();
    let updated = PostService::new(state.db.clone())
        .update(post.id, clean.text, clean.group_id, image.clone())
        .await;
    if let Err(err) = updated {
        discard_image(&state, image.as_deref()).await;
        return Err(internal("update post")(err));
    }

    if let (true, Some(old)) = (replaced, post.image.as_deref()) {
        if let Err(err) = state.storage.delete(old).await {
            tracing::warn!(error = ?err, path = old, "failed to delete replaced image");
        }
    }

    Ok(found(&post_url(post.id)))
}

pub async fn post_delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(post_id): Path<String>,
) -> Result<Response, AppError> {
    let post = load_post(&state, &post_id).await?;
    if post.author.id != auth.user.id {
        return Ok(found(&post_url(post.id)));
    }

    PostService::new(state.db.clone())
        .delete(post.id, auth.user.id)
        .await
        .map_err(internal("delete post"))?;

    if let Some(image) = post.image.as_deref() {
        if let Err(err) = state.storage.delete(image).await {
            tracing::warn!(error = ?err, path = image, "failed to delete post image");
        }
    }

    tracing::info!(post_id = post.id, author_id = auth.user.id, "post deleted");
    Ok(found(&profile_url(&auth.user.username)))
}

/// GET lands back on the post; only POST writes.
pub async fn add_comment_redirect(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(post_id): Path<String>,
) -> Result<Response, AppError> {
    let post = load_post(&state, &post_id).await?;
    Ok(found(&post_url(post.id)))
}

pub async fn add_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(post_id): Path<String>,
    Form(form): Form<CommentForm>,
) -> Result<Response, AppError> {
    let post = load_post(&state, &post_id).await?;

    match form.clean() {
        Ok(text) => {
            CommentService::new(state.db.clone())
                .create(post.id, auth.user.id, text)
                .await
                .map_err(internal("create comment"))?;
        }
        Err(errors) => {
            tracing::debug!(post_id = post.id, ?errors, "comment rejected");
        }
    }

    Ok(found(&post_url(post.id)))
}

pub async fn follow_index(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>, AppError> {
    let page = FeedService::new(state.db.clone(), state.posts_per_page)
        .follow_feed(auth.user.id, query.page.as_deref())
        .await
        .map_err(internal("load follow feed"))?;

    let mut context = page_context(Some(&auth));
    context.insert("page_obj", &page);
    render("posts/follow.html", &context)
}

pub async fn profile_follow(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(username): Path<String>,
) -> Result<Response, AppError> {
    let author = load_author(&state, &username).await?;
    let created = SocialService::new(state.db.clone())
        .follow(auth.user.id, author.id)
        .await
        .map_err(internal("follow author"))?;

    if created {
        tracing::info!(user_id = auth.user.id, author_id = author.id, "followed");
    }
    Ok(found(&profile_url(&author.username)))
}

pub async fn profile_unfollow(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(username): Path<String>,
) -> Result<Response, AppError> {
    let author = load_author(&state, &username).await?;
    SocialService::new(state.db.clone())
        .unfollow(auth.user.id, author.id)
        .await
        .map_err(internal("unfollow author"))?;

    Ok(found(&profile_url(&author.username)))
}

pub async fn about_author(auth: Option<AuthUser>) -> Result<Html<String>, AppError> {
    render("about/author.html", &page_context(auth.as_ref()))
}

pub async fn about_tech(auth: Option<AuthUser>) -> Result<Html<String>, AppError> {
    render("about/tech.html", &page_context(auth.as_ref()))
}

fn render_signup(
    auth: Option<&AuthUser>,
    form: &SignupForm,
    errors: &FormErrors,
) -> Result<Html<String>, AppError> {
    let mut context = page_context(auth);
    context.insert("fields", &form.fields(errors));
    render("users/signup.html", &context)
}

pub async fn signup_form(auth: Option<AuthUser>) -> Result<Html<String>, AppError> {
    render_signup(auth.as_ref(), &SignupForm::default(), &FormErrors::default())
}

pub async fn signup(
    State(state): State<AppState>,
    auth: Option<AuthUser>,
    Form(mut form): Form<SignupForm>,
) -> Result<Response, AppError> {
    let mut errors = form.check();
    if !errors.is_empty() {
        return Ok(render_signup(auth.as_ref(), &form, &errors)?.into_response());
    }

    let created = AuthService::new(state.db.clone(), state.session_ttl_days)
        .signup(NewUser {
            username: form.username.clone(),
            first_name: form.first_name.clone(),
            last_name: form.last_name.clone(),
            email: form.email.clone().unwrap_or_default(),
            password: form.password1.clone(),
        })
        .await
        .map_err(internal("sign up"))?;

    match created {
        Some(user) => {
            tracing::info!(user_id = user.id, "user signed up");
            Ok(found("/"))
        }
        None => {
            errors.add("username", USERNAME_TAKEN);
            Ok(render_signup(auth.as_ref(), &form, &errors)?.into_response())
        }
    }
}

fn render_login(
    auth: Option<&AuthUser>,
    form: &LoginFormView,
    next: Option<&str>,
) -> Result<Html<String>, AppError> {
    let mut context = page_context(auth);
    context.insert("form", form);
    context.insert("next", next.unwrap_or_default());
    render("users/login.html", &context)
}

pub async fn login_form(
    auth: Option<AuthUser>,
    Query(query): Query<NextQuery>,
) -> Result<Html<String>, AppError> {
    render_login(
        auth.as_ref(),
        &LoginFormView::default(),
        query.next.as_deref(),
    )
}

pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let service = AuthService::new(state.db.clone(), state.session_ttl_days);
    let user = if form.username.is_empty() || form.password.is_empty() {
        None
    } else {
        service
            .login(&form.username, &form.password)
            .await
            .map_err(internal("log in"))?
    };

    let Some(user) = user else {
        let mut errors = FormErrors::default();
        errors.add("non_field", INVALID_LOGIN);
        let view = LoginFormView {
            username: form.username.clone(),
            errors,
        };
        return Ok(render_login(None, &view, form.next.as_deref())?.into_response());
    };

    let token = service
        .start_session(user.id)
        .await
        .map_err(internal("start session"))?;

    tracing::info!(user_id = user.id, "user logged in");
    let cookie = session_cookie(&token, state.session_ttl_days);
    Ok((
        StatusCode::FOUND,
        [
            (header::LOCATION, safe_next(form.next.as_deref())),
            (header::SET_COOKIE, cookie),
        ],
    )
        .into_response())
}

pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    if let Some(token) = session_token(&headers) {
        AuthService::new(state.db.clone(), state.session_ttl_days)
            .end_session(&token)
            .await
            .map_err(internal("end session"))?;
    }

    let html = render("users/logged_out.html", &page_context(None))?;
    Ok(([(header::SET_COOKIE, expired_session_cookie())], html).into_response())
}

pub async fn not_found(uri: Uri, auth: Option<AuthUser>) -> Response {
    let mut context = page_context(auth.as_ref());
    context.insert("path", uri.path());
    match render("core/404.html", &context) {
        Ok(html) => (StatusCode::NOT_FOUND, html).into_response(),
        Err(err) => err.into_response(),
    }
}
