use std::time::Duration;

use askama::Template;
use axum::extract::{Multipart, Path, Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};

use crate::db::models::Group;
use crate::db::queries::{self, CommentItem, PostItem};
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, MaybeUser};
use crate::forms::{
    validate_comment, validate_post, CommentForm, ImageUpload, PostFormErrors, RawPostForm,
};
use crate::pagination::{paginate, Page, PageQuery};
use crate::routes::Html;
use crate::state::AppState;
use crate::storage;

// -- Templates --

#[derive(Template)]
#[template(path = "pages/index.html")]
pub struct IndexTemplate {
    pub user: Option<CurrentUser>,
    /// Pre-rendered post list fragment, possibly served from the page cache.
    pub posts_html: String,
}

#[derive(Template)]
#[template(path = "components/post_list.html")]
struct PostListTemplate {
    page: Page<PostItem>,
}

#[derive(Template)]
#[template(path = "pages/group.html")]
pub struct GroupTemplate {
    pub user: Option<CurrentUser>,
    pub group: Group,
    pub page: Page<PostItem>,
}

#[derive(Template)]
#[template(path = "pages/profile.html")]
pub struct ProfileTemplate {
    pub user: Option<CurrentUser>,
    pub author_username: String,
    pub post_count: usize,
    pub following: bool,
    pub is_self: bool,
    pub page: Page<PostItem>,
}

#[derive(Template)]
#[template(path = "pages/post_detail.html")]
pub struct PostDetailTemplate {
    pub user: Option<CurrentUser>,
    pub post: PostItem,
    pub comments: Vec<CommentItem>,
    pub author_post_count: i64,
    pub can_edit: bool,
    pub comment_error: Option<String>,
    pub comment_text: String,
}

#[derive(Template)]
#[template(path = "pages/post_form.html")]
pub struct PostFormTemplate {
    pub user: Option<CurrentUser>,
    pub groups: Vec<Group>,
    pub is_edit: bool,
    pub post_id: String,
    pub text: String,
    /// Selected group id; empty string when none.
    pub selected_group: String,
    pub errors: PostFormErrors,
}

// -- Router --

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/group/{slug}/", get(group_posts))
        .route("/profile/{username}/", get(profile))
        .route("/posts/{id}/", get(post_detail))
        .route("/posts/{id}/comment/", post(add_comment))
        .route("/create/", get(create_page).post(create_submit))
        .route("/posts/{id}/edit/", get(edit_page).post(edit_submit))
}

// -- Listing handlers --

/// GET / — all posts, newest first. The rendered list fragment is cached
/// for a short TTL, so fresh posts only appear once the entry expires.
pub async fn index(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Query(query): Query<PageQuery>,
) -> AppResult<Response> {
    let requested = query.requested();
    let key = format!("index:p{}", requested.unwrap_or(1));
    let ttl = Duration::from_secs(state.config.cache.index_ttl_seconds);

    let posts_html = {
        let mut cache = state.cache.lock().await;
        cache.get_or_populate(&key, ttl, || -> AppResult<String> {
            let conn = state.db.get()?;
            let posts = queries::list_posts(&conn)?;
            let page = paginate(posts, state.config.posts.page_size, requested);
            Ok(PostListTemplate { page }.render()?)
        })?
    };

    Ok(Html(IndexTemplate { user, posts_html }).into_response())
}

/// GET /group/{slug}/ — posts belonging to one group.
pub async fn group_posts(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let group = queries::find_group_by_slug(&conn, &slug).ok_or(AppError::NotFound)?;
    let posts = queries::list_posts_by_group(&conn, &group.id)?;
    let page = paginate(posts, state.config.posts.page_size, query.requested());

    Ok(Html(GroupTemplate { user, group, page }).into_response())
}

/// GET /profile/{username}/ — an author's posts plus follow state.
pub async fn profile(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let author = queries::find_user_by_username(&conn, &username).ok_or(AppError::NotFound)?;

    let posts = queries::list_posts_by_author(&conn, &author.id)?;
    let post_count = posts.len();
    let following = match &user {
        Some(u) => queries::is_following(&conn, &u.id, &author.id),
        None => false,
    };
    let is_self = user.as_ref().map(|u| u.id == author.id).unwrap_or(false);
    let page = paginate(posts, state.config.posts.page_size, query.requested());

    Ok(Html(ProfileTemplate {
        user,
        author_username: author.username,
        post_count,
        following,
        is_self,
        page,
    })
    .into_response())
}

// -- Detail & comments --

/// GET /posts/{id}/ — full post with comments and the comment form.
pub async fn post_detail(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let raw = queries::get_post(&conn, &id).ok_or(AppError::NotFound)?;
    let post = queries::get_post_item(&conn, &id).ok_or(AppError::NotFound)?;
    let comments = queries::list_comments(&conn, &id)?;
    let author_post_count = queries::count_posts_by_author(&conn, &raw.user_id);
    let can_edit = user.as_ref().map(|u| u.id == raw.user_id).unwrap_or(false);

    Ok(Html(PostDetailTemplate {
        user,
        post,
        comments,
        author_post_count,
        can_edit,
        comment_error: None,
        comment_text: String::new(),
    })
    .into_response())
}

/// POST /posts/{id}/comment/ — attach a comment; author and post come from
/// the session and the path, never from the form.
pub async fn add_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Form(form): Form<CommentForm>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let raw = queries::get_post(&conn, &id).ok_or(AppError::NotFound)?;

    match validate_comment(&form) {
        Ok(input) => {
            queries::insert_comment(&conn, &id, &user.id, &input.text)?;
            Ok(Redirect::to(&format!("/posts/{}/", id)).into_response())
        }
        Err(errors) => {
            // Re-render the detail page with the error and the submitted text
            let post = queries::get_post_item(&conn, &id).ok_or(AppError::NotFound)?;
            let comments = queries::list_comments(&conn, &id)?;
            let author_post_count = queries::count_posts_by_author(&conn, &raw.user_id);
            let can_edit = raw.user_id == user.id;

            Ok(Html(PostDetailTemplate {
                user: Some(user),
                post,
                comments,
                author_post_count,
                can_edit,
                comment_error: errors.text,
                comment_text: form.text,
            })
            .into_response())
        }
    }
}

// -- Create & edit --

/// GET /create/ — blank post form.
pub async fn create_page(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let groups = queries::list_groups(&conn)?;

    Ok(Html(PostFormTemplate {
        user: Some(user),
        groups,
        is_edit: false,
        post_id: String::new(),
        text: String::new(),
        selected_group: String::new(),
        errors: PostFormErrors::default(),
    })
    .into_response())
}

/// POST /create/ — validate, store the optional image, insert the post,
/// redirect to the author's profile.
pub async fn create_submit(
    State(state): State<AppState>,
    user: CurrentUser,
    multipart: Multipart,
) -> AppResult<Response> {
    let raw = read_post_form(multipart).await?;

    let input = match validate_post(&raw) {
        Ok(input) => input,
        Err(errors) => return render_post_form(&state, user, &raw, errors, None),
    };

    if let Some(group_id) = &input.group_id {
        let conn = state.db.get()?;
        if queries::find_group_by_id(&conn, group_id).is_none() {
            let errors = PostFormErrors {
                text: None,
                group: Some("Select a valid group.".to_string()),
            };
            return render_post_form(&state, user, &raw, errors, None);
        }
    }

    let image_path = match &input.image {
        Some(upload) => Some(storage::save_upload(
            state.config.uploads_path(),
            &upload.filename,
            &upload.data,
        )?),
        None => None,
    };

    {
        let conn = state.db.get()?;
        queries::insert_post(
            &conn,
            &user.id,
            &input.text,
            input.group_id.as_deref(),
            image_path.as_deref(),
        )?;
    }

    Ok(Redirect::to(&format!("/profile/{}/", user.username)).into_response())
}

/// GET /posts/{id}/edit/ — pre-filled form; non-authors are silently
/// redirected to the detail page.
pub async fn edit_page(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let post = queries::get_post(&conn, &id).ok_or(AppError::NotFound)?;

    if post.user_id != user.id {
        return Ok(Redirect::to(&format!("/posts/{}/", id)).into_response());
    }

    let groups = queries::list_groups(&conn)?;

    Ok(Html(PostFormTemplate {
        user: Some(user),
        groups,
        is_edit: true,
        post_id: id,
        text: post.text,
        selected_group: post.group_id.unwrap_or_default(),
        errors: PostFormErrors::default(),
    })
    .into_response())
}

/// POST /posts/{id}/edit/ — same form as create; keeps the stored image
/// when no new one is uploaded.
pub async fn edit_submit(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    multipart: Multipart,
) -> AppResult<Response> {
    // Ownership is checked before the body is touched
    let post = {
        let conn = state.db.get()?;
        queries::get_post(&conn, &id).ok_or(AppError::NotFound)?
    };
    if post.user_id != user.id {
        return Ok(Redirect::to(&format!("/posts/{}/", id)).into_response());
    }

    let raw = read_post_form(multipart).await?;

    let input = match validate_post(&raw) {
        Ok(input) => input,
        Err(errors) => return render_post_form(&state, user, &raw, errors, Some(&id)),
    };

    if let Some(group_id) = &input.group_id {
        let conn = state.db.get()?;
        if queries::find_group_by_id(&conn, group_id).is_none() {
            let errors = PostFormErrors {
                text: None,
                group: Some("Select a valid group.".to_string()),
            };
            return render_post_form(&state, user, &raw, errors, Some(&id));
        }
    }

    let image_path = match &input.image {
        Some(upload) => Some(storage::save_upload(
            state.config.uploads_path(),
            &upload.filename,
            &upload.data,
        )?),
        None => None,
    };

    {
        let conn = state.db.get()?;
        queries::update_post(
            &conn,
            &id,
            &input.text,
            input.group_id.as_deref(),
            image_path.as_deref(),
        )?;
    }

    Ok(Redirect::to(&format!("/posts/{}/", id)).into_response())
}

// -- Helpers --

/// Collect the multipart post form into a [`RawPostForm`]. Empty file
/// fields (no filename or no bytes) count as "no image".
async fn read_post_form(mut multipart: Multipart) -> AppResult<RawPostForm> {
    let mut form = RawPostForm::default();

    while let Some(field) = multipart.next_field().await.map_err(bad_request)? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "text" => form.text = field.text().await.map_err(bad_request)?,
            "group" => form.group_id = field.text().await.map_err(bad_request)?,
            "image" => {
                let filename = field.file_name().unwrap_or("").to_string();
                let data = field.bytes().await.map_err(bad_request)?;
                if !filename.is_empty() && !data.is_empty() {
                    form.image = Some(ImageUpload { filename, data });
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

fn bad_request<E: std::fmt::Display>(e: E) -> AppError {
    AppError::BadRequest(e.to_string())
}

fn render_post_form(
    state: &AppState,
    user: CurrentUser,
    raw: &RawPostForm,
    errors: PostFormErrors,
    edit_post_id: Option<&str>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let groups = queries::list_groups(&conn)?;

    Ok(Html(PostFormTemplate {
        user: Some(user),
        groups,
        is_edit: edit_post_id.is_some(),
        post_id: edit_post_id.unwrap_or("").to_string(),
        text: raw.text.clone(),
        selected_group: raw.group_id.clone(),
        errors,
    })
    .into_response())
}
