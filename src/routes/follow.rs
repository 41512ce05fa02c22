use askama::Template;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::Router;

use crate::db::queries::{self, PostItem};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::pagination::{paginate, Page, PageQuery};
use crate::routes::Html;
use crate::state::AppState;

#[derive(Template)]
#[template(path = "pages/follow.html")]
pub struct FollowTemplate {
    pub user: Option<CurrentUser>,
    pub page: Page<PostItem>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/follow/", get(follow_index))
        .route("/profile/{username}/follow/", get(profile_follow))
        .route("/profile/{username}/unfollow/", get(profile_unfollow))
}

/// GET /follow/ — posts from authors the current user follows.
pub async fn follow_index(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<PageQuery>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let posts = queries::list_feed_posts(&conn, &user.id)?;
    let page = paginate(posts, state.config.posts.page_size, query.requested());

    Ok(Html(FollowTemplate {
        user: Some(user),
        page,
    })
    .into_response())
}

/// GET /profile/{username}/follow/ — start following; self-follows and
/// repeats are no-ops. Always redirects back to the profile.
pub async fn profile_follow(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(username): Path<String>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let author = queries::find_user_by_username(&conn, &username).ok_or(AppError::NotFound)?;

    if author.id != user.id {
        queries::follow_author(&conn, &user.id, &author.id)?;
    }

    Ok(Redirect::to(&format!("/profile/{}/", username)).into_response())
}

/// GET /profile/{username}/unfollow/ — stop following; unfollowing someone
/// not followed is a no-op. Always redirects back to the profile.
pub async fn profile_unfollow(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(username): Path<String>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let author = queries::find_user_by_username(&conn, &username).ok_or(AppError::NotFound)?;

    queries::unfollow_author(&conn, &user.id, &author.id)?;

    Ok(Redirect::to(&format!("/profile/{}/", username)).into_response())
}
