use askama::Template;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Form;
use serde::Deserialize;

use crate::auth::session;
use crate::db::queries;
use crate::error::AppResult;
use crate::extractors::{cookie_value, CurrentUser, MaybeUser};
use crate::forms::{validate_signup, SignupForm, SignupFormErrors};
use crate::routes::Html;
use crate::state::AppState;

// -- Templates --

#[derive(Template)]
#[template(path = "pages/signup.html")]
pub struct SignupTemplate {
    pub user: Option<CurrentUser>,
    pub username: String,
    pub errors: SignupFormErrors,
}

#[derive(Template)]
#[template(path = "pages/login.html")]
pub struct LoginTemplate {
    pub user: Option<CurrentUser>,
    pub username: String,
    pub next: String,
    pub error: Option<String>,
}

// -- Request types --

#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

// -- Cookie helpers --

pub fn session_cookie(name: &str, token: &str, max_age_hours: u64) -> String {
    let max_age_secs = max_age_hours * 3600;
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
        name, token, max_age_secs
    )
}

pub fn clear_session_cookie(name: &str) -> String {
    format!("{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0", name)
}

/// Keep only same-site redirect targets: absolute paths, but not
/// protocol-relative `//host` URLs.
fn safe_next(next: Option<&str>) -> Option<&str> {
    match next {
        Some(n) if n.starts_with('/') && !n.starts_with("//") => Some(n),
        _ => None,
    }
}

// -- Signup handlers --

/// GET /auth/signup/ — render the signup form
pub async fn signup_page(MaybeUser(user): MaybeUser) -> Html<SignupTemplate> {
    Html(SignupTemplate {
        user,
        username: String::new(),
        errors: SignupFormErrors::default(),
    })
}

/// POST /auth/signup/ — create the account, redirect to /
pub async fn signup_submit(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Form(form): Form<SignupForm>,
) -> AppResult<Response> {
    let input = match validate_signup(&form) {
        Ok(input) => input,
        Err(errors) => {
            return Ok(Html(SignupTemplate {
                user,
                username: form.username,
                errors,
            })
            .into_response());
        }
    };

    let password_hash = bcrypt::hash(&input.password, bcrypt::DEFAULT_COST)?;
    let created = {
        let conn = state.db.get()?;
        queries::create_user(&conn, &input.username, &password_hash)?
    };

    // Uniqueness comes from the DB constraint, surfaced as a field error
    if created.is_none() {
        return Ok(Html(SignupTemplate {
            user,
            username: input.username,
            errors: SignupFormErrors {
                username: Some("This username is already taken.".to_string()),
                password: None,
            },
        })
        .into_response());
    }

    Ok(Redirect::to("/").into_response())
}

// -- Login handlers --

/// GET /auth/login/ — render login form, carrying the `next` target
pub async fn login_page(
    MaybeUser(user): MaybeUser,
    Query(query): Query<NextQuery>,
) -> Html<LoginTemplate> {
    let next = safe_next(query.next.as_deref()).unwrap_or("").to_string();
    Html(LoginTemplate {
        user,
        username: String::new(),
        next,
        error: None,
    })
}

/// POST /auth/login/ — verify credentials, set session cookie
pub async fn login_submit(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    let found = {
        let conn = state.db.get()?;
        queries::find_user_by_username(&conn, form.username.trim())
    };

    let account = match found {
        Some(u) if bcrypt::verify(&form.password, &u.password_hash).unwrap_or(false) => u,
        _ => {
            let next = safe_next(form.next.as_deref()).unwrap_or("").to_string();
            return Ok(Html(LoginTemplate {
                user,
                username: form.username,
                next,
                error: Some("Invalid username or password.".to_string()),
            })
            .into_response());
        }
    };

    let token = session::create_session(&state.db, &account.id, state.config.auth.session_hours)?;
    let target = safe_next(form.next.as_deref()).unwrap_or("/").to_string();

    Ok((
        StatusCode::SEE_OTHER,
        [
            (header::LOCATION, target),
            (
                header::SET_COOKIE,
                session_cookie(
                    &state.config.auth.cookie_name,
                    &token,
                    state.config.auth.session_hours,
                ),
            ),
        ],
        "",
    )
        .into_response())
}

/// POST /auth/logout/ — delete session and redirect
pub async fn logout(
    State(state): State<AppState>,
    request: axum::http::Request<axum::body::Body>,
) -> AppResult<Response> {
    let (parts, _body) = request.into_parts();

    if let Some(token) = cookie_value(&parts, &state.config.auth.cookie_name) {
        let _ = session::delete_session(&state.db, token);
    }

    Ok((
        StatusCode::SEE_OTHER,
        [
            (header::LOCATION, "/".to_string()),
            (
                header::SET_COOKIE,
                clear_session_cookie(&state.config.auth.cookie_name),
            ),
        ],
        "",
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_next_accepts_local_paths() {
        assert_eq!(safe_next(Some("/create/")), Some("/create/"));
        assert_eq!(safe_next(Some("/posts/abc/edit/")), Some("/posts/abc/edit/"));
    }

    #[test]
    fn safe_next_rejects_external_targets() {
        assert_eq!(safe_next(Some("https://evil.example/")), None);
        assert_eq!(safe_next(Some("//evil.example/")), None);
        assert_eq!(safe_next(Some("")), None);
        assert_eq!(safe_next(None), None);
    }

    #[test]
    fn session_cookie_sets_lifetime_and_flags() {
        let cookie = session_cookie("quill_session", "tok", 2);
        assert_eq!(
            cookie,
            "quill_session=tok; HttpOnly; SameSite=Strict; Path=/; Max-Age=7200"
        );
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        let cookie = clear_session_cookie("quill_session");
        assert!(cookie.contains("Max-Age=0"));
    }
}
