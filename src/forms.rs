//! Typed request forms and their validators.
//!
//! Each mutating handler binds its request body into a raw form struct and
//! passes it through a pure validation function that returns either a typed
//! input or per-field errors. Handlers re-render the submitted values with
//! the errors; nothing here touches the database (referential checks such
//! as "does this group exist" stay in the handler).

use bytes::Bytes;
use serde::Deserialize;

// --- Post form ---

/// An uploaded file captured from a multipart field.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub filename: String,
    pub data: Bytes,
}

/// Raw fields of the create/edit post form, as submitted.
#[derive(Debug, Default, Clone)]
pub struct RawPostForm {
    pub text: String,
    /// Group id as submitted; empty string means "no group".
    pub group_id: String,
    pub image: Option<ImageUpload>,
}

/// A validated post submission.
#[derive(Debug, Clone)]
pub struct PostInput {
    pub text: String,
    pub group_id: Option<String>,
    pub image: Option<ImageUpload>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct PostFormErrors {
    pub text: Option<String>,
    pub group: Option<String>,
}

impl PostFormErrors {
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.group.is_none()
    }
}

pub fn validate_post(raw: &RawPostForm) -> Result<PostInput, PostFormErrors> {
    let text = raw.text.trim();
    if text.is_empty() {
        return Err(PostFormErrors {
            text: Some("Post text is required.".to_string()),
            group: None,
        });
    }

    let group_id = match raw.group_id.trim() {
        "" => None,
        id => Some(id.to_string()),
    };

    Ok(PostInput {
        text: text.to_string(),
        group_id,
        image: raw.image.clone(),
    })
}

// --- Comment form ---

#[derive(Debug, Default, Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct CommentInput {
    pub text: String,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct CommentFormErrors {
    pub text: Option<String>,
}

pub fn validate_comment(form: &CommentForm) -> Result<CommentInput, CommentFormErrors> {
    let text = form.text.trim();
    if text.is_empty() {
        return Err(CommentFormErrors {
            text: Some("Comment text is required.".to_string()),
        });
    }
    Ok(CommentInput {
        text: text.to_string(),
    })
}

// --- Signup form ---

const USERNAME_MAX_LEN: usize = 150;
const PASSWORD_MIN_LEN: usize = 8;

#[derive(Debug, Default, Deserialize)]
pub struct SignupForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct SignupInput {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct SignupFormErrors {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl SignupFormErrors {
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.password.is_none()
    }
}

pub fn validate_signup(form: &SignupForm) -> Result<SignupInput, SignupFormErrors> {
    let mut errors = SignupFormErrors::default();

    let username = form.username.trim();
    if username.is_empty() {
        errors.username = Some("Username is required.".to_string());
    } else if username.len() > USERNAME_MAX_LEN {
        errors.username = Some("Username is too long (150 characters max).".to_string());
    } else if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
    {
        errors.username = Some(
            "Usernames may only contain letters, digits, dots, dashes and underscores."
                .to_string(),
        );
    }

    if form.password.len() < PASSWORD_MIN_LEN {
        errors.password = Some("Password must be at least 8 characters.".to_string());
    }

    if errors.is_empty() {
        Ok(SignupInput {
            username: username.to_string(),
            password: form.password.clone(),
        })
    } else {
        Err(errors)
    }
}
