//! Query helpers shared by the route handlers.
//!
//! Lookups return `Option`, mutations return `AppResult`. Timestamps are
//! stored as SQLite `datetime('now')` strings and formatted for display
//! here, at the query boundary.

use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Connection};

use crate::db::models::{Group, Post, User};
use crate::error::AppResult;

/// A post row joined with its author and group, shaped for rendering.
#[derive(Debug, Clone)]
pub struct PostItem {
    pub id: String,
    pub author_username: String,
    pub text: String,
    pub created_at: String,
    pub image_path: Option<String>,
    pub group: Option<GroupLink>,
    pub comment_count: i64,
}

#[derive(Debug, Clone)]
pub struct GroupLink {
    pub title: String,
    pub slug: String,
}

#[derive(Debug, Clone)]
pub struct CommentItem {
    pub id: String,
    pub username: String,
    pub text: String,
    pub created_at: String,
}

// --- Users ---

/// Insert a new user. Returns the new id, or `None` when the username is
/// already taken.
pub fn create_user(
    conn: &Connection,
    username: &str,
    password_hash: &str,
) -> AppResult<Option<String>> {
    let id = uuid::Uuid::now_v7().to_string();
    let result = conn.execute(
        "INSERT INTO users (id, username, password_hash) VALUES (?1, ?2, ?3)",
        params![id, username, password_hash],
    );
    match result {
        Ok(_) => Ok(Some(id)),
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

pub fn find_user_by_username(conn: &Connection, username: &str) -> Option<User> {
    conn.query_row(
        "SELECT id, username, password_hash, created_at FROM users WHERE username = ?1",
        params![username],
        |row| {
            Ok(User {
                id: row.get(0)?,
                username: row.get(1)?,
                password_hash: row.get(2)?,
                created_at: row.get(3)?,
            })
        },
    )
    .ok()
}

// --- Groups ---

pub fn create_group(
    conn: &Connection,
    title: &str,
    slug: &str,
    description: &str,
) -> AppResult<Group> {
    let id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO groups (id, title, slug, description) VALUES (?1, ?2, ?3, ?4)",
        params![id, title, slug, description],
    )?;
    let group = conn.query_row(
        "SELECT id, title, slug, description, created_at FROM groups WHERE id = ?1",
        params![id],
        group_row,
    )?;
    Ok(group)
}

pub fn find_group_by_slug(conn: &Connection, slug: &str) -> Option<Group> {
    conn.query_row(
        "SELECT id, title, slug, description, created_at FROM groups WHERE slug = ?1",
        params![slug],
        group_row,
    )
    .ok()
}

pub fn find_group_by_id(conn: &Connection, id: &str) -> Option<Group> {
    conn.query_row(
        "SELECT id, title, slug, description, created_at FROM groups WHERE id = ?1",
        params![id],
        group_row,
    )
    .ok()
}

pub fn list_groups(conn: &Connection) -> AppResult<Vec<Group>> {
    let mut stmt = conn.prepare(
        "SELECT id, title, slug, description, created_at FROM groups ORDER BY title ASC",
    )?;
    let groups = stmt
        .query_map([], group_row)?
        .filter_map(|r| r.ok())
        .collect();
    Ok(groups)
}

fn group_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        id: row.get(0)?,
        title: row.get(1)?,
        slug: row.get(2)?,
        description: row.get(3)?,
        created_at: row.get(4)?,
    })
}

// --- Posts ---

pub fn insert_post(
    conn: &Connection,
    user_id: &str,
    text: &str,
    group_id: Option<&str>,
    image_path: Option<&str>,
) -> AppResult<String> {
    let id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO posts (id, user_id, group_id, text, image_path) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, user_id, group_id, text, image_path],
    )?;
    Ok(id)
}

/// Update text and group; the image is only replaced when a new one was
/// uploaded, otherwise the stored path is kept.
pub fn update_post(
    conn: &Connection,
    post_id: &str,
    text: &str,
    group_id: Option<&str>,
    new_image_path: Option<&str>,
) -> AppResult<()> {
    conn.execute(
        "UPDATE posts
         SET text = ?2, group_id = ?3, image_path = COALESCE(?4, image_path)
         WHERE id = ?1",
        params![post_id, text, group_id, new_image_path],
    )?;
    Ok(())
}

pub fn get_post(conn: &Connection, id: &str) -> Option<Post> {
    conn.query_row(
        "SELECT id, user_id, group_id, text, image_path, created_at FROM posts WHERE id = ?1",
        params![id],
        |row| {
            Ok(Post {
                id: row.get(0)?,
                user_id: row.get(1)?,
                group_id: row.get(2)?,
                text: row.get(3)?,
                image_path: row.get(4)?,
                created_at: row.get(5)?,
            })
        },
    )
    .ok()
}

pub fn get_post_item(conn: &Connection, id: &str) -> Option<PostItem> {
    conn.query_row(
        "SELECT p.id, u.username, p.text, p.created_at, p.image_path, g.title, g.slug,
                COALESCE((SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id), 0) AS comment_count
         FROM posts p
         JOIN users u ON u.id = p.user_id
         LEFT JOIN groups g ON g.id = p.group_id
         WHERE p.id = ?1",
        params![id],
        post_row,
    )
    .ok()
    .map(into_post_item)
}

pub fn list_posts(conn: &Connection) -> AppResult<Vec<PostItem>> {
    let mut stmt = conn.prepare(
        "SELECT p.id, u.username, p.text, p.created_at, p.image_path, g.title, g.slug,
                COALESCE((SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id), 0) AS comment_count
         FROM posts p
         JOIN users u ON u.id = p.user_id
         LEFT JOIN groups g ON g.id = p.group_id
         ORDER BY p.created_at DESC, p.id DESC",
    )?;
    let posts = stmt
        .query_map([], post_row)?
        .filter_map(|r| r.ok())
        .map(into_post_item)
        .collect();
    Ok(posts)
}

pub fn list_posts_by_group(conn: &Connection, group_id: &str) -> AppResult<Vec<PostItem>> {
    let mut stmt = conn.prepare(
        "SELECT p.id, u.username, p.text, p.created_at, p.image_path, g.title, g.slug,
                COALESCE((SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id), 0) AS comment_count
         FROM posts p
         JOIN users u ON u.id = p.user_id
         LEFT JOIN groups g ON g.id = p.group_id
         WHERE p.group_id = ?1
         ORDER BY p.created_at DESC, p.id DESC",
    )?;
    let posts = stmt
        .query_map(params![group_id], post_row)?
        .filter_map(|r| r.ok())
        .map(into_post_item)
        .collect();
    Ok(posts)
}

pub fn list_posts_by_author(conn: &Connection, user_id: &str) -> AppResult<Vec<PostItem>> {
    let mut stmt = conn.prepare(
        "SELECT p.id, u.username, p.text, p.created_at, p.image_path, g.title, g.slug,
                COALESCE((SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id), 0) AS comment_count
         FROM posts p
         JOIN users u ON u.id = p.user_id
         LEFT JOIN groups g ON g.id = p.group_id
         WHERE p.user_id = ?1
         ORDER BY p.created_at DESC, p.id DESC",
    )?;
    let posts = stmt
        .query_map(params![user_id], post_row)?
        .filter_map(|r| r.ok())
        .map(into_post_item)
        .collect();
    Ok(posts)
}

/// Posts by authors the given user follows, newest first.
pub fn list_feed_posts(conn: &Connection, user_id: &str) -> AppResult<Vec<PostItem>> {
    let mut stmt = conn.prepare(
        "SELECT p.id, u.username, p.text, p.created_at, p.image_path, g.title, g.slug,
                COALESCE((SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id), 0) AS comment_count
         FROM posts p
         JOIN users u ON u.id = p.user_id
         LEFT JOIN groups g ON g.id = p.group_id
         JOIN follows f ON f.author_id = p.user_id
         WHERE f.user_id = ?1
         ORDER BY p.created_at DESC, p.id DESC",
    )?;
    let posts = stmt
        .query_map(params![user_id], post_row)?
        .filter_map(|r| r.ok())
        .map(into_post_item)
        .collect();
    Ok(posts)
}

pub fn count_posts_by_author(conn: &Connection, user_id: &str) -> i64 {
    conn.query_row(
        "SELECT COUNT(*) FROM posts WHERE user_id = ?1",
        params![user_id],
        |row| row.get(0),
    )
    .unwrap_or(0)
}

type PostRow = (
    String,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    i64,
);

fn post_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PostRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn into_post_item(
    (id, username, text, created_at, image_path, group_title, group_slug, comment_count): PostRow,
) -> PostItem {
    let group = match (group_title, group_slug) {
        (Some(title), Some(slug)) => Some(GroupLink { title, slug }),
        _ => None,
    };
    PostItem {
        id,
        author_username: username,
        text,
        created_at: parse_and_format_time(&created_at),
        image_path,
        group,
        comment_count,
    }
}

// --- Comments ---

pub fn insert_comment(
    conn: &Connection,
    post_id: &str,
    user_id: &str,
    text: &str,
) -> AppResult<String> {
    let id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO comments (id, post_id, user_id, text) VALUES (?1, ?2, ?3, ?4)",
        params![id, post_id, user_id, text],
    )?;
    Ok(id)
}

pub fn list_comments(conn: &Connection, post_id: &str) -> AppResult<Vec<CommentItem>> {
    let mut stmt = conn.prepare(
        "SELECT c.id, u.username, c.text, c.created_at
         FROM comments c
         JOIN users u ON u.id = c.user_id
         WHERE c.post_id = ?1
         ORDER BY c.created_at ASC, c.id ASC",
    )?;
    let comments = stmt
        .query_map(params![post_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?
        .filter_map(|r| r.ok())
        .map(|(id, username, text, created_at_str)| CommentItem {
            id,
            username,
            text,
            created_at: parse_and_format_time(&created_at_str),
        })
        .collect();
    Ok(comments)
}

// --- Follows ---

/// Record that `user_id` follows `author_id`. Returns `true` when a new
/// edge was created; an existing edge or a self-follow is silently ignored
/// (the table carries UNIQUE and CHECK constraints, and `OR IGNORE` makes
/// the insert race-safe).
pub fn follow_author(conn: &Connection, user_id: &str, author_id: &str) -> AppResult<bool> {
    let id = uuid::Uuid::now_v7().to_string();
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO follows (id, user_id, author_id) VALUES (?1, ?2, ?3)",
        params![id, user_id, author_id],
    )?;
    Ok(inserted == 1)
}

/// Remove the follow edge if present. Returns `true` when one was removed.
pub fn unfollow_author(conn: &Connection, user_id: &str, author_id: &str) -> AppResult<bool> {
    let deleted = conn.execute(
        "DELETE FROM follows WHERE user_id = ?1 AND author_id = ?2",
        params![user_id, author_id],
    )?;
    Ok(deleted > 0)
}

pub fn is_following(conn: &Connection, user_id: &str, author_id: &str) -> bool {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM follows WHERE user_id = ?1 AND author_id = ?2",
        params![user_id, author_id],
        |row| row.get(0),
    )
    .unwrap_or(false)
}

// --- Time formatting ---

pub fn parse_and_format_time(db_time: &str) -> String {
    NaiveDateTime::parse_from_str(db_time, "%Y-%m-%d %H:%M:%S")
        .map(|dt| format_relative_time(&dt))
        .unwrap_or_else(|_| db_time.to_string())
}

pub fn format_relative_time(dt: &NaiveDateTime) -> String {
    let now = Utc::now().naive_utc();
    let diff = now.signed_duration_since(*dt);

    let seconds = diff.num_seconds();
    if seconds < 60 {
        return "just now".to_string();
    }

    let minutes = diff.num_minutes();
    if minutes < 60 {
        return format!("{}m ago", minutes);
    }

    let hours = diff.num_hours();
    if hours < 24 {
        return format!("{}h ago", hours);
    }

    let days = diff.num_days();
    if days < 7 {
        return format!("{}d ago", days);
    }

    dt.format("%b %-d, %Y").to_string()
}

// --- Tests ---
