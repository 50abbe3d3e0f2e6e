//! Community feed: posts, comments, and the like toggle.
//!
//! Reads are open to anonymous callers; every write requires a login and
//! post/comment mutation is author-only.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, MaybeUser};
use crate::ownership::{ensure_can_write, WriteTarget};
use crate::routes::notifications::notify;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub content: String,
    pub image_path: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub image_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct PostView {
    pub id: String,
    pub author_id: String,
    pub author_nickname: String,
    pub title: String,
    pub content: String,
    pub image_path: Option<String>,
    pub likes_count: i64,
    pub comments_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Serialize)]
pub struct CommentView {
    pub id: String,
    pub post_id: String,
    pub author_id: String,
    pub author_nickname: String,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Serialize)]
pub struct LikeToggleResponse {
    pub message: String,
    pub likes_count: i64,
}

const POST_VIEW_QUERY: &str = "
    SELECT p.id, p.author_id, u.nickname, p.title, p.content, p.image_path,
           (SELECT COUNT(*) FROM post_likes l WHERE l.post_id = p.id),
           (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id),
           p.created_at, p.updated_at
    FROM posts p JOIN users u ON u.id = p.author_id";

fn post_view_from_row(row: &Row<'_>) -> rusqlite::Result<PostView> {
    Ok(PostView {
        id: row.get(0)?,
        author_id: row.get(1)?,
        author_nickname: row.get(2)?,
        title: row.get(3)?,
        content: row.get(4)?,
        image_path: row.get(5)?,
        likes_count: row.get(6)?,
        comments_count: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

const COMMENT_VIEW_QUERY: &str = "
    SELECT c.id, c.post_id, c.author_id, u.nickname, c.content, c.created_at, c.updated_at
    FROM comments c JOIN users u ON u.id = c.author_id";

fn comment_view_from_row(row: &Row<'_>) -> rusqlite::Result<CommentView> {
    Ok(CommentView {
        id: row.get(0)?,
        post_id: row.get(1)?,
        author_id: row.get(2)?,
        author_nickname: row.get(3)?,
        content: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/community/posts", get(list_posts).post(create_post))
        .route(
            "/community/posts/{post_id}",
            get(get_post).put(update_post).delete(delete_post),
        )
        .route(
            "/community/posts/{post_id}/comments",
            get(list_comments).post(create_comment),
        )
        .route(
            "/community/comments/{comment_id}",
            put(update_comment).delete(delete_comment),
        )
        .route("/community/posts/{post_id}/like", post(toggle_like))
}

// --- Service layer ---

pub fn list_all_posts(conn: &Connection) -> AppResult<Vec<PostView>> {
    let mut stmt = conn.prepare(&format!(
        "{POST_VIEW_QUERY} ORDER BY p.created_at DESC, p.id DESC"
    ))?;
    let posts = stmt
        .query_map([], post_view_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(posts)
}

pub fn load_post(conn: &Connection, post_id: &str) -> AppResult<PostView> {
    conn.query_row(
        &format!("{POST_VIEW_QUERY} WHERE p.id = ?1"),
        params![post_id],
        post_view_from_row,
    )
    .map_err(|_| AppError::NotFound)
}

pub fn insert_post(conn: &Connection, author_id: &str, req: &CreatePostRequest) -> AppResult<PostView> {
    if req.title.trim().is_empty() || req.content.trim().is_empty() {
        return Err(AppError::Validation("title and content are required".into()));
    }

    let id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO posts (id, author_id, title, content, image_path)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, author_id, req.title.trim(), req.content, req.image_path],
    )?;
    load_post(conn, &id)
}

pub fn apply_post_update(
    conn: &Connection,
    user_id: &str,
    post_id: &str,
    update: &UpdatePostRequest,
) -> AppResult<PostView> {
    let post = load_post(conn, post_id)?;
    ensure_can_write(user_id, WriteTarget::Post { author_id: &post.author_id })?;

    conn.execute(
        "UPDATE posts SET
             title = COALESCE(?1, title),
             content = COALESCE(?2, content),
             image_path = COALESCE(?3, image_path),
             updated_at = datetime('now')
         WHERE id = ?4",
        params![update.title, update.content, update.image_path, post_id],
    )?;
    load_post(conn, post_id)
}

pub fn remove_post(conn: &Connection, user_id: &str, post_id: &str) -> AppResult<()> {
    let post = load_post(conn, post_id)?;
    ensure_can_write(user_id, WriteTarget::Post { author_id: &post.author_id })?;
    conn.execute("DELETE FROM posts WHERE id = ?1", params![post_id])?;
    Ok(())
}

pub fn list_post_comments(conn: &Connection, post_id: &str) -> AppResult<Vec<CommentView>> {
    load_post(conn, post_id)?;
    let mut stmt = conn.prepare(&format!(
        "{COMMENT_VIEW_QUERY} WHERE c.post_id = ?1 ORDER BY c.created_at, c.id"
    ))?;
    let comments = stmt
        .query_map(params![post_id], comment_view_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(comments)
}

/// Create a comment and fan out a notification to the post author. The
/// notification is best-effort and skipped for self-comments.
pub fn insert_comment(
    conn: &Connection,
    author: &CurrentUser,
    post_id: &str,
    content: &str,
) -> AppResult<CommentView> {
    let content = content.trim();
    if content.is_empty() {
        return Err(AppError::Validation("content is required".into()));
    }
    let post = load_post(conn, post_id)?;

    let id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO comments (id, post_id, author_id, content) VALUES (?1, ?2, ?3, ?4)",
        params![id, post_id, author.id, content],
    )?;

    if post.author_id != author.id {
        let body = format!("{} commented on your post", author.nickname);
        let link = format!("/community/posts/{post_id}");
        if let Err(e) = notify(conn, &post.author_id, &author.id, &body, "comment", Some(&link)) {
            tracing::warn!("comment notification failed: {}", e);
        }
    }

    load_comment(conn, &id)
}

fn load_comment(conn: &Connection, comment_id: &str) -> AppResult<CommentView> {
    conn.query_row(
        &format!("{COMMENT_VIEW_QUERY} WHERE c.id = ?1"),
        params![comment_id],
        comment_view_from_row,
    )
    .map_err(|_| AppError::NotFound)
}

pub fn apply_comment_update(
    conn: &Connection,
    user_id: &str,
    comment_id: &str,
    content: &str,
) -> AppResult<CommentView> {
    let comment = load_comment(conn, comment_id)?;
    ensure_can_write(user_id, WriteTarget::Comment { author_id: &comment.author_id })?;
    if content.trim().is_empty() {
        return Err(AppError::Validation("content is required".into()));
    }

    conn.execute(
        "UPDATE comments SET content = ?1, updated_at = datetime('now') WHERE id = ?2",
        params![content.trim(), comment_id],
    )?;
    load_comment(conn, comment_id)
}

pub fn remove_comment(conn: &Connection, user_id: &str, comment_id: &str) -> AppResult<()> {
    let comment = load_comment(conn, comment_id)?;
    ensure_can_write(user_id, WriteTarget::Comment { author_id: &comment.author_id })?;
    conn.execute("DELETE FROM comments WHERE id = ?1", params![comment_id])?;
    Ok(())
}

/// Flip the caller's like on a post and report the new count.
pub fn toggle_post_like(
    conn: &Connection,
    user_id: &str,
    post_id: &str,
) -> AppResult<LikeToggleResponse> {
    load_post(conn, post_id)?;

    let existing: Option<String> = conn
        .query_row(
            "SELECT post_id FROM post_likes WHERE post_id = ?1 AND user_id = ?2",
            params![post_id, user_id],
            |r| r.get(0),
        )
        .optional()?;

    let message = if existing.is_some() {
        conn.execute(
            "DELETE FROM post_likes WHERE post_id = ?1 AND user_id = ?2",
            params![post_id, user_id],
        )?;
        "like removed"
    } else {
        conn.execute(
            "INSERT INTO post_likes (post_id, user_id) VALUES (?1, ?2)",
            params![post_id, user_id],
        )?;
        "like added"
    };

    let likes_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM post_likes WHERE post_id = ?1",
        params![post_id],
        |r| r.get(0),
    )?;
    Ok(LikeToggleResponse {
        message: message.to_string(),
        likes_count,
    })
}

// --- Handlers ---

async fn list_posts(
    State(state): State<AppState>,
    _user: MaybeUser,
) -> AppResult<Json<Vec<PostView>>> {
    let conn = state.db.get()?;
    Ok(Json(list_all_posts(&conn)?))
}

async fn get_post(
    State(state): State<AppState>,
    _user: MaybeUser,
    Path(post_id): Path<String>,
) -> AppResult<Json<PostView>> {
    let conn = state.db.get()?;
    Ok(Json(load_post(&conn, &post_id)?))
}

async fn create_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<CreatePostRequest>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let post = insert_post(&conn, &user.id, &req)?;
    Ok((StatusCode::CREATED, Json(post)).into_response())
}

async fn update_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<String>,
    Json(update): Json<UpdatePostRequest>,
) -> AppResult<Json<PostView>> {
    let conn = state.db.get()?;
    Ok(Json(apply_post_update(&conn, &user.id, &post_id, &update)?))
}

async fn delete_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<String>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    remove_post(&conn, &user.id, &post_id)?;
    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "message": "post deleted" })),
    )
        .into_response())
}

async fn list_comments(
    State(state): State<AppState>,
    _user: MaybeUser,
    Path(post_id): Path<String>,
) -> AppResult<Json<Vec<CommentView>>> {
    let conn = state.db.get()?;
    Ok(Json(list_post_comments(&conn, &post_id)?))
}

async fn create_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<String>,
    Json(req): Json<CommentRequest>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let comment = insert_comment(&conn, &user, &post_id, &req.content)?;
    Ok((StatusCode::CREATED, Json(comment)).into_response())
}

async fn update_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(comment_id): Path<String>,
    Json(req): Json<CommentRequest>,
) -> AppResult<Json<CommentView>> {
    let conn = state.db.get()?;
    Ok(Json(apply_comment_update(&conn, &user.id, &comment_id, &req.content)?))
}

async fn delete_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(comment_id): Path<String>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    remove_comment(&conn, &user.id, &comment_id)?;
    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "message": "comment deleted" })),
    )
        .into_response())
}

async fn toggle_like(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<String>,
) -> AppResult<Json<LikeToggleResponse>> {
    let conn = state.db.get()?;
    Ok(Json(toggle_post_like(&conn, &user.id, &post_id)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support;
    use crate::routes::notifications::list_for_user;

    fn post_req(title: &str) -> CreatePostRequest {
        CreatePostRequest {
            title: title.to_string(),
            content: "body".into(),
            image_path: None,
        }
    }

    #[test]
    fn feed_lists_newest_post_first_with_author_nickname() {
        let pool = test_support::pool();
        let alice = test_support::create_user(&pool, "alice");
        let conn = pool.get().unwrap();

        insert_post(&conn, &alice.id, &post_req("first")).unwrap();
        insert_post(&conn, &alice.id, &post_req("second")).unwrap();

        let posts = list_all_posts(&conn).unwrap();
        assert_eq!(posts[0].title, "second");
        assert_eq!(posts[0].author_nickname, "alice-nick");
    }

    #[test]
    fn only_the_author_can_update_a_post() {
        let pool = test_support::pool();
        let alice = test_support::create_user(&pool, "alice");
        let bob = test_support::create_user(&pool, "bob");
        let conn = pool.get().unwrap();

        let post = insert_post(&conn, &alice.id, &post_req("hello")).unwrap();
        let update = UpdatePostRequest {
            title: Some("edited".into()),
            ..UpdatePostRequest::default()
        };
        let err = apply_post_update(&conn, &bob.id, &post.id, &update).unwrap_err();
        assert!(matches!(err, AppError::Forbidden));

        let updated = apply_post_update(&conn, &alice.id, &post.id, &update).unwrap();
        assert_eq!(updated.title, "edited");
    }

    #[test]
    fn like_toggle_flips_state_and_reports_count() {
        let pool = test_support::pool();
        let alice = test_support::create_user(&pool, "alice");
        let bob = test_support::create_user(&pool, "bob");
        let conn = pool.get().unwrap();

        let post = insert_post(&conn, &alice.id, &post_req("hello")).unwrap();

        let first = toggle_post_like(&conn, &bob.id, &post.id).unwrap();
        assert_eq!(first.message, "like added");
        assert_eq!(first.likes_count, 1);

        let second = toggle_post_like(&conn, &bob.id, &post.id).unwrap();
        assert_eq!(second.message, "like removed");
        assert_eq!(second.likes_count, 0);
    }

    #[test]
    fn comment_notifies_the_post_author() {
        let pool = test_support::pool();
        let alice = test_support::create_user(&pool, "alice");
        let bob = test_support::create_user(&pool, "bob");
        let conn = pool.get().unwrap();

        let post = insert_post(&conn, &alice.id, &post_req("hello")).unwrap();
        insert_comment(&conn, &bob, &post.id, "nice post").unwrap();

        let list = list_for_user(&conn, &alice.id).unwrap();
        assert_eq!(list.unread_count, 1);
        assert_eq!(list.notifications[0].notification_type, "comment");
        assert_eq!(list.notifications[0].actor_id.as_deref(), Some(bob.id.as_str()));
    }

    #[test]
    fn self_comment_does_not_notify() {
        let pool = test_support::pool();
        let alice = test_support::create_user(&pool, "alice");
        let conn = pool.get().unwrap();

        let post = insert_post(&conn, &alice.id, &post_req("hello")).unwrap();
        insert_comment(&conn, &alice, &post.id, "replying to myself").unwrap();

        let list = list_for_user(&conn, &alice.id).unwrap();
        assert!(list.notifications.is_empty());
    }

    #[test]
    fn comment_survives_notification_failure() {
        let pool = test_support::pool();
        let alice = test_support::create_user(&pool, "alice");
        let bob = test_support::create_user(&pool, "bob");
        let conn = pool.get().unwrap();

        let post = insert_post(&conn, &alice.id, &post_req("hello")).unwrap();
        conn.execute("DROP TABLE notifications", []).unwrap();

        let comment = insert_comment(&conn, &bob, &post.id, "still works").unwrap();
        assert_eq!(comment.content, "still works");
        assert_eq!(list_post_comments(&conn, &post.id).unwrap().len(), 1);
    }

    #[test]
    fn comments_list_ascending() {
        let pool = test_support::pool();
        let alice = test_support::create_user(&pool, "alice");
        let conn = pool.get().unwrap();

        let post = insert_post(&conn, &alice.id, &post_req("hello")).unwrap();
        insert_comment(&conn, &alice, &post.id, "first").unwrap();
        insert_comment(&conn, &alice, &post.id, "second").unwrap();

        let comments = list_post_comments(&conn, &post.id).unwrap();
        assert_eq!(comments[0].content, "first");
        assert_eq!(comments[1].content, "second");
    }

    #[test]
    fn deleting_a_post_cascades_comments_and_likes() {
        let pool = test_support::pool();
        let alice = test_support::create_user(&pool, "alice");
        let bob = test_support::create_user(&pool, "bob");
        let conn = pool.get().unwrap();

        let post = insert_post(&conn, &alice.id, &post_req("hello")).unwrap();
        insert_comment(&conn, &bob, &post.id, "nice").unwrap();
        toggle_post_like(&conn, &bob.id, &post.id).unwrap();

        remove_post(&conn, &alice.id, &post.id).unwrap();
        let comments: i64 = conn
            .query_row("SELECT COUNT(*) FROM comments", [], |r| r.get(0))
            .unwrap();
        let likes: i64 = conn
            .query_row("SELECT COUNT(*) FROM post_likes", [], |r| r.get(0))
            .unwrap();
        assert_eq!((comments, likes), (0, 0));
    }
}
