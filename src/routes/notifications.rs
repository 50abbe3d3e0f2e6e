//! Per-user notifications and the fan-out helper other modules call.
//!
//! Fan-out is strictly best-effort: callers log and swallow a failed
//! `notify` so the triggering write (message, comment) stands on its own.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use rusqlite::{params, Connection};
use serde::Serialize;

use crate::db::models::Notification;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct NotificationList {
    pub notifications: Vec<Notification>,
    pub unread_count: i64,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(list_notifications))
        .route("/notifications/{notification_id}/read", post(mark_read))
        .route("/notifications/read-all", post(mark_all_read))
}

// --- Service layer ---

pub fn notify(
    conn: &Connection,
    user_id: &str,
    actor_id: &str,
    content: &str,
    notification_type: &str,
    link: Option<&str>,
) -> AppResult<()> {
    conn.execute(
        "INSERT INTO notifications (id, user_id, actor_id, content, notification_type, link)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            uuid::Uuid::now_v7().to_string(),
            user_id,
            actor_id,
            content,
            notification_type,
            link,
        ],
    )?;
    Ok(())
}

pub fn list_for_user(conn: &Connection, user_id: &str) -> AppResult<NotificationList> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, actor_id, content, notification_type, link, is_read, created_at
         FROM notifications WHERE user_id = ?1 ORDER BY created_at DESC, id DESC",
    )?;
    let notifications = stmt
        .query_map(params![user_id], Notification::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    let unread_count = notifications.iter().filter(|n| !n.is_read).count() as i64;
    Ok(NotificationList {
        notifications,
        unread_count,
    })
}

/// Idempotent: re-reading an already-read notification succeeds and changes
/// nothing. A notification owned by someone else reads as not-found.
pub fn mark_notification_read(
    conn: &Connection,
    user_id: &str,
    notification_id: &str,
) -> AppResult<()> {
    let exists: i64 = conn.query_row(
        "SELECT COUNT(*) FROM notifications WHERE id = ?1 AND user_id = ?2",
        params![notification_id, user_id],
        |r| r.get(0),
    )?;
    if exists == 0 {
        return Err(AppError::NotFound);
    }
    conn.execute(
        "UPDATE notifications SET is_read = 1 WHERE id = ?1 AND user_id = ?2",
        params![notification_id, user_id],
    )?;
    Ok(())
}

/// Touches only currently-unread rows; returns how many were affected.
pub fn mark_all_notifications_read(conn: &Connection, user_id: &str) -> AppResult<i64> {
    let updated = conn.execute(
        "UPDATE notifications SET is_read = 1 WHERE user_id = ?1 AND is_read = 0",
        params![user_id],
    )?;
    Ok(updated as i64)
}

// --- Handlers ---

async fn list_notifications(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<NotificationList>> {
    let conn = state.db.get()?;
    Ok(Json(list_for_user(&conn, &user.id)?))
}

async fn mark_read(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(notification_id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let conn = state.db.get()?;
    mark_notification_read(&conn, &user.id, &notification_id)?;
    Ok(Json(serde_json::json!({ "message": "notification read" })))
}

async fn mark_all_read(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<serde_json::Value>> {
    let conn = state.db.get()?;
    let updated = mark_all_notifications_read(&conn, &user.id)?;
    Ok(Json(serde_json::json!({ "updated_count": updated })))
}
