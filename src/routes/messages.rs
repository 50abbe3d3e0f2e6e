//! Private messaging: conversation list, thread view, and send.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::db::models::Message;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::routes::notifications::notify;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub receiver_username: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct Conversation {
    pub counterpart_username: String,
    pub counterpart_nickname: String,
    pub last_message: Message,
    pub unread_count: i64,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/messages", get(list_conversations).post(send_message))
        .route("/messages/{username}", get(message_thread))
}

// --- Service layer ---

fn resolve_user(conn: &Connection, username: &str) -> AppResult<(String, String)> {
    conn.query_row(
        "SELECT id, nickname FROM users WHERE username = ?1",
        params![username],
        |r| Ok((r.get(0)?, r.get(1)?)),
    )
    .map_err(|_| AppError::NotFound)
}

/// Persist a message and fan out a notification to the receiver. The message
/// stands even when the notification insert fails.
pub fn create_message(
    conn: &Connection,
    sender: &CurrentUser,
    req: &SendMessageRequest,
) -> AppResult<Message> {
    let content = req.content.trim();
    if content.is_empty() {
        return Err(AppError::Validation("content is required".into()));
    }
    let (receiver_id, _) = resolve_user(conn, &req.receiver_username)?;
    if receiver_id == sender.id {
        return Err(AppError::Validation("cannot message yourself".into()));
    }

    let id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO messages (id, sender_id, receiver_id, content) VALUES (?1, ?2, ?3, ?4)",
        params![id, sender.id, receiver_id, content],
    )?;

    let body = format!("new message from {}", sender.nickname);
    let link = format!("/messages/{}", sender.username);
    if let Err(e) = notify(conn, &receiver_id, &sender.id, &body, "message", Some(&link)) {
        tracing::warn!("message notification failed: {}", e);
    }

    conn.query_row(
        "SELECT id, sender_id, receiver_id, content, sent_at, is_read
         FROM messages WHERE id = ?1",
        params![id],
        Message::from_row,
    )
    .map_err(AppError::from)
}

/// One entry per counterpart, carrying the newest message between the two
/// parties, ordered newest conversation first.
pub fn conversations_for(conn: &Connection, user_id: &str) -> AppResult<Vec<Conversation>> {
    let mut stmt = conn.prepare(
        "SELECT CASE WHEN m.sender_id = ?1 THEN m.receiver_id ELSE m.sender_id END AS counterpart,
                MAX(m.sent_at || m.id) AS latest
         FROM messages m
         WHERE m.sender_id = ?1 OR m.receiver_id = ?1
         GROUP BY counterpart
         ORDER BY latest DESC",
    )?;
    let counterparts = stmt
        .query_map(params![user_id], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    let mut conversations = Vec::with_capacity(counterparts.len());
    for counterpart_id in counterparts {
        let (username, nickname): (String, String) = conn.query_row(
            "SELECT username, nickname FROM users WHERE id = ?1",
            params![counterpart_id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )?;
        let last_message = conn
            .query_row(
                "SELECT id, sender_id, receiver_id, content, sent_at, is_read
                 FROM messages
                 WHERE (sender_id = ?1 AND receiver_id = ?2)
                    OR (sender_id = ?2 AND receiver_id = ?1)
                 ORDER BY sent_at DESC, id DESC LIMIT 1",
                params![user_id, counterpart_id],
                Message::from_row,
            )
            .optional()?;
        let Some(last_message) = last_message else {
            continue;
        };
        let unread_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM messages
             WHERE sender_id = ?2 AND receiver_id = ?1 AND is_read = 0",
            params![user_id, counterpart_id],
            |r| r.get(0),
        )?;
        conversations.push(Conversation {
            counterpart_username: username,
            counterpart_nickname: nickname,
            last_message,
            unread_count,
        });
    }
    Ok(conversations)
}

/// Full two-party thread, oldest first. Viewing marks the caller's incoming
/// half as read.
pub fn thread_with(
    conn: &Connection,
    user_id: &str,
    counterpart_username: &str,
) -> AppResult<Vec<Message>> {
    let (counterpart_id, _) = resolve_user(conn, counterpart_username)?;

    conn.execute(
        "UPDATE messages SET is_read = 1
         WHERE sender_id = ?2 AND receiver_id = ?1 AND is_read = 0",
        params![user_id, counterpart_id],
    )?;

    let mut stmt = conn.prepare(
        "SELECT id, sender_id, receiver_id, content, sent_at, is_read
         FROM messages
         WHERE (sender_id = ?1 AND receiver_id = ?2)
            OR (sender_id = ?2 AND receiver_id = ?1)
         ORDER BY sent_at, id",
    )?;
    let messages = stmt
        .query_map(params![user_id, counterpart_id], Message::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(messages)
}

// --- Handlers ---

async fn list_conversations(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<Vec<Conversation>>> {
    let conn = state.db.get()?;
    Ok(Json(conversations_for(&conn, &user.id)?))
}

async fn send_message(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<SendMessageRequest>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let message = create_message(&conn, &user, &req)?;
    Ok((StatusCode::CREATED, Json(message)).into_response())
}

async fn message_thread(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(username): Path<String>,
) -> AppResult<Json<Vec<Message>>> {
    let conn = state.db.get()?;
    Ok(Json(thread_with(&conn, &user.id, &username)?))
}
