use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use crate::auth::{password, tokens};
use crate::config::AuthConfig;
use crate::db::models::User;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::state::AppState;

// --- Payloads ---

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub nickname: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub email: Option<String>,
    pub nickname: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

/// Public view of a user; never carries the credential.
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: String,
    pub username: String,
    pub email: String,
    pub nickname: String,
    pub created_at: String,
}

impl From<User> for UserSummary {
    fn from(user: User) -> Self {
        UserSummary {
            id: user.id,
            username: user.username,
            email: user.email,
            nickname: user.nickname,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub username: String,
    pub nickname: String,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/register", post(register))
        .route("/users/login", post(login))
        .route(
            "/users/profile",
            get(get_profile).put(update_profile).delete(delete_profile),
        )
        .route("/users/search", get(search))
}

// --- Service layer ---

pub fn create_user(conn: &Connection, req: &RegisterRequest) -> AppResult<String> {
    for (field, value) in [
        ("username", &req.username),
        ("email", &req.email),
        ("nickname", &req.nickname),
        ("password", &req.password),
    ] {
        if value.trim().is_empty() {
            return Err(AppError::Validation(format!("{field} is required")));
        }
    }

    let id = uuid::Uuid::now_v7().to_string();
    let hash = password::hash(&req.password)?;
    conn.execute(
        "INSERT INTO users (id, username, email, nickname, password_hash)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, req.username.trim(), req.email.trim(), req.nickname.trim(), hash],
    )
    .map_err(|e| AppError::on_conflict(e, "username, email, or nickname is already in use"))?;

    Ok(id)
}

pub fn verify_login(conn: &Connection, username: &str, plaintext: &str) -> AppResult<User> {
    let user = conn
        .query_row(
            "SELECT id, username, email, nickname, password_hash, created_at
             FROM users WHERE username = ?1",
            params![username],
            |row| {
                Ok(User {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    email: row.get(2)?,
                    nickname: row.get(3)?,
                    password_hash: row.get(4)?,
                    created_at: row.get(5)?,
                })
            },
        )
        .map_err(|_| AppError::Unauthorized)?;

    if !password::verify(plaintext, &user.password_hash) {
        return Err(AppError::Unauthorized);
    }
    Ok(user)
}

pub fn login_user(
    conn: &Connection,
    auth: &AuthConfig,
    username: &str,
    plaintext: &str,
) -> AppResult<(tokens::TokenPair, UserSummary)> {
    let user = verify_login(conn, username, plaintext)?;
    let pair = tokens::issue_pair(conn, &user.id, auth)?;
    Ok((pair, user.into()))
}

pub fn load_profile(conn: &Connection, user_id: &str) -> AppResult<UserSummary> {
    conn.query_row(
        "SELECT id, username, email, nickname, created_at FROM users WHERE id = ?1",
        params![user_id],
        |row| {
            Ok(UserSummary {
                id: row.get(0)?,
                username: row.get(1)?,
                email: row.get(2)?,
                nickname: row.get(3)?,
                created_at: row.get(4)?,
            })
        },
    )
    .map_err(|_| AppError::NotFound)
}

pub fn apply_profile_update(
    conn: &Connection,
    user_id: &str,
    update: &UpdateProfileRequest,
) -> AppResult<UserSummary> {
    let password_hash = match update.password.as_deref() {
        Some(p) if !p.trim().is_empty() => Some(password::hash(p)?),
        Some(_) => return Err(AppError::Validation("password must not be empty".into())),
        None => None,
    };

    conn.execute(
        "UPDATE users SET
             email = COALESCE(?1, email),
             nickname = COALESCE(?2, nickname),
             password_hash = COALESCE(?3, password_hash)
         WHERE id = ?4",
        params![update.email, update.nickname, password_hash, user_id],
    )
    .map_err(|e| AppError::on_conflict(e, "email or nickname is already in use"))?;

    // A credential change invalidates every outstanding token.
    if password_hash.is_some() {
        tokens::revoke_all(conn, user_id)?;
    }

    load_profile(conn, user_id)
}

pub fn delete_account(conn: &Connection, user_id: &str) -> AppResult<()> {
    // Hard delete; pets, logs, posts, and tokens all cascade.
    let affected = conn.execute("DELETE FROM users WHERE id = ?1", params![user_id])?;
    if affected == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

pub fn search_users(conn: &Connection, needle: &str) -> AppResult<Vec<SearchHit>> {
    let pattern = format!("%{}%", needle);
    let mut stmt = conn.prepare(
        "SELECT id, username, nickname FROM users
         WHERE username LIKE ?1 OR nickname LIKE ?1
         ORDER BY username LIMIT 20",
    )?;
    let hits = stmt
        .query_map(params![pattern], |row| {
            Ok(SearchHit {
                id: row.get(0)?,
                username: row.get(1)?,
                nickname: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(hits)
}

// --- Handlers ---

async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    create_user(&conn, &req)?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "message": "registration complete" })),
    )
        .into_response())
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<serde_json::Value>> {
    if req.username.is_empty() || req.password.is_empty() {
        return Err(AppError::Validation(
            "username and password are required".into(),
        ));
    }
    let conn = state.db.get()?;
    let (pair, user) = login_user(&conn, &state.config.auth, &req.username, &req.password)?;
    Ok(Json(serde_json::json!({
        "access": pair.access,
        "refresh": pair.refresh,
        "user": user,
    })))
}

async fn get_profile(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<UserSummary>> {
    let conn = state.db.get()?;
    Ok(Json(load_profile(&conn, &user.id)?))
}

async fn update_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(update): Json<UpdateProfileRequest>,
) -> AppResult<Json<UserSummary>> {
    let conn = state.db.get()?;
    Ok(Json(apply_profile_update(&conn, &user.id, &update)?))
}

async fn delete_profile(State(state): State<AppState>, user: CurrentUser) -> AppResult<Response> {
    let conn = state.db.get()?;
    delete_account(&conn, &user.id)?;
    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "message": "account deleted" })),
    )
        .into_response())
}

async fn search(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<Vec<SearchHit>>> {
    let needle = query
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| AppError::Validation("query parameter q is required".into()))?;
    let conn = state.db.get()?;
    Ok(Json(search_users(&conn, needle)?))
}
