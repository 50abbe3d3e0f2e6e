use rand::Rng;
use rusqlite::{params, Connection};
use serde::Serialize;

use crate::config::AuthConfig;
use crate::error::AppResult;

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Issue a fresh access/refresh pair for a user. Tokens are opaque random
/// strings stored server-side with their expiry.
pub fn issue_pair(conn: &Connection, user_id: &str, auth: &AuthConfig) -> AppResult<TokenPair> {
    let access = store_token(conn, user_id, "access", auth.access_hours)?;
    let refresh = store_token(conn, user_id, "refresh", auth.refresh_hours)?;
    Ok(TokenPair { access, refresh })
}

fn store_token(conn: &Connection, user_id: &str, kind: &str, hours: u64) -> AppResult<String> {
    let token = generate_token();
    let id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO auth_tokens (id, user_id, token, kind, expires_at)
         VALUES (?1, ?2, ?3, ?4, datetime('now', ?5))",
        params![id, user_id, token, kind, format!("+{} hours", hours)],
    )?;
    Ok(token)
}

/// Drop a user's tokens, e.g. after a password change.
pub fn revoke_all(conn: &Connection, user_id: &str) -> AppResult<()> {
    conn.execute(
        "DELETE FROM auth_tokens WHERE user_id = ?1",
        params![user_id],
    )?;
    Ok(())
}

/// Generate a cryptographically random 32-byte hex token.
fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
