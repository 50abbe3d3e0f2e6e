//! Walk logging and the weekly activity view.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use crate::db::models::WalkLog;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::ownership::{ensure_can_write, WriteTarget};
use crate::routes::pets::{load_owned_pet, parse_date};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateWalkLogRequest {
    pub log_date: String,
    #[serde(default = "default_log_type")]
    pub log_type: String,
    pub duration: i64,
    pub distance: Option<f64>,
}

fn default_log_type() -> String {
    "walk".to_string()
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateWalkLogRequest {
    pub log_date: Option<String>,
    pub log_type: Option<String>,
    pub duration: Option<i64>,
    pub distance: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct TodaySummary {
    pub duration: i64,
    pub distance: f64,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct DaySlot {
    pub day: String,
    pub duration: i64,
}

#[derive(Debug, Serialize)]
pub struct ActivityPage {
    pub today_summary: TodaySummary,
    pub weekly_analysis: Vec<DaySlot>,
    pub recent_logs: Vec<WalkLog>,
}

pub fn router() -> Router<AppState> {
    // One path, two meanings: POST takes a pet id, the rest take a log id.
    Router::new()
        .route("/pets/activities/{pet_id}", get(activity_page))
        .route(
            "/pets/activities/logs/{id}",
            post(create_walk_log)
                .get(get_walk_log)
                .put(update_walk_log)
                .delete(delete_walk_log),
        )
}

// --- Service layer ---

pub fn activity_page_for_pet(
    conn: &Connection,
    pet_id: &str,
    today: NaiveDate,
) -> AppResult<ActivityPage> {
    Ok(ActivityPage {
        today_summary: today_summary(conn, pet_id, today)?,
        weekly_analysis: weekly_analysis(conn, pet_id, today)?,
        recent_logs: recent_walk_logs(conn, pet_id, 5)?,
    })
}

fn today_summary(conn: &Connection, pet_id: &str, today: NaiveDate) -> AppResult<TodaySummary> {
    // COALESCE keeps an empty day reading as zero rather than NULL.
    let (duration, distance) = conn.query_row(
        "SELECT COALESCE(SUM(duration), 0), COALESCE(SUM(distance), 0.0)
         FROM walk_logs WHERE pet_id = ?1 AND log_date = ?2",
        params![pet_id, today.to_string()],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok(TodaySummary { duration, distance })
}

/// Per-day duration sums for the trailing week, oldest of the seven first.
/// Every calendar day gets a slot even with nothing logged.
pub fn weekly_analysis(
    conn: &Connection,
    pet_id: &str,
    today: NaiveDate,
) -> AppResult<Vec<DaySlot>> {
    let mut stmt = conn.prepare(
        "SELECT COALESCE(SUM(duration), 0) FROM walk_logs
         WHERE pet_id = ?1 AND log_date = ?2",
    )?;

    let mut slots = Vec::with_capacity(7);
    for offset in (0..7).rev() {
        let day = today - chrono::Duration::days(offset);
        let duration: i64 = stmt.query_row(params![pet_id, day.to_string()], |r| r.get(0))?;
        slots.push(DaySlot {
            day: day.format("%a").to_string(),
            duration,
        });
    }
    Ok(slots)
}

fn recent_walk_logs(conn: &Connection, pet_id: &str, limit: usize) -> AppResult<Vec<WalkLog>> {
    let mut stmt = conn.prepare(
        "SELECT id, pet_id, log_date, log_type, duration, distance, created_at
         FROM walk_logs WHERE pet_id = ?1
         ORDER BY log_date DESC, created_at DESC LIMIT ?2",
    )?;
    let logs = stmt
        .query_map(params![pet_id, limit], WalkLog::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(logs)
}

pub fn insert_walk_log(
    conn: &Connection,
    pet_id: &str,
    req: &CreateWalkLogRequest,
) -> AppResult<WalkLog> {
    parse_date(&req.log_date)?;
    if req.duration < 0 {
        return Err(AppError::Validation("duration must not be negative".into()));
    }

    let id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO walk_logs (id, pet_id, log_date, log_type, duration, distance)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![id, pet_id, req.log_date, req.log_type, req.duration, req.distance],
    )?;
    load_walk_log(conn, &id)
}

pub fn load_walk_log(conn: &Connection, log_id: &str) -> AppResult<WalkLog> {
    conn.query_row(
        "SELECT id, pet_id, log_date, log_type, duration, distance, created_at
         FROM walk_logs WHERE id = ?1",
        params![log_id],
        WalkLog::from_row,
    )
    .map_err(|_| AppError::NotFound)
}

fn guard_walk_log_write(conn: &Connection, user_id: &str, log_id: &str) -> AppResult<()> {
    let owner_id: String = conn
        .query_row(
            "SELECT p.owner_id FROM walk_logs w JOIN pets p ON p.id = w.pet_id WHERE w.id = ?1",
            params![log_id],
            |r| r.get(0),
        )
        .map_err(|_| AppError::NotFound)?;
    ensure_can_write(user_id, WriteTarget::PetScoped { owner_id: &owner_id })
}

pub fn apply_walk_log_update(
    conn: &Connection,
    user_id: &str,
    log_id: &str,
    update: &UpdateWalkLogRequest,
) -> AppResult<WalkLog> {
    guard_walk_log_write(conn, user_id, log_id)?;
    if let Some(ref date) = update.log_date {
        parse_date(date)?;
    }
    if matches!(update.duration, Some(d) if d < 0) {
        return Err(AppError::Validation("duration must not be negative".into()));
    }

    conn.execute(
        "UPDATE walk_logs SET
             log_date = COALESCE(?1, log_date),
             log_type = COALESCE(?2, log_type),
             duration = COALESCE(?3, duration),
             distance = COALESCE(?4, distance)
         WHERE id = ?5",
        params![update.log_date, update.log_type, update.duration, update.distance, log_id],
    )?;
    load_walk_log(conn, log_id)
}

pub fn remove_walk_log(conn: &Connection, user_id: &str, log_id: &str) -> AppResult<()> {
    guard_walk_log_write(conn, user_id, log_id)?;
    conn.execute("DELETE FROM walk_logs WHERE id = ?1", params![log_id])?;
    Ok(())
}

// --- Handlers ---

async fn activity_page(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(pet_id): Path<String>,
) -> AppResult<Json<ActivityPage>> {
    let conn = state.db.get()?;
    let pet = load_owned_pet(&conn, &pet_id, &user.id)?;
    let today = chrono::Local::now().date_naive();
    Ok(Json(activity_page_for_pet(&conn, &pet.id, today)?))
}

async fn create_walk_log(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(pet_id): Path<String>,
    Json(req): Json<CreateWalkLogRequest>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let pet = load_owned_pet(&conn, &pet_id, &user.id)?;
    let log = insert_walk_log(&conn, &pet.id, &req)?;
    Ok((StatusCode::CREATED, Json(log)).into_response())
}

async fn get_walk_log(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(log_id): Path<String>,
) -> AppResult<Json<WalkLog>> {
    let conn = state.db.get()?;
    let log = load_walk_log(&conn, &log_id)?;
    // Reads are owner-scoped like the rest of the pet tree.
    load_owned_pet(&conn, &log.pet_id, &user.id)?;
    Ok(Json(log))
}

async fn update_walk_log(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(log_id): Path<String>,
    Json(update): Json<UpdateWalkLogRequest>,
) -> AppResult<Json<WalkLog>> {
    let conn = state.db.get()?;
    Ok(Json(apply_walk_log_update(&conn, &user.id, &log_id, &update)?))
}

async fn delete_walk_log(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(log_id): Path<String>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    remove_walk_log(&conn, &user.id, &log_id)?;
    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "message": "walk log deleted" })),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support;

    fn today() -> NaiveDate {
        "2026-08-26".parse().unwrap()
    }

    fn walk(date: &str, duration: i64, distance: Option<f64>) -> CreateWalkLogRequest {
        CreateWalkLogRequest {
            log_date: date.to_string(),
            log_type: "walk".into(),
            duration,
            distance,
        }
    }

    #[test]
    fn weekly_series_has_seven_slots_even_with_no_logs() {
        let pool = test_support::pool();
        let alice = test_support::create_user(&pool, "alice");
        let pet_id = test_support::create_pet(&pool, &alice.id, "Rex");
        let conn = pool.get().unwrap();

        let slots = weekly_analysis(&conn, &pet_id, today()).unwrap();
        assert_eq!(slots.len(), 7);
        assert!(slots.iter().all(|s| s.duration == 0));
        // 2026-08-26 is a Wednesday; the window starts the previous Thursday.
        assert_eq!(slots[0].day, "Thu");
        assert_eq!(slots[6].day, "Wed");
    }

    #[test]
    fn weekly_series_sums_per_day_and_ignores_older_logs() {
        let pool = test_support::pool();
        let alice = test_support::create_user(&pool, "alice");
        let pet_id = test_support::create_pet(&pool, &alice.id, "Rex");
        let conn = pool.get().unwrap();

        insert_walk_log(&conn, &pet_id, &walk("2026-08-26", 20, Some(1.5))).unwrap();
        insert_walk_log(&conn, &pet_id, &walk("2026-08-26", 10, None)).unwrap();
        insert_walk_log(&conn, &pet_id, &walk("2026-08-24", 15, None)).unwrap();
        // Outside the trailing window.
        insert_walk_log(&conn, &pet_id, &walk("2026-08-01", 60, None)).unwrap();

        let slots = weekly_analysis(&conn, &pet_id, today()).unwrap();
        assert_eq!(slots[6].duration, 30);
        assert_eq!(slots[4].duration, 15);
        assert_eq!(slots.iter().map(|s| s.duration).sum::<i64>(), 45);
    }

    #[test]
    fn today_summary_treats_null_sums_as_zero() {
        let pool = test_support::pool();
        let alice = test_support::create_user(&pool, "alice");
        let pet_id = test_support::create_pet(&pool, &alice.id, "Rex");
        let conn = pool.get().unwrap();

        let summary = today_summary(&conn, &pet_id, today()).unwrap();
        assert_eq!(summary.duration, 0);
        assert_eq!(summary.distance, 0.0);

        insert_walk_log(&conn, &pet_id, &walk("2026-08-26", 20, Some(1.5))).unwrap();
        insert_walk_log(&conn, &pet_id, &walk("2026-08-26", 10, None)).unwrap();
        let summary = today_summary(&conn, &pet_id, today()).unwrap();
        assert_eq!(summary.duration, 30);
        assert_eq!(summary.distance, 1.5);
    }

    #[test]
    fn recent_logs_are_capped_at_five_newest_first() {
        let pool = test_support::pool();
        let alice = test_support::create_user(&pool, "alice");
        let pet_id = test_support::create_pet(&pool, &alice.id, "Rex");
        let conn = pool.get().unwrap();

        for day in 20..27 {
            insert_walk_log(&conn, &pet_id, &walk(&format!("2026-08-{day}"), 10, None)).unwrap();
        }

        let page = activity_page_for_pet(&conn, &pet_id, today()).unwrap();
        assert_eq!(page.recent_logs.len(), 5);
        assert_eq!(page.recent_logs[0].log_date, "2026-08-26");
        assert_eq!(page.recent_logs[4].log_date, "2026-08-22");
    }

    #[test]
    fn negative_duration_fails_validation() {
        let pool = test_support::pool();
        let alice = test_support::create_user(&pool, "alice");
        let pet_id = test_support::create_pet(&pool, &alice.id, "Rex");
        let conn = pool.get().unwrap();

        let err = insert_walk_log(&conn, &pet_id, &walk("2026-08-26", -5, None)).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn non_owner_cannot_delete_walk_log() {
        let pool = test_support::pool();
        let alice = test_support::create_user(&pool, "alice");
        let bob = test_support::create_user(&pool, "bob");
        let pet_id = test_support::create_pet(&pool, &alice.id, "Rex");
        let conn = pool.get().unwrap();

        let log = insert_walk_log(&conn, &pet_id, &walk("2026-08-26", 20, None)).unwrap();
        let err = remove_walk_log(&conn, &bob.id, &log.id).unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
        remove_walk_log(&conn, &alice.id, &log.id).unwrap();
    }
}
