//! Month-scoped schedule listing and schedule CRUD.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use rusqlite::{params, Connection};
use serde::Deserialize;

use crate::db::models::CalendarSchedule;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::ownership::{ensure_can_write, WriteTarget};
use crate::routes::pets::{load_owned_pet, parse_date};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct MonthQuery {
    pub year: Option<String>,
    pub month: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateScheduleRequest {
    pub schedule_date: String,
    pub content: String,
    #[serde(default = "default_category")]
    pub category: String,
}

fn default_category() -> String {
    "etc".to_string()
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateScheduleRequest {
    pub schedule_date: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/pets/calendar/{pet_id}", get(month_view))
        // One path, two meanings: POST takes a pet id, the rest take a
        // schedule id.
        .route(
            "/pets/calendar/schedules/{id}",
            post(create_schedule)
                .get(get_schedule)
                .put(update_schedule)
                .delete(delete_schedule),
        )
}

// --- Service layer ---

/// Both parameters are required and must be numeric; the month filter is a
/// date-prefix match on the stored `YYYY-MM-DD` text.
pub fn parse_month_query(query: &MonthQuery) -> AppResult<(i32, u32)> {
    let year = query
        .year
        .as_deref()
        .ok_or_else(|| AppError::Validation("year is required".into()))?
        .parse::<i32>()
        .map_err(|_| AppError::Validation("year must be numeric".into()))?;
    let month = query
        .month
        .as_deref()
        .ok_or_else(|| AppError::Validation("month is required".into()))?
        .parse::<u32>()
        .map_err(|_| AppError::Validation("month must be numeric".into()))?;
    if !(1..=12).contains(&month) {
        return Err(AppError::Validation("month must be between 1 and 12".into()));
    }
    Ok((year, month))
}

pub fn schedules_for_month(
    conn: &Connection,
    pet_id: &str,
    year: i32,
    month: u32,
) -> AppResult<Vec<CalendarSchedule>> {
    let prefix = format!("{year:04}-{month:02}-");
    let mut stmt = conn.prepare(
        "SELECT id, pet_id, schedule_date, content, category, created_at
         FROM calendar_schedules
         WHERE pet_id = ?1 AND schedule_date LIKE ?2 || '%'
         ORDER BY schedule_date, created_at",
    )?;
    let schedules = stmt
        .query_map(params![pet_id, prefix], CalendarSchedule::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(schedules)
}

pub fn insert_schedule(
    conn: &Connection,
    pet_id: &str,
    req: &CreateScheduleRequest,
) -> AppResult<CalendarSchedule> {
    parse_date(&req.schedule_date)?;
    if req.content.trim().is_empty() {
        return Err(AppError::Validation("content is required".into()));
    }

    let id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO calendar_schedules (id, pet_id, schedule_date, content, category)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, pet_id, req.schedule_date, req.content.trim(), req.category],
    )?;
    load_schedule(conn, &id)
}

fn load_schedule(conn: &Connection, schedule_id: &str) -> AppResult<CalendarSchedule> {
    conn.query_row(
        "SELECT id, pet_id, schedule_date, content, category, created_at
         FROM calendar_schedules WHERE id = ?1",
        params![schedule_id],
        CalendarSchedule::from_row,
    )
    .map_err(|_| AppError::NotFound)
}

fn guard_schedule_write(conn: &Connection, user_id: &str, schedule_id: &str) -> AppResult<()> {
    let owner_id: String = conn
        .query_row(
            "SELECT p.owner_id FROM calendar_schedules s
             JOIN pets p ON p.id = s.pet_id WHERE s.id = ?1",
            params![schedule_id],
            |r| r.get(0),
        )
        .map_err(|_| AppError::NotFound)?;
    ensure_can_write(user_id, WriteTarget::PetScoped { owner_id: &owner_id })
}

pub fn apply_schedule_update(
    conn: &Connection,
    user_id: &str,
    schedule_id: &str,
    update: &UpdateScheduleRequest,
) -> AppResult<CalendarSchedule> {
    guard_schedule_write(conn, user_id, schedule_id)?;
    if let Some(ref date) = update.schedule_date {
        parse_date(date)?;
    }

    conn.execute(
        "UPDATE calendar_schedules SET
             schedule_date = COALESCE(?1, schedule_date),
             content = COALESCE(?2, content),
             category = COALESCE(?3, category)
         WHERE id = ?4",
        params![update.schedule_date, update.content, update.category, schedule_id],
    )?;
    load_schedule(conn, schedule_id)
}

pub fn remove_schedule(conn: &Connection, user_id: &str, schedule_id: &str) -> AppResult<()> {
    guard_schedule_write(conn, user_id, schedule_id)?;
    conn.execute(
        "DELETE FROM calendar_schedules WHERE id = ?1",
        params![schedule_id],
    )?;
    Ok(())
}

// --- Handlers ---

async fn month_view(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(pet_id): Path<String>,
    Query(query): Query<MonthQuery>,
) -> AppResult<Json<Vec<CalendarSchedule>>> {
    let (year, month) = parse_month_query(&query)?;
    let conn = state.db.get()?;
    let pet = load_owned_pet(&conn, &pet_id, &user.id)?;
    Ok(Json(schedules_for_month(&conn, &pet.id, year, month)?))
}

async fn create_schedule(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(pet_id): Path<String>,
    Json(req): Json<CreateScheduleRequest>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let pet = load_owned_pet(&conn, &pet_id, &user.id)?;
    let schedule = insert_schedule(&conn, &pet.id, &req)?;
    Ok((StatusCode::CREATED, Json(schedule)).into_response())
}

async fn get_schedule(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(schedule_id): Path<String>,
) -> AppResult<Json<CalendarSchedule>> {
    let conn = state.db.get()?;
    let schedule = load_schedule(&conn, &schedule_id)?;
    load_owned_pet(&conn, &schedule.pet_id, &user.id)?;
    Ok(Json(schedule))
}

async fn update_schedule(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(schedule_id): Path<String>,
    Json(update): Json<UpdateScheduleRequest>,
) -> AppResult<Json<CalendarSchedule>> {
    let conn = state.db.get()?;
    Ok(Json(apply_schedule_update(&conn, &user.id, &schedule_id, &update)?))
}

async fn delete_schedule(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(schedule_id): Path<String>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    remove_schedule(&conn, &user.id, &schedule_id)?;
    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "message": "schedule deleted" })),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support;

    fn schedule(date: &str, content: &str) -> CreateScheduleRequest {
        CreateScheduleRequest {
            schedule_date: date.to_string(),
            content: content.to_string(),
            category: "clinic".into(),
        }
    }

    #[test]
    fn month_query_requires_numeric_year_and_month() {
        let ok = MonthQuery {
            year: Some("2026".into()),
            month: Some("8".into()),
        };
        assert_eq!(parse_month_query(&ok).unwrap(), (2026, 8));

        let missing = MonthQuery {
            year: None,
            month: Some("8".into()),
        };
        assert!(matches!(
            parse_month_query(&missing).unwrap_err(),
            AppError::Validation(_)
        ));

        let junk = MonthQuery {
            year: Some("twenty".into()),
            month: Some("8".into()),
        };
        assert!(matches!(
            parse_month_query(&junk).unwrap_err(),
            AppError::Validation(_)
        ));

        let thirteen = MonthQuery {
            year: Some("2026".into()),
            month: Some("13".into()),
        };
        assert!(matches!(
            parse_month_query(&thirteen).unwrap_err(),
            AppError::Validation(_)
        ));
    }

    #[test]
    fn month_view_filters_by_prefix_and_sorts_ascending() {
        let pool = test_support::pool();
        let alice = test_support::create_user(&pool, "alice");
        let pet_id = test_support::create_pet(&pool, &alice.id, "Rex");
        let conn = pool.get().unwrap();

        insert_schedule(&conn, &pet_id, &schedule("2026-08-20", "vaccination")).unwrap();
        insert_schedule(&conn, &pet_id, &schedule("2026-08-05", "grooming")).unwrap();
        insert_schedule(&conn, &pet_id, &schedule("2026-09-01", "checkup")).unwrap();

        let listed = schedules_for_month(&conn, &pet_id, 2026, 8).unwrap();
        let dates: Vec<&str> = listed.iter().map(|s| s.schedule_date.as_str()).collect();
        assert_eq!(dates, vec!["2026-08-05", "2026-08-20"]);
    }

    #[test]
    fn single_digit_month_is_zero_padded_in_the_filter() {
        let pool = test_support::pool();
        let alice = test_support::create_user(&pool, "alice");
        let pet_id = test_support::create_pet(&pool, &alice.id, "Rex");
        let conn = pool.get().unwrap();

        insert_schedule(&conn, &pet_id, &schedule("2026-01-15", "new year walk")).unwrap();
        insert_schedule(&conn, &pet_id, &schedule("2026-11-15", "late autumn")).unwrap();

        let january = schedules_for_month(&conn, &pet_id, 2026, 1).unwrap();
        assert_eq!(january.len(), 1);
        assert_eq!(january[0].schedule_date, "2026-01-15");
    }

    #[test]
    fn schedule_content_is_required() {
        let pool = test_support::pool();
        let alice = test_support::create_user(&pool, "alice");
        let pet_id = test_support::create_pet(&pool, &alice.id, "Rex");
        let conn = pool.get().unwrap();

        let err = insert_schedule(&conn, &pet_id, &schedule("2026-08-20", "  ")).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn non_owner_schedule_update_is_forbidden() {
        let pool = test_support::pool();
        let alice = test_support::create_user(&pool, "alice");
        let bob = test_support::create_user(&pool, "bob");
        let pet_id = test_support::create_pet(&pool, &alice.id, "Rex");
        let conn = pool.get().unwrap();

        let s = insert_schedule(&conn, &pet_id, &schedule("2026-08-20", "vaccination")).unwrap();
        let update = UpdateScheduleRequest {
            content: Some("changed".into()),
            ..UpdateScheduleRequest::default()
        };
        let err = apply_schedule_update(&conn, &bob.id, &s.id, &update).unwrap_err();
        assert!(matches!(err, AppError::Forbidden));

        let updated = apply_schedule_update(&conn, &alice.id, &s.id, &update).unwrap();
        assert_eq!(updated.content, "changed");
    }
}
