//! Main dashboard aggregation and the daily care checklist.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::NaiveDate;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use crate::db::models::{CalendarSchedule, CareLog, Pet};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::foods::{self, FoodGuide};
use crate::ownership::{ensure_can_write, WriteTarget};
use crate::routes::pets::load_owned_pet;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateCareItemRequest {
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCareItemRequest {
    pub content: Option<String>,
    pub is_complete: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct CareListBlock {
    pub items: Vec<CareLog>,
    pub completion_rate: f64,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct TrendPoint {
    pub month: String,
    pub weight: f64,
}

#[derive(Debug, Serialize)]
pub struct HealthTrend {
    pub recent_change: String,
    pub graph_data: Vec<TrendPoint>,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub care_list: CareListBlock,
    pub upcoming_schedules: Vec<CalendarSchedule>,
    pub health_trend: HealthTrend,
    pub food_guide: FoodGuide,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/pets/dashboard/{pet_id}", get(dashboard))
        .route("/pets/care-list/{pet_id}", post(create_care_item))
        .route(
            "/pets/carelogs/items/{item_id}",
            put(update_care_item).delete(delete_care_item),
        )
}

// --- Service layer ---

pub fn dashboard_for_pet(
    conn: &Connection,
    pet: &Pet,
    today: NaiveDate,
) -> AppResult<DashboardResponse> {
    Ok(DashboardResponse {
        care_list: care_list_block(conn, &pet.id, today)?,
        upcoming_schedules: upcoming_schedules(conn, &pet.id, today)?,
        health_trend: health_trend(conn, pet, today)?,
        food_guide: foods::sample_guide(2),
    })
}

pub fn care_list_block(conn: &Connection, pet_id: &str, today: NaiveDate) -> AppResult<CareListBlock> {
    let mut stmt = conn.prepare(
        "SELECT id, pet_id, log_date, content, is_complete, created_at
         FROM care_logs WHERE pet_id = ?1 AND log_date = ?2 ORDER BY created_at",
    )?;
    let items = stmt
        .query_map(params![pet_id, today.to_string()], CareLog::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    let total = items.len();
    let completed = items.iter().filter(|i| i.is_complete).count();
    // Defined as 0 when the list is empty; no division by zero.
    let completion_rate = if total > 0 {
        completed as f64 / total as f64
    } else {
        0.0
    };

    Ok(CareListBlock {
        items,
        completion_rate,
    })
}

fn upcoming_schedules(
    conn: &Connection,
    pet_id: &str,
    today: NaiveDate,
) -> AppResult<Vec<CalendarSchedule>> {
    let mut stmt = conn.prepare(
        "SELECT id, pet_id, schedule_date, content, category, created_at
         FROM calendar_schedules
         WHERE pet_id = ?1 AND schedule_date >= ?2
         ORDER BY schedule_date LIMIT 2",
    )?;
    let schedules = stmt
        .query_map(params![pet_id, today.to_string()], CalendarSchedule::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(schedules)
}

pub fn health_trend(conn: &Connection, pet: &Pet, today: NaiveDate) -> AppResult<HealthTrend> {
    // Two most recent weight-bearing entries, newest first.
    let mut stmt = conn.prepare(
        "SELECT log_date, weight FROM health_logs
         WHERE pet_id = ?1 AND weight IS NOT NULL
         ORDER BY log_date DESC, created_at DESC LIMIT 2",
    )?;
    let recent: Vec<(String, f64)> = stmt
        .query_map(params![pet.id], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    let recent_change = if recent.len() >= 2 {
        let change = recent[0].1 - recent[1].1;
        format!(
            "{}{:.1}kg",
            if change > 0.0 { "+" } else { "" },
            change
        )
    } else {
        "no change".to_string()
    };

    // Oldest first for the graph; a pet with no weighted entries gets a
    // single synthetic point from its registered weight.
    let graph_data: Vec<TrendPoint> = if recent.is_empty() {
        vec![TrendPoint {
            month: month_label(&today.to_string()),
            weight: pet.weight,
        }]
    } else {
        recent
            .iter()
            .rev()
            .map(|(date, weight)| TrendPoint {
                month: month_label(date),
                weight: *weight,
            })
            .collect()
    };

    Ok(HealthTrend {
        recent_change,
        graph_data,
    })
}

fn month_label(date: &str) -> String {
    date.parse::<NaiveDate>()
        .map(|d| d.format("%b").to_string())
        .unwrap_or_else(|_| date.to_string())
}

pub fn create_care_log(
    conn: &Connection,
    pet_id: &str,
    date: NaiveDate,
    content: &str,
) -> AppResult<CareLog> {
    let content = content.trim();
    if content.is_empty() {
        return Err(AppError::Validation("content is required".into()));
    }

    let id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO care_logs (id, pet_id, log_date, content) VALUES (?1, ?2, ?3, ?4)",
        params![id, pet_id, date.to_string(), content],
    )
    .map_err(|e| AppError::on_conflict(e, "this care item already exists for today"))?;

    load_care_log(conn, &id)
}

fn load_care_log(conn: &Connection, item_id: &str) -> AppResult<CareLog> {
    conn.query_row(
        "SELECT id, pet_id, log_date, content, is_complete, created_at
         FROM care_logs WHERE id = ?1",
        params![item_id],
        CareLog::from_row,
    )
    .map_err(|_| AppError::NotFound)
}

fn guard_care_log_write(conn: &Connection, user_id: &str, item_id: &str) -> AppResult<()> {
    let owner_id: String = conn
        .query_row(
            "SELECT p.owner_id FROM care_logs c JOIN pets p ON p.id = c.pet_id WHERE c.id = ?1",
            params![item_id],
            |r| r.get(0),
        )
        .map_err(|_| AppError::NotFound)?;
    ensure_can_write(user_id, WriteTarget::PetScoped { owner_id: &owner_id })
}

pub fn apply_care_log_update(
    conn: &Connection,
    user_id: &str,
    item_id: &str,
    update: &UpdateCareItemRequest,
) -> AppResult<CareLog> {
    guard_care_log_write(conn, user_id, item_id)?;
    conn.execute(
        "UPDATE care_logs SET
             content = COALESCE(?1, content),
             is_complete = COALESCE(?2, is_complete)
         WHERE id = ?3",
        params![update.content, update.is_complete, item_id],
    )
    .map_err(|e| AppError::on_conflict(e, "this care item already exists for today"))?;
    load_care_log(conn, item_id)
}

pub fn remove_care_log(conn: &Connection, user_id: &str, item_id: &str) -> AppResult<()> {
    guard_care_log_write(conn, user_id, item_id)?;
    conn.execute("DELETE FROM care_logs WHERE id = ?1", params![item_id])?;
    Ok(())
}

// --- Handlers ---

async fn dashboard(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(pet_id): Path<String>,
) -> AppResult<Json<DashboardResponse>> {
    let conn = state.db.get()?;
    let pet = load_owned_pet(&conn, &pet_id, &user.id)?;
    let today = chrono::Local::now().date_naive();
    Ok(Json(dashboard_for_pet(&conn, &pet, today)?))
}

async fn create_care_item(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(pet_id): Path<String>,
    Json(req): Json<CreateCareItemRequest>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let pet = load_owned_pet(&conn, &pet_id, &user.id)?;
    let today = chrono::Local::now().date_naive();
    let item = create_care_log(&conn, &pet.id, today, &req.content)?;
    Ok((StatusCode::CREATED, Json(item)).into_response())
}

async fn update_care_item(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(item_id): Path<String>,
    Json(update): Json<UpdateCareItemRequest>,
) -> AppResult<Json<CareLog>> {
    let conn = state.db.get()?;
    Ok(Json(apply_care_log_update(&conn, &user.id, &item_id, &update)?))
}

async fn delete_care_item(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(item_id): Path<String>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    remove_care_log(&conn, &user.id, &item_id)?;
    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "message": "care item deleted" })),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support;
    use crate::routes::pets::load_pet;

    fn today() -> NaiveDate {
        "2026-08-26".parse().unwrap()
    }

    fn insert_health_log(pool: &crate::state::DbPool, pet_id: &str, date: &str, weight: f64) {
        let conn = pool.get().unwrap();
        conn.execute(
            "INSERT INTO health_logs (id, pet_id, log_date, log_type, content, weight)
             VALUES (?1, ?2, ?3, 'checkup', 'weigh-in', ?4)",
            params![uuid::Uuid::now_v7().to_string(), pet_id, date, weight],
        )
        .unwrap();
    }

    #[test]
    fn empty_care_list_has_zero_completion_rate() {
        let pool = test_support::pool();
        let alice = test_support::create_user(&pool, "alice");
        let pet_id = test_support::create_pet(&pool, &alice.id, "Rex");
        let conn = pool.get().unwrap();

        let block = care_list_block(&conn, &pet_id, today()).unwrap();
        assert!(block.items.is_empty());
        assert_eq!(block.completion_rate, 0.0);
    }

    #[test]
    fn completion_rate_is_completed_over_total() {
        let pool = test_support::pool();
        let alice = test_support::create_user(&pool, "alice");
        let pet_id = test_support::create_pet(&pool, &alice.id, "Rex");
        let conn = pool.get().unwrap();

        let a = create_care_log(&conn, &pet_id, today(), "brush teeth").unwrap();
        create_care_log(&conn, &pet_id, today(), "trim nails").unwrap();
        apply_care_log_update(
            &conn,
            &alice.id,
            &a.id,
            &UpdateCareItemRequest {
                content: None,
                is_complete: Some(true),
            },
        )
        .unwrap();

        let block = care_list_block(&conn, &pet_id, today()).unwrap();
        assert_eq!(block.items.len(), 2);
        assert_eq!(block.completion_rate, 0.5);
    }

    #[test]
    fn duplicate_care_item_same_day_is_a_conflict() {
        let pool = test_support::pool();
        let alice = test_support::create_user(&pool, "alice");
        let pet_id = test_support::create_pet(&pool, &alice.id, "Rex");
        let conn = pool.get().unwrap();

        create_care_log(&conn, &pet_id, today(), "brush teeth").unwrap();
        let err = create_care_log(&conn, &pet_id, today(), "brush teeth").unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM care_logs", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn non_owner_cannot_update_care_item() {
        let pool = test_support::pool();
        let alice = test_support::create_user(&pool, "alice");
        let bob = test_support::create_user(&pool, "bob");
        let pet_id = test_support::create_pet(&pool, &alice.id, "Rex");
        let conn = pool.get().unwrap();

        let item = create_care_log(&conn, &pet_id, today(), "brush teeth").unwrap();
        let err = apply_care_log_update(
            &conn,
            &bob.id,
            &item.id,
            &UpdateCareItemRequest {
                content: None,
                is_complete: Some(true),
            },
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
    }

    #[test]
    fn trend_reports_signed_delta_from_two_latest_weights() {
        let pool = test_support::pool();
        let alice = test_support::create_user(&pool, "alice");
        let pet_id = test_support::create_pet(&pool, &alice.id, "Rex");
        insert_health_log(&pool, &pet_id, "2026-08-20", 10.0);
        insert_health_log(&pool, &pet_id, "2026-08-25", 10.5);

        let conn = pool.get().unwrap();
        let pet = load_pet(&conn, &pet_id).unwrap();
        let trend = health_trend(&conn, &pet, today()).unwrap();
        assert_eq!(trend.recent_change, "+0.5kg");
        // Oldest first
        assert_eq!(trend.graph_data[0].weight, 10.0);
        assert_eq!(trend.graph_data[1].weight, 10.5);
    }

    #[test]
    fn trend_with_weight_loss_has_no_plus_sign() {
        let pool = test_support::pool();
        let alice = test_support::create_user(&pool, "alice");
        let pet_id = test_support::create_pet(&pool, &alice.id, "Rex");
        insert_health_log(&pool, &pet_id, "2026-08-20", 10.5);
        insert_health_log(&pool, &pet_id, "2026-08-25", 10.0);

        let conn = pool.get().unwrap();
        let pet = load_pet(&conn, &pet_id).unwrap();
        let trend = health_trend(&conn, &pet, today()).unwrap();
        assert_eq!(trend.recent_change, "-0.5kg");
    }

    #[test]
    fn trend_without_logs_synthesizes_point_from_pet_weight() {
        let pool = test_support::pool();
        let alice = test_support::create_user(&pool, "alice");
        let pet_id = test_support::create_pet(&pool, &alice.id, "Rex");

        let conn = pool.get().unwrap();
        let pet = load_pet(&conn, &pet_id).unwrap();
        let trend = health_trend(&conn, &pet, today()).unwrap();
        assert_eq!(trend.recent_change, "no change");
        assert_eq!(trend.graph_data.len(), 1);
        assert_eq!(trend.graph_data[0].weight, pet.weight);
    }

    #[test]
    fn dashboard_limits_upcoming_schedules_to_two() {
        let pool = test_support::pool();
        let alice = test_support::create_user(&pool, "alice");
        let pet_id = test_support::create_pet(&pool, &alice.id, "Rex");
        let conn = pool.get().unwrap();

        for (i, date) in ["2026-08-27", "2026-08-30", "2026-09-05", "2026-08-01"]
            .iter()
            .enumerate()
        {
            conn.execute(
                "INSERT INTO calendar_schedules (id, pet_id, schedule_date, content, category)
                 VALUES (?1, ?2, ?3, ?4, 'clinic')",
                params![format!("s{i}"), pet_id, date, format!("visit {i}")],
            )
            .unwrap();
        }

        let pet = load_pet(&conn, &pet_id).unwrap();
        let dashboard = dashboard_for_pet(&conn, &pet, today()).unwrap();
        let dates: Vec<&str> = dashboard
            .upcoming_schedules
            .iter()
            .map(|s| s.schedule_date.as_str())
            .collect();
        // Ascending, past dates excluded, capped at 2.
        assert_eq!(dates, vec!["2026-08-27", "2026-08-30"]);
        assert_eq!(dashboard.food_guide.good_foods.len(), 2);
        assert_eq!(dashboard.food_guide.bad_foods.len(), 2);
    }
}
