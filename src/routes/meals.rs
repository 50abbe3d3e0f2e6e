//! Meal log listing and CRUD.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};
use rusqlite::{params, Connection};
use serde::Deserialize;

use crate::db::models::MealLog;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::ownership::{ensure_can_write, WriteTarget};
use crate::routes::pets::{load_owned_pet, parse_date};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateMealLogRequest {
    pub log_date: String,
    pub food_type: String,
    pub food_name: String,
    pub quantity_g: f64,
    pub calorie: f64,
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateMealLogRequest {
    pub log_date: Option<String>,
    pub food_type: Option<String>,
    pub food_name: Option<String>,
    pub quantity_g: Option<f64>,
    pub calorie: Option<f64>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/pets/meals/{pet_id}", get(list_meal_logs).post(create_meal_log))
        .route(
            "/pets/meals/logs/{log_id}",
            put(update_meal_log).delete(delete_meal_log),
        )
}

// --- Service layer ---

pub fn list_logs(conn: &Connection, pet_id: &str) -> AppResult<Vec<MealLog>> {
    let mut stmt = conn.prepare(
        "SELECT id, pet_id, log_date, food_type, food_name, quantity_g, calorie, created_at
         FROM meal_logs WHERE pet_id = ?1
         ORDER BY log_date DESC, created_at DESC",
    )?;
    let logs = stmt
        .query_map(params![pet_id], MealLog::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(logs)
}

pub fn insert_meal_log(
    conn: &Connection,
    pet_id: &str,
    req: &CreateMealLogRequest,
) -> AppResult<MealLog> {
    parse_date(&req.log_date)?;
    if req.food_name.trim().is_empty() {
        return Err(AppError::Validation("food_name is required".into()));
    }
    if req.quantity_g < 0.0 || req.calorie < 0.0 {
        return Err(AppError::Validation(
            "quantity and calories must not be negative".into(),
        ));
    }

    let id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO meal_logs (id, pet_id, log_date, food_type, food_name, quantity_g, calorie)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            id,
            pet_id,
            req.log_date,
            req.food_type,
            req.food_name.trim(),
            req.quantity_g,
            req.calorie,
        ],
    )?;
    load_meal_log(conn, &id)
}

fn load_meal_log(conn: &Connection, log_id: &str) -> AppResult<MealLog> {
    conn.query_row(
        "SELECT id, pet_id, log_date, food_type, food_name, quantity_g, calorie, created_at
         FROM meal_logs WHERE id = ?1",
        params![log_id],
        MealLog::from_row,
    )
    .map_err(|_| AppError::NotFound)
}

fn guard_meal_log_write(conn: &Connection, user_id: &str, log_id: &str) -> AppResult<()> {
    let owner_id: String = conn
        .query_row(
            "SELECT p.owner_id FROM meal_logs m JOIN pets p ON p.id = m.pet_id WHERE m.id = ?1",
            params![log_id],
            |r| r.get(0),
        )
        .map_err(|_| AppError::NotFound)?;
    ensure_can_write(user_id, WriteTarget::PetScoped { owner_id: &owner_id })
}

pub fn apply_meal_log_update(
    conn: &Connection,
    user_id: &str,
    log_id: &str,
    update: &UpdateMealLogRequest,
) -> AppResult<MealLog> {
    guard_meal_log_write(conn, user_id, log_id)?;
    if let Some(ref date) = update.log_date {
        parse_date(date)?;
    }

    conn.execute(
        "UPDATE meal_logs SET
             log_date = COALESCE(?1, log_date),
             food_type = COALESCE(?2, food_type),
             food_name = COALESCE(?3, food_name),
             quantity_g = COALESCE(?4, quantity_g),
             calorie = COALESCE(?5, calorie)
         WHERE id = ?6",
        params![
            update.log_date,
            update.food_type,
            update.food_name,
            update.quantity_g,
            update.calorie,
            log_id,
        ],
    )?;
    load_meal_log(conn, log_id)
}

pub fn remove_meal_log(conn: &Connection, user_id: &str, log_id: &str) -> AppResult<()> {
    guard_meal_log_write(conn, user_id, log_id)?;
    conn.execute("DELETE FROM meal_logs WHERE id = ?1", params![log_id])?;
    Ok(())
}

// --- Handlers ---

async fn list_meal_logs(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(pet_id): Path<String>,
) -> AppResult<Json<Vec<MealLog>>> {
    let conn = state.db.get()?;
    let pet = load_owned_pet(&conn, &pet_id, &user.id)?;
    Ok(Json(list_logs(&conn, &pet.id)?))
}

async fn create_meal_log(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(pet_id): Path<String>,
    Json(req): Json<CreateMealLogRequest>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let pet = load_owned_pet(&conn, &pet_id, &user.id)?;
    let log = insert_meal_log(&conn, &pet.id, &req)?;
    Ok((StatusCode::CREATED, Json(log)).into_response())
}

async fn update_meal_log(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(log_id): Path<String>,
    Json(update): Json<UpdateMealLogRequest>,
) -> AppResult<Json<MealLog>> {
    let conn = state.db.get()?;
    Ok(Json(apply_meal_log_update(&conn, &user.id, &log_id, &update)?))
}

async fn delete_meal_log(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(log_id): Path<String>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    remove_meal_log(&conn, &user.id, &log_id)?;
    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "message": "meal log deleted" })),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support;

    fn meal(date: &str, name: &str) -> CreateMealLogRequest {
        CreateMealLogRequest {
            log_date: date.to_string(),
            food_type: "kibble".into(),
            food_name: name.to_string(),
            quantity_g: 120.0,
            calorie: 350.0,
        }
    }

    #[test]
    fn logs_list_newest_date_first() {
        let pool = test_support::pool();
        let alice = test_support::create_user(&pool, "alice");
        let pet_id = test_support::create_pet(&pool, &alice.id, "Rex");
        let conn = pool.get().unwrap();

        insert_meal_log(&conn, &pet_id, &meal("2026-08-24", "salmon mix")).unwrap();
        insert_meal_log(&conn, &pet_id, &meal("2026-08-26", "chicken mix")).unwrap();

        let logs = list_logs(&conn, &pet_id).unwrap();
        assert_eq!(logs[0].food_name, "chicken mix");
        assert_eq!(logs[1].food_name, "salmon mix");
    }

    #[test]
    fn negative_quantity_fails_validation() {
        let pool = test_support::pool();
        let alice = test_support::create_user(&pool, "alice");
        let pet_id = test_support::create_pet(&pool, &alice.id, "Rex");
        let conn = pool.get().unwrap();

        let mut req = meal("2026-08-26", "kibble");
        req.quantity_g = -1.0;
        let err = insert_meal_log(&conn, &pet_id, &req).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn non_owner_meal_update_is_forbidden() {
        let pool = test_support::pool();
        let alice = test_support::create_user(&pool, "alice");
        let bob = test_support::create_user(&pool, "bob");
        let pet_id = test_support::create_pet(&pool, &alice.id, "Rex");
        let conn = pool.get().unwrap();

        let log = insert_meal_log(&conn, &pet_id, &meal("2026-08-26", "kibble")).unwrap();
        let update = UpdateMealLogRequest {
            calorie: Some(400.0),
            ..UpdateMealLogRequest::default()
        };
        let err = apply_meal_log_update(&conn, &bob.id, &log.id, &update).unwrap_err();
        assert!(matches!(err, AppError::Forbidden));

        let updated = apply_meal_log_update(&conn, &alice.id, &log.id, &update).unwrap();
        assert_eq!(updated.calorie, 400.0);
    }

    #[test]
    fn missing_meal_log_reads_as_not_found() {
        let pool = test_support::pool();
        let alice = test_support::create_user(&pool, "alice");
        let conn = pool.get().unwrap();

        let err = remove_meal_log(&conn, &alice.id, "no-such-id").unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }
}
