//! Health page aggregation, health-log CRUD, BCS scoring, and the AI checkup.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use crate::bcs;
use crate::db::models::{BcsResult, HealthLog, Pet};
use crate::error::{AppError, AppResult};
use crate::external::ai::{self, AnalysisResult};
use crate::external::places::{self, Clinic};
use crate::extractors::CurrentUser;
use crate::ownership::{ensure_can_write, WriteTarget};
use crate::routes::pets::{age_in_years, load_owned_pet, parse_date};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateHealthLogRequest {
    pub log_date: String,
    #[serde(default = "default_log_type")]
    pub log_type: String,
    pub content: String,
    pub location: Option<String>,
    pub weight: Option<f64>,
}

fn default_log_type() -> String {
    "checkup".to_string()
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateHealthLogRequest {
    pub log_date: Option<String>,
    pub log_type: Option<String>,
    pub content: Option<String>,
    pub location: Option<String>,
    pub weight: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct BcsCheckupRequest {
    pub answers: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct AiCheckupRequest {
    #[serde(default)]
    pub symptoms: Vec<String>,
    pub location: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Coordinates {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Serialize)]
pub struct PetInfo {
    pub name: String,
    pub breed: String,
    pub weight: f64,
    pub age_years: i64,
    pub bcs_stage: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct WeightPoint {
    pub date: String,
    pub weight: f64,
}

#[derive(Debug, Serialize)]
pub struct HealthPage {
    pub pet_info: PetInfo,
    pub weight_graph: Vec<WeightPoint>,
    pub recent_health_logs: Vec<HealthLog>,
}

#[derive(Debug, Serialize)]
pub struct AiCheckupResponse {
    pub analysis_result: AnalysisResult,
    pub nearby_clinics: Vec<Clinic>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/pets/health/{pet_id}", get(health_page))
        // One path, two meanings: POST takes a pet id, the rest take a log id.
        .route(
            "/pets/health/logs/{id}",
            post(create_health_log)
                .get(get_health_log)
                .put(update_health_log)
                .delete(delete_health_log),
        )
        .route("/pets/health/bcs-checkup/{pet_id}", post(bcs_checkup))
        .route("/pets/health/ai-checkup/{pet_id}", post(ai_checkup))
}

// --- Service layer ---

pub fn health_page_for_pet(conn: &Connection, pet: &Pet, today: NaiveDate) -> AppResult<HealthPage> {
    Ok(HealthPage {
        pet_info: pet_info(conn, pet, today)?,
        weight_graph: weight_graph(conn, &pet.id)?,
        recent_health_logs: recent_health_logs(conn, &pet.id, 5)?,
    })
}

fn pet_info(conn: &Connection, pet: &Pet, today: NaiveDate) -> AppResult<PetInfo> {
    Ok(PetInfo {
        name: pet.name.clone(),
        breed: pet.breed.clone(),
        weight: pet.weight,
        age_years: age_in_years(&pet.birth_date, today),
        bcs_stage: latest_bcs_stage(conn, &pet.id)?,
    })
}

/// Stage text of the newest checkup, or the sentinel when none exists.
pub fn latest_bcs_stage(conn: &Connection, pet_id: &str) -> AppResult<String> {
    let stage = conn
        .query_row(
            "SELECT stage_text FROM bcs_results WHERE pet_id = ?1
             ORDER BY checkup_date DESC LIMIT 1",
            params![pet_id],
            |r| r.get::<_, String>(0),
        )
        .unwrap_or_else(|_| "not measured".to_string());
    Ok(stage)
}

/// Every weight-bearing entry, oldest first.
pub fn weight_graph(conn: &Connection, pet_id: &str) -> AppResult<Vec<WeightPoint>> {
    let mut stmt = conn.prepare(
        "SELECT log_date, weight FROM health_logs
         WHERE pet_id = ?1 AND weight IS NOT NULL
         ORDER BY log_date, created_at",
    )?;
    let points = stmt
        .query_map(params![pet_id], |row| {
            Ok(WeightPoint {
                date: row.get(0)?,
                weight: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(points)
}

fn recent_health_logs(conn: &Connection, pet_id: &str, limit: usize) -> AppResult<Vec<HealthLog>> {
    let mut stmt = conn.prepare(
        "SELECT id, pet_id, log_date, log_type, content, location, weight, created_at
         FROM health_logs WHERE pet_id = ?1
         ORDER BY log_date DESC, created_at DESC LIMIT ?2",
    )?;
    let logs = stmt
        .query_map(params![pet_id, limit], HealthLog::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(logs)
}

pub fn insert_health_log(
    conn: &Connection,
    pet_id: &str,
    req: &CreateHealthLogRequest,
) -> AppResult<HealthLog> {
    parse_date(&req.log_date)?;
    if req.content.trim().is_empty() {
        return Err(AppError::Validation("content is required".into()));
    }

    let id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO health_logs (id, pet_id, log_date, log_type, content, location, weight)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            id,
            pet_id,
            req.log_date,
            req.log_type,
            req.content.trim(),
            req.location,
            req.weight,
        ],
    )?;
    load_health_log(conn, &id)
}

pub fn load_health_log(conn: &Connection, log_id: &str) -> AppResult<HealthLog> {
    conn.query_row(
        "SELECT id, pet_id, log_date, log_type, content, location, weight, created_at
         FROM health_logs WHERE id = ?1",
        params![log_id],
        HealthLog::from_row,
    )
    .map_err(|_| AppError::NotFound)
}

fn guard_health_log_write(conn: &Connection, user_id: &str, log_id: &str) -> AppResult<()> {
    let owner_id: String = conn
        .query_row(
            "SELECT p.owner_id FROM health_logs h JOIN pets p ON p.id = h.pet_id WHERE h.id = ?1",
            params![log_id],
            |r| r.get(0),
        )
        .map_err(|_| AppError::NotFound)?;
    ensure_can_write(user_id, WriteTarget::PetScoped { owner_id: &owner_id })
}

pub fn apply_health_log_update(
    conn: &Connection,
    user_id: &str,
    log_id: &str,
    update: &UpdateHealthLogRequest,
) -> AppResult<HealthLog> {
    guard_health_log_write(conn, user_id, log_id)?;
    if let Some(ref date) = update.log_date {
        parse_date(date)?;
    }

    conn.execute(
        "UPDATE health_logs SET
             log_date = COALESCE(?1, log_date),
             log_type = COALESCE(?2, log_type),
             content = COALESCE(?3, content),
             location = COALESCE(?4, location),
             weight = COALESCE(?5, weight)
         WHERE id = ?6",
        params![
            update.log_date,
            update.log_type,
            update.content,
            update.location,
            update.weight,
            log_id,
        ],
    )?;
    load_health_log(conn, log_id)
}

pub fn remove_health_log(conn: &Connection, user_id: &str, log_id: &str) -> AppResult<()> {
    guard_health_log_write(conn, user_id, log_id)?;
    conn.execute("DELETE FROM health_logs WHERE id = ?1", params![log_id])?;
    Ok(())
}

/// Score a checkup and persist it. Rows are append-only; a pet's history of
/// checkups is never rewritten.
pub fn record_bcs_checkup(
    conn: &Connection,
    pet_id: &str,
    answers: Option<&serde_json::Value>,
) -> AppResult<BcsResult> {
    let parsed = bcs::parse_answers(answers)?;
    let total: f64 = parsed.iter().sum();
    let (stage_number, stage_text) = bcs::stage_for_total(total);

    let id = uuid::Uuid::now_v7().to_string();
    let answers_json = serde_json::to_string(&parsed)?;
    conn.execute(
        "INSERT INTO bcs_results (id, pet_id, answers, stage_number, stage_text)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, pet_id, answers_json, stage_number, stage_text],
    )?;

    let (answers_raw, checkup_date): (String, String) = conn.query_row(
        "SELECT answers, checkup_date FROM bcs_results WHERE id = ?1",
        params![id],
        |r| Ok((r.get(0)?, r.get(1)?)),
    )?;
    Ok(BcsResult {
        id,
        pet_id: pet_id.to_string(),
        answers: serde_json::from_str(&answers_raw)?,
        stage_number,
        stage_text: stage_text.to_string(),
        checkup_date,
    })
}

// --- Handlers ---

async fn health_page(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(pet_id): Path<String>,
) -> AppResult<Json<HealthPage>> {
    let conn = state.db.get()?;
    let pet = load_owned_pet(&conn, &pet_id, &user.id)?;
    let today = chrono::Local::now().date_naive();
    Ok(Json(health_page_for_pet(&conn, &pet, today)?))
}

async fn create_health_log(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(pet_id): Path<String>,
    Json(req): Json<CreateHealthLogRequest>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let pet = load_owned_pet(&conn, &pet_id, &user.id)?;
    let log = insert_health_log(&conn, &pet.id, &req)?;
    Ok((StatusCode::CREATED, Json(log)).into_response())
}

async fn get_health_log(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(log_id): Path<String>,
) -> AppResult<Json<HealthLog>> {
    let conn = state.db.get()?;
    let log = load_health_log(&conn, &log_id)?;
    load_owned_pet(&conn, &log.pet_id, &user.id)?;
    Ok(Json(log))
}

async fn update_health_log(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(log_id): Path<String>,
    Json(update): Json<UpdateHealthLogRequest>,
) -> AppResult<Json<HealthLog>> {
    let conn = state.db.get()?;
    Ok(Json(apply_health_log_update(&conn, &user.id, &log_id, &update)?))
}

async fn delete_health_log(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(log_id): Path<String>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    remove_health_log(&conn, &user.id, &log_id)?;
    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "message": "health log deleted" })),
    )
        .into_response())
}

async fn bcs_checkup(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(pet_id): Path<String>,
    Json(req): Json<BcsCheckupRequest>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let pet = load_owned_pet(&conn, &pet_id, &user.id)?;
    let result = record_bcs_checkup(&conn, &pet.id, req.answers.as_ref())?;
    Ok((StatusCode::CREATED, Json(result)).into_response())
}

async fn ai_checkup(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(pet_id): Path<String>,
    Json(req): Json<AiCheckupRequest>,
) -> AppResult<Json<AiCheckupResponse>> {
    let symptoms: Vec<String> = req
        .symptoms
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if symptoms.is_empty() {
        return Err(AppError::Validation("at least one symptom is required".into()));
    }

    let pet = {
        let conn = state.db.get()?;
        load_owned_pet(&conn, &pet_id, &user.id)?
    };

    let age_years = age_in_years(&pet.birth_date, chrono::Local::now().date_naive());
    let prompt = ai::build_prompt(&pet, age_years, &symptoms);
    let analysis_result = state.ai.analyze(&prompt).await?;

    let nearby_clinics = match req.location {
        None => Vec::new(),
        Some(value) => match serde_json::from_value::<Coordinates>(value) {
            Ok(coords) => state.places.nearby(coords.latitude, coords.longitude).await,
            Err(_) => places::placeholder("Location is malformed"),
        },
    };

    Ok(Json(AiCheckupResponse {
        analysis_result,
        nearby_clinics,
    }))
}
