use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use rusqlite::{params, Connection};
use serde::Deserialize;

use crate::db::models::Pet;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::ownership::{ensure_can_write, WriteTarget};
use crate::state::AppState;

const PET_COLUMNS: &str = "id, owner_id, name, species, breed, birth_date, gender, is_neutered, \
                           weight, photo_path, target_activity_minutes, special_notes, \
                           created_at, updated_at";

#[derive(Debug, Deserialize)]
pub struct CreatePetRequest {
    pub name: String,
    pub species: String,
    pub breed: String,
    pub birth_date: String,
    pub gender: String,
    pub is_neutered: bool,
    pub weight: f64,
    pub target_activity_minutes: Option<i64>,
    pub special_notes: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdatePetRequest {
    pub name: Option<String>,
    pub species: Option<String>,
    pub breed: Option<String>,
    pub birth_date: Option<String>,
    pub gender: Option<String>,
    pub is_neutered: Option<bool>,
    pub weight: Option<f64>,
    pub target_activity_minutes: Option<i64>,
    pub special_notes: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/pets", get(list_pets).post(create_pet))
        .route(
            "/pets/{pet_id}",
            get(get_pet).put(update_pet).delete(delete_pet),
        )
}

// --- Service layer ---

/// Fetch a pet scoped to its owner. A pet owned by someone else reads as
/// not-found, so callers cannot probe for existence.
pub fn load_owned_pet(conn: &Connection, pet_id: &str, owner_id: &str) -> AppResult<Pet> {
    conn.query_row(
        &format!("SELECT {PET_COLUMNS} FROM pets WHERE id = ?1 AND owner_id = ?2"),
        params![pet_id, owner_id],
        Pet::from_row,
    )
    .map_err(|_| AppError::NotFound)
}

/// Unscoped fetch, used by the write guard so a foreign pet yields 403
/// rather than 404 on update/delete.
pub fn load_pet(conn: &Connection, pet_id: &str) -> AppResult<Pet> {
    conn.query_row(
        &format!("SELECT {PET_COLUMNS} FROM pets WHERE id = ?1"),
        params![pet_id],
        Pet::from_row,
    )
    .map_err(|_| AppError::NotFound)
}

pub fn list_owned_pets(conn: &Connection, owner_id: &str) -> AppResult<Vec<Pet>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PET_COLUMNS} FROM pets WHERE owner_id = ?1 ORDER BY created_at"
    ))?;
    let pets = stmt
        .query_map(params![owner_id], Pet::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(pets)
}

pub fn insert_pet(conn: &Connection, owner_id: &str, req: &CreatePetRequest) -> AppResult<Pet> {
    if req.name.trim().is_empty() {
        return Err(AppError::Validation("name is required".into()));
    }
    parse_date(&req.birth_date)?;

    let id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO pets (id, owner_id, name, species, breed, birth_date, gender,
                           is_neutered, weight, target_activity_minutes, special_notes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            id,
            owner_id,
            req.name.trim(),
            req.species,
            req.breed,
            req.birth_date,
            req.gender,
            req.is_neutered,
            req.weight,
            req.target_activity_minutes.unwrap_or(45),
            req.special_notes,
        ],
    )
    .map_err(|e| AppError::on_conflict(e, "you already have a pet with this name"))?;

    load_pet(conn, &id)
}

pub fn apply_pet_update(
    conn: &Connection,
    user_id: &str,
    pet_id: &str,
    update: &UpdatePetRequest,
) -> AppResult<Pet> {
    let pet = load_pet(conn, pet_id)?;
    ensure_can_write(user_id, WriteTarget::PetScoped { owner_id: &pet.owner_id })?;

    if let Some(ref date) = update.birth_date {
        parse_date(date)?;
    }

    conn.execute(
        "UPDATE pets SET
             name = COALESCE(?1, name),
             species = COALESCE(?2, species),
             breed = COALESCE(?3, breed),
             birth_date = COALESCE(?4, birth_date),
             gender = COALESCE(?5, gender),
             is_neutered = COALESCE(?6, is_neutered),
             weight = COALESCE(?7, weight),
             target_activity_minutes = COALESCE(?8, target_activity_minutes),
             special_notes = COALESCE(?9, special_notes),
             updated_at = datetime('now')
         WHERE id = ?10",
        params![
            update.name,
            update.species,
            update.breed,
            update.birth_date,
            update.gender,
            update.is_neutered,
            update.weight,
            update.target_activity_minutes,
            update.special_notes,
            pet_id,
        ],
    )
    .map_err(|e| AppError::on_conflict(e, "you already have a pet with this name"))?;

    load_pet(conn, pet_id)
}

pub fn remove_pet(conn: &Connection, user_id: &str, pet_id: &str) -> AppResult<()> {
    let pet = load_pet(conn, pet_id)?;
    ensure_can_write(user_id, WriteTarget::PetScoped { owner_id: &pet.owner_id })?;
    conn.execute("DELETE FROM pets WHERE id = ?1", params![pet_id])?;
    Ok(())
}

pub fn parse_date(raw: &str) -> AppResult<chrono::NaiveDate> {
    raw.parse::<chrono::NaiveDate>()
        .map_err(|_| AppError::Validation(format!("invalid date: {raw} (expected YYYY-MM-DD)")))
}

/// Integer age in years as whole days since birth divided by 365. The drift
/// near leap years is accepted imprecision.
pub fn age_in_years(birth_date: &str, today: chrono::NaiveDate) -> i64 {
    match birth_date.parse::<chrono::NaiveDate>() {
        Ok(birth) => (today - birth).num_days() / 365,
        Err(_) => 0,
    }
}

// --- Handlers ---

async fn list_pets(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<Vec<Pet>>> {
    let conn = state.db.get()?;
    Ok(Json(list_owned_pets(&conn, &user.id)?))
}

async fn create_pet(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<CreatePetRequest>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let pet = insert_pet(&conn, &user.id, &req)?;
    Ok((StatusCode::CREATED, Json(pet)).into_response())
}

async fn get_pet(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(pet_id): Path<String>,
) -> AppResult<Json<Pet>> {
    let conn = state.db.get()?;
    Ok(Json(load_owned_pet(&conn, &pet_id, &user.id)?))
}

async fn update_pet(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(pet_id): Path<String>,
    Json(update): Json<UpdatePetRequest>,
) -> AppResult<Json<Pet>> {
    let conn = state.db.get()?;
    Ok(Json(apply_pet_update(&conn, &user.id, &pet_id, &update)?))
}

async fn delete_pet(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(pet_id): Path<String>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    remove_pet(&conn, &user.id, &pet_id)?;
    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "message": "pet deleted" })),
    )
        .into_response())
}
