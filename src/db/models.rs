use rusqlite::Row;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub nickname: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pet {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub species: String,
    pub breed: String,
    pub birth_date: String,
    pub gender: String,
    pub is_neutered: bool,
    pub weight: f64,
    pub photo_path: Option<String>,
    pub target_activity_minutes: i64,
    pub special_notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Pet {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Pet {
            id: row.get("id")?,
            owner_id: row.get("owner_id")?,
            name: row.get("name")?,
            species: row.get("species")?,
            breed: row.get("breed")?,
            birth_date: row.get("birth_date")?,
            gender: row.get("gender")?,
            is_neutered: row.get("is_neutered")?,
            weight: row.get("weight")?,
            photo_path: row.get("photo_path")?,
            target_activity_minutes: row.get("target_activity_minutes")?,
            special_notes: row.get("special_notes")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MealLog {
    pub id: String,
    pub pet_id: String,
    pub log_date: String,
    pub food_type: String,
    pub food_name: String,
    pub quantity_g: f64,
    pub calorie: f64,
    pub created_at: String,
}

impl MealLog {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(MealLog {
            id: row.get("id")?,
            pet_id: row.get("pet_id")?,
            log_date: row.get("log_date")?,
            food_type: row.get("food_type")?,
            food_name: row.get("food_name")?,
            quantity_g: row.get("quantity_g")?,
            calorie: row.get("calorie")?,
            created_at: row.get("created_at")?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkLog {
    pub id: String,
    pub pet_id: String,
    pub log_date: String,
    pub log_type: String,
    pub duration: i64,
    pub distance: Option<f64>,
    pub created_at: String,
}

impl WalkLog {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(WalkLog {
            id: row.get("id")?,
            pet_id: row.get("pet_id")?,
            log_date: row.get("log_date")?,
            log_type: row.get("log_type")?,
            duration: row.get("duration")?,
            distance: row.get("distance")?,
            created_at: row.get("created_at")?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthLog {
    pub id: String,
    pub pet_id: String,
    pub log_date: String,
    pub log_type: String,
    pub content: String,
    pub location: Option<String>,
    pub weight: Option<f64>,
    pub created_at: String,
}

impl HealthLog {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(HealthLog {
            id: row.get("id")?,
            pet_id: row.get("pet_id")?,
            log_date: row.get("log_date")?,
            log_type: row.get("log_type")?,
            content: row.get("content")?,
            location: row.get("location")?,
            weight: row.get("weight")?,
            created_at: row.get("created_at")?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarSchedule {
    pub id: String,
    pub pet_id: String,
    pub schedule_date: String,
    pub content: String,
    pub category: String,
    pub created_at: String,
}

impl CalendarSchedule {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(CalendarSchedule {
            id: row.get("id")?,
            pet_id: row.get("pet_id")?,
            schedule_date: row.get("schedule_date")?,
            content: row.get("content")?,
            category: row.get("category")?,
            created_at: row.get("created_at")?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CareLog {
    pub id: String,
    pub pet_id: String,
    pub log_date: String,
    pub content: String,
    pub is_complete: bool,
    pub created_at: String,
}

impl CareLog {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(CareLog {
            id: row.get("id")?,
            pet_id: row.get("pet_id")?,
            log_date: row.get("log_date")?,
            content: row.get("content")?,
            is_complete: row.get("is_complete")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Stored BCS checkup. `answers` round-trips as a JSON array; the stage is
/// kept as the split number/text pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BcsResult {
    pub id: String,
    pub pet_id: String,
    pub answers: serde_json::Value,
    pub stage_number: i64,
    pub stage_text: String,
    pub checkup_date: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    pub sent_at: String,
    pub is_read: bool,
}

impl Message {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Message {
            id: row.get("id")?,
            sender_id: row.get("sender_id")?,
            receiver_id: row.get("receiver_id")?,
            content: row.get("content")?,
            sent_at: row.get("sent_at")?,
            is_read: row.get("is_read")?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub actor_id: Option<String>,
    pub content: String,
    pub notification_type: String,
    pub link: Option<String>,
    pub is_read: bool,
    pub created_at: String,
}

impl Notification {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Notification {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            actor_id: row.get("actor_id")?,
            content: row.get("content")?,
            notification_type: row.get("notification_type")?,
            link: row.get("link")?,
            is_read: row.get("is_read")?,
            created_at: row.get("created_at")?,
        })
    }
}
