pub mod activity;
pub mod calendar;
pub mod care;
pub mod community;
pub mod health;
pub mod meals;
pub mod messages;
pub mod notifications;
pub mod pets;
pub mod users;

use axum::Router;

use crate::state::AppState;

/// Everything the API serves, mounted by the binary under `/api/v1`.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .merge(users::router())
        .merge(pets::router())
        .merge(care::router())
        .merge(activity::router())
        .merge(calendar::router())
        .merge(meals::router())
        .merge(health::router())
        .merge(community::router())
        .merge(messages::router())
        .merge(notifications::router())
}
