pub mod auth;
pub mod bcs;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod external;
pub mod foods;
pub mod ownership;
pub mod routes;
pub mod state;
