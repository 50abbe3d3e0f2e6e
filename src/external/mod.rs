pub mod ai;
pub mod places;
