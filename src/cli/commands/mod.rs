pub mod auth;
pub mod careers;
pub mod profile;
pub mod quiz;
