pub mod api;
pub mod auth;
pub mod careers;
pub mod cli;
pub mod config;
pub mod error;

pub use api::NextStepClient;
pub use auth::{Authenticator, CredentialPair, CredentialStore, RequestDescriptor};
pub use error::ApiError;
