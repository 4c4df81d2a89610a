//! HTTP middleware for the ChemTrade CRM/PMS backend

pub mod auth;

pub use auth::{auth_middleware, AuthUser, CurrentUser};
