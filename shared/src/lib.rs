//! Shared types and models for the ChemTrade CRM/PMS platform
//!
//! This crate contains the domain model, the pure stock-ledger replay engine,
//! and the validation rules shared between the backend and its tests.

pub mod ledger;
pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
