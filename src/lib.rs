// Admission Counter Library

pub mod api;
pub mod config;
pub mod errors;
pub mod limiter;
pub mod observability;
pub mod store;

pub use crate::config::Config;
pub use crate::errors::{AppError, Result};
pub use crate::limiter::{AdmissionCounter, AdmissionSettings, Decision};
