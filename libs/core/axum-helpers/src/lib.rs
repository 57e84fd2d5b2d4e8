//! # Axum Helpers
//!
//! Structured error responses shared by this workspace's Axum services:
//! `AppError` maps domain errors to HTTP status codes and a consistent
//! JSON body (`ErrorResponse`), tagged with an `ErrorCode` for logs and
//! monitoring.
//!
//! ## Quick Start
//!
//! ```ignore
//! use axum_helpers::AppError;
//!
//! async fn handler() -> Result<(), AppError> {
//!     Err(AppError::NotFound("story not found".into()))
//! }
//! ```

pub mod errors;

pub use errors::{AppError, ErrorCode, ErrorResponse};
