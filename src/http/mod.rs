//! HTTP surface: registry, control, capture ingest and state polling

pub mod routes;

pub use routes::{build_router, AppError};
