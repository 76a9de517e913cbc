//! API Module
//!
//! Operational HTTP endpoints for inspecting and administering the cache
//! and resilience core.
//!
//! # Endpoints
//! - `GET /health`, `GET /stats` - Health and cache statistics
//! - `GET /circuits`, `POST /circuits/reset`, `POST /circuits/:name/reset` - Circuit tooling
//! - `GET /metrics`, `GET /metrics/queries`, `GET /metrics/errors` - Monitoring data
//! - `DELETE /cache/:key`, `DELETE /cache?pattern=` - Invalidation

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
