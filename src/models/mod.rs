//! Request and Response models for the operational API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{PatternQuery, ResetCircuitsRequest};
pub use responses::{
    ClearPatternResponse, HealthResponse, InvalidateResponse, ResetResponse, StatsResponse,
};
