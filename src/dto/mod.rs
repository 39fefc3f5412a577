/// Admin configuration and lifecycle payloads.
pub mod admin;
/// Health check payloads.
pub mod health;
/// Issue tracker payloads.
pub mod issues;
/// Session operation payloads and room projections.
pub mod session;
/// Validation helpers for DTOs.
pub mod validation;
