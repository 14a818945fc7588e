//! HTTP handlers for the preprocess service.

pub mod health;
pub mod preprocess;
