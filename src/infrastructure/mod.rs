//! Infrastructure Layer
//!
//! Implementations for external collaborators:
//! - PostgreSQL repositories (the document store)
//! - Prometheus metrics

pub mod database;
pub mod metrics;
pub mod repositories;
