//! HTTP surface: routes, health.

pub mod health;
pub mod routes;
