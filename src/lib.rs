//! # Realtime Server
//!
//! Real-time coordination layer for a social-networking application:
//! presence, chat messaging, notification fan-out, and call signaling over
//! long-lived WebSocket connections.
//!
//! ## Architecture
//!
//! - **Domain Layer**: entities and the repository traits describing the
//!   document-store collaborator
//! - **Application Layer**: connection registry, presence tracker, and the
//!   messaging / notification / call-signaling services
//! - **Infrastructure Layer**: PostgreSQL repositories and metrics
//! - **Presentation Layer**: the WebSocket gateway and its small HTTP
//!   surface
//!
//! ## Module Structure
//!
//! ```text
//! realtime_server/
//! +-- config/         Configuration management
//! +-- domain/         Entities and repository traits
//! +-- application/    Registry, presence, events, services
//! +-- infrastructure/ Database repositories, metrics
//! +-- presentation/   Gateway and HTTP routes
//! +-- shared/         Common utilities (errors)
//! ```

pub mod config;

pub mod domain;

pub mod application;

pub mod infrastructure;

pub mod presentation;

pub mod shared;

pub mod startup;

pub mod telemetry;
