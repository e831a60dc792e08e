//! # Domain Layer
//!
//! Core entities of the coordination layer and the repository traits that
//! describe the document-store collaborator. The store is the sole source of
//! truth after a restart; everything else in this process is rebuildable,
//! in-memory state.

pub mod entities;

pub use entities::*;
