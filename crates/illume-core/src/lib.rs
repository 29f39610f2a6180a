//! # illume-core
//!
//! Core types, traits, and abstractions for the illume note-taking backend.
//!
//! This crate provides the foundational data structures and trait definitions
//! that other illume crates depend on: the error taxonomy, note and
//! generation models, repository and provider-backend interfaces, and shared
//! default constants.

pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::*;
pub use traits::*;
